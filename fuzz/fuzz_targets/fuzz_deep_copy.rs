//! Fuzz target: `ArgRegistry::clone_call`
//!
//! Builds owning actions from arbitrary bytes and copies them under an
//! arbitrary byte budget. A copy must either equal its source or fail
//! cleanly, and the ledger must be back at zero once it is dropped.
//!
//! cargo fuzz run fuzz_deep_copy

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshbridge::Action;
use meshbridge::bridge::registry::ArgRegistry;
use meshbridge::mesh::actions::{ModelCall, ProxyClientCall};
use meshbridge::mesh::types::{ClientParams, ModelHandle, MsgCtx};

fuzz_target!(|data: &[u8]| {
    let [selector, budget_hi, budget_lo, body @ ..] = data else {
        return;
    };
    let budget = usize::from(u16::from_be_bytes([*budget_hi, *budget_lo]));

    let addrs: Vec<u16> = body
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let model = ModelHandle::new(0, 0);
    let action = match selector % 4 {
        0 => Action::ProxyClient(ProxyClientCall::AddFilterAddr {
            conn_handle: *selector,
            net_idx: 0,
            addrs,
        }),
        1 => Action::ProxyClient(ProxyClientCall::RemoveFilterAddr {
            conn_handle: *selector,
            net_idx: 0,
            addrs,
        }),
        2 => Action::Model(ModelCall::ClientSend {
            params: ClientParams::new(0x8201, model, MsgCtx::new(0, 0, 1)),
            data: body.to_vec(),
            response: Some(0x8204),
        }),
        _ => Action::Model(ModelCall::Publish {
            model,
            opcode: 0xC0_0001,
            data: body.to_vec(),
        }),
    };

    // Validation never panics, whatever the shape.
    let _ = action.validate();

    let registry = ArgRegistry::new(budget);
    match registry.clone_call(&action) {
        Ok(copy) => {
            assert_eq!(*copy, action);
            assert_eq!(registry.outstanding(), 1);
        }
        Err(_) => assert_eq!(registry.clones(), 0),
    }
    assert_eq!(registry.outstanding(), 0);
});
