//! Fuzz target: status payload decoding
//!
//! Feeds arbitrary bytes to every typed status decoder. Decoding must
//! never panic, and anything that decodes must re-encode to bytes that
//! decode to the same value.
//!
//! cargo fuzz run fuzz_status_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use meshbridge::mesh::status::{self, ByteState, FaultStatus, FilterStatus, StateChange};
use serde::Serialize;
use serde::de::DeserializeOwned;

fn check<T: Serialize + DeserializeOwned + PartialEq + core::fmt::Debug>(data: &[u8]) {
    if let Ok(value) = postcard::from_bytes::<T>(data) {
        let bytes = status::encode(&value).expect("decoded value re-encodes");
        let again: T = postcard::from_bytes(&bytes).expect("re-encoded bytes decode");
        assert_eq!(again, value);
    }
}

fuzz_target!(|data: &[u8]| {
    check::<FilterStatus>(data);
    check::<FaultStatus>(data);
    check::<ByteState>(data);
    check::<StateChange>(data);
});
