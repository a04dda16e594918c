//! Adapters: ready-made implementations on either side of the bridge.
//!
//! | Adapter    | Plugs into          | Purpose                            |
//! |------------|---------------------|------------------------------------|
//! | `log_sink` | callback table      | logs every delivered event         |
//! | `loopback` | stack handler table | answers requests without a radio   |

pub mod log_sink;
pub mod loopback;
