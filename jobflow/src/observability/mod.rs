//! Observability utilities.
//!
//! Logs go through `tracing`. Binaries call [`init_tracing`] once at startup;
//! the library itself never installs a subscriber.

mod subscriber;

pub use subscriber::{init_tracing, LogFormat, TracingInitError, DEFAULT_LOG_FILTER};
