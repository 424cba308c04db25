#![forbid(unsafe_code)]

pub mod backend;
pub mod common;
pub mod notify;
pub mod push;
pub mod unsub;

pub use common::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};
