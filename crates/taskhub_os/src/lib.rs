#![forbid(unsafe_code)]

pub mod backend;
pub mod notify_flow;
pub mod push_manager;
pub mod push_platform;
pub mod unsub_challenge;
pub mod unsub_code_fetch;
