//! Library crate for chain-rpc-scan exposing reusable modules.
pub mod candidates;
pub mod chainlist;
pub mod probe;
pub mod scanner;
pub mod server;
pub mod types;
