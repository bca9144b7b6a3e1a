//! Parley console front end
//!
//! The protocol lives in `parley-core`; this crate only parses what the user
//! types and renders what the node reports.

pub mod repl;

pub use parley_core::{Node, NodeEvent, ParleyConfig, ParleyError, ParleyResult};
