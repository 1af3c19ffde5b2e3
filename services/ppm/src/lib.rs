//! Privacy Protection Module service internals.
//!
//! The binary in `main.rs` wires these pieces together: [`config`] resolves
//! the flat properties file, [`bus`] defines the message-bus collaborator
//! traits (plus the built-in pipe transport), and [`supervisor`] runs the
//! bootstrap/consume loop around the filter handler.

pub mod bus;
pub mod config;
pub mod supervisor;
