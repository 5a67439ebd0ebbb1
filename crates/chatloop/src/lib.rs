//! A chat agent that reasons step by step, searches the web and does math.
//!
//! The crate includes a CLI tool for chatting in the terminal. You can also
//! use it as a library and drive a [`Session`] from your own front end.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod credentials;
mod session;
pub mod tools;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`chatloop_core`] crate.
pub mod core {
    pub use chatloop_core::*;
}
