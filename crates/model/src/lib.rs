//! An abstraction layer for different LLMs.
//!
//! This crate establishes an unified protocol for the agent to talk to
//! chat-completion endpoints, so that the agent loop never depends on a
//! concrete vendor API.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
