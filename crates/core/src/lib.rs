//! Core logic including the agent loop, tool execution and the conversation
//! store.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod error;
mod model_client;
pub mod tool;

pub use agent::{Agent, AgentBuilder, AgentStep, ParsePolicy, TurnOutcome};
pub use chatloop_model::ErrorKind as ModelErrorKind;
pub use error::{ParseError, TurnError};
pub use model_client::RetryPolicy;
