//! The built-in tools the agent can use.

mod calculator;
mod search;

pub use calculator::CalculatorTool;
pub use search::SearchTool;
