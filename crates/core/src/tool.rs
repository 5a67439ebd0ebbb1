//! Tool call supports.

mod error;
mod toolset;

use std::pin::Pin;

use tracing::Instrument;

pub use error::{Error, ErrorKind};
pub use toolset::Toolset;

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state between invocations.
///
/// Tools that need credentials or other context should take them at
/// construction, store them as immutable state, and copy what they need into
/// the future returned by [`Tool::execute`].
pub trait Tool: Send + Sync + 'static {
    /// Returns the name of the tool, which the model uses to refer to it.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    ///
    /// The model relies on this text alone to decide when to use the tool
    /// and what to pass as its input.
    fn description(&self) -> &str;

    /// Executes the tool with the given input text.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe.
    fn execute(
        &self,
        input: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn execute(
        &self,
        input: String,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;
}

pub(crate) struct AnyTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for AnyTool<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn execute(
        &self,
        input: String,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let span = debug_span!("tool execute", tool = self.0.name());
        Box::pin(self.0.execute(input).instrument(span))
    }
}
