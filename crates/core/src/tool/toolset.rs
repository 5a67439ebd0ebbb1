use std::collections::HashMap;

use crate::tool::{AnyTool, Error, Tool, ToolObject, ToolResult};

/// A fixed set of tools the model may call, looked up by name.
///
/// The set is assembled before the agent starts and never changes
/// afterwards.
#[derive(Default)]
pub struct Toolset {
    tools: Vec<Box<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl Toolset {
    /// Registers a tool. A tool with the same name replaces the old one.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        let tool: Box<dyn ToolObject> = Box::new(AnyTool(tool));
        if let Some(&idx) = self.index.get(&name) {
            warn!("tool `{name}` is registered twice, replacing");
            self.tools[idx] = tool;
            return;
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    /// Renders one `name: description` line per tool.
    pub fn descriptions(&self) -> String {
        let mut text = String::new();
        for tool in &self.tools {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(tool.name());
            text.push_str(": ");
            text.push_str(tool.description().trim());
        }
        text
    }

    /// Invokes the named tool with the input text.
    ///
    /// Fails with a `NotFound` error if no such tool exists, otherwise
    /// returns whatever the tool returns.
    pub async fn invoke(&self, name: &str, input: &str) -> ToolResult {
        let Some(&idx) = self.index.get(name) else {
            warn!("tool not found: {name}");
            let reason = format!(
                "{name} is not a valid tool, try one of [{}].",
                self.names().join(", ")
            );
            return Err(Error::not_found().with_reason(reason));
        };
        trace!("invoking tool `{name}` with input: {input:?}");
        self.tools[idx].execute(input.to_owned()).await
    }
}
