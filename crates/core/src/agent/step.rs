use crate::error::ParseError;

const FINAL_ANSWER: &str = "Final Answer:";
const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";
const OBSERVATION: &str = "Observation:";
const THOUGHT: &str = "Thought:";

/// One step of the agent's reasoning, in the order it happened.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AgentStep {
    /// Free-form reasoning preceding an action or answer.
    Thought(String),
    /// A request to run a tool.
    Action {
        /// The requested tool name.
        tool: String,
        /// The input text passed to the tool.
        input: String,
    },
    /// The tool output (or error, or format correction) fed back to the
    /// model.
    Observation(String),
    /// The answer to the user's input.
    FinalAnswer(String),
}

/// A model output split into its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParsedOutput {
    /// The output with any hallucinated observation cut off. This is what
    /// goes into the transcript.
    pub text: String,
    pub thought: Option<String>,
    /// Either [`AgentStep::Action`] or [`AgentStep::FinalAnswer`].
    pub step: AgentStep,
}

/// Parses a model output that should follow the reasoning format.
pub(crate) fn parse_output(output: &str) -> Result<ParsedOutput, ParseError> {
    // The stop sequence normally prevents it, but some models keep going and
    // invent the observation themselves.
    let text = match output.find(&format!("\n{OBSERVATION}")) {
        Some(idx) => &output[..idx],
        None => output,
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let answer_idx = text.find(FINAL_ANSWER);
    let action_idx = find_line_start(text, ACTION);

    match (action_idx, answer_idx) {
        (Some(_), Some(_)) => Err(ParseError::Ambiguous),
        (None, Some(idx)) => {
            let answer = text[idx + FINAL_ANSWER.len()..].trim();
            Ok(ParsedOutput {
                text: text.to_owned(),
                thought: thought_of(&text[..idx]),
                step: AgentStep::FinalAnswer(answer.to_owned()),
            })
        }
        (Some(idx), None) => {
            let rest = &text[idx + ACTION.len()..];
            // The input may follow the tool name on the same line.
            let (tool, rest) = match rest.find(ACTION_INPUT) {
                Some(input_idx) if !rest[..input_idx].contains('\n') => {
                    rest.split_at(input_idx)
                }
                _ => rest.split_once('\n').unwrap_or((rest, "")),
            };
            let tool = unwrap_quotes(tool);
            if tool.is_empty() {
                return Err(ParseError::MissingAction);
            }
            let Some(input_idx) = find_line_start(rest, ACTION_INPUT) else {
                return Err(ParseError::MissingActionInput);
            };
            let input = unwrap_quotes(&rest[input_idx + ACTION_INPUT.len()..]);
            Ok(ParsedOutput {
                text: text.to_owned(),
                thought: thought_of(&text[..idx]),
                step: AgentStep::Action {
                    tool: tool.to_owned(),
                    input: input.to_owned(),
                },
            })
        }
        (None, None) => Err(ParseError::MissingAction),
    }
}

/// Interprets a model output when no tools are available: whatever the
/// model says is the answer.
pub(crate) fn parse_plain_output(output: &str) -> ParsedOutput {
    let text = output.trim();
    let answer = match text.find(FINAL_ANSWER) {
        Some(idx) => text[idx + FINAL_ANSWER.len()..].trim(),
        None => text,
    };
    ParsedOutput {
        text: text.to_owned(),
        thought: None,
        step: AgentStep::FinalAnswer(answer.to_owned()),
    }
}

/// Finds `marker` at the start of a line, ignoring leading whitespace.
fn find_line_start(text: &str, marker: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with(marker) {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

fn thought_of(text: &str) -> Option<String> {
    let text = text.trim();
    let text = text.strip_prefix(THOUGHT).unwrap_or(text).trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn unwrap_quotes(text: &str) -> &str {
    text.trim().trim_matches(|c: char| c == '"' || c == '`').trim()
}
