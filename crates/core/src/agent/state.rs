use chatloop_model::{ErrorKind, ModelFinishReason, ModelRequest};

use super::prompt::{self, FORMAT_CORRECTION, STOP_SEQUENCE};
use super::step::{self, AgentStep, ParsedOutput};
use super::{Agent, ParsePolicy, TurnOutcome};
use crate::conversation::Message;
use crate::error::{ParseError, TurnError};

/// Where a turn currently is.
#[derive(Debug)]
enum AgentStage {
    Start,
    Query,
    Parse(String),
    Act { tool: String, input: String },
    Answered(String),
    Failed(TurnError),
}

/// The working state of a single turn.
pub(super) struct Turn<'a> {
    agent: &'a Agent,
    /// Shrinks from the front when the context window overflows.
    history: &'a [Message],
    input: String,
    transcript: Vec<Message>,
    steps: Vec<AgentStep>,
    iterations: usize,
    parse_failures: u32,
}

impl<'a> Turn<'a> {
    pub(super) fn new(
        agent: &'a Agent,
        history: &'a [Message],
        input: &str,
    ) -> Self {
        Self {
            agent,
            history,
            input: input.to_owned(),
            transcript: vec![],
            steps: vec![],
            iterations: 0,
            parse_failures: 0,
        }
    }

    pub(super) async fn run(mut self) -> Result<TurnOutcome, TurnError> {
        let mut stage = AgentStage::Start;
        loop {
            trace!("entering stage {stage:?}");
            stage = match stage {
                AgentStage::Start => self.start(),
                AgentStage::Query => self.query().await,
                AgentStage::Parse(output) => self.parse(output),
                AgentStage::Act { tool, input } => self.act(tool, input).await,
                AgentStage::Answered(answer) => {
                    debug!("answered after {} iterations", self.iterations);
                    return Ok(TurnOutcome {
                        answer,
                        steps: self.steps,
                        transcript: self.transcript,
                        iterations: self.iterations,
                    });
                }
                AgentStage::Failed(err) => {
                    let iterations = self.iterations;
                    warn!("turn failed after {iterations} iterations: {err}");
                    return Err(err);
                }
            };
        }
    }

    fn start(&mut self) -> AgentStage {
        let input = std::mem::take(&mut self.input);
        self.transcript.push(Message::user(input));
        AgentStage::Query
    }

    async fn query(&mut self) -> AgentStage {
        let limit = self.agent.max_iterations;
        if self.iterations >= limit {
            return AgentStage::Failed(TurnError::MaxIterationsExceeded {
                limit,
            });
        }
        self.iterations += 1;

        loop {
            let resp_or_err = self
                .agent
                .model_client
                .send_request(self.build_request(), |delta| {
                    trace!("model delta: {delta:?}");
                })
                .await;
            match resp_or_err {
                Ok(resp) => {
                    if resp.finish_reason == Some(ModelFinishReason::Length) {
                        warn!("model output was cut off by the token limit");
                    }
                    return AgentStage::Parse(resp.text);
                }
                Err(err) if err.kind() == ErrorKind::ContextOverflow => {
                    if !self.drop_oldest_history() {
                        return AgentStage::Failed(TurnError::ContextOverflow);
                    }
                    warn!(
                        "context overflow, retrying with {} history messages",
                        self.history.len()
                    );
                }
                Err(err) => {
                    return AgentStage::Failed(TurnError::RemoteCall {
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    fn parse(&mut self, output: String) -> AgentStage {
        let parsed = if self.agent.toolset.is_empty() {
            Ok(step::parse_plain_output(&output))
        } else {
            step::parse_output(&output)
        };

        match parsed {
            Ok(parsed) => {
                self.parse_failures = 0;
                self.accept(parsed)
            }
            Err(err) => self.reject(output, err),
        }
    }

    fn accept(&mut self, parsed: ParsedOutput) -> AgentStage {
        let ParsedOutput {
            text,
            thought,
            step,
        } = parsed;
        self.transcript.push(Message::assistant(text));
        if let Some(thought) = thought {
            self.record(AgentStep::Thought(thought));
        }
        let next = match &step {
            AgentStep::Action { tool, input } => AgentStage::Act {
                tool: tool.clone(),
                input: input.clone(),
            },
            AgentStep::FinalAnswer(answer) => {
                AgentStage::Answered(answer.clone())
            }
            AgentStep::Thought(_) | AgentStep::Observation(_) => {
                AgentStage::Failed(ParseError::MissingAction.into())
            }
        };
        self.record(step);
        next
    }

    fn reject(&mut self, output: String, err: ParseError) -> AgentStage {
        warn!("malformed model output ({err}): {output:?}");
        let ParsePolicy::Retry { max_retries } = self.agent.parse_policy else {
            return AgentStage::Failed(err.into());
        };
        if self.parse_failures >= max_retries {
            return AgentStage::Failed(err.into());
        }
        self.parse_failures += 1;

        self.transcript.push(Message::assistant(output.trim()));
        self.transcript.push(Message::tool(FORMAT_CORRECTION, None, None));
        self.record(AgentStep::Observation(FORMAT_CORRECTION.to_owned()));
        AgentStage::Query
    }

    async fn act(&mut self, tool: String, input: String) -> AgentStage {
        let observation = match self.agent.toolset.invoke(&tool, &input).await
        {
            Ok(output) => output,
            Err(err) => {
                warn!("tool `{tool}` failed: {err}");
                err.to_string()
            }
        };
        self.transcript.push(Message::tool(
            observation.clone(),
            Some(tool),
            Some(input),
        ));
        self.record(AgentStep::Observation(observation));
        AgentStage::Query
    }

    fn build_request(&self) -> ModelRequest {
        let messages = prompt::render(
            &self.agent.preamble,
            self.history,
            &self.transcript,
            !self.agent.toolset.is_empty(),
        );
        let stop = if self.agent.toolset.is_empty() {
            vec![]
        } else {
            vec![STOP_SEQUENCE.to_owned()]
        };
        ModelRequest { messages, stop }
    }

    /// Leaves the oldest user/assistant exchange out of further requests.
    /// Returns `false` if there is no history left.
    fn drop_oldest_history(&mut self) -> bool {
        if self.history.is_empty() {
            return false;
        }
        let n = self.history.len().min(2);
        self.history = &self.history[n..];
        true
    }

    fn record(&mut self, step: AgentStep) {
        debug!("agent step: {step:?}");
        if let Some(on_step) = &self.agent.on_step {
            on_step(&step);
        }
        self.steps.push(step);
    }
}
