//! A terminal chat front end for `chatloop`.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use chatloop::credentials::{
    ConfigError, CredentialSource, DEFAULT_KEY_PREFIX, Requirements,
};
use chatloop::tools::SearchTool;
use chatloop::{Session, SessionBuilder};
use chatloop_core::{Agent, AgentStep, ParsePolicy};
use chatloop_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const APP_TITLE: &str = "chatloop";
const APP_REFERER: &str = "http://localhost";
const MAX_OBSERVATION_CHARS: usize = 400;

/// Chat with an agent that can search the web and do math.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Read the API keys from a TOML secrets file.
    #[arg(long, value_name = "FILE", conflicts_with = "env_file")]
    secrets: Option<PathBuf>,

    /// Load environment variables from this file instead of `./.env`.
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    /// The model to chat with.
    #[arg(long, env = "CHATLOOP_MODEL", default_value = "deepseek/deepseek-chat")]
    model: String,

    /// Base URL of the OpenAI-compatible API.
    #[arg(
        long,
        env = "CHATLOOP_BASE_URL",
        default_value = "https://openrouter.ai/api/v1"
    )]
    base_url: String,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Maximum number of tokens per model response.
    #[arg(long, default_value_t = 1024)]
    max_tokens: u32,

    /// Maximum number of model calls per message.
    #[arg(long, default_value_t = Agent::DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Answer every message without the earlier conversation.
    #[arg(long)]
    no_history: bool,

    /// Chat with the model directly, without search and calculator.
    #[arg(long)]
    no_tools: bool,

    /// Fail a message as soon as the model output is malformed.
    #[arg(long)]
    strict_parsing: bool,

    /// Print the agent's thoughts, actions and observations.
    #[arg(long)]
    show_reasoning: bool,

    /// Required prefix of the model API key, empty to skip the check.
    #[arg(long, env = "CHATLOOP_KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    key_prefix: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    debug!("starting with {args:?}");

    let (step_tx, mut step_rx) = mpsc::unbounded_channel();
    let mut session = match build_session(&args, step_tx) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("{} {err}", "error:".bright_red().bold());
            eprintln!("{} {}", "hint:".bright_yellow().bold(), err.hint());
            return ExitCode::FAILURE;
        }
    };

    println!("{}", "🤖 chatloop".bright_white().bold());
    let tool_names = session.tool_names();
    if tool_names.is_empty() {
        println!("Chatting with {}. Ask me anything!", args.model.bold());
    } else {
        println!(
            "Chatting with {} (tools: {}). Ask me anything!",
            args.model.bold(),
            tool_names.join(", ")
        );
    }
    println!();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut lines).await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");

        let mut panel = ReasoningPanel::new(args.show_reasoning);
        let mut turn = pin!(session.send_message(line));
        let result = loop {
            let sleep = sleep(Duration::from_millis(100));
            select! {
                result = &mut turn => break result,
                Some(step) = step_rx.recv() => {
                    progress_bar.suspend(|| panel.print(&step));
                }
                _ = sleep => {
                    progress_bar.inc(1);
                }
            }
        };

        // Finish the progress bar before printing anything else.
        progress_bar.finish_and_clear();
        while let Ok(step) = step_rx.try_recv() {
            panel.print(&step);
        }

        match result {
            Ok(outcome) => println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                outcome.answer.bright_white()
            ),
            Err(err) => println!(
                "{}❌ {}",
                BAR_CHAR.bright_red(),
                format!("An error occurred: {err}").bright_red()
            ),
        }
        println!();
    }

    ExitCode::SUCCESS
}

fn build_session(
    args: &Args,
    step_tx: mpsc::UnboundedSender<AgentStep>,
) -> Result<Session, ConfigError> {
    let source = match &args.secrets {
        Some(path) => CredentialSource::SecretsFile(path.clone()),
        None => CredentialSource::Env {
            env_file: args.env_file.clone(),
        },
    };
    let requirements = Requirements {
        key_prefix: args.key_prefix.clone(),
        search: !args.no_tools,
    };
    let credentials = source.load(&requirements)?;

    let config = OpenAIConfigBuilder::with_api_key(credentials.model_api_key())
        .with_model(args.model.clone())
        .with_base_url(args.base_url.clone())
        .with_temperature(args.temperature)
        .with_max_tokens(args.max_tokens)
        .with_header("HTTP-Referer", APP_REFERER)
        .with_header("X-Title", APP_TITLE)
        .build();
    let model_provider = OpenAIProvider::new(config);

    let parse_policy = if args.strict_parsing {
        ParsePolicy::Fail
    } else {
        ParsePolicy::default()
    };
    let mut builder = SessionBuilder::with_model_provider(model_provider)
        .with_history(!args.no_history)
        .with_max_iterations(args.max_iterations)
        .with_parse_policy(parse_policy)
        .on_step(move |step| {
            step_tx.send(step.clone()).ok();
        });

    if !args.no_tools {
        if let Some(search_api_key) = credentials.search_api_key() {
            builder = builder.with_search_tool(SearchTool::new(search_api_key));
        }
        builder = builder.with_calculator();
    }
    Ok(builder.build())
}

/// Prints reasoning steps as a dimmed side panel.
struct ReasoningPanel {
    enabled: bool,
    header_printed: bool,
}

impl ReasoningPanel {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            header_printed: false,
        }
    }

    fn print(&mut self, step: &AgentStep) {
        if !self.enabled {
            return;
        }
        if !self.header_printed {
            println!("{}{}", BAR_CHAR.dimmed(), "Thought process".dimmed().italic());
            self.header_printed = true;
        }
        match step {
            AgentStep::Thought(text) => print_panel_text("💭", text),
            AgentStep::Action { tool, input } => {
                print_panel_text("🔧", &format!("{tool}: {input}"));
            }
            AgentStep::Observation(text) => {
                print_panel_text("👀", &truncate(text, MAX_OBSERVATION_CHARS));
            }
            AgentStep::FinalAnswer(_) => {}
        }
    }
}

fn print_panel_text(icon: &str, text: &str) {
    let bar = BAR_CHAR.dimmed();
    for (idx, line) in text.lines().enumerate() {
        let icon = if idx == 0 { icon } else { "  " };
        println!("{bar}{icon} {}", line.dimmed());
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

async fn read_line<R>(lines: &mut Lines<R>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    match lines.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
