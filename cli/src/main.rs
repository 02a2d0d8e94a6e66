mod client;
mod interrupt;
mod session;

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use frames::Language;
use tokio::io::{AsyncBufReadExt, BufReader};

use client::{
    ChatError, ClientTimeouts, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_RESPONSE_TIMEOUT_SECS, RelayClient, StreamEnd,
    TurnOutcome,
};
use interrupt::Interrupts;
use session::ChatSession;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("health check failed: HTTP {0}")]
    Health(u16),
    #[error("{0}")]
    Chat(#[from] ChatError),
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "shinga", about = "ShingaBot terminal chat over the streaming relay")]
struct Cli {
    #[arg(long, env = "SHINGA_RELAY_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    /// Bearer token sent with chat requests.
    #[arg(long, env = "SHINGA_TOKEN")]
    token: Option<String>,

    /// Reply language: en, sn or nd. Anything else means English.
    #[arg(long, env = "SHINGA_LANGUAGE", default_value = "en")]
    language: String,

    /// Longest wait for the relay to start answering.
    #[arg(long, default_value_t = DEFAULT_RESPONSE_TIMEOUT_SECS)]
    response_timeout_secs: u64,

    /// Longest gap between two streamed chunks.
    #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    idle_timeout_secs: u64,

    /// Log progress to stderr.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the relay is up.
    Ping,
    /// Send one message and stream the reply to stdout.
    Send { message: String },
    /// Interactive chat. `/lang <code>` switches language, `/quit` exits.
    Repl,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::INFO } else { tracing::Level::WARN };
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_max_level(level).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let language = Language::from_selector(Some(&cli.language));
    let timeouts = ClientTimeouts {
        response: Duration::from_secs(cli.response_timeout_secs),
        idle: Duration::from_secs(cli.idle_timeout_secs),
        ..ClientTimeouts::default()
    };
    let relay = RelayClient::new(&cli.base_url, cli.token, timeouts)?;

    match cli.command {
        Command::Ping => run_ping(&cli.base_url).await,
        Command::Send { message } => {
            let interrupts = Interrupts::install();
            let mut session = ChatSession::new(language);
            run_turn(&relay, &interrupts, &mut session, &message).await?;
            Ok(())
        }
        Command::Repl => run_repl(&relay, &Interrupts::install(), language).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Health(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_repl(relay: &RelayClient, interrupts: &Interrupts, language: Language) -> Result<(), CliError> {
    let mut session = ChatSession::new(language);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!(
        "ShingaBot via {} ({}). /lang <en|sn|nd> switches language, /quit or Ctrl-C exits.",
        relay.chat_url(),
        session.language()
    );
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match ReplInput::parse(&line) {
            ReplInput::Quit => break,
            ReplInput::Empty => {}
            ReplInput::Language(Some(language)) => {
                session.set_language(language);
                eprintln!("language: {language}");
            }
            ReplInput::Language(None) => {
                let codes: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
                eprintln!("unknown language; use one of: {}", codes.join(", "));
            }
            ReplInput::Message(text) => {
                if let Err(err) = run_turn(relay, interrupts, &mut session, text).await {
                    eprintln!("{err}");
                }
            }
        }
        prompt()?;
    }
    Ok(())
}

/// Stream one reply to stdout. Ctrl-C cancels the reply, keeping what arrived.
async fn run_turn(
    relay: &RelayClient,
    interrupts: &Interrupts,
    session: &mut ChatSession,
    text: &str,
) -> Result<TurnOutcome, ChatError> {
    let cancel = interrupts.begin_turn();

    let mut stdout = std::io::stdout();
    let result = relay
        .send(session, text, &cancel, |fragment| {
            let _ = write!(stdout, "{fragment}");
            let _ = stdout.flush();
        })
        .await;
    interrupts.end_turn();

    if let Ok(outcome) = &result {
        tracing::info!(
            end = ?outcome.end,
            fragments = outcome.fragments,
            dropped_lines = outcome.dropped_lines,
            history = session.messages().len(),
            "turn finished"
        );
        if outcome.fragments > 0 {
            println!();
        }
        if outcome.end == StreamEnd::Interrupted {
            eprintln!("[reply interrupted]");
        }
    }
    result
}

fn prompt() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()
}

#[derive(Debug, PartialEq, Eq)]
enum ReplInput<'a> {
    Empty,
    Quit,
    Language(Option<Language>),
    Message(&'a str),
}

impl<'a> ReplInput<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if line == "/quit" || line == "/exit" {
            return Self::Quit;
        }
        if let Some(code) = line.strip_prefix("/lang") {
            let code = code.trim();
            return Self::Language(Language::ALL.iter().copied().find(|l| l.code() == code));
        }
        Self::Message(line)
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
