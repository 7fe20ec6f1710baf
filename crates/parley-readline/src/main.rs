mod command;
mod render;

use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use parley_application::ChatUseCase;
use parley_core::config::AppConfig;
use parley_core::{Attachment, EventSink, ParleyError};
use parley_infrastructure::{ConfigService, CsvIngestorImpl, ParleyPaths, SecretServiceImpl};
use parley_interaction::GeminiServiceFactory;

use crate::command::{COMMANDS, Command, HELP};
use crate::render::{EventPrinter, print_message};

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|cmd| cmd.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

/// Sets up the daily-rolling log file; the guard must outlive the REPL.
fn init_tracing(paths: &ParleyPaths, level: &str) -> Result<WorkerGuard> {
    let logs_dir = paths.logs_dir()?;
    std::fs::create_dir_all(&logs_dir)?;

    let appender = tracing_appender::rolling::daily(&logs_dir, "parley.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}

async fn read_attachment(path: &Path) -> parley_core::Result<Attachment> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        ParleyError::io(format!("Failed to read image {}: {}", path.display(), e))
    })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    tracing::info!(
        "[REPL] Attached {} ({}, {} bytes)",
        name,
        mime_type,
        data.len()
    );
    Ok(Attachment::image(name, mime_type, data))
}

/// Runs one conversation-changing command against the use case.
async fn execute(chat: &mut ChatUseCase, command: Command) -> parley_core::Result<()> {
    match command {
        Command::Message(text) => chat.send_message(&text, None).await.map(|_| ()),
        Command::Image { path, text } => {
            let attachment = read_attachment(&path).await?;
            chat.send_message(&text, Some(attachment)).await.map(|_| ())
        }
        Command::LoadCsv(source) => chat.load_dataset(source).await,
        Command::Model(tier) => chat.select_model(tier),
        Command::NewConversation => chat.new_conversation(),
        Command::Empty | Command::Quit | Command::Help | Command::Invalid(_) => Ok(()),
    }
}

/// The main entry point for the Parley REPL.
///
/// Loads config and credentials, wires the Gemini client and CSV ingestor
/// into a [`ChatUseCase`], then reads lines until `quit`. Each command runs
/// on a spawned task while the loop prints its events as they stream in.
#[tokio::main]
async fn main() -> Result<()> {
    // ===== Configuration =====
    let paths = ParleyPaths::new(None);
    let config = match ConfigService::new(&paths)?.load_config().await {
        Ok(config) => config,
        Err(err) => {
            eprintln!(
                "{}",
                format!("{}. Falling back to defaults.", err.user_message()).red()
            );
            AppConfig::default()
        }
    };
    let _log_guard = init_tracing(&paths, &config.log_level)?;
    tracing::info!("[REPL] Starting parley with model {}", config.default_model);

    // ===== Backend Initialization =====
    let secret_service = Arc::new(SecretServiceImpl::new(&paths)?);
    let model_factory = Arc::new(GeminiServiceFactory::new(
        secret_service,
        config.api_base_url.clone(),
    ));
    let csv_ingestor = Arc::new(CsvIngestorImpl::new(
        config.cors_relay_url.clone(),
        config.max_csv_chars,
    ));
    let (sink, mut events) = EventSink::channel();
    let chat = Arc::new(Mutex::new(ChatUseCase::new(
        model_factory,
        csv_ingestor,
        config.default_model,
        sink,
    )));
    let mut printer = EventPrinter::new();

    // ===== REPL Setup =====
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    println!("{}", "=== Parley ===".bright_magenta().bold());
    println!(
        "{}",
        "Type '/help' for commands, or 'quit' to exit.".bright_black()
    );
    println!();
    if let Some(greeting) = chat.lock().await.messages().first() {
        print_message(greeting);
    }

    // ===== Main REPL Loop =====
    loop {
        let prompt = {
            let chat = chat.lock().await;
            match chat.dataset() {
                Some(dataset) => format!("[{} | {}] >> ", chat.model(), dataset.id),
                None => format!("[{}] >> ", chat.model()),
            }
        };

        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        let command = Command::parse(&line);
        match &command {
            Command::Empty => continue,
            Command::Quit => {
                println!("{}", "Goodbye!".bright_green());
                break;
            }
            Command::Help => {
                println!("{}", HELP.bright_black());
                continue;
            }
            Command::Invalid(usage) => {
                println!("{}", usage.yellow());
                continue;
            }
            Command::Message(text) => {
                println!("{}", format!("> {}", text).green());
            }
            Command::Image { path, text } => {
                println!(
                    "{}",
                    format!("> [image: {}] {}", path.display(), text).green()
                );
            }
            Command::LoadCsv(_) | Command::Model(_) | Command::NewConversation => {}
        }
        let _ = rl.add_history_entry(line.as_str());

        // Spawn the command and print its events until it finishes
        let task_chat = Arc::clone(&chat);
        let mut task = tokio::spawn(async move {
            let mut chat = task_chat.lock().await;
            execute(&mut chat, command).await
        });
        let outcome = loop {
            tokio::select! {
                Some(event) = events.recv() => printer.print(event),
                outcome = &mut task => break outcome,
            }
        };
        while let Ok(event) = events.try_recv() {
            printer.print(event);
        }

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => eprintln!("{}", err.user_message().red()),
            Err(err) => {
                tracing::error!("[REPL] Command task failed: {}", err);
                eprintln!("{}", format!("Error: {}", err).red());
            }
        }
    }

    tracing::info!("[REPL] Shutting down");
    Ok(())
}
