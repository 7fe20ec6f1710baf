//! REPL command parsing.

use std::path::PathBuf;

use parley_core::{CsvSource, ModelTier};

/// Slash commands offered for completion and hints.
pub const COMMANDS: [&str; 5] = ["/csv", "/help", "/image", "/model", "/new"];

pub const HELP: &str = "\
Commands:
  <text>                  Ask a question (a bare http(s) link ending in .csv loads it)
  /image <path> [text]    Ask about an image (defaults to \"Describe this image.\")
  /csv <path-or-url>      Load a CSV file to ground the next answers
  /model flash|pro        Switch model (starts a fresh chat session)
  /new                    Start a new conversation
  /help                   Show this help
  quit | exit             Leave";

/// One parsed line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Empty,
    Quit,
    Help,
    NewConversation,
    Model(ModelTier),
    LoadCsv(CsvSource),
    Image { path: PathBuf, text: String },
    Message(String),
    /// Recognised command with bad arguments; carries the usage hint.
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        if trimmed == "quit" || trimmed == "exit" {
            return Command::Quit;
        }
        if !trimmed.starts_with('/') {
            return Command::Message(trimmed.to_string());
        }

        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (trimmed, ""),
        };

        match name {
            "/help" => Command::Help,
            "/new" => Command::NewConversation,
            "/model" => match rest.parse::<ModelTier>() {
                Ok(tier) => Command::Model(tier),
                Err(_) => Command::Invalid("Usage: /model flash|pro".to_string()),
            },
            "/csv" if rest.is_empty() => {
                Command::Invalid("Usage: /csv <path-or-url>".to_string())
            }
            "/csv" => Command::LoadCsv(csv_source(rest)),
            "/image" if rest.is_empty() => {
                Command::Invalid("Usage: /image <path> [text]".to_string())
            }
            "/image" => {
                let (path, text) = match rest.split_once(char::is_whitespace) {
                    Some((path, text)) => (path, text.trim()),
                    None => (rest, ""),
                };
                Command::Image {
                    path: PathBuf::from(path),
                    text: text.to_string(),
                }
            }
            // Unknown slash words are ordinary chat input.
            _ => Command::Message(trimmed.to_string()),
        }
    }
}

fn csv_source(target: &str) -> CsvSource {
    let lower = target.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        CsvSource::Url(target.to_string())
    } else {
        CsvSource::File(PathBuf::from(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_control_lines() {
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse("exit"), Command::Quit);
        assert_eq!(Command::parse(" quit "), Command::Quit);
        assert_eq!(
            Command::parse("  what is 2+2? "),
            Command::Message("what is 2+2?".to_string())
        );
        assert_eq!(
            Command::parse("/etc/hosts is a file"),
            Command::Message("/etc/hosts is a file".to_string())
        );
    }

    #[test]
    fn test_model_command() {
        assert_eq!(Command::parse("/model pro"), Command::Model(ModelTier::Pro));
        assert_eq!(Command::parse("/model flash"), Command::Model(ModelTier::Flash));
        assert!(matches!(Command::parse("/model ultra"), Command::Invalid(_)));
    }

    #[test]
    fn test_csv_command_picks_source() {
        assert_eq!(
            Command::parse("/csv https://example.com/a.csv"),
            Command::LoadCsv(CsvSource::Url("https://example.com/a.csv".to_string()))
        );
        assert_eq!(
            Command::parse("/csv data/people.csv"),
            Command::LoadCsv(CsvSource::File(PathBuf::from("data/people.csv")))
        );
        assert!(matches!(Command::parse("/csv"), Command::Invalid(_)));
    }

    #[test]
    fn test_image_command_splits_prompt() {
        assert_eq!(
            Command::parse("/image cat.png what breed is this?"),
            Command::Image {
                path: PathBuf::from("cat.png"),
                text: "what breed is this?".to_string(),
            }
        );
        assert_eq!(
            Command::parse("/image cat.png"),
            Command::Image {
                path: PathBuf::from("cat.png"),
                text: String::new(),
            }
        );
        assert!(matches!(Command::parse("/image"), Command::Invalid(_)));
    }
}
