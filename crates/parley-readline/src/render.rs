//! Terminal rendering of conversation events.

use std::io::{self, Write};

use colored::Colorize;
use parley_core::{ConversationEvent, Message, MessageRole};

/// Prints events as they arrive, streaming assistant text in place.
#[derive(Debug, Default)]
pub struct EventPrinter {
    /// Id of the assistant message currently streaming to the terminal.
    streaming: Option<String>,
    /// Whether any of that message's text has been printed yet.
    printed: bool,
}

impl EventPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print(&mut self, event: ConversationEvent) {
        match event {
            ConversationEvent::MessageAdded(message) => self.message_added(&message),
            ConversationEvent::ContentAppended { id, text } => {
                if self.streaming.as_deref() == Some(id.as_str()) {
                    print!("{}", text.bright_blue());
                    let _ = io::stdout().flush();
                    self.printed = true;
                }
            }
            ConversationEvent::MessageSettled(message) => self.message_settled(&message),
            ConversationEvent::ConversationReset(messages) => {
                println!("{}", "--- New conversation ---".bright_magenta());
                for message in &messages {
                    print_message(message);
                }
            }
            ConversationEvent::ModelChanged(tier) => {
                println!(
                    "{}",
                    format!("Model set to {} ({})", tier, tier.model_id()).bright_black()
                );
            }
            ConversationEvent::DatasetChanged(None) => {
                tracing::debug!("[EventPrinter] Dataset cleared");
            }
            ConversationEvent::DatasetChanged(Some(name)) => {
                tracing::debug!("[EventPrinter] Dataset loaded: {}", name);
            }
            ConversationEvent::BusyChanged(_) => {}
        }
    }

    fn message_added(&mut self, message: &Message) {
        match message.role {
            // Echoed at the prompt already.
            MessageRole::User => {}
            MessageRole::Assistant if message.pending => {
                self.streaming = Some(message.id.clone());
                self.printed = false;
            }
            _ => print_message(message),
        }
    }

    fn message_settled(&mut self, message: &Message) {
        if self.streaming.as_deref() != Some(message.id.as_str()) {
            print_message(message);
            return;
        }
        if message.errored {
            if self.printed {
                println!();
            }
            println!("{}", message.content.red());
        } else if self.printed {
            println!();
        }
        self.streaming = None;
        self.printed = false;
    }
}

/// Prints a whole message in its role's colour.
pub fn print_message(message: &Message) {
    if message.errored {
        println!("{}", message.content.red());
        return;
    }
    match message.role {
        MessageRole::User => println!("{}", format!("> {}", message.content).green()),
        MessageRole::Assistant => {
            for line in message.content.lines() {
                println!("{}", line.bright_blue());
            }
        }
        MessageRole::System => println!("{}", message.content.yellow()),
    }
}
