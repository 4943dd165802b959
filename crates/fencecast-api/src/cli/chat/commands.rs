//! Slash commands for the chat loop.

use std::io::Write;

use console::style;

#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    Help,
    /// Reset the conversation (system prompt kept) and the screen.
    Clear,
    History,
    /// Show the current model, or switch to another one.
    Model(Option<String>),
    Exit,
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd.to_lowercase(), Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (trimmed.to_lowercase(), None),
    };

    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/clear" | "/cls" => Some(ChatCommand::Clear),
        "/history" => Some(ChatCommand::History),
        "/model" => Some(ChatCommand::Model(arg.map(str::to_string))),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

pub fn print_help(out: &mut impl Write) {
    let rows = [
        ("/help", "Show this help message"),
        ("/clear", "Start over (keeps the system prompt)"),
        ("/history", "Show the conversation so far"),
        ("/model [id]", "Show or switch the requested model"),
        ("/exit", "End the chat"),
    ];
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", style("Available commands:").bold());
    let _ = writeln!(out);
    for (cmd, what) in rows {
        let _ = writeln!(out, "  {:<14}{}", style(cmd).cyan(), what);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", style("Ctrl+D to exit").dim());
    let _ = writeln!(out);
}
