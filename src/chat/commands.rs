//! Slash command parsing for the console.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing operators to control the session without sending messages to
//! the backend.

/// A parsed console command.
///
/// These commands control the console and are never transmitted.
#[derive(Debug, Clone, PartialEq)]
pub enum DeckCommand {
    /// Clear the conversation history display.
    Clear,

    /// Reconnect the streaming socket.
    Connect,

    /// Store a new access token.
    Key(String),

    /// Remove the stored access token.
    ClearKey,

    /// Show the masked access token.
    ShowKey,

    /// Show session status (connection, stream, history size).
    Status,

    /// Show the most recent diagnostic entries.
    Log(usize),

    /// Fetch and show the agent's memory history.
    Memory,

    /// Ask the backend to plan for a goal.
    Plan(String),

    /// Display help information.
    Help,

    /// Exit the console.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Default number of diagnostic entries shown by `/log`.
const DEFAULT_LOG_LINES: usize = 20;

/// Parses user input for slash commands.
///
/// Returns `Some(DeckCommand)` if the input is a command, or `None` if it
/// should be sent to the backend as a message.
///
/// # Examples
///
/// ```
/// # use agentdeck::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/key AIzaSyExampleExample").is_some());
/// assert!(parse_command("Install nginx").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<DeckCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => DeckCommand::Clear,
        "connect" => DeckCommand::Connect,
        "key" => match argument {
            Some(token) => DeckCommand::Key(token.to_string()),
            None => DeckCommand::Invalid("/key requires a token".to_string()),
        },
        "clearkey" => DeckCommand::ClearKey,
        "showkey" => DeckCommand::ShowKey,
        "status" | "stats" => DeckCommand::Status,
        "log" => match argument {
            Some(arg) => match arg.parse::<usize>() {
                Ok(lines) => DeckCommand::Log(lines),
                Err(_) => DeckCommand::Invalid("/log expects a positive integer".to_string()),
            },
            None => DeckCommand::Log(DEFAULT_LOG_LINES),
        },
        "memory" => DeckCommand::Memory,
        "plan" => match argument {
            Some(goal) => DeckCommand::Plan(goal.to_string()),
            None => DeckCommand::Invalid("/plan requires a goal".to_string()),
        },
        "help" | "?" => DeckCommand::Help,
        "quit" | "exit" | "q" => DeckCommand::Quit,
        _ => DeckCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    "Available commands:
  /help              Show this help
  /status            Show connection and stream state
  /log [n]           Show the last n diagnostic entries (default: 20)
  /memory            Show the agent's memory history
  /plan <goal>       Ask the backend to plan for a goal
  /key <token>       Store the backend access token
  /clearkey          Remove the stored access token
  /showkey           Show the stored token, masked
  /connect           Reconnect the streaming socket
  /clear             Clear the conversation display
  /quit              Exit"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(parse_command("Install nginx").is_none());
        assert!(parse_command("").is_none());
    }

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("/quit"), Some(DeckCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(DeckCommand::Quit));
        assert_eq!(parse_command("/help"), Some(DeckCommand::Help));
        assert_eq!(parse_command("/status"), Some(DeckCommand::Status));
        assert_eq!(parse_command("/connect"), Some(DeckCommand::Connect));
        assert_eq!(parse_command("/clear"), Some(DeckCommand::Clear));
    }

    #[test]
    fn parses_key_command() {
        assert_eq!(
            parse_command("/key AIzaSyExampleExample"),
            Some(DeckCommand::Key("AIzaSyExampleExample".to_string()))
        );
        assert!(matches!(
            parse_command("/key"),
            Some(DeckCommand::Invalid(_))
        ));
    }

    #[test]
    fn parses_log_command() {
        assert_eq!(parse_command("/log"), Some(DeckCommand::Log(20)));
        assert_eq!(parse_command("/log 5"), Some(DeckCommand::Log(5)));
        assert!(matches!(
            parse_command("/log five"),
            Some(DeckCommand::Invalid(_))
        ));
    }

    #[test]
    fn parses_plan_command() {
        assert_eq!(
            parse_command("/plan install nginx and start it"),
            Some(DeckCommand::Plan("install nginx and start it".to_string()))
        );
        assert!(matches!(
            parse_command("/plan"),
            Some(DeckCommand::Invalid(_))
        ));
        assert_eq!(parse_command("/memory"), Some(DeckCommand::Memory));
    }

    #[test]
    fn unknown_command_is_invalid() {
        assert!(matches!(
            parse_command("/model sonnet"),
            Some(DeckCommand::Invalid(_))
        ));
    }

    #[test]
    fn commands_are_case_insensitive() {
        assert_eq!(parse_command("/QUIT"), Some(DeckCommand::Quit));
        assert_eq!(parse_command("  /Status  "), Some(DeckCommand::Status));
    }
}
