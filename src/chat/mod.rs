//! Interactive console module for the command deck.
//!
//! This module backs the `agentdeck-chat` binary: a streaming REPL over the
//! chat socket with slash commands for credential management and
//! diagnostics.
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing and handling

mod commands;
mod config;

pub use commands::{DeckCommand, help_text, parse_command};
pub use config::{DeckArgs, DeckConfig};
