//! Interactive console for the agent command-deck backend.
//!
//! This binary provides a streaming REPL over the backend's chat socket.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage against the local development backend
//! agentdeck-chat
//!
//! # Point at a deployed backend
//! agentdeck-chat --origin https://deck.example.com
//!
//! # Override the socket URL entirely
//! agentdeck-chat --stream-url wss://deck.example.com/chat
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/status` - Show connection and stream state
//! - `/log [n]` - Show recent diagnostic entries
//! - `/key <token>` - Store the backend access token
//! - `/connect` - Reconnect the streaming socket
//! - `/quit` - Exit the console

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{Mutex, mpsc};

use agentdeck::chat::{DeckArgs, DeckCommand, DeckConfig, help_text, parse_command};
use agentdeck::credential::mask_token;
use agentdeck::session::{ChatSession, ConnectionState, StreamState};
use agentdeck::transport::{Connector, SessionDriver, SessionHandle, SessionNotice, WsConnector};
use agentdeck::utils::time::format_rfc3339;
use agentdeck::{CredentialStore, Deck, FileCredentialStore};

/// Main entry point for the agentdeck-chat console.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = DeckArgs::from_command_line_relaxed("agentdeck-chat [OPTIONS]");
    let config = DeckConfig::from_args(args)?;

    let store: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::open(&config.credential_file)?);
    if !store.is_configured() {
        if let Ok(token) = std::env::var("AGENTDECK_TOKEN") {
            if let Err(err) = store.set(&token) {
                eprintln!("Ignoring AGENTDECK_TOKEN: {err}");
            }
        }
    }

    let session = Arc::new(Mutex::new(ChatSession::with_config(
        Arc::clone(&store),
        config.session.clone(),
    )));
    let connector: Arc<dyn Connector> = Arc::new(WsConnector);
    let deck = Deck::with_options(config.rest_base.clone(), None)?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    let (mut handle, mut notices) =
        SessionDriver::spawn(Arc::clone(&session), Arc::clone(&connector));

    println!("Command Deck console");
    println!("Type /help for commands, /quit to exit\n");

    let mut rl = DefaultEditor::new()?;

    loop {
        drain_notices(&mut notices);
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        DeckCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        DeckCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        DeckCommand::Clear => {
                            // Clears the terminal; the session history itself
                            // is append-only.
                            print!("\x1b[2J\x1b[H");
                            let _ = std::io::stdout().flush();
                        }
                        DeckCommand::Key(token) => match store.set(&token) {
                            Ok(()) => {
                                println!("Access token stored.");
                                respawn_if_needed(
                                    &session,
                                    &connector,
                                    &mut handle,
                                    &mut notices,
                                )
                                .await;
                            }
                            Err(err) => eprintln!("{err}"),
                        },
                        DeckCommand::ClearKey => match store.clear() {
                            Ok(()) => println!("Access token removed."),
                            Err(err) => eprintln!("{err}"),
                        },
                        DeckCommand::ShowKey => match store.get() {
                            Some(token) => println!("Access token: {}", mask_token(&token)),
                            None => println!("Access token: (none)"),
                        },
                        DeckCommand::Connect => {
                            respawn_if_needed(&session, &connector, &mut handle, &mut notices)
                                .await;
                        }
                        DeckCommand::Status => {
                            print_status(&session).await;
                        }
                        DeckCommand::Log(lines) => {
                            print_log(&session, lines).await;
                        }
                        DeckCommand::Memory => {
                            print_memory(&deck).await;
                        }
                        DeckCommand::Plan(goal) => {
                            print_plan(&deck, &goal).await;
                        }
                        DeckCommand::Invalid(message) => {
                            eprintln!("{message}");
                        }
                    }
                    continue;
                }

                // Regular message - send over the socket
                if handle.send(line).await {
                    println!("Agent:");
                    stream_response(&mut notices, &interrupted).await;
                } else {
                    explain_rejected_send(&session).await;
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Input error: {}", err);
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

/// Prints queued connection notices without blocking.
fn drain_notices(notices: &mut mpsc::UnboundedReceiver<SessionNotice>) {
    while let Ok(notice) = notices.try_recv() {
        match notice {
            SessionNotice::Connected => println!("(connected)"),
            SessionNotice::Disconnected => println!("(disconnected)"),
            SessionNotice::Reconnecting(delay) => {
                println!("(reconnecting in {}ms)", delay.as_millis())
            }
            SessionNotice::CredentialRequired => {
                println!("Setup required: store a token with /key <token>, then /connect.")
            }
            SessionNotice::Fragment(_)
            | SessionNotice::Finalized(_)
            | SessionNotice::Failed(_) => {}
        }
    }
}

/// Streams one response to the terminal until it finalizes or fails.
async fn stream_response(
    notices: &mut mpsc::UnboundedReceiver<SessionNotice>,
    interrupted: &Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Some(SessionNotice::Fragment(content)) => {
                    print!("{content}");
                    let _ = std::io::stdout().flush();
                }
                Some(SessionNotice::Finalized(message)) => {
                    println!();
                    if let Some(trace_id) = &message.trace_id {
                        println!("  (trace: {trace_id})");
                    }
                    return;
                }
                Some(SessionNotice::Failed(error)) => {
                    println!();
                    eprintln!("Backend error: {error}");
                    return;
                }
                Some(SessionNotice::Disconnected) => {
                    println!();
                    eprintln!("Connection lost; partial response kept.");
                    return;
                }
                Some(SessionNotice::Reconnecting(delay)) => {
                    println!("(reconnecting in {}ms)", delay.as_millis());
                }
                Some(SessionNotice::Connected) => {}
                Some(SessionNotice::CredentialRequired) => {
                    eprintln!("Setup required: store a token with /key <token>.");
                    return;
                }
                None => {
                    eprintln!("Session ended.");
                    return;
                }
            },
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if interrupted.load(Ordering::Relaxed) {
                    println!();
                    eprintln!("(output detached; the stream continues in the session)");
                    return;
                }
            }
        }
    }
}

/// Restarts the driver when the previous one has exited (credential setup,
/// exhausted retries).
async fn respawn_if_needed(
    session: &Arc<Mutex<ChatSession>>,
    connector: &Arc<dyn Connector>,
    handle: &mut SessionHandle,
    notices: &mut mpsc::UnboundedReceiver<SessionNotice>,
) {
    if handle.is_live() {
        println!("Already connected.");
        return;
    }
    let (new_handle, new_notices) =
        SessionDriver::spawn(Arc::clone(session), Arc::clone(connector));
    let old = std::mem::replace(handle, new_handle);
    old.shutdown().await;
    *notices = new_notices;
}

async fn print_status(session: &Arc<Mutex<ChatSession>>) {
    let guard = session.lock().await;
    let connection = match guard.connection_state() {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
        ConnectionState::CredentialRequired => "setup required",
    };
    let stream = match guard.stream_state() {
        StreamState::Idle => "idle",
        StreamState::Streaming => "streaming",
    };
    println!("    Session Status:");
    println!("      Connection: {}", connection);
    println!("      Stream: {}", stream);
    println!("      Messages: {}", guard.history().len());
    match guard.pending_trace_id() {
        Some(trace_id) => println!("      Trace: {}", trace_id),
        None => println!("      Trace: (none)"),
    }
    println!("      Diagnostics: {} entries", guard.diagnostics().len());
}

async fn print_log(session: &Arc<Mutex<ChatSession>>, lines: usize) {
    let guard = session.lock().await;
    let total = guard.diagnostics().len();
    if total == 0 {
        println!("    No diagnostic entries yet.");
        return;
    }
    let skip = total.saturating_sub(lines);
    for entry in guard.diagnostics().iter().skip(skip) {
        println!("    {}", entry);
    }
}

async fn print_memory(deck: &Deck) {
    match deck.memory_history().await {
        Ok(records) => {
            if records.is_empty() {
                println!("    No memories recorded yet.");
                return;
            }
            for record in &records {
                println!(
                    "    [{}] {}: {}",
                    format_rfc3339(&record.timestamp),
                    record.kind,
                    record.content
                );
            }
            println!("    {} memories", records.len());
        }
        Err(err) => eprintln!("Memory fetch failed: {err}"),
    }
}

async fn print_plan(deck: &Deck, goal: &str) {
    match deck.create_plan(goal).await {
        Ok(plan) => {
            println!("    Goal: {}", plan.goal);
            for step in &plan.steps {
                println!("      #{} [{}] {}", step.id, step.tool, step.description);
            }
        }
        Err(err) => eprintln!("Planning failed: {err}"),
    }
}

async fn explain_rejected_send(session: &Arc<Mutex<ChatSession>>) {
    let guard = session.lock().await;
    match guard.connection_state() {
        ConnectionState::CredentialRequired => {
            eprintln!("Setup required: store a token with /key <token>, then /connect.");
        }
        ConnectionState::Disconnected | ConnectionState::Connecting => {
            eprintln!("Not connected; try /connect or wait for the reconnect.");
        }
        ConnectionState::Connected => {
            if guard.stream_state() == StreamState::Streaming {
                eprintln!("A response is still streaming; wait for it to finish.");
            } else {
                eprintln!("Message not sent.");
            }
        }
    }
}
