//! Main chat loop orchestration.
//!
//! Reads lines, dispatches slash commands, and runs one streamed turn at a
//! time against the relay. Every delta is printed, appended to the trailing
//! assistant message, and re-extracted; extraction results pass through two
//! debounce windows (extraction, then preview refresh) before the preview
//! file is rewritten.

use std::io::Write;
use std::time::Duration;

use console::style;
use rustyline_async::SharedWriter;
use tokio_util::sync::CancellationToken;

use fencecast_core::artifact::ArtifactExtractor;
use fencecast_core::chat::{Conversation, TurnConsumer};
use fencecast_core::publish::{ArtifactPublisher, Debouncer, TurnClock};
use fencecast_infra::client::RelayClient;
use fencecast_types::config::ClientConfig;
use fencecast_types::error::TurnError;
use fencecast_types::message::{ChatStreamRequest, MessageRole};

use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::preview::PreviewFile;

/// Characters of each message shown by `/history`.
const HISTORY_PREVIEW_CHARS: usize = 100;

/// Everything one chat session needs between turns.
struct ChatSession {
    client: RelayClient,
    extractor: ArtifactExtractor,
    conversation: Conversation,
    publisher: ArtifactPublisher,
    model: Option<String>,
}

pub async fn run_chat(config: ClientConfig) -> anyhow::Result<()> {
    let client = RelayClient::new(&config)?;
    let extractor = ArtifactExtractor::new(&config.artifact_language)?;
    let clock = TurnClock::new();

    let preview_file = PreviewFile::new(&config.preview_path);
    preview_file.refresh("");
    let preview = {
        let file = preview_file.clone();
        Debouncer::spawn(
            "preview",
            Duration::from_millis(config.preview_refresh_ms),
            clock.clone(),
            move |_, body: String| file.refresh(&body),
        )
    };
    let forward = preview.sender();
    let extraction = Debouncer::spawn(
        "extraction",
        Duration::from_millis(config.extract_debounce_ms),
        clock.clone(),
        move |turn, body| forward.publish(turn, body),
    );

    let mut session = ChatSession {
        client,
        extractor,
        conversation: Conversation::new(Some(config.system_prompt.as_str()), clock),
        publisher: ArtifactPublisher::new(extraction),
        model: config.model.clone(),
    };

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut input, mut out) = ChatInput::new(prompt)
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    let _ = writeln!(out);
    let _ = writeln!(out, "  {} fencecast chat -> {}", style("*").cyan().bold(), style(session.client.url()).cyan());
    let _ = writeln!(
        out,
        "  {}",
        style(format!(
            "model: {} | preview: {} | /help for commands",
            session.model.as_deref().unwrap_or("relay default"),
            preview_file.path().display()
        ))
        .dim()
    );
    let _ = writeln!(out);

    loop {
        match input.read_line().await {
            InputEvent::Eof => break,
            InputEvent::Interrupted => {
                let _ = writeln!(out, "  {}", style("Press Ctrl+D to exit, or keep chatting.").dim());
            }
            InputEvent::Line(text) if text.is_empty() => {}
            InputEvent::Line(text) => {
                if let Some(cmd) = commands::parse(&text) {
                    if !session.handle_command(cmd, &mut input, &mut out) {
                        break;
                    }
                    continue;
                }
                session.run_turn(&text, &mut out).await;
            }
        }
    }

    let _ = writeln!(out, "\n  {}", style("Session ended.").dim());
    input.flush();

    // Drain pending artifacts in pipeline order.
    session.publisher.shutdown().await;
    preview.shutdown().await;
    Ok(())
}

impl ChatSession {
    /// Returns `false` when the loop should exit.
    fn handle_command(&mut self, cmd: ChatCommand, input: &mut ChatInput, out: &mut SharedWriter) -> bool {
        match cmd {
            ChatCommand::Help => commands::print_help(out),
            ChatCommand::Clear => match self.conversation.clear() {
                Ok(()) => input.clear(),
                Err(e) => {
                    let _ = writeln!(out, "  {} {e}", style("!").yellow().bold());
                }
            },
            ChatCommand::History => self.print_history(out),
            ChatCommand::Model(None) => {
                let _ = writeln!(
                    out,
                    "  model: {}",
                    style(self.model.as_deref().unwrap_or("relay default")).cyan()
                );
            }
            ChatCommand::Model(Some(model)) => {
                let _ = writeln!(out, "  {} model set to {}", style("*").cyan().bold(), style(&model).cyan());
                self.model = Some(model);
            }
            ChatCommand::Exit => return false,
            ChatCommand::Unknown(name) => {
                let _ = writeln!(
                    out,
                    "  {} Unknown command: {}. Type /help for available commands.",
                    style("?").yellow().bold(),
                    style(name).dim()
                );
            }
        }
        true
    }

    fn print_history(&self, out: &mut SharedWriter) {
        let _ = writeln!(out);
        for message in self.conversation.messages() {
            let label = match message.role {
                MessageRole::User => style("You").green(),
                MessageRole::Assistant => style("Assistant").cyan(),
                MessageRole::System => style("System").dim(),
            };
            let content = message.snippet(HISTORY_PREVIEW_CHARS).replace('\n', " ");
            let _ = writeln!(out, "  {} {}", label.bold(), content);
        }
        let _ = writeln!(out);
    }

    async fn run_turn(&mut self, text: &str, out: &mut SharedWriter) {
        let (turn, history) = match self.conversation.begin_turn(text) {
            Ok(started) => started,
            Err(e) => {
                let _ = writeln!(out, "  {} {e}", style("!").yellow().bold());
                return;
            }
        };

        let request = ChatStreamRequest {
            messages: history,
            model: self.model.clone().map(serde_json::Value::String),
        };

        let spinner = indicatif::ProgressBar::new_spinner();
        if let Ok(spinner_style) = indicatif::ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(spinner_style);
        }
        spinner.set_message("thinking...");
        spinner.enable_steady_tick(Duration::from_millis(80));

        let stream = match self.client.open_turn(&request, CancellationToken::new()).await {
            Ok(stream) => stream,
            Err(e) => {
                spinner.finish_and_clear();
                let outcome = TurnConsumer::new(turn, self.extractor.clone()).abort(&mut self.publisher, e);
                if let Some(e) = &outcome.error {
                    self.fail_turn(e, out);
                }
                return;
            }
        };

        let conversation = &mut self.conversation;
        let mut started = false;
        let outcome = TurnConsumer::new(turn, self.extractor.clone())
            .run(stream, &mut self.publisher, |delta| {
                if !started {
                    spinner.finish_and_clear();
                    let _ = write!(out, "\n  {} ", style("Assistant").cyan().bold());
                    started = true;
                }
                let _ = write!(out, "{delta}");
                conversation.append_delta(delta);
            })
            .await;
        spinner.finish_and_clear();
        let _ = writeln!(out);

        if let Some(e) = &outcome.error {
            self.fail_turn(e, out);
            return;
        }
        if let Some(artifact) = &outcome.artifact {
            let _ = writeln!(
                out,
                "  {}",
                style(format!("artifact: {} bytes of {}", artifact.body.len(), artifact.language)).dim()
            );
        }
        let _ = writeln!(out);
        self.conversation.end_turn();
    }

    fn fail_turn(&mut self, error: &TurnError, out: &mut SharedWriter) {
        tracing::warn!(error = %error, "turn failed");
        let _ = writeln!(out, "  {} {error}", style("!").red().bold());
        let _ = writeln!(out, "  {}", style("Type a message to retry, /exit to quit.").dim());
        let _ = writeln!(out);
        self.conversation.annotate_error(error);
        self.conversation.end_turn();
    }
}
