//! healthmate-chat - terminal front end for the HealthMate assistant
//!
//! A line-oriented REPL over the chat engine. Plain lines are sent as
//! messages (or as answers while a symptom assessment runs); lines
//! starting with `/` are commands. Ctrl-C cancels the exchange in flight.

use healthmate_assist::{
    Answer, CancelHandle, ChatErrorKind, ChatMode, ClientConfig, ConversationController,
    ConversationUpdate, HttpTransport, MessageRole, SessionId, SymptomAssessment, SymptomState,
};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Controller = ConversationController<HttpTransport>;

const HELP: &str = "\
Commands:
  /new             start a new session
  /sessions        list stored sessions
  /load <id>       switch to a stored session
  /delete <id>     delete a stored session
  /clear           reset the assistant's memory of this conversation
  /health          check the assistant service
  /check           start a guided symptom assessment
  /cancel          leave the symptom assessment
  /stream on|off   toggle streamed replies
  /help            show this help
  /quit            exit (Ctrl-D also works)
Ctrl-C cancels a reply in progress, or exits at the prompt.";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Say(String),
    New,
    Sessions,
    Load(String),
    Delete(String),
    Clear,
    Health,
    Check,
    Cancel,
    Stream(bool),
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Command::Say(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();
        let command = match (name, arg) {
            ("new", None) => Command::New,
            ("sessions", None) => Command::Sessions,
            ("load", Some(id)) => Command::Load(id.to_string()),
            ("delete", Some(id)) => Command::Delete(id.to_string()),
            ("clear", None) => Command::Clear,
            ("health", None) => Command::Health,
            ("check", None) => Command::Check,
            ("cancel", None) => Command::Cancel,
            ("stream", Some("on")) => Command::Stream(true),
            ("stream", Some("off")) => Command::Stream(false),
            ("help", None) => Command::Help,
            ("quit" | "exit", None) => Command::Quit,
            _ => Command::Invalid(line.to_string()),
        };
        Some(command)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ClientConfig::from_env()?;
    tracing::info!(
        base_url = %config.base_url,
        role = ?config.role,
        streaming = config.streaming,
        "Starting chat client"
    );

    let transport = Arc::new(HttpTransport::new(&config)?);
    let mut controller = ConversationController::from_config(transport, &config);
    let mut assessment = SymptomAssessment::new();
    let printer = tokio::spawn(render_updates(controller.subscribe()));

    println!("HealthMate assistant. Type a message, or /help for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&controller);

    loop {
        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let line = match next_input(&mut lines, interrupt).await? {
            Input::Line(line) => line,
            Input::Eof => break,
            Input::Interrupted => {
                println!();
                break;
            }
        };
        let Some(command) = Command::parse(&line) else {
            prompt(&controller);
            continue;
        };
        if command == Command::Quit {
            break;
        }
        run_command(command, &mut controller, &mut assessment).await;
        prompt(&controller);
    }

    drop(controller);
    let _ = printer.await;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "healthmate_assist=info".into());

    if std::env::var_os("HEALTHMATE_LOG_JSON").is_some() {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_command(
    command: Command,
    controller: &mut Controller,
    assessment: &mut SymptomAssessment,
) {
    let cancel = controller.cancel_handle();
    match command {
        Command::Say(text) if controller.mode() == ChatMode::Guided => {
            let answer = match_option(assessment.state(), &text);
            let result = interruptible(&cancel, assessment.answer(controller, answer)).await;
            match result {
                Ok(SymptomState::Completed) => println!("\n[assessment complete]"),
                Ok(_) => {}
                Err(e) => eprintln!("! {e}"),
            }
        }
        Command::Say(text) => {
            if let Err(e) = interruptible(&cancel, controller.send(&text)).await {
                if e.is_cancelled() {
                    println!("\n[cancelled]");
                } else if e.kind == ChatErrorKind::InvalidRequest {
                    eprintln!("! {e}");
                }
            }
        }
        Command::New => {
            *assessment = SymptomAssessment::new();
            controller.set_mode(ChatMode::FreeForm);
            match controller.create_session().await {
                Ok(id) => println!("[new session {id}]"),
                Err(e) => {
                    tracing::warn!(error = %e, "Server refused a new session, starting locally");
                    controller.new_session();
                    println!("[new conversation]");
                }
            }
        }
        Command::Sessions => match controller.directory().refresh().await {
            Ok(sessions) if sessions.is_empty() => println!("No stored sessions."),
            Ok(sessions) => {
                for session in sessions {
                    let marker = if controller.session_id() == Some(&session.id) {
                        '*'
                    } else {
                        ' '
                    };
                    println!(
                        "{marker} {}  {}  {}",
                        session.id,
                        session.last_active.as_deref().unwrap_or("-"),
                        session.display_preview()
                    );
                }
            }
            Err(e) => eprintln!("! {e}"),
        },
        Command::Load(id) => match controller.load_session(SessionId::new(id)).await {
            Ok(()) => {
                *assessment = SymptomAssessment::resume(controller);
            }
            Err(e) => eprintln!("! {e}"),
        },
        Command::Delete(id) => match controller.delete_session(&SessionId::new(id)).await {
            Ok(true) => {
                assessment.cancel(controller);
                println!("[deleted the active session]");
            }
            Ok(false) => println!("[deleted]"),
            Err(e) => eprintln!("! {e}"),
        },
        Command::Clear => match controller.clear_memory().await {
            Ok(()) => println!("[assistant memory cleared]"),
            Err(e) => eprintln!("! {e}"),
        },
        Command::Health => match controller.health().await {
            Ok(health) => {
                let service = health.service.as_deref().unwrap_or("assistant");
                if health.is_healthy() {
                    println!("{service} is up");
                } else {
                    eprintln!("! {service} reports {}", health.status);
                }
            }
            Err(e) => eprintln!("! {e}"),
        },
        Command::Check => {
            let result = interruptible(&cancel, assessment.start(controller)).await;
            if let Err(e) = result {
                eprintln!("! {e}");
            }
        }
        Command::Cancel => {
            if controller.mode() == ChatMode::Guided {
                assessment.cancel(controller);
                println!("[left the assessment]");
            } else {
                println!("Nothing to cancel.");
            }
        }
        Command::Stream(enabled) => {
            controller.set_streaming(enabled);
            println!("[streaming {}]", if enabled { "on" } else { "off" });
            if enabled && !controller.role().supports_streaming() {
                println!("[the {} role gets whole replies]", controller.role());
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Invalid(line) => eprintln!("Unknown command: {line} (try /help)"),
        Command::Quit => {}
    }
}

/// Offered option matching the input by number or text, else free text
fn match_option(state: &SymptomState, input: &str) -> Answer {
    let options = state.step().map(|s| s.options.as_slice()).unwrap_or_default();
    if let Ok(index) = input.parse::<usize>() {
        if let Some(option) = index.checked_sub(1).and_then(|i| options.get(i)) {
            return Answer::Option(option.clone());
        }
    }
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(input))
        .map_or_else(|| Answer::FreeText(input.to_string()), |o| Answer::Option(o.clone()))
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Next line from the user, unless `interrupt` resolves first
async fn next_input<R, I>(lines: &mut Lines<R>, interrupt: I) -> std::io::Result<Input>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    tokio::select! {
        () = interrupt => Ok(Input::Interrupted),
        line = lines.next_line() => Ok(line?.map_or(Input::Eof, Input::Line)),
    }
}

/// Run `fut`, cancelling the exchange in flight on Ctrl-C
async fn interruptible<F: Future>(cancel: &CancelHandle, fut: F) -> F::Output {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            output = &mut fut => return output,
            _ = tokio::signal::ctrl_c() => cancel.cancel(),
        }
    }
}

async fn render_updates(mut updates: broadcast::Receiver<ConversationUpdate>) {
    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Display fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let mut out = std::io::stdout().lock();
        match update {
            ConversationUpdate::MessageAppended { message } => {
                if message.role == MessageRole::Assistant && !message.streaming {
                    let _ = writeln!(out, "{}", message.content);
                    if let Some(guided) = message.guided.as_ref().filter(|g| g.is_follow_up) {
                        if let (Some(step), Some(total)) = (guided.symptom_step, guided.total_steps) {
                            let _ = writeln!(out, "  (step {step} of {total})");
                        }
                        for (i, option) in guided.options.iter().enumerate() {
                            let _ = writeln!(out, "  {}. {option}", i + 1);
                        }
                    }
                    if let Some(source) = &message.source {
                        let _ = writeln!(out, "  [{source}]");
                    }
                }
            }
            ConversationUpdate::TokenAppended { content, .. } => {
                let _ = write!(out, "{content}");
            }
            ConversationUpdate::SourceLabeled { .. }
            | ConversationUpdate::MessageDiscarded { .. } => {}
            ConversationUpdate::SessionAdopted { id } => {
                tracing::debug!(session_id = %id, "Session adopted");
            }
            ConversationUpdate::MessageFrozen { .. } => {
                let _ = writeln!(out);
            }
            ConversationUpdate::LogReplaced { session_id, messages } => {
                if let Some(id) = session_id {
                    let _ = writeln!(out, "-- session {id} --");
                }
                for message in messages {
                    let who = match message.role {
                        MessageRole::User => "you",
                        MessageRole::Assistant => "assistant",
                    };
                    let _ = writeln!(out, "{who}: {}", message.content);
                }
            }
            ConversationUpdate::Notice { message } => {
                let _ = writeln!(out);
                eprintln!("! {message}");
            }
        }
        let _ = out.flush();
    }
}

fn prompt(controller: &Controller) {
    let marker = match controller.mode() {
        ChatMode::FreeForm => ">",
        ChatMode::Guided => "symptoms>",
    };
    print!("{marker} ");
    let _ = std::io::stdout().flush();
}
