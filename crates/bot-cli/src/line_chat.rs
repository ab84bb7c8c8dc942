use std::io::{self, BufRead, Write};
use std::sync::Arc;

use bot_core::{BotScriptError, Button, ButtonAction, InboundEvent, OutboundMessage};
use bot_runtime::{ConversationEngine, JsonFileSessionStore, MemorySessionStore, SessionStore};

use crate::{create_session_engine, map_cli_io, ChatArgs, SessionEngine};

const HELP_LINE: &str = "commands: :start :go <payload> :attach <url> :help :quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineCommand {
    Send(InboundEvent),
    Open(String),
    Help,
    Quit,
    Invalid(String),
}

pub(crate) async fn run_chat(args: ChatArgs) -> Result<i32, BotScriptError> {
    let store: Arc<dyn SessionStore> = match &args.state_file {
        Some(path) => Arc::new(JsonFileSessionStore::open(path)?),
        None => Arc::new(MemorySessionStore::new()),
    };
    let SessionEngine { engine, sink } = create_session_engine(&args.bot, store, args.seed)?;

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut writer = io::stdout();
    let code = run_chat_with_io(&engine, &args.session, &mut reader, &mut writer).await;
    sink.flush().await;
    code
}

pub(crate) async fn run_chat_with_io(
    engine: &ConversationEngine,
    session: &str,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<i32, BotScriptError> {
    writeln!(writer, "botscript chat: {}", engine.script().id).map_err(map_cli_io)?;
    writeln!(writer, "{}", HELP_LINE).map_err(map_cli_io)?;

    let mut buttons: Vec<Button> = Vec::new();
    loop {
        let Some(raw) = prompt_input_from("> ", reader, writer)? else {
            return Ok(0);
        };
        let event = match parse_line(&raw, &buttons) {
            LineCommand::Send(event) => event,
            LineCommand::Open(url) => {
                writeln!(writer, "open: {}", url).map_err(map_cli_io)?;
                continue;
            }
            LineCommand::Help => {
                writeln!(writer, "{}", HELP_LINE).map_err(map_cli_io)?;
                continue;
            }
            LineCommand::Quit => {
                writeln!(writer, "bye").map_err(map_cli_io)?;
                return Ok(0);
            }
            LineCommand::Invalid(reason) => {
                writeln!(writer, "? {}", reason).map_err(map_cli_io)?;
                continue;
            }
        };

        let messages = engine.handle(session, event).await;
        if let Some(latest) = latest_buttons(&messages) {
            buttons = latest;
        }
        render_messages(writer, &messages)?;
    }
}

/// Numbers pick one of the most recently shown buttons, 1-based.
pub(crate) fn parse_line(raw: &str, buttons: &[Button]) -> LineCommand {
    let line = raw.trim();
    match line {
        ":quit" => return LineCommand::Quit,
        ":help" => return LineCommand::Help,
        ":start" => return LineCommand::Send(InboundEvent::OptIn),
        _ => {}
    }
    if let Some(payload) = line.strip_prefix(":go ") {
        return LineCommand::Send(InboundEvent::postback(payload.trim()));
    }
    if let Some(url) = line.strip_prefix(":attach ") {
        return LineCommand::Send(InboundEvent::Message {
            text: String::new(),
            attachments: vec![url.trim().to_string()],
        });
    }
    if line.starts_with(':') {
        return LineCommand::Invalid(format!("unknown command {}", line));
    }
    if let Ok(number) = line.parse::<usize>() {
        if let Some(button) = number.checked_sub(1).and_then(|index| buttons.get(index)) {
            return match &button.action {
                ButtonAction::Postback { payload } => {
                    LineCommand::Send(InboundEvent::postback(payload.clone()))
                }
                ButtonAction::WebUrl { url, .. } => LineCommand::Open(url.clone()),
            };
        }
    }
    LineCommand::Send(InboundEvent::text(line))
}

fn latest_buttons(messages: &[OutboundMessage]) -> Option<Vec<Button>> {
    messages.iter().rev().find_map(|message| match message {
        OutboundMessage::Buttons { buttons, .. } => Some(buttons.clone()),
        _ => None,
    })
}

pub(crate) fn render_messages(
    writer: &mut dyn Write,
    messages: &[OutboundMessage],
) -> Result<(), BotScriptError> {
    for message in messages {
        match message {
            OutboundMessage::Text { text } => writeln!(writer, "{}", text),
            OutboundMessage::Buttons { title, buttons } => {
                writeln!(writer, "{}", title).map_err(map_cli_io)?;
                buttons.iter().enumerate().try_for_each(|(index, button)| {
                    writeln!(writer, "  [{}] {}", index + 1, button.title)
                })
            }
            OutboundMessage::Attachment {
                attachment_type,
                url,
            } => writeln!(writer, "[{}] {}", attachment_type, url),
        }
        .map_err(map_cli_io)?;
    }
    Ok(())
}

fn prompt_input_from(
    prefix: &str,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<Option<String>, BotScriptError> {
    write!(writer, "{}", prefix).map_err(map_cli_io)?;
    writer.flush().map_err(map_cli_io)?;
    let mut input = String::new();
    let read = reader.read_line(&mut input).map_err(map_cli_io)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(
        input.trim_end_matches(&['\r', '\n'][..]).to_string(),
    ))
}
