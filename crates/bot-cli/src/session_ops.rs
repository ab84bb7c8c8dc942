use std::io::{self, Write};
use std::sync::Arc;

use bot_api::{create_engine_from_file, CreateEngineOptions};
use bot_core::{BotScriptError, OutboundMessage};
use bot_runtime::{ConversationEngine, HttpSubmissionSink, JsonFileSessionStore, SessionStore};
use tracing::info;

use crate::{map_cli_io, map_cli_json, SendArgs};

pub(crate) struct SessionEngine {
    pub(crate) engine: ConversationEngine,
    pub(crate) sink: Arc<HttpSubmissionSink>,
}

pub(crate) fn create_session_engine(
    bot: &str,
    store: Arc<dyn SessionStore>,
    seed: Option<u32>,
) -> Result<SessionEngine, BotScriptError> {
    let sink = Arc::new(HttpSubmissionSink::default());
    let engine = create_engine_from_file(
        bot,
        CreateEngineOptions {
            store: Some(store),
            submission_sink: Some(sink.clone()),
            random_seed: seed,
            ..CreateEngineOptions::default()
        },
    )?;
    Ok(SessionEngine { engine, sink })
}

pub(crate) async fn run_send(args: SendArgs) -> Result<i32, BotScriptError> {
    let store = Arc::new(JsonFileSessionStore::open(&args.state_file)?);
    let SessionEngine { engine, sink } = create_session_engine(&args.bot, store, args.seed)?;

    let event = args.event.into_event();
    info!(session = %args.session, script = %engine.script().id, "send");
    let messages = engine.handle(&args.session, event).await;
    sink.flush().await;

    let mut stdout = io::stdout();
    writeln!(stdout, "RESULT:OK").map_err(map_cli_io)?;
    write_messages(&mut stdout, &messages)?;
    writeln!(stdout, "STATE_FILE:{}", args.state_file).map_err(map_cli_io)?;
    Ok(0)
}

pub(crate) fn write_messages(
    writer: &mut dyn Write,
    messages: &[OutboundMessage],
) -> Result<(), BotScriptError> {
    for message in messages {
        let payload = serde_json::to_string(message).map_err(map_cli_json)?;
        writeln!(writer, "MESSAGE_JSON:{}", payload).map_err(map_cli_io)?;
    }
    Ok(())
}
