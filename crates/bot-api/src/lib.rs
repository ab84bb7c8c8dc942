use std::path::Path;
use std::sync::Arc;

use bot_compiler::{compile_script, compile_script_file};
use bot_core::{BotScriptError, Script};
use bot_runtime::{
    ConversationEngine, EngineOptions, MemorySessionStore, ReplyComposer, SessionStore,
    SubmissionSink,
};

#[derive(Clone, Default)]
pub struct CreateEngineOptions {
    /// Defaults to an in-process `MemorySessionStore`.
    pub store: Option<Arc<dyn SessionStore>>,
    pub submission_sink: Option<Arc<dyn SubmissionSink>>,
    pub composer: Option<Arc<dyn ReplyComposer>>,
    pub random_seed: Option<u32>,
    pub file_retry_text: Option<String>,
}

impl CreateEngineOptions {
    fn into_parts(self) -> (Arc<dyn SessionStore>, EngineOptions) {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySessionStore::new()));
        let options = EngineOptions {
            submission_sink: self.submission_sink,
            composer: self.composer,
            random_seed: self.random_seed,
            file_retry_text: self.file_retry_text,
        };
        (store, options)
    }
}

pub fn compile_script_from_xml(
    source: &str,
    fallback_id: &str,
) -> Result<Arc<Script>, BotScriptError> {
    compile_script(source, fallback_id).map(Arc::new)
}

pub fn compile_script_from_file(path: impl AsRef<Path>) -> Result<Arc<Script>, BotScriptError> {
    compile_script_file(path.as_ref()).map(Arc::new)
}

pub fn create_engine_from_xml(
    source: &str,
    fallback_id: &str,
    options: CreateEngineOptions,
) -> Result<ConversationEngine, BotScriptError> {
    let script = compile_script_from_xml(source, fallback_id)?;
    Ok(create_engine(script, options))
}

pub fn create_engine_from_file(
    path: impl AsRef<Path>,
    options: CreateEngineOptions,
) -> Result<ConversationEngine, BotScriptError> {
    let script = compile_script_from_file(path)?;
    Ok(create_engine(script, options))
}

pub fn create_engine(script: Arc<Script>, options: CreateEngineOptions) -> ConversationEngine {
    let (store, options) = options.into_parts();
    ConversationEngine::new(script, store, options)
}
