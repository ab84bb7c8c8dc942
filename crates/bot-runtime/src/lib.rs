mod compose;
mod delivery;
mod engine;
mod reply;
mod rng;
mod store;

pub use compose::{
    compose_url, HttpReplyComposer, ReplyComposer, COMPOSER_CONFIG_KEY, COMPOSE_BODY_LIMIT,
};
pub use delivery::{HttpSubmissionSink, NullSubmissionSink, Submission, SubmissionSink};
pub use engine::{
    ConversationEngine, EngineOptions, DEFAULT_FILE_RETRY_TEXT, DESCRIPTION_CONFIG_KEY,
    GET_STARTED_PAYLOAD,
};
pub use reply::ReplyResolver;
pub use rng::ReplyPicker;
pub use store::{
    JsonFileSessionStore, MemorySessionStore, SessionKeys, SessionStore, StoreSnapshot,
};

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;
    use bot_core::{BotScriptError, Script};

    use crate::{ReplyComposer, Submission, SubmissionSink};

    pub(crate) fn compile(source: &str) -> Script {
        bot_compiler::compile_script(source, "test").expect("script should compile")
    }

    pub(crate) fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!("botscript-rs-{}-{}", name, nanos))
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        submissions: Mutex<Vec<Submission>>,
    }

    impl RecordingSink {
        pub(crate) fn submissions(&self) -> Vec<Submission> {
            self.submissions.lock().expect("sink lock").clone()
        }
    }

    impl SubmissionSink for RecordingSink {
        fn deliver(&self, submission: Submission) {
            self.submissions.lock().expect("sink lock").push(submission);
        }
    }

    #[derive(Debug)]
    pub(crate) struct StaticComposer {
        result: Result<String, BotScriptError>,
        calls: Mutex<Vec<String>>,
    }

    impl StaticComposer {
        pub(crate) fn replying(body: &str) -> Self {
            Self {
                result: Ok(body.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(error: BotScriptError) -> Self {
            Self {
                result: Err(error),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("composer lock").clone()
        }
    }

    #[async_trait]
    impl ReplyComposer for StaticComposer {
        async fn compose(&self, url: &str) -> Result<String, BotScriptError> {
            self.calls.lock().expect("composer lock").push(url.to_string());
            self.result.clone()
        }
    }
}
