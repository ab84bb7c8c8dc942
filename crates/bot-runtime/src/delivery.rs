use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Answers collected for one form, keyed by each input's local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub session: String,
    pub form_id: String,
    pub action: String,
    pub fields: BTreeMap<String, String>,
}

/// Receives finished forms. `deliver` must return immediately; failures are
/// the sink's own business and never reach the conversation.
pub trait SubmissionSink: Send + Sync {
    fn deliver(&self, submission: Submission);
}

#[derive(Debug, Default)]
pub struct NullSubmissionSink;

impl SubmissionSink for NullSubmissionSink {
    fn deliver(&self, submission: Submission) {
        info!(
            form = %submission.form_id,
            fields = submission.fields.len(),
            "dropping submission"
        );
    }
}

/// Form-encoded POST to the form's action, on a detached task.
#[derive(Debug, Clone, Default)]
pub struct HttpSubmissionSink {
    client: reqwest::Client,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl HttpSubmissionSink {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            pending: Arc::default(),
        }
    }

    /// Waits for the deliveries spawned so far. Callers whose runtime is about
    /// to shut down use this so in-flight posts are not dropped.
    pub async fn flush(&self) {
        let handles = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        for handle in handles {
            if let Err(error) = handle.await {
                warn!(error = %error, "submission task aborted");
            }
        }
    }
}

impl SubmissionSink for HttpSubmissionSink {
    fn deliver(&self, submission: Submission) {
        if submission.action.is_empty() {
            warn!(form = %submission.form_id, "form has no action; submission skipped");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(form = %submission.form_id, "no async runtime; submission skipped");
            return;
        };

        let client = self.client.clone();
        let handle = runtime.spawn(async move {
            let result = client
                .post(&submission.action)
                .form(&submission.fields)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => info!(
                    form = %submission.form_id,
                    session = %submission.session,
                    "submission delivered"
                ),
                Ok(response) => warn!(
                    form = %submission.form_id,
                    status = %response.status(),
                    "submission rejected"
                ),
                Err(error) => warn!(
                    form = %submission.form_id,
                    error = %error,
                    "submission failed"
                ),
            }
        });
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|task| !task.is_finished());
            pending.push(handle);
        }
    }
}
