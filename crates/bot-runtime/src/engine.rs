use std::collections::BTreeMap;
use std::sync::Arc;

use bot_core::{
    Button, ButtonAction, Flow, Form, InboundEvent, Input, InputKind, LinkTarget,
    OutboundMessage, RouteScheme, RoutingToken, Script, PARAM_INPUT_PATH, PARAM_RESET,
    PARAM_SELECTED_OPTION_INDEX, PARAM_SRC_LINK_ID, PARAM_SRC_NAV_ID,
};
use tracing::{debug, info, warn};

use crate::compose::{HttpReplyComposer, ReplyComposer};
use crate::delivery::{HttpSubmissionSink, Submission, SubmissionSink};
use crate::reply::ReplyResolver;
use crate::rng::ReplyPicker;
use crate::store::{SessionKeys, SessionStore};

pub const GET_STARTED_PAYLOAD: &str = "get_started";
pub const DESCRIPTION_CONFIG_KEY: &str = "description";
pub const DEFAULT_FILE_RETRY_TEXT: &str = "Please, upload a valid file :)";

#[derive(Clone, Default)]
pub struct EngineOptions {
    pub submission_sink: Option<Arc<dyn SubmissionSink>>,
    pub composer: Option<Arc<dyn ReplyComposer>>,
    pub random_seed: Option<u32>,
    pub file_retry_text: Option<String>,
}

/// Per-session conversation state machine. Holds no session state itself:
/// every decision re-reads the store, so one engine serves any number of
/// concurrent sessions.
pub struct ConversationEngine {
    script: Arc<Script>,
    store: Arc<dyn SessionStore>,
    keys: SessionKeys,
    sink: Arc<dyn SubmissionSink>,
    resolver: ReplyResolver,
    file_retry_text: String,
}

impl ConversationEngine {
    pub fn new(script: Arc<Script>, store: Arc<dyn SessionStore>, options: EngineOptions) -> Self {
        let sink = options
            .submission_sink
            .unwrap_or_else(|| Arc::new(HttpSubmissionSink::default()));
        let composer = options
            .composer
            .unwrap_or_else(|| Arc::new(HttpReplyComposer::default()));
        let resolver = ReplyResolver::new(
            script.clone(),
            ReplyPicker::new(options.random_seed),
            composer,
        );
        Self {
            keys: SessionKeys::new(script.id.clone()),
            script,
            store,
            sink,
            resolver,
            file_retry_text: options
                .file_retry_text
                .unwrap_or_else(|| DEFAULT_FILE_RETRY_TEXT.to_string()),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Entry point for the transport: one inbound event in, messages out.
    pub async fn handle(&self, sessid: &str, event: InboundEvent) -> Vec<OutboundMessage> {
        debug!(session = %sessid, ?event, "inbound event");
        match event {
            InboundEvent::OptIn => self.greeting(),
            InboundEvent::Message { text, attachments } => {
                self.handle_message(sessid, &text, &attachments).await
            }
            InboundEvent::Postback { payload } => self.handle_postback(sessid, &payload).await,
        }
    }

    async fn handle_message(
        &self,
        sessid: &str,
        text: &str,
        attachments: &[String],
    ) -> Vec<OutboundMessage> {
        let Some(pending) = self.pending_input(sessid).await else {
            return self.resolver.resolve(text).await;
        };
        match &pending.kind {
            InputKind::Text => self.answer(sessid, pending, text).await,
            InputKind::File => match attachments.first() {
                Some(url) => self.answer(sessid, pending, url).await,
                None => vec![OutboundMessage::text(self.file_retry_text.clone())],
            },
            InputKind::Options | InputKind::Other(_) => self.render_input(pending),
        }
    }

    async fn handle_postback(&self, sessid: &str, payload: &str) -> Vec<OutboundMessage> {
        if payload == GET_STARTED_PAYLOAD {
            return self.greeting();
        }
        let token = match RoutingToken::parse(payload) {
            Ok(token) => token,
            Err(error) => {
                debug!(session = %sessid, error = %error, "unroutable postback");
                return vec![self.error()];
            }
        };
        if token.reset_requested() {
            self.reset(sessid).await;
        }

        match &token.scheme {
            RouteScheme::Nav => match self.script.flow(&token.host) {
                Some(flow) => self.present_flow(flow),
                None => {
                    debug!(flow = %token.host, "unknown flow");
                    vec![self.error()]
                }
            },
            RouteScheme::Form => match self.script.form(&token.host) {
                Some(form) => self.present_form(sessid, form).await,
                None => {
                    debug!(form = %token.host, "unknown form");
                    vec![self.error()]
                }
            },
            RouteScheme::Answer => self.handle_option_postback(sessid, &token).await,
            RouteScheme::Other(scheme) => {
                debug!(scheme = %scheme, "unsupported routing scheme");
                vec![self.error()]
            }
        }
    }

    async fn handle_option_postback(
        &self,
        sessid: &str,
        token: &RoutingToken,
    ) -> Vec<OutboundMessage> {
        let Some(pending) = self.pending_input(sessid).await else {
            return self.present_main_flow();
        };
        match &pending.kind {
            InputKind::Options => {
                // A button from an earlier prompt must not answer the current one.
                if token
                    .param(PARAM_INPUT_PATH)
                    .is_some_and(|path| path != pending.path)
                {
                    return self.render_input(pending);
                }
                let selected = token
                    .param(PARAM_SELECTED_OPTION_INDEX)
                    .and_then(|raw| raw.parse::<usize>().ok())
                    .and_then(|index| pending.options.get(index));
                match selected {
                    Some(option) => self.answer(sessid, pending, &option.key).await,
                    None => vec![self.error()],
                }
            }
            InputKind::File => vec![OutboundMessage::text(self.file_retry_text.clone())],
            InputKind::Text | InputKind::Other(_) => vec![self.error()],
        }
    }

    /// Optional `description` text followed by the entry flow.
    pub fn greeting(&self) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();
        if let Some(description) = self.script.config(DESCRIPTION_CONFIG_KEY) {
            messages.push(OutboundMessage::text(description));
        }
        messages.extend(self.present_main_flow());
        messages
    }

    /// Buttons for a persistent menu built from the entry flow.
    pub fn main_menu(&self) -> Vec<Button> {
        self.script
            .main_flow()
            .map(|flow| self.flow_buttons(flow))
            .unwrap_or_default()
    }

    fn present_main_flow(&self) -> Vec<OutboundMessage> {
        match self.script.main_flow() {
            Some(flow) => self.present_flow(flow),
            None => vec![self.error()],
        }
    }

    pub fn present_flow(&self, flow: &Flow) -> Vec<OutboundMessage> {
        vec![OutboundMessage::Buttons {
            title: flow.title.clone(),
            buttons: self.flow_buttons(flow),
        }]
    }

    fn flow_buttons(&self, flow: &Flow) -> Vec<Button> {
        flow.links
            .iter()
            .map(|link| {
                let action = match &link.target {
                    LinkTarget::External(url) => ButtonAction::WebUrl {
                        url: url.clone(),
                        embed_ratio: link.embed.then(|| link.ratio.clone()),
                    },
                    LinkTarget::Route(token) => ButtonAction::Postback {
                        payload: token
                            .clone()
                            .with_param(PARAM_SRC_NAV_ID, flow.id.clone())
                            .with_param(PARAM_SRC_LINK_ID, link.id.clone())
                            .with_param(PARAM_RESET, if link.reset { "yes" } else { "no" })
                            .to_payload(),
                    },
                };
                Button {
                    title: link.text.clone(),
                    action,
                }
            })
            .collect()
    }

    /// Emits the form title, then the pending input (or the form's first one),
    /// skipping inputs whose condition does not hold.
    pub async fn present_form(&self, sessid: &str, form: &Form) -> Vec<OutboundMessage> {
        let mut messages = vec![OutboundMessage::text(form.title.clone())];
        let Some(first) = form.first_input() else {
            return messages;
        };
        let current = match self.pending_input(sessid).await {
            Some(input) => input,
            None => {
                if !self.advance_pointer(sessid, &first.path).await {
                    return vec![self.error()];
                }
                first
            }
        };
        messages.extend(self.present_from(sessid, current).await);
        messages
    }

    /// Records the answer and moves on to the next visible input, or
    /// finalizes the form when none is left.
    pub async fn answer(&self, sessid: &str, input: &Input, value: &str) -> Vec<OutboundMessage> {
        self.record_answer(sessid, &input.path, value).await;
        match self.next_in_sequence(sessid).await {
            Some(next) => {
                if !self.advance_pointer(sessid, &next.path).await {
                    return vec![self.error()];
                }
                self.present_from(sessid, next).await
            }
            None => self.complete_form(sessid, input).await,
        }
    }

    // Each step derives "next" from the stored pointer rather than walking the
    // form in memory, so replaying after a crash lands on the same input.
    async fn present_from(&self, sessid: &str, start: &Input) -> Vec<OutboundMessage> {
        let mut current = start;
        loop {
            if self.is_visible(sessid, current).await {
                return self.render_input(current);
            }
            debug!(session = %sessid, input = %current.path, "skipping hidden input");
            match self.next_in_sequence(sessid).await {
                Some(next) => {
                    if !self.advance_pointer(sessid, &next.path).await {
                        return vec![self.error()];
                    }
                    current = next;
                }
                None => return self.complete_form(sessid, current).await,
            }
        }
    }

    async fn complete_form(&self, sessid: &str, last: &Input) -> Vec<OutboundMessage> {
        let Some(form) = self.script.form_of(last) else {
            return vec![self.error()];
        };
        self.finalize(sessid, form).await;
        vec![OutboundMessage::text(form.submit.clone())]
    }

    pub fn render_input(&self, input: &Input) -> Vec<OutboundMessage> {
        match &input.kind {
            InputKind::Text | InputKind::File => vec![OutboundMessage::text(input.title.clone())],
            InputKind::Options => vec![OutboundMessage::Buttons {
                title: input.title.clone(),
                buttons: input
                    .options
                    .iter()
                    .enumerate()
                    .map(|(index, option)| Button {
                        title: option.text.clone(),
                        action: ButtonAction::Postback {
                            payload: RoutingToken::answer(&input.namespace, &input.path, index)
                                .to_payload(),
                        },
                    })
                    .collect(),
            }],
            InputKind::Other(kind) => {
                warn!(input = %input.path, kind = %kind, "input type cannot be rendered");
                vec![self.error()]
            }
        }
    }

    pub async fn pending_input(&self, sessid: &str) -> Option<&Input> {
        let path = match self.store.get(&self.keys.pointer(sessid)).await {
            Ok(path) => path,
            Err(error) => {
                warn!(session = %sessid, error = %error, "pointer read failed");
                return None;
            }
        };
        if path.is_empty() {
            return None;
        }
        self.script.input(&path)
    }

    /// Empty `path` clears the pointer. Returns whether the store accepted it.
    pub async fn advance_pointer(&self, sessid: &str, path: &str) -> bool {
        let key = self.keys.pointer(sessid);
        let result = if path.is_empty() {
            self.store.delete(&key).await
        } else {
            self.store.set(&key, path).await
        };
        match result {
            Ok(()) => true,
            Err(error) => {
                warn!(session = %sessid, error = %error, "pointer write failed");
                false
            }
        }
    }

    /// Explicit reset: drops the pointer and every collected answer.
    pub async fn reset(&self, sessid: &str) -> bool {
        let answers_cleared = match self.store.hash_delete_all(&self.keys.answers(sessid)).await {
            Ok(()) => true,
            Err(error) => {
                warn!(session = %sessid, error = %error, "answers clear failed");
                false
            }
        };
        self.advance_pointer(sessid, "").await && answers_cleared
    }

    /// Follows declaration order from the indexed position of the pending
    /// input, so the pointer only ever moves forward.
    pub async fn next_in_sequence(&self, sessid: &str) -> Option<&Input> {
        let current = self.pending_input(sessid).await?;
        self.script.next_input(current)
    }

    pub async fn record_answer(&self, sessid: &str, path: &str, value: &str) -> bool {
        match self
            .store
            .hash_set(&self.keys.answers(sessid), path, value)
            .await
        {
            Ok(()) => true,
            Err(error) => {
                warn!(session = %sessid, error = %error, "answer write failed");
                false
            }
        }
    }

    pub async fn read_answer(&self, sessid: &str, path: &str) -> String {
        self.store
            .hash_get(&self.keys.answers(sessid), path)
            .await
            .unwrap_or_else(|error| {
                warn!(session = %sessid, error = %error, "answer read failed");
                String::new()
            })
    }

    /// Hands the collected answers to the submission sink and clears the
    /// session. The owning form comes from the answers themselves; `reached`
    /// covers a form finished without a single visible input.
    pub async fn finalize(&self, sessid: &str, reached: &Form) {
        let answers_key = self.keys.answers(sessid);
        let answers = self
            .store
            .hash_get_all(&answers_key)
            .await
            .unwrap_or_else(|error| {
                warn!(session = %sessid, error = %error, "answers read failed");
                BTreeMap::new()
            });

        let form = answers
            .keys()
            .find_map(|path| self.script.input(path))
            .and_then(|input| self.script.form_of(input))
            .unwrap_or(reached);
        let fields = answers
            .iter()
            .filter_map(|(path, value)| {
                self.script
                    .input(path)
                    .map(|input| (input.id.clone(), value.clone()))
            })
            .collect::<BTreeMap<_, _>>();

        info!(session = %sessid, form = %form.id, fields = fields.len(), "form finalized");
        self.sink.deliver(Submission {
            session: sessid.to_string(),
            form_id: form.id.clone(),
            action: form.action.clone(),
            fields,
        });

        if let Err(error) = self.store.hash_delete_all(&answers_key).await {
            warn!(session = %sessid, error = %error, "answers clear failed");
        }
        self.advance_pointer(sessid, "").await;
    }

    /// Fails closed when the condition names an input outside the form.
    pub async fn is_visible(&self, sessid: &str, input: &Input) -> bool {
        let Some(condition) = &input.condition else {
            return true;
        };
        let Some(left) = self
            .script
            .sibling_input(&input.namespace, &condition.left)
        else {
            debug!(input = %input.path, operand = %condition.left, "unresolved condition operand");
            return false;
        };
        let value = self.read_answer(sessid, &left.path).await;
        condition.holds_for(&value)
    }

    fn error(&self) -> OutboundMessage {
        OutboundMessage::text(self.script.error_text())
    }
}
