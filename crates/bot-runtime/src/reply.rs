use std::sync::Arc;

use bot_core::{OutboundMessage, ReplyTemplate, Script};
use tracing::{debug, warn};

use crate::compose::{compose_url, ReplyComposer, COMPOSER_CONFIG_KEY};
use crate::rng::ReplyPicker;

/// Free-text fallback when no form input is pending: canned template reply,
/// then the compose service, then the generic error text.
pub struct ReplyResolver {
    script: Arc<Script>,
    picker: ReplyPicker,
    composer: Arc<dyn ReplyComposer>,
}

impl ReplyResolver {
    pub fn new(script: Arc<Script>, picker: ReplyPicker, composer: Arc<dyn ReplyComposer>) -> Self {
        Self {
            script,
            picker,
            composer,
        }
    }

    pub async fn resolve(&self, text: &str) -> Vec<OutboundMessage> {
        if let Some(messages) = self.from_templates(text) {
            return messages;
        }
        if let Some(template) = self.script.config(COMPOSER_CONFIG_KEY) {
            return self.from_composer(template, text).await;
        }
        debug!("no template or composer for free text");
        vec![self.error()]
    }

    fn from_templates(&self, text: &str) -> Option<Vec<OutboundMessage>> {
        let template = self
            .script
            .templates
            .iter()
            .find(|template| !template.replies.is_empty() && template.is_match(text))?;
        Some(self.render_template(template))
    }

    fn render_template(&self, template: &ReplyTemplate) -> Vec<OutboundMessage> {
        let Some(reply) = template
            .replies
            .get(self.picker.pick(template.replies.len()))
        else {
            return vec![self.error()];
        };
        debug!(pattern = %template.pattern, "template reply");

        let mut messages = Vec::new();
        if let Some(label) = &reply.label {
            messages.push(OutboundMessage::text(label.clone()));
        }
        if let Some(attachment) = &reply.attachment {
            messages.push(OutboundMessage::Attachment {
                attachment_type: attachment.kind.clone(),
                url: attachment.source.clone(),
            });
        }
        messages
    }

    async fn from_composer(&self, template: &str, text: &str) -> Vec<OutboundMessage> {
        match self.composer.compose(&compose_url(template, text)).await {
            Ok(body) if !body.is_empty() => vec![OutboundMessage::text(body)],
            Ok(_) => {
                debug!("compose service returned an empty body");
                vec![self.error()]
            }
            Err(error) => {
                warn!(error = %error, "compose service failed");
                vec![self.error()]
            }
        }
    }

    fn error(&self) -> OutboundMessage {
        OutboundMessage::text(self.script.error_text())
    }
}
