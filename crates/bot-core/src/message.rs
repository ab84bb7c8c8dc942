use serde::{Deserialize, Serialize};

/// Platform-neutral instruction for the transport to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum OutboundMessage {
    Text { text: String },
    Buttons { title: String, buttons: Vec<Button> },
    #[serde(rename_all = "camelCase")]
    Attachment { attachment_type: String, url: String },
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub title: String,
    pub action: ButtonAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ButtonAction {
    Postback {
        payload: String,
    },
    #[serde(rename_all = "camelCase")]
    WebUrl {
        url: String,
        embed_ratio: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InboundEvent {
    OptIn,
    Message {
        text: String,
        attachments: Vec<String>,
    },
    Postback {
        payload: String,
    },
}

impl InboundEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Message {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn postback(payload: impl Into<String>) -> Self {
        Self::Postback {
            payload: payload.into(),
        }
    }
}
