use async_trait::async_trait;
use bot_core::BotScriptError;
use url::form_urlencoded;

pub const COMPOSER_CONFIG_KEY: &str = "composer";
pub const COMPOSE_BODY_LIMIT: usize = 500 * 1024;

/// External service producing a free-text reply.
#[async_trait]
pub trait ReplyComposer: Send + Sync {
    async fn compose(&self, url: &str) -> Result<String, BotScriptError>;
}

/// Substitutes the first `%s` in `template` with the form-encoded text.
pub fn compose_url(template: &str, text: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(text.as_bytes()).collect();
    template.replacen("%s", &encoded, 1)
}

#[derive(Debug, Clone, Default)]
pub struct HttpReplyComposer {
    client: reqwest::Client,
}

impl HttpReplyComposer {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReplyComposer for HttpReplyComposer {
    async fn compose(&self, url: &str) -> Result<String, BotScriptError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| BotScriptError::new("COMPOSE_REQUEST", error.to_string()))?;

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|error| BotScriptError::new("COMPOSE_READ", error.to_string()))?
        {
            if append_capped(&mut body, &chunk, COMPOSE_BODY_LIMIT) {
                break;
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Appends as much of `chunk` as fits under `limit`; true once the body is full.
fn append_capped(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let remaining = limit.saturating_sub(body.len());
    body.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
    body.len() >= limit
}

#[cfg(test)]
mod compose_tests {
    use super::*;

    #[test]
    fn compose_url_encodes_text_into_first_placeholder() {
        assert_eq!(
            compose_url("http://c.local/reply?q=%s&r=%s", "how are you?"),
            "http://c.local/reply?q=how+are+you%3F&r=%s"
        );
        assert_eq!(compose_url("http://c.local/static", "x"), "http://c.local/static");
    }

    #[test]
    fn append_capped_truncates_body_at_limit() {
        let mut body = vec![b'a'; COMPOSE_BODY_LIMIT - 2];
        assert!(!append_capped(&mut body, b"b", COMPOSE_BODY_LIMIT));
        assert_eq!(body.len(), COMPOSE_BODY_LIMIT - 1);

        assert!(append_capped(&mut body, b"c", COMPOSE_BODY_LIMIT));
        assert_eq!(body.len(), COMPOSE_BODY_LIMIT);
        assert_eq!(body.last(), Some(&b'c'));

        assert!(append_capped(&mut body, b"dropped", COMPOSE_BODY_LIMIT));
        assert_eq!(body.len(), COMPOSE_BODY_LIMIT);
    }

    #[test]
    fn append_capped_keeps_only_the_head_of_an_oversized_chunk() {
        let mut body = b"head".to_vec();
        assert!(append_capped(&mut body, b"0123456789", 8));
        assert_eq!(body, b"head0123");

        let mut small = Vec::new();
        assert!(!append_capped(&mut small, b"hi", 8));
        assert_eq!(small, b"hi");
    }

    #[tokio::test]
    async fn http_composer_reports_unreachable_service() {
        let error = HttpReplyComposer::default()
            .compose("not a url")
            .await
            .expect_err("invalid url should fail");
        assert_eq!(error.code, "COMPOSE_REQUEST");
    }
}
