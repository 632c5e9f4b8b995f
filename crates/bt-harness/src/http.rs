use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::skill::{
    ChainRequest, ChainResponse, ConversationRequest, ConversationResponse,
    ConversationalExecutor, DelegationRequest, DelegationResponse, Result, SkillError,
    SkillExecutor, SkillRequest, SkillResponse, SkillStream, SkillStreamEvent,
};

// ---------------------------------------------------------------------------
// HttpSkillExecutor
// ---------------------------------------------------------------------------

/// JSON-over-HTTP executor.
///
/// Endpoints, relative to `base_url`:
/// - `POST /skills/execute`  → [`SkillResponse`]
/// - `POST /skills/stream`   → newline-delimited [`SkillStreamEvent`]s
/// - `POST /skills/chain`    → [`ChainResponse`]
/// - `POST /skills/delegate` → [`DelegationResponse`]
/// - `POST /chat`            → [`ConversationResponse`]
pub struct HttpSkillExecutor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSkillExecutor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Read the bearer token from `env_var`, if set and non-empty.
    pub fn with_api_key_env(mut self, env_var: &str) -> Self {
        self.api_key = std::env::var(env_var).ok().filter(|k| !k.is_empty());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.post(url);
        match self.api_key {
            Some(ref key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, path: &str, body: &(impl Serialize + Sync)) -> Result<reqwest::Response> {
        debug!(path, "skill executor request");
        let resp = self.post(path).json(body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(SkillError::Api { status, message });
        }
        Ok(resp)
    }

    async fn post_json<T: DeserializeOwned + Send>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T> {
        let resp = self.send(path, body).await?;
        resp.json::<T>()
            .await
            .map_err(|e| SkillError::Parse(e.to_string()))
    }
}

#[async_trait]
impl SkillExecutor for HttpSkillExecutor {
    async fn execute(&self, request: &SkillRequest) -> Result<SkillResponse> {
        self.post_json("/skills/execute", request).await
    }

    async fn stream(&self, request: &SkillRequest) -> Result<SkillStream> {
        let resp = self.send("/skills/stream", request).await?;
        Ok(ndjson_events(resp.bytes_stream()))
    }

    async fn execute_chain(&self, request: &ChainRequest) -> Result<ChainResponse> {
        self.post_json("/skills/chain", request).await
    }

    async fn execute_delegation(&self, request: &DelegationRequest) -> Result<DelegationResponse> {
        self.post_json("/skills/delegate", request).await
    }
}

#[async_trait]
impl ConversationalExecutor for HttpSkillExecutor {
    async fn converse(&self, request: &ConversationRequest) -> Result<ConversationResponse> {
        self.post_json("/chat", request).await
    }
}

// ---------------------------------------------------------------------------
// NDJSON decoding
// ---------------------------------------------------------------------------

/// Decode one line of a newline-delimited event stream. Blank lines yield `None`.
pub fn parse_event_line(line: &[u8]) -> Option<Result<SkillStreamEvent>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).map_err(|e| SkillError::Parse(e.to_string())))
}

/// Turn a byte stream into a stream of events, splitting on `\n`.
pub fn ndjson_events<S, B, E>(bytes: S) -> SkillStream
where
    S: futures_util::Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<SkillError> + Send + 'static,
{
    struct State<S> {
        bytes: std::pin::Pin<Box<S>>,
        buf: Vec<u8>,
        finished: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        buf: Vec::new(),
        finished: false,
    };

    let events = futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buf.drain(..=pos).collect();
                match parse_event_line(&line) {
                    Some(item) => return Some((item, state)),
                    None => continue,
                }
            }
            if state.finished {
                let rest = std::mem::take(&mut state.buf);
                return parse_event_line(&rest).map(|item| (item, state));
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => state.buf.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    state.buf.clear();
                    return Some((Err(e.into()), state));
                }
                None => state.finished = true,
            }
        }
    });
    Box::pin(events)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
