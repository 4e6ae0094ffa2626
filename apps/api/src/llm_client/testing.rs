//! Scripted transport for exercising the client without a network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::{GenerateContentRequest, GenerativeTransport, RawResponse, TransportFailure};

type Reply = Result<RawResponse, TransportFailure>;

/// Replays queued replies in order and records every request it receives.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(Instant, Value)>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn ok(body: &str) -> Reply {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> Reply {
        Ok(RawResponse {
            status,
            body: body.to_string(),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl GenerativeTransport for ScriptedTransport {
    async fn send(&self, request: &GenerateContentRequest) -> Reply {
        let body = serde_json::to_value(request).unwrap();
        self.requests.lock().unwrap().push((Instant::now(), body));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::Http("script exhausted".to_string())))
    }
}

/// A successful `generateContent` envelope carrying `text` as the model answer.
pub fn envelope(text: &str) -> String {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] }
        }],
        "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 34 }
    })
    .to_string()
}
