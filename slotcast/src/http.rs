//! HTTP client for llama.cpp-style slot servers.
//!
//! The server keeps a fixed pool of slots, each a persistent
//! conversational context with its own prompt cache. A slot is claimed
//! by priming it with a system prompt; generations then address it by
//! id with `cache_prompt` so the context persists across requests.

use crate::{Backend, Completion, Error, GenerateRequest, SlotId};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const DEFAULT_POOL_SIZE: u32 = 16;

/// Client for a slot-multiplexed generation server.
pub struct SlotServer {
    client: reqwest::Client,
    base_url: String,
    pool_size: u32,
    // The lock is held across priming so an id is consumed only once
    // the slot is actually seeded.
    next_slot: Mutex<u32>,
}

impl SlotServer {
    /// Create a client for the server at `base_url` (e.g.
    /// `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            next_slot: Mutex::new(0),
        }
    }

    /// Set the number of slots the server was started with.
    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    async fn post_completion(&self, body: &ApiCompletionRequest) -> Result<Completion, Error> {
        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .headers(self.build_headers())
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message });
        }

        // Accumulate streamed chunks; `scan` keeps a buffer for SSE
        // events split across network chunks.
        let mut stream = response
            .bytes_stream()
            .scan(String::new(), |buffer, result| {
                let chunks = match result {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        parse_sse_chunks_buffered(buffer)
                    }
                    Err(e) => vec![Err(Error::Network(e.to_string()))],
                };
                futures::future::ready(Some(chunks))
            })
            .flat_map(futures::stream::iter);

        let mut text = String::new();
        let mut cancelled = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            text.push_str(&chunk.content);
            if chunk.cancelled {
                cancelled = true;
            }
            if chunk.stop || chunk.cancelled {
                break;
            }
        }

        Ok(Completion { text, cancelled })
    }
}

#[async_trait]
impl Backend for SlotServer {
    async fn create_slot(&self, system_prompt: &str) -> Result<SlotId, Error> {
        let mut next_slot = self.next_slot.lock().await;
        let id = *next_slot;
        if id >= self.pool_size {
            return Err(Error::Config(format!(
                "slot pool exhausted ({} slots)",
                self.pool_size
            )));
        }

        // Prime the slot's prompt cache with the system prompt; no
        // tokens are sampled. A failed priming leaves the counter
        // untouched, so the id is not leaked from the pool.
        let body = ApiCompletionRequest {
            id_slot: id,
            prompt: system_prompt.to_string(),
            n_predict: 0,
            temperature: None,
            grammar: None,
            cache_prompt: true,
            stream: true,
        };
        self.post_completion(&body).await?;

        *next_slot = id + 1;
        Ok(SlotId(id))
    }

    async fn generate(&self, slot: SlotId, request: GenerateRequest) -> Result<Completion, Error> {
        let body = ApiCompletionRequest {
            id_slot: slot.0,
            prompt: request.prompt,
            n_predict: request.max_tokens as i64,
            temperature: request.temperature,
            grammar: request.grammar.map(|g| g.as_str().to_string()),
            cache_prompt: true,
            stream: true,
        };
        self.post_completion(&body).await
    }
}

#[derive(Debug, Serialize)]
struct ApiCompletionRequest {
    id_slot: u32,
    prompt: String,
    n_predict: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grammar: Option<String>,
    cache_prompt: bool,
    stream: bool,
}

/// One streamed completion chunk from the server.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    content: String,
    #[serde(default)]
    stop: bool,
    #[serde(default)]
    cancelled: bool,
}

/// Parse SSE chunks from a buffer, consuming complete events and
/// leaving incomplete data for the next network chunk.
fn parse_sse_chunks_buffered(buffer: &mut String) -> Vec<Result<StreamChunk, Error>> {
    let mut chunks = Vec::new();

    loop {
        let Some(newline_pos) = buffer.find('\n') else {
            // No complete line yet, wait for more data.
            break;
        };

        let line = &buffer[..newline_pos];

        if let Some(json_str) = line.strip_prefix("data: ") {
            if !json_str.is_empty() && json_str != "[DONE]" {
                match serde_json::from_str::<StreamChunk>(json_str) {
                    Ok(chunk) => chunks.push(Ok(chunk)),
                    // The line is newline-terminated, so truncated
                    // JSON here is malformed data from the server,
                    // not a partial read; waiting would wedge the
                    // loop on this line forever.
                    Err(e) => chunks.push(Err(Error::Parse(format!("SSE parse error: {e}")))),
                }
            }
        }
        // Skip event: lines, empty lines, and other SSE metadata.

        buffer.drain(..=newline_pos);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_events() {
        let mut buffer = String::from(
            "data: {\"content\":\"The \",\"stop\":false}\n\ndata: {\"content\":\"well.\",\"stop\":true}\n\n",
        );
        let chunks = parse_sse_chunks_buffered(&mut buffer);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().content, "The ");
        assert!(chunks[1].as_ref().unwrap().stop);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_incomplete_event_left_in_buffer() {
        let mut buffer = String::from("data: {\"content\":\"par");
        let chunks = parse_sse_chunks_buffered(&mut buffer);
        assert!(chunks.is_empty());
        assert_eq!(buffer, "data: {\"content\":\"par");
    }

    #[test]
    fn test_malformed_terminated_line_does_not_wedge_the_stream() {
        // The first event is truncated JSON but its line is complete;
        // it must come back as a parse error and be drained so the
        // next event still gets through.
        let mut buffer = String::from(
            "data: {\"content\":\"par\ndata: {\"content\":\"tial\",\"stop\":true}\n",
        );
        let chunks = parse_sse_chunks_buffered(&mut buffer);
        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[0], Err(Error::Parse(_))));
        assert_eq!(chunks[1].as_ref().unwrap().content, "tial");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_skips_metadata_lines() {
        let mut buffer = String::from(": ping\n\ndata: {\"content\":\"x\",\"stop\":true}\n");
        let chunks = parse_sse_chunks_buffered(&mut buffer);
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn test_pool_exhaustion_reported_before_any_request() {
        let server = SlotServer::new("http://localhost:8080").with_pool_size(0);
        let err = server.create_slot("prompt").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_failed_priming_does_not_consume_a_slot() {
        // Port 9 (discard) is closed; the priming POST fails without
        // reaching a server, and the pool must stay intact.
        let server = SlotServer::new("http://127.0.0.1:9").with_pool_size(1);

        assert!(server.create_slot("prompt").await.is_err());
        assert_eq!(*server.next_slot.lock().await, 0);

        // A retry still fails on the network, never on exhaustion.
        let err = server.create_slot("prompt").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
