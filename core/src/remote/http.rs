//! HTTP client for the remote retrieval service

use super::{
    with_retry, BatchUploadRequest, BatchUploadResponse, BlobSet, RemoteService,
    RetrievalRequest, RetrievalResponse, RetryPolicy, TagExtractor, UploadBlob,
};
use crate::blob::Blob;
use crate::config::EngineConfig;
use crate::error::{ConfigError, RemoteError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Tag the enhancement model wraps its rewritten prompt in
pub const ENHANCED_PROMPT_TAG: &str = "enhanced-prompt";

const BATCH_UPLOAD_PATH: &str = "batch-upload";
const RETRIEVAL_PATH: &str = "agents/codebase-retrieval";
const CHAT_STREAM_PATH: &str = "chat-stream";

/// Remote service client over HTTP with bearer authentication
pub struct HttpRemoteClient {
    client: Client,
    base_url: String,
    api_token: String,
    retry: RetryPolicy,
}

impl HttpRemoteClient {
    /// Create a client from resolved engine config
    pub fn new(config: &EngineConfig) -> Result<Self> {
        if config.api_token.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "api_token".to_string(),
            }
            .into());
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("ctxsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.trimmed_base_url().to_string(),
            api_token: config.api_token.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<reqwest::Response, RemoteError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.api_token)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| RemoteError::from_transport(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status, error_text));
        }

        Ok(response)
    }

    /// POST a JSON body; `None` when the response body is empty
    async fn post_json<B, R>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<Option<R>, RemoteError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send_json(path, body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::from_transport(&e))?;

        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| RemoteError::Protocol {
                message: format!("Failed to parse response from {}: {}", path, e),
            })
    }

    /// Ask the chat endpoint to rewrite a prompt with codebase context.
    ///
    /// The response is read as a stream and returned as soon as the tagged rewrite is complete.
    pub async fn enhance_prompt(
        &self,
        prompt: &str,
        blob_names: Vec<String>,
    ) -> std::result::Result<String, RemoteError> {
        let request = ChatStreamRequest {
            message: enhancement_instruction(prompt),
            mode: "CHAT".to_string(),
            blobs: BlobSet {
                checkpoint_id: None,
                added_blobs: blob_names,
                deleted_blobs: Vec::new(),
            },
            chat_history: Vec::new(),
        };

        let response = with_retry(&self.retry, "prompt enhancement", || {
            self.send_json(CHAT_STREAM_PATH, &request)
        })
        .await?;

        let mut extractor = TagExtractor::new(ENHANCED_PROMPT_TAG);
        let mut pending: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RemoteError::from_transport(&e))?;
            pending.extend_from_slice(&chunk);

            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if feed_stream_line(&mut extractor, &line) {
                    return Ok(extractor.finish());
                }
            }
        }

        feed_stream_line(&mut extractor, &pending);
        Ok(extractor.finish())
    }
}

#[async_trait]
impl RemoteService for HttpRemoteClient {
    async fn batch_upload(&self, blobs: &[Blob]) -> std::result::Result<Vec<String>, RemoteError> {
        let request = BatchUploadRequest {
            blobs: blobs.iter().map(UploadBlob::from).collect(),
        };

        let response: BatchUploadResponse = self
            .post_json(BATCH_UPLOAD_PATH, &request)
            .await?
            .ok_or_else(|| RemoteError::Protocol {
                message: "empty response to batch upload".to_string(),
            })?;

        Ok(response.blob_names)
    }

    async fn retrieve(
        &self,
        request: &RetrievalRequest,
    ) -> std::result::Result<Option<String>, RemoteError> {
        let response: Option<RetrievalResponse> = self.post_json(RETRIEVAL_PATH, request).await?;

        Ok(response
            .and_then(|r| r.formatted_retrieval)
            .filter(|text| !text.trim().is_empty()))
    }

    fn service_name(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ChatStreamRequest {
    message: String,
    mode: String,
    blobs: BlobSet,
    chat_history: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    text: Option<String>,
}

fn enhancement_instruction(prompt: &str) -> String {
    format!(
        "Rewrite the following request so it is specific and unambiguous, using the \
         codebase context available to you. Reply with the rewritten request only, wrapped \
         in <{tag}></{tag}> tags.\n\n{prompt}",
        tag = ENHANCED_PROMPT_TAG,
        prompt = prompt
    )
}

/// Feed one stream line to the extractor; returns true once the payload is complete
fn feed_stream_line(extractor: &mut TagExtractor, line: &[u8]) -> bool {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    let line = line.strip_prefix("data:").map(str::trim).unwrap_or(line);

    if line.is_empty() || line == "[DONE]" {
        return extractor.is_complete();
    }

    match serde_json::from_str::<ChatStreamChunk>(line) {
        Ok(ChatStreamChunk { text: Some(text) }) => {
            extractor.push(&text);
        }
        Ok(_) => {}
        Err(e) => tracing::debug!("Ignoring unparsable stream line: {}", e),
    }
    extractor.is_complete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> HttpRemoteClient {
        let config = EngineConfig::new(server.url(), "test-token").with_retry(2, 1);
        HttpRemoteClient::new(&config).unwrap()
    }

    #[test]
    fn test_requires_token() {
        let config = EngineConfig::new("https://retrieval.example.com", "  ");
        assert!(HttpRemoteClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_batch_upload_round_trip() {
        let mut server = Server::new_async().await;
        let blob = Blob::new("a.py", "print(1)\n", "a.py");
        let digest = blob.digest();

        let mock = server
            .mock("POST", "/batch-upload")
            .match_header("authorization", "Bearer test-token")
            .match_body(Matcher::PartialJson(json!({
                "blobs": [{ "path": "a.py", "content": "print(1)\n" }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "blob_names": [digest.clone()] }).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let names = client.batch_upload(&[blob]).await.unwrap();

        assert_eq!(names, vec![digest]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_status_codes_are_classified() {
        let mut server = Server::new_async().await;
        let _unauthorized = server
            .mock("POST", "/batch-upload")
            .with_status(401)
            .create_async()
            .await;
        let _unavailable = server
            .mock("POST", "/agents/codebase-retrieval")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .batch_upload(&[Blob::new("a.py", "", "a.py")])
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::Unauthorized);

        let err = client
            .retrieve(&RetrievalRequest::new("q", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Server { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_tls_named_gateway_is_retryable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = EngineConfig::new(
            format!("http://127.0.0.1:{}/tls-gateway", port),
            "test-token",
        )
        .with_retry(1, 1);
        let client = HttpRemoteClient::new(&config).unwrap();

        let err = client
            .batch_upload(&[Blob::new("a.py", "", "a.py")])
            .await
            .unwrap_err();

        assert!(
            matches!(err, RemoteError::ConnectionRefused { .. }),
            "unexpected classification: {:?}",
            err
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_retrieval_sends_digests_and_reads_result() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/agents/codebase-retrieval")
            .match_body(Matcher::PartialJson(json!({
                "information_request": "where is auth handled?",
                "blobs": { "added_blobs": ["d1", "d2"] }
            })))
            .with_status(200)
            .with_body(json!({ "formatted_retrieval": "src/auth.rs: fn login()" }).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let request = RetrievalRequest::new(
            "where is auth handled?",
            vec!["d1".to_string(), "d2".to_string()],
        );
        let result = client.retrieve(&request).await.unwrap();
        assert_eq!(result.as_deref(), Some("src/auth.rs: fn login()"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_is_not_an_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/agents/codebase-retrieval")
            .with_status(200)
            .with_body(json!({ "formatted_retrieval": "" }).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .retrieve(&RetrievalRequest::new("anything", vec![]))
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_enhance_prompt_reads_stream() {
        let mut server = Server::new_async().await;
        let body = [
            json!({ "text": "Here you go: <enhanced-" }).to_string(),
            json!({ "text": "prompt>Add retries to the " }).to_string(),
            json!({ "text": "upload client</enhanced-prompt>" }).to_string(),
            json!({ "text": " ignored" }).to_string(),
        ]
        .join("\n");
        let _mock = server
            .mock("POST", "/chat-stream")
            .match_body(Matcher::PartialJson(json!({ "mode": "CHAT" })))
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = client_for(&server);
        let enhanced = client
            .enhance_prompt("add retries", vec!["d1".to_string()])
            .await
            .unwrap();
        assert_eq!(enhanced, "Add retries to the upload client");
    }

    #[test]
    fn test_feed_stream_line_accepts_sse_prefix() {
        let mut extractor = TagExtractor::new("t");
        assert!(!feed_stream_line(&mut extractor, b"data: {\"text\": \"<t>hi\"}\n"));
        assert!(!feed_stream_line(&mut extractor, b"not json"));
        assert!(feed_stream_line(&mut extractor, b"data: {\"text\": \"</t>\"}"));
        assert_eq!(extractor.finish(), "hi");
    }
}
