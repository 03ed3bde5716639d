//! OpenAI-compatible HTTP embedding provider

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Embedder backed by a `POST /embeddings` endpoint
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    dimension: usize,
    api_key: Option<String>,
    max_retries: usize,
    backoff_ms: u64,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// Accepts both the OpenAI response shape and the bare list some
/// local servers return
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingsResponse {
    OpenAi { data: Vec<EmbeddingItem> },
    Bare { embeddings: Vec<Vec<f32>> },
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/embeddings",
            config.provider_url.trim_end_matches('/')
        ))?;

        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            debug!(
                "No API key in ${}; sending unauthenticated requests",
                config.api_key_env
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            dimension: config.dimension,
            api_key,
            max_retries: config.max_retries,
            backoff_ms: config.backoff_ms,
        })
    }

    async fn call_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };

        let mut builder = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(snippet),
                s if s.is_server_error() => {
                    Error::Provider(format!("server error {}: {}", s, snippet))
                }
                // a 4xx will not get better on retry
                s => Error::Other(format!("provider rejected request ({}): {}", s, snippet)),
            });
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        let vectors = match parsed {
            EmbeddingsResponse::OpenAi { mut data } => {
                if data.iter().all(|item| item.index.is_some()) {
                    data.sort_by_key(|item| item.index.unwrap_or(0));
                }
                data.into_iter().map(|item| item.embedding).collect()
            }
            EmbeddingsResponse::Bare { embeddings } => embeddings,
        };

        self.validate(texts.len(), vectors)
    }

    fn validate(&self, expected_count: usize, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>> {
        if vectors.len() != expected_count {
            return Err(Error::Provider(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                expected_count
            )));
        }
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(Error::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0usize;
        loop {
            match self.call_once(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = Duration::from_millis(self.backoff_ms << attempt);
                    warn!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Embedding call failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config(url: &str, dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            provider_url: url.to_string(),
            api_key_env: "KNOWBASE_TEST_NO_SUCH_KEY".to_string(),
            model: "test-model".to_string(),
            dimension,
            batch_size: 32,
            max_retries: 2,
            backoff_ms: 1,
            timeout_secs: 5,
        }
    }

    fn openai_body(vectors: &[Vec<f32>]) -> serde_json::Value {
        json!({
            "object": "list",
            "data": vectors
                .iter()
                .enumerate()
                .map(|(i, v)| json!({"object": "embedding", "index": i, "embedding": v}))
                .collect::<Vec<_>>(),
            "model": "test-model",
        })
    }

    #[tokio::test]
    async fn test_embeds_batch_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"model": "test-model"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(openai_body(&[vec![1.0, 0.0], vec![0.0, 1.0]])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&test_config(&server.uri(), 2)).unwrap();
        let vectors = embedder
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_retries_after_rate_limit() {
        struct FlakyResponder {
            calls: AtomicUsize,
        }
        impl Respond for FlakyResponder {
            fn respond(&self, _: &Request) -> ResponseTemplate {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429).set_body_string("slow down")
                } else {
                    ResponseTemplate::new(200).set_body_json(openai_body(&[vec![0.5, 0.5]]))
                }
            }
        }

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(FlakyResponder {
                calls: AtomicUsize::new(0),
            })
            .expect(2)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&test_config(&server.uri(), 2)).unwrap();
        let vectors = embedder.embed(&["text".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
    }

    #[tokio::test]
    async fn test_persistent_server_error_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            // first call plus max_retries
            .expect(3)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&test_config(&server.uri(), 2)).unwrap();
        let err = embedder.embed(&["text".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(openai_body(&[vec![1.0, 2.0, 3.0]])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&test_config(&server.uri(), 2)).unwrap();
        let err = embedder.embed(&["text".to_string()]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_vector_count_mismatch_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(openai_body(&[vec![1.0, 0.0]])))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&test_config(&server.uri(), 2)).unwrap();
        let err = embedder
            .embed(&["one".to_string(), "two".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_bare_embeddings_response_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"embeddings": [[0.1, 0.2]]})),
            )
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&test_config(&server.uri(), 2)).unwrap();
        let vectors = embedder.embed(&["text".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2]]);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&test_config(&server.uri(), 2)).unwrap();
        let err = embedder.embed(&["text".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }
}
