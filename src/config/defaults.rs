//! Default values for configuration

/// Default embedding provider base URL (OpenAI-compatible)
pub fn default_provider_url() -> String {
    std::env::var("KNOWBASE_PROVIDER_URL")
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

/// Default environment variable holding the provider API key
pub fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Default embedding dimension (text-embedding-3-small)
pub fn default_embedding_dimension() -> usize {
    1536
}

/// Default batch size for embedding provider calls
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default retry attempts after the first provider call
pub fn default_embedding_max_retries() -> usize {
    3
}

/// Default base backoff between retries, in milliseconds
pub fn default_embedding_backoff_ms() -> u64 {
    250
}

/// Default provider request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    30
}

/// Default maximum characters per chunk
pub fn default_chunk_max_chars() -> usize {
    1000
}

/// Default overlap characters between consecutive chunks
pub fn default_chunk_overlap() -> usize {
    200
}

/// Minimum fraction of the target length a preferred break point must
/// cover before falling back to a hard cut
pub fn default_min_break_fraction() -> f32 {
    0.5
}

/// Default number of search results
pub fn default_search_top_k() -> usize {
    5
}

/// Default minimum similarity score for search results
pub fn default_search_min_score() -> f32 {
    0.3
}

/// Default number of ingestion workers
pub fn default_ingest_workers() -> usize {
    2
}

/// Default ingest queue capacity
pub fn default_ingest_queue_capacity() -> usize {
    64
}

/// Default text extraction timeout in seconds
pub fn default_extract_timeout() -> u64 {
    60
}
