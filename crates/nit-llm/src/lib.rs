//! LLM integration for Nit-R.
//!
//! A single `LlmEngine` contract covers every provider; the builtin engine
//! adds token-bucket rate limiting, exponential-backoff retry, platform
//! routing, and usage telemetry. The context assembler that feeds builder
//! prompts lives here too, next to the prompt templates it fills.

pub mod builtin;
pub mod context;
pub mod embeddings;
pub mod engine;
pub mod errors;
pub mod factory;
pub mod ratelimit;
pub mod templates;
pub mod usage;

pub use builtin::{BuiltinEngine, BuiltinEngineConfig, RateLimitConfig, RetryConfig};
pub use context::{
    extract_test_patterns, AssembledContext, ContextAssembler, ContextError, DetectedTestPattern,
    RelatedFile,
};
pub use embeddings::{cosine_similarity, EmbeddingProvider, OpenAiEmbeddings};
pub use engine::{GenerationRequest, LlmEngine, LlmMessage, LlmResponse};
pub use errors::LlmError;
pub use factory::{create_engine, UnconfiguredEngine};
pub use templates::PromptTemplate;
pub use usage::{install_usage_sink, reset_usage_sink, UsageRecord, UsageSink};
