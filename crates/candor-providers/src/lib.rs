//! candor-providers: model-backed scoring strategies.
//!
//! Implements the `ScoringStrategy` trait for Anthropic, OpenAI, and Ollama,
//! and resolves the configured strategy (rule-based or one of these) from the
//! application config.

pub mod anthropic;
pub mod config;
pub mod error;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod prompt;

pub use config::{
    create_provider, create_strategy, load_config, load_config_from, CandorConfig,
    ProviderConfig,
};
pub use error::ProviderError;
