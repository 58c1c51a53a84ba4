//! candor-core: Response analysis and scoring engine.
//!
//! This crate turns a candidate's raw interview response into evidence spans,
//! per-dimension scores with confidence, and a justified composite, and folds
//! those analyses into an on-demand session summary. Storage and transport are
//! consumed through the [`traits::SessionStore`] abstraction and the
//! [`record`] types; the scoring algorithm sits behind
//! [`traits::ScoringStrategy`].

pub mod aggregator;
pub mod analyzer;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod model;
pub mod profile;
pub mod record;
pub mod scoring;
pub mod store;
pub mod traits;
pub mod transcript;

pub use error::{EngineError, Result};
