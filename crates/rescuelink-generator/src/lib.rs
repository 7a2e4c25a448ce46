//! Collaborators that produce raw candidate providers for a position.
//!
//! The cache treats every generator the same way: a batch on success, a
//! [`GeneratorError`] on failure. Ranking happens downstream.

pub mod catalog;
pub mod chained;
pub mod error;
pub mod openai;
mod payload;
pub mod retry;

use async_trait::async_trait;
use rescuelink_core::{Guidance, MatchCriteria, Position, Provider};

pub use catalog::CatalogGenerator;
pub use chained::ChainedGenerator;
pub use error::GeneratorError;
pub use openai::{OpenAiGenerator, OpenAiSettings};
pub use retry::RetryPolicy;

/// Unranked providers plus any narrative guidance that came with them.
#[derive(Debug, Clone, Default)]
pub struct CandidateBatch {
    pub providers: Vec<Provider>,
    pub guidance: Option<Guidance>,
}

#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        position: Option<&Position>,
        criteria: &MatchCriteria,
    ) -> Result<CandidateBatch, GeneratorError>;
}
