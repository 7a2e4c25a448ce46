use std::sync::Arc;

use async_trait::async_trait;
use rescuelink_core::{MatchCriteria, Position};

use crate::error::GeneratorError;
use crate::{CandidateBatch, CandidateGenerator};

/// Tries `primary`, then `secondary` when the primary fails or comes back empty.
pub struct ChainedGenerator {
    primary: Arc<dyn CandidateGenerator>,
    secondary: Arc<dyn CandidateGenerator>,
}

impl ChainedGenerator {
    #[must_use]
    pub fn new(primary: Arc<dyn CandidateGenerator>, secondary: Arc<dyn CandidateGenerator>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl CandidateGenerator for ChainedGenerator {
    fn name(&self) -> &'static str {
        "chained"
    }

    async fn generate(
        &self,
        position: Option<&Position>,
        criteria: &MatchCriteria,
    ) -> Result<CandidateBatch, GeneratorError> {
        match self.primary.generate(position, criteria).await {
            Ok(batch) if !batch.providers.is_empty() => Ok(batch),
            Ok(empty) => {
                tracing::info!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    "primary generator returned no providers; trying secondary"
                );
                match self.secondary.generate(position, criteria).await {
                    Ok(mut batch) => {
                        batch.guidance = batch.guidance.or(empty.guidance);
                        Ok(batch)
                    }
                    Err(e) => {
                        tracing::warn!(generator = self.secondary.name(), error = %e, "secondary generator failed");
                        Ok(empty)
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "primary generator failed; trying secondary"
                );
                self.secondary.generate(position, criteria).await
            }
        }
    }
}
