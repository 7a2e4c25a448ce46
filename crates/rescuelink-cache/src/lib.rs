//! Location-aware recommendation cache and the service callers talk to.

pub mod cache;
pub mod drift;
pub mod error;
pub mod fallback;
pub mod service;
pub mod settings;

pub use cache::RecommendationCache;
pub use drift::has_drifted;
pub use error::RefreshError;
pub use fallback::{fallback_guidance, fallback_set};
pub use service::RecommendationService;
pub use settings::CacheSettings;
