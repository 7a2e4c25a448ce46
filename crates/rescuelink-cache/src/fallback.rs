//! The built-in recommendation set served when refresh cannot do better.

use chrono::Utc;
use rescuelink_core::{
    local_animal_control, Guidance, MatchCriteria, Position, Provider, RankedProvider,
    RecommendationSet,
};

#[must_use]
pub fn fallback_guidance() -> Guidance {
    Guidance {
        immediate_steps: vec![
            "Ensure your own safety first".to_string(),
            "Keep a safe distance from the animal".to_string(),
            "Call the national helpline on 1962".to_string(),
        ],
        safety_tips: vec![
            "Do not attempt to handle an injured or aggressive animal".to_string(),
            "Keep children and pets away".to_string(),
        ],
        when_to_call: Some("Call immediately for any injured or trapped animal".to_string()),
    }
}

/// `helpline` plus local animal control, with fixed guidance.
///
/// `position` is carried through when one was resolved.
#[must_use]
pub fn fallback_set(
    position: Option<Position>,
    criteria: &MatchCriteria,
    helpline: &Provider,
) -> RecommendationSet {
    let city = position.as_ref().and_then(Position::city).map(str::to_string);
    RecommendationSet {
        providers: vec![
            RankedProvider::unranked(helpline.clone()),
            RankedProvider::unranked(local_animal_control(city.as_deref())),
        ],
        position,
        generated_at: Utc::now(),
        fallback_used: true,
        criteria: criteria.clone(),
        guidance: Some(fallback_guidance()),
    }
}
