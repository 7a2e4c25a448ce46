//! Prompt construction and parsing of generated contact payloads.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use rescuelink_core::{Guidance, MatchCriteria, Position, ProviderOrigin, RawProvider};
use serde::Deserialize;

use crate::error::GeneratorError;
use crate::CandidateBatch;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n?(.*?)\s*```\s*$").expect("valid code fence regex")
});

/// Remove a surrounding Markdown code fence, if any.
pub(crate) fn strip_code_fences(content: &str) -> &str {
    CODE_FENCE
        .captures(content)
        .and_then(|c| c.get(1))
        .map_or_else(|| content.trim(), |m| m.as_str())
}

pub(crate) fn location_block(position: Option<&Position>) -> String {
    let Some(position) = position else {
        return "No location available.".to_string();
    };

    let address = position.address();
    let mut lines = Vec::new();
    if let Some(c) = position.coordinates() {
        lines.push(format!("Coordinates: {:.4}, {:.4}", c.lat, c.lng));
    }
    lines.push(format!("Address: {}", address.formatted));
    if let Some(city) = &address.city {
        lines.push(format!("City: {city}"));
    }
    if let Some(state) = &address.state {
        lines.push(format!("State: {state}"));
    }
    lines.push(format!("Position source: {}", position.source()));
    lines.join("\n")
}

pub(crate) fn system_prompt(
    position: Option<&Position>,
    criteria: &MatchCriteria,
    count: usize,
) -> String {
    format!(
        "You coordinate emergency contacts for animal rescue in India.\n\
         \n\
         Caller location:\n{location}\n\
         \n\
         List {count} real-world style contacts near this location that can help \
         with a {urgency} urgency case involving {animal} animals: veterinary \
         hospitals, rescue NGOs, animal control and government helplines. Use \
         Indian phone formats and mark round-the-clock services.\n\
         \n\
         Reply with a single JSON object:\n\
         {{\"emergencyContacts\": [{{\"name\", \"type\", \"phone\", \"email\", \
         \"address\", \"city\", \"coordinates\": [lat, lng] or null, \
         \"specialization\": [..], \"availability\", \"is24x7\", \"urgencyLevel\", \
         \"rating\", \"description\", \"services\": [..]}}], \
         \"generalGuidance\": {{\"immediateSteps\": [..], \"safetyTips\": [..], \
         \"whenToCall\"}}, \"backupContacts\": [{{\"name\", \"phone\", \"description\"}}]}}",
        location = location_block(position),
        urgency = criteria.urgency_tier,
        animal = criteria.specialization,
    )
}

pub(crate) fn user_prompt(criteria: &MatchCriteria, count: usize) -> String {
    format!(
        "Find {count} emergency contacts. Urgency: {}. Animal type: {}.",
        criteria.urgency_tier, criteria.specialization
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedPayload {
    #[serde(default)]
    emergency_contacts: Vec<serde_json::Value>,
    #[serde(default)]
    general_guidance: Option<Guidance>,
    #[serde(default)]
    backup_contacts: Vec<serde_json::Value>,
}

/// Parse completion text into a batch.
///
/// The payload as a whole must be a JSON object; individual contacts that do
/// not deserialize or lack a name or phone are skipped.
pub(crate) fn parse_completion(content: &str) -> Result<CandidateBatch, GeneratorError> {
    let json = strip_code_fences(content);
    let payload: GeneratedPayload =
        serde_json::from_str(json).map_err(|e| GeneratorError::Deserialize {
            context: "generated emergency contacts".to_string(),
            source: e,
        })?;

    let mut seen = HashSet::new();
    let mut providers = Vec::new();
    let records = payload
        .emergency_contacts
        .into_iter()
        .chain(payload.backup_contacts);

    for (index, value) in records.enumerate() {
        let raw: RawProvider = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed generated contact");
                continue;
            }
        };
        let Some(provider) = raw.normalize(ProviderOrigin::Generated) else {
            tracing::debug!(index, "skipping generated contact without name or phone");
            continue;
        };
        if seen.insert(provider.id.clone()) {
            providers.push(provider);
        }
    }

    let guidance = payload.general_guidance.filter(|g| !g.is_empty());
    Ok(CandidateBatch {
        providers,
        guidance,
    })
}
