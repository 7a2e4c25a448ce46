use rescuelink_core::{CoveredCity, RankedProvider, RecommendationSet};
use rescuelink_geo::GeoPositionProvider;

pub(crate) fn print_recommendations(set: &RecommendationSet) {
    println!(
        "Location: {}",
        GeoPositionProvider::format_for_display(set.position.as_ref())
    );
    println!(
        "Looking for: {} ({} urgency)",
        set.criteria.specialization, set.criteria.urgency_tier
    );
    if set.fallback_used {
        println!("No matching providers nearby; showing helplines instead.");
    }
    println!();

    let header = format!(
        "{:<4}{:<36}{:<16}{:<14}{:<8}AVAILABILITY",
        "#", "NAME", "PHONE", "DISTANCE", "RATING"
    );
    println!("{header}");
    for (rank, ranked) in set.providers.iter().enumerate() {
        println!("{}", provider_row(rank + 1, ranked));
    }

    if let Some(guidance) = set.guidance.as_ref().filter(|g| !g.is_empty()) {
        if !guidance.immediate_steps.is_empty() {
            println!();
            println!("Immediate steps:");
            for step in &guidance.immediate_steps {
                println!("  - {step}");
            }
        }
        if !guidance.safety_tips.is_empty() {
            println!();
            println!("Safety tips:");
            for tip in &guidance.safety_tips {
                println!("  - {tip}");
            }
        }
        if let Some(when) = &guidance.when_to_call {
            println!();
            println!("When to call: {when}");
        }
    }
}

fn provider_row(rank: usize, ranked: &RankedProvider) -> String {
    let provider = &ranked.provider;
    let name = if provider.name.chars().count() > 34 {
        format!("{}...", provider.name.chars().take(31).collect::<String>())
    } else {
        provider.name.clone()
    };
    let distance = match (&ranked.distance_label, ranked.distance_estimated) {
        (Some(label), true) => format!("~{label}"),
        (Some(label), false) => label.clone(),
        (None, _) => "\u{2014}".to_string(),
    };
    format!(
        "{:<4}{:<36}{:<16}{:<14}{:<8.1}{}",
        rank, name, provider.phone, distance, provider.rating, provider.availability_window
    )
}

pub(crate) fn print_cities(cities: &[CoveredCity]) {
    if cities.is_empty() {
        println!("no cities in the provider catalog");
        return;
    }
    println!("{:<20}PROVIDERS", "CITY");
    for city in cities {
        println!("{:<20}{}", city.display_name(), city.provider_count);
    }
}
