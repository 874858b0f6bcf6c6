use std::collections::HashSet;

use crate::models::{CurrentEducation, TimelineBucket, TrainingWillingness};
use crate::services::Catalog;

/// Years of additional training a user still needs for a timeline bucket
///
/// additional = max(0, required_years(bucket) - years_invested(current))
///
/// Always relative to the user's own starting point, so a highly educated
/// user is never excluded from a short-timeline career.
#[inline]
pub fn additional_years_needed(bucket: TimelineBucket, current: CurrentEducation) -> f64 {
    (bucket.required_years() - current.years_invested()).max(0.0)
}

/// Check if a career is reachable within the user's training willingness
#[inline]
pub fn is_eligible(
    tier: TrainingWillingness,
    current: CurrentEducation,
    bucket: TimelineBucket,
) -> bool {
    additional_years_needed(bucket, current) <= tier.max_additional_years()
}

/// Compute the set of catalog slugs the user could plausibly reach
///
/// This is the first stage of the matching funnel.
///
/// # Returns
/// `None` when the tier is unconstrained and no filtering applies
pub fn filter_eligible(
    catalog: &Catalog,
    tier: TrainingWillingness,
    current: CurrentEducation,
) -> Option<HashSet<String>> {
    if tier == TrainingWillingness::Significant {
        return None;
    }

    let eligible: HashSet<String> = catalog
        .entries()
        .iter()
        .filter(|entry| is_eligible(tier, current, entry.timeline_bucket))
        .map(|entry| entry.slug.clone())
        .collect();

    tracing::debug!(
        "Eligibility filter ({:?}, {:?}) kept {} of {} careers",
        tier,
        current,
        eligible.len(),
        catalog.len()
    );

    Some(eligible)
}
