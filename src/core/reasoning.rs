use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::prompts::{system_instruction, ReasoningRubric};
use crate::error::{MatchError, Result};
use crate::models::{CareerCandidate, CareerMatch, ModelTier, TimelineBucket, UserPreferences, UserProfile};
use crate::services::{CancelToken, CareerNotesTable, ReasoningService};

/// Generic gaps used to pad a short `skillsGap` list
pub const DEFAULT_SKILLS_GAP: [&str; 3] = [
    "Industry-specific certification",
    "Hands-on experience through entry-level roles",
    "Professional network in the field",
];

/// Skills shown per candidate in the payload
const PAYLOAD_SKILLS: usize = 8;

/// Render the user-message payload for the reasoning call
///
/// Explicit selections come first; resume background is only included when a
/// resume-derived profile exists.
pub fn build_payload(
    shortlist: &[CareerCandidate],
    profile: Option<&UserProfile>,
    preferences: &UserPreferences,
    notes: &CareerNotesTable,
) -> String {
    let selections = json!({
        "trainingWillingness": preferences.training_willingness.label(),
        "currentEducation": preferences.education_level.label(),
        "workBackground": preferences.work_background.iter().map(|b| b.label()).collect::<Vec<_>>(),
        "salaryTarget": preferences.salary_target.label(),
        "workStyle": preferences.work_style.iter().map(|s| s.label()).collect::<Vec<_>>(),
        "additionalContext": preferences.additional_context.as_deref().map(str::trim).unwrap_or(""),
    });

    let candidates: Vec<Value> = shortlist
        .iter()
        .map(|candidate| {
            let mut value = match candidate.entry.as_deref() {
                Some(entry) => json!({
                    "slug": entry.slug,
                    "title": entry.title,
                    "category": entry.category,
                    "medianWage": entry.median_wage,
                    "resilience": entry.resilience.label(),
                    "education": entry.education,
                    "timelineBucket": entry.timeline_bucket.label(),
                    "topSkills": entry
                        .technology_skills
                        .iter()
                        .chain(entry.abilities.iter())
                        .take(PAYLOAD_SKILLS)
                        .collect::<Vec<_>>(),
                }),
                None => json!({ "slug": candidate.slug }),
            };
            value["fitScore"] = json!(candidate.structured_score.map(|s| (s * 100.0).round() / 100.0));

            if let Some(note) = notes.get(&candidate.slug) {
                if !note.entry_routes.is_empty() {
                    value["entryRoutes"] = json!(note.entry_routes);
                }
                if !note.certifications.is_empty() {
                    value["certifications"] = json!(note.certifications);
                }
            }
            value
        })
        .collect();

    let mut payload = format!("USER SELECTIONS (highest priority):\n{}\n\n", selections);

    if let Some(profile) = profile {
        let background = json!({
            "jobTitles": profile.job_titles,
            "skills": profile.skills,
            "industries": profile.industries,
            "experienceYears": profile.experience_years,
            "education": {
                "level": profile.education.level,
                "fields": profile.education.fields,
            },
        });
        payload.push_str(&format!("RESUME BACKGROUND:\n{}\n\n", background));
    }

    let count = candidates.len();
    payload.push_str(&format!("CANDIDATE CAREERS ({}):\n{}", count, Value::Array(candidates)));
    payload
}

/// Strip one surrounding markdown code fence, if present
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Locate the single top-level JSON array in a model response
///
/// Every `[` that opens a syntactically valid array is counted; arrays nested
/// inside a counted array are skipped.
pub fn locate_json_array(text: &str) -> Result<Vec<Value>> {
    let body = strip_code_fence(text);

    let mut found = None;
    let mut count = 0usize;
    let mut pos = 0usize;
    while let Some(offset) = body[pos..].find('[') {
        let start = pos + offset;
        let mut stream = serde_json::Deserializer::from_str(&body[start..]).into_iter::<Vec<Value>>();
        match stream.next() {
            Some(Ok(array)) => {
                count += 1;
                if found.is_none() {
                    found = Some(array);
                }
                pos = start + stream.byte_offset();
            }
            _ => pos = start + 1,
        }
    }

    match (count, found) {
        (1, Some(array)) => Ok(array),
        (0, _) | (_, None) => Err(MatchError::parse("no JSON array found in reasoning response", text)),
        (n, _) => Err(MatchError::parse(
            format!("reasoning response contains {} JSON arrays, expected exactly one", n),
            text,
        )),
    }
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    slug: String,
    #[serde(rename = "matchScore")]
    match_score: f64,
    reasoning: String,
    #[serde(rename = "skillsGap")]
    skills_gap: Vec<String>,
    #[serde(rename = "transitionTimeline")]
    transition_timeline: TimelineBucket,
}

/// Force a skills gap list to exactly three entries
pub fn normalize_skills_gap(gaps: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut normalized: Vec<String> = gaps
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty() && seen.insert(g.to_lowercase()))
        .take(3)
        .collect();

    for default in DEFAULT_SKILLS_GAP {
        if normalized.len() == 3 {
            break;
        }
        if seen.insert(default.to_lowercase()) {
            normalized.push(default.to_string());
        }
    }
    normalized
}

/// Parse and validate a reasoning response against the shortlist
///
/// Any element failing the schema rejects the whole response. Unknown and
/// duplicate slugs are dropped.
pub fn parse_matches(
    text: &str,
    shortlist: &[CareerCandidate],
    min_score: u8,
    max_matches: usize,
) -> Result<Vec<CareerMatch>> {
    let elements = locate_json_array(text)?;

    let raw: Vec<RawMatch> = elements
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value::<RawMatch>(value)
                .map_err(|e| MatchError::parse(format!("match {} failed schema validation: {}", i, e), text))
        })
        .collect::<Result<_>>()?;

    let mut seen = HashSet::new();
    let mut matches = Vec::new();
    for item in raw {
        let Some(candidate) = shortlist.iter().find(|c| c.slug == item.slug) else {
            tracing::warn!("Reasoning response named unknown career {}, dropping", item.slug);
            continue;
        };
        if !seen.insert(item.slug.clone()) {
            tracing::warn!("Reasoning response repeated career {}, keeping first", item.slug);
            continue;
        }

        let score = item.match_score.round().clamp(0.0, 100.0) as u8;
        if score < min_score {
            continue;
        }

        let Some(entry) = candidate.entry.as_deref() else {
            tracing::warn!("Career {} has no catalog record, dropping", item.slug);
            continue;
        };

        matches.push(CareerMatch {
            slug: entry.slug.clone(),
            title: entry.title.clone(),
            category: entry.category.clone(),
            match_score: score,
            median_pay: entry.median_wage,
            resilience_label: entry.resilience.label().to_string(),
            reasoning: item.reasoning.trim().to_string(),
            skills_gap: normalize_skills_gap(item.skills_gap),
            transition_timeline: item.transition_timeline,
            education: entry.education.clone(),
        });
    }

    // Stable: equal scores keep model order
    matches.sort_by(|a, b| b.match_score.cmp(&a.match_score));
    matches.truncate(max_matches);
    Ok(matches)
}

#[derive(Debug, Clone, Default)]
pub struct ReasoningOutcome {
    pub matches: Vec<CareerMatch>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Final stage: narrated, validated matches from the shortlist
pub struct ReasoningStage {
    service: Arc<dyn ReasoningService>,
    rubric: ReasoningRubric,
    min_match_score: u8,
    max_matches: usize,
}

impl ReasoningStage {
    pub fn new(
        service: Arc<dyn ReasoningService>,
        rubric: ReasoningRubric,
        min_match_score: u8,
        max_matches: usize,
    ) -> Self {
        Self {
            service,
            rubric,
            min_match_score,
            max_matches,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn reason(
        &self,
        shortlist: &[CareerCandidate],
        profile: Option<&UserProfile>,
        preferences: &UserPreferences,
        tier: ModelTier,
        notes: &CareerNotesTable,
        cancel: Option<&CancelToken>,
    ) -> Result<ReasoningOutcome> {
        if shortlist.is_empty() {
            tracing::info!("Empty shortlist, skipping reasoning call");
            return Ok(ReasoningOutcome::default());
        }

        let system = system_instruction(&self.rubric, tier, self.min_match_score, self.max_matches);
        let payload = build_payload(shortlist, profile, preferences, notes);

        tracing::debug!("Reasoning payload: tier={:?}, candidates={}, chars={}", tier, shortlist.len(), payload.len());

        let completion = self.service.complete(tier, &system, &payload, cancel).await?;
        let matches = parse_matches(&completion.text, shortlist, self.min_match_score, self.max_matches)?;

        Ok(ReasoningOutcome {
            matches,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
        })
    }
}
