use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{
    CareerCandidate, CatalogEntry, ResilienceAdjustments, SalaryBracket, ScoringWeights,
    UserProfile,
};

/// Rank 1-7 of a catalog required-education label
///
/// Unrecognized labels rank 1.
pub fn education_rank_for_label(label: &str) -> u8 {
    let label = label.to_lowercase();
    if label.contains("doctoral") || label.contains("doctorate") || label.contains("phd") {
        7
    } else if label.contains("professional") {
        6
    } else if label.contains("master") {
        5
    } else if label.contains("bachelor") {
        4
    } else if label.contains("associate") {
        3
    } else if label.contains("some college") || label.contains("postsecondary") {
        2
    } else {
        1
    }
}

/// Education fit (0-1) from the gap between required and held rank
#[inline]
pub fn education_fit(user_rank: u8, required_rank: u8) -> f64 {
    match required_rank as i16 - user_rank as i16 {
        gap if gap <= 0 => 1.0,
        1 => 0.8,
        2 => 0.5,
        _ => 0.3,
    }
}

/// Salary fit (0-1); a missing median counts as 0
#[inline]
pub fn salary_fit(median_wage: Option<f64>, bracket: SalaryBracket) -> f64 {
    let target = bracket.target();
    let median = median_wage.unwrap_or(0.0);
    if median >= target {
        1.0
    } else {
        (median / target).max(0.3)
    }
}

/// Jaccard overlap between the user's skills and the entry's skills and abilities
///
/// Comparison is case-insensitive. Two empty sets score 0.
pub fn skill_overlap(user_skills: &[String], entry: &CatalogEntry) -> f64 {
    let user: HashSet<String> = user_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    let career: HashSet<String> = entry
        .technology_skills
        .iter()
        .chain(entry.abilities.iter())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let union = user.union(&career).count();
    if union == 0 {
        return 0.0;
    }
    user.intersection(&career).count() as f64 / union as f64
}

/// Structured re-ranker, the second stage of the funnel
///
/// Scoring formula:
/// score = (
///     skill_overlap * 0.35 +
///     education_fit * 0.15 +
///     salary_fit * 0.15 +
///     similarity * 0.35
/// ) + resilience_delta
#[derive(Debug, Clone)]
pub struct StructuredScorer {
    weights: ScoringWeights,
    resilience: ResilienceAdjustments,
    limit: usize,
}

impl StructuredScorer {
    pub fn new(weights: ScoringWeights, resilience: ResilienceAdjustments, limit: usize) -> Self {
        Self {
            weights,
            resilience,
            limit,
        }
    }

    /// Score a single candidate
    pub fn score_candidate(
        &self,
        candidate: &CareerCandidate,
        profile: &UserProfile,
        salary_target: SalaryBracket,
    ) -> f64 {
        let Some(entry) = candidate.entry.as_deref() else {
            return candidate.similarity * 0.5;
        };

        let skills = skill_overlap(&profile.skills, entry);
        let education = education_fit(
            profile.education.level.rank(),
            education_rank_for_label(&entry.education),
        );
        let salary = salary_fit(entry.median_wage, salary_target);

        skills * self.weights.skill_overlap
            + education * self.weights.education
            + salary * self.weights.salary
            + candidate.similarity * self.weights.similarity
            + self.resilience.delta(entry.resilience)
    }

    /// Re-rank candidates and keep the top `limit`
    pub fn score(
        &self,
        candidates: Vec<CareerCandidate>,
        profile: &UserProfile,
        salary_target: SalaryBracket,
    ) -> Vec<CareerCandidate> {
        let mut scored: Vec<CareerCandidate> = candidates
            .into_iter()
            .map(|mut candidate| {
                candidate.structured_score = Some(self.score_candidate(&candidate, profile, salary_target));
                candidate
            })
            .collect();

        scored.sort_by(|a, b| {
            let a_score = a.structured_score.unwrap_or(0.0);
            let b_score = b.structured_score.unwrap_or(0.0);
            b_score
                .partial_cmp(&a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.slug.cmp(&b.slug))
        });
        scored.truncate(self.limit);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Education, EducationLevel, ResilienceClass, TimelineBucket};
    use std::sync::Arc;

    fn entry(slug: &str, skills: &[&str], wage: Option<f64>, resilience: ResilienceClass) -> CatalogEntry {
        CatalogEntry {
            slug: slug.to_string(),
            title: slug.to_string(),
            category: "Test".to_string(),
            tasks: vec![],
            technology_skills: skills.iter().map(|s| s.to_string()).collect(),
            abilities: vec![],
            median_wage: wage,
            resilience,
            education: "Bachelor's degree".to_string(),
            timeline_bucket: TimelineBucket::TwoToFourYears,
        }
    }

    fn profile(skills: &[&str]) -> UserProfile {
        UserProfile {
            skills: skills.iter().map(|s| s.to_string()).collect(),
            job_titles: vec![],
            education: Education {
                level: EducationLevel::Bachelors,
                fields: vec![],
            },
            industries: vec![],
            experience_years: 0,
            confidence: 0.5,
        }
    }

    #[test]
    fn test_salary_fit_for_60_80k_bracket() {
        assert_eq!(SalaryBracket::From60To80k.target(), 70_000.0);
        assert_eq!(salary_fit(Some(70_000.0), SalaryBracket::From60To80k), 1.0);
        assert!((salary_fit(Some(35_000.0), SalaryBracket::From60To80k) - 0.5).abs() < 1e-9);
        assert_eq!(salary_fit(Some(10_000.0), SalaryBracket::From60To80k), 0.3);
        assert_eq!(salary_fit(None, SalaryBracket::From60To80k), 0.3);
    }

    #[test]
    fn test_education_label_ranks() {
        assert_eq!(education_rank_for_label("No formal educational credential"), 1);
        assert_eq!(education_rank_for_label("High school diploma or equivalent"), 1);
        assert_eq!(education_rank_for_label("Postsecondary nondegree award"), 2);
        assert_eq!(education_rank_for_label("Associate's degree"), 3);
        assert_eq!(education_rank_for_label("Bachelor's degree"), 4);
        assert_eq!(education_rank_for_label("Master's degree"), 5);
        assert_eq!(education_rank_for_label("Doctoral or professional degree"), 7);
        assert_eq!(education_rank_for_label("Apprenticeship"), 1);
    }

    #[test]
    fn test_education_fit_steps() {
        assert_eq!(education_fit(4, 4), 1.0);
        assert_eq!(education_fit(4, 5), 0.8);
        assert_eq!(education_fit(4, 6), 0.5);
        assert_eq!(education_fit(1, 7), 0.3);
        assert_eq!(education_fit(7, 1), 1.0);
    }

    #[test]
    fn test_skill_overlap_is_case_insensitive_jaccard() {
        let e = entry("analyst", &["Python", "SQL", "Excel"], None, ResilienceClass::Stable);
        let overlap = skill_overlap(&["python".to_string(), "sql".to_string(), "Tableau".to_string()], &e);
        assert!((overlap - 0.5).abs() < 1e-9);
        assert_eq!(skill_overlap(&[], &entry("empty", &[], None, ResilienceClass::Stable)), 0.0);
    }

    #[test]
    fn test_score_combines_signals_and_resilience() {
        let scorer = StructuredScorer::new(ScoringWeights::default(), ResilienceAdjustments::default(), 30);
        let candidate = CareerCandidate::new(
            "analyst".to_string(),
            Some(Arc::new(entry("analyst", &["Python"], Some(80_000.0), ResilienceClass::AiResilient))),
            0.6,
        );

        let score = scorer.score_candidate(&candidate, &profile(&["Python"]), SalaryBracket::From60To80k);
        // 1.0*.35 + 1.0*.15 + 1.0*.15 + 0.6*.35 + 0.10
        assert!((score - 0.96).abs() < 1e-9, "got {}", score);
    }

    #[test]
    fn test_unresolvable_candidate_is_degraded() {
        let scorer = StructuredScorer::new(ScoringWeights::default(), ResilienceAdjustments::default(), 30);
        let candidate = CareerCandidate::new("ghost".to_string(), None, 0.8);
        let score = scorer.score_candidate(&candidate, &profile(&[]), SalaryBracket::Under40k);
        assert!((score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_score_sorts_and_truncates() {
        let scorer = StructuredScorer::new(ScoringWeights::default(), ResilienceAdjustments::default(), 30);
        let candidates: Vec<CareerCandidate> = (0..45)
            .map(|i| {
                let slug = format!("career-{:02}", i);
                CareerCandidate::new(
                    slug.clone(),
                    Some(Arc::new(entry(&slug, &[], Some(50_000.0), ResilienceClass::Evolving))),
                    i as f64 / 45.0,
                )
            })
            .collect();

        let ranked = scorer.score(candidates, &profile(&[]), SalaryBracket::From40To60k);
        assert_eq!(ranked.len(), 30);
        assert_eq!(ranked[0].slug, "career-44");
        assert!(ranked
            .windows(2)
            .all(|w| w[0].structured_score.unwrap() >= w[1].structured_score.unwrap()));
    }
}
