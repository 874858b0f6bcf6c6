use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use validator::Validate;

use crate::services::CancelToken;

/// Highest education level found in a resume, ordered from least to most
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    HighSchool,
    SomeCollege,
    Associates,
    Bachelors,
    Masters,
    ProfessionalDegree,
    Doctorate,
}

impl EducationLevel {
    /// Ordinal rank 1-7 used by the education-fit lookup
    pub fn rank(self) -> u8 {
        match self {
            EducationLevel::HighSchool => 1,
            EducationLevel::SomeCollege => 2,
            EducationLevel::Associates => 3,
            EducationLevel::Bachelors => 4,
            EducationLevel::Masters => 5,
            EducationLevel::ProfessionalDegree => 6,
            EducationLevel::Doctorate => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub level: EducationLevel,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Profile extracted from a resume, or synthesized from questionnaire answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserProfile {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(rename = "jobTitles", default)]
    pub job_titles: Vec<String>,
    pub education: Education,
    #[serde(default)]
    pub industries: Vec<String>,
    #[validate(range(max = 50))]
    #[serde(rename = "experienceYears", default)]
    pub experience_years: u8,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub confidence: f64,
}

impl UserProfile {
    /// Build the minimal profile used when no resume was uploaded
    pub fn from_questionnaire(preferences: &UserPreferences) -> Self {
        Self {
            skills: vec![],
            job_titles: vec![],
            education: Education {
                level: preferences.education_level.as_profile_level(),
                fields: vec![],
            },
            industries: preferences
                .work_background
                .iter()
                .map(|b| b.label().to_string())
                .collect(),
            experience_years: 0,
            confidence: 0.3,
        }
    }
}

/// How much additional training the user is willing to invest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainingWillingness {
    Minimal,
    ShortTerm,
    Medium,
    Significant,
}

impl TrainingWillingness {
    /// Maximum number of additional years of training for this tier
    pub fn max_additional_years(self) -> f64 {
        match self {
            TrainingWillingness::Minimal => 0.5,
            TrainingWillingness::ShortTerm => 1.0,
            TrainingWillingness::Medium => 2.0,
            TrainingWillingness::Significant => f64::INFINITY,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrainingWillingness::Minimal => "Minimal (under 6 months)",
            TrainingWillingness::ShortTerm => "Short-term (up to 1 year)",
            TrainingWillingness::Medium => "Medium (up to 2 years)",
            TrainingWillingness::Significant => "Significant (open to 4+ years)",
        }
    }
}

/// The user's current education level, as selected in the questionnaire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurrentEducation {
    HighSchool,
    SomeCollege,
    Bachelors,
    MastersPlus,
}

impl CurrentEducation {
    /// Approximate years of post-secondary education already invested
    pub fn years_invested(self) -> f64 {
        match self {
            CurrentEducation::HighSchool => 0.0,
            CurrentEducation::SomeCollege => 1.0,
            CurrentEducation::Bachelors => 4.0,
            CurrentEducation::MastersPlus => 6.0,
        }
    }

    pub fn as_profile_level(self) -> EducationLevel {
        match self {
            CurrentEducation::HighSchool => EducationLevel::HighSchool,
            CurrentEducation::SomeCollege => EducationLevel::SomeCollege,
            CurrentEducation::Bachelors => EducationLevel::Bachelors,
            CurrentEducation::MastersPlus => EducationLevel::Masters,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CurrentEducation::HighSchool => "High school",
            CurrentEducation::SomeCollege => "Some college",
            CurrentEducation::Bachelors => "Bachelor's degree",
            CurrentEducation::MastersPlus => "Master's degree or higher",
        }
    }
}

/// Coarse time-to-qualify category attached to every catalog entry
///
/// Also used as the `transitionTimeline` of a final match, where the
/// display spellings are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelineBucket {
    #[serde(rename = "asap", alias = "ASAP", alias = "Asap")]
    Asap,
    #[serde(rename = "6-24-months", alias = "6-24 months")]
    SixToTwentyFourMonths,
    #[serde(rename = "2-4-years", alias = "2-4 years")]
    TwoToFourYears,
    #[serde(rename = "4-plus-years", alias = "4+ years")]
    FourPlusYears,
}

impl TimelineBucket {
    /// Total years of preparation the bucket represents
    pub fn required_years(self) -> f64 {
        match self {
            TimelineBucket::Asap => 0.0,
            TimelineBucket::SixToTwentyFourMonths => 1.0,
            TimelineBucket::TwoToFourYears => 4.0,
            TimelineBucket::FourPlusYears => 6.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimelineBucket::Asap => "asap",
            TimelineBucket::SixToTwentyFourMonths => "6-24-months",
            TimelineBucket::TwoToFourYears => "2-4-years",
            TimelineBucket::FourPlusYears => "4-plus-years",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkBackground {
    Healthcare,
    Technology,
    Trades,
    Business,
    Education,
    Creative,
    Hospitality,
    PublicService,
    Science,
    Transportation,
    Other,
}

impl WorkBackground {
    pub fn label(self) -> &'static str {
        match self {
            WorkBackground::Healthcare => "healthcare",
            WorkBackground::Technology => "technology",
            WorkBackground::Trades => "skilled trades",
            WorkBackground::Business => "business and finance",
            WorkBackground::Education => "education",
            WorkBackground::Creative => "creative and media",
            WorkBackground::Hospitality => "hospitality and retail",
            WorkBackground::PublicService => "public service",
            WorkBackground::Science => "science and research",
            WorkBackground::Transportation => "transportation and logistics",
            WorkBackground::Other => "other fields",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkStyle {
    HandsOn,
    Analytical,
    Creative,
    PeopleFacing,
    Independent,
    Structured,
}

impl WorkStyle {
    pub fn label(self) -> &'static str {
        match self {
            WorkStyle::HandsOn => "hands-on",
            WorkStyle::Analytical => "analytical",
            WorkStyle::Creative => "creative",
            WorkStyle::PeopleFacing => "people-facing",
            WorkStyle::Independent => "independent",
            WorkStyle::Structured => "structured",
        }
    }
}

/// Salary target brackets, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SalaryBracket {
    #[serde(rename = "under-40k")]
    Under40k,
    #[serde(rename = "40-60k")]
    From40To60k,
    #[serde(rename = "60-80k")]
    From60To80k,
    #[serde(rename = "80-100k")]
    From80To100k,
    #[serde(rename = "100k-plus")]
    Over100k,
}

impl SalaryBracket {
    /// Representative annual salary used for the salary-fit signal
    pub fn target(self) -> f64 {
        match self {
            SalaryBracket::Under40k => 35_000.0,
            SalaryBracket::From40To60k => 50_000.0,
            SalaryBracket::From60To80k => 70_000.0,
            SalaryBracket::From80To100k => 90_000.0,
            SalaryBracket::Over100k => 120_000.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SalaryBracket::Under40k => "under $40k",
            SalaryBracket::From40To60k => "$40k-$60k",
            SalaryBracket::From60To80k => "$60k-$80k",
            SalaryBracket::From80To100k => "$80k-$100k",
            SalaryBracket::Over100k => "$100k+",
        }
    }
}

/// Explicit questionnaire selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UserPreferences {
    #[serde(rename = "trainingWillingness")]
    pub training_willingness: TrainingWillingness,
    #[serde(rename = "educationLevel")]
    pub education_level: CurrentEducation,
    #[serde(rename = "workBackground", default, deserialize_with = "distinct_selections")]
    pub work_background: Vec<WorkBackground>,
    #[serde(rename = "salaryTarget")]
    pub salary_target: SalaryBracket,
    #[validate(length(max = 2))]
    #[serde(rename = "workStyle", default, deserialize_with = "distinct_selections")]
    pub work_style: Vec<WorkStyle>,
    #[validate(length(max = 2000))]
    #[serde(rename = "additionalContext", default)]
    pub additional_context: Option<String>,
}

/// Multi-select answers are sets; repeats collapse onto the first occurrence
fn distinct_selections<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Copy + Eq + Hash,
{
    let values = Vec::<T>::deserialize(deserializer)?;
    let mut seen = HashSet::with_capacity(values.len());
    Ok(values.into_iter().filter(|v| seen.insert(*v)).collect())
}

/// Robustness of an occupation to automation and displacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResilienceClass {
    #[serde(rename = "AI-Resilient")]
    AiResilient,
    Stable,
    Evolving,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(other)]
    Unclassified,
}

impl Default for ResilienceClass {
    fn default() -> Self {
        ResilienceClass::Unclassified
    }
}

impl ResilienceClass {
    pub fn label(self) -> &'static str {
        match self {
            ResilienceClass::AiResilient => "AI-Resilient",
            ResilienceClass::Stable => "Stable",
            ResilienceClass::Evolving => "Evolving",
            ResilienceClass::AtRisk => "At Risk",
            ResilienceClass::Unclassified => "Unclassified",
        }
    }
}

/// One occupation record in the read-only catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub slug: String,
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(rename = "technologySkills", default)]
    pub technology_skills: Vec<String>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(rename = "medianWage", default)]
    pub median_wage: Option<f64>,
    #[serde(default)]
    pub resilience: ResilienceClass,
    pub education: String,
    #[serde(rename = "timelineBucket")]
    pub timeline_bucket: TimelineBucket,
}

impl CatalogEntry {
    /// Schema checks serde cannot express
    pub fn check(&self) -> Result<(), String> {
        if self.slug.trim().is_empty() {
            return Err("catalog entry has an empty slug".to_string());
        }
        if self.title.trim().is_empty() {
            return Err(format!("catalog entry {} has an empty title", self.slug));
        }
        if let Some(wage) = self.median_wage {
            if !wage.is_finite() || wage < 0.0 {
                return Err(format!("catalog entry {} has invalid median wage {}", self.slug, wage));
            }
        }
        Ok(())
    }
}

/// A catalog entry moving through the funnel
///
/// `entry` is `None` when a retrieval source returned a slug the catalog
/// cannot resolve.
#[derive(Debug, Clone)]
pub struct CareerCandidate {
    pub slug: String,
    pub entry: Option<Arc<CatalogEntry>>,
    pub similarity: f64,
    pub structured_score: Option<f64>,
}

impl CareerCandidate {
    pub fn new(slug: String, entry: Option<Arc<CatalogEntry>>, similarity: f64) -> Self {
        Self {
            slug,
            entry,
            similarity,
            structured_score: None,
        }
    }
}

/// Final, narrated recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerMatch {
    pub slug: String,
    pub title: String,
    pub category: String,
    #[serde(rename = "matchScore")]
    pub match_score: u8,
    #[serde(rename = "medianPay")]
    pub median_pay: Option<f64>,
    #[serde(rename = "resilienceLabel")]
    pub resilience_label: String,
    pub reasoning: String,
    #[serde(rename = "skillsGap")]
    pub skills_gap: Vec<String>,
    #[serde(rename = "transitionTimeline")]
    pub transition_timeline: TimelineBucket,
    pub education: String,
}

/// Cost/quality tier of the reasoning model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Full,
    Light,
}

impl ModelTier {
    /// Full tier when a resume-derived profile is available
    pub fn for_profile(has_resume_profile: bool) -> Self {
        if has_resume_profile {
            ModelTier::Full
        } else {
            ModelTier::Light
        }
    }
}

/// Caller options for a single matching run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchOptions {
    #[serde(rename = "useVectorStore", default)]
    pub use_vector_store: Option<bool>,
    #[serde(rename = "trainingWillingness", default)]
    pub training_willingness: Option<TrainingWillingness>,
    #[serde(default)]
    pub model: Option<ModelTier>,
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    VectorStore,
    LocalSnapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageTimings {
    #[serde(rename = "eligibilityMs")]
    pub eligibility_ms: u64,
    #[serde(rename = "retrievalMs")]
    pub retrieval_ms: u64,
    #[serde(rename = "scoringMs")]
    pub scoring_ms: u64,
    #[serde(rename = "reasoningMs")]
    pub reasoning_ms: u64,
    #[serde(rename = "totalMs")]
    pub total_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingMetadata {
    /// `None` when no eligibility filter was applied
    #[serde(rename = "eligibleCount")]
    pub eligible_count: Option<usize>,
    #[serde(rename = "retrievedCount")]
    pub retrieved_count: usize,
    #[serde(rename = "scoredCount")]
    pub scored_count: usize,
    #[serde(rename = "matchedCount")]
    pub matched_count: usize,
    #[serde(rename = "retrievalSource")]
    pub retrieval_source: RetrievalSource,
    #[serde(rename = "modelTier")]
    pub model_tier: ModelTier,
    #[serde(rename = "embeddingTokens")]
    pub embedding_tokens: u32,
    #[serde(rename = "reasoningInputTokens")]
    pub reasoning_input_tokens: u32,
    #[serde(rename = "reasoningOutputTokens")]
    pub reasoning_output_tokens: u32,
    #[serde(rename = "embeddingCostUsd")]
    pub embedding_cost_usd: f64,
    #[serde(rename = "reasoningCostUsd")]
    pub reasoning_cost_usd: f64,
    /// Sum of the per-stage costs
    #[serde(rename = "estimatedCostUsd")]
    pub estimated_cost_usd: f64,
    pub timings: StageTimings,
}

// Wall-clock timings are excluded from equality.
impl PartialEq for MatchingMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.eligible_count == other.eligible_count
            && self.retrieved_count == other.retrieved_count
            && self.scored_count == other.scored_count
            && self.matched_count == other.matched_count
            && self.retrieval_source == other.retrieval_source
            && self.model_tier == other.model_tier
            && self.embedding_tokens == other.embedding_tokens
            && self.reasoning_input_tokens == other.reasoning_input_tokens
            && self.reasoning_output_tokens == other.reasoning_output_tokens
            && self.embedding_cost_usd == other.embedding_cost_usd
            && self.reasoning_cost_usd == other.reasoning_cost_usd
            && self.estimated_cost_usd == other.estimated_cost_usd
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingResult {
    pub matches: Vec<CareerMatch>,
    pub metadata: MatchingMetadata,
}

/// Structured scorer weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub skill_overlap: f64,
    pub education: f64,
    pub salary: f64,
    pub similarity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            skill_overlap: 0.35,
            education: 0.15,
            salary: 0.15,
            similarity: 0.35,
        }
    }
}

/// Signed deltas added to the structured score per resilience class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResilienceAdjustments {
    pub ai_resilient: f64,
    pub stable: f64,
    pub at_risk: f64,
}

impl Default for ResilienceAdjustments {
    fn default() -> Self {
        Self {
            ai_resilient: 0.10,
            stable: 0.05,
            at_risk: -0.10,
        }
    }
}

impl ResilienceAdjustments {
    pub fn delta(&self, class: ResilienceClass) -> f64 {
        match class {
            ResilienceClass::AiResilient => self.ai_resilient,
            ResilienceClass::Stable => self.stable,
            ResilienceClass::AtRisk => self.at_risk,
            ResilienceClass::Evolving | ResilienceClass::Unclassified => 0.0,
        }
    }
}

/// Weights combining the three per-entry cosine similarities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryWeights {
    pub task: f64,
    pub narrative: f64,
    pub skills: f64,
}

impl Default for QueryWeights {
    fn default() -> Self {
        Self {
            task: 0.5,
            narrative: 0.3,
            skills: 0.2,
        }
    }
}

impl QueryWeights {
    /// Drop the skills weight and renormalize when no skills query exists
    pub fn without_skills(self) -> Self {
        let total = self.task + self.narrative;
        if total <= 0.0 {
            return Self { task: 0.5, narrative: 0.5, skills: 0.0 };
        }
        Self {
            task: self.task / total,
            narrative: self.narrative / total,
            skills: 0.0,
        }
    }
}

/// Funnel sizes for each stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunnelLimits {
    pub retrieval: usize,
    pub retrieval_overfetch: usize,
    pub shortlist: usize,
    pub max_matches: usize,
    pub min_match_score: u8,
}

/// Hard ceilings of the funnel; configuration may tighten but never loosen them
pub const MAX_RETRIEVAL: usize = 50;
pub const MAX_SHORTLIST: usize = 30;
pub const MAX_MATCHES: usize = 15;
pub const MIN_MATCH_SCORE: u8 = 60;

impl FunnelLimits {
    pub fn check(&self) -> Result<(), String> {
        if self.retrieval == 0 || self.retrieval > MAX_RETRIEVAL {
            return Err(format!("retrieval limit must be in 1..={}, got {}", MAX_RETRIEVAL, self.retrieval));
        }
        if self.retrieval_overfetch < self.retrieval {
            return Err(format!(
                "retrieval overfetch {} is below the retrieval limit {}",
                self.retrieval_overfetch, self.retrieval
            ));
        }
        if self.shortlist == 0 || self.shortlist > MAX_SHORTLIST {
            return Err(format!("shortlist limit must be in 1..={}, got {}", MAX_SHORTLIST, self.shortlist));
        }
        if self.max_matches == 0 || self.max_matches > MAX_MATCHES {
            return Err(format!("max matches must be in 1..={}, got {}", MAX_MATCHES, self.max_matches));
        }
        if !(MIN_MATCH_SCORE..=100).contains(&self.min_match_score) {
            return Err(format!(
                "min match score must be in {}..=100, got {}",
                MIN_MATCH_SCORE, self.min_match_score
            ));
        }
        Ok(())
    }
}

impl Default for FunnelLimits {
    fn default() -> Self {
        Self {
            retrieval: MAX_RETRIEVAL,
            retrieval_overfetch: 100,
            shortlist: MAX_SHORTLIST,
            max_matches: MAX_MATCHES,
            min_match_score: MIN_MATCH_SCORE,
        }
    }
}
