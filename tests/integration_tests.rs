// Integration tests for the career matching pipeline

use async_trait::async_trait;
use career_match::core::{CareerMatcher, MatcherConfig, MatcherServices};
use career_match::error::{MatchError, Result};
use career_match::models::{
    CatalogEntry, CurrentEducation, Education, EducationLevel, MatchOptions, ModelTier,
    ResilienceClass, RetrievalSource, SalaryBracket, TimelineBucket, TrainingWillingness,
    UserPreferences, UserProfile, WorkBackground, WorkStyle,
};
use career_match::services::{
    CancelToken, CatalogRepository, Completion, EmbeddingBatch, EmbeddingService,
    EmbeddingSnapshot, QueryVectors, ReasoningService, ScoredSlug, SnapshotEntry, SnapshotStore,
    VectorStore,
};
use career_match::models::QueryWeights;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CATALOG_SIZE: usize = 80;

const BUCKETS: [TimelineBucket; 4] = [
    TimelineBucket::Asap,
    TimelineBucket::SixToTwentyFourMonths,
    TimelineBucket::TwoToFourYears,
    TimelineBucket::FourPlusYears,
];

fn slug(i: usize) -> String {
    format!("career-{:03}", i)
}

fn create_entry(i: usize, bucket: TimelineBucket) -> CatalogEntry {
    CatalogEntry {
        slug: slug(i),
        title: format!("Career {}", i),
        category: "Test".to_string(),
        tasks: vec![format!("Task {}", i)],
        technology_skills: vec!["Spreadsheets".to_string(), format!("Tool {}", i)],
        abilities: vec!["Oral Comprehension".to_string()],
        median_wage: Some(40_000.0 + i as f64 * 500.0),
        resilience: match i % 3 {
            0 => ResilienceClass::AiResilient,
            1 => ResilienceClass::Stable,
            _ => ResilienceClass::AtRisk,
        },
        education: "Bachelor's degree".to_string(),
        timeline_bucket: bucket,
    }
}

fn create_catalog() -> Vec<CatalogEntry> {
    (0..CATALOG_SIZE).map(|i| create_entry(i, BUCKETS[i % 4])).collect()
}

/// Unit vector rotated away from the query direction as `i` grows
fn vector_for(i: usize) -> Vec<f32> {
    let angle = i as f32 * 0.02;
    vec![angle.cos(), angle.sin()]
}

fn create_snapshot(count: usize) -> EmbeddingSnapshot {
    EmbeddingSnapshot {
        model: "test-embedding".to_string(),
        dimensions: 2,
        entries: (0..count)
            .map(|i| SnapshotEntry {
                slug: slug(i),
                task: vector_for(i),
                narrative: vector_for(i),
                skills: vector_for(i),
            })
            .collect(),
    }
}

fn create_preferences(willingness: TrainingWillingness) -> UserPreferences {
    UserPreferences {
        training_willingness: willingness,
        education_level: CurrentEducation::HighSchool,
        work_background: vec![WorkBackground::Business],
        salary_target: SalaryBracket::From40To60k,
        work_style: vec![WorkStyle::Analytical, WorkStyle::Structured],
        additional_context: Some("I enjoy working with numbers".to_string()),
    }
}

fn create_profile() -> UserProfile {
    UserProfile {
        skills: vec!["Spreadsheets".to_string(), "Bookkeeping".to_string()],
        job_titles: vec!["Office Assistant".to_string()],
        education: Education {
            level: EducationLevel::HighSchool,
            fields: vec![],
        },
        industries: vec!["Retail".to_string()],
        experience_years: 5,
        confidence: 0.85,
    }
}

/// Every text embeds to the same direction
struct FakeEmbeddings {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingService for FakeEmbeddings {
    async fn embed_batch(&self, texts: &[String], _cancel: Option<&CancelToken>) -> Result<EmbeddingBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingBatch {
            vectors: texts.iter().map(|_| vec![1.0, 0.0]).collect(),
            total_tokens: texts.len() as u32 * 12,
        })
    }
}

struct FakeVectorStore {
    fail: bool,
    limits: Mutex<Vec<usize>>,
}

impl FakeVectorStore {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            limits: Mutex::new(vec![]),
        })
    }

    fn requested_limits(&self) -> Vec<usize> {
        self.limits.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for FakeVectorStore {
    async fn query(
        &self,
        _vectors: &QueryVectors,
        _weights: QueryWeights,
        limit: usize,
        _cancel: Option<&CancelToken>,
    ) -> Result<Vec<ScoredSlug>> {
        self.limits.lock().unwrap().push(limit);
        if self.fail {
            return Err(MatchError::Upstream {
                service: "vector store",
                message: "status 503 Service Unavailable".to_string(),
            });
        }

        let mut hits = vec![ScoredSlug {
            slug: "ghost-career".to_string(),
            similarity: 0.99,
        }];
        hits.extend((0..CATALOG_SIZE).map(|i| ScoredSlug {
            slug: slug(i),
            similarity: 0.98 - i as f64 * 0.01,
        }));
        hits.truncate(limit);
        Ok(hits)
    }
}

enum ReasoningMode {
    /// Score every shortlisted career, best first, from 95 down
    Echo,
    Fixed(String),
    Hang,
}

struct FakeReasoning {
    mode: ReasoningMode,
    tiers: Mutex<Vec<ModelTier>>,
}

impl FakeReasoning {
    fn new(mode: ReasoningMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            tiers: Mutex::new(vec![]),
        })
    }

    fn calls(&self) -> Vec<ModelTier> {
        self.tiers.lock().unwrap().clone()
    }
}

fn shortlisted_slugs(payload: &str) -> Vec<String> {
    let section = payload.find("CANDIDATE CAREERS").unwrap();
    let start = section + payload[section..].find('[').unwrap();
    let candidates: Vec<Value> = serde_json::from_str(&payload[start..]).unwrap();
    candidates
        .iter()
        .map(|c| c["slug"].as_str().unwrap().to_string())
        .collect()
}

#[async_trait]
impl ReasoningService for FakeReasoning {
    async fn complete(
        &self,
        tier: ModelTier,
        _system: &str,
        payload: &str,
        _cancel: Option<&CancelToken>,
    ) -> Result<Completion> {
        self.tiers.lock().unwrap().push(tier);

        let text = match &self.mode {
            ReasoningMode::Echo => {
                let matches: Vec<Value> = shortlisted_slugs(payload)
                    .iter()
                    .enumerate()
                    .map(|(i, slug)| {
                        json!({
                            "slug": slug,
                            "matchScore": 95 - i as i64,
                            "reasoning": "Your experience carries over well.",
                            "skillsGap": ["Advanced Excel"],
                            "transitionTimeline": "asap"
                        })
                    })
                    .collect();
                format!("```json\n{}\n```", Value::Array(matches))
            }
            ReasoningMode::Fixed(text) => text.clone(),
            ReasoningMode::Hang => std::future::pending().await,
        };

        Ok(Completion {
            text,
            input_tokens: 2_000,
            output_tokens: 800,
        })
    }
}

struct Harness {
    matcher: CareerMatcher,
    embeddings: Arc<FakeEmbeddings>,
    reasoning: Arc<FakeReasoning>,
}

fn build(
    catalog: Vec<CatalogEntry>,
    snapshot: SnapshotStore,
    store: Option<Arc<FakeVectorStore>>,
    mode: ReasoningMode,
) -> Harness {
    let embeddings = Arc::new(FakeEmbeddings {
        calls: AtomicUsize::new(0),
    });
    let reasoning = FakeReasoning::new(mode);

    let matcher = CareerMatcher::new(
        MatcherServices {
            catalog: Arc::new(CatalogRepository::from_entries(catalog).unwrap()),
            embeddings: embeddings.clone(),
            vector_store: store.map(|s| s as Arc<dyn VectorStore>),
            snapshot: Arc::new(snapshot),
            reasoning: reasoning.clone(),
        },
        MatcherConfig::default(),
    );

    Harness {
        matcher,
        embeddings,
        reasoning,
    }
}

fn default_harness(store: Option<Arc<FakeVectorStore>>, mode: ReasoningMode) -> Harness {
    build(
        create_catalog(),
        SnapshotStore::from_snapshot(create_snapshot(CATALOG_SIZE)).unwrap(),
        store,
        mode,
    )
}

fn index_of(slug: &str) -> usize {
    slug.trim_start_matches("career-").parse().unwrap()
}

#[tokio::test]
async fn test_questionnaire_run_returns_fifteen_light_matches() {
    let harness = default_harness(None, ReasoningMode::Echo);
    let preferences = create_preferences(TrainingWillingness::Significant);

    let result = harness
        .matcher
        .match_careers(None, &preferences, &MatchOptions::default())
        .await
        .unwrap();

    let meta = &result.metadata;
    assert_eq!(meta.eligible_count, None);
    assert_eq!(meta.retrieved_count, 50);
    assert_eq!(meta.scored_count, 30);
    assert_eq!(meta.retrieval_source, RetrievalSource::LocalSnapshot);
    assert_eq!(meta.model_tier, ModelTier::Light);
    assert_eq!(harness.reasoning.calls(), vec![ModelTier::Light]);

    // 30 shortlisted careers scored 95..66 all clear 60, so exactly 15 survive
    assert_eq!(result.matches.len(), 15);
    assert_eq!(meta.matched_count, 15);
    assert!(meta.estimated_cost_usd > 0.0);
    assert!(meta.embedding_cost_usd > 0.0);
    assert!(meta.reasoning_cost_usd > 0.0);
    assert!((meta.embedding_cost_usd + meta.reasoning_cost_usd - meta.estimated_cost_usd).abs() < 2e-6);
    // task and narrative only; the questionnaire profile has no skills
    assert_eq!(meta.embedding_tokens, 24);

    for m in &result.matches {
        assert!((60..=100).contains(&m.match_score), "score {} out of range", m.match_score);
        assert_eq!(m.skills_gap.len(), 3);
        assert_eq!(m.skills_gap[0], "Advanced Excel");
    }
    assert!(result
        .matches
        .windows(2)
        .all(|w| w[0].match_score >= w[1].match_score));
}

#[tokio::test]
async fn test_resume_profile_routes_to_full_tier() {
    let harness = default_harness(None, ReasoningMode::Echo);
    let profile = create_profile();
    let preferences = create_preferences(TrainingWillingness::Significant);

    let result = harness
        .matcher
        .match_careers(Some(&profile), &preferences, &MatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.metadata.model_tier, ModelTier::Full);
    // task, narrative and skills queries
    assert_eq!(harness.embeddings.calls.load(Ordering::SeqCst), 3);

    let options = MatchOptions {
        model: Some(ModelTier::Light),
        ..MatchOptions::default()
    };
    let result = harness
        .matcher
        .match_careers(Some(&profile), &preferences, &options)
        .await
        .unwrap();
    assert_eq!(result.metadata.model_tier, ModelTier::Light);
}

#[tokio::test]
async fn test_minimal_willingness_limits_to_reachable_careers() {
    let harness = default_harness(None, ReasoningMode::Echo);
    let preferences = create_preferences(TrainingWillingness::Minimal);

    let result = harness
        .matcher
        .match_careers(None, &preferences, &MatchOptions::default())
        .await
        .unwrap();

    // High school + minimal only reaches the asap bucket
    assert_eq!(result.metadata.eligible_count, Some(CATALOG_SIZE / 4));
    assert!(result.metadata.retrieved_count <= CATALOG_SIZE / 4);
    assert!(!result.matches.is_empty());
    for m in &result.matches {
        assert_eq!(index_of(&m.slug) % 4, 0, "{} is not reachable", m.slug);
    }
}

#[tokio::test]
async fn test_willingness_option_overrides_preferences() {
    let harness = default_harness(None, ReasoningMode::Echo);
    let preferences = create_preferences(TrainingWillingness::Significant);
    let options = MatchOptions {
        training_willingness: Some(TrainingWillingness::Minimal),
        ..MatchOptions::default()
    };

    let result = harness
        .matcher
        .match_careers(None, &preferences, &options)
        .await
        .unwrap();
    assert_eq!(result.metadata.eligible_count, Some(CATALOG_SIZE / 4));
}

#[tokio::test]
async fn test_vector_store_overfetches_only_when_filtering() {
    let store = FakeVectorStore::new(false);
    let harness = default_harness(Some(store.clone()), ReasoningMode::Echo);

    let filtered = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Minimal), &MatchOptions::default())
        .await
        .unwrap();
    let unfiltered = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Significant), &MatchOptions::default())
        .await
        .unwrap();

    assert_eq!(store.requested_limits(), vec![100, 50]);
    assert_eq!(filtered.metadata.retrieval_source, RetrievalSource::VectorStore);
    assert_eq!(filtered.metadata.retrieved_count, CATALOG_SIZE / 4);
    assert!(filtered.matches.iter().all(|m| index_of(&m.slug) % 4 == 0));
    assert_eq!(unfiltered.metadata.retrieved_count, 50);
}

#[tokio::test]
async fn test_unknown_vector_store_slug_never_reaches_matches() {
    let store = FakeVectorStore::new(false);
    let harness = default_harness(Some(store), ReasoningMode::Echo);

    let result = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Significant), &MatchOptions::default())
        .await
        .unwrap();

    // The unresolvable slug is kept through retrieval with a degraded score
    assert_eq!(result.metadata.retrieved_count, 50);
    assert!(!result.matches.is_empty());
    assert!(result.matches.iter().all(|m| m.slug != "ghost-career"));
}

#[tokio::test]
async fn test_vector_store_failure_falls_back_to_snapshot() {
    let store = FakeVectorStore::new(true);
    let harness = default_harness(Some(store.clone()), ReasoningMode::Echo);

    let result = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Medium), &MatchOptions::default())
        .await
        .unwrap();

    assert_eq!(store.requested_limits().len(), 1);
    assert_eq!(result.metadata.retrieval_source, RetrievalSource::LocalSnapshot);
    assert!(!result.matches.is_empty());
}

#[tokio::test]
async fn test_vector_store_disabled_by_option() {
    let store = FakeVectorStore::new(false);
    let harness = default_harness(Some(store.clone()), ReasoningMode::Echo);
    let options = MatchOptions {
        use_vector_store: Some(false),
        ..MatchOptions::default()
    };

    let result = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Significant), &options)
        .await
        .unwrap();

    assert!(store.requested_limits().is_empty());
    assert_eq!(result.metadata.retrieval_source, RetrievalSource::LocalSnapshot);
}

#[tokio::test]
async fn test_every_source_failing_is_fatal() {
    let harness = build(
        create_catalog(),
        SnapshotStore::unavailable(),
        Some(FakeVectorStore::new(true)),
        ReasoningMode::Echo,
    );

    let err = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Significant), &MatchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, MatchError::NoCandidateSource(_)), "got {:?}", err);
    assert!(harness.reasoning.calls().is_empty());
}

#[tokio::test]
async fn test_unparseable_reasoning_is_parse_error() {
    let harness = default_harness(
        None,
        ReasoningMode::Fixed("I'm sorry, I can't rank these careers.".to_string()),
    );

    let err = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Significant), &MatchOptions::default())
        .await
        .unwrap_err();

    match err {
        MatchError::Parse { raw, .. } => assert!(raw.contains("can't rank")),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_low_scores_are_filtered_out() {
    let text = json!([
        {"slug": "career-000", "matchScore": 82, "reasoning": "Strong fit.", "skillsGap": [], "transitionTimeline": "asap"},
        {"slug": "career-001", "matchScore": 59.4, "reasoning": "Weak fit.", "skillsGap": [], "transitionTimeline": "2-4 years"}
    ])
    .to_string();
    let harness = default_harness(None, ReasoningMode::Fixed(text));

    let result = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Significant), &MatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].slug, "career-000");
    assert_eq!(result.matches[0].title, "Career 0");
    assert_eq!(result.matches[0].skills_gap.len(), 3);
}

#[tokio::test]
async fn test_no_reachable_careers_skips_reasoning() {
    let catalog: Vec<CatalogEntry> = (0..10)
        .map(|i| create_entry(i, TimelineBucket::FourPlusYears))
        .collect();
    let harness = build(
        catalog,
        SnapshotStore::from_snapshot(create_snapshot(10)).unwrap(),
        None,
        ReasoningMode::Echo,
    );

    let result = harness
        .matcher
        .match_careers(None, &create_preferences(TrainingWillingness::Minimal), &MatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.metadata.eligible_count, Some(0));
    assert!(result.matches.is_empty());
    assert_eq!(result.metadata.reasoning_input_tokens, 0);
    assert!(harness.reasoning.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_yields_timeout() {
    let harness = default_harness(None, ReasoningMode::Hang);
    let (handle, token) = CancelToken::pair();
    let options = MatchOptions {
        cancel: Some(token),
        ..MatchOptions::default()
    };

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        harness
            .matcher
            .match_careers(None, &create_preferences(TrainingWillingness::Significant), &options),
    )
    .await
    .expect("cancellation did not abort the run");

    assert!(matches!(result, Err(MatchError::Timeout { .. })));
}

#[tokio::test]
async fn test_deterministic_runs_are_identical() {
    let harness = default_harness(None, ReasoningMode::Echo);
    let profile = create_profile();
    let preferences = create_preferences(TrainingWillingness::Medium);

    let first = harness
        .matcher
        .match_careers(Some(&profile), &preferences, &MatchOptions::default())
        .await
        .unwrap();
    let second = harness
        .matcher
        .match_careers(Some(&profile), &preferences, &MatchOptions::default())
        .await
        .unwrap();

    assert_eq!(first, second);
}
