use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::core::{
    eligibility::filter_eligible,
    prompts::ReasoningRubric,
    reasoning::ReasoningStage,
    retrieval::{CandidateSource, LocalSnapshotSource, RetrievalStage, VectorStoreSource},
    scoring::StructuredScorer,
};
use crate::error::{MatchError, Result};
use crate::models::{
    FunnelLimits, MatchOptions, MatchingMetadata, MatchingResult, ModelTier, QueryWeights,
    ResilienceAdjustments, ScoringWeights, StageTimings, UserPreferences, UserProfile,
};
use crate::services::{CatalogRepository, EmbeddingService, ReasoningService, SnapshotStore, VectorStore};

const PIPELINE: &str = "matching pipeline";

/// USD per million tokens for each billed call
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PricingRates {
    #[serde(default = "default_embedding_rate")]
    pub embedding_per_million: f64,
    #[serde(default = "default_full_input_rate")]
    pub full_input_per_million: f64,
    #[serde(default = "default_full_output_rate")]
    pub full_output_per_million: f64,
    #[serde(default = "default_light_input_rate")]
    pub light_input_per_million: f64,
    #[serde(default = "default_light_output_rate")]
    pub light_output_per_million: f64,
}

fn default_embedding_rate() -> f64 { 0.02 }
fn default_full_input_rate() -> f64 { 3.0 }
fn default_full_output_rate() -> f64 { 15.0 }
fn default_light_input_rate() -> f64 { 0.80 }
fn default_light_output_rate() -> f64 { 4.0 }

impl Default for PricingRates {
    fn default() -> Self {
        Self {
            embedding_per_million: default_embedding_rate(),
            full_input_per_million: default_full_input_rate(),
            full_output_per_million: default_full_output_rate(),
            light_input_per_million: default_light_input_rate(),
            light_output_per_million: default_light_output_rate(),
        }
    }
}

#[inline]
fn round_usd(cost: f64) -> f64 {
    (cost * 1_000_000.0).round() / 1_000_000.0
}

/// Estimated spend of one run, per billed stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub embedding_usd: f64,
    pub reasoning_usd: f64,
    pub total_usd: f64,
}

impl PricingRates {
    fn embedding_raw(&self, tokens: u32) -> f64 {
        tokens as f64 * self.embedding_per_million / 1_000_000.0
    }

    fn reasoning_raw(&self, tier: ModelTier, input_tokens: u32, output_tokens: u32) -> f64 {
        let (input_rate, output_rate) = match tier {
            ModelTier::Full => (self.full_input_per_million, self.full_output_per_million),
            ModelTier::Light => (self.light_input_per_million, self.light_output_per_million),
        };
        (input_tokens as f64 * input_rate + output_tokens as f64 * output_rate) / 1_000_000.0
    }

    /// Per-stage and total cost, each rounded to 6 decimals
    pub fn breakdown(
        &self,
        tier: ModelTier,
        embedding_tokens: u32,
        input_tokens: u32,
        output_tokens: u32,
    ) -> CostBreakdown {
        let embedding = self.embedding_raw(embedding_tokens);
        let reasoning = self.reasoning_raw(tier, input_tokens, output_tokens);
        CostBreakdown {
            embedding_usd: round_usd(embedding),
            reasoning_usd: round_usd(reasoning),
            total_usd: round_usd(embedding + reasoning),
        }
    }

    /// Estimated cost of one run, rounded to 6 decimals
    pub fn estimate(&self, tier: ModelTier, embedding_tokens: u32, input_tokens: u32, output_tokens: u32) -> f64 {
        self.breakdown(tier, embedding_tokens, input_tokens, output_tokens).total_usd
    }
}

/// External collaborators of the matcher
pub struct MatcherServices {
    pub catalog: Arc<CatalogRepository>,
    pub embeddings: Arc<dyn EmbeddingService>,
    /// `None` when no vector store endpoint is configured
    pub vector_store: Option<Arc<dyn VectorStore>>,
    pub snapshot: Arc<SnapshotStore>,
    pub reasoning: Arc<dyn ReasoningService>,
}

/// Tunable constants of the funnel
#[derive(Debug, Clone, Default)]
pub struct MatcherConfig {
    pub weights: ScoringWeights,
    pub resilience: ResilienceAdjustments,
    pub query_weights: QueryWeights,
    pub limits: FunnelLimits,
    pub pricing: PricingRates,
    pub rubric: ReasoningRubric,
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Main matching orchestrator - sequences the four-stage funnel
///
/// # Pipeline Stages
/// 1. Eligibility filter on training willingness
/// 2. Embedding retrieval (vector store, then local snapshot)
/// 3. Structured re-ranking
/// 4. Generative reasoning and validation
pub struct CareerMatcher {
    catalog: Arc<CatalogRepository>,
    retrieval: RetrievalStage,
    scorer: StructuredScorer,
    reasoning: ReasoningStage,
    limits: FunnelLimits,
    pricing: PricingRates,
}

impl CareerMatcher {
    pub fn new(services: MatcherServices, config: MatcherConfig) -> Self {
        let mut sources: Vec<Arc<dyn CandidateSource>> = Vec::new();
        if let Some(store) = services.vector_store {
            sources.push(Arc::new(VectorStoreSource::new(store)));
        }
        sources.push(Arc::new(LocalSnapshotSource::new(services.snapshot)));

        Self {
            catalog: services.catalog,
            retrieval: RetrievalStage::new(
                services.embeddings,
                sources,
                config.query_weights,
                config.limits.retrieval_overfetch,
            ),
            scorer: StructuredScorer::new(config.weights, config.resilience, config.limits.shortlist),
            reasoning: ReasoningStage::new(
                services.reasoning,
                config.rubric,
                config.limits.min_match_score,
                config.limits.max_matches,
            ),
            limits: config.limits,
            pricing: config.pricing,
        }
    }

    pub fn catalog(&self) -> &Arc<CatalogRepository> {
        &self.catalog
    }

    /// Recommend careers for a user
    ///
    /// # Arguments
    /// * `profile` - resume-derived profile, `None` for questionnaire-only users
    /// * `preferences` - the user's explicit selections
    /// * `options` - per-run overrides and cancellation
    ///
    /// # Returns
    /// At most `max_matches` narrated careers, best first, with funnel metadata
    pub async fn match_careers(
        &self,
        profile: Option<&UserProfile>,
        preferences: &UserPreferences,
        options: &MatchOptions,
    ) -> Result<MatchingResult> {
        let Some(token) = options.cancel.as_ref() else {
            return self.run(profile, preferences, options).await;
        };
        if token.is_cancelled() {
            return Err(MatchError::Timeout { service: PIPELINE });
        }

        tokio::select! {
            result = self.run(profile, preferences, options) => result,
            _ = token.cancelled() => {
                tracing::warn!("Matching cancelled by caller");
                Err(MatchError::Timeout { service: PIPELINE })
            }
        }
    }

    async fn run(
        &self,
        profile: Option<&UserProfile>,
        preferences: &UserPreferences,
        options: &MatchOptions,
    ) -> Result<MatchingResult> {
        let started = Instant::now();
        let cancel = options.cancel.as_ref();
        let mut timings = StageTimings::default();

        let catalog = self.catalog.catalog().await?;
        let notes = self.catalog.notes().await;

        let mut effective = preferences.clone();
        if let Some(willingness) = options.training_willingness {
            effective.training_willingness = willingness;
        }
        let tier = options
            .model
            .unwrap_or_else(|| ModelTier::for_profile(profile.is_some()));

        // Stage 1: Eligibility
        let stage = Instant::now();
        let eligible = filter_eligible(&catalog, effective.training_willingness, effective.education_level);
        timings.eligibility_ms = elapsed_ms(stage);
        tracing::info!(
            "Eligibility: {} of {} careers reachable ({:?})",
            eligible.as_ref().map_or(catalog.len(), |set| set.len()),
            catalog.len(),
            effective.training_willingness
        );

        // Stage 2: Retrieval
        let synthesized;
        let query_profile = match profile {
            Some(profile) => profile,
            None => {
                synthesized = UserProfile::from_questionnaire(&effective);
                &synthesized
            }
        };

        let stage = Instant::now();
        let retrieved = self
            .retrieval
            .retrieve(
                query_profile,
                &effective,
                &catalog,
                eligible.as_ref(),
                self.limits.retrieval,
                options.use_vector_store.unwrap_or(true),
                cancel,
            )
            .await?;
        timings.retrieval_ms = elapsed_ms(stage);
        let retrieved_count = retrieved.candidates.len();

        // Stage 3: Structured scoring
        let stage = Instant::now();
        let shortlist = self
            .scorer
            .score(retrieved.candidates, query_profile, effective.salary_target);
        timings.scoring_ms = elapsed_ms(stage);
        tracing::info!("Scoring: shortlisted {} of {} candidates", shortlist.len(), retrieved_count);

        // Stage 4: Reasoning
        let stage = Instant::now();
        let reasoned = self
            .reasoning
            .reason(&shortlist, profile, &effective, tier, &notes, cancel)
            .await?;
        timings.reasoning_ms = elapsed_ms(stage);
        timings.total_ms = elapsed_ms(started);

        let cost = self.pricing.breakdown(
            tier,
            retrieved.embedding_tokens,
            reasoned.input_tokens,
            reasoned.output_tokens,
        );

        tracing::info!(
            "Matched {} careers (tier={:?}, source={:?}, cost=${:.6}, {}ms)",
            reasoned.matches.len(),
            tier,
            retrieved.source,
            cost.total_usd,
            timings.total_ms
        );

        Ok(MatchingResult {
            metadata: MatchingMetadata {
                eligible_count: eligible.as_ref().map(|set| set.len()),
                retrieved_count,
                scored_count: shortlist.len(),
                matched_count: reasoned.matches.len(),
                retrieval_source: retrieved.source,
                model_tier: tier,
                embedding_tokens: retrieved.embedding_tokens,
                reasoning_input_tokens: reasoned.input_tokens,
                reasoning_output_tokens: reasoned.output_tokens,
                embedding_cost_usd: cost.embedding_usd,
                reasoning_cost_usd: cost.reasoning_usd,
                estimated_cost_usd: cost.total_usd,
                timings,
            },
            matches: reasoned.matches,
        })
    }
}
