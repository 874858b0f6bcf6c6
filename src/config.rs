use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::{CareerMatcher, MatcherConfig, MatcherServices, PricingRates, ReasoningRubric};
use crate::error::MatchError;
use crate::models::{FunnelLimits, QueryWeights, ResilienceAdjustments, ScoringWeights};
use crate::services::{
    AnthropicClient, CatalogRepository, EmbeddingService, HttpEmbeddingClient, HttpVectorStore,
    ReasoningService, SnapshotStore, TierModel, VectorStore,
};

const ENV_PREFIX: &str = "CAREERS";

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub vector_store: VectorStoreSettings,
    #[serde(default)]
    pub reasoning: ReasoningSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub rubric: ReasoningRubric,
    #[serde(default)]
    pub pricing: PricingRates,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// Optional `career_notes` enrichment table
    pub notes_path: Option<PathBuf>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            snapshot_path: default_snapshot_path(),
            notes_path: None,
        }
    }
}

fn default_catalog_path() -> PathBuf { PathBuf::from("data/careers.json") }
fn default_snapshot_path() -> PathBuf { PathBuf::from("data/career_embeddings.json") }

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            api_key: String::new(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_embedding_endpoint() -> String { "https://api.openai.com/v1".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_embedding_timeout() -> u64 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreSettings {
    /// Leave unset to always use the local snapshot
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_vector_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: String::new(),
            collection: default_collection(),
            timeout_secs: default_vector_store_timeout(),
        }
    }
}

fn default_collection() -> String { "careers".to_string() }
fn default_vector_store_timeout() -> u64 { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningSettings {
    #[serde(default = "default_reasoning_url")]
    pub api_url: String,
    #[serde(default = "default_reasoning_version")]
    pub api_version: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_full_model")]
    pub full_model: String,
    #[serde(default = "default_full_max_tokens")]
    pub full_max_tokens: u32,
    #[serde(default = "default_light_model")]
    pub light_model: String,
    #[serde(default = "default_light_max_tokens")]
    pub light_max_tokens: u32,
    #[serde(default = "default_reasoning_timeout")]
    pub timeout_secs: u64,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            api_url: default_reasoning_url(),
            api_version: default_reasoning_version(),
            api_key: String::new(),
            full_model: default_full_model(),
            full_max_tokens: default_full_max_tokens(),
            light_model: default_light_model(),
            light_max_tokens: default_light_max_tokens(),
            timeout_secs: default_reasoning_timeout(),
        }
    }
}

fn default_reasoning_url() -> String { crate::services::reasoning::DEFAULT_API_URL.to_string() }
fn default_reasoning_version() -> String { crate::services::reasoning::DEFAULT_API_VERSION.to_string() }
fn default_full_model() -> String { "claude-sonnet-4-5".to_string() }
fn default_full_max_tokens() -> u32 { 8192 }
fn default_light_model() -> String { "claude-haiku-4-5".to_string() }
fn default_light_max_tokens() -> u32 { 4096 }
fn default_reasoning_timeout() -> u64 { 90 }

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,
    #[serde(default = "default_retrieval_overfetch")]
    pub retrieval_overfetch: usize,
    #[serde(default = "default_shortlist_limit")]
    pub shortlist_limit: usize,
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
    #[serde(default = "default_min_match_score")]
    pub min_match_score: u8,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            retrieval_limit: default_retrieval_limit(),
            retrieval_overfetch: default_retrieval_overfetch(),
            shortlist_limit: default_shortlist_limit(),
            max_matches: default_max_matches(),
            min_match_score: default_min_match_score(),
        }
    }
}

fn default_retrieval_limit() -> usize { 50 }
fn default_retrieval_overfetch() -> usize { 100 }
fn default_shortlist_limit() -> usize { 30 }
fn default_max_matches() -> usize { 15 }
fn default_min_match_score() -> u8 { 60 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_skill_overlap_weight")]
    pub skill_overlap: f64,
    #[serde(default = "default_education_weight")]
    pub education: f64,
    #[serde(default = "default_salary_weight")]
    pub salary: f64,
    #[serde(default = "default_similarity_weight")]
    pub similarity: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            skill_overlap: default_skill_overlap_weight(),
            education: default_education_weight(),
            salary: default_salary_weight(),
            similarity: default_similarity_weight(),
        }
    }
}

fn default_skill_overlap_weight() -> f64 { 0.35 }
fn default_education_weight() -> f64 { 0.15 }
fn default_salary_weight() -> f64 { 0.15 }
fn default_similarity_weight() -> f64 { 0.35 }

#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    #[serde(default = "default_ai_resilient_delta")]
    pub ai_resilient: f64,
    #[serde(default = "default_stable_delta")]
    pub stable: f64,
    #[serde(default = "default_at_risk_delta")]
    pub at_risk: f64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            ai_resilient: default_ai_resilient_delta(),
            stable: default_stable_delta(),
            at_risk: default_at_risk_delta(),
        }
    }
}

fn default_ai_resilient_delta() -> f64 { 0.10 }
fn default_stable_delta() -> f64 { 0.05 }
fn default_at_risk_delta() -> f64 { -0.10 }

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSettings {
    #[serde(default = "default_task_weight")]
    pub task_weight: f64,
    #[serde(default = "default_narrative_weight")]
    pub narrative_weight: f64,
    #[serde(default = "default_skills_weight")]
    pub skills_weight: f64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            task_weight: default_task_weight(),
            narrative_weight: default_narrative_weight(),
            skills_weight: default_skills_weight(),
        }
    }
}

fn default_task_weight() -> f64 { 0.5 }
fn default_narrative_weight() -> f64 { 0.3 }
fn default_skills_weight() -> f64 { 0.2 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingSettings {
    /// `LOG_LEVEL` and `LOG_FORMAT` take precedence over the config file
    pub fn with_overrides(self, level: Option<String>, format: Option<String>) -> Self {
        Self {
            level: level.filter(|l| !l.trim().is_empty()).unwrap_or(self.level),
            format: format.filter(|f| !f.trim().is_empty()).unwrap_or(self.format),
        }
    }

    pub fn is_pretty(&self) -> bool {
        self.format.eq_ignore_ascii_case("pretty")
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "compact".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml, then config/local.toml)
    /// 3. Environment variables (prefixed with CAREERS__)
    /// 4. Provider key variables for secrets still unset
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., CAREERS__SERVER__PORT -> server.port
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Funnel constants for the matcher
    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig {
            weights: ScoringWeights {
                skill_overlap: self.scoring.weights.skill_overlap,
                education: self.scoring.weights.education,
                salary: self.scoring.weights.salary,
                similarity: self.scoring.weights.similarity,
            },
            resilience: ResilienceAdjustments {
                ai_resilient: self.scoring.resilience.ai_resilient,
                stable: self.scoring.resilience.stable,
                at_risk: self.scoring.resilience.at_risk,
            },
            query_weights: QueryWeights {
                task: self.retrieval.task_weight,
                narrative: self.retrieval.narrative_weight,
                skills: self.retrieval.skills_weight,
            },
            limits: FunnelLimits {
                retrieval: self.matching.retrieval_limit,
                retrieval_overfetch: self.matching.retrieval_overfetch,
                shortlist: self.matching.shortlist_limit,
                max_matches: self.matching.max_matches,
                min_match_score: self.matching.min_match_score,
            },
            pricing: self.pricing,
            rubric: self.rubric,
        }
    }

    /// Build the matcher and its service clients
    ///
    /// Fails with `Configuration` when a required credential is missing
    /// or a funnel limit is outside its fixed bounds.
    pub fn build_matcher(&self) -> Result<CareerMatcher, MatchError> {
        let config = self.matcher_config();
        config.limits.check().map_err(MatchError::Configuration)?;

        let catalog = Arc::new(CatalogRepository::from_path(
            self.catalog.path.clone(),
            self.catalog.notes_path.clone(),
        ));
        let snapshot = Arc::new(SnapshotStore::from_path(self.catalog.snapshot_path.clone()));

        let embeddings: Arc<dyn EmbeddingService> = Arc::new(HttpEmbeddingClient::new(
            self.embedding.endpoint.clone(),
            self.embedding.api_key.clone(),
            self.embedding.model.clone(),
            Duration::from_secs(self.embedding.timeout_secs),
        )?);

        let vector_store: Option<Arc<dyn VectorStore>> = match self
            .vector_store
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            Some(endpoint) => Some(Arc::new(HttpVectorStore::new(
                endpoint.to_string(),
                self.vector_store.api_key.clone(),
                self.vector_store.collection.clone(),
                Duration::from_secs(self.vector_store.timeout_secs),
            )?)),
            None => {
                tracing::info!("No vector store endpoint configured, using local snapshot only");
                None
            }
        };

        let reasoning: Arc<dyn ReasoningService> = Arc::new(AnthropicClient::new(
            self.reasoning.api_url.clone(),
            self.reasoning.api_version.clone(),
            self.reasoning.api_key.clone(),
            TierModel {
                model: self.reasoning.full_model.clone(),
                max_tokens: self.reasoning.full_max_tokens,
            },
            TierModel {
                model: self.reasoning.light_model.clone(),
                max_tokens: self.reasoning.light_max_tokens,
            },
            Duration::from_secs(self.reasoning.timeout_secs),
        )?);

        Ok(CareerMatcher::new(
            MatcherServices {
                catalog,
                embeddings,
                vector_store,
                snapshot,
                reasoning,
            },
            config,
        ))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Fill unset secrets from the provider's conventional variables
/// e.g., OPENAI_API_KEY -> embedding.api_key
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let fallbacks = [
        ("embedding.api_key", "OPENAI_API_KEY"),
        ("reasoning.api_key", "ANTHROPIC_API_KEY"),
        ("vector_store.api_key", "VECTOR_STORE_API_KEY"),
    ];

    let mut overrides = Vec::new();
    for (key, var) in fallbacks {
        let configured = settings.get_string(key).unwrap_or_default();
        if !configured.trim().is_empty() {
            continue;
        }
        if let Ok(value) = env::var(var) {
            overrides.push((key, value));
        }
    }

    if overrides.is_empty() {
        return Ok(settings);
    }

    let mut builder = Config::builder().add_source(settings);
    for (key, value) in overrides {
        builder = builder.set_override(key, value)?;
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_weights() {
        let weights = WeightsConfig::default();
        assert_eq!(weights.skill_overlap, 0.35);
        assert_eq!(weights.education, 0.15);
        assert_eq!(weights.salary, 0.15);
        assert_eq!(weights.similarity, 0.35);
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "compact");
    }

    #[test]
    fn test_logging_env_overrides_config() {
        let logging = LoggingSettings {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        };

        let kept = logging.clone().with_overrides(None, Some(" ".to_string()));
        assert_eq!(kept.level, "debug");
        assert!(kept.is_pretty());

        let overridden = logging.with_overrides(Some("warn".to_string()), Some("compact".to_string()));
        assert_eq!(overridden.level, "warn");
        assert!(!overridden.is_pretty());
    }

    #[test]
    fn test_logging_section_loaded_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[logging]\nlevel = \"career_match=debug\"\nformat = \"pretty\"").unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.logging.level, "career_match=debug");
        assert!(settings.logging.is_pretty());
    }

    #[test]
    fn test_out_of_bounds_limits_rejected() {
        let mut settings = Settings::default();
        settings.embedding.api_key = "embed-key".to_string();
        settings.reasoning.api_key = "reasoning-key".to_string();
        settings.matching.min_match_score = 40;

        match settings.build_matcher() {
            Err(MatchError::Configuration(message)) => assert!(message.contains("min match score")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("expected a configuration error"),
        }

        settings.matching.min_match_score = 60;
        settings.matching.retrieval_limit = 80;
        assert!(matches!(settings.build_matcher(), Err(MatchError::Configuration(_))));

        settings.matching.retrieval_limit = 50;
        settings.matching.retrieval_overfetch = 40;
        assert!(matches!(settings.build_matcher(), Err(MatchError::Configuration(_))));

        settings.matching.retrieval_overfetch = 100;
        assert!(settings.build_matcher().is_ok());
    }

    #[test]
    fn test_matcher_config_defaults_match_funnel() {
        let config = Settings::default().matcher_config();
        assert_eq!(config.limits, FunnelLimits::default());
        assert_eq!(config.weights, ScoringWeights::default());
        assert_eq!(config.resilience, ResilienceAdjustments::default());
        assert_eq!(config.query_weights, QueryWeights::default());
        assert_eq!(config.rubric, ReasoningRubric::default());
    }

    #[test]
    fn test_load_from_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[matching]\nmax_matches = 10\n\n[scoring.resilience]\nat_risk = -0.2\n\n[vector_store]\nendpoint = \"http://localhost:6333\""
        )
        .unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.matching.max_matches, 10);
        assert_eq!(settings.matching.shortlist_limit, 30);
        assert_eq!(settings.scoring.resilience.at_risk, -0.2);
        assert_eq!(settings.scoring.resilience.stable, 0.05);
        assert_eq!(settings.vector_store.endpoint.as_deref(), Some("http://localhost:6333"));
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn test_missing_reasoning_key_is_configuration_error() {
        let mut settings = Settings::default();
        settings.embedding.api_key = "embed-key".to_string();
        settings.reasoning.api_key = String::new();

        match settings.build_matcher() {
            Err(MatchError::Configuration(message)) => assert!(message.contains("reasoning")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("expected a configuration error"),
        }
    }
}
