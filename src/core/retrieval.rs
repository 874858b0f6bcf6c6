use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use crate::core::similarity::weighted_similarity;
use crate::error::{MatchError, Result};
use crate::models::{CareerCandidate, QueryWeights, RetrievalSource, UserPreferences, UserProfile};
use crate::services::{
    CancelToken, Catalog, EmbeddingService, QueryVectors, SnapshotStore, VectorStore,
};

/// Semantic query strings derived from a profile
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileQueries {
    pub task: String,
    pub narrative: String,
    /// Only present when the profile lists skills
    pub skills: Option<String>,
}

/// Build the task, narrative and skills query strings
pub fn build_queries(profile: &UserProfile, preferences: &UserPreferences) -> ProfileQueries {
    let backgrounds: Vec<&str> = dedup(preferences.work_background.iter().map(|b| b.label()));

    let mut task = if profile.job_titles.is_empty() {
        if backgrounds.is_empty() {
            "Entry-level work across industries".to_string()
        } else {
            format!("Work in {}", backgrounds.join(", "))
        }
    } else {
        format!("Tasks performed as {}", profile.job_titles.join(", "))
    };
    if !profile.job_titles.is_empty() && !profile.industries.is_empty() {
        task.push_str(&format!(" in {}", profile.industries.join(", ")));
    }
    if profile.experience_years > 0 {
        task.push_str(&format!(" with {} years of experience", profile.experience_years));
    }
    if !profile.education.fields.is_empty() {
        task.push_str(&format!(". Studied {}", profile.education.fields.join(", ")));
    }

    let styles: Vec<&str> = dedup(preferences.work_style.iter().map(|s| s.label()));
    let mut narrative = if styles.is_empty() {
        "Someone".to_string()
    } else {
        format!("Someone who prefers {} work", styles.join(" and "))
    };
    if !backgrounds.is_empty() {
        narrative.push_str(&format!(" with a background in {}", backgrounds.join(", ")));
    }
    narrative.push_str(&format!(
        ", looking for a career paying {} and willing to invest {} in training.",
        preferences.salary_target.label(),
        preferences.training_willingness.label().to_lowercase()
    ));
    if let Some(context) = preferences
        .additional_context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        narrative.push(' ');
        narrative.push_str(context);
    }

    let skills: Vec<&str> = dedup(
        profile
            .skills
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty()),
    );
    let skills = if skills.is_empty() {
        None
    } else {
        Some(format!("Skills: {}", skills.join(", ")))
    };

    ProfileQueries {
        task,
        narrative,
        skills,
    }
}

fn dedup<'a>(items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.to_lowercase())).collect()
}

/// Inputs shared by every candidate source for one retrieval
pub struct SourceRequest<'a> {
    pub vectors: &'a QueryVectors,
    pub weights: QueryWeights,
    pub eligible: Option<&'a HashSet<String>>,
    pub limit: usize,
    pub overfetch: usize,
    pub catalog: &'a Catalog,
    pub cancel: Option<&'a CancelToken>,
}

impl SourceRequest<'_> {
    /// Raw candidates to ask for; more than `limit` when a filter will discard some
    pub fn raw_limit(&self) -> usize {
        if self.eligible.is_some() {
            self.overfetch.max(self.limit)
        } else {
            self.limit
        }
    }
}

/// One way of producing similarity-ranked candidates
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn kind(&self) -> RetrievalSource;

    async fn fetch(&self, request: &SourceRequest<'_>) -> Result<Vec<CareerCandidate>>;
}

/// Sort descending by similarity, apply the eligibility set, then truncate
pub fn filter_and_truncate(
    mut candidates: Vec<CareerCandidate>,
    eligible: Option<&HashSet<String>>,
    limit: usize,
) -> Vec<CareerCandidate> {
    if let Some(eligible) = eligible {
        candidates.retain(|c| eligible.contains(&c.slug));
    }
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.slug.cmp(&b.slug))
    });
    candidates.truncate(limit);
    candidates
}

/// Remote nearest-neighbour search
pub struct VectorStoreSource {
    store: Arc<dyn VectorStore>,
}

impl VectorStoreSource {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CandidateSource for VectorStoreSource {
    fn kind(&self) -> RetrievalSource {
        RetrievalSource::VectorStore
    }

    async fn fetch(&self, request: &SourceRequest<'_>) -> Result<Vec<CareerCandidate>> {
        let raw_limit = request.raw_limit();
        let hits = self
            .store
            .query(request.vectors, request.weights, raw_limit, request.cancel)
            .await?;

        tracing::debug!("Vector store returned {} raw candidates (asked for {})", hits.len(), raw_limit);

        let mut seen = HashSet::new();
        let candidates = hits
            .into_iter()
            .filter(|hit| seen.insert(hit.slug.clone()))
            .map(|hit| {
                let entry = request.catalog.get(&hit.slug).cloned();
                if entry.is_none() {
                    tracing::warn!("Vector store returned unknown slug {}", hit.slug);
                }
                let similarity = if hit.similarity.is_finite() {
                    hit.similarity.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                CareerCandidate::new(hit.slug, entry, similarity)
            })
            .collect();

        Ok(filter_and_truncate(candidates, request.eligible, request.limit))
    }
}

/// In-process similarity over the local embedding snapshot
pub struct LocalSnapshotSource {
    snapshot: Arc<SnapshotStore>,
}

impl LocalSnapshotSource {
    pub fn new(snapshot: Arc<SnapshotStore>) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl CandidateSource for LocalSnapshotSource {
    fn kind(&self) -> RetrievalSource {
        RetrievalSource::LocalSnapshot
    }

    async fn fetch(&self, request: &SourceRequest<'_>) -> Result<Vec<CareerCandidate>> {
        let snapshot = self.snapshot.load().await?;

        let candidates = snapshot
            .entries
            .iter()
            .filter(|e| request.eligible.map_or(true, |set| set.contains(&e.slug)))
            .map(|e| {
                let similarity = weighted_similarity(request.vectors, e, &request.weights);
                CareerCandidate::new(e.slug.clone(), request.catalog.get(&e.slug).cloned(), similarity)
            })
            .collect();

        Ok(filter_and_truncate(candidates, request.eligible, request.limit))
    }
}

/// Candidates plus where they came from
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub candidates: Vec<CareerCandidate>,
    pub source: RetrievalSource,
    pub embedding_tokens: u32,
}

/// Embedding retrieval stage
///
/// Sources are tried in order. A failing source is logged and the next one
/// is tried; the stage only fails when every enabled source failed.
pub struct RetrievalStage {
    embeddings: Arc<dyn EmbeddingService>,
    sources: Vec<Arc<dyn CandidateSource>>,
    weights: QueryWeights,
    overfetch: usize,
}

impl RetrievalStage {
    pub fn new(
        embeddings: Arc<dyn EmbeddingService>,
        sources: Vec<Arc<dyn CandidateSource>>,
        weights: QueryWeights,
        overfetch: usize,
    ) -> Self {
        Self {
            embeddings,
            sources,
            weights,
            overfetch,
        }
    }

    /// Embed the profile queries, concurrently
    pub async fn embed_queries(
        &self,
        queries: &ProfileQueries,
        cancel: Option<&CancelToken>,
    ) -> Result<(QueryVectors, u32)> {
        let skills = async {
            match &queries.skills {
                Some(text) => self.embeddings.embed(text, cancel).await.map(Some),
                None => Ok(None),
            }
        };

        let (task, narrative, skills) = tokio::try_join!(
            self.embeddings.embed(&queries.task, cancel),
            self.embeddings.embed(&queries.narrative, cancel),
            skills,
        )?;

        let tokens = task.tokens + narrative.tokens + skills.as_ref().map_or(0, |s| s.tokens);
        let vectors = QueryVectors {
            task: task.vector,
            narrative: narrative.vector,
            skills: skills.map(|s| s.vector),
        };
        Ok((vectors, tokens))
    }

    /// Retrieve the top candidates by weighted vector similarity
    ///
    /// # Arguments
    /// * `eligible` - slugs allowed by the eligibility filter, `None` for no filtering
    /// * `limit` - maximum number of candidates returned
    /// * `use_vector_store` - when false, remote sources are skipped
    #[allow(clippy::too_many_arguments)]
    pub async fn retrieve(
        &self,
        profile: &UserProfile,
        preferences: &UserPreferences,
        catalog: &Catalog,
        eligible: Option<&HashSet<String>>,
        limit: usize,
        use_vector_store: bool,
        cancel: Option<&CancelToken>,
    ) -> Result<RetrievalOutcome> {
        let queries = build_queries(profile, preferences);
        let (vectors, embedding_tokens) = self.embed_queries(&queries, cancel).await?;

        let weights = if vectors.skills.is_some() {
            self.weights
        } else {
            self.weights.without_skills()
        };

        let request = SourceRequest {
            vectors: &vectors,
            weights,
            eligible,
            limit,
            overfetch: self.overfetch,
            catalog,
            cancel,
        };

        let mut failures = Vec::new();
        for source in &self.sources {
            let kind = source.kind();
            if kind == RetrievalSource::VectorStore && !use_vector_store {
                continue;
            }

            match source.fetch(&request).await {
                Ok(candidates) => {
                    tracing::info!("Retrieved {} candidates from {:?}", candidates.len(), kind);
                    return Ok(RetrievalOutcome {
                        candidates,
                        source: kind,
                        embedding_tokens,
                    });
                }
                Err(e) if cancel.is_some_and(|c| c.is_cancelled()) => return Err(e),
                Err(e) => {
                    tracing::warn!("Candidate source {:?} failed, trying next: {}", kind, e);
                    failures.push(format!("{:?}: {}", kind, e));
                }
            }
        }

        if failures.is_empty() {
            failures.push("no candidate source enabled".to_string());
        }
        Err(MatchError::NoCandidateSource(failures.join("; ")))
    }
}
