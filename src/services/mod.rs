// Service exports
pub mod catalog;
pub mod embeddings;
pub mod reasoning;
pub mod snapshot;
pub mod transport;
pub mod vector_store;

pub use catalog::{Catalog, CatalogRepository, CareerNotes, CareerNotesTable};
pub use embeddings::{Embedding, EmbeddingBatch, EmbeddingService, HttpEmbeddingClient};
pub use reasoning::{AnthropicClient, Completion, ReasoningService, TierModel};
pub use snapshot::{EmbeddingSnapshot, SnapshotEntry, SnapshotStore};
pub use transport::{CancelHandle, CancelToken};
pub use vector_store::{HttpVectorStore, QueryVectors, ScoredSlug, VectorStore};
