//! Medical document store for Asclepius.
//!
//! Documents are split into paragraph chunks held in memory and scored
//! against queries by keyword overlap. [`KnowledgeRetriever`] exposes the
//! store to the routing core as a [`DocumentRetriever`].
//!
//! [`DocumentRetriever`]: asclepius_common::DocumentRetriever

pub mod retrieval;
pub mod store;
pub mod types;

pub use retrieval::KnowledgeRetriever;
pub use store::DocumentStore;
pub use types::{Chunk, KnowledgeConfig};
