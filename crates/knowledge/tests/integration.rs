//! Integration tests for loading and querying the knowledge base from disk.

use std::sync::Arc;

use asclepius_common::DocumentRetriever;
use asclepius_knowledge::{DocumentStore, KnowledgeConfig, KnowledgeRetriever};
use tempfile::TempDir;

fn write_corpus(dir: &TempDir) {
    std::fs::write(
        dir.path().join("influenza.md"),
        "# Influenza\n\nCommon flu symptoms are fever, chills, cough and body aches.\n\n\
         Most people recover within a week.",
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("cardiology")).unwrap();
    std::fs::write(
        dir.path().join("cardiology").join("hypertension.txt"),
        "Hypertension is persistently high blood pressure.",
    )
    .unwrap();
    std::fs::write(dir.path().join("scan.png"), [0x89, b'P', b'N', b'G']).unwrap();
}

fn config_for(dir: &TempDir) -> KnowledgeConfig {
    KnowledgeConfig {
        docs_dir: Some(dir.path().to_path_buf()),
        chunk_chars: 40,
        min_score: 0.2,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_open_loads_matching_files_recursively() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);

    let store = DocumentStore::open(config_for(&dir)).await.unwrap();

    // influenza.md splits into heading, symptoms, recovery; the png is ignored
    assert_eq!(store.count().await, 4);
}

#[tokio::test]
async fn test_retriever_returns_scored_documents() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let store = Arc::new(DocumentStore::open(config_for(&dir)).await.unwrap());
    let retriever = KnowledgeRetriever::new(store);

    let docs = retriever.retrieve("What are symptoms of flu?").await.unwrap();

    assert!(!docs.is_empty());
    assert_eq!(docs[0].source, "Influenza");
    assert_eq!(docs[0].source_path, "influenza.md");
    assert!(docs[0].content.contains("fever"));
    assert!(docs.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn test_retriever_respects_top_k_and_threshold() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let store = Arc::new(DocumentStore::open(config_for(&dir)).await.unwrap());

    let none = KnowledgeRetriever::new(store.clone())
        .retrieve("rare tropical parasite")
        .await
        .unwrap();
    assert!(none.is_empty());

    let one = KnowledgeRetriever::new(store)
        .with_top_k(1)
        .with_min_score(0.0)
        .retrieve("fever blood pressure")
        .await
        .unwrap();
    assert_eq!(one.len(), 1);
}

#[tokio::test]
async fn test_missing_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = KnowledgeConfig {
        docs_dir: Some(dir.path().join("missing")),
        ..Default::default()
    };
    assert!(DocumentStore::open(config).await.is_err());
}
