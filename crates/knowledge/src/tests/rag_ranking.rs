//! Tests for ranking correctness of the vector index.

use crate::index::{SqliteIndex, VectorIndex};
use crate::types::{IndexedRecord, Metadata, SourcePassage};
use tempfile::TempDir;

/// Helper to create a test record.
fn create_test_record(id: &str, text: &str, vector: Vec<f32>) -> IndexedRecord {
    IndexedRecord {
        id: id.to_string(),
        vector,
        text: text.to_string(),
        metadata: Metadata::new(),
    }
}

/// Helper to create a normalized vector.
fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn open_index(temp: &TempDir) -> SqliteIndex {
    SqliteIndex::open(temp.path(), "ranking").unwrap()
}

#[test]
fn test_relevant_query_ranks_first() {
    let temp = TempDir::new().unwrap();
    let index = open_index(&temp);

    // Query will be about "rust programming"
    index.add(&[
        create_test_record(
            "rec1",
            "Rust is a systems programming language",
            normalize(&[1.0, 0.5, 0.2, 0.1]),
        ),
        create_test_record(
            "rec2",
            "Cooking recipes for pasta",
            normalize(&[-0.3, -0.8, 0.4, -0.2]),
        ),
    ]);

    let query = normalize(&[0.9, 0.4, 0.3, 0.1]);
    let results = index.search(&query, 5, None);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "rec1", "Most relevant record should be first");

    let similarity = SourcePassage::from_result(&results[0]).similarity;
    assert!(similarity > 0.8, "Relevant similarity should be high: {}", similarity);
    assert!(results[0].distance < results[1].distance);
}

#[test]
fn test_unrelated_query_has_large_distance() {
    let temp = TempDir::new().unwrap();
    let index = open_index(&temp);

    index.add(&[create_test_record(
        "rec1",
        "Rust programming language features",
        normalize(&[1.0, 0.0, 0.0, 0.0]),
    )]);

    // Orthogonal query
    let results = index.search(&normalize(&[0.0, 1.0, 0.0, 0.0]), 5, None);

    // Still returned, but far away
    assert_eq!(results.len(), 1);
    let distance = results[0].distance.unwrap();
    assert!((distance - 1.0).abs() < 1e-5, "Orthogonal distance should be 1: {}", distance);
    assert_eq!(SourcePassage::from_result(&results[0]).similarity, 0.0);
}

#[test]
fn test_distances_are_ordered_ascending() {
    let temp = TempDir::new().unwrap();
    let index = open_index(&temp);

    index.add(&[
        create_test_record("rec3", "Text C", normalize(&[0.0, 1.0, 0.0])),
        create_test_record("rec1", "Text A", normalize(&[1.0, 0.0, 0.0])),
        create_test_record("rec4", "Text D", normalize(&[-1.0, 0.0, 0.0])),
        create_test_record("rec2", "Text B", normalize(&[0.7, 0.7, 0.0])),
    ]);

    let results = index.search(&normalize(&[1.0, 0.0, 0.0]), 10, None);
    let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["rec1", "rec2", "rec3", "rec4"]);

    for pair in results.windows(2) {
        assert!(
            pair[0].distance <= pair[1].distance,
            "Distances should be ordered: {:?} <= {:?}",
            pair[0].distance,
            pair[1].distance
        );
    }

    assert!(results[0].distance.unwrap() < 0.01, "Perfect match should be near 0");
}

#[test]
fn test_opposite_vector_has_maximum_distance() {
    let temp = TempDir::new().unwrap();
    let index = open_index(&temp);

    index.add(&[create_test_record("rec1", "Text", vec![1.0, 0.0])]);

    let results = index.search(&[-1.0, 0.0], 1, None);
    let distance = results[0].distance.unwrap();
    assert!((distance - 2.0).abs() < 1e-5);

    // Similarity never drops below zero
    assert_eq!(SourcePassage::from_result(&results[0]).similarity, 0.0);
}

#[test]
fn test_self_retrieval_ranks_first() {
    let temp = TempDir::new().unwrap();
    let index = open_index(&temp);

    let records: Vec<IndexedRecord> = (0..8)
        .map(|i| {
            let angle = i as f32 * 0.35;
            create_test_record(&format!("rec{}", i), "text", vec![angle.cos(), angle.sin()])
        })
        .collect();
    index.add(&records);

    for record in &records {
        let results = index.search(&record.vector, 3, None);
        assert_eq!(results[0].id, record.id);
        assert!(results[0].distance.unwrap() < 1e-5);
    }
}
