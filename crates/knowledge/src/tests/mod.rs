//! Cross-component tests for retrieval and ranking.

mod rag_ranking;
