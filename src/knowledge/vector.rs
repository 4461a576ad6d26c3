//! Vector Store - Dense 검색 트레이트 및 유틸리티
//!
//! 컬렉션 단위 벡터 저장소의 공통 인터페이스입니다.
//! 구현체는 고정된 임베딩 모델을 사용합니다.

use async_trait::async_trait;

use crate::error::Result;

use super::document::Document;

/// `get_all_documents` 스냅샷 상한
pub const MAX_SNAPSHOT_DOCUMENTS: usize = 1000;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 원본 문서
    pub document: Document,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 추가는 누적되며(교체 아님), 저장/임베딩 에러는 컬렉션 이름과 함께 반환됩니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 정규화된 컬렉션 이름
    fn collection(&self) -> &str;

    /// 문서 임베딩 후 저장
    async fn add_documents(&self, documents: &[Document]) -> Result<usize>;

    /// 이미 계산된 임베딩과 함께 저장
    async fn add_embedded(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 유사도 내림차순 상위 `top_k` 문서 (`metadata.cosine_similarity = 1 - distance`)
    async fn get_relevant_documents(&self, query: &str, top_k: usize) -> Result<Vec<Document>>;

    /// 저장된 문서 스냅샷 (최대 [`MAX_SNAPSHOT_DOCUMENTS`])
    async fn get_all_documents(&self) -> Result<Vec<Document>>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위이며, 길이가 다르거나 영벡터이면 0.0입니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Test Support
// ============================================================================

/// 삽입 순서를 관련도 순위로 쓰는 메모리 저장소
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    pub struct MemoryVectorStore {
        collection: String,
        entries: Mutex<Vec<VectorEntry>>,
        queries: AtomicUsize,
    }

    impl MemoryVectorStore {
        pub fn new(collection: &str) -> Self {
            Self {
                collection: collection.to_string(),
                entries: Mutex::new(Vec::new()),
                queries: AtomicUsize::new(0),
            }
        }

        pub fn entries(&self) -> Vec<VectorEntry> {
            self.entries.lock().unwrap().clone()
        }

        pub fn query_count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VectorStore for MemoryVectorStore {
        fn collection(&self) -> &str {
            &self.collection
        }

        async fn add_documents(&self, documents: &[Document]) -> Result<usize> {
            let entries: Vec<VectorEntry> = documents
                .iter()
                .map(|d| VectorEntry {
                    document: d.clone(),
                    embedding: vec![1.0],
                })
                .collect();
            self.add_embedded(&entries).await
        }

        async fn add_embedded(&self, entries: &[VectorEntry]) -> Result<usize> {
            self.entries.lock().unwrap().extend_from_slice(entries);
            Ok(entries.len())
        }

        async fn get_relevant_documents(&self, _query: &str, top_k: usize) -> Result<Vec<Document>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .take(top_k)
                .enumerate()
                .map(|(rank, e)| {
                    let mut doc = e.document.clone();
                    doc.metadata.cosine_similarity = Some(1.0 - rank as f32 * 0.1);
                    doc
                })
                .collect())
        }

        async fn get_all_documents(&self) -> Result<Vec<Document>> {
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .take(MAX_SNAPSHOT_DOCUMENTS)
                .map(|e| e.document.clone())
                .collect())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
