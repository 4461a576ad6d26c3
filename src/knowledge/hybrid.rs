//! 하이브리드 검색 - Dense + Sparse 결과 병합
//!
//! 1. Dense 저장소에서 `top_k / 2`개 조회
//! 2. Sparse 인덱스 전체 매치 중 앞쪽 `top_k / 2`개
//! 3. Dense 결과를 long-context 순서로 재배치 (관련도 높은 문서를 양 끝으로)
//! 4. `dense[..top_k/4] + sparse + dense[top_k/4..top_k/2]` 순으로 결합
//!
//! Sparse 인덱스가 없으면 Dense 단독 검색으로 대체하지 않고 즉시 실패합니다.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

use super::document::{Document, Metadata};
use super::sparse::IndexState;
use super::vector::VectorStore;

/// 기본 결과 수
pub const DEFAULT_TOP_K: usize = 8;

const SUCCESS_MESSAGE: &str = "Documents retrieved successfully.";
const EMPTY_MESSAGE: &str = "No relevant documents found.";
const EMPTY_ERROR: &str = "No relevant documents found";

// ============================================================================
// Ordering Policies
// ============================================================================

/// Long-context 재배치
///
/// 관련도 순 목록을 받아 가장 관련 높은 항목을 양 끝에, 가장 낮은 항목을 가운데에 둡니다.
/// 항목을 그대로 옮기므로 본문이 같은 문서도 서로 구분됩니다.
/// ref: https://arxiv.org/abs/2307.03172
pub fn long_context_reorder<T>(items: Vec<T>) -> Vec<T> {
    let mut reordered = VecDeque::with_capacity(items.len());
    for (i, item) in items.into_iter().rev().enumerate() {
        if i % 2 == 1 {
            reordered.push_back(item);
        } else {
            reordered.push_front(item);
        }
    }
    reordered.into()
}

/// 고정 슬라이스 결합: `dense[..top_k/4] + sparse + dense[top_k/4..top_k/2]`
///
/// 입력이 짧으면 있는 만큼만 사용하며 채우지 않습니다.
pub fn combine_results<T>(dense: Vec<T>, sparse: Vec<T>, top_k: usize) -> Vec<T> {
    let half = (top_k / 2).min(dense.len());
    let quarter = (top_k / 4).min(half);

    let mut dense = dense.into_iter().take(half);
    let mut combined = Vec::with_capacity(half + sparse.len());
    combined.extend(dense.by_ref().take(quarter));
    combined.extend(sparse);
    combined.extend(dense);
    combined
}

// ============================================================================
// Search Results
// ============================================================================

/// 병합 결과
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<Document>),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Success,
    Error,
}

/// 검색 응답 페이로드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub message: String,
    pub results: Vec<Document>,
    pub status: SearchStatus,
}

impl SearchResponse {
    pub fn success(results: Vec<Document>) -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
            results,
            status: SearchStatus::Success,
        }
    }

    /// 빈 결과 페이로드 (자리표시자 결과 1개)
    pub fn empty() -> Self {
        tracing::warn!("{}", EMPTY_MESSAGE);
        let placeholder = Document::new(
            "",
            Metadata {
                error: Some(EMPTY_ERROR.to_string()),
                ..Default::default()
            },
        );
        Self {
            message: EMPTY_MESSAGE.to_string(),
            results: vec![placeholder],
            status: SearchStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SearchStatus::Success
    }
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Found(documents) => Self::success(documents),
            SearchOutcome::Empty => Self::empty(),
        }
    }
}

// ============================================================================
// HybridMerger
// ============================================================================

/// 하이브리드 검색기
///
/// 한 컬렉션의 Dense 저장소와 그 시점의 Sparse 인덱스 스냅샷으로 동작합니다.
pub struct HybridMerger {
    dense: Arc<dyn VectorStore>,
    sparse: IndexState,
}

impl HybridMerger {
    pub fn new(dense: Arc<dyn VectorStore>, sparse: IndexState) -> Self {
        Self { dense, sparse }
    }

    pub fn collection(&self) -> &str {
        self.dense.collection()
    }

    /// 하이브리드 검색
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<SearchOutcome> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("Query must be provided".to_string()));
        }

        let index = match &self.sparse {
            IndexState::Ready(index) => Arc::clone(index),
            IndexState::NotInitialized => {
                tracing::error!("Sparse index is not initialized for '{}'", self.collection());
                return Err(RagError::IndexUnavailable(self.collection().to_string()));
            }
        };

        tracing::info!("Searching for query: '{}' with top_k: {}", query, top_k);

        let dense_results = self.dense.get_relevant_documents(query, top_k / 2).await?;
        tracing::info!("Dense results fetched: {}", dense_results.len());

        let owned_query = query.to_string();
        let mut sparse_results =
            tokio::task::spawn_blocking(move || index.get_relevant_documents(&owned_query))
                .await
                .map_err(|e| {
                    RagError::storage(self.collection(), format!("sparse search task failed: {}", e))
                })??;
        tracing::info!("Sparse results fetched: {}", sparse_results.len());
        sparse_results.truncate(top_k / 2);

        let reordered = long_context_reorder(dense_results);
        let combined = combine_results(reordered, sparse_results, top_k);

        if combined.is_empty() {
            return Ok(SearchOutcome::Empty);
        }

        for (i, doc) in combined.iter().enumerate() {
            tracing::debug!("Document {} - source: {}", i, doc.metadata.source);
        }
        Ok(SearchOutcome::Found(combined))
    }
}

// ============================================================================
// Tests
// ============================================================================
