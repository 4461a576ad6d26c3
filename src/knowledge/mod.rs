//! Knowledge 모듈 - 하이브리드 검색 저장소
//!
//! - Document: `{page_content, metadata}` 레코드와 컬렉션 이름 정규화
//! - Store: 컬렉션별 JSONL Document Store (Sparse 인덱스 원천)
//! - Lance: LanceDB Dense 검색 (코사인)
//! - Sparse: SQLite FTS5 BM25 인덱스와 컬렉션별 레지스트리
//! - Hybrid: Dense/Sparse 결과 재배치 및 결합

mod document;
mod hybrid;
mod lance;
mod sparse;
mod store;
mod vector;

// Re-exports
pub use document::{
    format_collection_name, normalize_collection_name, Document, Metadata,
    MAX_COLLECTION_NAME_LEN, MIN_COLLECTION_NAME_LEN,
};
pub use hybrid::{
    combine_results, long_context_reorder, HybridMerger, SearchOutcome, SearchResponse,
    SearchStatus, DEFAULT_TOP_K,
};
pub use lance::LanceVectorStore;
pub use sparse::{IndexState, SparseIndex, SparseRegistry};
pub use store::{DocumentStore, StoreStats};
pub use vector::{cosine_similarity, VectorEntry, VectorStore, MAX_SNAPSHOT_DOCUMENTS};

#[cfg(test)]
pub(crate) use vector::testing;
