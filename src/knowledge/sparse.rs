//! Sparse Index - 컬렉션 단위 BM25 키워드 검색
//!
//! Document Store의 전체 레코드로 메모리 내 SQLite FTS5 테이블을 만듭니다.
//! 증분 갱신은 없고, 수집이 끝날 때마다 통째로 다시 만들어 교체합니다.
//! source: https://www.sqlite.org/fts5.html#the_bm25_function
//!
//! - 토크나이저: `unicode61` (한글 음절 포함 유니코드 단어 단위)
//! - 쿼리 단어는 OR로 결합
//! - 정렬: `bm25()` 오름차순, 동점이면 삽입 순서

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use rusqlite::{params, Connection};

use crate::error::{RagError, Result};
use crate::ingest::chunker::tokenize_words;

use super::document::Document;
use super::store::DocumentStore;

// ============================================================================
// SparseIndex
// ============================================================================

/// 한 컬렉션의 BM25 인덱스 (읽기 전용)
pub struct SparseIndex {
    collection: String,
    conn: Mutex<Connection>,
    documents: Vec<Document>,
}

/// 인덱스 상태
///
/// 빈 컬렉션은 인덱스를 만들 수 없으며 `NotInitialized`입니다.
#[derive(Clone)]
pub enum IndexState {
    Ready(Arc<SparseIndex>),
    NotInitialized,
}

impl IndexState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

impl std::fmt::Debug for SparseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseIndex")
            .field("collection", &self.collection)
            .field("documents", &self.documents.len())
            .finish()
    }
}

impl std::fmt::Debug for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(index) => write!(f, "Ready({} documents)", index.document_count()),
            Self::NotInitialized => write!(f, "NotInitialized"),
        }
    }
}

impl SparseIndex {
    /// 문서 목록으로 인덱스 생성 (CPU 바운드)
    pub fn build(collection: &str, documents: Vec<Document>) -> Result<IndexState> {
        if documents.is_empty() {
            tracing::warn!("No documents for collection '{}', sparse index not built", collection);
            return Ok(IndexState::NotInitialized);
        }

        let mut conn =
            Connection::open_in_memory().map_err(|e| RagError::storage(collection, e))?;
        conn.execute_batch(
            "CREATE VIRTUAL TABLE fts USING fts5(page_content, tokenize = 'unicode61');",
        )
        .map_err(|e| RagError::storage(collection, format!("FTS5 unavailable: {}", e)))?;

        {
            let tx = conn
                .transaction()
                .map_err(|e| RagError::storage(collection, e))?;
            {
                let mut stmt = tx
                    .prepare("INSERT INTO fts (rowid, page_content) VALUES (?1, ?2)")
                    .map_err(|e| RagError::storage(collection, e))?;
                for (i, doc) in documents.iter().enumerate() {
                    stmt.execute(params![i as i64 + 1, doc.page_content])
                        .map_err(|e| RagError::storage(collection, e))?;
                }
            }
            tx.commit().map_err(|e| RagError::storage(collection, e))?;
        }

        tracing::info!(
            "Built sparse index for '{}' with {} documents",
            collection,
            documents.len()
        );

        Ok(IndexState::Ready(Arc::new(Self {
            collection: collection.to_string(),
            conn: Mutex::new(conn),
            documents,
        })))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 색인된 문서 수 (빌드 시 항상 1 이상)
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// 쿼리와 단어가 하나라도 겹치는 모든 문서 (관련도 순)
    pub fn get_relevant_documents(&self, query: &str) -> Result<Vec<Document>> {
        let match_expr = build_match_expression(query);
        if match_expr.is_empty() {
            return Ok(vec![]);
        }

        let conn = self
            .conn
            .lock()
            .map_err(|e| RagError::storage(&self.collection, format!("Lock error: {}", e)))?;

        let mut stmt = conn
            .prepare("SELECT rowid FROM fts WHERE fts MATCH ?1 ORDER BY bm25(fts), rowid")
            .map_err(|e| RagError::storage(&self.collection, e))?;

        let rowids = stmt
            .query_map(params![match_expr], |row| row.get::<_, i64>(0))
            .map_err(|e| RagError::storage(&self.collection, e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RagError::storage(&self.collection, e))?;

        let results: Vec<Document> = rowids
            .into_iter()
            .filter_map(|rowid| self.documents.get((rowid - 1) as usize).cloned())
            .collect();

        tracing::debug!(
            "Sparse search in '{}' for '{}': {} matches",
            self.collection,
            query,
            results.len()
        );
        Ok(results)
    }
}

/// FTS5 MATCH 식 생성
///
/// 단어마다 큰따옴표로 감싸 연산자 해석을 막고 OR로 연결합니다.
/// source: https://www.sqlite.org/fts5.html#full_text_query_syntax
fn build_match_expression(query: &str) -> String {
    tokenize_words(query)
        .into_iter()
        .map(|w| format!("\"{}\"", w.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

// ============================================================================
// SparseRegistry
// ============================================================================

/// 컬렉션별 활성 인덱스 보관소
///
/// 재생성은 한 번에 하나만 수행하고, 완성된 인덱스로 포인터를 교체합니다.
/// 교체 전에 `Arc`를 얻은 검색은 이전 인덱스로 끝까지 진행됩니다.
#[derive(Default)]
pub struct SparseRegistry {
    indexes: RwLock<HashMap<String, Arc<SparseIndex>>>,
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl SparseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 현재 인덱스 상태
    pub fn get(&self, collection: &str) -> IndexState {
        match self.indexes.read() {
            Ok(indexes) => indexes
                .get(collection)
                .cloned()
                .map_or(IndexState::NotInitialized, IndexState::Ready),
            Err(e) => {
                tracing::error!("Sparse registry lock poisoned: {}", e);
                IndexState::NotInitialized
            }
        }
    }

    /// Document Store에서 다시 읽어 인덱스 교체
    ///
    /// 레코드가 없으면 기존 인덱스를 제거하고 `NotInitialized`를 반환합니다.
    pub async fn rebuild(&self, collection: &str, store: &DocumentStore) -> Result<IndexState> {
        let _guard = self.rebuild_lock.lock().await;

        let documents = store.load_documents(collection).await?;
        let name = collection.to_string();
        let state = tokio::task::spawn_blocking(move || SparseIndex::build(&name, documents))
            .await
            .map_err(|e| RagError::storage(collection, format!("index build task failed: {}", e)))??;

        self.set(collection, &state)?;
        Ok(state)
    }

    fn set(&self, collection: &str, state: &IndexState) -> Result<()> {
        let mut indexes = self
            .indexes
            .write()
            .map_err(|e| RagError::storage(collection, format!("Lock error: {}", e)))?;

        match state {
            IndexState::Ready(index) => {
                indexes.insert(collection.to_string(), index.clone());
            }
            IndexState::NotInitialized => {
                indexes.remove(collection);
            }
        }
        Ok(())
    }

    pub fn remove(&self, collection: &str) -> bool {
        self.indexes
            .write()
            .map(|mut indexes| indexes.remove(collection).is_some())
            .unwrap_or(false)
    }

    /// 모든 인덱스 해제
    pub fn clear(&self) {
        if let Ok(mut indexes) = self.indexes.write() {
            tracing::info!("Dropping {} sparse indexes", indexes.len());
            indexes.clear();
        }
    }

    /// 인덱스가 준비된 컬렉션 (정렬)
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .indexes
            .read()
            .map(|indexes| indexes.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

// ============================================================================
// Tests
// ============================================================================
