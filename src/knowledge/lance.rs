//! LanceDB Vector Store - 컬렉션 단위 Dense 검색
//!
//! ANN (Approximate Nearest Neighbor) 검색으로 대용량 벡터에서도 빠른 검색을 지원합니다.
//! ref: https://lancedb.github.io/lancedb/
//!
//! 저장 위치: `{vector_root}/{collection}/`, 테이블 이름 = 컬렉션 이름.
//! 거리 함수는 코사인이며 `cosine_similarity = 1 - distance`로 변환합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

use super::document::{Document, Metadata};
use super::vector::{VectorEntry, VectorStore, MAX_SNAPSHOT_DOCUMENTS};

const CONTENT_COLUMN: &str = "page_content";
const METADATA_COLUMN: &str = "metadata";
const VECTOR_COLUMN: &str = "vector";
const DISTANCE_COLUMN: &str = "_distance";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 하나의 컬렉션과 하나의 임베딩 모델에 묶입니다.
pub struct LanceVectorStore {
    db: Connection,
    collection: String,
    path: PathBuf,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl LanceVectorStore {
    /// 컬렉션 저장소 열기 (디렉토리가 없으면 생성)
    ///
    /// `collection`은 이미 정규화된 이름이어야 합니다.
    pub async fn open(
        vector_root: &Path,
        collection: &str,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let path = vector_root.join(collection);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| RagError::storage(collection, format!("Failed to create directory: {}", e)))?;

        let path_str = path
            .to_str()
            .ok_or_else(|| RagError::storage(collection, "Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .map_err(|e| RagError::storage(collection, format!("Failed to connect to LanceDB: {}", e)))?;

        tracing::debug!("Opened vector store for '{}' at {:?}", collection, path);

        Ok(Self {
            db,
            collection: collection.to_string(),
            path,
            embedder,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, error: impl std::fmt::Display) -> RagError {
        RagError::storage(&self.collection, error)
    }

    /// 벡터 테이블 스키마
    fn create_schema(dimension: i32) -> Schema {
        Schema::new(vec![
            Field::new(CONTENT_COLUMN, DataType::Utf8, false),
            Field::new(METADATA_COLUMN, DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
        let dimension = entries
            .first()
            .map(|e| e.embedding.len())
            .ok_or_else(|| self.storage_error("Cannot create batch from empty entries"))?;

        if dimension == 0 || entries.iter().any(|e| e.embedding.len() != dimension) {
            return Err(self.storage_error(format!(
                "All embeddings must share a non-zero dimension (expected {})",
                dimension
            )));
        }

        let contents: Vec<&str> = entries
            .iter()
            .map(|e| e.document.page_content.as_str())
            .collect();
        let metadata: Vec<String> = entries
            .iter()
            .map(|e| serde_json::to_string(&e.document.metadata))
            .collect::<std::result::Result<_, _>>()?;

        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .map_err(|e| self.storage_error(format!("Failed to create embedding array: {}", e)))?;

        RecordBatch::try_new(
            Arc::new(Self::create_schema(dimension as i32)),
            vec![
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(metadata)),
                Arc::new(embeddings_list),
            ],
        )
        .map_err(|e| self.storage_error(format!("Failed to create RecordBatch: {}", e)))
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| self.storage_error(e))?;
        Ok(names.iter().any(|name| name == &self.collection))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(&self.collection)
            .execute()
            .await
            .map_err(|e| self.storage_error(format!("Failed to open table: {}", e)))
    }

    /// 검색/조회 결과 배치를 문서로 변환
    fn batch_to_documents(&self, batch: &RecordBatch, with_distance: bool) -> Result<Vec<Document>> {
        let contents = batch
            .column_by_name(CONTENT_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| self.storage_error("Missing page_content column"))?;

        let metadata = batch
            .column_by_name(METADATA_COLUMN)
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| self.storage_error("Missing metadata column"))?;

        // _distance 컬럼 (LanceDB가 자동 추가)
        let distances = if with_distance {
            Some(
                batch
                    .column_by_name(DISTANCE_COLUMN)
                    .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                    .ok_or_else(|| self.storage_error("Missing _distance column"))?,
            )
        } else {
            None
        };

        (0..batch.num_rows())
            .map(|i| -> Result<Document> {
                let mut meta: Metadata = serde_json::from_str(metadata.value(i))
                    .map_err(|e| self.storage_error(format!("Invalid metadata: {}", e)))?;
                if let Some(distances) = distances {
                    meta.cosine_similarity = Some(1.0 - distances.value(i));
                }
                Ok(Document::new(contents.value(i), meta))
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn add_documents(&self, documents: &[Document]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| self.storage_error(format!("Embedding failed: {:#}", e)))?;

        let entries: Vec<VectorEntry> = documents
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(document, embedding)| VectorEntry { document, embedding })
            .collect();

        self.add_embedded(&entries).await
    }

    async fn add_embedded(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await? {
            // 기존 테이블에 추가
            self.open_table()
                .await?
                .add(batches)
                .execute()
                .await
                .map_err(|e| self.storage_error(format!("Failed to add vectors: {}", e)))?;
        } else {
            self.db
                .create_table(&self.collection, batches)
                .execute()
                .await
                .map_err(|e| self.storage_error(format!("Failed to create table: {}", e)))?;
            tracing::info!("Created vector table '{}'", self.collection);
        }

        tracing::debug!("Stored {} vectors in '{}'", entries.len(), self.collection);
        Ok(entries.len())
    }

    async fn get_relevant_documents(&self, query: &str, top_k: usize) -> Result<Vec<Document>> {
        if top_k == 0 || !self.table_exists().await? {
            return Ok(vec![]);
        }

        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| self.storage_error(format!("Query embedding failed: {:#}", e)))?;

        let stream = self
            .open_table()
            .await?
            .vector_search(query_embedding)
            .map_err(|e| self.storage_error(format!("Failed to create vector search: {}", e)))?
            .column(VECTOR_COLUMN)
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| self.storage_error(format!("Failed to execute vector search: {}", e)))?;

        // RecordBatch 스트림에서 결과 추출
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| self.storage_error(e))?;

        let mut documents = Vec::new();
        for batch in &batches {
            documents.extend(self.batch_to_documents(batch, true)?);
        }

        tracing::debug!(
            "Dense search in '{}' returned {} documents",
            self.collection,
            documents.len()
        );
        Ok(documents)
    }

    async fn get_all_documents(&self) -> Result<Vec<Document>> {
        if !self.table_exists().await? {
            return Ok(vec![]);
        }

        let stream = self
            .open_table()
            .await?
            .query()
            .limit(MAX_SNAPSHOT_DOCUMENTS)
            .execute()
            .await
            .map_err(|e| self.storage_error(format!("Failed to query table: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| self.storage_error(e))?;

        let mut documents = Vec::new();
        for batch in &batches {
            documents.extend(self.batch_to_documents(batch, false)?);
        }
        documents.truncate(MAX_SNAPSHOT_DOCUMENTS);
        Ok(documents)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedding;
    use tempfile::TempDir;

    async fn create_test_store(dir: &TempDir, collection: &str) -> LanceVectorStore {
        LanceVectorStore::open(dir.path(), collection, Arc::new(HashingEmbedding::default()))
            .await
            .unwrap()
    }

    fn doc(content: &str, chunk: usize) -> Document {
        let mut metadata = Metadata::from_source("manual.pdf");
        metadata.chunk_id = Some(format!("manual.pdf_chunk_{}", chunk));
        Document::new(content, metadata)
    }

    #[tokio::test]
    async fn test_open_creates_collection_directory() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir, "manuals").await;

        assert!(dir.path().join("manuals").is_dir());
        assert_eq!(store.collection(), "manuals");
        assert!(store.get_all_documents().await.unwrap().is_empty());
        assert!(store.get_relevant_documents("안전", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_and_search_ranks_by_similarity() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir, "search").await;

        let docs = vec![
            doc("보일러 안전 점검 절차", 1),
            doc("배관 압력 시험 기준", 2),
            doc("전기 설비 접지 기준", 3),
        ];
        assert_eq!(store.add_documents(&docs).await.unwrap(), 3);

        let results = store
            .get_relevant_documents("배관 압력 시험 기준", 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].page_content, "배관 압력 시험 기준");
        assert_eq!(
            results[0].metadata.chunk_id.as_deref(),
            Some("manual.pdf_chunk_2")
        );

        let top = results[0].metadata.cosine_similarity.unwrap();
        let next = results[1].metadata.cosine_similarity.unwrap();
        assert!((top - 1.0).abs() < 1e-3);
        assert!(top >= next);
    }

    #[tokio::test]
    async fn test_additions_accumulate() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir, "accumulate").await;

        store.add_documents(&[doc("첫 번째 청크", 1)]).await.unwrap();
        store.add_documents(&[doc("두 번째 청크", 2)]).await.unwrap();

        let all = store.get_all_documents().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|d| d.metadata.cosine_similarity.is_none()));

        // 다시 열어도 유지
        let reopened = create_test_store(&dir, "accumulate").await;
        assert_eq!(reopened.get_all_documents().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mismatched_dimensions_rejected() {
        let dir = TempDir::new().unwrap();
        let store = create_test_store(&dir, "dims").await;

        let entries = vec![
            VectorEntry {
                document: doc("a", 1),
                embedding: vec![0.1; 4],
            },
            VectorEntry {
                document: doc("b", 2),
                embedding: vec![0.1; 3],
            },
        ];
        let err = store.add_embedded(&entries).await.unwrap_err();
        assert!(matches!(err, RagError::Storage { ref collection, .. } if collection == "dims"));
        assert_eq!(store.add_embedded(&[]).await.unwrap(), 0);
    }
}
