//! Document Store - 컬렉션별 JSONL 문서 저장소
//!
//! Sparse 인덱스의 원천 데이터입니다.
//! 저장 위치: `{root}/{collection}.jsonl` (한 줄 = `{page_content, metadata}`)
//!
//! - 추가 전용 (기존 레코드는 수정하지 않음)
//! - (본문, 정렬된 메타데이터) 쌍이 이미 있으면 다시 쓰지 않음
//! - 같은 저장소 인스턴스 내의 추가 작업은 직렬화됨

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{RagError, Result};

use super::document::Document;

const FILE_EXTENSION: &str = "jsonl";

/// 저장소 통계
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub collection: String,
    pub document_count: usize,
    pub total_content_bytes: usize,
    pub path: PathBuf,
}

// ============================================================================
// DocumentStore
// ============================================================================

#[derive(Debug)]
pub struct DocumentStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// 저장소 열기 (루트 디렉토리가 없으면 생성)
    pub async fn open(root: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        tracing::debug!("Document store opened at {:?}", root);

        Ok(Self {
            root: root.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 컬렉션 파일 경로
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.{}", collection, FILE_EXTENSION))
    }

    /// 문서 추가 (중복 제외)
    ///
    /// 실제로 기록된 레코드 수를 반환합니다.
    pub async fn save_documents(&self, documents: &[Document], collection: &str) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let path = self.collection_path(collection);

        let mut seen: HashSet<(String, String)> = self
            .load_documents(collection)
            .await?
            .iter()
            .map(Document::dedup_key)
            .collect::<Result<_>>()?;

        let mut buffer = String::new();
        let mut written = 0;
        for doc in documents {
            if !seen.insert(doc.dedup_key()?) {
                tracing::debug!("Skipping duplicate document: {}", doc.metadata.source);
                continue;
            }
            buffer.push_str(&serde_json::to_string(doc)?);
            buffer.push('\n');
            written += 1;
        }

        if written > 0 {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| RagError::storage(collection, e))?;
            file.write_all(buffer.as_bytes())
                .await
                .map_err(|e| RagError::storage(collection, e))?;
            file.flush()
                .await
                .map_err(|e| RagError::storage(collection, e))?;
        }

        tracing::info!(
            "Saved {}/{} documents in {:?}",
            written,
            documents.len(),
            path
        );
        Ok(written)
    }

    /// 컬렉션의 모든 문서 로드 (파일이 없으면 빈 목록)
    pub async fn load_documents(&self, collection: &str) -> Result<Vec<Document>> {
        let path = self.collection_path(collection);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(RagError::storage(collection, e)),
        };

        let documents = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str::<Document>(line).map_err(|e| {
                    RagError::storage(collection, format!("invalid record at line {}: {}", i + 1, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Loaded {} documents from {:?}", documents.len(), path);
        Ok(documents)
    }

    /// 저장된 컬렉션 이름 목록 (정렬)
    pub async fn collections(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// 루트 디렉토리에 파일이 하나라도 있는지
    pub async fn is_non_empty(&self) -> Result<bool> {
        match tokio::fs::read_dir(&self.root).await {
            Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 컬렉션 통계
    pub async fn stats(&self, collection: &str) -> Result<StoreStats> {
        let documents = self.load_documents(collection).await?;
        Ok(StoreStats {
            collection: collection.to_string(),
            document_count: documents.len(),
            total_content_bytes: documents.iter().map(|d| d.page_content.len()).sum(),
            path: self.collection_path(collection),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Metadata;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn create_test_store() -> (TempDir, DocumentStore) {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::open(&dir.path().join("textdb")).await.unwrap();
        (dir, store)
    }

    fn doc(content: &str, source: &str) -> Document {
        Document::new(content, Metadata::from_source(source))
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (_dir, store) = create_test_store().await;

        let written = store
            .save_documents(&[doc("첫 번째", "a.pdf_chunk_1"), doc("두 번째", "a.pdf_chunk_2")], "manuals")
            .await
            .unwrap();
        assert_eq!(written, 2);

        let loaded = store.load_documents("manuals").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].page_content, "첫 번째");
        assert_eq!(loaded[1].metadata.source, "a.pdf_chunk_2");
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let (_dir, store) = create_test_store().await;
        let d = doc("같은 내용", "a.pdf_chunk_1");

        store.save_documents(&[d.clone()], "c1").await.unwrap();
        let written = store.save_documents(&[d.clone(), d.clone()], "c1").await.unwrap();

        assert_eq!(written, 0);
        assert_eq!(store.load_documents("c1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_content_different_metadata_is_kept() {
        let (_dir, store) = create_test_store().await;
        store
            .save_documents(&[doc("x", "a_chunk_1"), doc("x", "b_chunk_1")], "c1")
            .await
            .unwrap();
        assert_eq!(store.load_documents("c1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_missing_collection() {
        let (_dir, store) = create_test_store().await;
        assert!(store.load_documents("nothing").await.unwrap().is_empty());
        assert!(!store.is_non_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_record_format_is_jsonl() {
        let (_dir, store) = create_test_store().await;
        store.save_documents(&[doc("본문", "s")], "fmt").await.unwrap();

        let raw = std::fs::read_to_string(store.collection_path("fmt")).unwrap();
        assert_eq!(raw, "{\"page_content\":\"본문\",\"metadata\":{\"source\":\"s\"}}\n");
    }

    #[tokio::test]
    async fn test_collections_listing_and_stats() {
        let (_dir, store) = create_test_store().await;
        store.save_documents(&[doc("abc", "s")], "zeta").await.unwrap();
        store.save_documents(&[doc("de", "s")], "alpha").await.unwrap();

        assert_eq!(store.collections().await.unwrap(), vec!["alpha", "zeta"]);
        assert!(store.is_non_empty().await.unwrap());

        let stats = store.stats("zeta").await.unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.total_content_bytes, 3);
    }

    #[tokio::test]
    async fn test_corrupt_line_reports_collection() {
        let (_dir, store) = create_test_store().await;
        std::fs::write(store.collection_path("bad"), "not json\n").unwrap();

        let err = store.load_documents("bad").await.unwrap_err();
        assert!(matches!(err, RagError::Storage { ref collection, .. } if collection == "bad"));
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_duplicate() {
        let (_dir, store) = create_test_store().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save_documents(&[doc("공유 청크", "shared_chunk_1")], "race")
                    .await
                    .unwrap()
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }

        assert_eq!(total, 1);
        assert_eq!(store.load_documents("race").await.unwrap().len(), 1);
    }
}
