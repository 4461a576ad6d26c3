//! 애플리케이션 상태 - 수집/검색 진입점
//!
//! 설정, 임베딩 모델, Document Store, Sparse 레지스트리를 소유합니다.
//! 임베딩 모델은 벡터 수집이나 검색이 처음 필요로 할 때 생성합니다.
//! - `initialize`: 시작 시 저장된 모든 컬렉션의 Sparse 인덱스 생성
//! - `ingest_files` / `ingest_uploads`: 수집 후 Sparse 인덱스 재생성 시도
//! - `search`: Sparse 인덱스 확인 후 하이브리드 검색
//! - `shutdown`: 모든 인덱스 해제

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::config::Settings;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::extractor::{PageSource, PdfPageSource};
use crate::ingest::{save_uploads, IngestMode, IngestPipeline, IngestReport, Upload};
use crate::knowledge::{
    normalize_collection_name, DocumentStore, HybridMerger, IndexState, LanceVectorStore,
    SearchResponse, SparseRegistry, VectorStore,
};

pub struct AppState {
    settings: Settings,
    embedder: OnceCell<Arc<dyn EmbeddingProvider>>,
    pages: Arc<dyn PageSource>,
    documents: Arc<DocumentStore>,
    sparse: SparseRegistry,
}

impl AppState {
    /// PDF 추출기로 생성 (임베딩 모델은 설정에 따라 지연 생성)
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        Ok(Self::with_page_source(settings, Arc::new(PdfPageSource)).await?)
    }

    /// 추출기 지정 생성
    pub async fn with_page_source(settings: Settings, pages: Arc<dyn PageSource>) -> Result<Self> {
        Self::open(settings, OnceCell::new(), pages).await
    }

    /// 구성 요소 지정 생성
    pub async fn with_components(
        settings: Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        pages: Arc<dyn PageSource>,
    ) -> Result<Self> {
        Self::open(settings, OnceCell::new_with(Some(embedder)), pages).await
    }

    async fn open(
        settings: Settings,
        embedder: OnceCell<Arc<dyn EmbeddingProvider>>,
        pages: Arc<dyn PageSource>,
    ) -> Result<Self> {
        let documents = Arc::new(DocumentStore::open(&settings.text_repository_path).await?);
        Ok(Self {
            settings,
            embedder,
            pages,
            documents,
            sparse: SparseRegistry::new(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn sparse(&self) -> &SparseRegistry {
        &self.sparse
    }

    /// 시작 훅: 저장된 모든 컬렉션의 Sparse 인덱스 생성
    ///
    /// 개별 컬렉션의 실패는 기록만 하고 계속합니다. 준비된 컬렉션 수를 반환합니다.
    pub async fn initialize(&self) -> Result<usize> {
        if !self.documents.is_non_empty().await? {
            tracing::warn!("Text repository is empty. Please ingest data first.");
            return Ok(0);
        }

        let mut ready = 0;
        for collection in self.documents.collections().await? {
            match self.sparse.rebuild(&collection, &self.documents).await {
                Ok(state) if state.is_ready() => ready += 1,
                Ok(_) => tracing::warn!("Collection '{}' has no documents", collection),
                Err(e) => tracing::warn!("Sparse index initialization failed for '{}': {}", collection, e),
            }
        }

        tracing::info!("Sparse indexes initialized for {} collections", ready);
        Ok(ready)
    }

    /// 임베딩 모델 (첫 호출 시 생성)
    ///
    /// 생성 실패(API 키 없음 등)는 컬렉션 이름을 담은 저장 에러입니다.
    async fn embedder(&self, collection: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        self.embedder
            .get_or_try_init(|| async {
                create_embedder(&self.settings)
                    .map_err(|e| RagError::storage(collection, format!("{e:#}")))
            })
            .await
            .cloned()
    }

    /// 컬렉션의 Dense 저장소 열기
    pub async fn open_vector_store(&self, collection: &str) -> Result<LanceVectorStore> {
        let collection = normalize_collection_name(collection)?;
        let embedder = self.embedder(&collection).await?;
        LanceVectorStore::open(&self.settings.vector_directory, &collection, embedder).await
    }

    /// 수집 트리거: 파이프라인 실행 후 Sparse 인덱스 재생성 시도
    pub async fn ingest_files(
        &self,
        files: &[String],
        collection: &str,
        mode: IngestMode,
    ) -> Result<IngestReport> {
        let collection = normalize_collection_name(collection)?;
        if files.is_empty() {
            return Err(RagError::Validation("At least one file must be provided".to_string()));
        }

        let mut pipeline = IngestPipeline::new(self.pages.clone(), self.documents.clone());
        let report = if mode.includes_vector() {
            let dense = self.open_vector_store(&collection).await?;
            tracing::info!("Dense store for '{}' at {:?}", collection, dense.path());
            pipeline = pipeline.with_embedder(self.embedder(&collection).await?);
            pipeline.run(files, &collection, mode, Some(&dense)).await?
        } else {
            pipeline.run(files, &collection, mode, None).await?
        };

        self.refresh_sparse_index(&collection).await;
        Ok(report)
    }

    /// 업로드 파일 저장 후 수집
    pub async fn ingest_uploads(
        &self,
        uploads: &[Upload],
        collection: &str,
        mode: IngestMode,
    ) -> Result<IngestReport> {
        let collection = normalize_collection_name(collection)?;
        if uploads.is_empty() {
            return Err(RagError::Validation("At least one file must be provided".to_string()));
        }

        tracing::info!("Starting data ingestion for collection: {}", collection);
        let files = save_uploads(uploads, &self.settings.upload_dir).await?;
        self.ingest_files(&files, &collection, mode).await
    }

    /// 재생성 실패는 수집 결과에 영향을 주지 않음
    async fn refresh_sparse_index(&self, collection: &str) {
        match self.documents.is_non_empty().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::error!("Text repository does not contain any files after data ingestion.");
                return;
            }
            Err(e) => {
                tracing::error!("Failed to inspect text repository: {}", e);
                return;
            }
        }

        match self.sparse.rebuild(collection, &self.documents).await {
            Ok(IndexState::Ready(index)) => tracing::info!(
                "Sparse index for '{}' rebuilt after ingestion ({} documents)",
                index.collection(),
                index.document_count()
            ),
            Ok(IndexState::NotInitialized) => {
                tracing::error!("Sparse index for '{}' is empty after ingestion", collection)
            }
            Err(e) => tracing::error!("Sparse index rebuild failed for '{}': {}", collection, e),
        }
    }

    /// 검색 트리거
    ///
    /// Sparse 인덱스가 없으면 `IndexUnavailable`로 즉시 실패합니다.
    pub async fn search(&self, query: &str, collection: &str, top_k: usize) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("Query must be provided".to_string()));
        }
        let collection = normalize_collection_name(collection)?;

        let sparse = self.sparse.get(&collection);
        if !sparse.is_ready() {
            tracing::error!("Sparse index is not initialized for '{}'", collection);
            return Err(RagError::IndexUnavailable(collection));
        }

        let dense: Arc<dyn VectorStore> = Arc::new(self.open_vector_store(&collection).await?);
        let outcome = HybridMerger::new(dense, sparse).retrieve(query, top_k).await?;
        Ok(SearchResponse::from(outcome))
    }

    /// 종료 훅
    pub fn shutdown(&self) {
        self.sparse.clear();
        tracing::info!("Application state released");
    }
}

// ============================================================================
// Tests
// ============================================================================
