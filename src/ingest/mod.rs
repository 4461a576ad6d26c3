//! 수집 파이프라인 - PDF → 청크 → Dense/Document Store
//!
//! 파일 단위로 순서대로 처리하며, 첫 실패에서 중단합니다 (fail fast).
//! 실패 이전에 끝난 파일의 청크는 그대로 남습니다.
//!
//! - 벡터 경로: 페이지/표 조각 → 단어 청크 (500/50) → 임베딩 → Dense 저장소
//! - 텍스트 경로: `\w+` 토큰 200개 단위 → Document Store

pub mod cache;
pub mod chunker;

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extractor::{build_fragments, join_fragments, load_pages, plain_text, PageSource};
use crate::knowledge::{
    cosine_similarity, normalize_collection_name, Document, DocumentStore, Metadata, VectorEntry,
    VectorStore,
};

use cache::TransientCache;
use chunker::{group_tokens, split_into_chunks, tokenize_words, ChunkConfig};

// ============================================================================
// Types
// ============================================================================

/// 저장 대상
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Dense 저장소만
    Vector,
    /// Document Store만
    Text,
    /// 둘 다 (벡터 경로 먼저)
    #[default]
    Both,
}

impl IngestMode {
    pub fn includes_vector(self) -> bool {
        matches!(self, Self::Vector | Self::Both)
    }

    pub fn includes_text(self) -> bool {
        matches!(self, Self::Text | Self::Both)
    }
}

/// 파일별 처리 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub vector_chunks: usize,
    pub text_chunks: usize,
}

/// 수집 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub files: Vec<FileReport>,
}

impl IngestReport {
    fn file_mut(&mut self, path: &str) -> &mut FileReport {
        if let Some(i) = self.files.iter().position(|f| f.path == path) {
            return &mut self.files[i];
        }
        self.files.push(FileReport {
            path: path.to_string(),
            ..Default::default()
        });
        let last = self.files.len() - 1;
        &mut self.files[last]
    }

    pub fn total_vector_chunks(&self) -> usize {
        self.files.iter().map(|f| f.vector_chunks).sum()
    }

    pub fn total_text_chunks(&self) -> usize {
        self.files.iter().map(|f| f.text_chunks).sum()
    }
}

/// 업로드된 파일
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// 업로드 파일을 업로드 디렉토리에 저장하고 경로 목록 반환
///
/// 파일명의 디렉토리 부분은 버립니다. 같은 이름은 덮어씁니다.
pub async fn save_uploads(uploads: &[Upload], upload_dir: &Path) -> Result<Vec<String>> {
    tracing::info!("Using upload directory: {:?}", upload_dir);
    tokio::fs::create_dir_all(upload_dir).await?;

    let mut paths = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let file_name = Path::new(&upload.file_name)
            .file_name()
            .ok_or_else(|| {
                RagError::Validation(format!("Invalid upload file name: '{}'", upload.file_name))
            })?;

        let location: PathBuf = upload_dir.join(file_name);
        tokio::fs::write(&location, &upload.bytes).await?;
        tracing::debug!("Saved upload ({} bytes) to {:?}", upload.bytes.len(), location);
        paths.push(location.to_string_lossy().into_owned());
    }

    Ok(paths)
}

// ============================================================================
// IngestPipeline
// ============================================================================

/// 수집 파이프라인 (수집 호출마다 하나)
///
/// 임시 캐시를 소유하므로 캐시는 호출 범위를 벗어나지 않습니다.
/// 임베딩 모델은 벡터 경로에만 필요하므로 `with_embedder`로 붙입니다.
pub struct IngestPipeline {
    pages: Arc<dyn PageSource>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    documents: Arc<DocumentStore>,
    config: ChunkConfig,
    cache: TransientCache,
}

type Processed = Vec<(String, usize)>;

impl IngestPipeline {
    pub fn new(pages: Arc<dyn PageSource>, documents: Arc<DocumentStore>) -> Self {
        Self {
            pages,
            embedder: None,
            documents,
            config: ChunkConfig::default(),
            cache: TransientCache::new(),
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_config(mut self, config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// 남아있는 캐시 항목 수
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// 모드에 맞게 수집 실행
    ///
    /// 벡터 경로가 포함된 모드는 `dense`와 임베딩 모델이 필요합니다.
    /// 처리 중 실패하면 그때까지의 결과를 담은 `RagError::Ingest`를 반환합니다.
    pub async fn run(
        &mut self,
        files: &[String],
        collection: &str,
        mode: IngestMode,
        dense: Option<&dyn VectorStore>,
    ) -> Result<IngestReport> {
        let collection = normalize_collection_name(collection)?;
        validate_files(files)?;
        let vector_target = if mode.includes_vector() {
            let dense = dense.ok_or_else(|| {
                RagError::Validation("Vector ingestion requires a dense store".to_string())
            })?;
            let embedder = self.vector_embedder(&collection, dense)?;
            Some((dense, embedder))
        } else {
            None
        };

        tracing::info!(
            "Starting ingestion of {} files into '{}' ({:?})",
            files.len(),
            collection,
            mode
        );

        let mut report = IngestReport {
            collection: collection.clone(),
            files: Vec::new(),
        };

        if let Some((dense, embedder)) = vector_target {
            let mut processed = Vec::new();
            let result = self
                .store_vector_files(files, dense, embedder.as_ref(), &mut processed)
                .await;
            for (path, count) in processed {
                report.file_mut(&path).vector_chunks = count;
            }
            if let Err(e) = result {
                return Err(RagError::ingest(report, e));
            }
        }
        if mode.includes_text() {
            let mut processed = Vec::new();
            let result = self.store_text_files(files, &collection, &mut processed).await;
            for (path, count) in processed {
                report.file_mut(&path).text_chunks = count;
            }
            if let Err(e) = result {
                return Err(RagError::ingest(report, e));
            }
        }

        tracing::info!(
            "Ingestion into '{}' completed: {} vector chunks, {} text chunks",
            collection,
            report.total_vector_chunks(),
            report.total_text_chunks()
        );
        Ok(report)
    }

    // ========================================================================
    // Vector Path
    // ========================================================================

    /// 파일별 벡터 청크를 Dense 저장소에 저장
    ///
    /// 반환: (파일 경로, 청크 수) 목록
    pub async fn process_and_store_vector(
        &mut self,
        files: &[String],
        collection: &str,
        dense: &dyn VectorStore,
    ) -> Result<Processed> {
        let collection = normalize_collection_name(collection)?;
        validate_files(files)?;
        let embedder = self.vector_embedder(&collection, dense)?;

        let mut processed = Vec::with_capacity(files.len());
        self.store_vector_files(files, dense, embedder.as_ref(), &mut processed)
            .await?;
        Ok(processed)
    }

    fn vector_embedder(
        &self,
        collection: &str,
        dense: &dyn VectorStore,
    ) -> Result<Arc<dyn EmbeddingProvider>> {
        if dense.collection() != collection {
            return Err(RagError::Validation(format!(
                "Vector store is bound to '{}', not '{}'",
                dense.collection(),
                collection
            )));
        }
        self.embedder.clone().ok_or_else(|| {
            RagError::Validation("Vector ingestion requires an embedding model".to_string())
        })
    }

    /// 실패해도 `processed`에는 끝난 파일까지 남음
    async fn store_vector_files(
        &mut self,
        files: &[String],
        dense: &dyn VectorStore,
        embedder: &dyn EmbeddingProvider,
        processed: &mut Processed,
    ) -> Result<()> {
        for (i, file_path) in files.iter().enumerate() {
            let result = self.process_file_vector(file_path, dense, embedder).await;
            self.cache.clear();

            match result {
                Ok(count) => {
                    tracing::info!(
                        "[{}/{}] Finished processing vector for file: {}",
                        i + 1,
                        files.len(),
                        file_path
                    );
                    processed.push((file_path.clone(), count));
                }
                Err(e) => {
                    tracing::error!("Error in vector ingestion for {}: {}", file_path, e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn process_file_vector(
        &mut self,
        file_path: &str,
        dense: &dyn VectorStore,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<usize> {
        tracing::info!("Processing file (vector): {}", file_path);
        let pages = load_pages(self.pages.clone(), file_path).await?;

        let fragments = build_fragments(file_path, &pages);
        let mut spans: Vec<(Range<usize>, &str, bool)> = Vec::with_capacity(fragments.len());
        let mut offset = 0;
        for fragment in &fragments {
            self.cache.insert(fragment.cache_key.as_str(), fragment.text.as_str());
            let words = fragment.word_count();
            spans.push((offset..offset + words, fragment.cache_key.as_str(), fragment.is_table));
            offset += words;
        }

        let text = join_fragments(&fragments);
        let chunks = split_into_chunks(&text, self.config.chunk_size, self.config.overlap)?;
        if chunks.is_empty() {
            tracing::warn!("No text chunks produced for {}", file_path);
            return Ok(0);
        }

        for (i, chunk) in chunks.iter().enumerate() {
            let embedding = embedder.embed(&chunk.text).await.map_err(|e| {
                RagError::storage(dense.collection(), format!("Embedding failed: {:#}", e))
            })?;

            let mut metadata = Metadata::from_source(file_path);
            metadata.chunk_id = Some(format!("{}_chunk_{}", file_path, i + 1));
            metadata.cosine_similarity = Some(cosine_similarity(&embedding, &embedding));
            if spans
                .iter()
                .any(|(range, _, is_table)| *is_table && overlaps(range, &chunk.words))
            {
                metadata.table = Some(true);
            }

            let entry = VectorEntry {
                document: Document::new(chunk.text.as_str(), metadata),
                embedding,
            };
            dense.add_embedded(std::slice::from_ref(&entry)).await?;

            // 저장된 청크가 끝까지 덮은 조각은 캐시에서 제거
            for (range, key, _) in &spans {
                if range.end <= chunk.words.end {
                    self.cache.remove(key);
                }
            }

            tracing::debug!(
                "Stored chunk {}/{} from {}",
                i + 1,
                chunks.len(),
                file_path
            );
        }

        Ok(chunks.len())
    }

    // ========================================================================
    // Text Path
    // ========================================================================

    /// 파일별 토큰 그룹을 Document Store에 저장
    pub async fn process_and_store_text(
        &mut self,
        files: &[String],
        collection: &str,
    ) -> Result<Processed> {
        let collection = normalize_collection_name(collection)?;
        validate_files(files)?;

        let mut processed = Vec::with_capacity(files.len());
        self.store_text_files(files, &collection, &mut processed).await?;
        Ok(processed)
    }

    async fn store_text_files(
        &mut self,
        files: &[String],
        collection: &str,
        processed: &mut Processed,
    ) -> Result<()> {
        for (i, file_path) in files.iter().enumerate() {
            let result = self.process_file_text(file_path, collection).await;
            self.cache.clear();

            match result {
                Ok(count) => {
                    tracing::info!(
                        "[{}/{}] Finished processing text for file: {}",
                        i + 1,
                        files.len(),
                        file_path
                    );
                    processed.push((file_path.clone(), count));
                }
                Err(e) => {
                    tracing::error!("Error in text ingestion for {}: {}", file_path, e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn process_file_text(&mut self, file_path: &str, collection: &str) -> Result<usize> {
        tracing::info!("Processing file (text): {}", file_path);
        let pages = load_pages(self.pages.clone(), file_path).await?;

        let text = plain_text(&pages);
        let tokens = tokenize_words(&text);
        let groups = group_tokens(&tokens, self.config.text_chunk_size);
        tracing::info!(
            "Tokenized {} tokens into {} chunks of size {}",
            tokens.len(),
            groups.len(),
            self.config.text_chunk_size
        );

        for (i, group) in groups.iter().enumerate() {
            let document = Document::new(
                group.join(" "),
                Metadata::from_source(format!("{}_chunk_{}", file_path, i + 1)),
            );
            self.documents
                .save_documents(std::slice::from_ref(&document), collection)
                .await?;
        }

        Ok(groups.len())
    }
}

fn validate_files(files: &[String]) -> Result<()> {
    if files.is_empty() {
        return Err(RagError::Validation("At least one file must be provided".to_string()));
    }
    if files.iter().any(|f| f.trim().is_empty()) {
        return Err(RagError::Validation("File path must be provided".to_string()));
    }
    Ok(())
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

// ============================================================================
// Tests
// ============================================================================
