//! hybrid-pdf-rag - 한국어 PDF 하이브리드 검색
//!
//! PDF를 페이지/표 단위로 추출해 청크로 나누고,
//! LanceDB 벡터 검색과 SQLite FTS5 BM25 검색 결과를 병합합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod knowledge;
pub mod state;

// Re-exports
pub use config::Settings;
pub use embedding::{create_embedder, EmbeddingProvider, GeminiEmbedding, HashingEmbedding};
pub use error::{RagError, Result};
pub use extractor::{PageSource, PdfPageSource, RawPage};
pub use ingest::{save_uploads, IngestMode, IngestPipeline, IngestReport, Upload};
pub use knowledge::{
    normalize_collection_name, Document, DocumentStore, HybridMerger, IndexState,
    LanceVectorStore, Metadata, SearchOutcome, SearchResponse, SparseIndex, SparseRegistry,
    VectorStore,
};
pub use state::AppState;
