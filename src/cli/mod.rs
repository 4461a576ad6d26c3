//! CLI 모듈
//!
//! hybrid-pdf-rag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::collector::{CollectionStats, FileCollector};
use crate::config::{EmbeddingKind, Settings};
use crate::embedding::has_api_key;
use crate::error::RagError;
use crate::ingest::{IngestMode, IngestReport};
use crate::knowledge::{
    format_collection_name, normalize_collection_name, SearchResponse, DEFAULT_TOP_K,
};
use crate::state::AppState;

const DEFAULT_COLLECTION: &str = "default";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "hybrid-pdf-rag")]
#[command(version, about = "한국어 PDF 하이브리드 검색 (Dense + BM25)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// PDF 파일 또는 폴더를 컬렉션에 수집
    Ingest {
        /// 수집할 PDF 파일 경로
        files: Vec<PathBuf>,

        /// 수집할 폴더 경로 (재귀, .gitignore 존중)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// 대상 컬렉션 (생략 시 단일 파일이면 파일명, 아니면 "default")
        #[arg(short, long)]
        collection: Option<String>,

        /// 저장 대상
        #[arg(short, long, value_enum, default_value_t = IngestMode::Both)]
        mode: IngestMode,
    },

    /// 컬렉션 하이브리드 검색
    Search {
        /// 검색 쿼리
        query: String,

        /// 대상 컬렉션
        #[arg(short, long, default_value = DEFAULT_COLLECTION)]
        collection: String,

        /// 결과 개수 기준
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// JSON 페이로드 출력
        #[arg(long)]
        json: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();

    match cli.command {
        Commands::Ingest {
            files,
            dir,
            collection,
            mode,
        } => {
            let collection =
                collection.unwrap_or_else(|| default_collection(&files, dir.is_some()));
            cmd_ingest(settings, files, dir, &collection, mode).await
        }
        Commands::Search {
            query,
            collection,
            top_k,
            json,
        } => cmd_search(settings, &query, &collection, top_k, json).await,
        Commands::Status => cmd_status(settings).await,
    }
}

/// 컬렉션 미지정 시 이름 결정
fn default_collection(files: &[PathBuf], has_dir: bool) -> String {
    match files {
        [single] if !has_dir => format_collection_name(&single.to_string_lossy()),
        _ => DEFAULT_COLLECTION.to_string(),
    }
}

fn ensure_api_key(settings: &Settings) -> Result<()> {
    if settings.embedding == EmbeddingKind::Gemini && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export EMBEDDING_PROVIDER=local\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 수집 명령어 (ingest)
async fn cmd_ingest(
    settings: Settings,
    files: Vec<PathBuf>,
    dir: Option<PathBuf>,
    collection: &str,
    mode: IngestMode,
) -> Result<()> {
    if mode.includes_vector() {
        ensure_api_key(&settings)?;
    }

    let collector = FileCollector::with_defaults();
    let dirs: Vec<PathBuf> = dir.into_iter().collect();
    let collected = collector
        .collect(&files, &dirs)
        .context("파일 수집 실패")?;

    if collected.is_empty() {
        println!("[!] 수집할 PDF 파일이 없습니다.");
        return Ok(());
    }

    let stats = CollectionStats::from_files(&collected);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    let state = AppState::new(settings)
        .await
        .context("애플리케이션 상태 초기화 실패")?;

    let paths: Vec<String> = collected.iter().map(|f| f.path_string()).collect();
    let report = match state.ingest_files(&paths, collection, mode).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(partial) = e.partial_report() {
                println!("[!] 수집 중단 - 완료된 파일:");
                print_file_reports(partial);
            }
            return Err(e).context("수집 실패");
        }
    };

    print_file_reports(&report);
    println!();
    println!(
        "[OK] 컬렉션 '{}' 수집 완료: 벡터 청크 {} 건, 텍스트 청크 {} 건",
        report.collection,
        report.total_vector_chunks(),
        report.total_text_chunks()
    );

    state.shutdown();
    Ok(())
}

/// 검색 명령어 (search)
async fn cmd_search(
    settings: Settings,
    query: &str,
    collection: &str,
    top_k: usize,
    json: bool,
) -> Result<()> {
    ensure_api_key(&settings)?;

    let state = AppState::new(settings)
        .await
        .context("애플리케이션 상태 초기화 실패")?;
    state.initialize().await.context("Sparse 인덱스 초기화 실패")?;

    if !json {
        println!("[*] 검색 중: \"{}\"", query);
    }

    let response = match state.search(query, collection, top_k).await {
        Ok(response) => response,
        Err(RagError::IndexUnavailable(name)) => {
            bail!(
                "컬렉션 '{}'의 BM25 인덱스가 없습니다. 먼저 텍스트 수집을 실행하세요.",
                name
            );
        }
        Err(e) => return Err(e).context("검색 실패"),
    };
    state.shutdown();

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    if !response.is_success() {
        bail!("{}", response.message);
    }
    Ok(())
}

fn print_file_reports(report: &IngestReport) {
    for file in &report.files {
        println!(
            "  {} (벡터 청크 {} / 텍스트 청크 {})",
            file.path, file.vector_chunks, file.text_chunks
        );
    }
}

fn print_response(response: &SearchResponse) {
    if !response.is_success() {
        println!("\n[!] 검색 결과가 없습니다.");
        return;
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", response.results.len());
    for (i, doc) in response.results.iter().enumerate() {
        let similarity = doc
            .metadata
            .cosine_similarity
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "BM25".to_string());
        println!("{}. [{}] {}", i + 1, similarity, doc.metadata.source);
        if doc.metadata.table == Some(true) {
            println!("   (표 포함)");
        }
        println!("   내용: {}", truncate_text(&doc.page_content, 200));
        println!();
    }
}

/// 상태 명령어 (status)
async fn cmd_status(settings: Settings) -> Result<()> {
    println!("hybrid-pdf-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let store = crate::knowledge::DocumentStore::open(&settings.text_repository_path)
        .await
        .context("Document Store 열기 실패")?;

    println!("[*] 벡터 디렉토리: {}", settings.vector_directory.display());
    println!("[*] 텍스트 저장소: {}", store.root().display());
    println!("[*] 업로드 디렉토리: {}", settings.upload_dir.display());

    match settings.embedding {
        EmbeddingKind::Gemini if has_api_key() => println!("[OK] 임베딩: gemini (API 키 설정됨)"),
        EmbeddingKind::Gemini => {
            println!("[!] 임베딩: gemini (API 키 미설정)");
            println!("    설정: export GEMINI_API_KEY=your-key");
        }
        EmbeddingKind::Local => println!("[OK] 임베딩: local"),
    }

    let collections = store.collections().await?;
    if collections.is_empty() {
        println!("[!] 수집된 컬렉션이 없습니다.");
        return Ok(());
    }

    println!("[OK] 컬렉션 {} 개:", collections.len());
    for name in collections {
        match store.stats(&name).await {
            Ok(stats) => {
                let has_vectors = normalize_collection_name(&name)
                    .map(|n| settings.vector_directory.join(n).is_dir())
                    .unwrap_or(false);
                println!(
                    "  {} - 문서 {} 건, {}{}",
                    name,
                    stats.document_count,
                    format_bytes(stats.total_content_bytes),
                    if has_vectors { ", 벡터 인덱스 있음" } else { "" }
                );
            }
            Err(e) => println!("  {} - [!] 통계 조회 실패: {}", name, e),
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_text("안녕하세요 세계", 5), "안녕하세요...");
    }

    #[test]
    fn test_parse_ingest_defaults() {
        let cli = Cli::try_parse_from(["hybrid-pdf-rag", "ingest", "a.pdf", "b.pdf"]).unwrap();
        match cli.command {
            Commands::Ingest {
                files,
                dir,
                collection,
                mode,
            } => {
                assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
                assert!(dir.is_none());
                assert!(collection.is_none());
                assert_eq!(mode, IngestMode::Both);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn test_parse_search_options() {
        let cli = Cli::try_parse_from([
            "hybrid-pdf-rag",
            "search",
            "안전 점검",
            "--collection",
            "manuals",
            "-k",
            "4",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                query,
                collection,
                top_k,
                json,
            } => {
                assert_eq!(query, "안전 점검");
                assert_eq!(collection, "manuals");
                assert_eq!(top_k, 4);
                assert!(json);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_default_collection() {
        assert_eq!(
            default_collection(&[PathBuf::from("/data/안전 매뉴얼 v2.pdf")], false),
            format_collection_name("안전 매뉴얼 v2.pdf")
        );
        assert_eq!(default_collection(&[PathBuf::from("a.pdf")], true), "default");
        assert_eq!(default_collection(&[], true), "default");
    }

    #[test]
    fn test_parse_ingest_mode() {
        let cli =
            Cli::try_parse_from(["hybrid-pdf-rag", "ingest", "--dir", "docs", "--mode", "text"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Ingest {
                mode: IngestMode::Text,
                ..
            }
        ));
    }
}
