//! PDF 파일 수집 모듈
//!
//! 로컬 파일 및 폴더에서 수집할 PDF를 찾습니다.
//! .gitignore 패턴을 존중하고, `.pdf` 확장자만 수집합니다.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;

/// PDF 확장자 여부 (대소문자 무시)
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 PDF 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    /// 파일 절대 경로
    pub path: PathBuf,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl CollectedFile {
    /// PDF가 아니거나 일반 파일이 아니면 None
    pub fn from_path(path: PathBuf) -> Result<Option<Self>> {
        if !is_pdf(&path) {
            return Ok(None);
        }

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("Failed to read metadata: {:?}", path))?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            size: metadata.len(),
        }))
    }

    /// 파이프라인 입력용 경로 문자열
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    fn absolute(path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(std::env::current_dir()?.join(path))
        }
    }

    /// 단일 파일 수집
    ///
    /// 명시적으로 지정한 파일이므로 PDF가 아니면 에러입니다.
    pub fn collect_file(&self, path: &Path) -> Result<Option<CollectedFile>> {
        let abs_path = Self::absolute(path)?;

        if !abs_path.exists() {
            anyhow::bail!("File not found: {:?}", abs_path);
        }
        if !abs_path.is_file() {
            anyhow::bail!("Not a file: {:?}", abs_path);
        }
        if !is_pdf(&abs_path) {
            anyhow::bail!("Not a PDF file: {:?}", abs_path);
        }

        Ok(CollectedFile::from_path(abs_path)?.filter(|file| self.should_include(file)))
    }

    /// 폴더 재귀 수집 (경로 순 정렬)
    pub fn collect_directory(&self, path: &Path) -> Result<Vec<CollectedFile>> {
        let abs_path = Self::absolute(path)?;

        if !abs_path.exists() {
            anyhow::bail!("Directory not found: {:?}", abs_path);
        }
        if !abs_path.is_dir() {
            anyhow::bail!("Not a directory: {:?}", abs_path);
        }

        let mut files = Vec::new();

        // ignore 크레이트로 .gitignore 지원
        let walker = WalkBuilder::new(&abs_path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf()) {
                Ok(Some(file)) if self.should_include(&file) => files.push(file),
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to collect file: {}", e),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::info!("Collected {} PDF files from {:?}", files.len(), abs_path);
        Ok(files)
    }

    /// 개별 파일과 폴더를 합쳐 수집 (중복 경로 제거)
    pub fn collect(&self, files: &[PathBuf], dirs: &[PathBuf]) -> Result<Vec<CollectedFile>> {
        let mut collected = Vec::new();
        for path in files {
            collected.extend(self.collect_file(path)?);
        }
        for dir in dirs {
            collected.extend(self.collect_directory(dir)?);
        }

        let mut seen = std::collections::HashSet::new();
        collected.retain(|file| seen.insert(file.path.clone()));
        Ok(collected)
    }

    fn should_include(&self, file: &CollectedFile) -> bool {
        if self.config.max_file_size > 0 && file.size > self.config.max_file_size {
            tracing::warn!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
            return false;
        }
        true
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default, PartialEq)]
pub struct CollectionStats {
    pub total_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    pub fn from_files(files: &[CollectedFile]) -> Self {
        Self {
            total_files: files.len(),
            total_size: files.iter().map(|f| f.size).sum(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Path::new("manual.pdf")));
        assert!(is_pdf(Path::new("MANUAL.PDF")));
        assert!(!is_pdf(Path::new("notes.md")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[test]
    fn test_collector_config_default() {
        let config = CollectorConfig::default();
        assert!(config.respect_gitignore);
        assert!(!config.include_hidden);
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_collect_directory_finds_pdfs_only() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("sub").join("a.PDF"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"text").unwrap();

        let files = FileCollector::with_defaults()
            .collect_directory(dir.path())
            .unwrap();

        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_pdf(&f.path)));
        assert!(files[0].path < files[1].path);

        let stats = CollectionStats::from_files(&files);
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.total_size, 12);
    }

    #[test]
    fn test_collect_file_errors() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"x").unwrap();

        let collector = FileCollector::with_defaults();
        assert!(collector.collect_file(&txt).is_err());
        assert!(collector.collect_file(&dir.path().join("missing.pdf")).is_err());
        assert!(collector.collect_directory(&txt).is_err());
    }

    #[test]
    fn test_collect_dedups_and_applies_size_limit() {
        let dir = TempDir::new().unwrap();
        let small = dir.path().join("small.pdf");
        let large = dir.path().join("large.pdf");
        std::fs::write(&small, b"%PDF").unwrap();
        std::fs::write(&large, vec![0u8; 64]).unwrap();

        let collector = FileCollector::new(CollectorConfig {
            max_file_size: 16,
            ..Default::default()
        });
        let files = collector
            .collect(&[small.clone()], &[dir.path().to_path_buf()])
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, small);
    }
}
