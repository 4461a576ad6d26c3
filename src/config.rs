//! 설정 모듈
//!
//! 환경변수에서 저장 경로와 임베딩 프로바이더를 읽습니다.
//! 지정하지 않은 경로는 데이터 디렉토리(~/.hybrid-pdf-rag/) 아래로 기본 설정됩니다.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// 벡터 인덱스 루트 (컬렉션별 하위 디렉토리)
pub const ENV_VECTOR_DIRECTORY: &str = "VECTOR_DIRECTORY";
/// 텍스트 저장소 루트 (컬렉션별 .jsonl)
pub const ENV_TEXT_REPOSITORY_PATH: &str = "TEXT_REPOSITORY_PATH";
/// 업로드 파일 저장 위치
pub const ENV_UPLOAD_DIR: &str = "UPLOAD_DIR";
/// 임베딩 프로바이더 (gemini | local)
pub const ENV_EMBEDDING_PROVIDER: &str = "EMBEDDING_PROVIDER";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.hybrid-pdf-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hybrid-pdf-rag")
}

// ============================================================================
// Settings
// ============================================================================

/// 임베딩 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    /// Gemini API (API 키 필요)
    Gemini,
    /// 로컬 해싱 임베딩 (오프라인)
    Local,
}

impl EmbeddingKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "local" | "hashing" => Some(Self::Local),
            _ => None,
        }
    }
}

/// 애플리케이션 설정
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub vector_directory: PathBuf,
    pub text_repository_path: PathBuf,
    pub upload_dir: PathBuf,
    pub embedding: EmbeddingKind,
}

impl Settings {
    /// 데이터 디렉토리 하나를 기준으로 기본 경로 구성
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            vector_directory: data_dir.join("vectors"),
            text_repository_path: data_dir.join("textdb"),
            upload_dir: data_dir.join("pdfs"),
            embedding: EmbeddingKind::Gemini,
        }
    }

    /// 환경변수에서 로드
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 로드 (빈 값은 미설정으로 취급)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::with_data_dir(&get_data_dir());

        if let Some(dir) = get(ENV_VECTOR_DIRECTORY) {
            settings.vector_directory = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_TEXT_REPOSITORY_PATH) {
            settings.text_repository_path = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_UPLOAD_DIR) {
            settings.upload_dir = PathBuf::from(dir);
        }
        if let Some(kind) = get(ENV_EMBEDDING_PROVIDER) {
            match EmbeddingKind::parse(&kind) {
                Some(kind) => settings.embedding = kind,
                None => tracing::warn!("Unknown {}: {}, using gemini", ENV_EMBEDDING_PROVIDER, kind),
            }
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_with_data_dir_layout() {
        let settings = Settings::with_data_dir(Path::new("/tmp/rag"));
        assert_eq!(settings.vector_directory, PathBuf::from("/tmp/rag/vectors"));
        assert_eq!(settings.text_repository_path, PathBuf::from("/tmp/rag/textdb"));
        assert_eq!(settings.upload_dir, PathBuf::from("/tmp/rag/pdfs"));
        assert_eq!(settings.embedding, EmbeddingKind::Gemini);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_VECTOR_DIRECTORY, "/data/vec"),
            (ENV_TEXT_REPOSITORY_PATH, "/data/text"),
            (ENV_UPLOAD_DIR, "  "),
            (ENV_EMBEDDING_PROVIDER, "local"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.vector_directory, PathBuf::from("/data/vec"));
        assert_eq!(settings.text_repository_path, PathBuf::from("/data/text"));
        // 빈 값은 기본값 유지
        assert!(settings.upload_dir.ends_with("pdfs"));
        assert_eq!(settings.embedding, EmbeddingKind::Local);
    }

    #[test]
    fn test_embedding_kind_parse() {
        assert_eq!(EmbeddingKind::parse("Gemini"), Some(EmbeddingKind::Gemini));
        assert_eq!(EmbeddingKind::parse("hashing"), Some(EmbeddingKind::Local));
        assert_eq!(EmbeddingKind::parse("openai"), None);
    }
}
