//! 에러 타입
//!
//! 라이브러리 코어의 에러 분류입니다.
//! - Validation: 입력 검증 실패 (작업 수행 전 즉시 거부)
//! - Extraction: PDF 추출 실패 (파일 경로 포함)
//! - Storage: 임베딩/인덱스 저장 실패 (컬렉션 이름 포함)
//! - IndexUnavailable: Sparse 인덱스 미초기화 (예상 가능한 상태)
//! - Ingest: 수집 중단 (중단 전까지의 파일별 결과 포함)

use thiserror::Error;

use crate::ingest::IngestReport;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("failed to extract '{path}': {message}")]
    Extraction { path: String, message: String },

    #[error("storage error in collection '{collection}': {message}")]
    Storage { collection: String, message: String },

    #[error("sparse index for collection '{0}' is not initialized")]
    IndexUnavailable(String),

    /// 첫 실패에서 중단된 수집. `report`는 실패 전에 끝난 파일의 청크 수입니다.
    #[error("ingestion into '{}' stopped: {cause}", .report.collection)]
    Ingest {
        report: Box<IngestReport>,
        cause: Box<RagError>,
    },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagError {
    pub fn storage(collection: &str, error: impl std::fmt::Display) -> Self {
        Self::Storage {
            collection: collection.to_string(),
            message: error.to_string(),
        }
    }

    pub fn extraction(path: &str, error: impl std::fmt::Display) -> Self {
        Self::Extraction {
            path: path.to_string(),
            message: error.to_string(),
        }
    }

    pub fn ingest(report: IngestReport, cause: RagError) -> Self {
        Self::Ingest {
            report: Box::new(report),
            cause: Box::new(cause),
        }
    }

    /// 중단된 수집의 부분 결과
    pub fn partial_report(&self) -> Option<&IngestReport> {
        match self {
            Self::Ingest { report, .. } => Some(report),
            _ => None,
        }
    }

    /// 인덱스 미초기화 여부 (검색 계층에서 복구 가능한 상태)
    pub fn is_index_unavailable(&self) -> bool {
        matches!(self, Self::IndexUnavailable(_))
    }
}

pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_carries_collection() {
        let err = RagError::storage("manuals", "disk full");
        assert_eq!(
            err.to_string(),
            "storage error in collection 'manuals': disk full"
        );
        assert!(!err.is_index_unavailable());
    }

    #[test]
    fn test_ingest_error_keeps_report_and_cause() {
        let report = IngestReport {
            collection: "manuals".into(),
            files: Vec::new(),
        };
        let err = RagError::ingest(report, RagError::extraction("bad.pdf", "corrupt"));
        assert_eq!(
            err.to_string(),
            "ingestion into 'manuals' stopped: failed to extract 'bad.pdf': corrupt"
        );
        assert_eq!(err.partial_report().map(|r| r.collection.as_str()), Some("manuals"));
        assert!(RagError::Validation("x".into()).partial_report().is_none());
    }

    #[test]
    fn test_index_unavailable() {
        let err = RagError::IndexUnavailable("default".into());
        assert!(err.is_index_unavailable());
        assert!(err.to_string().contains("default"));
    }
}
