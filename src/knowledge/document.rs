//! 문서 레코드 및 컬렉션 이름 정규화
//!
//! 모든 저장소 경계에서 `{page_content, metadata}` 고정 레코드를 사용합니다.
//! 컬렉션 이름은 Dense/Sparse 저장소 양쪽에서 저장 키로 쓰이므로
//! 반드시 [`normalize_collection_name`]을 거쳐야 합니다.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// 컬렉션 이름 최소 길이
pub const MIN_COLLECTION_NAME_LEN: usize = 3;
/// 컬렉션 이름 최대 길이
pub const MAX_COLLECTION_NAME_LEN: usize = 63;

// ============================================================================
// Types
// ============================================================================

/// 청크 메타데이터
///
/// `cosine_similarity`는 수집 시 자기 유사도, 검색 시 `1 - distance`가 붙습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// 원본 파일 경로 (텍스트 경로는 `{file}_chunk_{n}`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosine_similarity: Option<f32>,
    /// 표 조각을 포함한 청크
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<bool>,
    /// 빈 검색 결과 자리표시자 전용
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Metadata {
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// 키 정렬된 JSON 표현 (중복 제거 키)
    pub fn canonical_json(&self) -> Result<String> {
        // serde_json::Map은 BTreeMap 기반이므로 키가 정렬됨
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string(&value)?)
    }
}

/// 청크 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(page_content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// (본문, 정렬된 메타데이터) 중복 제거 키
    pub fn dedup_key(&self) -> Result<(String, String)> {
        Ok((self.page_content.clone(), self.metadata.canonical_json()?))
    }
}

// ============================================================================
// Collection Names
// ============================================================================

/// 컬렉션 이름을 저장 키로 쓸 수 있는 형태로 정규화
///
/// 결과는 3~63자, `[A-Za-z0-9_-]`만 포함하며 처음과 끝은 영숫자입니다.
/// 이미 정규화된 이름에는 아무 변화가 없습니다.
pub fn normalize_collection_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RagError::Validation(
            "collection name must be provided".to_string(),
        ));
    }

    let mut normalized: String = trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let len = normalized.len();
    if !(MIN_COLLECTION_NAME_LEN..=MAX_COLLECTION_NAME_LEN).contains(&len) {
        normalized.truncate(MAX_COLLECTION_NAME_LEN);
        normalized = normalized.trim_end_matches('_').to_string();
    }

    if normalized.is_empty() {
        normalized.push('a');
    }

    if !normalized.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        normalized.replace_range(..1, "a");
    }
    if !normalized.ends_with(|c: char| c.is_ascii_alphanumeric()) {
        let last = normalized.len() - 1;
        normalized.replace_range(last.., "1");
    }

    while normalized.len() < MIN_COLLECTION_NAME_LEN {
        normalized.push('0');
    }

    Ok(normalized)
}

/// 파일 경로의 파일명으로 컬렉션 이름 후보 생성
pub fn format_collection_name(file_path: &str) -> String {
    let base_name = std::path::Path::new(file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_path);

    let mut formatted = String::with_capacity(base_name.len());
    for c in base_name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '_'
        };
        if c == '_' && formatted.ends_with('_') {
            continue;
        }
        formatted.push(c);
    }

    formatted.trim_matches('_').to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(name: &str) {
        assert!(
            (MIN_COLLECTION_NAME_LEN..=MAX_COLLECTION_NAME_LEN).contains(&name.len()),
            "bad length: {name}"
        );
        assert!(name.starts_with(|c: char| c.is_ascii_alphanumeric()));
        assert!(name.ends_with(|c: char| c.is_ascii_alphanumeric()));
        assert!(name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }

    #[test]
    fn test_normalize_keeps_valid_name() {
        assert_eq!(normalize_collection_name("manuals_2024").unwrap(), "manuals_2024");
    }

    #[test]
    fn test_normalize_fixes_edges() {
        assert_eq!(normalize_collection_name("_docs_").unwrap(), "adocs1");
        assert_eq!(normalize_collection_name("-ab-").unwrap(), "aab1");
    }

    #[test]
    fn test_normalize_truncates_long_name() {
        let long = format!("{}_tail", "x".repeat(80));
        let normalized = normalize_collection_name(&long).unwrap();
        assert_eq!(normalized.len(), 63);
        assert_valid(&normalized);
    }

    #[test]
    fn test_normalize_truncation_strips_underscores() {
        let long = format!("{}{}", "y".repeat(60), "_".repeat(10));
        let normalized = normalize_collection_name(&long).unwrap();
        assert_eq!(normalized, "y".repeat(60));
    }

    #[test]
    fn test_normalize_short_and_non_ascii() {
        assert_eq!(normalize_collection_name("a").unwrap(), "a00");
        let korean = normalize_collection_name("사용자 매뉴얼").unwrap();
        assert_valid(&korean);
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(
            normalize_collection_name("   "),
            Err(RagError::Validation(_))
        ));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["a", "_x_", "정책 문서 v2", "report.pdf", "ok-name", &"z".repeat(100)] {
            let once = normalize_collection_name(raw).unwrap();
            let twice = normalize_collection_name(&once).unwrap();
            assert_eq!(once, twice);
            assert_valid(&once);
        }
    }

    #[test]
    fn test_format_collection_name() {
        assert_eq!(format_collection_name("/tmp/up/My Report (v2).pdf"), "My_Report_v2_pdf");
        assert_eq!(format_collection_name("__a__b__"), "a_b");
    }

    #[test]
    fn test_canonical_json_sorted_and_compact() {
        let meta = Metadata {
            source: "a.pdf".into(),
            table: Some(true),
            chunk_id: Some("a.pdf_chunk_1".into()),
            ..Default::default()
        };
        assert_eq!(
            meta.canonical_json().unwrap(),
            r#"{"chunk_id":"a.pdf_chunk_1","source":"a.pdf","table":true}"#
        );
    }

    #[test]
    fn test_document_serde_shape() {
        let doc = Document::new("본문", Metadata::from_source("a.pdf"));
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"page_content":"본문","metadata":{"source":"a.pdf"}}"#);
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }
}
