//! 콘텐츠 추출 모듈
//!
//! PDF 페이지별 텍스트와 표를 추출하고, 청킹 전 단계의 조각(fragment)으로 만듭니다.
//! - 헤더 구분: `1.2 제목` 형태의 줄에 `### ` 접두어
//! - 표 변환: 첫 행을 헤더로 하는 Markdown 표
//! - PDF 파싱은 CPU 바운드이므로 blocking 풀에서 실행

pub mod header;
pub mod pdf;
pub mod table;

use std::path::Path;
use std::sync::Arc;

use crate::error::{RagError, Result};

pub use header::segment_headers;
pub use pdf::PdfPageSource;
pub use table::{detect_table, render_markdown_table};

// ============================================================================
// Page Source
// ============================================================================

/// 추출된 원본 페이지
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPage {
    /// 페이지 인덱스 (0부터 시작, 캐시 키와 표 주석에 그대로 사용)
    pub number: usize,
    /// 페이지 텍스트 (없으면 빈 문자열)
    pub text: String,
    /// 감지된 표 (행 x 셀)
    pub table: Option<Vec<Vec<String>>>,
}

/// 페이지 단위 추출기
pub trait PageSource: Send + Sync {
    /// 파일의 모든 페이지를 순서대로 반환
    fn pages(&self, path: &Path) -> anyhow::Result<Vec<RawPage>>;
}

/// blocking 풀에서 페이지 추출
///
/// 빈 경로는 즉시 검증 에러, 파싱 실패는 파일 경로를 담은 추출 에러입니다.
pub async fn load_pages(source: Arc<dyn PageSource>, file_path: &str) -> Result<Vec<RawPage>> {
    if file_path.trim().is_empty() {
        return Err(RagError::Validation("File path must be provided".to_string()));
    }

    let path = file_path.to_string();
    let pages = tokio::task::spawn_blocking(move || source.pages(Path::new(&path)))
        .await
        .map_err(|e| RagError::extraction(file_path, format!("extraction task failed: {e}")))?
        .map_err(|e| RagError::extraction(file_path, format!("{e:#}")))?;

    tracing::info!("Extracted {} pages from {}", pages.len(), file_path);
    Ok(pages)
}

// ============================================================================
// Fragments
// ============================================================================

/// 캐시 키를 가진 텍스트 조각 (페이지 본문 또는 표)
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub cache_key: String,
    pub page: usize,
    pub text: String,
    pub is_table: bool,
}

impl Fragment {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// 페이지 캐시 키
pub fn page_cache_key(file_path: &str, page: usize) -> String {
    format!("{}_page_{}", file_path, page)
}

/// 표 캐시 키
pub fn table_cache_key(file_path: &str, page: usize) -> String {
    format!("{}_page_{}_table", file_path, page)
}

/// 벡터 경로용 추출: 헤더 구분된 본문 + 표 조각을 페이지 순서대로
///
/// 텍스트가 없는 페이지는 본문 조각을 만들지 않습니다.
pub fn build_fragments(file_path: &str, pages: &[RawPage]) -> Vec<Fragment> {
    let mut fragments = Vec::new();

    for page in pages {
        if !page.text.is_empty() {
            fragments.push(Fragment {
                cache_key: page_cache_key(file_path, page.number),
                page: page.number,
                text: segment_headers(&page.text),
                is_table: false,
            });
        }

        if let Some(markdown) = page.table.as_deref().and_then(render_markdown_table) {
            fragments.push(Fragment {
                cache_key: table_cache_key(file_path, page.number),
                page: page.number,
                text: format!(
                    "\nTable extracted from page {}:\n{}\n",
                    page.number, markdown
                ),
                is_table: true,
            });
        }
    }

    fragments
}

/// 조각들을 줄바꿈으로 연결
pub fn join_fragments(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 텍스트 경로용 추출: 비어있지 않은 페이지 텍스트를 공백으로 연결
pub fn plain_text(pages: &[RawPage]) -> String {
    pages
        .iter()
        .filter(|p| !p.text.is_empty())
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    impl PageSource for FailingSource {
        fn pages(&self, _path: &Path) -> anyhow::Result<Vec<RawPage>> {
            anyhow::bail!("corrupt xref table")
        }
    }

    fn page(number: usize, text: &str) -> RawPage {
        RawPage {
            number,
            text: text.to_string(),
            table: None,
        }
    }

    #[test]
    fn test_build_fragments_order_and_keys() {
        let pages = vec![
            page(0, "1.1 개요\n본문"),
            RawPage {
                number: 1,
                text: "두번째".into(),
                table: Some(vec![
                    vec!["항목".into(), "값".into()],
                    vec!["압력".into(), "10".into()],
                ]),
            },
        ];

        let fragments = build_fragments("a.pdf", &pages);
        let keys: Vec<&str> = fragments.iter().map(|f| f.cache_key.as_str()).collect();
        assert_eq!(keys, vec!["a.pdf_page_0", "a.pdf_page_1", "a.pdf_page_1_table"]);
        assert_eq!(fragments[0].text, "### 1.1 개요\n본문");
        assert!(fragments[2].is_table);
        assert!(fragments[2].text.starts_with("\nTable extracted from page 1:\n| 항목"));
    }

    #[test]
    fn test_empty_page_contributes_nothing() {
        let pages = vec![page(0, ""), page(1, "text")];
        let fragments = build_fragments("b.pdf", &pages);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].page, 1);
        assert_eq!(plain_text(&pages), "text");
    }

    #[test]
    fn test_join_preserves_word_count() {
        let pages = vec![page(0, "a b"), page(1, "c")];
        let fragments = build_fragments("c.pdf", &pages);
        let joined = join_fragments(&fragments);
        let total: usize = fragments.iter().map(Fragment::word_count).sum();
        assert_eq!(joined.split_whitespace().count(), total);
    }

    #[tokio::test]
    async fn test_load_pages_rejects_empty_path() {
        let result = load_pages(Arc::new(FailingSource), "").await;
        assert!(matches!(result, Err(RagError::Validation(_))));
    }

    #[tokio::test]
    async fn test_load_pages_wraps_parse_error_with_path() {
        let err = load_pages(Arc::new(FailingSource), "broken.pdf")
            .await
            .unwrap_err();
        match err {
            RagError::Extraction { path, message } => {
                assert_eq!(path, "broken.pdf");
                assert!(message.contains("corrupt xref"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
