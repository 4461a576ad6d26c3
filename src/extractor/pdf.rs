//! PDF 페이지 추출 모듈
//!
//! pdf-extract로 페이지별 텍스트를 추출합니다. 줄바꿈과 열 간격이 유지되므로
//! 헤더 구분과 표 감지가 그대로 동작합니다.
//! pdf-extract가 실패하거나 panic하면 lopdf 페이지 추출로 대체합니다
//! (줄 구조가 사라질 수 있음). 구조 자체를 읽을 수 없는 PDF는 에러입니다.

use std::path::Path;

use anyhow::{Context, Result};

use super::table::detect_table;
use super::{PageSource, RawPage};

/// PDF 페이지 추출기
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfPageSource;

impl PageSource for PdfPageSource {
    fn pages(&self, path: &Path) -> Result<Vec<RawPage>> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

        let texts = match extract_with_pdf_extract(&bytes) {
            Ok(texts) => texts,
            Err(e) => {
                tracing::warn!(
                    "pdf-extract failed for {:?} ({:#}), falling back to lopdf",
                    path,
                    e
                );
                extract_with_lopdf(&bytes)
                    .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?
            }
        };

        if !texts.is_empty() && texts.iter().all(|t| t.is_empty()) {
            tracing::warn!(
                "No text extracted from PDF: {:?}. It might be a scanned document.",
                path
            );
        }

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let table = detect_table(&text);
                RawPage {
                    number: index,
                    text,
                    table,
                }
            })
            .collect())
    }
}

/// pdf-extract 페이지별 추출
///
/// 일부 글꼴에서 panic하므로 에러로 변환합니다.
fn extract_with_pdf_extract(bytes: &[u8]) -> Result<Vec<String>> {
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| anyhow::anyhow!("pdf-extract panicked"))?
        .map_err(|e| anyhow::anyhow!("pdf-extract failed: {:?}", e))?;

    Ok(pages.iter().map(|text| normalize_page(text)).collect())
}

/// lopdf 페이지별 추출 (페이지 순서 유지)
fn extract_with_lopdf(bytes: &[u8]) -> Result<Vec<String>> {
    let document = lopdf::Document::load_mem(bytes).context("Failed to parse PDF structure")?;

    // get_pages()는 BTreeMap이므로 페이지 번호 순
    document
        .get_pages()
        .keys()
        .map(|&page_no| {
            document
                .extract_text(&[page_no])
                .with_context(|| format!("Failed to extract text from page {}", page_no))
                .map(|text| normalize_page(&text))
        })
        .collect()
}

/// 페이지 앞뒤 빈 줄 제거, 줄 끝 공백 제거 (줄 안의 열 간격은 유지)
fn normalize_page(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::segment_headers;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use tempfile::TempDir;

    /// 페이지마다 줄 목록을 Helvetica로 찍은 PDF 생성
    fn write_pdf(path: &Path, pages: &[&[&str]]) {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for lines in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
            ];
            for line in lines.iter() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("Td", vec![0.into(), (-20).into()]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_multi_page_pdf_keeps_lines_headers_and_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.pdf");
        write_pdf(
            &path,
            &[
                &["1.1 Overview", "hello world"],
                &["Item    Value", "Pressure    10", "Temp    80"],
                &["third page"],
            ],
        );

        let pages = PdfPageSource.pages(&path).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|p| p.number).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );

        // 줄이 합쳐지지 않아야 헤더가 감지됨
        let first: Vec<&str> = pages[0].text.lines().map(str::trim).collect();
        assert!(first.contains(&"1.1 Overview"));
        assert!(first.contains(&"hello world"));
        assert!(segment_headers(&pages[0].text).contains("### 1.1 Overview"));
        assert_eq!(pages[0].table, None);

        let row = |a: &str, b: &str| vec![a.to_string(), b.to_string()];
        assert_eq!(
            pages[1].table,
            Some(vec![
                row("Item", "Value"),
                row("Pressure", "10"),
                row("Temp", "80")
            ])
        );

        assert_eq!(pages[2].text.trim(), "third page");
        assert_eq!(pages[2].table, None);
    }

    #[test]
    fn test_normalize_page_keeps_column_spacing() {
        assert_eq!(
            normalize_page("\n\nItem    Value  \nTemp    80\n\n"),
            "Item    Value\nTemp    80"
        );
        assert_eq!(normalize_page("\n \n"), "");
    }

    #[test]
    fn test_corrupt_pdf_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken").unwrap();

        assert!(PdfPageSource.pages(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = PdfPageSource
            .pages(Path::new("/nonexistent/file.pdf"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read PDF"));
    }
}
