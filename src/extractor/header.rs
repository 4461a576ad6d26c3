//! 섹션 헤더 구분
//!
//! `숫자.숫자 공백 텍스트` 형태의 줄을 Markdown 헤더(`### `)로 표시합니다.

use std::sync::OnceLock;

use regex::Regex;

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+ .+$").expect("valid header regex"))
}

/// 페이지 텍스트의 헤더 줄에 접두어 추가 (줄 순서 유지)
pub fn segment_headers(page_text: &str) -> String {
    let re = header_regex();

    page_text
        .split('\n')
        .map(|line| {
            if re.is_match(line) {
                tracing::debug!("Extracted header: {}", line);
                format!("### {}", line)
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
