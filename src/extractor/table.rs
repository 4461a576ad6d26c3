//! 표 감지 및 Markdown 변환
//!
//! 텍스트 레이아웃에서 표를 찾습니다: 탭 또는 2칸 이상 공백으로 나뉘는
//! 같은 열 수(2 이상)의 줄이 2줄 이상 연속되면 하나의 표로 봅니다.
//! 한 페이지에 여러 후보가 있으면 가장 긴 것을 사용합니다.

use std::sync::OnceLock;

use regex::Regex;

fn cell_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\t+|\s{2,}").expect("valid cell separator regex"))
}

/// 한 줄을 셀로 분리 (2개 미만이면 None)
fn split_cells(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let cells: Vec<String> = cell_separator()
        .split(trimmed)
        .map(|c| c.trim().to_string())
        .collect();

    (cells.len() >= 2).then_some(cells)
}

/// 페이지 텍스트에서 표 감지
pub fn detect_table(page_text: &str) -> Option<Vec<Vec<String>>> {
    let mut best: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in page_text.lines() {
        match split_cells(line) {
            Some(cells) if current.first().map_or(true, |r| r.len() == cells.len()) => {
                current.push(cells);
            }
            Some(cells) => {
                if current.len() > best.len() {
                    best = std::mem::take(&mut current);
                }
                current = vec![cells];
            }
            None => {
                if current.len() > best.len() {
                    best = std::mem::take(&mut current);
                }
                current.clear();
            }
        }
    }
    if current.len() > best.len() {
        best = current;
    }

    (best.len() >= 2).then_some(best)
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', " ")
}

/// 표를 Markdown으로 변환 (첫 행 = 헤더)
///
/// 행 길이가 다르면 빈 셀로 채웁니다. 행이 없으면 None.
pub fn render_markdown_table(rows: &[Vec<String>]) -> Option<String> {
    let header = rows.first()?;
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);

    let render_row = |row: &[String]| {
        let cells: Vec<String> = (0..columns)
            .map(|i| escape_cell(row.get(i).map(String::as_str).unwrap_or("")))
            .collect();
        format!("| {} |", cells.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(render_row(header));
    lines.push(format!("|{}", "---|".repeat(columns)));
    for row in &rows[1..] {
        lines.push(render_row(row));
    }

    Some(lines.join("\n"))
}
