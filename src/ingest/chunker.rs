//! 텍스트 청킹
//!
//! - 벡터 경로: 단어 수 기준 청크 + 오버랩 (기본 500/50)
//! - 텍스트 경로: `\w+` 토큰을 겹치지 않는 고정 크기 그룹으로 (기본 200)

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{RagError, Result};

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 청크 당 단어 수
    pub chunk_size: usize,
    /// 청크 간 중첩 단어 수
    pub overlap: usize,
    /// 텍스트 경로 그룹 당 토큰 수
    pub text_chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            text_chunk_size: 200,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.text_chunk_size == 0 {
            return Err(RagError::InvalidChunkConfig(
                "chunk sizes must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidChunkConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Word Chunks
// ============================================================================

/// 단어 범위를 기억하는 청크
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// 전체 텍스트 기준 단어 인덱스 범위
    pub words: Range<usize>,
}

/// 단어 기준 오버랩 청킹
///
/// 청크 `i`는 단어 `i * (chunk_size - overlap)`에서 시작하며,
/// 시작 위치가 단어 수보다 작은 동안 계속 만듭니다. 마지막 청크는 짧을 수 있습니다.
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(RagError::InvalidChunkConfig(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;

    let chunks: Vec<Chunk> = (0..words.len())
        .step_by(step)
        .map(|start| {
            let end = (start + chunk_size).min(words.len());
            Chunk {
                text: words[start..end].join(" "),
                words: start..end,
            }
        })
        .collect();

    tracing::debug!(
        "Split {} words into {} chunks (size={}, overlap={})",
        words.len(),
        chunks.len(),
        chunk_size,
        overlap
    );
    Ok(chunks)
}

// ============================================================================
// Token Groups
// ============================================================================

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w+\b").expect("valid word regex"))
}

/// 유니코드 단어 토큰 추출
pub fn tokenize_words(text: &str) -> Vec<&str> {
    word_regex().find_iter(text).map(|m| m.as_str()).collect()
}

/// 겹치지 않는 고정 크기 토큰 그룹
pub fn group_tokens<'a>(tokens: &[&'a str], size: usize) -> Vec<Vec<&'a str>> {
    if size == 0 {
        return vec![];
    }
    tokens.chunks(size).map(|group| group.to_vec()).collect()
}

// ============================================================================
// Tests
// ============================================================================
