//! 로컬 해싱 임베딩
//!
//! 문자 트라이그램을 FNV-1a로 버킷에 해싱한 뒤 L2 정규화합니다.
//! 네트워크 없이 결정적인 벡터를 만들며, 한글 음절 단위로도 동작합니다.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::EmbeddingProvider;

pub const DEFAULT_HASHING_DIMENSION: usize = 256;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSION)
    }
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// 동기 임베딩 계산
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        if chars.is_empty() {
            return vector;
        }

        // 3글자 미만 텍스트도 하나의 그램으로 취급
        let grams: Vec<&[char]> = if chars.len() < 3 {
            vec![chars.as_slice()]
        } else {
            chars.windows(3).collect()
        };

        for gram in grams {
            let mut hash = FNV_OFFSET;
            let mut buf = [0u8; 4];
            for c in gram {
                for byte in c.encode_utf8(&mut buf).bytes() {
                    hash ^= byte as u64;
                    hash = hash.wrapping_mul(FNV_PRIME);
                }
            }
            vector[(hash % self.dimension as u64) as usize] += 1.0;
        }

        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // CPU 바운드 작업은 blocking 풀에서 실행
        let embedder = *self;
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.embed_sync(&text))
            .await
            .context("Embedding task failed")
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "local-hashing-trigram"
    }
}
