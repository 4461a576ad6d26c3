//! 수집 실행 단위 임시 캐시
//!
//! 페이지/표 추출 결과를 청크가 저장될 때까지 보관합니다.
//! 파이프라인 인스턴스가 소유하므로 한 번의 수집 호출보다 오래 살 수 없습니다.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TransientCache {
    entries: HashMap<String, String>,
}

impl TransientCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// 없는 키 제거는 no-op
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::debug!("Clearing {} cache entries", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for TransientCache {
    fn drop(&mut self) {
        self.clear();
    }
}
