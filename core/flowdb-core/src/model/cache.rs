//! ModelCache: primary key → model 캐시
//!
//! 가장 최근에 로드/저장된 모델 인스턴스를 primary key 튜플로 보관합니다.
//! 캐시는 참고용이며, 강제 재로드는 캐시를 거치지 않습니다.

use crate::value::SqlValue;
use lru::LruCache;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// 캐시 키를 구성하는 한 컬럼 값
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Null,
    Integer(i64),
    /// f64 비트 패턴
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&SqlValue> for KeyPart {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => KeyPart::Null,
            SqlValue::Integer(v) => KeyPart::Integer(*v),
            SqlValue::Real(v) => KeyPart::Real(v.to_bits()),
            SqlValue::Text(v) => KeyPart::Text(v.clone()),
            SqlValue::Blob(v) => KeyPart::Blob(v.clone()),
        }
    }
}

/// Primary key 튜플 (단일 키는 인라인 저장)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(SmallVec<[KeyPart; 2]>);

impl CacheKey {
    pub fn from_values(values: &[SqlValue]) -> Self {
        Self(values.iter().map(KeyPart::from).collect())
    }

    pub fn single(value: impl Into<SqlValue>) -> Self {
        Self::from_values(&[value.into()])
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }
}

/// 복합 primary key를 캐시 키로 변환
///
/// 기본 변환은 컬럼 값을 순서대로 튜플로 묶습니다. 여러 컬럼 중 일부만으로 식별하거나
/// 값을 정규화해야 하면 구현을 제공하세요.
pub trait MultiKeyCacheConverter: Send + Sync {
    fn cache_key(&self, values: &[SqlValue]) -> CacheKey;
}

impl<F> MultiKeyCacheConverter for F
where
    F: Fn(&[SqlValue]) -> CacheKey + Send + Sync,
{
    fn cache_key(&self, values: &[SqlValue]) -> CacheKey {
        self(values)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: Option<usize>,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 모델 캐시. 구현체는 내부 잠금으로 동기화합니다.
pub trait ModelCache<M>: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<M>;

    fn put(&self, key: CacheKey, model: M);

    fn remove(&self, key: &CacheKey) -> Option<M>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;
}

#[derive(Default)]
struct HitCounter {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitCounter {
    fn record<M>(&self, found: Option<M>) -> Option<M> {
        match found {
            Some(model) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(model)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn load(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// 용량 제한 LRU 캐시
pub struct LruModelCache<M> {
    inner: Mutex<LruCache<CacheKey, M, ahash::RandomState>>,
    capacity: usize,
    counter: HitCounter,
}

impl<M> LruModelCache<M> {
    /// 용량 0은 1로 취급합니다.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::with_hasher(cap, ahash::RandomState::new())),
            capacity: cap.get(),
            counter: HitCounter::default(),
        }
    }
}

impl<M: Clone + Send> ModelCache<M> for LruModelCache<M> {
    fn get(&self, key: &CacheKey) -> Option<M> {
        let found = self.inner.lock().get(key).cloned();
        self.counter.record(found)
    }

    fn put(&self, key: CacheKey, model: M) {
        self.inner.lock().put(key, model);
    }

    fn remove(&self, key: &CacheKey) -> Option<M> {
        self.inner.lock().pop(key)
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn stats(&self) -> CacheStats {
        let (hits, misses) = self.counter.load();
        CacheStats {
            size: self.len(),
            capacity: Some(self.capacity),
            hits,
            misses,
        }
    }
}

/// 용량 제한 없는 맵 캐시
pub struct SimpleMapCache<M> {
    inner: Mutex<HashMap<CacheKey, M, ahash::RandomState>>,
    counter: HitCounter,
}

impl<M> Default for SimpleMapCache<M> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::default()),
            counter: HitCounter::default(),
        }
    }
}

impl<M> SimpleMapCache<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M: Clone + Send> ModelCache<M> for SimpleMapCache<M> {
    fn get(&self, key: &CacheKey) -> Option<M> {
        let found = self.inner.lock().get(key).cloned();
        self.counter.record(found)
    }

    fn put(&self, key: CacheKey, model: M) {
        self.inner.lock().insert(key, model);
    }

    fn remove(&self, key: &CacheKey) -> Option<M> {
        self.inner.lock().remove(key)
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn stats(&self) -> CacheStats {
        let (hits, misses) = self.counter.load();
        CacheStats {
            size: self.len(),
            capacity: None,
            hits,
            misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_oldest() {
        let cache = LruModelCache::new(2);
        cache.put(CacheKey::single(1), "a");
        cache.put(CacheKey::single(2), "b");
        assert_eq!(cache.get(&CacheKey::single(1)), Some("a"));
        cache.put(CacheKey::single(3), "c");
        // 2가 가장 오래 사용되지 않음
        assert_eq!(cache.get(&CacheKey::single(2)), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_remove_then_miss() {
        let cache = LruModelCache::new(4);
        let key = CacheKey::single("k");
        cache.put(key.clone(), 10);
        assert_eq!(cache.remove(&key), Some(10));
        assert_eq!(cache.get(&key), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.capacity, Some(4));
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let cache = LruModelCache::new(0);
        cache.put(CacheKey::single(1), 1);
        cache.put(CacheKey::single(2), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_composite_key() {
        let cache = SimpleMapCache::new();
        let key = CacheKey::from_values(&[SqlValue::from(1), SqlValue::from("x")]);
        cache.put(key, "row");
        let same = CacheKey::from_values(&[SqlValue::from(1), SqlValue::from("x")]);
        let other = CacheKey::from_values(&[SqlValue::from(1), SqlValue::from("y")]);
        assert_eq!(cache.get(&same), Some("row"));
        assert_eq!(cache.get(&other), None);
        assert!((cache.stats().hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_closure_converter() {
        let converter = |values: &[SqlValue]| CacheKey::from_values(&values[..1]);
        let key = converter.cache_key(&[SqlValue::from(7), SqlValue::from(8)]);
        assert_eq!(key, CacheKey::single(7));
    }

    #[test]
    fn test_clear() {
        let cache = SimpleMapCache::new();
        cache.put(CacheKey::single(1), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
