//! Runtime configuration
//!
//! `FlowConfig`는 JSON 문자열/파일 또는 환경 변수에서 로드됩니다.
//! 모든 필드는 기본값을 가지므로 일부만 지정해도 됩니다.

use crate::error::FlowResult;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// ModelCache 기본 용량 (테이블별 설정이 없을 때)
pub const DEFAULT_CACHE_SIZE: usize = 25;

/// Batch save 기본 임계값
pub const DEFAULT_BATCH_THRESHOLD: usize = 50;

/// Batch save 기본 유휴 플러시 주기 (30초)
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 30_000;

/// Batch save 큐 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSaveConfig {
    /// 대기 모델 수가 이 값을 초과하면 즉시 플러시
    pub threshold: usize,
    /// 유휴 플러시 주기 (밀리초)
    pub interval_ms: u64,
}

impl Default for BatchSaveConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BATCH_THRESHOLD,
            interval_ms: DEFAULT_BATCH_INTERVAL_MS,
        }
    }
}

impl BatchSaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// FlowDB 런타임 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// 데이터베이스 이름 (로그/큐 이름에 사용)
    pub database_name: String,
    /// 테이블별 크기가 없을 때 사용하는 ModelCache 용량
    pub default_cache_size: usize,
    /// 변경 알림 발행 여부
    pub notify_changes: bool,
    /// true이면 batch 구간에서도 개별 액션을 그대로 전달
    pub fine_grained_notifications: bool,
    /// 기본 트랜잭션 큐 이름
    pub queue_name: String,
    /// Batch save 설정
    pub batch_save: BatchSaveConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            database_name: "flowdb".to_string(),
            default_cache_size: DEFAULT_CACHE_SIZE,
            notify_changes: true,
            fine_grained_notifications: false,
            queue_name: "flowdb-transactions".to_string(),
            batch_save: BatchSaveConfig::default(),
        }
    }
}

impl FlowConfig {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    /// JSON 문자열에서 로드
    pub fn from_json(json: &str) -> FlowResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON 파일에서 로드
    pub fn load(path: &Path) -> FlowResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// JSON 파일로 저장
    pub fn save(&self, path: &Path) -> FlowResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// 환경 변수 덮어쓰기
    ///
    /// - `FLOWDB_CACHE_SIZE`
    /// - `FLOWDB_BATCH_THRESHOLD`
    /// - `FLOWDB_BATCH_INTERVAL_MS`
    ///
    /// 파싱할 수 없는 값은 무시합니다.
    pub fn apply_env(mut self) -> Self {
        if let Some(size) = env_parse::<usize>("FLOWDB_CACHE_SIZE") {
            self.default_cache_size = size;
        }
        if let Some(threshold) = env_parse::<usize>("FLOWDB_BATCH_THRESHOLD") {
            self.batch_save.threshold = threshold;
        }
        if let Some(interval) = env_parse::<u64>("FLOWDB_BATCH_INTERVAL_MS") {
            self.batch_save.interval_ms = interval;
        }
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.default_cache_size = size;
        self
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notify_changes = enabled;
        self
    }

    pub fn with_fine_grained_notifications(mut self, enabled: bool) -> Self {
        self.fine_grained_notifications = enabled;
        self
    }

    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_save.threshold = threshold;
        self
    }

    pub fn with_batch_interval(mut self, interval: Duration) -> Self {
        self.batch_save.interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
