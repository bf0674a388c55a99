//! 테이블 변경 알림
//!
//! 변경 Statement가 1행 이상 영향을 주면 `(table, action)`을 등록된 리스너에 전달합니다.
//! Batch 구간(`begin_batch`..`end_batch`) 안의 알림은 모아 두었다가 커밋 시 한 번에
//! 전달하며, fine-grained 모드가 아니면 테이블당 하나의 [`Action::Change`]로 합칩니다.
//! 롤백된 구간의 알림은 버립니다. Batch 구간은 스레드별로 관리하므로, 다른 스레드의
//! 알림은 그 스레드의 구간 상태만 따릅니다.

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

/// 변경 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Insert,
    Update,
    Delete,
    Save,
    /// Batch 구간에서 합쳐진 변경
    Change,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Save => "SAVE",
            Action::Change => "CHANGE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableChange {
    pub table: String,
    pub action: Action,
}

impl TableChange {
    pub fn new(table: impl Into<String>, action: Action) -> Self {
        Self {
            table: table.into(),
            action,
        }
    }
}

/// 변경 알림 수신자
pub trait TableChangeListener: Send + Sync {
    fn on_table_changed(&self, change: &TableChange);
}

impl<F> TableChangeListener for F
where
    F: Fn(&TableChange) + Send + Sync,
{
    fn on_table_changed(&self, change: &TableChange) {
        self(change)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    /// `None`이면 모든 테이블
    table: Option<String>,
    listener: Arc<dyn TableChangeListener>,
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    failed: bool,
    pending: Vec<TableChange>,
}

/// 리스너 등록부 + batch 병합
pub struct TableNotifier {
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    enabled: AtomicBool,
    fine_grained: bool,
    /// 스레드별 batch 구간
    batches: Mutex<AHashMap<ThreadId, BatchState>>,
}

impl Default for TableNotifier {
    fn default() -> Self {
        Self::new(false)
    }
}

impl TableNotifier {
    pub fn new(fine_grained: bool) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            enabled: AtomicBool::new(true),
            fine_grained,
            batches: Mutex::new(AHashMap::new()),
        }
    }

    pub fn is_fine_grained(&self) -> bool {
        self.fine_grained
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// 모든 테이블의 변경을 수신
    pub fn register(&self, listener: impl TableChangeListener + 'static) -> ListenerId {
        self.insert_registration(None, Arc::new(listener))
    }

    /// 한 테이블의 변경만 수신
    pub fn register_for_table(
        &self,
        table: impl Into<String>,
        listener: impl TableChangeListener + 'static,
    ) -> ListenerId {
        self.insert_registration(Some(table.into()), Arc::new(listener))
    }

    fn insert_registration(
        &self,
        table: Option<String>,
        listener: Arc<dyn TableChangeListener>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Registration {
            id,
            table,
            listener,
        });
        id
    }

    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// 변경 발행. Batch 구간이면 보류합니다.
    pub fn notify(&self, table: &str, action: Action) {
        if !self.is_enabled() {
            return;
        }
        let change = TableChange::new(table, action);
        {
            let mut batches = self.batches.lock();
            if let Some(batch) = batches.get_mut(&thread::current().id())
                && batch.depth > 0
            {
                trace!(table, %action, "deferring change until batch ends");
                batch.pending.push(change);
                return;
            }
        }
        self.dispatch(&change);
    }

    /// 현재 스레드가 batch 구간 안에 있는지
    pub fn in_batch(&self) -> bool {
        self.batches
            .lock()
            .get(&thread::current().id())
            .is_some_and(|batch| batch.depth > 0)
    }

    pub fn begin_batch(&self) {
        let mut batches = self.batches.lock();
        let batch = batches.entry(thread::current().id()).or_default();
        if batch.depth == 0 {
            batch.failed = false;
        }
        batch.depth += 1;
    }

    /// Batch 구간 종료. 가장 바깥 구간에서 모든 단계가 커밋했을 때만 보류된 알림을 전달합니다.
    pub fn end_batch(&self, committed: bool) {
        let pending = {
            let mut batches = self.batches.lock();
            let me = thread::current().id();
            let Some(batch) = batches.get_mut(&me) else {
                return;
            };
            batch.depth = batch.depth.saturating_sub(1);
            if !committed {
                batch.failed = true;
            }
            if batch.depth > 0 {
                return;
            }
            let Some(batch) = batches.remove(&me) else {
                return;
            };
            let pending = batch.pending;
            if batch.failed {
                debug!(dropped = pending.len(), "batch rolled back, dropping changes");
                return;
            }
            pending
        };
        for change in self.coalesce(pending) {
            self.dispatch(&change);
        }
    }

    /// Drop 시 롤백으로 끝나는 batch 구간
    pub fn batch(&self) -> BatchSpan<'_> {
        self.begin_batch();
        BatchSpan {
            notifier: self,
            finished: false,
        }
    }

    fn coalesce(&self, pending: Vec<TableChange>) -> Vec<TableChange> {
        if self.fine_grained {
            return pending;
        }
        let mut tables: Vec<String> = Vec::new();
        for change in pending {
            if !tables.contains(&change.table) {
                tables.push(change.table);
            }
        }
        tables
            .into_iter()
            .map(|table| TableChange::new(table, Action::Change))
            .collect()
    }

    fn dispatch(&self, change: &TableChange) {
        let targets: Vec<Arc<dyn TableChangeListener>> = self
            .listeners
            .read()
            .iter()
            .filter(|r| r.table.as_deref().is_none_or(|t| t == change.table))
            .map(|r| Arc::clone(&r.listener))
            .collect();
        for listener in targets {
            listener.on_table_changed(change);
        }
    }
}

impl fmt::Debug for TableNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableNotifier")
            .field("listeners", &self.listener_count())
            .field("enabled", &self.is_enabled())
            .field("fine_grained", &self.fine_grained)
            .finish()
    }
}

/// [`TableNotifier::batch`] 가드
pub struct BatchSpan<'a> {
    notifier: &'a TableNotifier,
    finished: bool,
}

impl BatchSpan<'_> {
    pub fn finish(mut self, committed: bool) {
        self.finished = true;
        self.notifier.end_batch(committed);
    }
}

impl Drop for BatchSpan<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.notifier.end_batch(false);
        }
    }
}
