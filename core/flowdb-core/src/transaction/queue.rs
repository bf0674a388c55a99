//! 우선순위 트랜잭션 큐 (단일 워커 스레드)

use crate::database::FlowDatabase;
use crate::error::{FlowError, FlowResult};
use crate::transaction::{
    Priority, QueuedTransaction, ResultDispatcher, Transaction, TransactionId,
};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

struct Entry {
    priority: Priority,
    seq: u64,
    id: TransactionId,
    name: Option<String>,
    task: Box<dyn QueuedTransaction>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// 높은 우선순위 먼저, 같으면 먼저 들어온 것 먼저
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    pending: BinaryHeap<Entry>,
    next_seq: u64,
    running: bool,
    busy: bool,
    quit: bool,
    crash: Option<String>,
}

struct Shared {
    name: String,
    db: Arc<FlowDatabase>,
    dispatcher: Arc<dyn ResultDispatcher>,
    state: Mutex<QueueState>,
    /// 새 항목 또는 종료 요청
    available: Condvar,
    /// 대기 항목이 없고 실행 중인 작업도 없음
    idle: Condvar,
}

/// 워커가 어떤 경로로 끝나든 (panic 포함) 상태를 정리
struct WorkerExit<'a> {
    shared: &'a Shared,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if thread::panicking() {
            error!(queue = %self.shared.name, "transaction panicked, worker stopped");
            state.crash = Some("transaction panicked".to_string());
        }
        state.running = false;
        state.busy = false;
        self.shared.idle.notify_all();
    }
}

/// 트랜잭션을 우선순위 순서로 하나씩 실행하는 큐
///
/// 생성 직후에는 멈춘 상태이며 [`start`](Self::start)로 워커를 띄웁니다.
/// 멈춘 상태에서도 `add`는 가능하고, 시작 시 우선순위 순으로 실행됩니다.
pub struct TransactionQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionQueue {
    pub fn new(
        name: impl Into<String>,
        db: Arc<FlowDatabase>,
        dispatcher: Arc<dyn ResultDispatcher>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                db,
                dispatcher,
                state: Mutex::new(QueueState::default()),
                available: Condvar::new(),
                idle: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// 워커 시작. 이미 실행 중이면 아무것도 하지 않습니다.
    pub fn start(&self) -> FlowResult<()> {
        let mut worker = self.worker.lock();
        {
            let mut state = self.shared.state.lock();
            if state.running {
                return Ok(());
            }
            if state.quit {
                return Err(FlowError::QueueShutdown(self.shared.name.clone()));
            }
            state.running = true;
        }
        if let Some(stale) = worker.take() {
            let _ = stale.join();
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || run_worker(shared));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                info!(queue = %self.shared.name, "transaction queue started");
                Ok(())
            }
            Err(err) => {
                self.shared.state.lock().running = false;
                Err(err.into())
            }
        }
    }

    /// 트랜잭션 추가. 종료된 큐는 [`FlowError::QueueShutdown`].
    pub fn add<T: Transaction>(&self, transaction: T) -> FlowResult<TransactionId> {
        self.enqueue(Box::new(transaction))
    }

    pub(crate) fn enqueue(&self, task: Box<dyn QueuedTransaction>) -> FlowResult<TransactionId> {
        let info = task.info();
        let id = TransactionId::next();
        let mut state = self.shared.state.lock();
        if state.quit {
            return Err(FlowError::QueueShutdown(self.shared.name.clone()));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        debug!(queue = %self.shared.name, %id, priority = ?info.priority(), "transaction queued");
        state.pending.push(Entry {
            priority: info.priority(),
            seq,
            id,
            name: info.name().map(str::to_string),
            task,
        });
        self.shared.available.notify_one();
        Ok(id)
    }

    /// 아직 실행되지 않은 트랜잭션 취소
    pub fn cancel(&self, id: TransactionId) -> bool {
        let mut state = self.shared.state.lock();
        let before = state.pending.len();
        state.pending.retain(|entry| entry.id != id);
        let removed = state.pending.len() != before;
        if removed {
            debug!(queue = %self.shared.name, %id, "transaction cancelled");
            self.shared.idle.notify_all();
        }
        removed
    }

    /// 이름이 같은 대기 트랜잭션을 모두 취소하고 취소 수를 반환
    pub fn cancel_by_name(&self, name: &str) -> usize {
        let mut state = self.shared.state.lock();
        let before = state.pending.len();
        state
            .pending
            .retain(|entry| entry.name.as_deref() != Some(name));
        let removed = before - state.pending.len();
        if removed > 0 {
            debug!(queue = %self.shared.name, name, removed, "transactions cancelled");
            self.shared.idle.notify_all();
        }
        removed
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().quit
    }

    /// 마지막 워커 크래시
    pub fn last_crash(&self) -> Option<FlowError> {
        self.shared
            .state
            .lock()
            .crash
            .clone()
            .map(|message| FlowError::WorkerCrashed {
                queue: self.shared.name.clone(),
                message,
            })
    }

    /// 대기 항목이 모두 처리되거나 워커가 멈출 때까지 대기
    pub fn wait_idle(&self) {
        let mut state = self.shared.state.lock();
        while state.running && (state.busy || !state.pending.is_empty()) {
            self.shared.idle.wait(&mut state);
        }
    }

    /// `wait_idle`과 같지만 시간 제한이 있습니다. 유휴 상태에 도달하면 `true`.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.running && (state.busy || !state.pending.is_empty()) {
            if self
                .shared
                .idle
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return !(state.running && (state.busy || !state.pending.is_empty()));
            }
        }
        true
    }

    /// 워커 종료 후 join. 실행 중인 트랜잭션은 끝까지 실행되고, 대기 항목은 남습니다.
    pub fn quit(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.quit && !state.running {
                return;
            }
            state.quit = true;
            self.shared.available.notify_all();
        }
        self.join_worker();
        info!(queue = %self.shared.name, pending = self.pending(), "transaction queue stopped");
    }

    /// 종료/크래시 상태를 지우고 워커를 다시 시작. 남아 있던 대기 항목이 이어서 실행됩니다.
    pub fn restart(&self) -> FlowResult<()> {
        self.quit();
        {
            let mut state = self.shared.state.lock();
            state.quit = false;
            state.crash = None;
        }
        self.start()
    }

    fn join_worker(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            warn!(queue = %self.shared.name, "worker thread panicked");
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    let _exit = WorkerExit { shared: &shared };
    debug!(queue = %shared.name, "worker running");
    loop {
        let entry = {
            let mut state = shared.state.lock();
            loop {
                if state.quit {
                    return;
                }
                if let Some(entry) = state.pending.pop() {
                    state.busy = true;
                    break entry;
                }
                shared.idle.notify_all();
                shared.available.wait(&mut state);
            }
        };

        let id = entry.id;
        let result = entry.task.run(&shared.db, shared.dispatcher.as_ref());

        let mut state = shared.state.lock();
        state.busy = false;
        if let Err(err) = result {
            error!(queue = %shared.name, %id, error = %err, "transaction failed, worker stopped");
            state.crash = Some(err.to_string());
            return;
        }
        if state.pending.is_empty() {
            shared.idle.notify_all();
        }
    }
}

impl Drop for TransactionQueue {
    fn drop(&mut self) {
        self.quit();
    }
}

impl fmt::Debug for TransactionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TransactionQueue")
            .field("name", &self.shared.name)
            .field("pending", &state.pending.len())
            .field("running", &state.running)
            .field("crash", &state.crash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowConfig;
    use crate::transaction::{ImmediateDispatcher, TransactionInfo};

    struct Record {
        info: TransactionInfo,
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Transaction for Record {
        type Output = ();

        fn info(&self) -> TransactionInfo {
            self.info.clone()
        }

        fn on_execute(&mut self, _db: &FlowDatabase) -> FlowResult<()> {
            self.log.lock().push(self.label);
            Ok(())
        }
    }

    struct Fail;

    impl Transaction for Fail {
        type Output = ();

        fn on_execute(&mut self, _db: &FlowDatabase) -> FlowResult<()> {
            Err(FlowError::configuration("jobs", "boom"))
        }
    }

    fn queue() -> TransactionQueue {
        let db = Arc::new(FlowDatabase::open_in_memory(FlowConfig::default()).unwrap());
        TransactionQueue::new("test-queue", db, Arc::new(ImmediateDispatcher))
    }

    fn record(
        label: &'static str,
        priority: Priority,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Record {
        Record {
            info: TransactionInfo::named(label, priority),
            label,
            log: log.clone(),
        }
    }

    #[test]
    fn test_priority_then_fifo() {
        let queue = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.add(record("low", Priority::Low, &log)).unwrap();
        queue.add(record("ui", Priority::Ui, &log)).unwrap();
        queue.add(record("normal-1", Priority::Normal, &log)).unwrap();
        queue.add(record("normal-2", Priority::Normal, &log)).unwrap();
        queue.add(record("bg", Priority::Background, &log)).unwrap();

        queue.start().unwrap();
        queue.wait_idle();
        assert_eq!(
            *log.lock(),
            vec!["ui", "normal-1", "normal-2", "low", "bg"]
        );
    }

    #[test]
    fn test_cancel_pending() {
        let queue = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        let keep = queue.add(record("keep", Priority::Normal, &log)).unwrap();
        let drop_me = queue.add(record("drop", Priority::Normal, &log)).unwrap();
        queue.add(record("tagged", Priority::Low, &log)).unwrap();
        queue.add(record("tagged", Priority::High, &log)).unwrap();

        assert!(queue.cancel(drop_me));
        assert!(!queue.cancel(drop_me));
        assert_eq!(queue.cancel_by_name("tagged"), 2);
        assert_ne!(keep, drop_me);

        queue.start().unwrap();
        queue.wait_idle();
        assert_eq!(*log.lock(), vec!["keep"]);
    }

    #[test]
    fn test_failure_stops_worker_and_restart_resumes() {
        let queue = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.add(Fail).unwrap();
        queue.add(record("after", Priority::Low, &log)).unwrap();

        queue.start().unwrap();
        queue.wait_idle();
        assert!(!queue.is_running());
        assert!(matches!(
            queue.last_crash(),
            Some(FlowError::WorkerCrashed { .. })
        ));
        assert_eq!(queue.pending(), 1);

        queue.restart().unwrap();
        queue.wait_idle();
        assert!(queue.last_crash().is_none());
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[test]
    fn test_add_after_quit_fails() {
        let queue = queue();
        queue.start().unwrap();
        queue.quit();
        assert!(queue.is_shut_down());
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = queue.add(record("late", Priority::Ui, &log)).unwrap_err();
        assert!(matches!(err, FlowError::QueueShutdown(_)));
    }

    #[test]
    fn test_wait_idle_timeout_when_stopped() {
        let queue = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.add(record("never", Priority::Normal, &log)).unwrap();
        // 워커가 없으면 기다릴 대상도 없음
        assert!(queue.wait_idle_timeout(Duration::from_millis(10)));
        assert_eq!(queue.pending(), 1);
    }
}
