//! Batch save 큐
//!
//! 모델을 모았다가 대기 수가 임계값을 넘거나 유휴 주기가 지나면 한 번에 저장합니다.
//! 모아진 모델은 [`BatchSaveTransaction`] 하나로 트랜잭션 큐에 들어가고,
//! 그 안에서 하나의 저장소 트랜잭션으로 저장됩니다 (전부 성공 또는 전부 롤백).

use crate::config::BatchSaveConfig;
use crate::database::FlowDatabase;
use crate::error::{FlowError, FlowResult};
use crate::model::{InternalAdapter, MutableModel};
use crate::transaction::{Priority, Transaction, TransactionInfo, TransactionQueue};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

type PendingSave = Box<dyn FnOnce(&FlowDatabase) -> FlowResult<()> + Send>;

/// 저장 완료 시 저장된 모델 수
pub type FlushListener = Arc<dyn Fn(usize) + Send + Sync>;

/// 저장 실패 시 에러. 설정되어 있으면 실패가 큐 워커를 멈추지 않습니다.
pub type ErrorListener = Arc<dyn Fn(&FlowError) + Send + Sync>;

/// 모아진 모델을 한 저장소 트랜잭션으로 저장
pub struct BatchSaveTransaction {
    saves: Vec<PendingSave>,
    on_flush: Option<FlushListener>,
    on_error: Option<ErrorListener>,
}

impl BatchSaveTransaction {
    pub fn len(&self) -> usize {
        self.saves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saves.is_empty()
    }
}

impl Transaction for BatchSaveTransaction {
    type Output = usize;

    fn info(&self) -> TransactionInfo {
        TransactionInfo::named("batch-save", Priority::Normal)
    }

    fn on_execute(&mut self, db: &FlowDatabase) -> FlowResult<usize> {
        let saves = std::mem::take(&mut self.saves);
        let count = saves.len();
        let result = db.execute_transaction(|db| {
            for save in saves {
                save(db)?;
            }
            Ok(count)
        });
        match (result, &self.on_error) {
            (Ok(count), _) => {
                debug!(count, "batch saved");
                Ok(count)
            }
            (Err(err), Some(on_error)) => {
                warn!(error = %err, count, "batch save rolled back");
                on_error(&err);
                Ok(0)
            }
            (Err(err), None) => Err(err),
        }
    }

    fn has_result(&self, count: &usize) -> bool {
        *count > 0 && self.on_flush.is_some()
    }

    fn on_post_execute(&mut self, count: usize) {
        if let Some(on_flush) = &self.on_flush {
            on_flush(count);
        }
    }
}

#[derive(Default)]
struct BatchState {
    pending: Vec<PendingSave>,
    flush_requested: bool,
    quit: bool,
}

struct BatchShared {
    config: BatchSaveConfig,
    queue: Arc<TransactionQueue>,
    state: Mutex<BatchState>,
    wake: Condvar,
    on_flush: Mutex<Option<FlushListener>>,
    on_error: Mutex<Option<ErrorListener>>,
}

impl BatchShared {
    fn submit(&self, saves: Vec<PendingSave>) {
        if saves.is_empty() {
            return;
        }
        let transaction = BatchSaveTransaction {
            saves,
            on_flush: self.on_flush.lock().clone(),
            on_error: self.on_error.lock().clone(),
        };
        let count = transaction.len();
        match self.queue.add(transaction) {
            Ok(id) => debug!(%id, count, "batch submitted"),
            Err(err) => warn!(error = %err, count, "batch dropped"),
        }
    }
}

/// 임계값/주기 기반 batch save 큐
pub struct BatchSaveQueue {
    shared: Arc<BatchShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchSaveQueue {
    /// 저장 트랜잭션은 `queue`에서 실행됩니다.
    pub fn new(config: BatchSaveConfig, queue: Arc<TransactionQueue>) -> Self {
        Self {
            shared: Arc::new(BatchShared {
                config,
                queue,
                state: Mutex::new(BatchState::default()),
                wake: Condvar::new(),
                on_flush: Mutex::new(None),
                on_error: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BatchSaveConfig {
        &self.shared.config
    }

    pub fn start(&self) -> FlowResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        self.shared.state.lock().quit = false;
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("{}-batch", self.shared.queue.name()))
            .spawn(move || run_batch_worker(shared))?;
        *worker = Some(handle);
        info!(
            threshold = self.shared.config.threshold,
            interval_ms = self.shared.config.interval_ms,
            "batch save queue started"
        );
        Ok(())
    }

    pub fn set_flush_listener(&self, listener: impl Fn(usize) + Send + Sync + 'static) {
        *self.shared.on_flush.lock() = Some(Arc::new(listener));
    }

    pub fn set_error_listener(&self, listener: impl Fn(&FlowError) + Send + Sync + 'static) {
        *self.shared.on_error.lock() = Some(Arc::new(listener));
    }

    /// 저장 대기열에 추가. 대기 수가 임계값을 넘으면 즉시 플러시합니다.
    pub fn add<M>(&self, model: M)
    where
        M: MutableModel,
        M::Adapter: InternalAdapter,
    {
        let mut model = model;
        self.push(Box::new(move |db: &FlowDatabase| {
            model.save(db).map(|_| ())
        }));
    }

    pub fn add_all<M>(&self, models: impl IntoIterator<Item = M>)
    where
        M: MutableModel,
        M::Adapter: InternalAdapter,
    {
        for model in models {
            self.add(model);
        }
    }

    fn push(&self, save: PendingSave) {
        let mut state = self.shared.state.lock();
        state.pending.push(save);
        if state.pending.len() > self.shared.config.threshold {
            self.shared.wake.notify_one();
        }
    }

    /// 대기 중인 모델을 바로 플러시
    pub fn flush(&self) {
        let running = self.worker.lock().is_some();
        if running {
            let mut state = self.shared.state.lock();
            state.flush_requested = true;
            self.shared.wake.notify_one();
        } else {
            let saves = std::mem::take(&mut self.shared.state.lock().pending);
            self.shared.submit(saves);
        }
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// 남은 모델을 플러시하고 워커 종료
    pub fn quit(&self) {
        {
            let mut state = self.shared.state.lock();
            state.quit = true;
            self.shared.wake.notify_all();
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("batch save worker panicked");
        }
    }

    pub fn restart(&self) -> FlowResult<()> {
        self.quit();
        self.start()
    }
}

fn run_batch_worker(shared: Arc<BatchShared>) {
    let threshold = shared.config.threshold;
    let interval = shared.config.interval().max(Duration::from_millis(1));
    loop {
        let (saves, quit) = {
            let mut state = shared.state.lock();
            if !state.quit && !state.flush_requested && state.pending.len() <= threshold {
                // 타임아웃이면 주기 플러시
                shared.wake.wait_for(&mut state, interval);
            }
            state.flush_requested = false;
            (std::mem::take(&mut state.pending), state.quit)
        };
        shared.submit(saves);
        if quit {
            debug!("batch save worker stopped");
            return;
        }
    }
}

impl Drop for BatchSaveQueue {
    fn drop(&mut self) {
        self.quit();
    }
}

impl fmt::Debug for BatchSaveQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchSaveQueue")
            .field("config", &self.shared.config)
            .field("pending", &self.pending())
            .field("running", &self.worker.lock().is_some())
            .finish()
    }
}
