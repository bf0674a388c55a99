//! TransactionManager: 큐 소유자
//!
//! 기본 큐 하나, 필요할 때 만들어지는 테이블별 큐, batch save 큐를 관리합니다.
//! 드롭하면 batch save 큐를 먼저 플러시한 뒤 모든 큐를 종료합니다.

use crate::database::FlowDatabase;
use crate::error::FlowResult;
use crate::transaction::{
    BatchSaveQueue, ImmediateDispatcher, ResultDispatcher, Transaction, TransactionId,
    TransactionQueue,
};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub struct TransactionManager {
    db: Arc<FlowDatabase>,
    dispatcher: Arc<dyn ResultDispatcher>,
    queue: Arc<TransactionQueue>,
    table_queues: DashMap<String, Arc<TransactionQueue>, ahash::RandomState>,
    batch_queue: BatchSaveQueue,
}

impl TransactionManager {
    /// 결과 콜백을 워커 스레드에서 실행하는 관리자
    pub fn new(db: Arc<FlowDatabase>) -> FlowResult<Self> {
        Self::with_dispatcher(db, Arc::new(ImmediateDispatcher))
    }

    pub fn with_dispatcher(
        db: Arc<FlowDatabase>,
        dispatcher: Arc<dyn ResultDispatcher>,
    ) -> FlowResult<Self> {
        let config = db.config().clone();
        let queue = Arc::new(TransactionQueue::new(
            config.queue_name.clone(),
            Arc::clone(&db),
            Arc::clone(&dispatcher),
        ));
        queue.start()?;
        let batch_queue = BatchSaveQueue::new(config.batch_save.clone(), Arc::clone(&queue));
        batch_queue.start()?;
        info!(database = %config.database_name, queue = %config.queue_name, "transaction manager ready");
        Ok(Self {
            db,
            dispatcher,
            queue,
            table_queues: DashMap::default(),
            batch_queue,
        })
    }

    pub fn database(&self) -> &Arc<FlowDatabase> {
        &self.db
    }

    /// 기본 큐
    pub fn queue(&self) -> &Arc<TransactionQueue> {
        &self.queue
    }

    pub fn batch_save_queue(&self) -> &BatchSaveQueue {
        &self.batch_queue
    }

    /// 기본 큐에 추가
    pub fn add<T: Transaction>(&self, transaction: T) -> FlowResult<TransactionId> {
        self.queue.add(transaction)
    }

    /// 테이블 전용 큐 (처음 요청 시 생성 후 시작)
    pub fn queue_for(&self, table: &str) -> FlowResult<Arc<TransactionQueue>> {
        if let Some(queue) = self.table_queues.get(table) {
            return Ok(Arc::clone(queue.value()));
        }
        let queue = Arc::clone(
            self.table_queues
                .entry(table.to_string())
                .or_insert_with(|| {
                    Arc::new(TransactionQueue::new(
                        format!("{}-{table}", self.db.config().queue_name),
                        Arc::clone(&self.db),
                        Arc::clone(&self.dispatcher),
                    ))
                })
                .value(),
        );
        queue.start()?;
        Ok(queue)
    }

    pub fn add_for_table<T: Transaction>(
        &self,
        table: &str,
        transaction: T,
    ) -> FlowResult<TransactionId> {
        self.queue_for(table)?.add(transaction)
    }

    /// 모든 큐에서 대기 중인 트랜잭션 취소
    pub fn cancel(&self, id: TransactionId) -> bool {
        self.queue.cancel(id) || self.table_queues.iter().any(|entry| entry.value().cancel(id))
    }

    pub fn cancel_by_name(&self, name: &str) -> usize {
        self.queue.cancel_by_name(name)
            + self
                .table_queues
                .iter()
                .map(|entry| entry.value().cancel_by_name(name))
                .sum::<usize>()
    }

    /// 기본 큐와 테이블 큐가 모두 비워질 때까지 대기
    pub fn wait_idle(&self) {
        self.queue.wait_idle();
        for entry in self.table_queues.iter() {
            entry.value().wait_idle();
        }
    }

    /// 모든 큐 재시작 (크래시 복구)
    pub fn restart_all(&self) -> FlowResult<()> {
        self.queue.restart()?;
        for entry in self.table_queues.iter() {
            entry.value().restart()?;
        }
        self.batch_queue.restart()?;
        info!("transaction queues restarted");
        Ok(())
    }

    /// batch save 큐를 플러시하고 모든 큐 종료
    pub fn quit_all(&self) {
        self.batch_queue.quit();
        // 마지막 batch 저장이 끝날 때까지
        self.queue.wait_idle();
        for entry in self.table_queues.iter() {
            entry.value().quit();
        }
        self.queue.quit();
    }
}

impl Drop for TransactionManager {
    fn drop(&mut self) {
        self.quit_all();
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("queue", &self.queue)
            .field("table_queues", &self.table_queues.len())
            .field("batch_queue", &self.batch_queue)
            .finish()
    }
}
