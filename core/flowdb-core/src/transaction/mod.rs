//! 우선순위 트랜잭션 큐
//!
//! 여기서 "트랜잭션"은 저장소 트랜잭션이 아니라 백그라운드 워커에서 실행되는 작업 단위입니다.
//! 필요하면 [`FlowDatabase::execute_transaction`](crate::FlowDatabase::execute_transaction)으로
//! 저장소 트랜잭션을 감쌀 수 있습니다.
//!
//! ## 수명 주기
//!
//! ```text
//! add → (pending, 우선순위 순) → on_ready → on_execute (워커) → has_result → on_post_execute (dispatcher)
//! ```
//!
//! - 같은 큐 안에서는 한 번에 하나만 실행됩니다 (선점/타임아웃 없음).
//! - 우선순위가 같으면 제출 순서(FIFO)를 따릅니다.
//! - 취소는 아직 실행되지 않은 트랜잭션에만 적용됩니다.
//! - `on_execute`가 에러를 반환하면 워커가 중단되고 크래시가 기록됩니다.
//!   [`TransactionQueue::restart`]나 [`TransactionManager::restart_all`]로 다시 시작합니다.

pub mod batch;
pub mod builtin;
pub mod dispatcher;
pub mod manager;
pub mod queue;

pub use batch::{BatchSaveQueue, BatchSaveTransaction};
pub use builtin::{
    FnTransaction, ModelOperation, ProcessModelTransaction, QueryTransaction,
    SelectListTransaction, SelectSingleTransaction,
};
pub use dispatcher::{ChannelDispatcher, ImmediateDispatcher, PostExecute, ResultDispatcher};
pub use manager::TransactionManager;
pub use queue::TransactionQueue;

use crate::database::FlowDatabase;
use crate::error::FlowResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// 실행 우선순위 (`Ui`가 가장 높음)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    Background,
    Low,
    #[default]
    Normal,
    High,
    Ui,
}

/// 이름(태그)과 우선순위
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionInfo {
    name: Option<String>,
    priority: Priority,
}

impl TransactionInfo {
    pub fn new(priority: Priority) -> Self {
        Self {
            name: None,
            priority,
        }
    }

    pub fn named(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: Some(name.into()),
            priority,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }
}

/// 큐에 추가된 트랜잭션 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

impl TransactionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// 큐에서 실행되는 작업
pub trait Transaction: Send + 'static {
    type Output: Send + 'static;

    fn info(&self) -> TransactionInfo {
        TransactionInfo::default()
    }

    /// `false`를 반환하면 실행하지 않습니다.
    fn on_ready(&mut self) -> bool {
        true
    }

    /// 워커 스레드에서 실행
    fn on_execute(&mut self, db: &FlowDatabase) -> FlowResult<Self::Output>;

    /// `false`면 `on_post_execute`를 호출하지 않습니다.
    fn has_result(&self, _result: &Self::Output) -> bool {
        true
    }

    /// dispatcher가 지정한 스레드에서 실행
    fn on_post_execute(&mut self, _result: Self::Output) {}
}

/// 타입이 지워진 큐 항목
pub(crate) trait QueuedTransaction: Send {
    fn info(&self) -> TransactionInfo;

    fn run(self: Box<Self>, db: &FlowDatabase, dispatcher: &dyn ResultDispatcher) -> FlowResult<()>;
}

impl<T: Transaction> QueuedTransaction for T {
    fn info(&self) -> TransactionInfo {
        Transaction::info(self)
    }

    fn run(mut self: Box<Self>, db: &FlowDatabase, dispatcher: &dyn ResultDispatcher) -> FlowResult<()> {
        if !self.on_ready() {
            return Ok(());
        }
        let result = self.on_execute(db)?;
        if self.has_result(&result) {
            dispatcher.dispatch(Box::new(move || self.on_post_execute(result)));
        }
        Ok(())
    }
}
