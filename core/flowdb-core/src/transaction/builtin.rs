//! 자주 쓰는 트랜잭션
//!
//! 모두 `with_name` / `with_priority`로 태그와 우선순위를 지정하고,
//! `on_result`로 결과 콜백을 붙일 수 있습니다. 콜백이 없으면 `on_post_execute`는 호출되지 않습니다.

use crate::database::{Cursor, FlowDatabase};
use crate::error::{FlowError, FlowResult};
use crate::model::{CursorLoader, InternalAdapter};
use crate::sql::queriable::Queriable;
use crate::transaction::{Priority, Transaction, TransactionInfo};
use std::sync::Arc;

type Callback<T> = Box<dyn FnOnce(T) + Send>;

macro_rules! info_builders {
    () => {
        pub fn with_name(mut self, name: impl Into<String>) -> Self {
            self.info.set_name(name);
            self
        }

        pub fn with_priority(mut self, priority: Priority) -> Self {
            self.info.set_priority(priority);
            self
        }
    };
}

/// Statement를 실행하고 결과 Cursor를 전달
pub struct QueryTransaction<Q> {
    info: TransactionInfo,
    query: Q,
    callback: Option<Callback<Cursor>>,
}

impl<Q: Queriable + Send + 'static> QueryTransaction<Q> {
    pub fn new(query: Q) -> Self {
        Self {
            info: TransactionInfo::default(),
            query,
            callback: None,
        }
    }

    info_builders!();

    pub fn on_result(mut self, callback: impl FnOnce(Cursor) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl<Q: Queriable + Send + 'static> Transaction for QueryTransaction<Q> {
    type Output = Cursor;

    fn info(&self) -> TransactionInfo {
        self.info.clone()
    }

    fn on_execute(&mut self, db: &FlowDatabase) -> FlowResult<Cursor> {
        self.query.query_cursor(db)
    }

    fn has_result(&self, _cursor: &Cursor) -> bool {
        self.callback.is_some()
    }

    fn on_post_execute(&mut self, cursor: Cursor) {
        if let Some(callback) = self.callback.take() {
            callback(cursor);
        }
    }
}

/// SELECT 결과 전체를 모델 목록으로 전달
pub struct SelectListTransaction<Q, L: CursorLoader> {
    info: TransactionInfo,
    query: Q,
    loader: Arc<L>,
    callback: Option<Callback<Vec<L::Model>>>,
}

impl<Q, L> SelectListTransaction<Q, L>
where
    Q: Queriable + Send + 'static,
    L: CursorLoader + Send + Sync + 'static,
    L::Model: Send + 'static,
{
    pub fn new(query: Q, loader: Arc<L>) -> Self {
        Self {
            info: TransactionInfo::default(),
            query,
            loader,
            callback: None,
        }
    }

    info_builders!();

    pub fn on_result(mut self, callback: impl FnOnce(Vec<L::Model>) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl<Q, L> Transaction for SelectListTransaction<Q, L>
where
    Q: Queriable + Send + 'static,
    L: CursorLoader + Send + Sync + 'static,
    L::Model: Send + 'static,
{
    type Output = Vec<L::Model>;

    fn info(&self) -> TransactionInfo {
        self.info.clone()
    }

    fn on_execute(&mut self, db: &FlowDatabase) -> FlowResult<Vec<L::Model>> {
        self.query.query_list(db, self.loader.as_ref())
    }

    fn has_result(&self, _models: &Vec<L::Model>) -> bool {
        self.callback.is_some()
    }

    fn on_post_execute(&mut self, models: Vec<L::Model>) {
        if let Some(callback) = self.callback.take() {
            callback(models);
        }
    }
}

/// SELECT 첫 행을 전달 (`None` 포함)
pub struct SelectSingleTransaction<Q, L: CursorLoader> {
    info: TransactionInfo,
    query: Q,
    loader: Arc<L>,
    callback: Option<Callback<Option<L::Model>>>,
}

impl<Q, L> SelectSingleTransaction<Q, L>
where
    Q: Queriable + Send + 'static,
    L: CursorLoader + Send + Sync + 'static,
    L::Model: Send + 'static,
{
    pub fn new(query: Q, loader: Arc<L>) -> Self {
        Self {
            info: TransactionInfo::default(),
            query,
            loader,
            callback: None,
        }
    }

    info_builders!();

    pub fn on_result(mut self, callback: impl FnOnce(Option<L::Model>) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl<Q, L> Transaction for SelectSingleTransaction<Q, L>
where
    Q: Queriable + Send + 'static,
    L: CursorLoader + Send + Sync + 'static,
    L::Model: Send + 'static,
{
    type Output = Option<L::Model>;

    fn info(&self) -> TransactionInfo {
        self.info.clone()
    }

    fn on_execute(&mut self, db: &FlowDatabase) -> FlowResult<Option<L::Model>> {
        self.query.query_single(db, self.loader.as_ref())
    }

    fn has_result(&self, _model: &Option<L::Model>) -> bool {
        self.callback.is_some()
    }

    fn on_post_execute(&mut self, model: Option<L::Model>) {
        if let Some(callback) = self.callback.take() {
            callback(model);
        }
    }
}

/// [`ProcessModelTransaction`]이 모델마다 수행하는 작업
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelOperation {
    Save,
    Insert,
    Update,
    Delete,
}

/// 모델 목록을 한 저장소 트랜잭션에서 저장/삽입/수정/삭제
///
/// 결과는 처리된 모델 목록입니다 (삽입된 모델은 autoincrement id가 채워짐).
pub struct ProcessModelTransaction<A: InternalAdapter> {
    info: TransactionInfo,
    operation: ModelOperation,
    models: Vec<A::Model>,
    callback: Option<Callback<Vec<A::Model>>>,
}

impl<A: InternalAdapter> ProcessModelTransaction<A> {
    pub fn new(operation: ModelOperation, models: Vec<A::Model>) -> Self {
        Self {
            info: TransactionInfo::default(),
            operation,
            models,
            callback: None,
        }
    }

    pub fn save(models: Vec<A::Model>) -> Self {
        Self::new(ModelOperation::Save, models)
    }

    pub fn insert(models: Vec<A::Model>) -> Self {
        Self::new(ModelOperation::Insert, models)
    }

    pub fn update(models: Vec<A::Model>) -> Self {
        Self::new(ModelOperation::Update, models)
    }

    pub fn delete(models: Vec<A::Model>) -> Self {
        Self::new(ModelOperation::Delete, models)
    }

    info_builders!();

    pub fn on_result(mut self, callback: impl FnOnce(Vec<A::Model>) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl<A: InternalAdapter> Transaction for ProcessModelTransaction<A> {
    type Output = Vec<A::Model>;

    fn info(&self) -> TransactionInfo {
        self.info.clone()
    }

    fn on_execute(&mut self, db: &FlowDatabase) -> FlowResult<Vec<A::Model>> {
        let adapter = db.model_adapter::<A>()?;
        let mut models = std::mem::take(&mut self.models);
        match self.operation {
            ModelOperation::Save => adapter.save_all(db, &mut models)?,
            ModelOperation::Insert => adapter.insert_all(db, &mut models)?,
            ModelOperation::Update => adapter.update_all(db, &mut models)?,
            ModelOperation::Delete => adapter.delete_all(db, &models)?,
        };
        Ok(models)
    }

    fn has_result(&self, _models: &Vec<A::Model>) -> bool {
        self.callback.is_some()
    }

    fn on_post_execute(&mut self, models: Vec<A::Model>) {
        if let Some(callback) = self.callback.take() {
            callback(models);
        }
    }
}

/// 클로저를 워커에서 실행
pub struct FnTransaction<F, R> {
    info: TransactionInfo,
    body: Option<F>,
    callback: Option<Callback<R>>,
}

impl<F, R> FnTransaction<F, R>
where
    F: FnOnce(&FlowDatabase) -> FlowResult<R> + Send + 'static,
    R: Send + 'static,
{
    pub fn new(body: F) -> Self {
        Self {
            info: TransactionInfo::default(),
            body: Some(body),
            callback: None,
        }
    }

    info_builders!();

    pub fn on_result(mut self, callback: impl FnOnce(R) + Send + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }
}

impl<F, R> Transaction for FnTransaction<F, R>
where
    F: FnOnce(&FlowDatabase) -> FlowResult<R> + Send + 'static,
    R: Send + 'static,
{
    type Output = R;

    fn info(&self) -> TransactionInfo {
        self.info.clone()
    }

    fn on_execute(&mut self, db: &FlowDatabase) -> FlowResult<R> {
        let body = self
            .body
            .take()
            .ok_or_else(|| FlowError::misuse("FnTransaction", "already executed"))?;
        body(db)
    }

    fn has_result(&self, _result: &R) -> bool {
        self.callback.is_some()
    }

    fn on_post_execute(&mut self, result: R) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}
