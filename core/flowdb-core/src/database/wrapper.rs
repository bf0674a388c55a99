//! DatabaseWrapper: 저장소 백엔드 계약
//!
//! 런타임은 이 트레이트를 통해서만 저장소에 접근합니다.
//! 트랜잭션은 중첩 가능하며, 가장 바깥 `end_transaction`에서 모든 단계가
//! `set_transaction_successful`을 호출했을 때만 커밋됩니다.

use crate::database::{ContentValues, Cursor, DatabaseStatement};
use crate::error::{FlowError, FlowResult};
use crate::sql::condition::{Condition, Operand};
use crate::sql::query_builder::{Query, QueryBuilder};
use crate::sql::{Insert, update};
use crate::value::{FromSqlValue, SqlValue};
use serde::{Deserialize, Serialize};
use tracing::error;

/// `execute_insert`가 아무 행도 삽입하지 않았을 때의 반환값 (`INSERT OR IGNORE` 충돌 등)
pub const NOT_INSERTED: i64 = -1;

/// 제약 조건 충돌 시 동작 (`OR <ACTION>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConflictAction {
    #[default]
    None,
    Rollback,
    Abort,
    Fail,
    Ignore,
    Replace,
}

impl ConflictAction {
    /// `None`이면 `OR` 절을 생략
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            ConflictAction::None => None,
            ConflictAction::Rollback => Some("ROLLBACK"),
            ConflictAction::Abort => Some("ABORT"),
            ConflictAction::Fail => Some("FAIL"),
            ConflictAction::Ignore => Some("IGNORE"),
            ConflictAction::Replace => Some("REPLACE"),
        }
    }
}

/// 저장소 연결
pub trait DatabaseWrapper: Send + Sync {
    /// 결과 없는 SQL 실행 (여러 문장 가능)
    fn exec_sql(&self, sql: &str) -> FlowResult<()>;

    fn begin_transaction(&self) -> FlowResult<()>;

    fn set_transaction_successful(&self);

    fn end_transaction(&self) -> FlowResult<()>;

    fn in_transaction(&self) -> bool;

    /// SQL을 준비하고 바인딩 가능한 Statement를 반환
    fn compile_statement(&self, sql: &str) -> FlowResult<DatabaseStatement<'_>>;

    fn raw_query(&self, sql: &str, args: &[SqlValue]) -> FlowResult<Cursor>;

    /// 영향받은 행 수
    fn execute_update_delete(&self, sql: &str, args: &[SqlValue]) -> FlowResult<usize>;

    /// 삽입된 row id. 충돌로 무시되어 아무 행도 삽입되지 않았으면 [`NOT_INSERTED`].
    fn execute_insert(&self, sql: &str, args: &[SqlValue]) -> FlowResult<i64>;

    /// 저장된 스키마 버전
    fn version(&self) -> FlowResult<i32>;

    fn set_version(&self, version: i32) -> FlowResult<()>;

    /// 연결 종료. 이후 호출은 실패합니다.
    fn close(&self) -> FlowResult<()> {
        Ok(())
    }

    /// 첫 행 첫 컬럼을 정수로 (행이 없거나 NULL이면 0)
    fn query_long(&self, sql: &str, args: &[SqlValue]) -> FlowResult<i64> {
        let mut cursor = self.raw_query(sql, args)?;
        if !cursor.move_to_first() {
            return Ok(0);
        }
        match cursor.get(0)? {
            SqlValue::Null => Ok(0),
            value => i64::from_sql_value("0", value),
        }
    }

    fn insert_with_on_conflict(
        &self,
        table: &str,
        values: &ContentValues,
        conflict: ConflictAction,
    ) -> FlowResult<i64> {
        let insert = Insert::new(table).or_(conflict);
        let sql = if values.is_empty() {
            format!("{} DEFAULT VALUES", insert.query())
        } else {
            insert
                .columns(values.columns())?
                .values(values.values().map(|_| Operand::Param))?
                .query()
        };
        let args: Vec<SqlValue> = values.values().cloned().collect();
        self.execute_insert(&sql, &args)
    }

    fn update_with_on_conflict(
        &self,
        table: &str,
        values: &ContentValues,
        where_clause: &str,
        where_args: &[SqlValue],
        conflict: ConflictAction,
    ) -> FlowResult<usize> {
        if values.is_empty() {
            return Err(FlowError::configuration(table, "UPDATE requires at least one value"));
        }
        let set = update(table)
            .or_(conflict)
            .set_all(values.columns().map(|c| Condition::column(c).is(Operand::Param)));
        let mut sql = QueryBuilder::with(set.query());
        if !where_clause.is_empty() {
            sql.append(" WHERE ").append(where_clause);
        }
        let args: Vec<SqlValue> = values
            .values()
            .cloned()
            .chain(where_args.iter().cloned())
            .collect();
        self.execute_update_delete(&sql.into_query(), &args)
    }

    fn delete(&self, table: &str, where_clause: &str, where_args: &[SqlValue]) -> FlowResult<usize> {
        let mut sql = QueryBuilder::with(crate::sql::delete_from(table).query());
        if !where_clause.is_empty() {
            sql.append(" WHERE ").append(where_clause);
        }
        self.execute_update_delete(&sql.into_query(), where_args)
    }
}

/// 트랜잭션 범위 가드. drop 시 항상 `end_transaction`을 호출합니다.
struct TransactionGuard<'a> {
    db: &'a dyn DatabaseWrapper,
    ended: bool,
}

impl TransactionGuard<'_> {
    fn finish(mut self) -> FlowResult<()> {
        self.ended = true;
        self.db.end_transaction()
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.ended
            && let Err(err) = self.db.end_transaction()
        {
            error!(error = %err, "failed to end transaction");
        }
    }
}

/// 저장소 트랜잭션 안에서 `body` 실행
///
/// `body`가 `Ok`를 반환했을 때만 성공으로 표시합니다. 에러나 panic이면 롤백됩니다.
pub fn execute_transaction<R>(
    db: &dyn DatabaseWrapper,
    body: impl FnOnce(&dyn DatabaseWrapper) -> FlowResult<R>,
) -> FlowResult<R> {
    db.begin_transaction()?;
    let guard = TransactionGuard { db, ended: false };
    let result = body(db)?;
    db.set_transaction_successful();
    guard.finish()?;
    Ok(result)
}
