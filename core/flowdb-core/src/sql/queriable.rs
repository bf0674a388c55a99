//! Statement 실행 진입점
//!
//! [`Queriable`]은 완성된 Statement를 [`FlowDatabase`]에 대해 실행합니다.
//! SELECT base는 행을 돌려주고, INSERT/UPDATE/DELETE base는 영향받은 행 수를 돌려줍니다.
//! SELECT가 아닌 Statement에서 `query_list`/`query_single`을 호출하면
//! [`FlowError::StatementMisuse`]입니다.

use crate::database::{Cursor, FlowDatabase, NOT_INSERTED};
use crate::error::{FlowError, FlowResult};
use crate::model::CursorLoader;
use crate::notify::Action;
use crate::sql::query_builder::Query;
use tracing::debug;

/// Statement 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// CREATE TRIGGER / CREATE INDEX 등
    Schema,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Schema => "SCHEMA",
        }
    }

    fn action(&self) -> Option<Action> {
        match self {
            StatementKind::Insert => Some(Action::Insert),
            StatementKind::Update => Some(Action::Update),
            StatementKind::Delete => Some(Action::Delete),
            StatementKind::Select | StatementKind::Schema => None,
        }
    }
}

/// FROM 앞에 오는 base statement (Select/Update/Delete)
pub trait StatementBase: Query {
    fn kind(&self) -> StatementKind;

    /// `SELECT COUNT(...)`처럼 결과 자체가 행 수인 경우
    fn counts_rows(&self) -> bool {
        false
    }
}

/// 실행 가능한 Statement
pub trait Queriable: Query {
    fn statement_kind(&self) -> StatementKind;

    /// 변경 알림에 사용되는 대상 테이블
    fn target_table(&self) -> Option<&str> {
        None
    }

    fn counts_rows(&self) -> bool {
        false
    }

    /// 실행 전 구성 검증
    fn validate(&self) -> FlowResult<()> {
        Ok(())
    }

    /// `query_single`에서 사용하는 쿼리 (SELECT는 LIMIT 1)
    fn single_query(&self) -> String {
        self.query()
    }

    fn describe(&self) -> String {
        format!("{} statement", self.statement_kind().as_str())
    }

    /// 결과 행을 Cursor로
    fn query_cursor(&self, db: &FlowDatabase) -> FlowResult<Cursor> {
        self.validate()?;
        let sql = self.query();
        debug!(target: "flowdb_core::sql", %sql, "query");
        db.wrapper().raw_query(&sql, &[])
    }

    /// Statement 실행. 영향받은 행이 있으면 대상 테이블 변경 알림을 발행합니다.
    fn execute(&self, db: &FlowDatabase) -> FlowResult<usize> {
        self.validate()?;
        let sql = self.query();
        debug!(target: "flowdb_core::sql", %sql, "execute");
        let kind = self.statement_kind();
        match kind {
            StatementKind::Select => {
                db.wrapper().raw_query(&sql, &[])?;
                Ok(0)
            }
            StatementKind::Schema => {
                db.wrapper().exec_sql(&sql)?;
                Ok(0)
            }
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete => {
                let affected = db.wrapper().execute_update_delete(&sql, &[])?;
                if affected > 0
                    && let (Some(table), Some(action)) = (self.target_table(), kind.action())
                {
                    db.notify_change(table, action);
                }
                Ok(affected)
            }
        }
    }

    /// INSERT 실행 후 row id. 삽입된 행이 있을 때만 변경 알림을 발행합니다.
    fn execute_insert(&self, db: &FlowDatabase) -> FlowResult<i64> {
        if self.statement_kind() != StatementKind::Insert {
            return Err(FlowError::misuse(self.describe(), "execute_insert requires an INSERT"));
        }
        self.validate()?;
        let sql = self.query();
        debug!(target: "flowdb_core::sql", %sql, "execute insert");
        let row_id = db.wrapper().execute_insert(&sql, &[])?;
        if row_id != NOT_INSERTED
            && let Some(table) = self.target_table()
        {
            db.notify_change(table, Action::Insert);
        }
        Ok(row_id)
    }

    /// SELECT는 결과 행 수 (COUNT 쿼리는 그 결과), 그 외는 영향받은 행 수
    fn count(&self, db: &FlowDatabase) -> FlowResult<i64> {
        match self.statement_kind() {
            StatementKind::Select => {
                self.validate()?;
                let sql = if self.counts_rows() {
                    self.query()
                } else {
                    format!("SELECT COUNT(*) FROM ({})", self.query())
                };
                debug!(target: "flowdb_core::sql", %sql, "count");
                db.wrapper().query_long(&sql, &[])
            }
            _ => Ok(self.execute(db)? as i64),
        }
    }

    fn has_data(&self, db: &FlowDatabase) -> FlowResult<bool> {
        Ok(self.count(db)? > 0)
    }

    /// 모든 결과 행을 모델로 로드
    fn query_list<L>(&self, db: &FlowDatabase, loader: &L) -> FlowResult<Vec<L::Model>>
    where
        Self: Sized,
        L: CursorLoader + ?Sized,
    {
        self.require_select("query_list")?;
        let mut cursor = self.query_cursor(db)?;
        loader.load_list(db, &mut cursor)
    }

    /// 첫 결과 행을 모델로 로드 (SELECT는 LIMIT 1 적용)
    fn query_single<L>(&self, db: &FlowDatabase, loader: &L) -> FlowResult<Option<L::Model>>
    where
        Self: Sized,
        L: CursorLoader + ?Sized,
    {
        self.require_select("query_single")?;
        self.validate()?;
        let sql = self.single_query();
        debug!(target: "flowdb_core::sql", %sql, "query single");
        let mut cursor = db.wrapper().raw_query(&sql, &[])?;
        loader.load_single(db, &mut cursor)
    }

    #[doc(hidden)]
    fn require_select(&self, operation: &str) -> FlowResult<()> {
        if self.statement_kind() == StatementKind::Select {
            Ok(())
        } else {
            Err(FlowError::misuse(
                self.describe(),
                format!("{operation} requires a SELECT base"),
            ))
        }
    }
}
