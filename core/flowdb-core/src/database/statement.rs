//! DatabaseStatement: 바인딩 가능한 준비된 Statement
//!
//! SQL 텍스트와 바인딩 값을 보관하고, 실행은 소유한 [`DatabaseWrapper`]의
//! statement cache를 통해 이루어집니다.

use crate::database::{Cursor, DatabaseWrapper};
use crate::error::FlowResult;
use crate::value::SqlValue;
use std::fmt;

pub struct DatabaseStatement<'db> {
    db: &'db dyn DatabaseWrapper,
    sql: String,
    bindings: Vec<SqlValue>,
}

impl<'db> DatabaseStatement<'db> {
    pub fn new(db: &'db dyn DatabaseWrapper, sql: impl Into<String>) -> Self {
        Self {
            db,
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bindings(&self) -> &[SqlValue] {
        &self.bindings
    }

    /// 1부터 시작하는 위치에 값 바인딩
    pub fn bind(&mut self, index: usize, value: impl Into<SqlValue>) {
        let slot = index.max(1) - 1;
        if self.bindings.len() <= slot {
            self.bindings.resize(slot + 1, SqlValue::Null);
        }
        self.bindings[slot] = value.into();
    }

    pub fn bind_null(&mut self, index: usize) {
        self.bind(index, SqlValue::Null);
    }

    /// 1번부터 순서대로 바인딩
    pub fn bind_all<I, T>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<SqlValue>,
    {
        self.bindings.clear();
        self.bindings.extend(values.into_iter().map(Into::into));
    }

    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    pub fn execute_insert(&self) -> FlowResult<i64> {
        self.db.execute_insert(&self.sql, &self.bindings)
    }

    pub fn execute_update_delete(&self) -> FlowResult<usize> {
        self.db.execute_update_delete(&self.sql, &self.bindings)
    }

    pub fn simple_query_for_long(&self) -> FlowResult<i64> {
        self.db.query_long(&self.sql, &self.bindings)
    }

    pub fn query(&self) -> FlowResult<Cursor> {
        self.db.raw_query(&self.sql, &self.bindings)
    }
}

impl fmt::Debug for DatabaseStatement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseStatement")
            .field("sql", &self.sql)
            .field("bindings", &self.bindings)
            .finish()
    }
}
