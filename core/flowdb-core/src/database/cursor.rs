//! Cursor: 쿼리 결과 행
//!
//! 결과는 실행 시점에 모두 읽어 메모리에 보관합니다. 위치는 첫 행 이전(-1)에서 시작합니다.

use crate::error::{FlowError, FlowResult};
use crate::value::{FromSqlValue, SqlValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
    position: isize,
}

impl Cursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows,
            position: -1,
        }
    }

    /// 행 수
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// 컬럼 인덱스 (정확히 일치 우선, 없으면 대소문자 무시)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = crate::sql::query_builder::strip_quotes(name);
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    pub fn position(&self) -> isize {
        self.position
    }

    pub fn move_to_position(&mut self, position: isize) -> bool {
        let len = self.rows.len() as isize;
        if position < -1 {
            self.position = -1;
            false
        } else if position >= len {
            self.position = len;
            false
        } else {
            self.position = position;
            position >= 0
        }
    }

    pub fn move_to_first(&mut self) -> bool {
        self.move_to_position(0)
    }

    pub fn move_to_next(&mut self) -> bool {
        self.move_to_position(self.position + 1)
    }

    /// 현재 행
    pub fn current_row(&self) -> FlowResult<&[SqlValue]> {
        usize::try_from(self.position)
            .ok()
            .and_then(|p| self.rows.get(p))
            .map(Vec::as_slice)
            .ok_or(FlowError::CursorOutOfBounds)
    }

    /// 현재 행의 index번째 값
    pub fn get(&self, index: usize) -> FlowResult<&SqlValue> {
        let row = self.current_row()?;
        row.get(index)
            .ok_or_else(|| FlowError::ColumnNotFound(format!("#{index}")))
    }

    /// 현재 행에서 이름으로 값 조회
    pub fn value(&self, column: &str) -> FlowResult<&SqlValue> {
        let index = self
            .column_index(column)
            .ok_or_else(|| FlowError::ColumnNotFound(column.to_string()))?;
        self.get(index)
    }

    /// 현재 행의 값을 `T`로 읽기
    pub fn get_as<T: FromSqlValue>(&self, column: &str) -> FlowResult<T> {
        T::from_sql_value(column, self.value(column)?)
    }

    pub fn get_at<T: FromSqlValue>(&self, index: usize) -> FlowResult<T> {
        let name = self.columns.get(index).map(String::as_str).unwrap_or("?");
        T::from_sql_value(name, self.get(index)?)
    }

    /// 컬럼이 없거나 NULL이면 true
    pub fn is_null(&self, column: &str) -> bool {
        self.value(column).map(SqlValue::is_null).unwrap_or(true)
    }

    /// 컬럼이 있으면 `Some(T)`, 없거나 NULL이면 `None`
    pub fn get_optional<T: FromSqlValue>(&self, column: &str) -> FlowResult<Option<T>> {
        match self.value(column) {
            Ok(value) if !value.is_null() => Ok(Some(T::from_sql_value(column, value)?)),
            Ok(_) | Err(FlowError::ColumnNotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn rows(&self) -> &[Vec<SqlValue>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<SqlValue>> {
        self.rows
    }
}
