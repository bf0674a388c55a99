//! INSERT

use crate::database::{ConflictAction, ContentValues};
use crate::error::{FlowError, FlowResult};
use crate::sql::condition::Operand;
use crate::sql::queriable::{Queriable, StatementKind};
use crate::sql::query_builder::{Query, QueryBuilder};

/// `INSERT [OR action] INTO table[(columns)] VALUES (...) | SELECT ...`
///
/// 컬럼 수와 값 수가 다르면 빌드 시점에 [`FlowError::Configuration`]을 반환합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    conflict: ConflictAction,
    columns: Vec<String>,
    rows: Vec<Vec<Operand>>,
    select: Option<String>,
}

impl Insert {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            conflict: ConflictAction::None,
            columns: Vec::new(),
            rows: Vec::new(),
            select: None,
        }
    }

    pub fn or_(mut self, action: ConflictAction) -> Self {
        self.conflict = action;
        self
    }

    pub fn or_replace(self) -> Self {
        self.or_(ConflictAction::Replace)
    }

    pub fn or_rollback(self) -> Self {
        self.or_(ConflictAction::Rollback)
    }

    pub fn or_abort(self) -> Self {
        self.or_(ConflictAction::Abort)
    }

    pub fn or_fail(self) -> Self {
        self.or_(ConflictAction::Fail)
    }

    pub fn or_ignore(self) -> Self {
        self.or_(ConflictAction::Ignore)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns<I, S>(mut self, columns: I) -> FlowResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if let Some(row) = self.rows.iter().find(|row| row.len() != columns.len()) {
            return Err(self.count_mismatch(columns.len(), row.len()));
        }
        self.columns = columns;
        Ok(self)
    }

    /// 값 한 행 추가. 여러 번 호출하면 다중 행 INSERT가 됩니다.
    pub fn values<I, T>(mut self, values: I) -> FlowResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        let row: Vec<Operand> = values.into_iter().map(Into::into).collect();
        if row.is_empty() {
            return Err(FlowError::configuration(
                &self.table,
                "INSERT requires at least one value",
            ));
        }
        if !self.columns.is_empty() && self.columns.len() != row.len() {
            return Err(self.count_mismatch(self.columns.len(), row.len()));
        }
        if let Some(first) = self.rows.first()
            && first.len() != row.len()
        {
            return Err(FlowError::configuration(
                &self.table,
                format!("every VALUES row needs {} values, got {}", first.len(), row.len()),
            ));
        }
        self.rows.push(row);
        Ok(self)
    }

    /// `(column, value)` 쌍으로 컬럼과 값을 함께 지정
    pub fn column_values<I, S, T>(self, pairs: I) -> FlowResult<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<Operand>,
    {
        let (columns, values): (Vec<String>, Vec<Operand>) = pairs
            .into_iter()
            .map(|(column, value)| (column.into(), value.into()))
            .unzip();
        self.columns(columns)?.values(values)
    }

    pub fn content_values(self, values: &ContentValues) -> FlowResult<Self> {
        self.column_values(values.iter().map(|(column, value)| (column, value.clone())))
    }

    /// `INSERT INTO t SELECT ...`
    pub fn select(mut self, query: &impl Query) -> Self {
        self.select = Some(query.query());
        self
    }

    fn count_mismatch(&self, columns: usize, values: usize) -> FlowError {
        FlowError::configuration(
            &self.table,
            format!("INSERT names {columns} columns but supplies {values} values"),
        )
    }
}

impl Query for Insert {
    fn query(&self) -> String {
        let mut out = QueryBuilder::with("INSERT ");
        if let Some(action) = self.conflict.as_sql() {
            out.append("OR ").append(action).append_space();
        }
        out.append("INTO ").append_quoted(&self.table);
        if !self.columns.is_empty() {
            let mut columns = QueryBuilder::new();
            columns.append_quoted_array(&self.columns);
            out.append_parenthesis_enclosed(columns);
        }
        if let Some(select) = &self.select {
            out.append_space().append(select);
        } else if !self.rows.is_empty() {
            out.append(" VALUES ");
            let rows = self.rows.iter().map(|row| {
                format!(
                    "({})",
                    row.iter().map(Operand::render).collect::<Vec<_>>().join(",")
                )
            });
            out.append_array(rows);
        }
        out.into_query()
    }
}

impl Queriable for Insert {
    fn statement_kind(&self) -> StatementKind {
        StatementKind::Insert
    }

    fn target_table(&self) -> Option<&str> {
        Some(&self.table)
    }

    fn validate(&self) -> FlowResult<()> {
        if self.rows.is_empty() && self.select.is_none() {
            return Err(FlowError::configuration(
                &self.table,
                "INSERT requires at least one value or a SELECT",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::condition::Condition;
    use crate::sql::{insert_into, select};

    #[test]
    fn test_insert_with_columns() {
        let insert = insert_into("users")
            .columns(["id", "name"])
            .unwrap()
            .values([Operand::from(1), Operand::from("Ann")])
            .unwrap();
        assert_eq!(insert.query(), "INSERT INTO `users`(`id`,`name`) VALUES (1,'Ann')");
    }

    #[test]
    fn test_insert_or_replace_multi_row() {
        let insert = insert_into("t")
            .or_replace()
            .values([1, 2])
            .unwrap()
            .values([3, 4])
            .unwrap();
        assert_eq!(insert.query(), "INSERT OR REPLACE INTO `t` VALUES (1,2),(3,4)");
    }

    #[test]
    fn test_column_value_count_mismatch_is_error() {
        let err = insert_into("t")
            .columns(["a", "b"])
            .unwrap()
            .values([1])
            .unwrap_err();
        assert!(matches!(err, FlowError::Configuration { .. }));

        let err = insert_into("t").values([1, 2]).unwrap().columns(["a"]).unwrap_err();
        assert!(err.to_string().contains("1 columns but supplies 2 values"));
    }

    #[test]
    fn test_empty_values_is_error() {
        assert!(insert_into("t").values(Vec::<Operand>::new()).is_err());
        assert!(insert_into("t").validate().is_err());
    }

    #[test]
    fn test_insert_params() {
        let insert = insert_into("t")
            .columns(["a", "b"])
            .unwrap()
            .values([Operand::param(), Operand::param()])
            .unwrap();
        assert_eq!(insert.query(), "INSERT INTO `t`(`a`,`b`) VALUES (?,?)");
    }

    #[test]
    fn test_insert_select() {
        let sub = select().from("old").where_(Condition::column("a").is(1));
        let insert = insert_into("new").select(&sub);
        assert_eq!(insert.query(), "INSERT INTO `new` SELECT * FROM `old` WHERE `a`=1");
        assert!(insert.validate().is_ok());
    }

    #[test]
    fn test_column_values_pairs() {
        let insert = insert_into("t")
            .column_values([("a", Operand::from(1)), ("b", Operand::from("x"))])
            .unwrap();
        assert_eq!(insert.query(), "INSERT INTO `t`(`a`,`b`) VALUES (1,'x')");
    }
}
