//! CREATE INDEX / INDEXED BY

use crate::database::FlowDatabase;
use crate::error::FlowResult;
use crate::sql::condition::{ConditionGroup, Predicate};
use crate::sql::from::FromClause;
use crate::sql::queriable::{Queriable, StatementBase, StatementKind};
use crate::sql::query_builder::{Query, QueryBuilder, quote_identifier};
use crate::sql::where_clause::Where;
use tracing::debug;

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS name ON table(columns)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    table: String,
    columns: Vec<String>,
    unique: bool,
}

impl Index {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: String::new(),
            columns: Vec::new(),
            unique: false,
        }
    }

    pub fn on<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table = table.to_string();
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enable(&self, db: &FlowDatabase) -> FlowResult<()> {
        self.validate()?;
        debug!(index = %self.name, table = %self.table, "create index");
        db.wrapper().exec_sql(&self.query())
    }

    pub fn disable(&self, db: &FlowDatabase) -> FlowResult<()> {
        db.wrapper()
            .exec_sql(&format!("DROP INDEX IF EXISTS {}", quote_identifier(&self.name)))
    }
}

impl Query for Index {
    fn query(&self) -> String {
        let mut out = QueryBuilder::with("CREATE ");
        if self.unique {
            out.append("UNIQUE ");
        }
        out.append("INDEX IF NOT EXISTS ")
            .append_quoted(&self.name)
            .append(" ON ")
            .append_quoted(&self.table);
        let mut columns = QueryBuilder::new();
        columns.append_quoted_array(&self.columns);
        out.append_parenthesis_enclosed(columns);
        out.into_query()
    }
}

impl Queriable for Index {
    fn statement_kind(&self) -> StatementKind {
        StatementKind::Schema
    }

    fn validate(&self) -> FlowResult<()> {
        if self.table.is_empty() || self.columns.is_empty() {
            return Err(crate::error::FlowError::configuration(
                &self.name,
                "index requires a table and at least one column",
            ));
        }
        Ok(())
    }
}

/// `<from> INDEXED BY index`
#[derive(Debug, Clone)]
pub struct IndexedBy<B> {
    from: FromClause<B>,
    index: String,
}

impl<B: StatementBase> IndexedBy<B> {
    pub(crate) fn new(from: FromClause<B>, index: &str) -> Self {
        Self {
            from,
            index: index.to_string(),
        }
    }

    pub fn where_(self, predicate: impl Into<Predicate>) -> Where<Self> {
        Where::new(self).and(predicate)
    }

    pub fn where_group(self, group: ConditionGroup) -> Where<Self> {
        Where::with_conditions(self, group)
    }
}

impl<B: StatementBase> Query for IndexedBy<B> {
    fn query(&self) -> String {
        format!("{} INDEXED BY {}", self.from.query(), quote_identifier(&self.index))
    }
}

impl<B: StatementBase> Queriable for IndexedBy<B> {
    fn statement_kind(&self) -> StatementKind {
        self.from.statement_kind()
    }

    fn target_table(&self) -> Option<&str> {
        self.from.target_table()
    }

    fn counts_rows(&self) -> bool {
        self.from.counts_rows()
    }
}
