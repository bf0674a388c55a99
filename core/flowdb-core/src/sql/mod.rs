//! SQL statement builders
//!
//! 모든 Statement는 [`Query`]를 구현하며 같은 상태에서는 항상 같은 텍스트를 만듭니다.
//!
//! ```rust
//! use flowdb_core::sql::{self, Condition, OrderBy, Query};
//!
//! let query = sql::select_columns(["name"])
//!     .from("users")
//!     .where_(Condition::column("age").greater_than(18))
//!     .order_by(OrderBy::column("name").ascending())
//!     .query();
//! assert_eq!(query, "SELECT `name` FROM `users` WHERE `age`>18 ORDER BY `name` ASC");
//! ```

pub mod clause;
pub mod condition;
pub mod delete;
pub mod from;
pub mod index;
pub mod insert;
pub mod join;
pub mod migration;
pub mod queriable;
pub mod query_builder;
pub mod select;
pub mod trigger;
pub mod update;
pub mod where_clause;

pub use clause::{NameAlias, OrderBy};
pub use condition::{
    BetweenCondition, Collate, ColumnRef, CombinedCondition, Condition, ConditionGroup,
    ExistenceCondition, InCondition, Operand, Operator, Predicate, Separator,
};
pub use delete::Delete;
pub use from::FromClause;
pub use index::{Index, IndexedBy};
pub use insert::Insert;
pub use join::{Join, JoinBuilder, JoinKind};
pub use migration::{
    AlterTableMigration, IndexMigration, Migration, MigrationRunner, ScriptMigration,
    UpdateTableMigration, parse_script,
};
pub use queriable::{Queriable, StatementBase, StatementKind};
pub use query_builder::{Query, QueryBuilder, quote_identifier};
pub use select::Select;
pub use trigger::{CompletedTrigger, Trigger, TriggerEvent, TriggerMethod, TriggerTiming};
pub use update::{Set, Update};
pub use where_clause::Where;

/// `SELECT *`
pub fn select() -> Select {
    Select::new()
}

/// `SELECT a,b,...`
pub fn select_columns<I, C>(columns: I) -> Select
where
    I: IntoIterator<Item = C>,
    C: Into<NameAlias>,
{
    Select::columns(columns)
}

/// `SELECT COUNT(*)`
pub fn select_count() -> Select {
    Select::count_all()
}

/// `UPDATE table`
pub fn update(table: &str) -> FromClause<Update> {
    Update::new().table(table)
}

/// `DELETE`
pub fn delete() -> Delete {
    Delete::new()
}

/// `DELETE FROM table`
pub fn delete_from(table: &str) -> FromClause<Delete> {
    Delete::new().from(table)
}

/// `INSERT INTO table`
pub fn insert_into(table: &str) -> Insert {
    Insert::new(table)
}
