//! DELETE base

use crate::sql::from::FromClause;
use crate::sql::queriable::{StatementBase, StatementKind};
use crate::sql::query_builder::Query;

/// `DELETE`: `from(table)`으로 `DELETE FROM table`이 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delete;

impl Delete {
    pub fn new() -> Self {
        Delete
    }

    pub fn from(self, table: &str) -> FromClause<Delete> {
        FromClause::new(self, table)
    }
}

impl Query for Delete {
    fn query(&self) -> String {
        "DELETE".to_string()
    }
}

impl StatementBase for Delete {
    fn kind(&self) -> StatementKind {
        StatementKind::Delete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::condition::Condition;

    #[test]
    fn test_delete_from() {
        assert_eq!(Delete::new().from("users").query(), "DELETE FROM `users`");
        assert_eq!(
            Delete::new()
                .from("users")
                .where_(Condition::column("id").is(3))
                .query(),
            "DELETE FROM `users` WHERE `id`=3"
        );
    }
}
