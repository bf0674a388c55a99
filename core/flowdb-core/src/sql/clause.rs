//! 컬럼 별칭과 ORDER BY 항목

use crate::sql::condition::Collate;
use crate::sql::query_builder::{Query, quote_identifier};

/// `` `name` AS `alias` ``
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAlias {
    name: String,
    alias: Option<String>,
    raw: bool,
}

impl NameAlias {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            raw: false,
        }
    }

    /// quote 없이 그대로 출력되는 식 (`COUNT(*)`, `1`)
    pub fn raw(expression: impl Into<String>) -> Self {
        Self {
            name: expression.into(),
            alias: None,
            raw: true,
        }
    }

    pub fn as_(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

impl Query for NameAlias {
    fn query(&self) -> String {
        let mut out = if self.raw {
            self.name.clone()
        } else {
            quote_identifier(&self.name)
        };
        if let Some(alias) = &self.alias {
            out.push_str(" AS ");
            out.push_str(&quote_identifier(alias));
        }
        out
    }
}

impl From<&str> for NameAlias {
    fn from(name: &str) -> Self {
        NameAlias::new(name)
    }
}

impl From<String> for NameAlias {
    fn from(name: String) -> Self {
        NameAlias::new(name)
    }
}

/// ORDER BY 항목
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    column: NameAlias,
    ascending: Option<bool>,
    collation: Option<Collate>,
}

impl OrderBy {
    pub fn column(name: &str) -> Self {
        Self {
            column: NameAlias::new(name),
            ascending: None,
            collation: None,
        }
    }

    pub fn raw(expression: impl Into<String>) -> Self {
        Self {
            column: NameAlias::raw(expression),
            ascending: None,
            collation: None,
        }
    }

    pub fn ascending(mut self) -> Self {
        self.ascending = Some(true);
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = Some(false);
        self
    }

    pub fn collate(mut self, collation: Collate) -> Self {
        self.collation = Some(collation);
        self
    }
}

impl Query for OrderBy {
    fn query(&self) -> String {
        let mut out = self.column.query();
        if let Some(collation) = self.collation {
            out.push_str(" COLLATE ");
            out.push_str(collation.as_sql());
        }
        match self.ascending {
            Some(true) => out.push_str(" ASC"),
            Some(false) => out.push_str(" DESC"),
            None => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_alias() {
        assert_eq!(NameAlias::new("name").query(), "`name`");
        assert_eq!(NameAlias::new("u.name").as_("n").query(), "`u`.`name` AS `n`");
        assert_eq!(NameAlias::raw("COUNT(*)").as_("total").query(), "COUNT(*) AS `total`");
    }

    #[test]
    fn test_order_by() {
        assert_eq!(OrderBy::column("a").query(), "`a`");
        assert_eq!(OrderBy::column("a").ascending().query(), "`a` ASC");
        assert_eq!(
            OrderBy::column("name").collate(Collate::NoCase).descending().query(),
            "`name` COLLATE NOCASE DESC"
        );
    }
}
