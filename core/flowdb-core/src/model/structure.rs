//! 테이블 메타데이터
//!
//! [`TableStructure`]는 어댑터가 제공하는 테이블 정의입니다. 빌드 시점에 검증되며
//! (primary key 존재, autoincrement 최대 1개 등) `CREATE` DDL을 미리 만들어 둡니다.

use crate::database::ConflictAction;
use crate::error::{FlowError, FlowResult};
use crate::sql::condition::Collate;
use crate::sql::query_builder::{Query, QueryBuilder, quote_identifier};
use crate::value::{SqlType, SqlValue};
use std::collections::HashSet;

/// 컬럼 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    Normal,
    PrimaryKey,
    PrimaryKeyAutoIncrement,
    ForeignKey,
    Unique,
}

/// `ON DELETE` / `ON UPDATE` 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ForeignKeyAction {
    #[default]
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Cascade => "CASCADE",
        }
    }
}

/// 외래 키 참조
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyReference {
    pub table: String,
    pub column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

/// 컬럼 정의
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    sql_type: SqlType,
    primary_key: bool,
    autoincrement: bool,
    not_null: Option<ConflictAction>,
    unique: Option<ConflictAction>,
    default_value: Option<SqlValue>,
    collation: Option<Collate>,
    foreign_key: Option<ForeignKeyReference>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            primary_key: false,
            autoincrement: false,
            not_null: None,
            unique: None,
            default_value: None,
            collation: None,
            foreign_key: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// `INTEGER PRIMARY KEY AUTOINCREMENT`
    pub fn autoincrement(mut self) -> Self {
        self.primary_key = true;
        self.autoincrement = true;
        self
    }

    pub fn not_null(self) -> Self {
        self.not_null_on_conflict(ConflictAction::None)
    }

    pub fn not_null_on_conflict(mut self, action: ConflictAction) -> Self {
        self.not_null = Some(action);
        self
    }

    pub fn unique(self) -> Self {
        self.unique_on_conflict(ConflictAction::None)
    }

    pub fn unique_on_conflict(mut self, action: ConflictAction) -> Self {
        self.unique = Some(action);
        self
    }

    pub fn default_value(mut self, value: impl Into<SqlValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn collate(mut self, collation: Collate) -> Self {
        self.collation = Some(collation);
        self
    }

    /// 외래 키 (`ON DELETE`/`ON UPDATE`는 NO ACTION)
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyReference {
            table: table.into(),
            column: column.into(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        });
        self
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        if let Some(fk) = &mut self.foreign_key {
            fk.on_delete = action;
        }
        self
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        if let Some(fk) = &mut self.foreign_key {
            fk.on_update = action;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn role(&self) -> ColumnRole {
        if self.autoincrement {
            ColumnRole::PrimaryKeyAutoIncrement
        } else if self.primary_key {
            ColumnRole::PrimaryKey
        } else if self.foreign_key.is_some() {
            ColumnRole::ForeignKey
        } else if self.unique.is_some() {
            ColumnRole::Unique
        } else {
            ColumnRole::Normal
        }
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    pub fn is_not_null(&self) -> bool {
        self.not_null.is_some()
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeyReference> {
        self.foreign_key.as_ref()
    }

    fn definition(&self) -> String {
        let mut out = QueryBuilder::new();
        out.append_quoted(&self.name).append_space().append_sql_type(self.sql_type);
        if self.autoincrement {
            out.append(" PRIMARY KEY AUTOINCREMENT");
        }
        if let Some(action) = self.unique {
            out.append(" UNIQUE");
            append_on_conflict(&mut out, action);
        }
        if let Some(action) = self.not_null {
            out.append(" NOT NULL");
            append_on_conflict(&mut out, action);
        }
        if let Some(default) = &self.default_value {
            out.append(" DEFAULT ").append(default.to_sql_literal());
        }
        if let Some(collation) = self.collation {
            out.append(" COLLATE ").append(collation.as_sql());
        }
        out.into_query()
    }
}

fn append_on_conflict(out: &mut QueryBuilder, action: ConflictAction) {
    if let Some(action) = action.as_sql() {
        out.append(" ON CONFLICT ").append(action);
    }
}

/// 테이블 종류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKind {
    Table,
    /// `CREATE VIEW ... AS <query>`
    View { query: String },
    /// 임의 쿼리 결과에 매핑되는 읽기 전용 모델
    QueryModel,
}

/// 검증된 테이블 정의
#[derive(Debug, Clone, PartialEq)]
pub struct TableStructure {
    name: String,
    kind: TableKind,
    columns: Vec<Column>,
    primary_keys: Vec<usize>,
    autoincrement: Option<usize>,
    cache_size: Option<usize>,
    insert_conflict: ConflictAction,
    update_conflict: ConflictAction,
    creation_query: Option<String>,
}

impl TableStructure {
    pub fn table(name: impl Into<String>) -> TableStructureBuilder {
        TableStructureBuilder::new(name.into(), TableKind::Table)
    }

    pub fn view(name: impl Into<String>, query: &impl Query) -> TableStructureBuilder {
        TableStructureBuilder::new(
            name.into(),
            TableKind::View {
                query: query.query(),
            },
        )
    }

    pub fn query_model(name: impl Into<String>) -> TableStructureBuilder {
        TableStructureBuilder::new(name.into(), TableKind::QueryModel)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TableKind {
        &self.kind
    }

    pub fn is_table(&self) -> bool {
        self.kind == TableKind::Table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Primary key 컬럼 인덱스 (선언 순서)
    pub fn primary_key_indices(&self) -> &[usize] {
        &self.primary_keys
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.primary_keys.iter().map(|&i| &self.columns[i])
    }

    pub fn autoincrement_index(&self) -> Option<usize> {
        self.autoincrement
    }

    pub fn autoincrement_column(&self) -> Option<&Column> {
        self.autoincrement.map(|i| &self.columns[i])
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.foreign_key.is_some())
    }

    pub fn cache_size(&self) -> Option<usize> {
        self.cache_size
    }

    pub fn insert_conflict(&self) -> ConflictAction {
        self.insert_conflict
    }

    pub fn update_conflict(&self) -> ConflictAction {
        self.update_conflict
    }

    /// `CREATE TABLE`/`CREATE VIEW` DDL (query model은 `None`)
    pub fn creation_query(&self) -> Option<&str> {
        self.creation_query.as_deref()
    }

    fn render_creation_query(&self) -> Option<String> {
        match &self.kind {
            TableKind::Table => {
                let mut definitions: Vec<String> =
                    self.columns.iter().map(Column::definition).collect();
                if self.autoincrement.is_none() && !self.primary_keys.is_empty() {
                    let keys = self
                        .primary_key_columns()
                        .map(|c| quote_identifier(&c.name))
                        .collect::<Vec<_>>()
                        .join(",");
                    definitions.push(format!("PRIMARY KEY({keys})"));
                }
                for column in self.foreign_keys() {
                    if let Some(fk) = &column.foreign_key {
                        definitions.push(format!(
                            "FOREIGN KEY({}) REFERENCES {}({}) ON UPDATE {} ON DELETE {}",
                            quote_identifier(&column.name),
                            quote_identifier(&fk.table),
                            quote_identifier(&fk.column),
                            fk.on_update.as_sql(),
                            fk.on_delete.as_sql()
                        ));
                    }
                }
                let mut out = QueryBuilder::with("CREATE TABLE IF NOT EXISTS ");
                out.append_quoted(&self.name)
                    .append_parenthesis_enclosed(definitions.join(", "));
                Some(out.into_query())
            }
            TableKind::View { query } => Some(format!(
                "CREATE VIEW IF NOT EXISTS {} AS {}",
                quote_identifier(&self.name),
                query
            )),
            TableKind::QueryModel => None,
        }
    }
}

/// [`TableStructure`] 빌더
#[derive(Debug, Clone)]
pub struct TableStructureBuilder {
    name: String,
    kind: TableKind,
    columns: Vec<Column>,
    cache_size: Option<usize>,
    insert_conflict: ConflictAction,
    update_conflict: ConflictAction,
}

impl TableStructureBuilder {
    fn new(name: String, kind: TableKind) -> Self {
        Self {
            name,
            kind,
            columns: Vec::new(),
            cache_size: None,
            insert_conflict: ConflictAction::None,
            update_conflict: ConflictAction::None,
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns<I: IntoIterator<Item = Column>>(mut self, columns: I) -> Self {
        self.columns.extend(columns);
        self
    }

    /// 이 테이블의 ModelCache 용량
    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = Some(size);
        self
    }

    pub fn insert_conflict(mut self, action: ConflictAction) -> Self {
        self.insert_conflict = action;
        self
    }

    pub fn update_conflict(mut self, action: ConflictAction) -> Self {
        self.update_conflict = action;
        self
    }

    pub fn build(self) -> FlowResult<TableStructure> {
        let err = |message: String| FlowError::configuration(&self.name, message);

        if self.columns.is_empty() {
            return Err(err("table declares no columns".to_string()));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(err(format!("column '{}' is declared twice", column.name)));
            }
        }

        let primary_keys: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        let autoincrement: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.autoincrement)
            .map(|(i, _)| i)
            .collect();

        if self.kind == TableKind::Table {
            if primary_keys.is_empty() {
                return Err(err("table has no primary key".to_string()));
            }
            if autoincrement.len() > 1 {
                return Err(err("table declares more than one autoincrement column".to_string()));
            }
            if let Some(&index) = autoincrement.first() {
                let column = &self.columns[index];
                if primary_keys.len() > 1 {
                    return Err(err(format!(
                        "autoincrement column '{}' cannot be part of a composite primary key",
                        column.name
                    )));
                }
                if column.sql_type != SqlType::Integer {
                    return Err(err(format!(
                        "autoincrement column '{}' must be INTEGER",
                        column.name
                    )));
                }
            }
        }

        let mut structure = TableStructure {
            name: self.name.clone(),
            kind: self.kind.clone(),
            columns: self.columns.clone(),
            primary_keys,
            autoincrement: autoincrement.first().copied(),
            cache_size: self.cache_size,
            insert_conflict: self.insert_conflict,
            update_conflict: self.update_conflict,
            creation_query: None,
        };
        structure.creation_query = structure.render_creation_query();
        Ok(structure)
    }
}
