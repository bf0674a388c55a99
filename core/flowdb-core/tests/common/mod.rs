// 통합 테스트 공용 모델과 어댑터

#![allow(dead_code)]

use flowdb_core::converter::TypeConverterRegistry;
use flowdb_core::database::{DatabaseStatement, SqliteDatabase};
use flowdb_core::model::{Column, ForeignKeyAction, TableStructure};
use flowdb_core::sql::{self, Condition};
use flowdb_core::sql_utils::load_foreign_key;
use flowdb_core::{
    Cursor, DatabaseWrapper, FlowConfig, FlowDatabase, FlowResult, InternalAdapter, Model,
    MutableModel, RetrievalAdapter, SqlType, SqlValue,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// ===== users =====

#[derive(Debug, Clone, PartialEq, Default)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub age: i64,
}

impl User {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            id: 0,
            name: Some(name.to_string()),
            email: None,
            age,
        }
    }
}

pub struct UserAdapter {
    structure: TableStructure,
}

impl UserAdapter {
    pub fn new() -> Self {
        Self {
            structure: TableStructure::table("users")
                .column(Column::new("id", SqlType::Integer).autoincrement())
                .column(Column::new("name", SqlType::Text).not_null())
                .column(Column::new("email", SqlType::Text).unique())
                .column(Column::new("age", SqlType::Integer).default_value(0))
                .cache_size(10)
                .build()
                .expect("users structure"),
        }
    }
}

impl RetrievalAdapter for UserAdapter {
    type Model = User;

    fn structure(&self) -> &TableStructure {
        &self.structure
    }

    fn new_instance(&self) -> User {
        User::default()
    }

    fn load_from_cursor(&self, _db: &FlowDatabase, cursor: &Cursor, model: &mut User) -> FlowResult<()> {
        model.id = cursor.get_as("id")?;
        model.name = cursor.get_optional("name")?;
        model.email = cursor.get_optional("email")?;
        model.age = cursor.get_optional("age")?.unwrap_or(0);
        Ok(())
    }

    fn primary_key_values(&self, model: &User, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![SqlValue::Integer(model.id)]
    }

    fn caching_enabled(&self) -> bool {
        true
    }
}

impl InternalAdapter for UserAdapter {
    fn column_values(&self, model: &User, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(model.id),
            model.name.clone().map_or(SqlValue::Null, SqlValue::Text),
            model.email.clone().map_or(SqlValue::Null, SqlValue::Text),
            SqlValue::Integer(model.age),
        ]
    }

    fn update_auto_increment(&self, model: &mut User, id: i64) {
        model.id = id;
    }
}

impl Model for User {
    type Adapter = UserAdapter;
}

impl MutableModel for User {}

// ===== posts (foreign key → users) =====

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Post {
    pub id: i64,
    pub author: Option<User>,
    pub title: String,
}

pub struct PostAdapter {
    structure: TableStructure,
}

impl PostAdapter {
    pub fn new() -> Self {
        Self {
            structure: TableStructure::table("posts")
                .column(Column::new("id", SqlType::Integer).autoincrement())
                .column(
                    Column::new("author_id", SqlType::Integer)
                        .references("users", "id")
                        .on_delete(ForeignKeyAction::SetNull),
                )
                .column(Column::new("title", SqlType::Text).not_null())
                .build()
                .expect("posts structure"),
        }
    }
}

impl RetrievalAdapter for PostAdapter {
    type Model = Post;

    fn structure(&self) -> &TableStructure {
        &self.structure
    }

    fn new_instance(&self) -> Post {
        Post::default()
    }

    fn load_from_cursor(&self, db: &FlowDatabase, cursor: &Cursor, model: &mut Post) -> FlowResult<()> {
        model.id = cursor.get_as("id")?;
        model.author = load_foreign_key::<UserAdapter>(db, cursor.value("author_id")?)?;
        model.title = cursor.get_as("title")?;
        Ok(())
    }

    fn primary_key_values(&self, model: &Post, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![SqlValue::Integer(model.id)]
    }
}

impl InternalAdapter for PostAdapter {
    fn column_values(&self, model: &Post, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(model.id),
            model
                .author
                .as_ref()
                .map_or(SqlValue::Null, |author| SqlValue::Integer(author.id)),
            SqlValue::Text(model.title.clone()),
        ]
    }

    fn update_auto_increment(&self, model: &mut Post, id: i64) {
        model.id = id;
    }
}

impl Model for Post {
    type Adapter = PostAdapter;
}

impl MutableModel for Post {}

// ===== memberships (복합 primary key) =====

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Membership {
    pub user_id: i64,
    pub group_id: i64,
    pub role: String,
}

pub struct MembershipAdapter {
    structure: TableStructure,
}

impl MembershipAdapter {
    pub fn new() -> Self {
        Self {
            structure: TableStructure::table("memberships")
                .column(Column::new("user_id", SqlType::Integer).primary_key())
                .column(Column::new("group_id", SqlType::Integer).primary_key())
                .column(Column::new("role", SqlType::Text))
                .build()
                .expect("memberships structure"),
        }
    }
}

impl RetrievalAdapter for MembershipAdapter {
    type Model = Membership;

    fn structure(&self) -> &TableStructure {
        &self.structure
    }

    fn new_instance(&self) -> Membership {
        Membership::default()
    }

    fn load_from_cursor(
        &self,
        _db: &FlowDatabase,
        cursor: &Cursor,
        model: &mut Membership,
    ) -> FlowResult<()> {
        model.user_id = cursor.get_as("user_id")?;
        model.group_id = cursor.get_as("group_id")?;
        model.role = cursor.get_optional("role")?.unwrap_or_default();
        Ok(())
    }

    fn primary_key_values(
        &self,
        model: &Membership,
        _converters: &TypeConverterRegistry,
    ) -> Vec<SqlValue> {
        vec![SqlValue::Integer(model.user_id), SqlValue::Integer(model.group_id)]
    }

    fn caching_enabled(&self) -> bool {
        true
    }
}

impl InternalAdapter for MembershipAdapter {
    fn column_values(&self, model: &Membership, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(model.user_id),
            SqlValue::Integer(model.group_id),
            SqlValue::Text(model.role.clone()),
        ]
    }
}

impl Model for Membership {
    type Adapter = MembershipAdapter;
}

impl MutableModel for Membership {}

// ===== events (type converter 컬럼) =====

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub created: SystemTime,
    pub active: bool,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            created: UNIX_EPOCH,
            active: false,
        }
    }
}

pub struct EventAdapter {
    structure: TableStructure,
}

impl EventAdapter {
    pub fn new() -> Self {
        Self {
            structure: TableStructure::table("events")
                .column(Column::new("id", SqlType::Integer).autoincrement())
                .column(Column::new("title", SqlType::Text).not_null())
                .column(Column::new("created", SqlType::Integer).not_null())
                .column(Column::new("active", SqlType::Integer))
                .build()
                .expect("events structure"),
        }
    }
}

impl RetrievalAdapter for EventAdapter {
    type Model = Event;

    fn structure(&self) -> &TableStructure {
        &self.structure
    }

    fn new_instance(&self) -> Event {
        Event::default()
    }

    fn load_from_cursor(&self, db: &FlowDatabase, cursor: &Cursor, model: &mut Event) -> FlowResult<()> {
        let converters = db.converters();
        model.id = cursor.get_as("id")?;
        model.title = cursor.get_as("title")?;
        model.created = converters.from_db(cursor.value("created")?)?;
        model.active = converters
            .from_db_optional(cursor.value("active")?)?
            .unwrap_or(false);
        Ok(())
    }

    fn primary_key_values(&self, model: &Event, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![SqlValue::Integer(model.id)]
    }
}

impl InternalAdapter for EventAdapter {
    fn column_values(&self, model: &Event, converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(model.id),
            SqlValue::Text(model.title.clone()),
            converters.to_db_or_null(&model.created),
            converters.to_db_or_null(&model.active),
        ]
    }

    fn update_auto_increment(&self, model: &mut Event, id: i64) {
        model.id = id;
    }
}

impl Model for Event {
    type Adapter = EventAdapter;
}

impl MutableModel for Event {}

// ===== adults (view) =====

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Adult {
    pub id: i64,
    pub name: String,
}

pub struct AdultAdapter {
    structure: TableStructure,
}

impl AdultAdapter {
    pub fn new() -> Self {
        let query = sql::select_columns(["id", "name"])
            .from("users")
            .where_(Condition::column("age").greater_than_or_eq(18));
        Self {
            structure: TableStructure::view("adults", &query)
                .column(Column::new("id", SqlType::Integer).primary_key())
                .column(Column::new("name", SqlType::Text))
                .build()
                .expect("adults structure"),
        }
    }
}

impl RetrievalAdapter for AdultAdapter {
    type Model = Adult;

    fn structure(&self) -> &TableStructure {
        &self.structure
    }

    fn new_instance(&self) -> Adult {
        Adult::default()
    }

    fn load_from_cursor(&self, _db: &FlowDatabase, cursor: &Cursor, model: &mut Adult) -> FlowResult<()> {
        model.id = cursor.get_as("id")?;
        model.name = cursor.get_as("name")?;
        Ok(())
    }

    fn primary_key_values(&self, model: &Adult, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![SqlValue::Integer(model.id)]
    }
}

impl Model for Adult {
    type Adapter = AdultAdapter;
}

// ===== query model (키 없음) =====

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgeBucket {
    pub age: i64,
    pub total: i64,
}

pub struct AgeBucketAdapter {
    structure: TableStructure,
}

impl AgeBucketAdapter {
    pub fn new() -> Self {
        Self {
            structure: TableStructure::query_model("age_buckets")
                .column(Column::new("age", SqlType::Integer))
                .column(Column::new("total", SqlType::Integer))
                .build()
                .expect("age bucket structure"),
        }
    }
}

impl RetrievalAdapter for AgeBucketAdapter {
    type Model = AgeBucket;

    fn structure(&self) -> &TableStructure {
        &self.structure
    }

    fn new_instance(&self) -> AgeBucket {
        AgeBucket::default()
    }

    fn load_from_cursor(
        &self,
        _db: &FlowDatabase,
        cursor: &Cursor,
        model: &mut AgeBucket,
    ) -> FlowResult<()> {
        model.age = cursor.get_as("age")?;
        model.total = cursor.get_as("total")?;
        Ok(())
    }

    fn primary_key_values(
        &self,
        _model: &AgeBucket,
        _converters: &TypeConverterRegistry,
    ) -> Vec<SqlValue> {
        Vec::new()
    }
}

// ===== 실행된 SQL을 기록하는 wrapper =====

pub struct RecordingWrapper {
    inner: SqliteDatabase,
    log: Mutex<Vec<String>>,
}

impl RecordingWrapper {
    pub fn new() -> Self {
        Self {
            inner: SqliteDatabase::open_in_memory().expect("in-memory sqlite"),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }

    fn record(&self, sql: &str) {
        self.log.lock().push(sql.to_string());
    }
}

impl DatabaseWrapper for RecordingWrapper {
    fn exec_sql(&self, sql: &str) -> FlowResult<()> {
        self.record(sql);
        self.inner.exec_sql(sql)
    }

    fn begin_transaction(&self) -> FlowResult<()> {
        self.inner.begin_transaction()
    }

    fn set_transaction_successful(&self) {
        self.inner.set_transaction_successful()
    }

    fn end_transaction(&self) -> FlowResult<()> {
        self.inner.end_transaction()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn compile_statement(&self, sql: &str) -> FlowResult<DatabaseStatement<'_>> {
        Ok(DatabaseStatement::new(self, sql))
    }

    fn raw_query(&self, sql: &str, args: &[SqlValue]) -> FlowResult<Cursor> {
        self.record(sql);
        self.inner.raw_query(sql, args)
    }

    fn execute_update_delete(&self, sql: &str, args: &[SqlValue]) -> FlowResult<usize> {
        self.record(sql);
        self.inner.execute_update_delete(sql, args)
    }

    fn execute_insert(&self, sql: &str, args: &[SqlValue]) -> FlowResult<i64> {
        self.record(sql);
        self.inner.execute_insert(sql, args)
    }

    fn version(&self) -> FlowResult<i32> {
        self.inner.version()
    }

    fn set_version(&self, version: i32) -> FlowResult<()> {
        self.inner.set_version(version)
    }

    fn close(&self) -> FlowResult<()> {
        self.inner.close()
    }
}

// ===== fixtures =====

pub fn config() -> FlowConfig {
    FlowConfig::new("test")
}

/// 모든 테스트 모델이 등록되고 테이블이 생성된 데이터베이스
pub fn database() -> FlowDatabase {
    setup(FlowDatabase::open_in_memory(config()).expect("open database"))
}

pub fn recording_database() -> (FlowDatabase, Arc<RecordingWrapper>) {
    let wrapper = Arc::new(RecordingWrapper::new());
    let db = FlowDatabase::new(wrapper.clone(), config());
    (setup(db), wrapper)
}

pub fn setup(db: FlowDatabase) -> FlowDatabase {
    db.register_table(UserAdapter::new()).expect("register users");
    db.register_table(PostAdapter::new()).expect("register posts");
    db.register_table(MembershipAdapter::new())
        .expect("register memberships");
    db.register_table(EventAdapter::new()).expect("register events");
    db.register_query_model(AdultAdapter::new());
    db.register_query_model(AgeBucketAdapter::new());
    db.create_tables().expect("create tables");
    db
}
