//! 모델 정의부터 트랜잭션 큐까지 한 번에 훑어보는 예제
//!
//! 실행: cargo run --example walkthrough --features logging

use flowdb_core::converter::TypeConverterRegistry;
use flowdb_core::model::{Column, TableStructure};
use flowdb_core::sql::{self, Condition, OrderBy, Queriable, Query};
use flowdb_core::transaction::{FnTransaction, ProcessModelTransaction};
use flowdb_core::{
    Cursor, FlowConfig, FlowDatabase, FlowResult, InternalAdapter, Model, MutableModel, Priority,
    RetrievalAdapter, SqlType, SqlValue, TableChange, TransactionManager,
};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct Note {
    id: i64,
    title: String,
    stars: i64,
}

struct NoteAdapter {
    structure: TableStructure,
}

impl NoteAdapter {
    fn new() -> FlowResult<Self> {
        Ok(Self {
            structure: TableStructure::table("notes")
                .column(Column::new("id", SqlType::Integer).autoincrement())
                .column(Column::new("title", SqlType::Text).not_null())
                .column(Column::new("stars", SqlType::Integer).default_value(0))
                .build()?,
        })
    }
}

impl RetrievalAdapter for NoteAdapter {
    type Model = Note;

    fn structure(&self) -> &TableStructure {
        &self.structure
    }

    fn new_instance(&self) -> Note {
        Note::default()
    }

    fn load_from_cursor(&self, _db: &FlowDatabase, cursor: &Cursor, model: &mut Note) -> FlowResult<()> {
        model.id = cursor.get_as("id")?;
        model.title = cursor.get_as("title")?;
        model.stars = cursor.get_as("stars")?;
        Ok(())
    }

    fn primary_key_values(&self, model: &Note, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![SqlValue::Integer(model.id)]
    }
}

impl InternalAdapter for NoteAdapter {
    fn column_values(&self, model: &Note, _converters: &TypeConverterRegistry) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(model.id),
            SqlValue::Text(model.title.clone()),
            SqlValue::Integer(model.stars),
        ]
    }

    fn update_auto_increment(&self, model: &mut Note, id: i64) {
        model.id = id;
    }
}

impl Model for Note {
    type Adapter = NoteAdapter;
}

impl MutableModel for Note {}

fn main() -> FlowResult<()> {
    flowdb_core::logging::init();
    println!("=== FlowDB walkthrough ===\n");

    // 1. 데이터베이스 + 테이블 등록
    let db = FlowDatabase::open_in_memory(FlowConfig::new("walkthrough").with_batch_threshold(3))?;
    let notes = db.register_table(NoteAdapter::new()?)?;
    db.initialize(1)?;
    db.notifier().register(|change: &TableChange| {
        println!("   [notify] {} {:?}", change.table, change.action);
    });
    println!("1. tables: {:?}\n", db.table_names());

    // 2. save = 있으면 UPDATE, 없으면 INSERT
    println!("2. save / update / delete");
    let mut note = Note {
        title: "first".to_string(),
        stars: 1,
        ..Note::default()
    };
    println!("   {:?}", note.save(&db)?);
    note.stars = 5;
    println!("   {:?}", note.save(&db)?);
    println!("   exists = {}\n", note.exists(&db)?);

    // 3. fluent 쿼리
    println!("3. queries");
    let mut more = vec![
        Note { title: "second".to_string(), stars: 3, ..Note::default() },
        Note { title: "third".to_string(), stars: 4, ..Note::default() },
    ];
    notes.insert_all(&db, &mut more)?;
    let query = sql::select()
        .from("notes")
        .where_(Condition::column("stars").greater_than_or_eq(4))
        .order_by(OrderBy::column("stars").descending());
    println!("   sql = {}", query.query());
    for found in query.query_list(&db, notes.as_ref())? {
        println!("   {} ({})", found.title, found.stars);
    }
    println!("   count = {}\n", sql::select().from("notes").count(&db)?);

    // 4. 트랜잭션 큐
    println!("4. transaction queue");
    let db = Arc::new(db);
    let manager = TransactionManager::new(db.clone())?;
    let (tx, rx) = mpsc::channel();
    manager.add(
        FnTransaction::new(|db: &FlowDatabase| sql::select().from("notes").count(db))
            .with_name("count")
            .with_priority(Priority::High)
            .on_result(move |total| {
                let _ = tx.send(total);
            }),
    )?;
    if let Ok(total) = rx.recv_timeout(Duration::from_secs(5)) {
        println!("   queued count = {total}");
    }

    manager.add(ProcessModelTransaction::<NoteAdapter>::delete(vec![note]))?;
    for i in 0..4 {
        manager.batch_save_queue().add(Note {
            title: format!("batched {i}"),
            ..Note::default()
        });
    }
    manager.quit_all();
    println!("   after quit = {}\n", sql::select().from("notes").count(&db)?);

    println!("=== done ===");
    Ok(())
}
