// 모델 저장/로드/삭제 통합 테스트

mod common;

use common::*;
use flowdb_core::model::{CursorLoader, ModelAdapter};
use flowdb_core::sql::{self, Condition, Queriable};
use flowdb_core::{FlowError, FlowResult, Model, MutableModel, SaveMode, SaveOutcome, SqlValue};

fn count(statements: &[String], prefix: &str) -> usize {
    statements.iter().filter(|sql| sql.starts_with(prefix)).count()
}

#[test]
fn test_save_new_model_inserts_once() -> FlowResult<()> {
    let (db, wrapper) = recording_database();
    wrapper.clear();

    let mut user = User::new("Alice", 31);
    let outcome = user.save(&db)?;

    assert!(outcome.is_insert());
    assert_eq!(user.id, 1, "autoincrement id is written back");
    let statements = wrapper.statements();
    assert_eq!(count(&statements, "INSERT"), 1);
    assert_eq!(count(&statements, "UPDATE"), 0);
    Ok(())
}

#[test]
fn test_save_existing_model_updates_once() -> FlowResult<()> {
    let (db, wrapper) = recording_database();
    let mut user = User::new("Alice", 31);
    user.save(&db)?;
    wrapper.clear();

    user.age = 32;
    let outcome = user.save(&db)?;

    assert_eq!(outcome, SaveOutcome::Updated { rows: 1 });
    let statements = wrapper.statements();
    assert_eq!(count(&statements, "SELECT 1"), 1, "one existence check");
    assert_eq!(count(&statements, "UPDATE"), 1);
    assert_eq!(count(&statements, "INSERT"), 0);
    Ok(())
}

#[test]
fn test_save_with_assigned_key_but_no_row_inserts() -> FlowResult<()> {
    let (db, wrapper) = recording_database();
    wrapper.clear();

    let mut membership = Membership {
        user_id: 7,
        group_id: 3,
        role: "owner".to_string(),
    };
    assert!(membership.save(&db)?.is_insert());
    let statements = wrapper.statements();
    assert_eq!(count(&statements, "SELECT 1"), 1);
    assert_eq!(count(&statements, "INSERT"), 1);
    assert_eq!(count(&statements, "UPDATE"), 0);

    membership.role = "member".to_string();
    assert_eq!(membership.save(&db)?, SaveOutcome::Updated { rows: 1 });
    Ok(())
}

#[test]
fn test_round_trip() -> FlowResult<()> {
    let db = database();
    let mut user = User {
        id: 0,
        name: Some("O'Brien".to_string()),
        email: Some("ob@example.com".to_string()),
        age: 44,
    };
    user.insert(&db)?;

    let mut fresh = User {
        id: user.id,
        ..User::default()
    };
    assert!(fresh.load(&db)?);
    assert_eq!(fresh, user);
    Ok(())
}

#[test]
fn test_update_mode_reports_zero_rows_without_insert() -> FlowResult<()> {
    let (db, wrapper) = recording_database();
    wrapper.clear();

    let mut ghost = User {
        id: 99,
        ..User::new("Ghost", 1)
    };
    let outcome = ghost.save_with_mode(&db, SaveMode::Update)?;

    assert_eq!(outcome, SaveOutcome::Updated { rows: 0 });
    assert_eq!(count(&wrapper.statements(), "INSERT"), 0);
    assert!(!ghost.exists(&db)?);
    Ok(())
}

#[test]
fn test_insert_mode_skips_existence_check() -> FlowResult<()> {
    let (db, wrapper) = recording_database();
    wrapper.clear();

    let mut user = User::new("Bob", 20);
    let outcome = user.save_with_mode(&db, SaveMode::Insert)?;

    assert!(matches!(outcome, SaveOutcome::Inserted { row_id } if row_id == user.id));
    assert_eq!(count(&wrapper.statements(), "SELECT 1"), 0);
    Ok(())
}

#[test]
fn test_unassigned_autoincrement_does_not_exist() -> FlowResult<()> {
    let db = database();
    let user = User::new("Nobody", 0);
    assert!(!user.exists(&db)?);
    Ok(())
}

#[test]
fn test_not_null_violation_passes_through() {
    let db = database();
    let mut user = User {
        name: None,
        ..User::default()
    };
    let err = user.save(&db).unwrap_err();
    assert!(err.is_constraint_violation(), "unexpected error: {err}");
    assert!(matches!(err, FlowError::Store { .. }));
}

#[test]
fn test_delete_removes_row() -> FlowResult<()> {
    let db = database();
    let mut user = User::new("Carol", 28);
    user.save(&db)?;
    assert!(user.exists(&db)?);

    assert!(user.delete(&db)?);
    assert!(!user.exists(&db)?);
    assert!(!user.delete(&db)?, "second delete affects nothing");
    Ok(())
}

#[test]
fn test_null_primary_key_is_rejected() {
    let db = database();
    let adapter = db.model_adapter::<MembershipAdapter>().unwrap();
    let err = adapter.load_by_primary_key(&db, &[SqlValue::Null, SqlValue::Integer(1)]);
    assert!(matches!(
        err,
        Err(FlowError::PrimaryKeyCannotBeNull { ref column, .. }) if column == "user_id"
    ));
}

#[test]
fn test_cache_invalidation_after_delete() -> FlowResult<()> {
    let db = database();
    let adapter = db.model_adapter::<UserAdapter>()?;
    let mut user = User::new("Dave", 50);
    user.save(&db)?;

    let key = [SqlValue::Integer(user.id)];
    assert_eq!(adapter.cached(&key)?, Some(user.clone()));

    user.delete(&db)?;
    assert_eq!(adapter.cached(&key)?, None);
    assert_eq!(adapter.load_by_primary_key(&db, &key)?, None);
    Ok(())
}

#[test]
fn test_cache_replaced_on_update_and_used_for_lookup() -> FlowResult<()> {
    let (db, wrapper) = recording_database();
    let adapter = db.model_adapter::<UserAdapter>()?;
    let mut user = User::new("Erin", 19);
    user.save(&db)?;
    user.age = 20;
    user.update(&db)?;

    wrapper.clear();
    let found = adapter.load_by_primary_key(&db, &[SqlValue::Integer(user.id)])?;
    assert_eq!(found.map(|u| u.age), Some(20));
    assert!(wrapper.statements().is_empty(), "served from cache");

    let stats = adapter.cache_stats().expect("caching enabled");
    assert!(stats.hits >= 1);
    assert_eq!(stats.capacity, Some(10));
    Ok(())
}

// 저장소에서 직접 바뀐 행을 load하면 캐시도 새 값으로 교체
#[test]
fn test_load_refreshes_cache() -> FlowResult<()> {
    let db = database();
    let adapter = db.model_adapter::<UserAdapter>()?;
    let mut user = User::new("Iris", 33);
    user.save(&db)?;

    db.wrapper()
        .execute_update_delete("UPDATE users SET age = 34 WHERE id = ?", &[SqlValue::Integer(user.id)])?;
    let key = [SqlValue::Integer(user.id)];
    assert_eq!(adapter.cached(&key)?.map(|u| u.age), Some(33), "stale until reloaded");

    let mut fresh = User {
        id: user.id,
        ..User::default()
    };
    assert!(fresh.load(&db)?);
    assert_eq!(fresh.age, 34);
    assert_eq!(adapter.cached(&key)?, Some(fresh));
    Ok(())
}

#[test]
fn test_caching_helpers_require_caching() {
    let db = database();
    let adapter = db.model_adapter::<PostAdapter>().unwrap();
    assert!(!adapter.is_caching_enabled());
    assert!(matches!(
        adapter.cache(),
        Err(FlowError::CachingNotEnabled { .. })
    ));
}

#[test]
fn test_foreign_key_resolves_through_cache() -> FlowResult<()> {
    let db = database();
    let mut author = User::new("Frank", 40);
    author.save(&db)?;
    let mut post = Post {
        id: 0,
        author: Some(author.clone()),
        title: "Hello".to_string(),
    };
    post.save(&db)?;

    let mut loaded = Post {
        id: post.id,
        ..Post::default()
    };
    assert!(loaded.load(&db)?);
    assert_eq!(loaded.author, Some(author));
    assert_eq!(loaded.title, "Hello");

    let mut orphan = Post {
        id: 0,
        author: None,
        title: "Anonymous".to_string(),
    };
    orphan.insert(&db)?;
    let mut reloaded = Post {
        id: orphan.id,
        ..Post::default()
    };
    reloaded.load(&db)?;
    assert_eq!(reloaded.author, None);
    Ok(())
}

#[test]
fn test_bulk_operations() -> FlowResult<()> {
    let db = database();
    let adapter: std::sync::Arc<ModelAdapter<UserAdapter>> = db.model_adapter()?;
    let mut users: Vec<User> = (0..5).map(|i| User::new(&format!("user{i}"), 20 + i)).collect();

    assert_eq!(adapter.insert_all(&db, &mut users)?, 5);
    assert!(users.iter().all(|user| user.id > 0));

    for user in &mut users {
        user.age += 1;
    }
    assert_eq!(adapter.update_all(&db, &mut users)?, 5);

    let total = sql::select_count().from("users").count(&db)?;
    assert_eq!(total, 5);

    assert_eq!(adapter.delete_all(&db, &users[..2])?, 2);
    let mut cursor = sql::select()
        .from("users")
        .where_(Condition::column("age").greater_than(22))
        .query_cursor(&db)?;
    let remaining = adapter.load_list(&db, &mut cursor)?;
    assert_eq!(remaining.len(), 3);
    Ok(())
}

#[test]
fn test_unregistered_adapter() {
    let db = flowdb_core::FlowDatabase::open_in_memory(config()).unwrap();
    let user = User::new("Gina", 30);
    let err = user.exists(&db).unwrap_err();
    assert!(matches!(err, FlowError::MissingAdapter(ref name) if name.contains("UserAdapter")));
}

#[test]
fn test_content_values_binding_follows_column_order() -> FlowResult<()> {
    use flowdb_core::InternalAdapter;
    use flowdb_core::database::ContentValues;

    let db = database();
    let adapter = UserAdapter::new();
    let user = User {
        id: 4,
        email: Some("h@example.com".to_string()),
        ..User::new("Hal", 61)
    };

    let mut all = ContentValues::new();
    adapter.bind_to_content_values(&mut all, &user, db.converters())?;
    assert_eq!(all.columns().collect::<Vec<_>>(), vec!["id", "name", "email", "age"]);

    let mut insert = ContentValues::new();
    adapter.bind_to_insert_values(&mut insert, &user, db.converters())?;
    assert!(!insert.contains("id"), "autoincrement column is skipped");
    assert_eq!(insert.get("age"), Some(&SqlValue::Integer(61)));
    Ok(())
}

// type converter 컬럼: SystemTime은 밀리초로 저장되고 bool은 0/1
#[test]
fn test_converted_columns_round_trip() -> FlowResult<()> {
    use std::time::{Duration, UNIX_EPOCH};

    let db = database();
    let mut event = Event {
        title: "launch".to_string(),
        created: UNIX_EPOCH + Duration::from_micros(1_700_000_123_456),
        active: true,
        ..Event::default()
    };
    event.save(&db)?;

    let stored = db
        .wrapper()
        .raw_query("SELECT created, active FROM events", &[])?;
    assert_eq!(
        stored.rows(),
        &[vec![SqlValue::Integer(1_700_000_123), SqlValue::Integer(1)]]
    );

    let mut fresh = Event {
        id: event.id,
        ..Event::default()
    };
    assert!(fresh.load(&db)?);
    assert_eq!(fresh.created, UNIX_EPOCH + Duration::from_millis(1_700_000_123));
    assert!(fresh.active);
    assert_eq!(fresh.title, "launch");
    Ok(())
}

#[test]
fn test_condition_on_converted_column() -> FlowResult<()> {
    use std::time::{Duration, UNIX_EPOCH};

    let db = database();
    for (title, secs, active) in [("old", 10, true), ("new", 20, true), ("off", 30, false)] {
        Event {
            title: title.to_string(),
            created: UNIX_EPOCH + Duration::from_secs(secs),
            active,
            ..Event::default()
        }
        .save(&db)?;
    }

    let adapter = db.model_adapter::<EventAdapter>()?;
    let cutoff = UNIX_EPOCH + Duration::from_secs(15);
    let found = sql::select()
        .from("events")
        .where_(Condition::column("created").greater_than_converted(&cutoff, db.converters())?)
        .and(Condition::column("active").is_converted(&true, db.converters())?)
        .query_list(&db, adapter.as_ref())?;
    let titles: Vec<&str> = found.iter().map(|event| event.title.as_str()).collect();
    assert_eq!(titles, vec!["new"]);
    Ok(())
}
