//! 저장소 계층
//!
//! 런타임은 [`DatabaseWrapper`] 계약으로만 저장소에 접근하고, [`SqliteDatabase`]가
//! 기본 구현입니다. [`FlowDatabase`]는 연결과 어댑터 등록부를 묶는 컨텍스트입니다.

pub mod content_values;
pub mod cursor;
pub mod flow_database;
pub mod sqlite;
pub mod statement;
pub mod wrapper;

pub use content_values::ContentValues;
pub use cursor::Cursor;
pub use flow_database::FlowDatabase;
pub use sqlite::SqliteDatabase;
pub use statement::DatabaseStatement;
pub use wrapper::{ConflictAction, DatabaseWrapper, NOT_INSERTED, execute_transaction};
