//! # FlowDB: Typed ORM Runtime over Embedded SQLite
//!
//! FlowDB는 타입이 있는 모델 객체를 임베디드 SQL 저장소(SQLite)에 매핑하는 런타임입니다.
//! 모델마다 생성(또는 수동 작성)된 어댑터가 테이블 구조와 바인딩을 제공하고,
//! 런타임은 SQL 생성, 저장 오케스트레이션, 캐시, 변경 알림, 백그라운드 실행을 담당합니다.
//!
//! ## 주요 특징
//!
//! - **Fluent SQL builder**: SELECT / INSERT / UPDATE / DELETE / TRIGGER / INDEX
//! - **Model adapter**: 리플렉션 없이 어댑터 트레이트로 바인딩 및 로딩
//! - **Save 오케스트레이션**: 존재 확인 후 UPDATE 또는 INSERT, autoincrement id 반영
//! - **Model cache**: LRU / HashMap, 복합 primary key 지원
//! - **Transaction queue**: 우선순위 기반 단일 워커, batch save 큐
//! - **변경 알림**: 테이블 단위, 저장소 트랜잭션 안에서는 커밋 시 한 번에 전달
//!
//! ## 빠른 시작
//!
//! ```rust
//! use flowdb_core::sql::{self, Condition, Queriable};
//! use flowdb_core::{FlowConfig, FlowDatabase, SqlValue};
//!
//! # fn main() -> flowdb_core::FlowResult<()> {
//! let db = FlowDatabase::open_in_memory(FlowConfig::new("app"))?;
//! db.wrapper()
//!     .exec_sql("CREATE TABLE users(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER)")?;
//!
//! sql::insert_into("users")
//!     .columns(["name", "age"])?
//!     .values([SqlValue::from("Alice"), SqlValue::from(30i64)])?
//!     .execute_insert(&db)?;
//!
//! let adults = sql::select()
//!     .from("users")
//!     .where_(Condition::column("age").greater_than(18))
//!     .count(&db)?;
//! assert_eq!(adults, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## 모듈 구조
//!
//! - [`sql`]: Statement builder와 실행 ([`Queriable`](sql::Queriable)), 마이그레이션
//! - [`database`]: 저장소 계약 ([`DatabaseWrapper`]), SQLite 구현, [`FlowDatabase`]
//! - [`model`]: 테이블 구조, 어댑터 트레이트, 모델 캐시
//! - [`sql_utils`]: save / insert / update / delete 오케스트레이션
//! - [`notify`]: 테이블 변경 알림
//! - [`transaction`]: 우선순위 큐, batch save, 기본 트랜잭션
//! - [`converter`]: 사용자 타입 ↔ 저장 타입 변환

pub mod config;
pub mod converter;
pub mod database;
pub mod error;
pub mod model;
pub mod notify;
pub mod sql;
pub mod sql_utils;
pub mod transaction;
pub mod value;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use config::{BatchSaveConfig, FlowConfig};
pub use converter::{TypeConverter, TypeConverterRegistry};
pub use database::{Cursor, DatabaseWrapper, FlowDatabase, SqliteDatabase};
pub use error::{FlowError, FlowResult};
pub use model::{InternalAdapter, Model, ModelAdapter, MutableModel, RetrievalAdapter};
pub use notify::{Action, TableChange};
pub use sql_utils::{SaveMode, SaveOutcome};
pub use transaction::{Priority, Transaction, TransactionManager};
pub use value::{SqlType, SqlValue};
