//! Type converters
//!
//! A converter maps a model-space type onto a database-storable [`SqlValue`] and back.
//! Converters are looked up by the model type's `TypeId`. A converter that returns a
//! value whose storage class differs from its declared [`SqlType`] only produces a
//! warning; the returned value is used as-is.

use crate::error::{FlowError, FlowResult};
use crate::value::{SqlType, SqlValue};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Bidirectional mapping between a model type and a database value.
pub trait TypeConverter: Send + Sync + 'static {
    type Model: 'static;

    /// Declared storage class of the converted value
    fn db_type(&self) -> SqlType;

    fn to_db(&self, model: &Self::Model) -> SqlValue;

    fn from_db(&self, value: &SqlValue) -> FlowResult<Self::Model>;
}

/// Object-safe view over a registered converter.
trait ErasedConverter: Send + Sync {
    fn db_type(&self) -> SqlType;
    fn to_db_any(&self, model: &dyn Any) -> Option<SqlValue>;
    fn from_db_any(&self, value: &SqlValue) -> FlowResult<Box<dyn Any>>;
    fn model_name(&self) -> &'static str;
}

impl<C: TypeConverter> ErasedConverter for C {
    fn db_type(&self) -> SqlType {
        TypeConverter::db_type(self)
    }

    fn to_db_any(&self, model: &dyn Any) -> Option<SqlValue> {
        model.downcast_ref::<C::Model>().map(|m| self.to_db(m))
    }

    fn from_db_any(&self, value: &SqlValue) -> FlowResult<Box<dyn Any>> {
        Ok(Box::new(self.from_db(value)?))
    }

    fn model_name(&self) -> &'static str {
        type_name::<C::Model>()
    }
}

/// Registry of converters keyed by model type.
#[derive(Clone)]
pub struct TypeConverterRegistry {
    converters: Arc<RwLock<AHashMap<TypeId, Arc<dyn ErasedConverter>>>>,
}

impl Default for TypeConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TypeConverterRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self {
            converters: Arc::new(RwLock::new(AHashMap::new())),
        }
    }

    /// Registry pre-populated with `bool`, `char`, `SystemTime` and `Duration` converters
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register(BooleanConverter);
        registry.register(CharConverter);
        registry.register(SystemTimeConverter);
        registry.register(DurationConverter);
        registry
    }

    /// Registers (or replaces) the converter for `C::Model`
    pub fn register<C: TypeConverter>(&self, converter: C) {
        self.converters
            .write()
            .insert(TypeId::of::<C::Model>(), Arc::new(converter));
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.converters.read().contains_key(&TypeId::of::<T>())
    }

    /// Model value → database value.
    ///
    /// Returns `None` when no converter is registered for `T`.
    pub fn to_db<T: 'static>(&self, model: &T) -> Option<SqlValue> {
        let converter = self.converters.read().get(&TypeId::of::<T>()).cloned()?;
        let value = converter.to_db_any(model)?;
        if let Some(actual) = value.sql_type()
            && actual != converter.db_type()
        {
            warn!(
                model = converter.model_name(),
                declared = %converter.db_type(),
                actual = %actual,
                "type converter returned a value of a different storage class"
            );
        }
        Some(value)
    }

    /// Model value → database value, `NULL` when no converter is registered.
    ///
    /// 어댑터의 컬럼 값 생성용. 변환기가 없으면 경고 후 NULL을 바인딩하므로 NOT NULL 컬럼은
    /// store의 제약 위반으로 드러납니다.
    pub fn to_db_or_null<T: 'static>(&self, model: &T) -> SqlValue {
        self.to_db(model).unwrap_or_else(|| {
            warn!(model = type_name::<T>(), "no type converter registered, binding NULL");
            SqlValue::Null
        })
    }

    /// Model value → database value, error when no converter is registered
    pub fn require_db<T: 'static>(&self, model: &T) -> FlowResult<SqlValue> {
        self.to_db(model)
            .ok_or_else(|| FlowError::configuration(type_name::<T>(), "no type converter registered"))
    }

    /// Nullable column → optional model value
    pub fn from_db_optional<T: 'static>(&self, value: &SqlValue) -> FlowResult<Option<T>> {
        if value.is_null() {
            return Ok(None);
        }
        self.from_db(value).map(Some)
    }

    /// Database value → model value
    pub fn from_db<T: 'static>(&self, value: &SqlValue) -> FlowResult<T> {
        let converter = self
            .converters
            .read()
            .get(&TypeId::of::<T>())
            .cloned()
            .ok_or_else(|| FlowError::configuration(type_name::<T>(), "no type converter registered"))?;
        let boxed = converter.from_db_any(value)?;
        boxed
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| FlowError::configuration(type_name::<T>(), "type converter produced a foreign type"))
    }
}

/// `bool` ↔ INTEGER 0/1
pub struct BooleanConverter;

impl TypeConverter for BooleanConverter {
    type Model = bool;

    fn db_type(&self) -> SqlType {
        SqlType::Integer
    }

    fn to_db(&self, model: &bool) -> SqlValue {
        SqlValue::from(*model)
    }

    fn from_db(&self, value: &SqlValue) -> FlowResult<bool> {
        crate::value::FromSqlValue::from_sql_value("bool", value)
    }
}

/// `char` ↔ TEXT
pub struct CharConverter;

impl TypeConverter for CharConverter {
    type Model = char;

    fn db_type(&self) -> SqlType {
        SqlType::Text
    }

    fn to_db(&self, model: &char) -> SqlValue {
        SqlValue::Text(model.to_string())
    }

    fn from_db(&self, value: &SqlValue) -> FlowResult<char> {
        value
            .as_str()
            .and_then(|s| s.chars().next())
            .ok_or_else(|| FlowError::Conversion {
                column: "char".to_string(),
                expected: "TEXT".to_string(),
                actual: value.type_name().to_string(),
            })
    }
}

/// `SystemTime` ↔ INTEGER milliseconds since the Unix epoch (sub-millisecond precision is lost)
pub struct SystemTimeConverter;

impl TypeConverter for SystemTimeConverter {
    type Model = SystemTime;

    fn db_type(&self) -> SqlType {
        SqlType::Integer
    }

    fn to_db(&self, model: &SystemTime) -> SqlValue {
        match model.duration_since(UNIX_EPOCH) {
            Ok(d) => SqlValue::Integer(d.as_millis() as i64),
            Err(e) => SqlValue::Integer(-(e.duration().as_millis() as i64)),
        }
    }

    fn from_db(&self, value: &SqlValue) -> FlowResult<SystemTime> {
        let millis: i64 = crate::value::FromSqlValue::from_sql_value("SystemTime", value)?;
        Ok(if millis >= 0 {
            UNIX_EPOCH + Duration::from_millis(millis as u64)
        } else {
            UNIX_EPOCH - Duration::from_millis(millis.unsigned_abs())
        })
    }
}

/// `Duration` ↔ INTEGER milliseconds
pub struct DurationConverter;

impl TypeConverter for DurationConverter {
    type Model = Duration;

    fn db_type(&self) -> SqlType {
        SqlType::Integer
    }

    fn to_db(&self, model: &Duration) -> SqlValue {
        SqlValue::Integer(model.as_millis() as i64)
    }

    fn from_db(&self, value: &SqlValue) -> FlowResult<Duration> {
        let millis: i64 = crate::value::FromSqlValue::from_sql_value("Duration", value)?;
        Ok(Duration::from_millis(millis.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Celsius(f64);

    /// Declares TEXT but returns REAL: only a warning
    struct SloppyConverter;

    impl TypeConverter for SloppyConverter {
        type Model = Celsius;

        fn db_type(&self) -> SqlType {
            SqlType::Text
        }

        fn to_db(&self, model: &Celsius) -> SqlValue {
            SqlValue::Real(model.0)
        }

        fn from_db(&self, value: &SqlValue) -> FlowResult<Celsius> {
            Ok(Celsius(crate::value::FromSqlValue::from_sql_value("c", value)?))
        }
    }

    #[test]
    fn test_default_converters() {
        let registry = TypeConverterRegistry::with_defaults();
        assert_eq!(registry.to_db(&true), Some(SqlValue::Integer(1)));
        assert_eq!(registry.to_db(&'x'), Some(SqlValue::Text("x".into())));
        assert_eq!(
            registry.to_db(&Duration::from_secs(2)),
            Some(SqlValue::Integer(2000))
        );
        assert!(registry.contains::<SystemTime>());
        assert_eq!(registry.to_db(&42u64), None);
    }

    #[test]
    fn test_system_time_millisecond_precision() {
        let registry = TypeConverterRegistry::with_defaults();
        let t = UNIX_EPOCH + Duration::from_micros(1_500_123);
        let db = registry.to_db(&t).unwrap();
        assert_eq!(db, SqlValue::Integer(1500));
        let back: SystemTime = registry.from_db(&db).unwrap();
        assert_eq!(back, UNIX_EPOCH + Duration::from_millis(1500));
    }

    #[test]
    fn test_mismatch_is_not_fatal() {
        let registry = TypeConverterRegistry::empty();
        registry.register(SloppyConverter);
        assert_eq!(registry.to_db(&Celsius(21.5)), Some(SqlValue::Real(21.5)));
        let back: Celsius = registry.from_db(&SqlValue::Real(3.0)).unwrap();
        assert_eq!(back, Celsius(3.0));
    }

    #[test]
    fn test_missing_converter_from_db() {
        let registry = TypeConverterRegistry::empty();
        assert!(registry.from_db::<bool>(&SqlValue::Integer(1)).is_err());
    }

    #[test]
    fn test_missing_converter_binds_null_or_errors() {
        let registry = TypeConverterRegistry::empty();
        assert_eq!(registry.to_db_or_null(&true), SqlValue::Null);
        assert!(matches!(
            registry.require_db(&true),
            Err(FlowError::Configuration { .. })
        ));
        let defaults = TypeConverterRegistry::with_defaults();
        assert_eq!(defaults.require_db(&false).unwrap(), SqlValue::Integer(0));
    }

    #[test]
    fn test_optional_from_db() {
        let registry = TypeConverterRegistry::with_defaults();
        assert_eq!(registry.from_db_optional::<bool>(&SqlValue::Null).unwrap(), None);
        assert_eq!(
            registry.from_db_optional::<Duration>(&SqlValue::Integer(5)).unwrap(),
            Some(Duration::from_millis(5))
        );
    }
}
