//! ContentValues: 순서가 유지되는 column → value 맵

use crate::value::SqlValue;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentValues {
    entries: Vec<(String, SqlValue)>,
}

impl ContentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// 값 설정. 이미 있는 컬럼이면 위치를 유지한 채 값만 교체합니다.
    pub fn put(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn remove(&mut self, column: &str) -> Option<SqlValue> {
        let index = self.entries.iter().position(|(c, _)| c == column)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.entries.iter().map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_keeps_order_and_replaces() {
        let mut values = ContentValues::new();
        values.put("b", 1);
        values.put("a", "x");
        values.put("b", 2);
        assert_eq!(values.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(values.get("b"), Some(&SqlValue::Integer(2)));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut values = ContentValues::new();
        values.put("a", 1);
        assert_eq!(values.remove("a"), Some(SqlValue::Integer(1)));
        assert!(values.is_empty());
        assert_eq!(values.remove("a"), None);
    }
}
