//! Document view (C6): a thin handle over one (id, value) pair bound to a
//! table (§4.4).

use std::sync::Weak;

use docbase_common::{RecordId, Result, Value};

use crate::table::Table;

/// A lightweight view over a single record. Documents are not owners: a
/// deleted handle may keep stale data, and calling `save()` on it
/// re-creates the record.
pub struct Document {
    id: RecordId,
    value: Value,
    table: Weak<Table>,
}

impl Document {
    pub(crate) fn new(id: RecordId, value: Value, table: Weak<Table>) -> Self {
        Self { id, value, table }
    }

    #[must_use]
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.value.set(field, value);
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.value.remove(field)
    }

    /// Re-inserts the (possibly mutated) value into the owning table.
    pub fn save(&self) -> Result<Document> {
        let table = self
            .table
            .upgrade()
            .ok_or_else(|| docbase_common::Error::not_found("owning table no longer exists"))?;
        table.insert(self.id.clone().into(), self.value.clone())
    }

    /// Delegates to the owning table's delete.
    pub fn delete(&self) -> Result<bool> {
        let table = self
            .table
            .upgrade()
            .ok_or_else(|| docbase_common::Error::not_found("owning table no longer exists"))?;
        table.delete(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use super::*;
    use crate::table::{Table, TableIndexCommitter};

    struct NoopCommitter;
    impl TableIndexCommitter for NoopCommitter {
        fn commit_table_index(&self) {}
    }

    fn make_table(dir: &std::path::Path) -> Arc<Table> {
        Table::create("t", dir.to_path_buf(), 8, false, Weak::<NoopCommitter>::new()).unwrap()
    }

    #[test]
    fn test_document_field_roundtrip() {
        let dir = tempdir().unwrap();
        let table = make_table(dir.path());
        let mut doc = table.insert("a".into(), Value::object()).unwrap();
        doc.set("age", Value::Int(5));
        doc.save().unwrap();

        let fetched = table.get(&RecordId::from("a")).unwrap().unwrap();
        assert_eq!(fetched.get("age"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_document_delete_delegates_to_table() {
        let dir = tempdir().unwrap();
        let table = make_table(dir.path());
        let doc = table.insert("a".into(), Value::Int(1)).unwrap();
        assert!(doc.delete().unwrap());
        assert!(table.get(&RecordId::from("a")).unwrap().is_none());
    }
}
