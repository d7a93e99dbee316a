use async_trait::async_trait;
use serde_json::Value;

use crate::error::DatabaseError;

/// Row filter understood by every store. Rendered as PostgREST query
/// parameters for the remote store and evaluated directly in memory.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    NotIn(String, Vec<Value>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn neq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Neq(field.to_string(), value.into())
    }

    pub fn not_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::NotIn(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(field, _) | Filter::Neq(field, _) | Filter::NotIn(field, _) => field,
        }
    }

    pub fn matches(&self, document: &Value) -> bool {
        let actual = document.get(self.field()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, expected) => actual == expected,
            Filter::Neq(_, expected) => actual != expected,
            Filter::NotIn(_, excluded) => !excluded.contains(actual),
        }
    }

    /// PostgREST query fragment, e.g. `status=not.in.("canceled","no-show")`.
    pub fn to_query(&self) -> String {
        match self {
            Filter::Eq(field, value) => {
                format!("{}=eq.{}", field, urlencoding::encode(&plain_text(value)))
            }
            Filter::Neq(field, value) => {
                format!("{}=neq.{}", field, urlencoding::encode(&plain_text(value)))
            }
            Filter::NotIn(field, values) => {
                let list = values
                    .iter()
                    .map(|v| format!("\"{}\"", plain_text(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}=not.in.({})", field, urlencoding::encode(&list))
            }
        }
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Uniqueness over `fields` among the documents of `collection` that
/// match every filter in `scope`.
#[derive(Debug, Clone)]
pub struct UniqueIndex {
    pub name: String,
    pub collection: String,
    pub fields: Vec<String>,
    pub scope: Vec<Filter>,
}

impl UniqueIndex {
    pub fn new(name: &str, collection: &str, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            collection: collection.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            scope: Vec::new(),
        }
    }

    pub fn scoped(mut self, filter: Filter) -> Self {
        self.scope.push(filter);
        self
    }

    pub fn covers(&self, document: &Value) -> bool {
        self.scope.iter().all(|f| f.matches(document))
    }

    pub fn collides(&self, a: &Value, b: &Value) -> bool {
        self.covers(a)
            && self.covers(b)
            && self.fields.iter().all(|field| match (a.get(field), b.get(field)) {
                (Some(left), Some(right)) => !left.is_null() && left == right,
                _ => false,
            })
    }
}

/// Document collection access used by every service.
///
/// `auth_token` is forwarded to stores that apply row-level security; the
/// in-process store ignores it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        filters: &[Filter],
        auth_token: Option<&str>,
    ) -> Result<Vec<Value>, DatabaseError>;

    /// Inserts a document carrying its own string `id`.
    async fn insert(
        &self,
        collection: &str,
        document: Value,
        auth_token: Option<&str>,
    ) -> Result<Value, DatabaseError>;

    /// Shallow-merges `changes` into the document with `id`.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Value,
        auth_token: Option<&str>,
    ) -> Result<Value, DatabaseError>;

    async fn delete(
        &self,
        collection: &str,
        id: &str,
        auth_token: Option<&str>,
    ) -> Result<(), DatabaseError>;

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
        auth_token: Option<&str>,
    ) -> Result<Option<Value>, DatabaseError> {
        let mut found = self
            .find(collection, &[Filter::eq("id", id)], auth_token)
            .await?;
        Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_render_postgrest_syntax() {
        assert_eq!(Filter::eq("doctor_id", "abc").to_query(), "doctor_id=eq.abc");
        assert_eq!(Filter::eq("accepting_appointments", true).to_query(), "accepting_appointments=eq.true");
        assert_eq!(
            Filter::not_in("status", ["canceled", "no-show"]).to_query(),
            "status=not.in.%28%22canceled%22%2C%22no-show%22%29"
        );
    }

    #[test]
    fn not_in_treats_missing_field_as_outside_the_list() {
        let filter = Filter::not_in("status", ["canceled"]);
        assert!(filter.matches(&json!({ "id": "1" })));
        assert!(filter.matches(&json!({ "status": "scheduled" })));
        assert!(!filter.matches(&json!({ "status": "canceled" })));
    }

    #[test]
    fn scoped_index_ignores_documents_outside_scope() {
        let index = UniqueIndex::new("slot", "appointments", &["doctor_id", "time"])
            .scoped(Filter::not_in("status", ["canceled"]));

        let live = json!({ "doctor_id": "d", "time": "09:00", "status": "scheduled" });
        let other_live = json!({ "doctor_id": "d", "time": "09:00", "status": "upcoming" });
        let canceled = json!({ "doctor_id": "d", "time": "09:00", "status": "canceled" });

        assert!(index.collides(&live, &other_live));
        assert!(!index.collides(&live, &canceled));
    }
}
