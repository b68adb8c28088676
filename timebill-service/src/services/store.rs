//! Storage boundary: a document store over BSON plus the typed predicates
//! the billing engine is allowed to use against it.

use crate::error::BillingError;
use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use std::cmp::Ordering;

/// The storage operations the engine depends on. Implemented by MongoDB and
/// by the in-memory store used in tests; both give every single call
/// document-level atomicity.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, BillingError>;

    async fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, BillingError>;

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), BillingError>;

    /// Apply `update` to the first match. Returns whether a document matched.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<bool, BillingError>;

    /// Apply `update` to every match in one call. Returns the modified count.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<u64, BillingError>;

    /// Atomically increment `field` of document `id`, creating it on first
    /// use, and return the new value.
    async fn find_one_and_increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
    ) -> Result<i64, BillingError>;

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool, BillingError>;

    async fn health_check(&self) -> Result<(), BillingError>;
}

/// Typed query predicate. Field names are top-level document keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Bson),
    In(String, Vec<Bson>),
    /// Matches a missing field as well as an explicit null.
    IsNull(String),
    NotNull(String),
    /// Inclusive bounds. Like MongoDB, only values of the same BSON type
    /// as the bound match.
    Gte(String, Bson),
    Lte(String, Bson),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Bson>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn is_in<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Filter::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(field: &str) -> Self {
        Filter::IsNull(field.to_string())
    }

    pub fn not_null(field: &str) -> Self {
        Filter::NotNull(field.to_string())
    }

    pub fn gte(field: &str, value: impl Into<Bson>) -> Self {
        Filter::Gte(field.to_string(), value.into())
    }

    pub fn lte(field: &str, value: impl Into<Bson>) -> Self {
        Filter::Lte(field.to_string(), value.into())
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// Scope a lookup to one document of one user.
    pub fn owned(user_id: &str, id: &str) -> Self {
        Filter::and(vec![Filter::eq("_id", id), Filter::eq("user_id", user_id)])
    }

    /// Append a predicate, flattening into an existing `And`.
    pub fn with(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// MongoDB query document.
    pub fn to_document(&self) -> Document {
        match self {
            Filter::Eq(field, value) => doc! { field.as_str(): value.clone() },
            Filter::In(field, values) => doc! { field.as_str(): { "$in": values.clone() } },
            Filter::IsNull(field) => doc! { field.as_str(): Bson::Null },
            Filter::NotNull(field) => doc! { field.as_str(): { "$ne": Bson::Null } },
            Filter::Gte(field, bound) => doc! { field.as_str(): { "$gte": bound.clone() } },
            Filter::Lte(field, bound) => doc! { field.as_str(): { "$lte": bound.clone() } },
            Filter::And(filters) if filters.is_empty() => Document::new(),
            Filter::And(filters) => {
                let clauses: Vec<Bson> = filters
                    .iter()
                    .map(|f| Bson::Document(f.to_document()))
                    .collect();
                doc! { "$and": clauses }
            }
        }
    }

    /// Evaluate against a stored document with the same semantics MongoDB
    /// applies to `to_document()`.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::Eq(field, value) => document.get(field) == Some(value),
            Filter::In(field, values) => document
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Filter::IsNull(field) => matches!(document.get(field), None | Some(Bson::Null)),
            Filter::NotNull(field) => !matches!(document.get(field), None | Some(Bson::Null)),
            Filter::Gte(field, bound) => document
                .get(field)
                .and_then(|v| same_type_order(v, bound))
                .is_some_and(Ordering::is_ge),
            Filter::Lte(field, bound) => document
                .get(field)
                .and_then(|v| same_type_order(v, bound))
                .is_some_and(Ordering::is_le),
            Filter::And(filters) => filters.iter().all(|f| f.matches(document)),
        }
    }
}

/// `$set` update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
}

impl Update {
    pub fn set(field: &str, value: impl Into<Bson>) -> Self {
        Update::default().and_set(field, value)
    }

    pub fn and_set(mut self, field: &str, value: impl Into<Bson>) -> Self {
        self.set.insert(field, value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn to_document(&self) -> Document {
        doc! { "$set": self.set.clone() }
    }

    pub fn apply(&self, document: &mut Document) {
        for (key, value) in self.set.iter() {
            document.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<(String, SortOrder)>,
    pub skip: u64,
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn sorted(field: &str, order: SortOrder) -> Self {
        Self {
            sort: Some((field.to_string(), order)),
            ..Default::default()
        }
    }

    pub fn page(mut self, skip: u64, limit: i64) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }

    pub fn sort_document(&self) -> Option<Document> {
        self.sort.as_ref().map(|(field, order)| {
            let direction = match order {
                SortOrder::Ascending => 1,
                SortOrder::Descending => -1,
            };
            doc! { field.as_str(): direction }
        })
    }
}

/// Ordering of the BSON values this crate sorts on. Mixed or unsupported
/// types compare equal so a stable sort keeps insertion order.
pub fn compare_bson(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None | Some(Bson::Null), None | Some(Bson::Null)) => Ordering::Equal,
        (None | Some(Bson::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Bson::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => same_type_order(x, y).unwrap_or(Ordering::Equal),
    }
}

fn same_type_order(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Int32(x), Bson::Int32(y)) => Some(x.cmp(y)),
        (Bson::Int64(x), Bson::Int64(y)) => Some(x.cmp(y)),
        (Bson::Double(x), Bson::Double(y)) => x.partial_cmp(y),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbilled_selection_renders_to_single_query() {
        let filter = Filter::and(vec![
            Filter::is_in("_id", vec!["a", "b"]),
            Filter::eq("user_id", "u1"),
            Filter::is_null("invoice_id"),
        ]);
        assert_eq!(
            filter.to_document(),
            doc! { "$and": [
                { "_id": { "$in": ["a", "b"] } },
                { "user_id": "u1" },
                { "invoice_id": Bson::Null },
            ] }
        );
    }

    #[test]
    fn is_null_matches_missing_and_null_fields() {
        let filter = Filter::is_null("invoice_id");
        assert!(filter.matches(&doc! { "_id": "a" }));
        assert!(filter.matches(&doc! { "_id": "a", "invoice_id": Bson::Null }));
        assert!(!filter.matches(&doc! { "_id": "a", "invoice_id": "inv-1" }));
    }

    #[test]
    fn in_does_not_match_absent_field() {
        let filter = Filter::is_in("project_id", vec!["p1"]);
        assert!(filter.matches(&doc! { "project_id": "p1" }));
        assert!(!filter.matches(&doc! { "project_id": "p2" }));
        assert!(!filter.matches(&doc! {}));
    }

    #[test]
    fn range_bounds_are_inclusive_and_type_strict() {
        let filter = Filter::gte("relevant_date", "2024-06-01")
            .with(Filter::lte("relevant_date", "2024-06-30"));
        assert!(filter.matches(&doc! { "relevant_date": "2024-06-01" }));
        assert!(filter.matches(&doc! { "relevant_date": "2024-06-30" }));
        assert!(!filter.matches(&doc! { "relevant_date": "2024-07-01" }));
        assert!(!filter.matches(&doc! { "relevant_date": 20240615 }));
        assert!(!filter.matches(&doc! {}));
        assert_eq!(
            filter.to_document(),
            doc! { "$and": [
                { "relevant_date": { "$gte": "2024-06-01" } },
                { "relevant_date": { "$lte": "2024-06-30" } },
            ] }
        );
    }

    #[test]
    fn with_flattens_into_existing_and() {
        let filter = Filter::owned("u1", "x").with(Filter::eq("status", "draft"));
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn update_sets_fields_in_place() {
        let mut document = doc! { "_id": "a", "status": "created" };
        Update::set("status", "processed")
            .and_set("invoice_id", "inv-1")
            .apply(&mut document);
        assert_eq!(document.get_str("status").unwrap(), "processed");
        assert_eq!(document.get_str("invoice_id").unwrap(), "inv-1");
    }
}
