use serde::{Deserialize, Serialize};
use std::fmt;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(SubjectId);

// --- Cache keys ---

/// Structured query-cache key, e.g. `["listings", "type=apartment", "page=2"]`.
///
/// Prefix matching is segment-wise, so `["listing"]` does not match
/// `["listings", ..]`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn root(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

// --- Cached values ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Record {
    pub id: SubjectId,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Record {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: SubjectId::new(id),
            data,
        }
    }
}

/// One fetched page of a list query, with the server-side total if known.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Collection {
    pub items: Vec<Record>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl Collection {
    pub fn new(items: Vec<Record>, total: Option<u64>) -> Self {
        Self { items, total }
    }

    pub fn contains(&self, id: &SubjectId) -> bool {
        self.items.iter().any(|r| &r.id == id)
    }

    /// Drops every item with `id`, decrementing `total` once per dropped item.
    pub fn remove(&mut self, id: &SubjectId) -> usize {
        let removed = self.drop_items(id);
        self.decrement_total(removed);
        removed
    }

    fn drop_items(&mut self, id: &SubjectId) -> usize {
        let before = self.items.len();
        self.items.retain(|r| &r.id != id);
        before - self.items.len()
    }

    fn decrement_total(&mut self, by: usize) {
        if let Some(total) = self.total.as_mut() {
            *total = total.saturating_sub(by as u64);
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum CacheValue {
    Collection(Collection),
    /// Infinite-scroll query: every loaded page, in order.
    Pages(Vec<Collection>),
    Entity(Record),
}

impl CacheValue {
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::Collection(_) | Self::Pages(_))
    }

    pub fn contains(&self, id: &SubjectId) -> bool {
        match self {
            Self::Collection(c) => c.contains(id),
            Self::Pages(pages) => pages.iter().any(|p| p.contains(id)),
            Self::Entity(record) => &record.id == id,
        }
    }

    /// Removes `id` from list-shaped values. Entities are left untouched.
    pub fn remove_subject(&mut self, id: &SubjectId) -> usize {
        match self {
            Self::Collection(c) => c.remove(id),
            Self::Pages(pages) => {
                // every page carries the same query-wide total
                let removed: usize = pages.iter_mut().map(|p| p.drop_items(id)).sum();
                for page in pages.iter_mut() {
                    page.decrement_total(removed);
                }
                removed
            }
            Self::Entity(_) => 0,
        }
    }

    pub fn item_count(&self) -> usize {
        match self {
            Self::Collection(c) => c.items.len(),
            Self::Pages(pages) => pages.iter().map(|p| p.items.len()).sum(),
            Self::Entity(_) => 1,
        }
    }

    pub fn total(&self) -> Option<u64> {
        match self {
            Self::Collection(c) => c.total,
            Self::Pages(pages) => pages.first().and_then(|p| p.total),
            Self::Entity(_) => None,
        }
    }
}
