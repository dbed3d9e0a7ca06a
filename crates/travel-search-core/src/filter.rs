//! Metadata predicates.
//!
//! A [`FilterSpec`] is the caller-facing conjunction of constraints (city,
//! type, date range). [`FilterSpec::to_where`] translates it into a
//! [`Where`] tree, the form every [`Collection`](crate::store::Collection)
//! accepts. An empty spec translates to `None` ("no filter"), never to a
//! predicate that matches nothing.
//!
//! The tree mirrors Chroma's `where` operators so it can be logged in a
//! familiar shape:
//!
//! ```text
//! {"$and": [{"city": {"$in": ["宜蘭縣"]}}, {"date": {"$gte": 1711929600}}]}
//! ```

use serde_json::{json, Value};

use crate::models::Metadata;

/// A metadata field that predicates can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaField {
    FileName,
    Name,
    Type,
    Address,
    Tel,
    City,
    Town,
    Date,
    NewStoreName,
}

impl MetaField {
    /// Key used in the serialized metadata object.
    pub fn key(self) -> &'static str {
        match self {
            MetaField::FileName => "file_name",
            MetaField::Name => "name",
            MetaField::Type => "type",
            MetaField::Address => "address",
            MetaField::Tel => "tel",
            MetaField::City => "city",
            MetaField::Town => "town",
            MetaField::Date => "date",
            MetaField::NewStoreName => "new_store_name",
        }
    }

    fn value_of(self, meta: &Metadata) -> Option<MetaValue> {
        let s = |v: &str| Some(MetaValue::Str(v.to_string()));
        match self {
            MetaField::FileName => s(&meta.file_name),
            MetaField::Name => s(&meta.name),
            MetaField::Type => s(&meta.store_type),
            MetaField::Address => s(&meta.address),
            MetaField::Tel => s(&meta.tel),
            MetaField::City => s(&meta.city),
            MetaField::Town => s(&meta.town),
            MetaField::Date => Some(MetaValue::Int(meta.date)),
            MetaField::NewStoreName => meta.new_store_name.as_deref().and_then(s),
        }
    }
}

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Str(String),
    Int(i64),
}

impl MetaValue {
    fn to_json(&self) -> Value {
        match self {
            MetaValue::Str(s) => json!(s),
            MetaValue::Int(i) => json!(i),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        MetaValue::Int(i)
    }
}

/// Predicate tree over [`Metadata`].
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    Eq(MetaField, MetaValue),
    /// Matches when the field equals any listed value. An empty list
    /// matches nothing.
    In(MetaField, Vec<MetaValue>),
    Gte(MetaField, i64),
    Lte(MetaField, i64),
    And(Vec<Where>),
}

impl Where {
    /// Evaluate the predicate against a metadata record.
    pub fn matches(&self, meta: &Metadata) -> bool {
        match self {
            Where::Eq(field, value) => field.value_of(meta).as_ref() == Some(value),
            Where::In(field, values) => match field.value_of(meta) {
                Some(v) => values.contains(&v),
                None => false,
            },
            Where::Gte(field, bound) => {
                matches!(field.value_of(meta), Some(MetaValue::Int(v)) if v >= *bound)
            }
            Where::Lte(field, bound) => {
                matches!(field.value_of(meta), Some(MetaValue::Int(v)) if v <= *bound)
            }
            Where::And(parts) => parts.iter().all(|p| p.matches(meta)),
        }
    }

    /// Render as Chroma-style `where` JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Where::Eq(field, value) => json!({ field.key(): value.to_json() }),
            Where::In(field, values) => {
                let vals: Vec<Value> = values.iter().map(MetaValue::to_json).collect();
                json!({ field.key(): { "$in": vals } })
            }
            Where::Gte(field, bound) => json!({ field.key(): { "$gte": bound } }),
            Where::Lte(field, bound) => json!({ field.key(): { "$lte": bound } }),
            Where::And(parts) => {
                let vals: Vec<Value> = parts.iter().map(Where::to_json).collect();
                json!({ "$and": vals })
            }
        }
    }
}

/// Caller-facing structured filter.
///
/// Empty lists and `None` bounds impose no constraint. Date bounds are
/// inclusive epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub cities: Vec<String>,
    pub store_types: Vec<String>,
    pub date_start: Option<i64>,
    pub date_end: Option<i64>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cities = cities.into_iter().map(Into::into).collect();
        self
    }

    pub fn store_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.store_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn date_range(mut self, start: Option<i64>, end: Option<i64>) -> Self {
        self.date_start = start;
        self.date_end = end;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
            && self.store_types.is_empty()
            && self.date_start.is_none()
            && self.date_end.is_none()
    }

    /// Translate into the collection predicate form.
    ///
    /// Returns `None` for an empty spec, the bare predicate when exactly one
    /// constraint is set, and `Where::And` otherwise.
    pub fn to_where(&self) -> Option<Where> {
        let strs = |v: &[String]| -> Vec<MetaValue> {
            v.iter().map(|s| MetaValue::from(s.as_str())).collect()
        };

        let mut parts = Vec::new();
        if !self.cities.is_empty() {
            parts.push(Where::In(MetaField::City, strs(&self.cities)));
        }
        if !self.store_types.is_empty() {
            parts.push(Where::In(MetaField::Type, strs(&self.store_types)));
        }
        if let Some(start) = self.date_start {
            parts.push(Where::Gte(MetaField::Date, start));
        }
        if let Some(end) = self.date_end {
            parts.push(Where::Lte(MetaField::Date, end));
        }

        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Where::And(parts)),
        }
    }
}
