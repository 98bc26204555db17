//! Data types for the Frappe client

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single remote document.
///
/// The field set is defined by the server, so a document is an open map from
/// field name to JSON value. `doctype` and `name` are only read when an
/// operation needs them to build its endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Create an empty document of the given doctype
    pub fn with_doctype(doctype: &str) -> Self {
        let mut doc = Self::new();
        doc.set("doctype", doctype);
        doc
    }

    /// The `doctype` field, if present and a string
    pub fn doctype(&self) -> Option<&str> {
        self.0.get("doctype").and_then(Value::as_str)
    }

    /// The `name` field, if present and a string
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Set a field, returning the previous value
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.to_string(), value.into())
    }

    /// Builder-style variant of [`Document::set`]
    pub fn field(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Consume the document and return the underlying map
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl Deref for Document {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = Value;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

/// Which fields a list or get request should return
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Fields {
    /// Every field (`"*"`)
    #[default]
    All,
    /// Only the named fields
    Only(Vec<String>),
}

impl Fields {
    /// Select the given fields
    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fields::Only(fields.into_iter().map(Into::into).collect())
    }

    /// JSON text sent in the `fields` query parameter
    pub fn to_param(&self) -> String {
        match self {
            Fields::All => Value::from("*").to_string(),
            Fields::Only(names) => Value::from(names.clone()).to_string(),
        }
    }
}

/// Parameters for a list request
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Fields to return
    pub fields: Fields,
    /// Opaque filter expression, sent verbatim as JSON
    pub filters: Option<Value>,
    /// Offset of the first record (only sent with a page length)
    pub limit_start: u64,
    /// Page length; 0 means no pagination
    pub limit_page_length: u64,
    /// Ordering clause, e.g. `"modified desc"`
    pub order_by: Option<String>,
}

impl ListParams {
    /// Default parameters: all fields, no filter, no pagination
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the selected fields
    pub fn fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Set the filter expression
    pub fn filters(mut self, filters: Value) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Set the pagination window
    pub fn page(mut self, limit_start: u64, limit_page_length: u64) -> Self {
        self.limit_start = limit_start;
        self.limit_page_length = limit_page_length;
        self
    }

    /// Set the page length without changing the start offset
    pub fn page_length(mut self, limit_page_length: u64) -> Self {
        self.limit_page_length = limit_page_length;
        self
    }

    /// Set the ordering clause
    pub fn order_by(mut self, order_by: &str) -> Self {
        self.order_by = Some(order_by.to_string());
        self
    }

    /// Query parameters for `/api/resource/{doctype}`
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("fields", self.fields.to_param())];
        if let Some(filters) = &self.filters {
            query.push(("filters", filters.to_string()));
        }
        if self.limit_page_length > 0 {
            query.push(("limit_start", self.limit_start.to_string()));
            query.push(("limit_page_length", self.limit_page_length.to_string()));
        }
        if let Some(order_by) = &self.order_by {
            query.push(("order_by", order_by.clone()));
        }
        query
    }
}

/// One page of a bulk list read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Offset of the first record in the page
    pub offset: u64,
    /// Page length requested from the server
    pub limit: u64,
}
