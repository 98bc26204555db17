//! Single-request document operations
//!
//! Each operation is one round-trip through the transport and the envelope
//! normalizer. Errors are returned unchanged.

use hyper::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{encode_segment, Body, Client};
use crate::error::{Error, Result};
use crate::response::{into_count, into_documents};
use crate::types::{Document, Fields, ListParams};

const COUNT_METHOD: &str = "/api/method/frappe.client.get_count";
const INSERT_MANY_CMD: &str = "frappe.client.insert_many";
const BULK_UPDATE_CMD: &str = "frappe.client.bulk_update";

fn resource_path(doctype: &str) -> String {
    format!("/api/resource/{}", encode_segment(doctype))
}

fn required<'a>(field: Option<&'a str>, what: &str) -> Result<&'a str> {
    field
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidArgument(format!("document has no `{}` field", what)))
}

/// Body of the generic command endpoint: the document list travels as a
/// JSON string inside the JSON body.
fn command_body(cmd: &str, docs: &[Document]) -> Result<Value> {
    Ok(json!({
        "cmd": cmd,
        "docs": serde_json::to_string(docs)?,
    }))
}

impl Client {
    /// Fetch a single document.
    ///
    /// `name` may be empty, in which case the server picks the document
    /// matching `filters`. `fields` limits the returned fields.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use frappe_client::Client;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), frappe_client::Error> {
    /// # let client = Client::new("http://localhost:8000")?;
    /// let task = client.get_doc("Task", "TASK-0001", None, None).await?;
    /// println!("{:?}", task);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_doc(
        &self,
        doctype: &str,
        name: &str,
        filters: Option<&Value>,
        fields: Option<&Fields>,
    ) -> Result<Option<Value>> {
        let path = format!("{}/{}", resource_path(doctype), encode_segment(name));

        let mut query = Vec::new();
        if let Some(filters) = filters {
            query.push(("filters", filters.to_string()));
        }
        if let Some(fields) = fields {
            query.push(("fields", fields.to_param()));
        }

        self.call(Method::GET, &path, &query, Body::Empty).await
    }

    /// Count the documents of `doctype` matching `filters`
    pub async fn get_count(&self, doctype: &str, filters: Option<&Value>) -> Result<u64> {
        let mut query = Vec::new();
        if let Some(filters) = filters {
            query.push(("filters", filters.to_string()));
        }
        query.push(("doctype", doctype.to_string()));

        let (status, payload) = self
            .call_with_status(Method::GET, COUNT_METHOD, &query, Body::Empty)
            .await?;
        let count = into_count(status, payload)?;
        debug!("{} matching {} documents", count, doctype);
        Ok(count)
    }

    /// List documents of `doctype`.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use frappe_client::{Client, ListParams};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), frappe_client::Error> {
    /// # let client = Client::new("http://localhost:8000")?;
    /// let params = ListParams::new()
    ///     .filters(serde_json::json!({"status": "Open"}))
    ///     .page(0, 20)
    ///     .order_by("modified desc");
    /// for task in client.get_list("Task", &params).await? {
    ///     println!("{:?}", task.name());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_list(&self, doctype: &str, params: &ListParams) -> Result<Vec<Document>> {
        let query = params.to_query();
        let (status, payload) = self
            .call_with_status(Method::GET, &resource_path(doctype), &query, Body::Empty)
            .await?;
        into_documents(status, payload)
    }

    /// Insert one document. The document must carry its `doctype`.
    pub async fn insert(&self, doc: &Document) -> Result<Option<Value>> {
        let doctype = required(doc.doctype(), "doctype")?;
        let form = vec![("data", serde_json::to_string(doc)?)];
        self.call(Method::POST, &resource_path(doctype), &[], Body::Form(form))
            .await
    }

    /// Insert a batch of documents in a single request
    pub async fn insert_many(&self, docs: &[Document]) -> Result<Option<Value>> {
        let body = command_body(INSERT_MANY_CMD, docs)?;
        self.call(Method::POST, "/", &[], Body::Json(body)).await
    }

    /// Update one document. The document must carry `doctype` and `name`.
    pub async fn update(&self, doc: &Document) -> Result<Option<Value>> {
        let doctype = required(doc.doctype(), "doctype")?;
        let name = required(doc.name(), "name")?;
        let path = format!("{}/{}", resource_path(doctype), encode_segment(name));
        let body = json!({ "data": serde_json::to_string(doc)? });
        self.call(Method::PUT, &path, &[], Body::Json(body)).await
    }

    /// Update a batch of documents (matched by `name`) in a single request
    pub async fn bulk_update(&self, docs: &[Document]) -> Result<Option<Value>> {
        let body = command_body(BULK_UPDATE_CMD, docs)?;
        self.call(Method::POST, "/", &[], Body::Json(body)).await
    }
}
