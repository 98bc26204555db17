//! An async client for the Frappe document REST API
//!
//! Talks to `/api/resource` and `/api/method` endpoints of a Frappe (or
//! ERPNext) site, and spreads large reads and writes over many concurrent
//! requests on one connection pool.
//!
//! # Features
//! - HTTP/1.1 and HTTP/2 with connection pooling, rustls TLS
//! - API key/secret authentication
//! - Single document get, count, list, insert and update
//! - Concurrent bulk list reads, inserts and updates with results in
//!   partition order
//! - Configurable request timeout and in-flight request limit
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use frappe_client::{Client, Document, ListParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), frappe_client::Error> {
//!     let client = Client::with_credentials("https://erp.example.com", "key", "secret")?;
//!
//!     // Count and list
//!     let open = serde_json::json!({"status": "Open"});
//!     let total = client.get_count("Task", Some(&open)).await?;
//!     let pages = client
//!         .simult_bulk_get_list("Task", &ListParams::new().filters(open).page_length(50))
//!         .await?;
//!     println!("{} open tasks in {} pages", total, pages.len());
//!
//!     // Insert a large batch over several concurrent requests
//!     let docs: Vec<Document> = (0..1000)
//!         .map(|i| Document::with_doctype("ToDo").field("description", format!("item {}", i)))
//!         .collect();
//!     let results = client.simult_bulk_insert(&docs).await?;
//!     println!("{} insert requests", results.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod bulk;
pub mod client;
pub mod config;
pub mod documents;
pub mod error;
pub mod response;
pub mod types;

pub use bulk::{plan_chunks, plan_windows};
pub use client::Client;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use response::normalize;
pub use types::*;
