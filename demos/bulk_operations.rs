//! Bulk operations example for the Frappe client
//!
//! Inserts a few thousand ToDos over concurrent requests, then reads every
//! open ToDo back one page per request.
//!
//! Run with: FRAPPE_URL=... FRAPPE_API_KEY=... FRAPPE_API_SECRET=... \
//!           cargo run --example bulk_operations

use std::time::Instant;

use frappe_client::{Client, ClientConfig, Document, Fields, ListParams};
use serde_json::json;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,frappe_client=debug")),
        )
        .init();

    let client = Client::with_config(ClientConfig::from_env()?)?;

    let docs: Vec<Document> = (0..2500)
        .map(|i| Document::with_doctype("ToDo").field("description", format!("bulk item {}", i)))
        .collect();

    info!("=== Bulk insert ===");
    let started = Instant::now();
    let results = client.simult_bulk_insert_chunked(&docs, 200).await?;
    info!(
        "Inserted {} documents in {} requests ({:?})",
        docs.len(),
        results.len(),
        started.elapsed()
    );

    info!("=== Bulk read ===");
    let params = ListParams::new()
        .fields(Fields::only(["name", "description"]))
        .filters(json!({"status": "Open"}))
        .page_length(500)
        .order_by("creation asc");

    let started = Instant::now();
    let pages = client.simult_bulk_get_list("ToDo", &params).await?;
    let total: usize = pages.iter().map(Vec::len).sum();
    info!(
        "Read {} documents in {} pages ({:?})",
        total,
        pages.len(),
        started.elapsed()
    );

    match client.simult_bulk_insert_chunked(&[Document::new()], 1).await {
        Ok(_) => info!("Server accepted a document without doctype"),
        Err(e) => info!("Expected failure: {} (root: {})", e, e.root()),
    }

    Ok(())
}
