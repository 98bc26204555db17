//! Basic usage example for the Frappe client
//!
//! Run with: FRAPPE_URL=https://erp.example.com FRAPPE_API_KEY=... \
//!           FRAPPE_API_SECRET=... cargo run --example basic_usage

use frappe_client::{Client, ClientConfig, Document, Fields, ListParams};
use serde_json::json;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let client = Client::with_config(ClientConfig::from_env()?)?;
    info!("Connected to {} (authenticated: {})", client.url(), client.is_authenticated());

    // Create a ToDo
    let todo = Document::with_doctype("ToDo").field("description", "Try the Rust client");
    let created = client.insert(&todo).await?;
    info!("Inserted: {:?}", created);

    // Count and list open ToDos
    let open = json!({"status": "Open"});
    let count = client.get_count("ToDo", Some(&open)).await?;
    info!("{} open ToDos", count);

    let params = ListParams::new()
        .fields(Fields::only(["name", "description"]))
        .filters(open)
        .page(0, 5)
        .order_by("modified desc");
    for doc in client.get_list("ToDo", &params).await? {
        info!("  - {:?}: {:?}", doc.name(), doc.get("description"));
    }

    // Close the one we created
    if let Some(name) = created.as_ref().and_then(|d| d["name"].as_str()) {
        let update = Document::with_doctype("ToDo")
            .field("name", name)
            .field("status", "Closed");
        client.update(&update).await?;
        info!("Closed {}", name);

        let fetched = client.get_doc("ToDo", name, None, None).await?;
        info!("Now: {:?}", fetched);
    }

    Ok(())
}
