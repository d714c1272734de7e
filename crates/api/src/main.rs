use anyhow::Result;
use wayfinder_agents::AssistantSettings;
use wayfinder_api::build_app;
use wayfinder_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("wayfinder_api");

    let settings = AssistantSettings::from_env();
    let bind = settings.bind.clone();
    let catalog_path = settings.catalog_path.display().to_string();

    let app = build_app(settings).await?;

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, catalog = %catalog_path, "wayfinder api started");

    axum::serve(listener, app).await?;
    Ok(())
}
