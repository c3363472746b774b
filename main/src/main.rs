use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::{
    storage::{db::SurrealDbClient, types::{message::Message, pipeline_settings::PipelineSettings}},
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use context_pipeline::CompletionProvider;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // Set up the database client
    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    db.ensure_initialized().await?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Create embedding provider based on config before syncing settings
    let embedding_provider = Arc::new(EmbeddingProvider::from_config(
        &config,
        Some(Arc::clone(&openai_client)),
    )?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    // Sync settings with the provider's backend/model/dimensions
    let (settings, dimensions_changed) =
        PipelineSettings::sync_with_embedding(&db, &embedding_provider).await?;

    // If dimensions changed, stored vectors are no longer comparable with fresh
    // query vectors. Re-embed before the index is redefined at the new size.
    if dimensions_changed {
        warn!(
            new_dimensions = settings.embedding_dimensions,
            "Embedding configuration changed, re-embedding stored messages"
        );
        if let Err(e) = Message::update_all_embeddings(&db, &embedding_provider).await {
            error!(
                "Failed to re-embed messages: {}. Retrieval results may be stale.",
                e
            );
        }
    }

    db.define_message_embedding_index(settings.embedding_dimensions)
        .await?;

    let completion_provider = Arc::new(CompletionProvider::new_openai(Arc::clone(&openai_client)));

    let api_state = ApiState::new(&config, db, embedding_provider, completion_provider);

    // Create Axum router
    let app = Router::new()
        .nest("/api/v1", api_routes_v1())
        .with_state(AppState { api_state });

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}
