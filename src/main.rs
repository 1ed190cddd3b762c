use std::net::SocketAddr;

use agrodetect_rs::{
    config::Config,
    logger::PredictionLogger,
    model::ModelService,
    routes::{build_router, AppState},
    utils::{ensure_dirs, ensure_model_file},
    validator::ImageValidator,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, model = %config.model_path.display(), "starting crop diagnosis service");

    let model_dir = config.model_path.parent().unwrap_or(config.upload_dir.as_path());
    ensure_dirs(&[config.upload_dir.as_path(), model_dir]).await?;

    let model = match ensure_model_file(
        &config.model_path,
        config.model_url.as_deref(),
        config.github_token.as_deref(),
    )
    .await
    {
        Ok(true) => ModelService::load(
            &config.model_path,
            &config.model_input_op,
            &config.model_output_op,
        ),
        Ok(false) => ModelService::unavailable("model artifact not found"),
        Err(err) => {
            tracing::error!(error = %err, "could not fetch model artifact");
            ModelService::unavailable(err.to_string())
        }
    };
    if let Some(reason) = model.unavailable_reason() {
        tracing::warn!(reason, "serving without a model, predictions will fail");
    }

    let state = AppState::new(
        model,
        ImageValidator::new(config.max_file_bytes, config.verify_image_content),
        PredictionLogger::new(&config.predictions_log),
        &config.upload_dir,
    );
    let app = build_router(state, &config.frontend_dir, config.body_limit_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
