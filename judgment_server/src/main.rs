use axum::{Router, routing::get};
use judgment_server::{Registry, ServerError, Settings, SharedRegistry, websocket_handler};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let settings = Settings::new()?;

    // RUST_LOG 优先，否则用配置里的过滤规则
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.logging.filter)?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = SharedRegistry::new(Registry::new(settings.timings()));

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(registry);

    let addr = settings.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("服务器正在监听 {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
