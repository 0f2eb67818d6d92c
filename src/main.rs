use axum::{
    routing::{get, post, put},
    Router,
};
use cookops_checklist::{api, AppConfig, BackendClient, ChecklistService, MenuRepository};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // local-time log lines
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    let backend = Arc::new(BackendClient::new(&config.backend)?);
    info!("Backend client ready for {}", config.backend.base_url);

    let menus = Arc::new(MenuRepository::new(backend.clone()));
    let checklist = Arc::new(ChecklistService::new(
        backend,
        menus.clone(),
        config.checklist.clone(),
        Duration::from_secs(config.backend.timeout_secs),
    ));

    let checklist_routes = Router::new()
        .route("/api/checklist", post(api::generate_checklist))
        .route("/api/checklist/export", post(api::export_checklist))
        .route("/api/checklist/reset", post(api::reset_site))
        .with_state(checklist);

    let menu_routes = Router::new()
        .route("/api/menu/reload", post(api::reload_menu))
        .route(
            "/api/menu/entries",
            put(api::upsert_entry).delete(api::remove_entry),
        )
        .route("/api/menu/entries/move", post(api::move_entry))
        .route("/api/menu/sync", post(api::sync_menu))
        .with_state(menus);

    let app = Router::new()
        .route("/health", get(api::health_check))
        .merge(checklist_routes)
        .merge(menu_routes)
        .layer(ServiceBuilder::new());

    let addr = config.listen_addr();
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST   /api/checklist          - aggregated checklist (JSON)");
    info!("  POST   /api/checklist/export   - printable checklist (CSV)");
    info!("  POST   /api/checklist/reset    - supersede runs for a site");
    info!("  POST   /api/menu/reload        - reload menu entries");
    info!("  PUT    /api/menu/entries       - add/replace entry");
    info!("  DELETE /api/menu/entries       - remove entry");
    info!("  POST   /api/menu/entries/move  - move entry");
    info!("  POST   /api/menu/sync          - push menu edits");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
