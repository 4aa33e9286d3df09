//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use billing_backend::{
    config::{AppState, Settings},
    routes::build_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Bad configuration stops the process before anything binds
    let settings = Settings::from_env()?;
    let app_state = AppState::new(&settings).await?;

    if let Some(pool) = &app_state.db_pool {
        sqlx::migrate!().run(pool).await?;
        tracing::info!("Database migrations applied");
    }

    if let Some(admin) = &settings.bootstrap_admin {
        app_state
            .auth_service
            .ensure_bootstrap_user(&admin.email, &admin.password)
            .await?;
    }

    let app = build_router(app_state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
