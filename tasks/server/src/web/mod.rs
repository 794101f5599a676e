use axum::Router;
use axum::routing::get;
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::task::api::v1::TaskState;
use crate::task::repository::SeaOrmTaskRepository;
use crate::task::{NewTask, TaskService, TaskServiceError};

pub mod api;

const SAMPLE_TASKS: [(&str, &str); 3] = [
    ("Buy bread", "Whole wheat loaf"),
    ("Study Rust", "Review ownership and async/await"),
    ("Pay bills", "Water, electricity and internet"),
];

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let db = Database::connect(&config.db_url).await?;
    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    if config.seed_sample_tasks {
        let seeded = seed_sample_tasks(&db).await?;
        tracing::info!("Seeded {} sample task(s)", seeded);
    }

    let db = Arc::new(db);
    let app = create_app_router(db.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(db) {
        Ok(db) => {
            db.close().await?;
            tracing::info!("Database connection closed");
        }
        Err(_) => tracing::warn!("Database connection still in use at shutdown"),
    }
    Ok(())
}

/// Builds the full application router on top of an open database connection.
pub fn create_app_router(db: Arc<DatabaseConnection>) -> Router {
    let task_state = Arc::new(TaskState { db });

    Router::new()
        .route("/health", get(health_check_handler))
        .route("/", get(welcome_handler))
        .merge(api::create_api_router(task_state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

#[tracing::instrument]
pub async fn welcome_handler() -> &'static str {
    "Welcome to the To-do List API!"
}

/// Inserts the sample tasks when the table is empty.
///
/// # Returns
///
/// The number of tasks inserted.
#[tracing::instrument(skip(db))]
pub async fn seed_sample_tasks(db: &DatabaseConnection) -> Result<usize, TaskServiceError> {
    let service = TaskService::new(SeaOrmTaskRepository::new(db));
    if !service.list_tasks().await?.is_empty() {
        tracing::debug!("Tasks already present, skipping sample data");
        return Ok(0);
    }

    for (title, description) in SAMPLE_TASKS {
        service
            .create_task(NewTask {
                title: Some(title.to_string()),
                description: Some(description.to_string()),
                ..Default::default()
            })
            .await?;
    }
    Ok(SAMPLE_TASKS.len())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, stopping web server");
}
