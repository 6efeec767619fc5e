//! Image Pipeline Server - Main entry point.
//!
//! Starts the Actix-web server alongside the image worker and the
//! reconciliation sweep.

use std::fmt::Display;
use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, http::header, web};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use image_pipeline::api::{self, ApiDoc};
use image_pipeline::config::{Config, Environment, QueueBackend};
use image_pipeline::db::{DbPool, ImageStore};
use image_pipeline::logging;
use image_pipeline::middleware::RequestLogger;
use image_pipeline::queue;
use image_pipeline::services::{
    ImagePipeline, ReconcileConfig, Worker, WorkerConfig, start_reconcile_task,
};
use image_pipeline::transform::Transformer;

/// Log an initialization failure and exit.
fn fatal(context: &str, err: impl Display) -> ! {
    error!("{}: {}", context, err);
    std::process::exit(1);
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            logging::init(Environment::Development);
            error!("Failed to load configuration: {}", e);
            error!("");
            error!("Please check your environment variables:");
            error!("  - RUST_ENV must be set to 'development' or 'production'");
            error!("  - In production, DATABASE_URL must not be the development default");
            error!("  - In production, IMGP_QUEUE_BACKEND must be 'kafka'");
            std::process::exit(1);
        }
    };

    logging::init(config.environment);

    info!("========================================");
    info!("  Image Pipeline Server");
    info!("  Environment: {}", config.environment);
    info!("========================================");

    if config.is_development() {
        warn!("Running in DEVELOPMENT mode - do not use in production!");
    }

    for dir in [&config.storage.uploads_dir, &config.storage.processed_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            fatal(&format!("Failed to create directory {}", dir.display()), e);
        }
    }

    let pool = DbPool::new(&config)
        .await
        .unwrap_or_else(|e| fatal("Failed to connect to database", e));
    info!("Database connection established");

    pool.run_migrations()
        .await
        .unwrap_or_else(|e| fatal("Failed to run migrations", e));
    info!("Database migrations complete");

    let (producer, consumer) = queue::connect(&config.queue)
        .await
        .unwrap_or_else(|e| fatal("Failed to connect to message queue", e));
    match config.queue.backend {
        QueueBackend::Kafka => info!(
            "Message queue ready (kafka topic '{}', group '{}')",
            config.queue.topic, config.queue.group_id
        ),
        QueueBackend::Memory => {
            warn!("Using in-memory queue - queued images are lost on restart")
        }
    }

    let store: Arc<dyn ImageStore> = Arc::new(pool);
    let pipeline = ImagePipeline::new(
        store.clone(),
        producer,
        config.storage.delete_files_on_delete,
    );
    let shutdown = CancellationToken::new();

    let worker = Worker::new(
        store.clone(),
        Transformer::new(config.transform_config()),
        WorkerConfig {
            failure_policy: config.processing.failure_policy,
        },
    )
    .spawn(consumer, shutdown.clone());

    let sweep = start_reconcile_task(
        pipeline.clone(),
        ReconcileConfig {
            interval: config.sweep_interval(),
            stale_after: config.stale_after(),
            max_requeues: config.processing.max_requeues,
            batch_size: config.processing.sweep_batch_size,
        },
        shutdown.clone(),
    );

    let bind_address = config.bind_address();
    let storage = config.storage.clone();
    let static_dir = config.static_dir.clone();
    let is_development = config.is_development();

    if static_dir.is_some() {
        info!("Static file serving enabled from {:?}", static_dir);
    }

    let worker_count = if is_development {
        info!(
            "Starting server at http://{} (4 workers - development mode)",
            bind_address
        );
        4
    } else {
        let cpus = num_cpus::get();
        info!("Starting server at http://{} ({} workers)", bind_address, cpus);
        cpus
    };

    let server = HttpServer::new(move || {
        let cors = if is_development {
            Cors::permissive()
        } else {
            // Same-origin only
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
                .max_age(3600)
        };

        let mut app = App::new()
            .wrap(cors)
            .wrap(RequestLogger)
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::from(store.clone()))
            .app_data(web::Data::new(storage.clone()))
            .configure(api::configure_health_routes)
            .configure(api::configure_image_routes)
            .configure(|cfg| api::configure_file_routes(cfg, &storage))
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/openapi.json", ApiDoc::openapi()));

        // Registered last so it never shadows the API routes
        if let Some(ref dir) = static_dir {
            app = app.service(Files::new("/", dir).index_file("index.html"));
        }

        app
    });

    let result = server
        .workers(worker_count)
        .bind(&bind_address)?
        .run()
        .await;

    info!("HTTP server stopped, shutting down background tasks");
    shutdown.cancel();
    for (name, handle) in [("worker", worker), ("sweep", sweep)] {
        if let Err(e) = handle.await {
            error!("{} task ended abnormally: {}", name, e);
        }
    }

    result
}
