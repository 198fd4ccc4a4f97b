use actix_web::{middleware::Logger, web, App, HttpServer};
use pneumoscan::bootstrap;
use pneumoscan::config::AppConfig;
use pneumoscan::routes::{configure_routes, cors, UploadLimit};
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = AppConfig::load().map_err(startup_failure)?;

    // The classifier is loaded exactly once; nothing binds until it is ready.
    let service = bootstrap::build_service(&config).map_err(startup_failure)?;
    let service = web::Data::new(service);
    let limit = web::Data::new(UploadLimit(config.max_upload_bytes));

    let frontend_dir = config.frontend_dir.clone();
    match &frontend_dir {
        Some(dir) => log::info!("Serving frontend from {}", dir.display()),
        None => log::info!("No FRONTEND_DIR set; serving the API only"),
    }

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors())
            .app_data(service.clone())
            .app_data(limit.clone())
            .configure(|cfg| configure_routes(cfg, frontend_dir.clone()))
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await
}

fn startup_failure(err: impl std::fmt::Display) -> std::io::Error {
    log::error!("Startup failed: {}", err);
    std::io::Error::other(format!("Startup failed: {}", err))
}
