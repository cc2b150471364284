use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use gateway_client::GatewayClient;
use ledger_engine::{LedgerEngine, MemoryStore};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use wallet_api::{config::Config, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Starting Wallet API on port {}", config.server.port);

    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(
        GatewayClient::new(config.gateway_config()).expect("Failed to build gateway client"),
    );
    let engine_config = config
        .engine_config()
        .expect("Invalid ledger configuration");
    let engine = Arc::new(
        LedgerEngine::new(store, gateway, engine_config).expect("Failed to build ledger engine"),
    );

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(engine.clone()))
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
