use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;

mod aggregator;
mod beacon;
mod catalog;
mod config;
mod controllers;
mod db;
mod dispatch;
mod gateway;
mod hub;
mod models;
mod orchestrator;
mod planner;
mod registry;
mod scheduler;

use aggregator::Aggregator;
use beacon::{BeaconConfig, BeaconService};
use catalog::Catalog;
use config::Config;
use db::Database;
use dispatch::DispatchQueue;
use gateway::GatewayServer;
use hub::EventHub;
use orchestrator::Orchestrator;
use registry::Registry;
use scheduler::{Scheduler, SchedulerConfig};

pub struct AppState {
    pub db: Arc<Database>,
    pub registry: Arc<Registry>,
    pub catalog: Arc<Catalog>,
    pub dispatch: Arc<DispatchQueue>,
    pub aggregator: Arc<Aggregator>,
    pub orchestrator: Arc<Orchestrator>,
    pub beacon: Arc<BeaconService>,
    pub hub: EventHub,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;
    let gateway_port = config.gateway_port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Arc::new(Database::new(&config.database_url).expect("Failed to initialize database"));

    let catalog = Arc::new(Catalog::new(db.clone()));
    match catalog.install_defaults() {
        Ok(0) => {}
        Ok(count) => log::info!("Installed {} built-in techniques", count),
        Err(e) => log::warn!("Failed to seed the catalog: {}", e),
    }

    let registry = Arc::new(Registry::new(db.clone()));
    match registry.load() {
        Ok(count) => log::info!("Loaded {} known agents from storage", count),
        Err(e) => log::warn!("Failed to load agents from storage: {}", e),
    }

    let hub = EventHub::new();
    let dispatch = Arc::new(DispatchQueue::new());
    let aggregator = Arc::new(Aggregator::new(db.clone(), hub.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        db.clone(),
        registry.clone(),
        dispatch.clone(),
        catalog.clone(),
        aggregator.clone(),
        hub.clone(),
        config.beacon_interval_secs,
    ));

    let beacon = Arc::new(BeaconService::new(
        registry.clone(),
        dispatch.clone(),
        aggregator.clone(),
        hub.clone(),
        BeaconConfig {
            interval_secs: config.beacon_interval_secs,
            jitter_secs: config.beacon_jitter_secs,
        },
    ));

    // Start the observer gateway WebSocket server
    let gateway = GatewayServer::new(hub.clone());
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], gateway_port));
        if let Err(e) = gateway.run(addr).await {
            log::error!("Observer gateway error: {}", e);
        }
    });

    // Start the scheduler background task
    let scheduler = Arc::new(Scheduler::new(
        db.clone(),
        orchestrator.clone(),
        SchedulerConfig {
            poll_interval_secs: config.scheduler_poll_secs,
        },
    ));
    let scheduler_handle = Arc::clone(&scheduler);
    let (_scheduler_shutdown_tx, scheduler_shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        scheduler_handle.start(scheduler_shutdown_rx).await;
    });

    // Periodic housekeeping: offline detection, task timeouts, orphaned rows
    let sweeper = orchestrator.clone();
    let sweep_secs = config.beacon_interval_secs;
    tokio::spawn(async move {
        let mut sweep_interval =
            tokio::time::interval(std::time::Duration::from_secs(sweep_secs));
        loop {
            sweep_interval.tick().await;
            if let Err(e) = sweeper.run_sweep(chrono::Utc::now()) {
                log::error!("Housekeeping sweep failed: {}", e);
            }
        }
    });

    log::info!("Starting SimStrike server on port {}", port);
    log::info!("Observer gateway on port {}", gateway_port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db),
                registry: Arc::clone(&registry),
                catalog: Arc::clone(&catalog),
                dispatch: Arc::clone(&dispatch),
                aggregator: Arc::clone(&aggregator),
                orchestrator: Arc::clone(&orchestrator),
                beacon: Arc::clone(&beacon),
                hub: hub.clone(),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config_routes)
            .configure(controllers::beacon::config)
            .configure(controllers::agents::config)
            .configure(controllers::techniques::config)
            .configure(controllers::scenarios::config)
            .configure(controllers::executions::config)
            .configure(controllers::analytics::config)
            .configure(controllers::schedules::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
