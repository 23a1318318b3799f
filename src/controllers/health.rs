use actix_web::{web, HttpResponse, Responder};

use crate::AppState;

/// Version from Cargo.toml, available at compile time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health_check)));
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": VERSION,
        "agents_online": state.registry.online_count(),
        "agents_total": state.registry.list_all().len(),
        "observers": state.hub.subscriber_count().await,
        "queued_tasks": state.dispatch.queued_count(),
        "dispatched_tasks": state.dispatch.dispatched_count(),
    }))
}
