use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::models::Agent;
use crate::AppState;

#[derive(Serialize)]
pub struct AgentsListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<Agent>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct AgentOperationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Agent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/agents")
            .route("", web::get().to(list_agents))
            .route("/{paw}", web::get().to(get_agent))
            .route("/{paw}/deactivate", web::post().to(deactivate_agent)),
    );
}

/// The registry is the live view, so these reads never touch storage.
async fn list_agents(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(AgentsListResponse {
        success: true,
        agents: Some(state.registry.list_all()),
        error: None,
    })
}

async fn get_agent(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let paw = path.into_inner();

    match state.registry.find(&paw) {
        Some(agent) => HttpResponse::Ok().json(AgentOperationResponse {
            success: true,
            agent: Some(agent),
            error: None,
        }),
        None => HttpResponse::NotFound().json(AgentOperationResponse {
            success: false,
            agent: None,
            error: Some("Agent not found".to_string()),
        }),
    }
}

async fn deactivate_agent(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let paw = path.into_inner();

    match state.registry.deactivate(&paw) {
        Ok(true) => HttpResponse::Ok().json(AgentOperationResponse {
            success: true,
            agent: state.registry.find(&paw),
            error: None,
        }),
        Ok(false) => HttpResponse::NotFound().json(AgentOperationResponse {
            success: false,
            agent: None,
            error: Some("Agent not found".to_string()),
        }),
        Err(e) => {
            log::error!("Failed to deactivate agent {}: {}", paw, e);
            HttpResponse::InternalServerError().json(AgentOperationResponse {
                success: false,
                agent: None,
                error: Some("Failed to deactivate agent".to_string()),
            })
        }
    }
}
