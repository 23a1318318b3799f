use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{CreateScenarioRequest, Scenario};
use crate::AppState;

#[derive(Serialize)]
pub struct ScenariosListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenarios: Option<Vec<Scenario>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ScenarioOperationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/scenarios")
            .route("", web::get().to(list_scenarios))
            .route("", web::post().to(create_scenario))
            .route("/{id}", web::get().to(get_scenario)),
    );
}

async fn list_scenarios(state: web::Data<AppState>) -> impl Responder {
    match state.catalog.scenarios() {
        Ok(scenarios) => HttpResponse::Ok().json(ScenariosListResponse {
            success: true,
            scenarios: Some(scenarios),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to list scenarios: {}", e);
            HttpResponse::InternalServerError().json(ScenariosListResponse {
                success: false,
                scenarios: None,
                error: Some("Failed to retrieve scenarios".to_string()),
            })
        }
    }
}

async fn get_scenario(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.catalog.scenario(&id) {
        Ok(Some(scenario)) => HttpResponse::Ok().json(ScenarioOperationResponse {
            success: true,
            scenario: Some(scenario),
            error: None,
        }),
        Ok(None) => HttpResponse::NotFound().json(ScenarioOperationResponse {
            success: false,
            scenario: None,
            error: Some("Scenario not found".to_string()),
        }),
        Err(e) => {
            log::error!("Failed to get scenario {}: {}", id, e);
            HttpResponse::InternalServerError().json(ScenarioOperationResponse {
                success: false,
                scenario: None,
                error: Some("Failed to retrieve scenario".to_string()),
            })
        }
    }
}

async fn create_scenario(
    state: web::Data<AppState>,
    body: web::Json<CreateScenarioRequest>,
) -> impl Responder {
    if body.name.trim().is_empty() {
        return HttpResponse::BadRequest().json(ScenarioOperationResponse {
            success: false,
            scenario: None,
            error: Some("Scenario name cannot be empty".to_string()),
        });
    }

    if body.phases.is_empty() {
        return HttpResponse::BadRequest().json(ScenarioOperationResponse {
            success: false,
            scenario: None,
            error: Some("Scenario must have at least one phase".to_string()),
        });
    }

    if body.phases.iter().any(|p| p.techniques.is_empty()) {
        return HttpResponse::BadRequest().json(ScenarioOperationResponse {
            success: false,
            scenario: None,
            error: Some("Every phase must list at least one technique".to_string()),
        });
    }

    let request = body.into_inner();
    let scenario = Scenario {
        id: Uuid::new_v4().to_string(),
        name: request.name,
        description: request.description,
        phases: request.phases,
    };

    match state.db.save_scenario(&scenario) {
        Ok(()) => HttpResponse::Created().json(ScenarioOperationResponse {
            success: true,
            scenario: Some(scenario),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to create scenario: {}", e);
            HttpResponse::InternalServerError().json(ScenarioOperationResponse {
                success: false,
                scenario: None,
                error: Some("Failed to create scenario".to_string()),
            })
        }
    }
}
