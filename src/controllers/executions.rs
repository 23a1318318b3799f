use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::models::{Execution, ExecutionResult, SecurityScore, StartExecutionRequest};
use crate::AppState;

#[derive(Serialize)]
pub struct ExecutionsListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executions: Option<Vec<Execution>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ExecutionOperationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<Execution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ExecutionResultsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ExecutionResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ScoreResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<SecurityScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/executions")
            .route("", web::get().to(list_executions))
            .route("", web::post().to(start_execution))
            .route("/recent", web::get().to(recent_executions))
            .route("/{id}", web::get().to(get_execution))
            .route("/{id}/results", web::get().to(get_results))
            .route("/{id}/score", web::get().to(get_score))
            .route("/{id}/cancel", web::post().to(cancel_execution)),
    );
}

async fn list_executions(state: web::Data<AppState>) -> impl Responder {
    match state.db.list_executions() {
        Ok(executions) => HttpResponse::Ok().json(ExecutionsListResponse {
            success: true,
            executions: Some(executions),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to list executions: {}", e);
            HttpResponse::InternalServerError().json(ExecutionsListResponse {
                success: false,
                executions: None,
                error: Some("Failed to retrieve executions".to_string()),
            })
        }
    }
}

async fn recent_executions(
    state: web::Data<AppState>,
    query: web::Query<RecentQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(10);

    match state.db.list_recent_executions(limit) {
        Ok(executions) => HttpResponse::Ok().json(ExecutionsListResponse {
            success: true,
            executions: Some(executions),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to list recent executions: {}", e);
            HttpResponse::InternalServerError().json(ExecutionsListResponse {
                success: false,
                executions: None,
                error: Some("Failed to retrieve executions".to_string()),
            })
        }
    }
}

async fn start_execution(
    state: web::Data<AppState>,
    body: web::Json<StartExecutionRequest>,
) -> impl Responder {
    match state.db.find_scenario(&body.scenario_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(ExecutionOperationResponse {
                success: false,
                execution: None,
                error: Some("Scenario not found".to_string()),
            });
        }
        Err(e) => {
            log::error!("Failed to look up scenario {}: {}", body.scenario_id, e);
            return HttpResponse::InternalServerError().json(ExecutionOperationResponse {
                success: false,
                execution: None,
                error: Some("Failed to start execution".to_string()),
            });
        }
    }

    match state
        .orchestrator
        .start_execution(&body.scenario_id, &body.agent_paws, body.safe_mode)
    {
        Ok(execution) => HttpResponse::Created().json(ExecutionOperationResponse {
            success: true,
            execution: Some(execution),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to start execution: {}", e);
            HttpResponse::InternalServerError().json(ExecutionOperationResponse {
                success: false,
                execution: None,
                error: Some(e),
            })
        }
    }
}

async fn get_execution(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.db.find_execution(&id) {
        Ok(Some(execution)) => HttpResponse::Ok().json(ExecutionOperationResponse {
            success: true,
            execution: Some(execution),
            error: None,
        }),
        Ok(None) => HttpResponse::NotFound().json(ExecutionOperationResponse {
            success: false,
            execution: None,
            error: Some("Execution not found".to_string()),
        }),
        Err(e) => {
            log::error!("Failed to get execution {}: {}", id, e);
            HttpResponse::InternalServerError().json(ExecutionOperationResponse {
                success: false,
                execution: None,
                error: Some("Failed to retrieve execution".to_string()),
            })
        }
    }
}

async fn get_results(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.db.find_execution(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(ExecutionResultsResponse {
                success: false,
                results: None,
                error: Some("Execution not found".to_string()),
            });
        }
        Err(e) => {
            log::error!("Failed to look up execution {}: {}", id, e);
            return HttpResponse::InternalServerError().json(ExecutionResultsResponse {
                success: false,
                results: None,
                error: Some("Failed to retrieve results".to_string()),
            });
        }
    }

    match state.db.list_results_by_execution(&id) {
        Ok(results) => HttpResponse::Ok().json(ExecutionResultsResponse {
            success: true,
            results: Some(results),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to list results for execution {}: {}", id, e);
            HttpResponse::InternalServerError().json(ExecutionResultsResponse {
                success: false,
                results: None,
                error: Some("Failed to retrieve results".to_string()),
            })
        }
    }
}

/// Score computed from resolved results on the fly, so a running
/// execution is inspectable mid-flight.
async fn get_score(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.db.find_execution(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(ScoreResponse {
                success: false,
                score: None,
                error: Some("Execution not found".to_string()),
            });
        }
        Err(e) => {
            log::error!("Failed to look up execution {}: {}", id, e);
            return HttpResponse::InternalServerError().json(ScoreResponse {
                success: false,
                score: None,
                error: Some("Failed to compute score".to_string()),
            });
        }
    }

    match state.aggregator.score_for(&id) {
        Ok(score) => HttpResponse::Ok().json(ScoreResponse {
            success: true,
            score: Some(score),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to compute score for execution {}: {}", id, e);
            HttpResponse::InternalServerError().json(ScoreResponse {
                success: false,
                score: None,
                error: Some("Failed to compute score".to_string()),
            })
        }
    }
}

async fn cancel_execution(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.db.find_execution(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(ExecutionOperationResponse {
                success: false,
                execution: None,
                error: Some("Execution not found".to_string()),
            });
        }
        Err(e) => {
            log::error!("Failed to look up execution {}: {}", id, e);
            return HttpResponse::InternalServerError().json(ExecutionOperationResponse {
                success: false,
                execution: None,
                error: Some("Failed to cancel execution".to_string()),
            });
        }
    }

    match state.orchestrator.cancel_execution(&id) {
        Ok(execution) => HttpResponse::Ok().json(ExecutionOperationResponse {
            success: true,
            execution: Some(execution),
            error: None,
        }),
        Err(e) => HttpResponse::BadRequest().json(ExecutionOperationResponse {
            success: false,
            execution: None,
            error: Some(e),
        }),
    }
}
