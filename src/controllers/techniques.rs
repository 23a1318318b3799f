use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::models::Technique;
use crate::AppState;

#[derive(Serialize)]
pub struct TechniquesListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub techniques: Option<Vec<Technique>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct TechniqueOperationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technique: Option<Technique>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/techniques")
            .route("", web::get().to(list_techniques))
            .route("/{id}", web::get().to(get_technique)),
    );
}

async fn list_techniques(state: web::Data<AppState>) -> impl Responder {
    match state.catalog.techniques() {
        Ok(techniques) => HttpResponse::Ok().json(TechniquesListResponse {
            success: true,
            techniques: Some(techniques),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to list techniques: {}", e);
            HttpResponse::InternalServerError().json(TechniquesListResponse {
                success: false,
                techniques: None,
                error: Some("Failed to retrieve techniques".to_string()),
            })
        }
    }
}

async fn get_technique(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.catalog.technique(&id) {
        Ok(Some(technique)) => HttpResponse::Ok().json(TechniqueOperationResponse {
            success: true,
            technique: Some(technique),
            error: None,
        }),
        Ok(None) => HttpResponse::NotFound().json(TechniqueOperationResponse {
            success: false,
            technique: None,
            error: Some("Technique not found".to_string()),
        }),
        Err(e) => {
            log::error!("Failed to get technique {}: {}", id, e);
            HttpResponse::InternalServerError().json(TechniqueOperationResponse {
                success: false,
                technique: None,
                error: Some("Failed to retrieve technique".to_string()),
            })
        }
    }
}
