use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::AppState;

#[derive(Serialize)]
pub struct TrendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct CoverageResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct TrendQuery {
    pub scenario_id: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/analytics")
            .route("/trend", web::get().to(get_trend))
            .route("/coverage", web::get().to(get_coverage)),
    );
}

/// Score delta between the two most recent completed runs of a scenario.
async fn get_trend(state: web::Data<AppState>, query: web::Query<TrendQuery>) -> impl Responder {
    let scenario_id = match query.scenario_id.as_deref() {
        Some(id) if !id.trim().is_empty() => id,
        _ => {
            return HttpResponse::BadRequest().json(TrendResponse {
                success: false,
                trend: None,
                error: Some("scenario_id query parameter is required".to_string()),
            });
        }
    };

    match state.aggregator.trend(scenario_id) {
        Ok(trend) => HttpResponse::Ok().json(TrendResponse {
            success: true,
            trend: Some(trend),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to compute trend for scenario {}: {}", scenario_id, e);
            HttpResponse::InternalServerError().json(TrendResponse {
                success: false,
                trend: None,
                error: Some("Failed to compute trend".to_string()),
            })
        }
    }
}

/// Share of the catalog exercised by the recent execution window.
async fn get_coverage(state: web::Data<AppState>) -> impl Responder {
    match state.aggregator.coverage() {
        Ok(coverage) => HttpResponse::Ok().json(CoverageResponse {
            success: true,
            coverage: Some(coverage),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to compute technique coverage: {}", e);
            HttpResponse::InternalServerError().json(CoverageResponse {
                success: false,
                coverage: None,
                error: Some("Failed to compute coverage".to_string()),
            })
        }
    }
}
