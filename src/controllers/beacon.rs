use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::beacon::BeaconError;
use crate::models::{BeaconRequest, TaskInstruction};
use crate::AppState;

#[derive(Serialize)]
pub struct BeaconExchangeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskInstruction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/beacon").route(web::post().to(exchange)));
}

/// One beacon round trip: results in, queued tasks and the next-contact
/// delay out.
async fn exchange(state: web::Data<AppState>, body: web::Json<BeaconRequest>) -> impl Responder {
    match state.beacon.handle(body.into_inner()) {
        Ok(reply) => HttpResponse::Ok().json(BeaconExchangeResponse {
            success: true,
            paw: Some(reply.paw),
            sleep: Some(reply.sleep),
            tasks: Some(reply.tasks),
            error: None,
        }),
        Err(BeaconError::Invalid(msg)) => HttpResponse::BadRequest().json(BeaconExchangeResponse {
            success: false,
            paw: None,
            sleep: None,
            tasks: None,
            error: Some(msg),
        }),
        Err(BeaconError::Internal(msg)) => {
            log::error!("Beacon exchange failed: {}", msg);
            HttpResponse::InternalServerError().json(BeaconExchangeResponse {
                success: false,
                paw: None,
                sleep: None,
                tasks: None,
                error: Some("Beacon handling failed".to_string()),
            })
        }
    }
}
