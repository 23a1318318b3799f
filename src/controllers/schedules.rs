use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{CreateScheduleRequest, Frequency, Schedule, ScheduleRun, ScheduleStatus};
use crate::AppState;

/// Runs returned per schedule, newest first.
const RUN_HISTORY_LIMIT: u32 = 50;

#[derive(Serialize)]
pub struct SchedulesListResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedules: Option<Vec<Schedule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleOperationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleRunsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<ScheduleRun>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/schedules")
            .route("", web::get().to(list_schedules))
            .route("", web::post().to(create_schedule))
            .route("/{id}", web::get().to(get_schedule))
            .route("/{id}", web::delete().to(delete_schedule))
            .route("/{id}/pause", web::post().to(pause_schedule))
            .route("/{id}/resume", web::post().to(resume_schedule))
            .route("/{id}/runs", web::get().to(get_schedule_runs)),
    );
}

async fn list_schedules(state: web::Data<AppState>) -> impl Responder {
    match state.db.list_schedules() {
        Ok(schedules) => HttpResponse::Ok().json(SchedulesListResponse {
            success: true,
            schedules: Some(schedules),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to list schedules: {}", e);
            HttpResponse::InternalServerError().json(SchedulesListResponse {
                success: false,
                schedules: None,
                error: Some("Failed to retrieve schedules".to_string()),
            })
        }
    }
}

async fn create_schedule(
    state: web::Data<AppState>,
    body: web::Json<CreateScheduleRequest>,
) -> impl Responder {
    let frequency = match Frequency::from_str(&body.frequency) {
        Some(f) => f,
        None => {
            return HttpResponse::BadRequest().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some(
                    "Invalid frequency. Valid options: hourly, daily, weekly, monthly, cron"
                        .to_string(),
                ),
            });
        }
    };

    if frequency == Frequency::Cron {
        let expr = body.cron_expr.as_deref().unwrap_or("");
        if expr.trim().is_empty() {
            return HttpResponse::BadRequest().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("cron frequency requires a cron_expr".to_string()),
            });
        }
        // Same five-field grammar the scheduler evaluates with
        use std::str::FromStr;
        if cron::Schedule::from_str(&format!("0 {}", expr)).is_err() {
            return HttpResponse::BadRequest().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Invalid cron expression".to_string()),
            });
        }
    }

    match state.db.find_scenario(&body.scenario_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Scenario not found".to_string()),
            });
        }
        Err(e) => {
            log::error!("Failed to look up scenario {}: {}", body.scenario_id, e);
            return HttpResponse::InternalServerError().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Failed to create schedule".to_string()),
            });
        }
    }

    let request = body.into_inner();
    let now = Utc::now();
    let mut schedule = Schedule {
        id: Uuid::new_v4().to_string(),
        scenario_id: request.scenario_id,
        agent_paw: request.agent_paw,
        frequency,
        cron_expr: request.cron_expr,
        safe_mode: request.safe_mode,
        status: ScheduleStatus::Active,
        next_run_at: None,
        last_run_at: None,
        last_run_id: None,
        created_at: now,
    };
    schedule.next_run_at = schedule.next_run_after(now);

    match state.db.create_schedule(&schedule) {
        Ok(()) => HttpResponse::Created().json(ScheduleOperationResponse {
            success: true,
            schedule: Some(schedule),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to create schedule: {}", e);
            HttpResponse::InternalServerError().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Failed to create schedule".to_string()),
            })
        }
    }
}

async fn get_schedule(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.db.find_schedule(&id) {
        Ok(Some(schedule)) => HttpResponse::Ok().json(ScheduleOperationResponse {
            success: true,
            schedule: Some(schedule),
            error: None,
        }),
        Ok(None) => HttpResponse::NotFound().json(ScheduleOperationResponse {
            success: false,
            schedule: None,
            error: Some("Schedule not found".to_string()),
        }),
        Err(e) => {
            log::error!("Failed to get schedule {}: {}", id, e);
            HttpResponse::InternalServerError().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Failed to retrieve schedule".to_string()),
            })
        }
    }
}

async fn delete_schedule(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.db.delete_schedule(&id) {
        Ok(true) => HttpResponse::Ok().json(ScheduleOperationResponse {
            success: true,
            schedule: None,
            error: None,
        }),
        Ok(false) => HttpResponse::NotFound().json(ScheduleOperationResponse {
            success: false,
            schedule: None,
            error: Some("Schedule not found".to_string()),
        }),
        Err(e) => {
            log::error!("Failed to delete schedule {}: {}", id, e);
            HttpResponse::InternalServerError().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Failed to delete schedule".to_string()),
            })
        }
    }
}

async fn pause_schedule(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    set_status(state, path.into_inner(), ScheduleStatus::Paused).await
}

async fn resume_schedule(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    set_status(state, path.into_inner(), ScheduleStatus::Active).await
}

async fn set_status(
    state: web::Data<AppState>,
    id: String,
    status: ScheduleStatus,
) -> HttpResponse {
    let mut schedule = match state.db.find_schedule(&id) {
        Ok(Some(schedule)) => schedule,
        Ok(None) => {
            return HttpResponse::NotFound().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Schedule not found".to_string()),
            });
        }
        Err(e) => {
            log::error!("Failed to get schedule {}: {}", id, e);
            return HttpResponse::InternalServerError().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Failed to update schedule".to_string()),
            });
        }
    };

    schedule.status = status;
    if status == ScheduleStatus::Active {
        // The next slot moves out from now, so a long pause does not
        // trigger an immediate catch-up run on resume
        schedule.next_run_at = schedule.next_run_after(Utc::now());
    }

    match state.db.update_schedule(&schedule) {
        Ok(_) => HttpResponse::Ok().json(ScheduleOperationResponse {
            success: true,
            schedule: Some(schedule),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to update schedule {}: {}", id, e);
            HttpResponse::InternalServerError().json(ScheduleOperationResponse {
                success: false,
                schedule: None,
                error: Some("Failed to update schedule".to_string()),
            })
        }
    }
}

async fn get_schedule_runs(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();

    match state.db.find_schedule(&id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(ScheduleRunsResponse {
                success: false,
                runs: None,
                error: Some("Schedule not found".to_string()),
            });
        }
        Err(e) => {
            log::error!("Failed to look up schedule {}: {}", id, e);
            return HttpResponse::InternalServerError().json(ScheduleRunsResponse {
                success: false,
                runs: None,
                error: Some("Failed to retrieve runs".to_string()),
            });
        }
    }

    match state.db.list_schedule_runs(&id, RUN_HISTORY_LIMIT) {
        Ok(runs) => HttpResponse::Ok().json(ScheduleRunsResponse {
            success: true,
            runs: Some(runs),
            error: None,
        }),
        Err(e) => {
            log::error!("Failed to list runs for schedule {}: {}", id, e);
            HttpResponse::InternalServerError().json(ScheduleRunsResponse {
                success: false,
                runs: None,
                error: Some("Failed to retrieve runs".to_string()),
            })
        }
    }
}
