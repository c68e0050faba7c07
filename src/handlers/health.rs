use crate::database::DbPool;
use crate::error::AppError;
use crate::models::ApiResponse;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service and database are reachable", body = HealthStatus),
        (status = 500, description = "Database ping failed")
    )
)]
pub async fn health(pool: web::Data<DbPool>) -> Result<HttpResponse> {
    match pool.ping().await {
        Ok(()) => Ok(HttpResponse::Ok().json(ApiResponse::success(HealthStatus {
            status: "ok".into(),
            database: "up".into(),
        }))),
        Err(e) => Ok(AppError::DatabaseError(e).error_response()),
    }
}

pub fn health_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
