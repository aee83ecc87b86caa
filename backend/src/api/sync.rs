use crate::models::{AdminToken, ErrorResponse, RunReport};
use crate::services::schema::SheetCatalog;
use crate::AppState;
use log::info;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, State};

type ApiError = (Status, Json<ErrorResponse>);

fn api_error(status: Status, error: &str, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
}

#[post("/run")]
pub async fn trigger_sync(
    _token: AdminToken,
    state: &State<AppState>,
) -> Result<Json<RunReport>, ApiError> {
    info!("Manual sync requested");
    match state.runner.trigger().await {
        Some(report) => Ok(Json(report)),
        None => Err(api_error(
            Status::Conflict,
            "sync_in_progress",
            "A sync run is already in progress",
        )),
    }
}

#[get("/status")]
pub async fn sync_status(state: &State<AppState>) -> Json<Option<RunReport>> {
    Json(state.runner.last_report().await)
}

#[get("/tables")]
pub fn declared_tables(state: &State<AppState>) -> Json<SheetCatalog> {
    Json(state.runner.catalog().clone())
}
