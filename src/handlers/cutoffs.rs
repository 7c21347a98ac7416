use axum::{extract::State, response::IntoResponse, Json};

use crate::auth::AuthContext;
use crate::error::AppError;
use crate::services::CutoffService;
use crate::AppState;

fn service(state: &AppState) -> CutoffService {
    CutoffService::new(state.db.clone(), state.spei.clone())
}

/// On-demand cutoff trigger. Accepts the scheduler's shared secret or an
/// operator key; both arrive as a verified [`AuthContext`].
pub async fn run_cutoff(
    ctx: AuthContext,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let report = service(&state).run(&ctx.actor()).await?;

    Ok(Json(report))
}

pub async fn cutoff_status(
    ctx: AuthContext,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    ctx.require_operator()?;

    let report = service(&state).status().await?;

    Ok(Json(report))
}
