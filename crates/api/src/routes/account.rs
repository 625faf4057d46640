//! Account deletion endpoint
//!
//! Soft delete only. The row is kept so billing history and generated case
//! studies stay referentially intact; webhook reconciliation and generation
//! both exclude deleted rows.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    pub user_id: Uuid,
}

pub async fn delete_account(
    State(state): State<AppState>,
    Json(request): Json<DeleteAccountRequest>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET is_deleted = TRUE, updated_at = NOW()
        WHERE id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(request.user_id)
    .execute(&state.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }

    tracing::info!(user_id = %request.user_id, "Account soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}
