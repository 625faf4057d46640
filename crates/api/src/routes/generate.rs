//! Case-study generation endpoint

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use casegen_shared::{User, FREE_GENERATION_LIMIT};

use crate::error::{ApiError, ApiResult};
use crate::generation::CaseStudyInput;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub input: CaseStudyInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub id: Uuid,
    pub case_study: String,
    pub social_post: Option<String>,
}

pub async fn generate_case_study(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    request.input.validate().map_err(ApiError::BadRequest)?;

    let user = load_active_user(&state.pool, request.user_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    check_quota(&user)?;

    let case_study = state.llm.generate_case_study(&request.input).await?;

    // The social post is derived from the finished case study; losing it is
    // not worth failing the whole generation.
    let social_post = match state.llm.generate_social_post(&case_study).await {
        Ok(post) => Some(post),
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Social post generation failed");
            None
        }
    };

    let input = &request.input;
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO case_studies
            (user_id, client_type, challenge, solution, result, tone, industry,
             client_quote, ai_output, social_post)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(&input.client_type)
    .bind(&input.challenge)
    .bind(&input.solution)
    .bind(&input.result)
    .bind(&input.tone)
    .bind(&input.industry)
    .bind(&input.client_quote)
    .bind(&case_study)
    .bind(&social_post)
    .fetch_one(&state.pool)
    .await?;

    if !user.is_pro() {
        sqlx::query(
            r#"
            UPDATE users
            SET generation_count = COALESCE(generation_count, 0) + 1,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .execute(&state.pool)
        .await?;
    }

    tracing::info!(
        user_id = %user.id,
        case_study_id = %id,
        is_pro = user.is_pro(),
        "Case study generated"
    );

    Ok(Json(GenerateResponse {
        id,
        case_study,
        social_post,
    }))
}

async fn load_active_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, is_pro, generation_count, stripe_customer_id,
               is_deleted, created_at, updated_at
        FROM users
        WHERE id = $1 AND is_deleted = FALSE
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Pro users are unmetered; free users get `FREE_GENERATION_LIMIT` total.
fn check_quota(user: &User) -> ApiResult<()> {
    if user.is_pro() {
        return Ok(());
    }
    if user.generation_count() >= FREE_GENERATION_LIMIT {
        tracing::debug!(user_id = %user.id, count = user.generation_count(), "Free quota exhausted");
        return Err(ApiError::QuotaExceeded);
    }
    Ok(())
}
