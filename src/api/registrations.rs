//! Registration booking and status endpoints

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use super::{
    AppState,
    error::ApiResult,
    extract::{ApiJson, ApiPath},
};
use crate::{
    core::{
        registration::{self, NewRegistration},
        status::{self, StatusChange, StatusTransitionOutcome},
    },
    entities::registration as registration_entity,
    errors::Error,
};

/// Book an occurrence
pub async fn create_registration(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewRegistration>,
) -> ApiResult<(StatusCode, Json<registration_entity::Model>)> {
    let created = registration::create_registration(&state.db, &state.clock, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get a registration by ID
pub async fn get_registration(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<registration_entity::Model>> {
    let found = registration::get_registration(&state.db, id)
        .await?
        .ok_or_else(|| Error::not_found("registration", id))?;
    Ok(Json(found))
}

/// Cancel or reactivate a registration
pub async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(change): ApiJson<StatusChange>,
) -> ApiResult<Json<StatusTransitionOutcome>> {
    let outcome = status::apply_status_change(&state.db, id, change).await?;
    Ok(Json(outcome))
}

/// Describe a status change without applying it
pub async fn preview_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(change): ApiJson<StatusChange>,
) -> ApiResult<Json<StatusTransitionOutcome>> {
    let outcome = status::preview_status_change(&state.db, id, change).await?;
    Ok(Json(outcome))
}

/// All registrations of a user
pub async fn list_user_registrations(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
) -> ApiResult<Json<Vec<registration_entity::Model>>> {
    let found = registration::registrations_for_user(&state.db, &user_id).await?;
    Ok(Json(found))
}

#[cfg(test)]
mod tests {
    use crate::api::{AppState, create_router, test_support::send};
    use crate::entities::CreditGroup;
    use crate::{errors::Result, test_utils::*};
    use axum::http::StatusCode;
    use chrono::Weekday;
    use serde_json::json;

    #[tokio::test]
    async fn test_booking_flow_over_http() -> Result<()> {
        init_test_tracing();
        let (db, session) = setup_with_session(&[Weekday::Mon], 1).await?;
        issue_test_credits(&db, "alice", CreditGroup::Group, 1).await?;
        let router = create_router(AppState {
            db,
            clock: test_clock(),
        });

        let (status, created) = send(
            &router,
            "POST",
            "/registrations",
            Some(json!({
                "user_id": "alice",
                "session_id": session.id,
                "date": "2026-10-26",
                "time": "09:00:00",
                "used_credit": true,
                "credit_group": "group"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "active");
        assert_eq!(created["used_credit"], true);
        let id = created["id"].as_i64().unwrap_or_default();

        let (status, full) = send(
            &router,
            "POST",
            "/registrations",
            Some(json!({
                "user_id": "bob",
                "session_id": session.id,
                "date": "2026-10-26",
                "time": "09:00:00"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(full["error"], "slot_full");

        let (status, fetched) = send(&router, "GET", &format!("/registrations/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["user_id"], "alice");

        let (status, listed) = send(&router, "GET", "/users/alice/registrations", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejections_map_to_status_codes() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon], 2).await?;
        let router = create_router(AppState {
            db,
            clock: test_clock(),
        });

        let (status, body) = send(
            &router,
            "POST",
            "/registrations",
            Some(json!({
                "user_id": "alice",
                "session_id": session.id,
                "date": "2026-10-27",
                "time": "09:00:00"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_slot");

        let (status, body) = send(
            &router,
            "POST",
            "/registrations",
            Some(json!({
                "user_id": "alice",
                "session_id": session.id,
                "date": "2026-10-26",
                "time": "09:00:00",
                "used_credit": true,
                "credit_group": "private"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"], "insufficient_credit");

        let (status, _) = send(&router, "GET", "/registrations/404", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_status_patch_and_preview() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon], 2).await?;
        issue_test_credits(&db, "carol", CreditGroup::Group, 2).await?;
        let paid = book_with_credit(&db, &test_clock(), &session, "carol", date(2026, 10, 26)).await?;
        let router = create_router(AppState {
            db,
            clock: test_clock(),
        });

        let preview_uri = format!("/registrations/{}/status/preview", paid.id);
        let (status, preview) = send(
            &router,
            "POST",
            &preview_uri,
            Some(json!({"status": "cancelled"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview["credit_effect"]["type"], "consumed");
        assert_eq!(preview["registration"]["status"], "active");

        let uri = format!("/registrations/{}/status", paid.id);
        let (status, applied) = send(
            &router,
            "PATCH",
            &uri,
            Some(json!({"status": "cancelled", "return_credit": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(applied["registration"]["status"], "cancelled");
        assert_eq!(
            applied["summary"],
            "Registration cancelled; 1 group credit returned to carol."
        );

        let (status, again) = send(
            &router,
            "PATCH",
            &uri,
            Some(json!({"status": "cancelled"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(again["error"], "validation_error");
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_requests_are_validation_errors() -> Result<()> {
        let (db, session) = setup_with_session(&[Weekday::Mon], 2).await?;
        let booked = book(&db, &test_clock(), &session, "dave", date(2026, 10, 26)).await?;
        let router = create_router(AppState {
            db,
            clock: test_clock(),
        });

        let (status, body) = send(
            &router,
            "POST",
            "/registrations",
            Some(json!({
                "session_id": session.id,
                "date": "2026-10-26",
                "time": "09:00:00"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().is_some_and(|m| m.contains("user_id")));

        let uri = format!("/registrations/{}/status", booked.id);
        let (status, body) = send(&router, "PATCH", &uri, Some(json!({"status": "pending"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let (status, body) = send(&router, "GET", "/registrations/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        Ok(())
    }
}
