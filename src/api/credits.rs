//! Credit balance and issuance endpoints

use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use super::{
    AppState,
    error::ApiResult,
    extract::{ApiJson, ApiPath, ApiQuery},
};
use crate::{
    core::credit,
    entities::{CreditGroup, credit_balance, credit_transaction},
};

/// Remaining credits in one group
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Credit group
    pub credit_group: String,
    /// Credits left
    pub remaining_credits: i64,
    /// Credits issued over the lifetime of the balance
    pub total_issued: i64,
}

impl From<credit_balance::Model> for BalanceResponse {
    fn from(model: credit_balance::Model) -> Self {
        Self {
            credit_group: model.credit_group,
            remaining_credits: model.remaining_credits,
            total_issued: model.total_issued,
        }
    }
}

/// Whether a credit request is a purchase or an operator correction
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditRequestKind {
    /// Purchased or granted credits; `amount` must be positive
    #[default]
    Issue,
    /// Signed manual adjustment
    Adjust,
}

/// Body of `POST /users/:id/credits`
#[derive(Debug, Deserialize)]
pub struct CreditRequest {
    /// Group to change
    pub credit_group: CreditGroup,
    /// Credits to issue, or the signed adjustment
    pub amount: i64,
    /// Issue or adjust
    #[serde(default)]
    pub kind: CreditRequestKind,
    /// Free-form note stored on the ledger entry
    #[serde(default)]
    pub note: Option<String>,
}

/// `?group` filter
#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    /// Restrict to one credit group
    pub group: Option<CreditGroup>,
}

/// Balances of a user, one row per group that has ever held credit
pub async fn get_balances(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
) -> ApiResult<Json<Vec<BalanceResponse>>> {
    let balances = credit::balances_for_user(&state.db, &user_id).await?;
    Ok(Json(balances.into_iter().map(Into::into).collect()))
}

/// Issue or adjust credits
pub async fn post_credits(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
    ApiJson(request): ApiJson<CreditRequest>,
) -> ApiResult<(StatusCode, Json<credit_transaction::Model>)> {
    let entry = match request.kind {
        CreditRequestKind::Issue => {
            credit::issue_credits(
                &state.db,
                &user_id,
                request.credit_group,
                request.amount,
                request.note,
            )
            .await?
        }
        CreditRequestKind::Adjust => {
            credit::adjust_credits(
                &state.db,
                &user_id,
                request.credit_group,
                request.amount,
                request.note,
            )
            .await?
        }
    };
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Ledger history of a user, newest first
pub async fn get_transactions(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<GroupQuery>,
) -> ApiResult<Json<Vec<credit_transaction::Model>>> {
    let entries = credit::transactions_for_user(&state.db, &user_id, query.group).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use crate::api::{AppState, create_router, test_support::send};
    use crate::{errors::Result, test_utils::*};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_issue_adjust_and_read_back() -> Result<()> {
        let db = setup_test_db().await?;
        let router = create_router(AppState {
            db,
            clock: test_clock(),
        });

        let (status, entry) = send(
            &router,
            "POST",
            "/users/alice/credits",
            Some(json!({"credit_group": "group", "amount": 5, "note": "5-pack"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(entry["reason"], "issue");

        let (status, _) = send(
            &router,
            "POST",
            "/users/alice/credits",
            Some(json!({"credit_group": "group", "amount": -2, "kind": "adjust"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, balances) = send(&router, "GET", "/users/alice/credits", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            balances,
            json!([{"credit_group": "group", "remaining_credits": 3, "total_issued": 5}])
        );

        let (status, history) =
            send(&router, "GET", "/users/alice/credits/transactions?group=group", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().map(Vec::len), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_credit_requests() -> Result<()> {
        let db = setup_test_db().await?;
        let router = create_router(AppState {
            db,
            clock: test_clock(),
        });

        let (status, body) = send(
            &router,
            "POST",
            "/users/bob/credits",
            Some(json!({"credit_group": "none", "amount": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let (status, body) = send(
            &router,
            "POST",
            "/users/bob/credits",
            Some(json!({"credit_group": "private", "amount": -1, "kind": "adjust"})),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"], "insufficient_credit");

        let (status, balances) = send(&router, "GET", "/users/bob/credits", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(balances, json!([]));
        Ok(())
    }
}
