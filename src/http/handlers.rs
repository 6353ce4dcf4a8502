use super::AppState;
use crate::ledger::Ledger;
use crate::validation;
use crate::Error;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    #[serde(default)]
    pub spender: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub password: Option<SecretString>,
}

#[derive(Debug, Serialize)]
pub struct AllowanceResponse {
    pub owner: String,
    pub spender: String,
    pub allowance: String,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: String,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse<R> {
    pub spender: String,
    pub value: Value,
    pub message: &'static str,
    pub receipt: R,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

fn reject(status: StatusCode, error: &str, reason: Option<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            reason,
        }),
    )
        .into_response()
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput(_) | Error::Conversion(_) => StatusCode::BAD_REQUEST,
        Error::GasEstimation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(context: &str, err: Error) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, retryable = err.is_retryable(), "{}", context);
    } else {
        tracing::warn!(error = %err, "{}", context);
    }
    reject(status, context, Some(err.to_string()))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

pub async fn get_allowance<L: Ledger + 'static>(
    State(state): State<AppState<L>>,
    Path((owner, spender)): Path<(String, String)>,
) -> Response {
    if !state.accepts_address(&owner) {
        return reject(StatusCode::BAD_REQUEST, "Invalid owner address", None);
    }
    if !state.accepts_address(&spender) {
        return reject(StatusCode::BAD_REQUEST, "Invalid spender address", None);
    }

    match state.queries.allowance_of(&owner, &spender).await {
        Ok(allowance) => Json(AllowanceResponse {
            owner,
            spender,
            allowance,
            message: "Allowance fetched successfully",
        })
        .into_response(),
        Err(e) => failure("Error fetching allowance", e),
    }
}

pub async fn get_balance<L: Ledger + 'static>(
    State(state): State<AppState<L>>,
    Path(address): Path<String>,
) -> Response {
    if !state.accepts_address(&address) {
        return reject(StatusCode::BAD_REQUEST, "Invalid address", None);
    }

    match state.queries.balance_of(&address).await {
        Ok(balance) => Json(BalanceResponse {
            address,
            balance,
            message: "Balance fetched successfully",
        })
        .into_response(),
        Err(e) => failure("Error fetching Balance", e),
    }
}

pub async fn set_approve<L: Ledger + 'static>(
    State(state): State<AppState<L>>,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return reject(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                Some(rejection.body_text()),
            )
        }
    };

    let spender = match request.spender {
        Some(spender) if state.accepts_address(&spender) => spender,
        _ => return reject(StatusCode::BAD_REQUEST, "Invalid spender address", None),
    };
    let value = match request.value {
        Some(value) if validation::is_valid_value(&value) => value,
        _ => return reject(StatusCode::BAD_REQUEST, "Invalid value", None),
    };
    let password = match request.password {
        Some(password) if !password.expose_secret().is_empty() => password,
        _ => return reject(StatusCode::BAD_REQUEST, "Missing password", None),
    };

    match state.approvals.approve(&spender, &value, password).await {
        Ok(receipt) => Json(ApproveResponse {
            spender,
            value,
            message: "Approval success",
            receipt,
        })
        .into_response(),
        Err(e) => failure("Error approving", e),
    }
}
