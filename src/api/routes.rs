//! API Routes
//!
//! HTTP endpoint definitions.
//!
//! Movement endpoints accept amounts as decimal strings and answer with the
//! engine's receipt. Field presence and id shape are validated here, and
//! extractor rejections are folded into the same error body, so a malformed
//! request is always a 400 in the standard shape and never touches the store.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::accounts::{AccountDetails, AccountService};
use crate::domain::{AccountRecord, LedgerEntry};
use crate::engine::{MovementReceipt, TransactionEngine};
use crate::error::AppError;
use crate::store::PgLedgerStore;

/// Shared application state: the engine and the query surface, both over the
/// Postgres store. Built once at startup and cloned per request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: TransactionEngine<PgLedgerStore>,
    pub accounts: AccountService<PgLedgerStore>,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let store = PgLedgerStore::new(pool);
        Self {
            engine: TransactionEngine::new(store.clone()),
            accounts: AccountService::new(store),
        }
    }
}

// =========================================================================
// Request types
// =========================================================================

// Required fields are Options so a missing field is reported as a 400 with
// the field name, not a serde rejection.

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "type")]
    pub account_type: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    #[serde(default)]
    pub source_account_id: Option<String>,
    #[serde(default)]
    pub destination_account_id: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

fn require_field<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, AppError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::InvalidRequest(format!("Missing required field: {}", field)))
}

fn require_uuid(value: Option<&str>, field: &str) -> Result<Uuid, AppError> {
    require_field(value, field)?
        .parse()
        .map_err(|_| AppError::InvalidRequest(format!("Invalid {}", field)))
}

fn path_uuid(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::InvalidRequest("Invalid account id".to_string()))
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/accounts", post(create_account))
        .route("/accounts/:id", get(get_account))
        .route("/accounts/:id/ledger", get(get_ledger))
        // Movements
        .route("/transfers", post(transfer))
        .route("/deposits", post(deposit))
        .route("/withdrawals", post(withdraw))
        // Health check
        .route("/health", get(health_check))
}

// =========================================================================
// POST /accounts
// =========================================================================

/// Create a new account
async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountRecord>), AppError> {
    let Json(request) = payload?;
    let user_id = require_uuid(request.user_id.as_deref(), "user_id")?;
    let account_type = require_field(request.account_type.as_deref(), "type")?.to_string();
    let currency = require_field(request.currency.as_deref(), "currency")?.to_string();

    if currency.chars().count() != 3 {
        return Err(AppError::InvalidRequest("Invalid currency code".to_string()));
    }

    let account = state.accounts.create(user_id, account_type, currency).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

// =========================================================================
// GET /accounts/:id
// =========================================================================

/// Get account attributes plus current balance
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountDetails>, AppError> {
    let details = state.accounts.get(path_uuid(&id)?).await?;
    Ok(Json(details))
}

// =========================================================================
// GET /accounts/:id/ledger
// =========================================================================

/// Get the account's full entry history, most recent first
async fn get_ledger(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LedgerEntry>>, AppError> {
    let entries = state.accounts.ledger(path_uuid(&id)?).await?;
    Ok(Json(entries))
}

// =========================================================================
// POST /transfers
// =========================================================================

/// Move funds between two accounts
async fn transfer(
    State(state): State<AppState>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<MovementReceipt>, AppError> {
    let Json(request) = payload?;
    let source = require_uuid(request.source_account_id.as_deref(), "source_account_id")?;
    let destination = require_uuid(
        request.destination_account_id.as_deref(),
        "destination_account_id",
    )?;
    let amount = require_field(request.amount.as_deref(), "amount")?;
    let description = request
        .description
        .unwrap_or_else(|| "Transfer".to_string());

    let receipt = state
        .engine
        .transfer(source, destination, amount, &description)
        .await?;

    Ok(Json(receipt))
}

// =========================================================================
// POST /deposits
// =========================================================================

/// Credit funds into an account
async fn deposit(
    State(state): State<AppState>,
    payload: Result<Json<DepositRequest>, JsonRejection>,
) -> Result<Json<MovementReceipt>, AppError> {
    let Json(request) = payload?;
    let account_id = require_uuid(request.account_id.as_deref(), "account_id")?;
    let amount = require_field(request.amount.as_deref(), "amount")?;
    let description = request.description.unwrap_or_else(|| "Deposit".to_string());

    let receipt = state.engine.deposit(account_id, amount, &description).await?;

    Ok(Json(receipt))
}

// =========================================================================
// POST /withdrawals
// =========================================================================

/// Debit funds out of an account
async fn withdraw(
    State(state): State<AppState>,
    payload: Result<Json<WithdrawalRequest>, JsonRejection>,
) -> Result<Json<MovementReceipt>, AppError> {
    let Json(request) = payload?;
    let account_id = require_uuid(request.account_id.as_deref(), "account_id")?;
    let amount = require_field(request.amount.as_deref(), "amount")?;
    let description = request
        .description
        .unwrap_or_else(|| "Withdrawal".to_string());

    let receipt = state
        .engine
        .withdraw(account_id, amount, &description)
        .await?;

    Ok(Json(receipt))
}

// =========================================================================
// GET /health
// =========================================================================

/// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Financial Ledger API is operational"
    }))
}
