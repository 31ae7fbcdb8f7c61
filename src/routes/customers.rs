use axum::extract::{Json, State};
use axum::http::StatusCode;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::appointments::to_iso;
use crate::error::{AppError, AppResult};
use crate::models::{CustomerAccount, NewCustomerAccount};
use crate::schema::customer_accounts;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub auth_user_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct CustomerAccountResponse {
    pub id: Uuid,
    pub auth_user_id: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CustomerAccount> for CustomerAccountResponse {
    fn from(account: CustomerAccount) -> Self {
        Self {
            id: account.id,
            auth_user_id: account.auth_user_id,
            email: account.email,
            full_name: account.full_name,
            phone: account.phone,
            is_active: account.is_active,
            email_verified: account.email_verified,
            created_at: to_iso(account.created_at),
            updated_at: to_iso(account.updated_at),
        }
    }
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub customer: CustomerAccountResponse,
}

fn required_field(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("Missing required field: {name}")))
}

/// Links an externally authenticated identity to a portal account row. The
/// unique key on auth_user_id makes duplicate registration a clean conflict
/// instead of a read-then-write race.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let auth_user_id = required_field(payload.auth_user_id, "auth_user_id")?;
    let email = required_field(payload.email, "email")?;
    let full_name = required_field(payload.full_name, "full_name")?;
    let phone = required_field(payload.phone, "phone")?;

    let new_account = NewCustomerAccount {
        id: Uuid::new_v4(),
        auth_user_id,
        email,
        full_name,
        phone,
        is_active: true,
        email_verified: false,
    };

    let mut conn = state.db()?;
    match diesel::insert_into(customer_accounts::table)
        .values(&new_account)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("Customer account already exists"));
        }
        Err(err) => {
            return Err(AppError::internal("Failed to create customer account")
                .with_details(serde_json::json!(err.to_string())));
        }
    }

    let account: CustomerAccount = customer_accounts::table
        .find(new_account.id)
        .first(&mut conn)?;
    info!(account_id = %account.id, "registered customer account");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            customer: account.into(),
        }),
    ))
}
