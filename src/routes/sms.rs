use axum::extract::{Json, Query, State};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::appointments::to_iso;
use crate::error::{AppError, AppResult};
use crate::models::{NewSmsLog, SmsLog};
use crate::schema::{sms_logs, sms_preferences};
use crate::sms::format_e164;
use crate::state::AppState;
use crate::utils::phone::normalize_phone;

const DEFAULT_LOG_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    StaffNotification,
    CustomerUpdate,
    Manual,
}

impl MessageType {
    fn as_str(self) -> &'static str {
        match self {
            MessageType::StaffNotification => "staff_notification",
            MessageType::CustomerUpdate => "customer_update",
            MessageType::Manual => "manual",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    pub to: String,
    pub message: String,
    pub message_type: MessageType,
    pub related_appointment_id: Option<Uuid>,
    pub related_ro_id: Option<Uuid>,
    pub sent_by: Option<String>,
}

#[derive(Serialize)]
pub struct SendSmsResponse {
    pub message: String,
    pub provider_sid: String,
}

struct LogEntry<'a> {
    to: &'a str,
    from: &'a str,
    body: &'a str,
    message_type: MessageType,
    status: &'a str,
    provider_sid: Option<String>,
    error_message: Option<String>,
}

/// Writes the delivery outcome. Logging never fails the send itself.
fn log_sms(state: &AppState, request: &SendSmsRequest, entry: LogEntry<'_>) {
    let new_log = NewSmsLog {
        id: Uuid::new_v4(),
        to_phone: entry.to.to_string(),
        from_phone: entry.from.to_string(),
        message_body: entry.body.to_string(),
        message_type: entry.message_type.as_str().to_string(),
        status: entry.status.to_string(),
        provider_sid: entry.provider_sid,
        error_message: entry.error_message,
        related_appointment_id: request.related_appointment_id,
        related_ro_id: request.related_ro_id,
        sent_by: request.sent_by.clone(),
    };

    let insert = state.db().and_then(|mut conn| {
        diesel::insert_into(sms_logs::table)
            .values(&new_log)
            .execute(&mut conn)
            .map_err(AppError::from)
    });
    if let Err(err) = insert {
        warn!(to = entry.to, "failed to write SMS log: {err:?}");
    }
}

/// Opt-out lookup for customer-facing messages. Missing rows and lookup
/// errors both default to opted-in.
fn opted_in(state: &AppState, phone: &str) -> bool {
    let digits = normalize_phone(phone);
    let result = state.db().and_then(|mut conn| {
        sms_preferences::table
            .find(&digits)
            .select(sms_preferences::opted_in)
            .first::<bool>(&mut conn)
            .optional()
            .map_err(AppError::from)
    });

    match result {
        Ok(preference) => preference.unwrap_or(true),
        Err(err) => {
            warn!(phone = %digits, "SMS preference lookup failed: {err:?}");
            true
        }
    }
}

pub async fn send_sms(
    State(state): State<AppState>,
    Json(payload): Json<SendSmsRequest>,
) -> AppResult<Json<SendSmsResponse>> {
    if payload.to.trim().is_empty() || payload.message.trim().is_empty() {
        return Err(AppError::bad_request("Phone number and message are required"));
    }

    let sender = state.sms.clone().ok_or_else(|| {
        AppError::internal(
            "SMS service not configured. Please add Twilio credentials to environment variables.",
        )
    })?;

    if payload.message_type == MessageType::CustomerUpdate && !opted_in(&state, &payload.to) {
        log_sms(
            &state,
            &payload,
            LogEntry {
                to: &payload.to,
                from: &sender.from_phone,
                body: &payload.message,
                message_type: payload.message_type,
                status: "failed",
                provider_sid: None,
                error_message: Some("Customer opted out".to_string()),
            },
        );
        return Err(AppError::bad_request(
            "Customer has opted out of SMS notifications",
        ));
    }

    let to = format_e164(&payload.to);
    match sender
        .gateway
        .send(&to, &sender.from_phone, &payload.message)
        .await
    {
        Ok(delivery) => {
            info!(to = %to, sid = %delivery.provider_sid, "sent SMS");
            log_sms(
                &state,
                &payload,
                LogEntry {
                    to: &payload.to,
                    from: &sender.from_phone,
                    body: &payload.message,
                    message_type: payload.message_type,
                    status: "sent",
                    provider_sid: Some(delivery.provider_sid.clone()),
                    error_message: None,
                },
            );
            Ok(Json(SendSmsResponse {
                message: "SMS sent successfully".to_string(),
                provider_sid: delivery.provider_sid,
            }))
        }
        Err(err) => {
            warn!(to = %to, error = %err, "SMS send failed");
            log_sms(
                &state,
                &payload,
                LogEntry {
                    to: &payload.to,
                    from: &sender.from_phone,
                    body: &payload.message,
                    message_type: payload.message_type,
                    status: "failed",
                    provider_sid: None,
                    error_message: Some(err.to_string()),
                },
            );
            Err(AppError::internal(err))
        }
    }
}

#[derive(Deserialize)]
pub struct SmsLogQuery {
    pub appointment_id: Option<Uuid>,
    pub ro_id: Option<Uuid>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct SmsLogResponse {
    pub id: Uuid,
    pub to_phone: String,
    pub from_phone: String,
    pub message_body: String,
    pub message_type: String,
    pub status: String,
    pub provider_sid: Option<String>,
    pub error_message: Option<String>,
    pub related_appointment_id: Option<Uuid>,
    pub related_ro_id: Option<Uuid>,
    pub sent_by: Option<String>,
    pub created_at: String,
}

impl From<SmsLog> for SmsLogResponse {
    fn from(log: SmsLog) -> Self {
        Self {
            id: log.id,
            to_phone: log.to_phone,
            from_phone: log.from_phone,
            message_body: log.message_body,
            message_type: log.message_type,
            status: log.status,
            provider_sid: log.provider_sid,
            error_message: log.error_message,
            related_appointment_id: log.related_appointment_id,
            related_ro_id: log.related_ro_id,
            sent_by: log.sent_by,
            created_at: to_iso(log.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct SmsLogListResponse {
    pub logs: Vec<SmsLogResponse>,
}

pub async fn list_sms_logs(
    State(state): State<AppState>,
    Query(params): Query<SmsLogQuery>,
) -> AppResult<Json<SmsLogListResponse>> {
    let mut conn = state.db()?;

    let mut query = sms_logs::table.into_boxed();
    if let Some(appointment_id) = params.appointment_id {
        query = query.filter(sms_logs::related_appointment_id.eq(appointment_id));
    }
    if let Some(ro_id) = params.ro_id {
        query = query.filter(sms_logs::related_ro_id.eq(ro_id));
    }

    let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, 500);
    let logs: Vec<SmsLog> = query
        .order(sms_logs::created_at.desc())
        .limit(limit)
        .load(&mut conn)?;

    Ok(Json(SmsLogListResponse {
        logs: logs.into_iter().map(Into::into).collect(),
    }))
}
