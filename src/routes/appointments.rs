use std::collections::HashMap;

use axum::extract::{Json, Multipart, Query, State};
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Appointment, AppointmentFile, NewAppointment, NewAppointmentFile};
use crate::schema::{appointment_files, appointments};
use crate::state::AppState;
use crate::utils::phone::normalize_phone;

pub const APPOINTMENT_STATUSES: &[&str] = &[
    "pending",
    "confirmed",
    "in_progress",
    "completed",
    "cancelled",
];

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub service_type: String,
    pub vehicle_info: String,
    pub damage_description: String,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub status: String,
    pub staff_notes: Option<String>,
    pub archived: bool,
    pub archived_at: Option<String>,
    pub archived_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<AppointmentFileResponse>,
}

#[derive(Serialize)]
pub struct AppointmentFileResponse {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub public_url: String,
    pub created_at: String,
}

impl From<AppointmentFile> for AppointmentFileResponse {
    fn from(file: AppointmentFile) -> Self {
        Self {
            id: file.id,
            file_name: file.file_name,
            file_type: file.file_type,
            file_size: file.file_size,
            storage_path: file.storage_path,
            public_url: file.public_url,
            created_at: to_iso(file.created_at),
        }
    }
}

pub(crate) fn to_appointment_response(
    appointment: Appointment,
    files: Vec<AppointmentFile>,
) -> AppointmentResponse {
    AppointmentResponse {
        id: appointment.id,
        customer_name: appointment.customer_name,
        customer_phone: appointment.customer_phone,
        customer_email: appointment.customer_email,
        service_type: appointment.service_type,
        vehicle_info: appointment.vehicle_info,
        damage_description: appointment.damage_description,
        appointment_date: appointment.appointment_date,
        appointment_time: appointment.appointment_time,
        status: appointment.status,
        staff_notes: appointment.staff_notes,
        archived: appointment.archived,
        archived_at: appointment.archived_at.map(to_iso),
        archived_by: appointment.archived_by,
        created_at: to_iso(appointment.created_at),
        updated_at: to_iso(appointment.updated_at),
        files: files.into_iter().map(Into::into).collect(),
    }
}

struct PendingUpload {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

struct IntakeFields {
    customer_name: String,
    customer_phone: String,
    customer_email: String,
    service_type: String,
    vehicle_info: String,
    damage_description: String,
    appointment_date: Option<String>,
    appointment_time: Option<String>,
    status: Option<String>,
}

#[derive(Serialize)]
pub struct IntakeResponse {
    pub appointment: AppointmentResponse,
    pub uploaded_files: Vec<AppointmentFileResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upload_errors: Vec<String>,
    pub message: String,
}

async fn read_multipart(
    multipart: &mut Multipart,
    fields: &mut HashMap<String, String>,
    uploads: &mut Vec<PendingUpload>,
) -> AppResult<()> {
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        let msg = format!("invalid multipart data: {err}");
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(msg)
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "upload".to_string());
                let content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    let msg = format!("failed to read file bytes: {err}");
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(msg)
                })?;
                uploads.push(PendingUpload {
                    file_name,
                    content_type,
                    bytes: data.to_vec(),
                });
            }
            Some(other) => {
                let key = other.to_string();
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid form field '{key}': {err}"))
                })?;
                fields.insert(key, value);
            }
            None => continue,
        }
    }
    Ok(())
}

fn non_empty(fields: &HashMap<String, String>, key: &str) -> Option<String> {
    fields
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

fn intake_fields(fields: &HashMap<String, String>) -> IntakeFields {
    IntakeFields {
        customer_name: non_empty(fields, "customer_name").unwrap_or_default(),
        customer_phone: non_empty(fields, "customer_phone").unwrap_or_default(),
        customer_email: non_empty(fields, "customer_email").unwrap_or_default(),
        service_type: non_empty(fields, "service_type").unwrap_or_default(),
        vehicle_info: non_empty(fields, "vehicle_info").unwrap_or_default(),
        damage_description: non_empty(fields, "damage_description").unwrap_or_default(),
        appointment_date: non_empty(fields, "appointment_date"),
        appointment_time: non_empty(fields, "appointment_time"),
        status: non_empty(fields, "status"),
    }
}

/// Storage keys allow only word characters, dots and hyphens; everything
/// else collapses to a hyphen.
fn sanitize_file_name(raw: &str) -> String {
    let mut sanitized = String::with_capacity(raw.len());
    let mut last_was_dash = false;
    for ch in raw.trim().chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
            ch.to_ascii_lowercase()
        } else {
            '-'
        };
        if mapped == '-' {
            if last_was_dash {
                continue;
            }
            last_was_dash = true;
        } else {
            last_was_dash = false;
        }
        sanitized.push(mapped);
    }
    let trimmed = sanitized.trim_matches('-');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

async fn store_file(
    state: &AppState,
    appointment_id: Uuid,
    upload: PendingUpload,
) -> Result<AppointmentFile, String> {
    let sanitized = sanitize_file_name(&upload.file_name);
    let key = format!(
        "{}/{}_{}",
        appointment_id,
        Utc::now().timestamp_millis(),
        sanitized
    );

    let content_type = upload.content_type.clone().or_else(|| {
        mime_guess::from_path(&upload.file_name)
            .first()
            .map(|mime| mime.to_string())
    });
    let file_size = upload.bytes.len() as i64;

    state
        .storage
        .put_object(&key, upload.bytes, content_type.clone())
        .await
        .map_err(|err| format!("{}: {err}", upload.file_name))?;

    let new_file = NewAppointmentFile {
        id: Uuid::new_v4(),
        appointment_id,
        file_name: upload.file_name.clone(),
        file_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        file_size,
        storage_path: key.clone(),
        public_url: state.storage.public_url(&key),
    };

    let mut conn = state
        .db()
        .map_err(|_| format!("{}: database unavailable", upload.file_name))?;
    diesel::insert_into(appointment_files::table)
        .values(&new_file)
        .execute(&mut conn)
        .map_err(|err| format!("{}: {err}", upload.file_name))?;

    appointment_files::table
        .find(new_file.id)
        .first(&mut conn)
        .map_err(|err| format!("{}: {err}", upload.file_name))
}

pub async fn create_appointment(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<IntakeResponse>> {
    let mut fields = HashMap::new();
    let mut uploads = Vec::new();
    read_multipart(&mut multipart, &mut fields, &mut uploads).await?;
    let form = intake_fields(&fields);

    let customer_phone = normalize_phone(&form.customer_phone);

    if form.customer_name.is_empty() || customer_phone.is_empty() || form.service_type.is_empty() {
        return Err(AppError::bad_request(
            "Missing required fields: name, phone, and service type are required",
        ));
    }

    if customer_phone.len() != 10 {
        return Err(AppError::bad_request("Phone number must be 10 digits"));
    }

    let status = form.status.unwrap_or_else(|| "pending".to_string());
    if !APPOINTMENT_STATUSES.contains(&status.as_str()) {
        return Err(AppError::bad_request(format!(
            "invalid appointment status '{status}'"
        )));
    }

    let new_appointment = NewAppointment {
        id: Uuid::new_v4(),
        customer_name: form.customer_name,
        customer_phone,
        customer_email: form.customer_email,
        service_type: form.service_type,
        vehicle_info: form.vehicle_info,
        damage_description: form.damage_description,
        appointment_date: form.appointment_date,
        appointment_time: form.appointment_time,
        status,
    };

    let appointment: Appointment = {
        let mut conn = state.db()?;
        diesel::insert_into(appointments::table)
            .values(&new_appointment)
            .execute(&mut conn)
            .map_err(|err| {
                AppError::internal("Failed to create appointment")
                    .with_details(serde_json::json!(err.to_string()))
            })?;
        appointments::table.find(new_appointment.id).first(&mut conn)?
    };

    info!(appointment_id = %appointment.id, "created appointment");

    // Attachments are best-effort: a failed upload never loses the booking.
    let mut uploaded_files = Vec::new();
    let mut upload_errors = Vec::new();
    for upload in uploads {
        match store_file(&state, appointment.id, upload).await {
            Ok(file) => uploaded_files.push(AppointmentFileResponse::from(file)),
            Err(err) => {
                warn!(appointment_id = %appointment.id, error = %err, "appointment file upload failed");
                upload_errors.push(err);
            }
        }
    }

    Ok(Json(IntakeResponse {
        appointment: to_appointment_response(appointment, Vec::new()),
        uploaded_files,
        upload_errors,
        message: "Appointment created successfully".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct AppointmentListQuery {
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct AppointmentListResponse {
    pub appointments: Vec<AppointmentResponse>,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    Query(params): Query<AppointmentListQuery>,
) -> AppResult<Json<AppointmentListResponse>> {
    let phone = params
        .phone
        .as_deref()
        .map(normalize_phone)
        .filter(|digits| !digits.is_empty())
        .ok_or_else(|| AppError::bad_request("Phone number is required"))?;

    let mut conn = state.db()?;
    let rows: Vec<Appointment> = appointments::table
        .filter(appointments::customer_phone.eq(&phone))
        .order(appointments::created_at.desc())
        .load(&mut conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|appointment| appointment.id).collect();

    // One grouped query for every appointment's files; a read failure
    // degrades to empty lists instead of failing the lookup.
    let mut files_map: HashMap<Uuid, Vec<AppointmentFile>> = HashMap::new();
    match appointment_files::table
        .filter(appointment_files::appointment_id.eq_any(&ids))
        .order(appointment_files::created_at.desc())
        .load::<AppointmentFile>(&mut conn)
    {
        Ok(files) => {
            for file in files {
                files_map.entry(file.appointment_id).or_default().push(file);
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to load appointment files");
        }
    }

    let appointments_with_files = rows
        .into_iter()
        .map(|appointment| {
            let files = files_map.remove(&appointment.id).unwrap_or_default();
            to_appointment_response(appointment, files)
        })
        .collect();

    Ok(Json(AppointmentListResponse {
        appointments: appointments_with_files,
    }))
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub uploaded: usize,
    pub files: Vec<AppointmentFileResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub message: String,
}

pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut fields = HashMap::new();
    let mut uploads = Vec::new();
    read_multipart(&mut multipart, &mut fields, &mut uploads).await?;

    let appointment_id = non_empty(&fields, "appointment_id")
        .ok_or_else(|| AppError::bad_request("Appointment ID is required"))?;
    let appointment_id = Uuid::parse_str(&appointment_id)
        .map_err(|_| AppError::bad_request("appointment_id must be a valid UUID"))?;

    if uploads.is_empty() {
        return Err(AppError::bad_request("No files provided"));
    }

    {
        let mut conn = state.db()?;
        let exists: Option<Uuid> = appointments::table
            .find(appointment_id)
            .select(appointments::id)
            .first(&mut conn)
            .optional()?;
        if exists.is_none() {
            return Err(AppError::not_found("Appointment not found"));
        }
    }

    let total = uploads.len();
    let mut files = Vec::new();
    let mut errors = Vec::new();
    for upload in uploads {
        match store_file(&state, appointment_id, upload).await {
            Ok(file) => files.push(AppointmentFileResponse::from(file)),
            Err(err) => {
                warn!(%appointment_id, error = %err, "file upload failed");
                errors.push(err);
            }
        }
    }

    if files.is_empty() {
        return Err(AppError::internal("All file uploads failed")
            .with_details(serde_json::json!(errors)));
    }

    let message = if errors.is_empty() {
        format!("Successfully uploaded {} file(s)", files.len())
    } else {
        format!(
            "Successfully uploaded {} file(s) ({} failed)",
            files.len(),
            errors.len()
        )
    };
    info!(%appointment_id, uploaded = files.len(), failed = errors.len(), "processed {total} upload(s)");

    Ok(Json(UploadResponse {
        uploaded: files.len(),
        files,
        errors,
        message,
    }))
}

#[derive(Deserialize)]
pub struct ArchiveAppointmentRequest {
    pub appointment_id: Uuid,
    pub archived_by: Option<String>,
}

#[derive(Deserialize)]
pub struct RestoreAppointmentRequest {
    pub appointment_id: Uuid,
}

#[derive(Serialize)]
pub struct ArchiveAppointmentResponse {
    pub appointment: AppointmentResponse,
    pub message: String,
}

pub async fn archive_appointment(
    State(state): State<AppState>,
    Json(payload): Json<ArchiveAppointmentRequest>,
) -> AppResult<Json<ArchiveAppointmentResponse>> {
    let mut conn = state.db()?;
    let archived_by = payload.archived_by.unwrap_or_else(|| "Staff".to_string());

    let updated = diesel::update(appointments::table.find(payload.appointment_id))
        .set((
            appointments::archived.eq(true),
            appointments::archived_at.eq(Some(Utc::now().naive_utc())),
            appointments::archived_by.eq(Some(archived_by)),
            appointments::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .map_err(|err| {
            AppError::internal("Failed to archive appointment")
                .with_details(serde_json::json!(err.to_string()))
        })?;

    if updated == 0 {
        return Err(AppError::not_found("Appointment not found"));
    }

    let appointment: Appointment = appointments::table
        .find(payload.appointment_id)
        .first(&mut conn)?;

    Ok(Json(ArchiveAppointmentResponse {
        appointment: to_appointment_response(appointment, Vec::new()),
        message: "Appointment archived successfully".to_string(),
    }))
}

pub async fn restore_appointment(
    State(state): State<AppState>,
    Json(payload): Json<RestoreAppointmentRequest>,
) -> AppResult<Json<ArchiveAppointmentResponse>> {
    let mut conn = state.db()?;

    let updated = diesel::update(appointments::table.find(payload.appointment_id))
        .set((
            appointments::archived.eq(false),
            appointments::archived_at.eq(None::<NaiveDateTime>),
            appointments::archived_by.eq(None::<String>),
            appointments::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .map_err(|err| {
            AppError::internal("Failed to restore appointment")
                .with_details(serde_json::json!(err.to_string()))
        })?;

    if updated == 0 {
        return Err(AppError::not_found("Appointment not found"));
    }

    let appointment: Appointment = appointments::table
        .find(payload.appointment_id)
        .first(&mut conn)?;

    Ok(Json(ArchiveAppointmentResponse {
        appointment: to_appointment_response(appointment, Vec::new()),
        message: "Appointment restored successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn collapses_unsafe_characters() {
        assert_eq!(
            sanitize_file_name("My Photo (front bumper).JPG"),
            "my-photo-front-bumper.jpg"
        );
    }

    #[test]
    fn falls_back_when_nothing_survives() {
        assert_eq!(sanitize_file_name("???"), "upload");
    }
}
