use axum::extract::{Json, Query, State};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::appointments::to_iso;
use crate::error::{AppError, AppResult};
use crate::models::{AppointmentNote, NewAppointmentNote};
use crate::schema::appointment_notes;
use crate::state::AppState;

#[derive(Serialize)]
pub struct NoteResponse {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub note_text: String,
    pub staff_name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<AppointmentNote> for NoteResponse {
    fn from(note: AppointmentNote) -> Self {
        Self {
            id: note.id,
            appointment_id: note.appointment_id,
            note_text: note.note_text,
            staff_name: note.staff_name,
            created_at: to_iso(note.created_at),
            updated_at: to_iso(note.updated_at),
        }
    }
}

#[derive(Deserialize)]
pub struct NoteListQuery {
    pub appointment_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct NoteListResponse {
    pub notes: Vec<NoteResponse>,
    pub count: usize,
}

pub async fn list_notes(
    State(state): State<AppState>,
    Query(params): Query<NoteListQuery>,
) -> AppResult<Json<NoteListResponse>> {
    let appointment_id = params
        .appointment_id
        .ok_or_else(|| AppError::bad_request("Appointment ID is required"))?;

    let mut conn = state.db()?;
    let notes: Vec<AppointmentNote> = appointment_notes::table
        .filter(appointment_notes::appointment_id.eq(appointment_id))
        .order(appointment_notes::created_at.desc())
        .load(&mut conn)?;

    let notes: Vec<NoteResponse> = notes.into_iter().map(Into::into).collect();
    let count = notes.len();
    Ok(Json(NoteListResponse { notes, count }))
}

#[derive(Deserialize)]
pub struct CreateNoteRequest {
    pub appointment_id: Uuid,
    pub note_text: String,
    pub staff_name: String,
}

#[derive(Serialize)]
pub struct NoteMutationResponse {
    pub note: NoteResponse,
    pub message: String,
}

pub async fn create_note(
    State(state): State<AppState>,
    Json(payload): Json<CreateNoteRequest>,
) -> AppResult<Json<NoteMutationResponse>> {
    let note_text = payload.note_text.trim();
    if note_text.is_empty() {
        return Err(AppError::bad_request("Note text cannot be empty"));
    }
    let staff_name = payload.staff_name.trim();
    if staff_name.is_empty() {
        return Err(AppError::bad_request("Staff name is required"));
    }

    let new_note = NewAppointmentNote {
        id: Uuid::new_v4(),
        appointment_id: payload.appointment_id,
        note_text: note_text.to_string(),
        staff_name: staff_name.to_string(),
    };

    let mut conn = state.db()?;
    diesel::insert_into(appointment_notes::table)
        .values(&new_note)
        .execute(&mut conn)
        .map_err(|err| {
            AppError::internal("Failed to create note")
                .with_details(serde_json::json!(err.to_string()))
        })?;

    let note: AppointmentNote = appointment_notes::table.find(new_note.id).first(&mut conn)?;

    Ok(Json(NoteMutationResponse {
        note: note.into(),
        message: "Note added successfully".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct UpdateNoteRequest {
    pub note_id: Uuid,
    pub note_text: String,
}

pub async fn update_note(
    State(state): State<AppState>,
    Json(payload): Json<UpdateNoteRequest>,
) -> AppResult<Json<NoteMutationResponse>> {
    let note_text = payload.note_text.trim();
    if note_text.is_empty() {
        return Err(AppError::bad_request("Note text cannot be empty"));
    }

    let mut conn = state.db()?;
    let updated = diesel::update(appointment_notes::table.find(payload.note_id))
        .set((
            appointment_notes::note_text.eq(note_text),
            appointment_notes::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .map_err(|err| {
            AppError::internal("Failed to update note")
                .with_details(serde_json::json!(err.to_string()))
        })?;

    if updated == 0 {
        return Err(AppError::not_found("Note not found"));
    }

    let note: AppointmentNote = appointment_notes::table
        .find(payload.note_id)
        .first(&mut conn)?;

    Ok(Json(NoteMutationResponse {
        note: note.into(),
        message: "Note updated successfully".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct DeleteNoteQuery {
    pub note_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct DeleteNoteResponse {
    pub message: String,
}

pub async fn delete_note(
    State(state): State<AppState>,
    Query(params): Query<DeleteNoteQuery>,
) -> AppResult<Json<DeleteNoteResponse>> {
    let note_id = params
        .note_id
        .ok_or_else(|| AppError::bad_request("Note ID is required"))?;

    let mut conn = state.db()?;
    let deleted = diesel::delete(appointment_notes::table.find(note_id))
        .execute(&mut conn)
        .map_err(|err| {
            AppError::internal("Failed to delete note")
                .with_details(serde_json::json!(err.to_string()))
        })?;

    if deleted == 0 {
        return Err(AppError::not_found("Note not found"));
    }

    Ok(Json(DeleteNoteResponse {
        message: "Note deleted successfully".to_string(),
    }))
}
