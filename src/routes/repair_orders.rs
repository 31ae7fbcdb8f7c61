use std::collections::HashMap;

use axum::extract::{Json, Path, Query, State};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use super::appointments::to_iso;
use crate::error::{AppError, AppResult};
use crate::models::{
    Appointment, AppointmentFile, Customer, NewRepairOrderDocument, NewRepairOrderEdit,
    NewRepairOrderPart, RepairCase, RepairOrder, RepairOrderPart, Vehicle,
};
use crate::orders::{
    self, CustomerInput, OrderDraft, OrderError, VehicleInput, DEFAULT_RO_PRIORITY, RO_PRIORITIES,
    RO_STATUSES,
};
use crate::schema::{
    appointment_files, appointments, customers, repair_cases, repair_order_documents,
    repair_order_edits, repair_order_parts, repair_orders, vehicles,
};
use crate::state::AppState;
use crate::utils::phone::normalize_phone;

const CONVERSION_PLACEHOLDER_DESCRIPTION: &str = "Appointment conversion - details pending";

#[derive(Serialize, Clone)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub insurance_company: Option<String>,
    pub policy_number: Option<String>,
    pub insurance_claim_number: Option<String>,
    pub insurance_adjuster_name: Option<String>,
    pub insurance_adjuster_phone: Option<String>,
    pub insurance_adjuster_email: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            first_name: customer.first_name,
            last_name: customer.last_name,
            phone: customer.phone,
            email: customer.email,
            address: customer.address,
            insurance_company: customer.insurance_company,
            policy_number: customer.policy_number,
            insurance_claim_number: customer.insurance_claim_number,
            insurance_adjuster_name: customer.insurance_adjuster_name,
            insurance_adjuster_phone: customer.insurance_adjuster_phone,
            insurance_adjuster_email: customer.insurance_adjuster_email,
            created_at: to_iso(customer.created_at),
            updated_at: to_iso(customer.updated_at),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct VehicleResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub year: String,
    pub make: String,
    pub model: String,
    pub vin: String,
    pub color: String,
    pub license_plate: Option<String>,
    pub mileage: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.id,
            customer_id: vehicle.customer_id,
            year: vehicle.year,
            make: vehicle.make,
            model: vehicle.model,
            vin: vehicle.vin,
            color: vehicle.color,
            license_plate: vehicle.license_plate,
            mileage: vehicle.mileage,
            created_at: to_iso(vehicle.created_at),
            updated_at: to_iso(vehicle.updated_at),
        }
    }
}

#[derive(Serialize, Clone)]
pub struct PartResponse {
    pub id: Uuid,
    pub part_name: String,
    pub part_number: Option<String>,
    pub quantity: i32,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl From<RepairOrderPart> for PartResponse {
    fn from(part: RepairOrderPart) -> Self {
        Self {
            id: part.id,
            part_name: part.part_name,
            part_number: part.part_number,
            quantity: part.quantity,
            estimated_cost: part.estimated_cost,
            notes: part.notes,
            status: part.status,
            created_at: to_iso(part.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct RepairOrderResponse {
    pub id: Uuid,
    pub ro_number: String,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub source_appointment_id: Option<Uuid>,
    pub source_repair_case_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub date_received: String,
    pub damage_description: String,
    pub customer_first_name: String,
    pub customer_last_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub vehicle_year: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_vin: String,
    pub insurance_carrier: Option<String>,
    pub insurance_claim_number: Option<String>,
    pub insurance_contact_name: Option<String>,
    pub insurance_contact_phone: Option<String>,
    pub insurance_contact_email: Option<String>,
    pub estimated_total_cost: Option<f64>,
    pub final_total_cost: Option<f64>,
    pub estimated_duration_days: Option<i32>,
    pub planned_start_date: Option<String>,
    pub planned_completion_date: Option<String>,
    pub estimated_completion: Option<String>,
    pub archived: bool,
    pub archived_at: Option<String>,
    pub archived_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehicleResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<PartResponse>,
}

fn to_repair_order_response(
    order: RepairOrder,
    customer: Option<CustomerResponse>,
    vehicle: Option<VehicleResponse>,
    parts: Vec<PartResponse>,
) -> RepairOrderResponse {
    RepairOrderResponse {
        id: order.id,
        ro_number: order.ro_number,
        customer_id: order.customer_id,
        vehicle_id: order.vehicle_id,
        source_appointment_id: order.source_appointment_id,
        source_repair_case_id: order.source_repair_case_id,
        status: order.status,
        priority: order.priority,
        date_received: to_iso(order.date_received),
        damage_description: order.damage_description,
        customer_first_name: order.customer_first_name,
        customer_last_name: order.customer_last_name,
        customer_phone: order.customer_phone,
        customer_email: order.customer_email,
        customer_address: order.customer_address,
        vehicle_year: order.vehicle_year,
        vehicle_make: order.vehicle_make,
        vehicle_model: order.vehicle_model,
        vehicle_vin: order.vehicle_vin,
        insurance_carrier: order.insurance_carrier,
        insurance_claim_number: order.insurance_claim_number,
        insurance_contact_name: order.insurance_contact_name,
        insurance_contact_phone: order.insurance_contact_phone,
        insurance_contact_email: order.insurance_contact_email,
        estimated_total_cost: order.estimated_total_cost,
        final_total_cost: order.final_total_cost,
        estimated_duration_days: order.estimated_duration_days,
        planned_start_date: order.planned_start_date.map(|d| d.to_string()),
        planned_completion_date: order.planned_completion_date.map(|d| d.to_string()),
        estimated_completion: order.estimated_completion.map(to_iso),
        archived: order.archived,
        archived_at: order.archived_at.map(to_iso),
        archived_by: order.archived_by,
        created_at: to_iso(order.created_at),
        updated_at: to_iso(order.updated_at),
        customer,
        vehicle,
        parts,
    }
}

fn map_order_error(err: OrderError) -> AppError {
    let message = match &err {
        OrderError::Customer(_) => "Failed to create customer",
        OrderError::Vehicle(_) => "Failed to create vehicle",
        OrderError::Allocation(_) => "Failed to allocate repair order number",
        OrderError::Order(_) => "Failed to create repair order",
        OrderError::AlreadyConverted => "Appointment already converted to repair order",
    };
    match err {
        OrderError::AlreadyConverted => AppError::bad_request(message),
        other => AppError::internal(message).with_details(json!(other.to_string())),
    }
}

#[derive(Deserialize)]
pub struct PartInput {
    pub part_name: String,
    pub part_number: Option<String>,
    pub quantity: Option<i32>,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateRepairOrderRequest {
    pub customer_first_name: Option<String>,
    pub customer_last_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,

    pub vehicle_year: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_vin: Option<String>,
    pub vehicle_color: Option<String>,
    pub vehicle_license_plate: Option<String>,
    pub vehicle_mileage: Option<i32>,

    pub insurance_carrier: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub insurance_claim_number: Option<String>,
    pub insurance_contact_name: Option<String>,
    pub insurance_contact_phone: Option<String>,
    pub insurance_contact_email: Option<String>,

    pub damage_description: Option<String>,
    pub estimated_total_cost: Option<f64>,
    pub estimated_duration_days: Option<i32>,
    pub planned_start_date: Option<NaiveDate>,
    pub priority: Option<String>,

    pub parts_list: Option<Vec<PartInput>>,
}

#[derive(Serialize)]
pub struct CreatedOrderResponse {
    pub repair_order: RepairOrderResponse,
    pub customer: CustomerResponse,
    pub vehicle: VehicleResponse,
    pub message: String,
}

fn required(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn create_repair_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateRepairOrderRequest>,
) -> AppResult<Json<CreatedOrderResponse>> {
    // All validation happens before the first write.
    let first_name = required(&payload.customer_first_name);
    let last_name = required(&payload.customer_last_name);
    let phone = required(&payload.customer_phone);
    if first_name.is_none() || last_name.is_none() || phone.is_none() {
        return Err(AppError::bad_request(
            "Customer first name, last name, and phone are required",
        ));
    }

    let vehicle_year = required(&payload.vehicle_year);
    let vehicle_make = required(&payload.vehicle_make);
    let vehicle_model = required(&payload.vehicle_model);
    let vehicle_vin = required(&payload.vehicle_vin);
    if vehicle_year.is_none()
        || vehicle_make.is_none()
        || vehicle_model.is_none()
        || vehicle_vin.is_none()
    {
        return Err(AppError::bad_request(
            "Vehicle year, make, model, and VIN are required",
        ));
    }

    let damage_description = required(&payload.damage_description)
        .ok_or_else(|| AppError::bad_request("Damage description is required"))?;

    let priority = payload
        .priority
        .clone()
        .unwrap_or_else(|| DEFAULT_RO_PRIORITY.to_string());
    if !RO_PRIORITIES.contains(&priority.as_str()) {
        return Err(AppError::bad_request(format!(
            "invalid priority '{priority}'"
        )));
    }

    let draft = OrderDraft {
        customer: CustomerInput {
            first_name: first_name.unwrap_or_default(),
            last_name: last_name.unwrap_or_default(),
            phone: normalize_phone(&phone.unwrap_or_default()),
            email: payload.customer_email.clone(),
            address: payload.customer_address.clone(),
            insurance_company: payload.insurance_carrier.clone(),
            policy_number: payload.insurance_policy_number.clone(),
            insurance_claim_number: payload.insurance_claim_number.clone(),
            insurance_adjuster_name: payload.insurance_contact_name.clone(),
            insurance_adjuster_phone: payload.insurance_contact_phone.clone(),
            insurance_adjuster_email: payload.insurance_contact_email.clone(),
        },
        vehicle: Some(VehicleInput {
            year: vehicle_year,
            make: vehicle_make,
            model: vehicle_model,
            vin: vehicle_vin.unwrap_or_default(),
            color: payload.vehicle_color.clone(),
            license_plate: payload.vehicle_license_plate.clone(),
            mileage: payload.vehicle_mileage,
        }),
        damage_description,
        priority,
        source_appointment_id: None,
        source_repair_case_id: None,
        estimated_total_cost: payload.estimated_total_cost,
        estimated_duration_days: payload.estimated_duration_days,
        planned_start_date: payload.planned_start_date,
    };

    let mut conn = state.db()?;
    let created = orders::create_order(&mut conn, &draft).map_err(map_order_error)?;
    let ro_number = created.repair_order.ro_number.clone();
    info!(%ro_number, repair_order_id = %created.repair_order.id, "created repair order");

    // Parts list is best-effort: a failed insert never unwinds the order.
    let mut parts: Vec<RepairOrderPart> = Vec::new();
    if let Some(parts_list) = payload.parts_list.as_ref().filter(|list| !list.is_empty()) {
        let rows: Vec<NewRepairOrderPart> = parts_list
            .iter()
            .map(|part| NewRepairOrderPart {
                id: Uuid::new_v4(),
                repair_order_id: created.repair_order.id,
                part_name: part.part_name.clone(),
                part_number: part.part_number.clone(),
                quantity: part.quantity.unwrap_or(1),
                estimated_cost: part.estimated_cost,
                notes: part.notes.clone(),
                status: "required".to_string(),
            })
            .collect();

        match diesel::insert_into(repair_order_parts::table)
            .values(&rows)
            .execute(&mut conn)
        {
            Ok(_) => {
                parts = repair_order_parts::table
                    .filter(repair_order_parts::repair_order_id.eq(created.repair_order.id))
                    .load(&mut conn)
                    .unwrap_or_default();
            }
            Err(err) => {
                warn!(%ro_number, error = %err, "failed to insert parts list");
            }
        }
    }

    let message = format!("Successfully created Repair Order {ro_number}");
    Ok(Json(CreatedOrderResponse {
        repair_order: to_repair_order_response(
            created.repair_order,
            None,
            None,
            parts.into_iter().map(Into::into).collect(),
        ),
        customer: created.customer.into(),
        vehicle: created.vehicle.into(),
        message,
    }))
}

#[derive(Deserialize)]
pub struct RepairOrderListQuery {
    pub status: Option<String>,
    pub ro_number: Option<String>,
}

#[derive(Serialize)]
pub struct RepairOrderListResponse {
    pub repair_orders: Vec<RepairOrderResponse>,
}

pub async fn list_repair_orders(
    State(state): State<AppState>,
    Query(params): Query<RepairOrderListQuery>,
) -> AppResult<Json<RepairOrderListResponse>> {
    let mut conn = state.db()?;

    let mut query = repair_orders::table.into_boxed();
    if let Some(status) = params
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        query = query.filter(repair_orders::status.eq(status.to_string()));
    }
    if let Some(ro_number) = params
        .ro_number
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        query = query.filter(repair_orders::ro_number.eq(ro_number.to_string()));
    }

    let rows: Vec<RepairOrder> = query
        .order(repair_orders::date_received.desc())
        .load(&mut conn)?;

    let customer_ids: Vec<Uuid> = rows.iter().map(|order| order.customer_id).collect();
    let vehicle_ids: Vec<Uuid> = rows.iter().map(|order| order.vehicle_id).collect();
    let order_ids: Vec<Uuid> = rows.iter().map(|order| order.id).collect();

    let customers_map: HashMap<Uuid, Customer> = customers::table
        .filter(customers::id.eq_any(&customer_ids))
        .load::<Customer>(&mut conn)?
        .into_iter()
        .map(|customer| (customer.id, customer))
        .collect();

    let vehicles_map: HashMap<Uuid, Vehicle> = vehicles::table
        .filter(vehicles::id.eq_any(&vehicle_ids))
        .load::<Vehicle>(&mut conn)?
        .into_iter()
        .map(|vehicle| (vehicle.id, vehicle))
        .collect();

    let mut parts_map: HashMap<Uuid, Vec<RepairOrderPart>> = HashMap::new();
    for part in repair_order_parts::table
        .filter(repair_order_parts::repair_order_id.eq_any(&order_ids))
        .load::<RepairOrderPart>(&mut conn)?
    {
        parts_map.entry(part.repair_order_id).or_default().push(part);
    }

    let response = rows
        .into_iter()
        .map(|order| {
            let customer = customers_map.get(&order.customer_id).cloned().map(Into::into);
            let vehicle = vehicles_map.get(&order.vehicle_id).cloned().map(Into::into);
            let parts = parts_map
                .remove(&order.id)
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect();
            to_repair_order_response(order, customer, vehicle, parts)
        })
        .collect();

    Ok(Json(RepairOrderListResponse {
        repair_orders: response,
    }))
}

#[derive(Serialize)]
pub struct RepairOrderDetailResponse {
    pub repair_order: RepairOrderResponse,
}

pub async fn get_repair_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<RepairOrderDetailResponse>> {
    let mut conn = state.db()?;

    let order: Option<RepairOrder> = repair_orders::table
        .find(order_id)
        .first(&mut conn)
        .optional()?;
    let order = order.ok_or_else(|| AppError::not_found("Repair order not found"))?;

    let customer: Option<Customer> = customers::table
        .find(order.customer_id)
        .first(&mut conn)
        .optional()?;
    let vehicle: Option<Vehicle> = vehicles::table
        .find(order.vehicle_id)
        .first(&mut conn)
        .optional()?;

    Ok(Json(RepairOrderDetailResponse {
        repair_order: to_repair_order_response(
            order,
            customer.map(Into::into),
            vehicle.map(Into::into),
            Vec::new(),
        ),
    }))
}

#[derive(Deserialize)]
pub struct UpdateRepairOrderRequest {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub damage_description: Option<String>,
    pub estimated_total_cost: Option<f64>,
    pub final_total_cost: Option<f64>,
    pub estimated_duration_days: Option<i32>,
    pub planned_start_date: Option<NaiveDate>,
    pub planned_completion_date: Option<NaiveDate>,
    pub estimated_completion: Option<NaiveDateTime>,
    pub edited_by: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = repair_orders)]
struct RepairOrderChangeset {
    status: Option<String>,
    priority: Option<String>,
    damage_description: Option<String>,
    estimated_total_cost: Option<f64>,
    final_total_cost: Option<f64>,
    estimated_duration_days: Option<i32>,
    planned_start_date: Option<NaiveDate>,
    planned_completion_date: Option<NaiveDate>,
    estimated_completion: Option<NaiveDateTime>,
}

#[derive(Serialize)]
pub struct UpdatedOrderResponse {
    pub repair_order: RepairOrderResponse,
    pub message: String,
}

fn track_edit(
    edits: &mut Vec<NewRepairOrderEdit>,
    repair_order_id: Uuid,
    edited_by: &str,
    field_name: &str,
    old_value: Option<String>,
    new_value: Option<String>,
) {
    if old_value != new_value {
        edits.push(NewRepairOrderEdit {
            id: Uuid::new_v4(),
            repair_order_id,
            field_name: field_name.to_string(),
            old_value,
            new_value,
            edited_by: edited_by.to_string(),
        });
    }
}

pub async fn update_repair_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateRepairOrderRequest>,
) -> AppResult<Json<UpdatedOrderResponse>> {
    if let Some(status) = payload.status.as_deref() {
        if !RO_STATUSES.contains(&status) {
            return Err(AppError::bad_request(format!("invalid status '{status}'")));
        }
    }
    if let Some(priority) = payload.priority.as_deref() {
        if !RO_PRIORITIES.contains(&priority) {
            return Err(AppError::bad_request(format!(
                "invalid priority '{priority}'"
            )));
        }
    }

    let mut conn = state.db()?;
    let current: Option<RepairOrder> = repair_orders::table
        .find(order_id)
        .first(&mut conn)
        .optional()?;
    let current = current.ok_or_else(|| AppError::not_found("Repair order not found"))?;

    let edited_by = payload
        .edited_by
        .clone()
        .unwrap_or_else(|| "Staff".to_string());

    // One audit row per supplied field whose value actually changed.
    let mut edits: Vec<NewRepairOrderEdit> = Vec::new();
    if let Some(ref status) = payload.status {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "status",
            Some(current.status.clone()),
            Some(status.clone()),
        );
    }
    if let Some(ref priority) = payload.priority {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "priority",
            Some(current.priority.clone()),
            Some(priority.clone()),
        );
    }
    if let Some(ref damage_description) = payload.damage_description {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "damage_description",
            Some(current.damage_description.clone()),
            Some(damage_description.clone()),
        );
    }
    if let Some(estimated_total_cost) = payload.estimated_total_cost {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "estimated_total_cost",
            current.estimated_total_cost.map(|v| v.to_string()),
            Some(estimated_total_cost.to_string()),
        );
    }
    if let Some(final_total_cost) = payload.final_total_cost {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "final_total_cost",
            current.final_total_cost.map(|v| v.to_string()),
            Some(final_total_cost.to_string()),
        );
    }
    if let Some(estimated_duration_days) = payload.estimated_duration_days {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "estimated_duration_days",
            current.estimated_duration_days.map(|v| v.to_string()),
            Some(estimated_duration_days.to_string()),
        );
    }
    if let Some(planned_start_date) = payload.planned_start_date {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "planned_start_date",
            current.planned_start_date.map(|v| v.to_string()),
            Some(planned_start_date.to_string()),
        );
    }
    if let Some(planned_completion_date) = payload.planned_completion_date {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "planned_completion_date",
            current.planned_completion_date.map(|v| v.to_string()),
            Some(planned_completion_date.to_string()),
        );
    }
    if let Some(estimated_completion) = payload.estimated_completion {
        track_edit(
            &mut edits,
            order_id,
            &edited_by,
            "estimated_completion",
            current.estimated_completion.map(to_iso),
            Some(to_iso(estimated_completion)),
        );
    }

    let changeset = RepairOrderChangeset {
        status: payload.status,
        priority: payload.priority,
        damage_description: payload.damage_description,
        estimated_total_cost: payload.estimated_total_cost,
        final_total_cost: payload.final_total_cost,
        estimated_duration_days: payload.estimated_duration_days,
        planned_start_date: payload.planned_start_date,
        planned_completion_date: payload.planned_completion_date,
        estimated_completion: payload.estimated_completion,
    };

    diesel::update(repair_orders::table.find(order_id))
        .set((&changeset, repair_orders::updated_at.eq(Utc::now().naive_utc())))
        .execute(&mut conn)
        .map_err(|err| {
            AppError::internal("Failed to update repair order")
                .with_details(json!(err.to_string()))
        })?;

    // History is best-effort; the update already committed.
    if !edits.is_empty() {
        if let Err(err) = diesel::insert_into(repair_order_edits::table)
            .values(&edits)
            .execute(&mut conn)
        {
            warn!(repair_order_id = %order_id, error = %err, "failed to log edit history");
        }
    }

    let updated: RepairOrder = repair_orders::table.find(order_id).first(&mut conn)?;

    Ok(Json(UpdatedOrderResponse {
        repair_order: to_repair_order_response(updated, None, None, Vec::new()),
        message: "Repair order updated successfully".to_string(),
    }))
}

fn archive_order(
    conn: &mut diesel::PgConnection,
    order_id: Uuid,
    archived_by: String,
) -> AppResult<RepairOrder> {
    let updated = diesel::update(repair_orders::table.find(order_id))
        .set((
            repair_orders::archived.eq(true),
            repair_orders::archived_at.eq(Some(Utc::now().naive_utc())),
            repair_orders::archived_by.eq(Some(archived_by)),
            repair_orders::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)
        .map_err(|err| {
            AppError::internal("Failed to archive repair order")
                .with_details(json!(err.to_string()))
        })?;

    if updated == 0 {
        return Err(AppError::not_found("Repair order not found"));
    }

    Ok(repair_orders::table.find(order_id).first(conn)?)
}

fn restore_order(conn: &mut diesel::PgConnection, order_id: Uuid) -> AppResult<RepairOrder> {
    let updated = diesel::update(repair_orders::table.find(order_id))
        .set((
            repair_orders::archived.eq(false),
            repair_orders::archived_at.eq(None::<NaiveDateTime>),
            repair_orders::archived_by.eq(None::<String>),
            repair_orders::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)
        .map_err(|err| {
            AppError::internal("Failed to restore repair order")
                .with_details(json!(err.to_string()))
        })?;

    if updated == 0 {
        return Err(AppError::not_found("Repair order not found"));
    }

    Ok(repair_orders::table.find(order_id).first(conn)?)
}

#[derive(Deserialize)]
pub struct DeleteRepairOrderQuery {
    pub archived_by: Option<String>,
}

#[derive(Serialize)]
pub struct ArchiveOrderResponse {
    pub repair_order: RepairOrderResponse,
    pub message: String,
}

pub async fn delete_repair_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Query(params): Query<DeleteRepairOrderQuery>,
) -> AppResult<Json<ArchiveOrderResponse>> {
    let mut conn = state.db()?;
    let archived_by = params.archived_by.unwrap_or_else(|| "Staff".to_string());
    let order = archive_order(&mut conn, order_id, archived_by)?;

    Ok(Json(ArchiveOrderResponse {
        repair_order: to_repair_order_response(order, None, None, Vec::new()),
        message: "Repair order archived successfully".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct ArchiveRepairOrderRequest {
    pub ro_id: Uuid,
    pub archived_by: Option<String>,
}

#[derive(Deserialize)]
pub struct RestoreRepairOrderRequest {
    pub ro_id: Uuid,
}

pub async fn archive_repair_order(
    State(state): State<AppState>,
    Json(payload): Json<ArchiveRepairOrderRequest>,
) -> AppResult<Json<ArchiveOrderResponse>> {
    let mut conn = state.db()?;
    let archived_by = payload.archived_by.unwrap_or_else(|| "Staff".to_string());
    let order = archive_order(&mut conn, payload.ro_id, archived_by)?;

    Ok(Json(ArchiveOrderResponse {
        repair_order: to_repair_order_response(order, None, None, Vec::new()),
        message: "Repair order archived successfully".to_string(),
    }))
}

pub async fn restore_repair_order(
    State(state): State<AppState>,
    Json(payload): Json<RestoreRepairOrderRequest>,
) -> AppResult<Json<ArchiveOrderResponse>> {
    let mut conn = state.db()?;
    let order = restore_order(&mut conn, payload.ro_id)?;

    Ok(Json(ArchiveOrderResponse {
        repair_order: to_repair_order_response(order, None, None, Vec::new()),
        message: "Repair order restored successfully".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct ConvertAppointmentRequest {
    pub appointment_id: Uuid,
}

#[derive(Serialize)]
pub struct ConversionSideEffects {
    pub documents_copied: usize,
    pub documents_failed: usize,
    pub appointment_note_recorded: bool,
}

#[derive(Serialize)]
pub struct ConvertedOrderResponse {
    pub repair_order: RepairOrderResponse,
    pub customer: CustomerResponse,
    pub vehicle: VehicleResponse,
    pub side_effects: ConversionSideEffects,
    pub message: String,
}

fn existing_conversion_error(existing: (Uuid, String)) -> AppError {
    AppError::bad_request("Appointment already converted to repair order").with_details(json!({
        "repair_order": { "id": existing.0, "ro_number": existing.1 }
    }))
}

pub async fn convert_appointment(
    State(state): State<AppState>,
    Json(payload): Json<ConvertAppointmentRequest>,
) -> AppResult<Json<ConvertedOrderResponse>> {
    let mut conn = state.db()?;

    let appointment: Option<Appointment> = appointments::table
        .find(payload.appointment_id)
        .first(&mut conn)
        .optional()?;
    let appointment =
        appointment.ok_or_else(|| AppError::not_found("Appointment not found"))?;

    // Friendly pre-check; the unique key on source_appointment_id closes the
    // race window behind it.
    let existing: Option<(Uuid, String)> = repair_orders::table
        .filter(repair_orders::source_appointment_id.eq(appointment.id))
        .select((repair_orders::id, repair_orders::ro_number))
        .first(&mut conn)
        .optional()?;
    if let Some(existing) = existing {
        return Err(existing_conversion_error(existing));
    }

    let repair_case: Option<RepairCase> = repair_cases::table
        .filter(repair_cases::appointment_id.eq(appointment.id))
        .first(&mut conn)
        .optional()?;

    let (first_name, last_name) = orders::split_customer_name(&appointment.customer_name);

    let case = repair_case.as_ref();
    let draft = OrderDraft {
        customer: CustomerInput {
            first_name,
            last_name,
            phone: normalize_phone(&appointment.customer_phone),
            email: Some(appointment.customer_email.clone())
                .filter(|email| !email.trim().is_empty()),
            address: None,
            insurance_company: case.and_then(|c| c.insurance_carrier.clone()),
            policy_number: case.and_then(|c| c.insurance_policy_number.clone()),
            insurance_claim_number: case.and_then(|c| c.insurance_claim_number.clone()),
            insurance_adjuster_name: case.and_then(|c| c.insurance_adjuster_name.clone()),
            insurance_adjuster_phone: case.and_then(|c| c.insurance_adjuster_phone.clone()),
            insurance_adjuster_email: case.and_then(|c| c.insurance_adjuster_email.clone()),
        },
        vehicle: case.and_then(|c| {
            c.vehicle_vin.clone().map(|vin| VehicleInput {
                year: c.vehicle_year.clone(),
                make: c.vehicle_make.clone(),
                model: c.vehicle_model.clone(),
                vin,
                color: None,
                license_plate: c.vehicle_license_plate.clone(),
                mileage: c.vehicle_mileage,
            })
        }),
        damage_description: case
            .and_then(|c| c.incident_description.clone())
            .filter(|text| !text.trim().is_empty())
            .or_else(|| {
                Some(appointment.damage_description.clone())
                    .filter(|text| !text.trim().is_empty())
            })
            .unwrap_or_else(|| CONVERSION_PLACEHOLDER_DESCRIPTION.to_string()),
        priority: DEFAULT_RO_PRIORITY.to_string(),
        source_appointment_id: Some(appointment.id),
        source_repair_case_id: case.map(|c| c.id),
        estimated_total_cost: None,
        estimated_duration_days: None,
        planned_start_date: None,
    };

    let created = match orders::create_order(&mut conn, &draft) {
        Ok(created) => created,
        Err(OrderError::AlreadyConverted) => {
            // Lost the race after the pre-check; report the winner.
            let existing: Option<(Uuid, String)> = repair_orders::table
                .filter(repair_orders::source_appointment_id.eq(appointment.id))
                .select((repair_orders::id, repair_orders::ro_number))
                .first(&mut conn)
                .optional()?;
            return Err(match existing {
                Some(existing) => existing_conversion_error(existing),
                None => AppError::bad_request("Appointment already converted to repair order"),
            });
        }
        Err(err) => return Err(map_order_error(err)),
    };

    let ro_number = created.repair_order.ro_number.clone();
    info!(%ro_number, appointment_id = %appointment.id, "converted appointment to repair order");

    // Steps below are best-effort; the order exists either way.
    let mut documents_copied = 0;
    let mut documents_failed = 0;
    if repair_case.is_some() {
        match appointment_files::table
            .filter(appointment_files::appointment_id.eq(appointment.id))
            .load::<AppointmentFile>(&mut conn)
        {
            Ok(files) if !files.is_empty() => {
                let total = files.len();
                let documents: Vec<NewRepairOrderDocument> = files
                    .into_iter()
                    .map(|file| NewRepairOrderDocument {
                        id: Uuid::new_v4(),
                        repair_order_id: created.repair_order.id,
                        document_type: if file.file_type.starts_with("image/") {
                            "photo".to_string()
                        } else {
                            "other".to_string()
                        },
                        document_name: file.file_name,
                        document_url: file.public_url,
                        description: Some(format!(
                            "Transferred from appointment {}",
                            appointment.id
                        )),
                    })
                    .collect();

                match diesel::insert_into(repair_order_documents::table)
                    .values(&documents)
                    .execute(&mut conn)
                {
                    Ok(copied) => documents_copied = copied,
                    Err(err) => {
                        documents_failed = total;
                        warn!(%ro_number, error = %err, "failed to copy appointment documents");
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%ro_number, error = %err, "failed to load appointment files for copy");
            }
        }
    }

    let appointment_note_recorded = match diesel::update(appointments::table.find(appointment.id))
        .set((
            appointments::staff_notes.eq(Some(format!("Converted to Repair Order {ro_number}"))),
            appointments::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
    {
        Ok(_) => true,
        Err(err) => {
            warn!(%ro_number, error = %err, "failed to annotate source appointment");
            false
        }
    };

    let message = format!("Successfully created Repair Order {ro_number}");
    Ok(Json(ConvertedOrderResponse {
        repair_order: to_repair_order_response(created.repair_order, None, None, Vec::new()),
        customer: created.customer.into(),
        vehicle: created.vehicle.into(),
        side_effects: ConversionSideEffects {
            documents_copied,
            documents_failed,
            appointment_note_recorded,
        },
        message,
    }))
}
