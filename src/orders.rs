//! Repair-order creation core: customer/vehicle upsert, RO numbering, and
//! the insert sequence shared by manual creation and appointment conversion.

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::BigInt;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::{Customer, NewCustomer, NewRepairOrder, NewVehicle, RepairOrder, Vehicle};
use crate::schema::{customers, repair_orders, vehicles};

pub const RO_STATUSES: &[&str] = &[
    "intake",
    "insurance",
    "estimate_approval",
    "blueprinting",
    "parts_ordered",
    "in_repair",
    "painting",
    "quality_control",
    "ready_pickup",
    "completed",
];

pub const RO_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];

pub const INITIAL_RO_STATUS: &str = "intake";
pub const DEFAULT_RO_PRIORITY: &str = "medium";

// Bound on reallocation when the sequence lags behind manually numbered rows.
const RO_NUMBER_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("failed to upsert customer: {0}")]
    Customer(#[source] DieselError),
    #[error("failed to upsert vehicle: {0}")]
    Vehicle(#[source] DieselError),
    #[error("failed to allocate repair order number: {0}")]
    Allocation(#[source] DieselError),
    #[error("failed to create repair order: {0}")]
    Order(#[source] DieselError),
    #[error("appointment already converted to a repair order")]
    AlreadyConverted,
}

pub type OrderResult<T> = Result<T, OrderError>;

#[derive(Debug, Default, Clone)]
pub struct CustomerInput {
    pub first_name: String,
    pub last_name: String,
    /// Digits-only; callers normalize before building the input.
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub insurance_company: Option<String>,
    pub policy_number: Option<String>,
    pub insurance_claim_number: Option<String>,
    pub insurance_adjuster_name: Option<String>,
    pub insurance_adjuster_phone: Option<String>,
    pub insurance_adjuster_email: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct VehicleInput {
    pub year: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    /// Dedup key, case preserved as supplied.
    pub vin: String,
    pub color: Option<String>,
    pub license_plate: Option<String>,
    pub mileage: Option<i32>,
}

#[derive(Debug, Default)]
pub struct OrderDraft {
    pub customer: CustomerInput,
    /// `None` (or an empty VIN) creates a placeholder vehicle so the order's
    /// vehicle reference is always satisfiable.
    pub vehicle: Option<VehicleInput>,
    pub damage_description: String,
    pub priority: String,
    pub source_appointment_id: Option<Uuid>,
    pub source_repair_case_id: Option<Uuid>,
    pub estimated_total_cost: Option<f64>,
    pub estimated_duration_days: Option<i32>,
    pub planned_start_date: Option<NaiveDate>,
}

pub struct CreatedOrder {
    pub repair_order: RepairOrder,
    pub customer: Customer,
    pub vehicle: Vehicle,
}

/// Splits an intake form's single name field on the first space: everything
/// after it becomes the last name.
pub fn split_customer_name(full_name: &str) -> (String, String) {
    let trimmed = full_name.trim();
    match trimmed.split_once(' ') {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Field-level coalesce merge keyed on phone: supplied values win, stored
/// values survive where the input is empty. Creates the customer when the
/// phone has never been seen.
pub fn upsert_customer(conn: &mut PgConnection, input: &CustomerInput) -> OrderResult<Customer> {
    let existing: Option<Customer> = customers::table
        .filter(customers::phone.eq(&input.phone))
        .first(conn)
        .optional()
        .map_err(OrderError::Customer)?;

    let customer_id = match existing {
        Some(existing) => {
            diesel::update(customers::table.find(existing.id))
                .set((
                    customers::first_name.eq(&input.first_name),
                    customers::last_name.eq(&input.last_name),
                    customers::email.eq(input.email.clone().or(existing.email)),
                    customers::address.eq(input.address.clone().or(existing.address)),
                    customers::insurance_company
                        .eq(input.insurance_company.clone().or(existing.insurance_company)),
                    customers::policy_number
                        .eq(input.policy_number.clone().or(existing.policy_number)),
                    customers::insurance_claim_number.eq(input
                        .insurance_claim_number
                        .clone()
                        .or(existing.insurance_claim_number)),
                    customers::insurance_adjuster_name.eq(input
                        .insurance_adjuster_name
                        .clone()
                        .or(existing.insurance_adjuster_name)),
                    customers::insurance_adjuster_phone.eq(input
                        .insurance_adjuster_phone
                        .clone()
                        .or(existing.insurance_adjuster_phone)),
                    customers::insurance_adjuster_email.eq(input
                        .insurance_adjuster_email
                        .clone()
                        .or(existing.insurance_adjuster_email)),
                    customers::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)
                .map_err(OrderError::Customer)?;
            existing.id
        }
        None => {
            let new_customer = NewCustomer {
                id: Uuid::new_v4(),
                first_name: input.first_name.clone(),
                last_name: input.last_name.clone(),
                phone: input.phone.clone(),
                email: input.email.clone(),
                address: input.address.clone(),
                insurance_company: input.insurance_company.clone(),
                policy_number: input.policy_number.clone(),
                insurance_claim_number: input.insurance_claim_number.clone(),
                insurance_adjuster_name: input.insurance_adjuster_name.clone(),
                insurance_adjuster_phone: input.insurance_adjuster_phone.clone(),
                insurance_adjuster_email: input.insurance_adjuster_email.clone(),
            };
            diesel::insert_into(customers::table)
                .values(&new_customer)
                .execute(conn)
                .map_err(OrderError::Customer)?;
            new_customer.id
        }
    };

    customers::table
        .find(customer_id)
        .first(conn)
        .map_err(OrderError::Customer)
}

/// Same merge policy as [`upsert_customer`], keyed on VIN. The vehicle is
/// always reassociated with the resolving customer.
pub fn upsert_vehicle(
    conn: &mut PgConnection,
    customer_id: Uuid,
    input: &VehicleInput,
) -> OrderResult<Vehicle> {
    let existing: Option<Vehicle> = vehicles::table
        .filter(vehicles::vin.eq(&input.vin))
        .first(conn)
        .optional()
        .map_err(OrderError::Vehicle)?;

    let vehicle_id = match existing {
        Some(existing) => {
            diesel::update(vehicles::table.find(existing.id))
                .set((
                    vehicles::customer_id.eq(customer_id),
                    vehicles::year.eq(input.year.clone().unwrap_or(existing.year)),
                    vehicles::make.eq(input.make.clone().unwrap_or(existing.make)),
                    vehicles::model.eq(input.model.clone().unwrap_or(existing.model)),
                    vehicles::color.eq(input.color.clone().unwrap_or(existing.color)),
                    vehicles::license_plate
                        .eq(input.license_plate.clone().or(existing.license_plate)),
                    vehicles::mileage.eq(input.mileage.or(existing.mileage)),
                    vehicles::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)
                .map_err(OrderError::Vehicle)?;
            existing.id
        }
        None => {
            let new_vehicle = NewVehicle {
                id: Uuid::new_v4(),
                customer_id,
                year: input.year.clone().unwrap_or_default(),
                make: input.make.clone().unwrap_or_default(),
                model: input.model.clone().unwrap_or_default(),
                vin: input.vin.clone(),
                color: input.color.clone().unwrap_or_default(),
                license_plate: input.license_plate.clone(),
                mileage: input.mileage,
            };
            diesel::insert_into(vehicles::table)
                .values(&new_vehicle)
                .execute(conn)
                .map_err(OrderError::Vehicle)?;
            new_vehicle.id
        }
    };

    vehicles::table
        .find(vehicle_id)
        .first(conn)
        .map_err(OrderError::Vehicle)
}

/// Stand-in vehicle for orders created without vehicle data. The VIN is
/// timestamped so the unique key never collides and the row is easy to spot.
pub fn create_placeholder_vehicle(
    conn: &mut PgConnection,
    customer_id: Uuid,
) -> OrderResult<Vehicle> {
    let new_vehicle = NewVehicle {
        id: Uuid::new_v4(),
        customer_id,
        year: "Unknown".to_string(),
        make: "Unknown".to_string(),
        model: "Unknown".to_string(),
        vin: format!("PENDING-{}", Utc::now().timestamp_millis()),
        color: String::new(),
        license_plate: None,
        mileage: None,
    };
    diesel::insert_into(vehicles::table)
        .values(&new_vehicle)
        .execute(conn)
        .map_err(OrderError::Vehicle)?;

    vehicles::table
        .find(new_vehicle.id)
        .first(conn)
        .map_err(OrderError::Vehicle)
}

#[derive(QueryableByName)]
struct SequenceValue {
    #[diesel(sql_type = BigInt)]
    nextval: i64,
}

fn next_from_sequence(conn: &mut PgConnection) -> QueryResult<i64> {
    diesel::sql_query("SELECT nextval('ro_number_seq')")
        .get_result::<SequenceValue>(conn)
        .map(|row| row.nextval)
}

pub(crate) fn format_ro_number(value: i64) -> String {
    format!("RO-{value:05}")
}

/// Highest-existing-plus-one, parsed from the lexicographically largest
/// `RO-…` identifier. Zero-padded numbers sort correctly as strings.
pub(crate) fn next_ro_number(latest: Option<&str>) -> i64 {
    latest
        .and_then(|value| value.strip_prefix("RO-"))
        .and_then(|digits| digits.parse::<i64>().ok())
        .map(|value| value + 1)
        .unwrap_or(1)
}

/// Allocates the next human-readable order number. The database sequence is
/// the primary, concurrency-safe path; when it errors the scan-and-parse
/// fallback keeps order creation alive. Both failing aborts the create.
pub fn allocate_ro_number(conn: &mut PgConnection) -> OrderResult<String> {
    match next_from_sequence(conn) {
        Ok(value) => Ok(format_ro_number(value)),
        Err(err) => {
            warn!(error = %err, "RO number sequence failed, falling back to scan");
            let latest: Option<String> = repair_orders::table
                .filter(repair_orders::ro_number.like("RO-%"))
                .select(repair_orders::ro_number)
                .order(repair_orders::ro_number.desc())
                .first(conn)
                .optional()
                .map_err(OrderError::Allocation)?;
            Ok(format_ro_number(next_ro_number(latest.as_deref())))
        }
    }
}

/// Planned completion is the start date plus the estimate, in calendar days.
pub(crate) fn planned_completion(start: NaiveDate, duration_days: i32) -> Option<NaiveDate> {
    start.checked_add_signed(Duration::days(duration_days as i64))
}

fn midnight_utc(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

/// Upsert-customer → resolve-vehicle → allocate-number → insert-order. Any
/// step failing aborts the whole sequence with the failing step named; the
/// caller owns best-effort extras (parts lists, document copies, notes).
pub fn create_order(conn: &mut PgConnection, draft: &OrderDraft) -> OrderResult<CreatedOrder> {
    let customer = upsert_customer(conn, &draft.customer)?;

    let vehicle = match &draft.vehicle {
        Some(input) if !input.vin.trim().is_empty() => {
            upsert_vehicle(conn, customer.id, input)?
        }
        _ => create_placeholder_vehicle(conn, customer.id)?,
    };

    let planned_completion_date = match (draft.planned_start_date, draft.estimated_duration_days) {
        (Some(start), Some(days)) => planned_completion(start, days),
        _ => None,
    };

    for attempt in 1..=RO_NUMBER_ATTEMPTS {
        let ro_number = allocate_ro_number(conn)?;
        let new_order = NewRepairOrder {
            id: Uuid::new_v4(),
            ro_number: ro_number.clone(),
            customer_id: customer.id,
            vehicle_id: vehicle.id,
            source_appointment_id: draft.source_appointment_id,
            source_repair_case_id: draft.source_repair_case_id,
            status: INITIAL_RO_STATUS.to_string(),
            priority: draft.priority.clone(),
            damage_description: draft.damage_description.clone(),
            customer_first_name: draft.customer.first_name.clone(),
            customer_last_name: draft.customer.last_name.clone(),
            customer_phone: draft.customer.phone.clone(),
            customer_email: draft.customer.email.clone().or_else(|| customer.email.clone()),
            customer_address: draft
                .customer
                .address
                .clone()
                .or_else(|| customer.address.clone()),
            vehicle_year: vehicle.year.clone(),
            vehicle_make: vehicle.make.clone(),
            vehicle_model: vehicle.model.clone(),
            vehicle_vin: vehicle.vin.clone(),
            insurance_carrier: customer.insurance_company.clone(),
            insurance_claim_number: customer.insurance_claim_number.clone(),
            insurance_contact_name: customer.insurance_adjuster_name.clone(),
            insurance_contact_phone: customer.insurance_adjuster_phone.clone(),
            insurance_contact_email: customer.insurance_adjuster_email.clone(),
            estimated_total_cost: draft.estimated_total_cost,
            estimated_duration_days: draft.estimated_duration_days,
            planned_start_date: draft.planned_start_date,
            planned_completion_date,
            estimated_completion: planned_completion_date.and_then(midnight_utc),
        };

        match diesel::insert_into(repair_orders::table)
            .values(&new_order)
            .execute(conn)
        {
            Ok(_) => {
                let repair_order = repair_orders::table
                    .find(new_order.id)
                    .first(conn)
                    .map_err(OrderError::Order)?;
                return Ok(CreatedOrder {
                    repair_order,
                    customer,
                    vehicle,
                });
            }
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                let constraint = info.constraint_name().map(str::to_string);
                match constraint.as_deref() {
                    // A concurrent conversion won the race on this appointment.
                    Some("repair_orders_source_appointment_id_key") => {
                        return Err(OrderError::AlreadyConverted);
                    }
                    Some("repair_orders_ro_number_key") if attempt < RO_NUMBER_ATTEMPTS => {
                        warn!(%ro_number, attempt, "RO number collision, reallocating");
                        continue;
                    }
                    _ => {
                        return Err(OrderError::Order(DieselError::DatabaseError(
                            DatabaseErrorKind::UniqueViolation,
                            info,
                        )));
                    }
                }
            }
            Err(err) => return Err(OrderError::Order(err)),
        }
    }

    Err(OrderError::Allocation(DieselError::NotFound))
}
