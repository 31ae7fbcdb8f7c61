use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = appointments)]
pub struct Appointment {
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
    pub archived_at: Option<NaiveDateTime>,
    pub archived_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = appointments)]
pub struct NewAppointment {
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
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = appointment_files)]
#[diesel(belongs_to(Appointment))]
pub struct AppointmentFile {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub public_url: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = appointment_files)]
pub struct NewAppointmentFile {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub storage_path: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = appointment_notes)]
#[diesel(belongs_to(Appointment))]
pub struct AppointmentNote {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub note_text: String,
    pub staff_name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = appointment_notes)]
pub struct NewAppointmentNote {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub note_text: String,
    pub staff_name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = repair_cases)]
#[diesel(belongs_to(Appointment))]
pub struct RepairCase {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub incident_description: Option<String>,
    pub insurance_carrier: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub insurance_claim_number: Option<String>,
    pub insurance_adjuster_name: Option<String>,
    pub insurance_adjuster_phone: Option<String>,
    pub insurance_adjuster_email: Option<String>,
    pub vehicle_year: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_vin: Option<String>,
    pub vehicle_license_plate: Option<String>,
    pub vehicle_mileage: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, Insertable)]
#[diesel(table_name = repair_cases)]
pub struct NewRepairCase {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub incident_description: Option<String>,
    pub insurance_carrier: Option<String>,
    pub insurance_policy_number: Option<String>,
    pub insurance_claim_number: Option<String>,
    pub insurance_adjuster_name: Option<String>,
    pub insurance_adjuster_phone: Option<String>,
    pub insurance_adjuster_email: Option<String>,
    pub vehicle_year: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_vin: Option<String>,
    pub vehicle_license_plate: Option<String>,
    pub vehicle_mileage: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = customers)]
pub struct Customer {
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
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = customers)]
pub struct NewCustomer {
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
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = vehicles)]
#[diesel(belongs_to(Customer))]
pub struct Vehicle {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub year: String,
    pub make: String,
    pub model: String,
    pub vin: String,
    pub color: String,
    pub license_plate: Option<String>,
    pub mileage: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = vehicles)]
pub struct NewVehicle {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub year: String,
    pub make: String,
    pub model: String,
    pub vin: String,
    pub color: String,
    pub license_plate: Option<String>,
    pub mileage: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = repair_orders)]
pub struct RepairOrder {
    pub id: Uuid,
    pub ro_number: String,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub source_appointment_id: Option<Uuid>,
    pub source_repair_case_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
    pub date_received: NaiveDateTime,
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
    pub planned_start_date: Option<NaiveDate>,
    pub planned_completion_date: Option<NaiveDate>,
    pub estimated_completion: Option<NaiveDateTime>,
    pub archived: bool,
    pub archived_at: Option<NaiveDateTime>,
    pub archived_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = repair_orders)]
pub struct NewRepairOrder {
    pub id: Uuid,
    pub ro_number: String,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub source_appointment_id: Option<Uuid>,
    pub source_repair_case_id: Option<Uuid>,
    pub status: String,
    pub priority: String,
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
    pub estimated_duration_days: Option<i32>,
    pub planned_start_date: Option<NaiveDate>,
    pub planned_completion_date: Option<NaiveDate>,
    pub estimated_completion: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = repair_order_edits)]
#[diesel(belongs_to(RepairOrder))]
pub struct RepairOrderEdit {
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub edited_by: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = repair_order_edits)]
pub struct NewRepairOrderEdit {
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub edited_by: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = repair_order_parts)]
#[diesel(belongs_to(RepairOrder))]
pub struct RepairOrderPart {
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub part_name: String,
    pub part_number: Option<String>,
    pub quantity: i32,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = repair_order_parts)]
pub struct NewRepairOrderPart {
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub part_name: String,
    pub part_number: Option<String>,
    pub quantity: i32,
    pub estimated_cost: Option<f64>,
    pub notes: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = repair_order_documents)]
#[diesel(belongs_to(RepairOrder))]
pub struct RepairOrderDocument {
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub document_type: String,
    pub document_name: String,
    pub document_url: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = repair_order_documents)]
pub struct NewRepairOrderDocument {
    pub id: Uuid,
    pub repair_order_id: Uuid,
    pub document_type: String,
    pub document_name: String,
    pub document_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = sms_logs)]
pub struct SmsLog {
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
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sms_logs)]
pub struct NewSmsLog {
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
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = sms_preferences)]
pub struct SmsPreference {
    pub phone_number: String,
    pub opted_in: bool,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sms_preferences)]
pub struct NewSmsPreference {
    pub phone_number: String,
    pub opted_in: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = customer_accounts)]
pub struct CustomerAccount {
    pub id: Uuid,
    pub auth_user_id: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = customer_accounts)]
pub struct NewCustomerAccount {
    pub id: Uuid,
    pub auth_user_id: String,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub is_active: bool,
    pub email_verified: bool,
}
