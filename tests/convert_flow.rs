mod common;

use anyhow::Result;
use axum::http::StatusCode;
use bodyshop::models::{NewAppointmentFile, NewRepairCase};
use common::{acquire_db_lock, expect_status, TestApp};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct ConvertedOrder {
    repair_order: RepairOrderInfo,
    customer: CustomerInfo,
    vehicle: VehicleInfo,
    side_effects: SideEffects,
    message: String,
}

#[derive(Deserialize)]
struct RepairOrderInfo {
    ro_number: String,
    status: String,
    priority: String,
    damage_description: String,
    source_appointment_id: Option<Uuid>,
    insurance_carrier: Option<String>,
}

#[derive(Deserialize)]
struct CustomerInfo {
    first_name: String,
    last_name: String,
    phone: String,
}

#[derive(Deserialize)]
struct VehicleInfo {
    vin: String,
    year: String,
}

#[derive(Deserialize)]
struct SideEffects {
    documents_copied: usize,
    documents_failed: usize,
    appointment_note_recorded: bool,
}

async fn insert_file(app: &TestApp, appointment_id: Uuid, name: &str, mime: &str) -> Result<()> {
    let file = NewAppointmentFile {
        id: Uuid::new_v4(),
        appointment_id,
        file_name: name.to_string(),
        file_type: mime.to_string(),
        file_size: 1024,
        storage_path: format!("{appointment_id}/{name}"),
        public_url: format!("https://fake-storage/{appointment_id}/{name}"),
    };
    app.with_conn(move |conn| {
        diesel::insert_into(bodyshop::schema::appointment_files::table)
            .values(&file)
            .execute(conn)?;
        Ok(())
    })
    .await
}

#[tokio::test]
async fn converts_appointment_with_repair_case() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let appointment_id = app
        .insert_appointment(
            "Maria De La Cruz",
            "5553216789",
            "maria@example.com",
            "Driver door scraped",
        )
        .await?;
    app.insert_repair_case(NewRepairCase {
        id: Uuid::new_v4(),
        appointment_id,
        incident_description: Some("Side-swiped in parking lot".to_string()),
        insurance_carrier: Some("Acme Mutual".to_string()),
        insurance_claim_number: Some("CLM-1207".to_string()),
        vehicle_year: Some("2018".to_string()),
        vehicle_make: Some("Subaru".to_string()),
        vehicle_model: Some("Outback".to_string()),
        vehicle_vin: Some("4S4BSANC5J3300555".to_string()),
        ..Default::default()
    })
    .await?;
    insert_file(&app, appointment_id, "front.jpg", "image/jpeg").await?;
    insert_file(&app, appointment_id, "estimate.pdf", "application/pdf").await?;

    let response = app
        .post_json(
            "/api/convert-appointment-to-ro",
            &json!({ "appointment_id": appointment_id }),
        )
        .await?;
    let bytes = expect_status(response, StatusCode::OK).await?;
    let converted: ConvertedOrder = serde_json::from_slice(&bytes)?;

    assert_eq!(converted.customer.first_name, "Maria");
    assert_eq!(converted.customer.last_name, "De La Cruz");
    assert_eq!(converted.customer.phone, "5553216789");
    assert_eq!(converted.vehicle.vin, "4S4BSANC5J3300555");
    assert_eq!(converted.vehicle.year, "2018");
    assert_eq!(converted.repair_order.status, "intake");
    assert_eq!(converted.repair_order.priority, "medium");
    assert_eq!(
        converted.repair_order.damage_description,
        "Side-swiped in parking lot"
    );
    assert_eq!(
        converted.repair_order.insurance_carrier.as_deref(),
        Some("Acme Mutual")
    );
    assert_eq!(
        converted.repair_order.source_appointment_id,
        Some(appointment_id)
    );
    assert_eq!(converted.side_effects.documents_copied, 2);
    assert_eq!(converted.side_effects.documents_failed, 0);
    assert!(converted.side_effects.appointment_note_recorded);
    assert!(converted.message.contains(&converted.repair_order.ro_number));

    // Copied documents are typed by MIME prefix.
    let document_types: Vec<(String, String)> = app
        .with_conn(|conn| {
            use bodyshop::schema::repair_order_documents::dsl::*;
            Ok(repair_order_documents
                .select((document_name, document_type))
                .order(document_name.asc())
                .load(conn)?)
        })
        .await?;
    assert_eq!(
        document_types,
        vec![
            ("estimate.pdf".to_string(), "other".to_string()),
            ("front.jpg".to_string(), "photo".to_string()),
        ]
    );

    // Source appointment carries the staff note but keeps its status.
    let appointment = app.load_appointment(appointment_id).await?;
    let staff_notes = appointment.staff_notes.expect("staff note recorded");
    assert!(staff_notes.contains(&converted.repair_order.ro_number));
    assert_eq!(appointment.status, "completed");

    // Second attempt conflicts and points at the first order.
    let again = app
        .post_json(
            "/api/convert-appointment-to-ro",
            &json!({ "appointment_id": appointment_id }),
        )
        .await?;
    let bytes = expect_status(again, StatusCode::BAD_REQUEST).await?;
    let parsed: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(
        parsed["details"]["repair_order"]["ro_number"],
        converted.repair_order.ro_number
    );
    assert_eq!(app.customer_count().await?, 1);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn converts_without_repair_case_using_placeholders() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let appointment_id = app
        .insert_appointment("Cher", "5550001111", "", "")
        .await?;

    let response = app
        .post_json(
            "/api/convert-appointment-to-ro",
            &json!({ "appointment_id": appointment_id }),
        )
        .await?;
    let bytes = expect_status(response, StatusCode::OK).await?;
    let converted: ConvertedOrder = serde_json::from_slice(&bytes)?;

    assert_eq!(converted.customer.first_name, "Cher");
    assert_eq!(converted.customer.last_name, "");
    assert!(converted.vehicle.vin.starts_with("PENDING-"));
    assert_eq!(converted.vehicle.year, "Unknown");
    assert_eq!(
        converted.repair_order.damage_description,
        "Appointment conversion - details pending"
    );
    // No repair case, so there is nothing to copy.
    assert_eq!(converted.side_effects.documents_copied, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn conversion_requires_existing_appointment() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .post_json(
            "/api/convert-appointment-to-ro",
            &json!({ "appointment_id": Uuid::new_v4() }),
        )
        .await?;
    expect_status(response, StatusCode::NOT_FOUND).await?;

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn merges_repeat_customer_on_conversion() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    // Known customer with insurance on file but no email.
    let body = json!({
        "customer_first_name": "Sam",
        "customer_last_name": "Okafor",
        "customer_phone": "5558675309",
        "vehicle_year": "2021",
        "vehicle_make": "Ford",
        "vehicle_model": "F-150",
        "vehicle_vin": "1FTFW1E50MFA00666",
        "damage_description": "Tailgate replacement",
        "insurance_carrier": "Granite State",
    });
    let response = app.post_json("/api/repair-orders", &body).await?;
    expect_status(response, StatusCode::OK).await?;

    // A later appointment for the same phone adds an email; the stored
    // insurance survives the merge.
    let appointment_id = app
        .insert_appointment("Sam Okafor", "5558675309", "sam@example.com", "Hail damage")
        .await?;
    let response = app
        .post_json(
            "/api/convert-appointment-to-ro",
            &json!({ "appointment_id": appointment_id }),
        )
        .await?;
    let bytes = expect_status(response, StatusCode::OK).await?;
    let converted: ConvertedOrder = serde_json::from_slice(&bytes)?;

    assert_eq!(app.customer_count().await?, 1);
    assert_eq!(
        converted.repair_order.insurance_carrier.as_deref(),
        Some("Granite State")
    );
    assert_eq!(converted.repair_order.damage_description, "Hail damage");

    app.cleanup().await?;
    Ok(())
}
