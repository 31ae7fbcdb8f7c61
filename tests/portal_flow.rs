mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, expect_status, TestApp};
use serde_json::json;

#[tokio::test]
async fn registers_portal_account_once() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let body = json!({
        "auth_user_id": "ext-auth-0b1c2d3e",
        "email": "avery@example.com",
        "full_name": "Avery Quinn",
        "phone": "5558675309",
    });

    let created = app.post_json("/api/customer/register", &body).await?;
    let bytes = expect_status(created, StatusCode::CREATED).await?;
    let parsed: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(parsed["customer"]["auth_user_id"], "ext-auth-0b1c2d3e");
    assert_eq!(parsed["customer"]["is_active"], true);
    assert_eq!(parsed["customer"]["email_verified"], false);

    let duplicate = app.post_json("/api/customer/register", &body).await?;
    expect_status(duplicate, StatusCode::CONFLICT).await?;

    let missing = app
        .post_json(
            "/api/customer/register",
            &json!({ "auth_user_id": "ext-auth-ffff", "email": "x@example.com" }),
        )
        .await?;
    expect_status(missing, StatusCode::BAD_REQUEST).await?;

    app.cleanup().await?;
    Ok(())
}
