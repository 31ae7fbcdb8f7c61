use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bodyshop::config::AppConfig;
use bodyshop::db::{self, PgPool, MIGRATIONS};
use bodyshop::models::{Appointment, NewAppointment, NewRepairCase, NewSmsPreference};
use bodyshop::routes;
use bodyshop::sms::{SmsDelivery, SmsGateway, SmsSender};
use bodyshop::state::AppState;
use bodyshop::storage::ObjectStorage;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://fake-storage/{key}")
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut guard = self.objects.lock().await;
        guard.remove(key);
        Ok(())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

#[allow(dead_code)]
#[derive(Clone)]
pub struct SentSms {
    pub to: String,
    pub from: String,
    pub body: String,
}

#[derive(Default)]
pub struct FakeSmsGateway {
    sent: std::sync::Mutex<Vec<SentSms>>,
    fail_next: std::sync::Mutex<bool>,
}

impl FakeSmsGateway {
    #[allow(dead_code)]
    pub fn sent_messages(&self) -> Vec<SentSms> {
        self.sent.lock().expect("sms fake poisoned").clone()
    }

    #[allow(dead_code)]
    pub fn fail_next_send(&self) {
        *self.fail_next.lock().expect("sms fake poisoned") = true;
    }
}

#[async_trait]
impl SmsGateway for FakeSmsGateway {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<SmsDelivery> {
        let mut fail = self.fail_next.lock().expect("sms fake poisoned");
        if *fail {
            *fail = false;
            return Err(anyhow!("gateway unavailable"));
        }
        drop(fail);

        let mut guard = self.sent.lock().expect("sms fake poisoned");
        guard.push(SentSms {
            to: to.to_string(),
            from: from.to_string(),
            body: body.to_string(),
        });
        Ok(SmsDelivery {
            provider_sid: format!("SM-fake-{}", guard.len()),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
    sms: Arc<FakeSmsGateway>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            s3_public_url_base: None,
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_phone_number: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let sms = Arc::new(FakeSmsGateway::default());
        let sms_sender = SmsSender {
            gateway: sms.clone(),
            from_phone: "+15550000000".to_string(),
        };
        let state = AppState::new(pool.clone(), config, storage_for_state, Some(sms_sender));
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            storage,
            sms,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    #[allow(dead_code)]
    pub fn sms(&self) -> Arc<FakeSmsGateway> {
        self.sms.clone()
    }

    #[allow(dead_code)]
    pub async fn insert_appointment(
        &self,
        customer_name: &str,
        customer_phone: &str,
        customer_email: &str,
        damage_description: &str,
    ) -> Result<Uuid> {
        let new_appointment = NewAppointment {
            id: Uuid::new_v4(),
            customer_name: customer_name.to_string(),
            customer_phone: customer_phone.to_string(),
            customer_email: customer_email.to_string(),
            service_type: "collision".to_string(),
            vehicle_info: "2020 Honda Civic".to_string(),
            damage_description: damage_description.to_string(),
            appointment_date: Some("2024-03-01".to_string()),
            appointment_time: Some("09:00".to_string()),
            status: "completed".to_string(),
        };
        let id = new_appointment.id;
        self.with_conn(move |conn| {
            diesel::insert_into(bodyshop::schema::appointments::table)
                .values(&new_appointment)
                .execute(conn)
                .context("failed to insert appointment")?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    #[allow(dead_code)]
    pub async fn insert_repair_case(&self, case: NewRepairCase) -> Result<Uuid> {
        let id = case.id;
        self.with_conn(move |conn| {
            diesel::insert_into(bodyshop::schema::repair_cases::table)
                .values(&case)
                .execute(conn)
                .context("failed to insert repair case")?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    #[allow(dead_code)]
    pub async fn insert_sms_preference(&self, phone_number: &str, opted_in: bool) -> Result<()> {
        let preference = NewSmsPreference {
            phone_number: phone_number.to_string(),
            opted_in,
        };
        self.with_conn(move |conn| {
            diesel::insert_into(bodyshop::schema::sms_preferences::table)
                .values(&preference)
                .execute(conn)
                .context("failed to insert sms preference")?;
            Ok(())
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn load_appointment(&self, appointment_id: Uuid) -> Result<Appointment> {
        self.with_conn(move |conn| {
            bodyshop::schema::appointments::table
                .find(appointment_id)
                .first(conn)
                .context("failed to load appointment")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn customer_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use diesel::dsl::count_star;
            bodyshop::schema::customers::table
                .select(count_star())
                .first(conn)
                .context("failed to count customers")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn vehicle_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use diesel::dsl::count_star;
            bodyshop::schema::vehicles::table
                .select(count_star())
                .first(conn)
                .context("failed to count vehicles")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn edit_rows(&self, order_id: Uuid) -> Result<Vec<(String, Option<String>, Option<String>, String)>> {
        self.with_conn(move |conn| {
            use bodyshop::schema::repair_order_edits::dsl::*;
            repair_order_edits
                .filter(repair_order_id.eq(order_id))
                .select((field_name, old_value, new_value, edited_by))
                .load(conn)
                .context("failed to load edit rows")
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        files: &[(&str, &str, &[u8])],
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        for (filename, content_type, data) in files {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
            body.extend(*data);
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn expect_status(
    response: hyper::Response<Body>,
    expected: StatusCode,
) -> Result<Vec<u8>> {
    let status = response.status();
    let body = body_to_vec(response.into_body()).await?;
    if status != expected {
        return Err(anyhow!(
            "expected {expected}, got {status}: {}",
            String::from_utf8_lossy(&body)
        ));
    }
    Ok(body)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE sms_preferences, sms_logs, customer_accounts, repair_order_documents, \
         repair_order_parts, repair_order_edits, repair_orders, vehicles, customers, \
         repair_cases, appointment_notes, appointment_files, appointments \
         RESTART IDENTITY CASCADE; \
         CREATE SEQUENCE IF NOT EXISTS ro_number_seq START 1; \
         ALTER SEQUENCE ro_number_seq RESTART WITH 1;",
    )
    .context("failed to reset test database")?;
    Ok(())
}
