use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod appointments;
pub mod customers;
pub mod health;
pub mod notes;
pub mod repair_orders;
pub mod sms;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let appointments_routes = Router::new()
        .route(
            "/",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route("/upload", post(appointments::upload_files))
        .route(
            "/archive",
            post(appointments::archive_appointment).put(appointments::restore_appointment),
        )
        .route(
            "/notes",
            get(notes::list_notes)
                .post(notes::create_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        );

    let repair_orders_routes = Router::new()
        .route(
            "/",
            get(repair_orders::list_repair_orders).post(repair_orders::create_repair_order),
        )
        .route(
            "/archive",
            post(repair_orders::archive_repair_order).put(repair_orders::restore_repair_order),
        )
        .route(
            "/:id",
            get(repair_orders::get_repair_order)
                .put(repair_orders::update_repair_order)
                .delete(repair_orders::delete_repair_order),
        );

    let sms_routes = Router::new().route("/send", post(sms::send_sms).get(sms::list_sms_logs));

    Router::new()
        .nest("/api/appointments", appointments_routes)
        .nest("/api/repair-orders", repair_orders_routes)
        .route(
            "/api/convert-appointment-to-ro",
            post(repair_orders::convert_appointment),
        )
        .nest("/api/sms", sms_routes)
        .route("/api/customer/register", post(customers::register))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024 * 32))
}
