use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use gatepass_auth::Permission;
use gatepass_catalog::{EventId, TicketTypeId};
use gatepass_core::AggregateId;
use gatepass_infra::booking_flow::CreateBooking;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_booking))
        .route("/my", get(my_bookings))
        .route("/host", get(host_bookings))
        .route("/admin", get(all_bookings))
}

/// Any authenticated caller may book.
pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateBookingRequest>,
) -> axum::response::Response {
    let event_agg: AggregateId = match body.event_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id"),
    };
    let ticket_agg: AggregateId = match body.ticket_type_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid ticket type id");
        }
    };

    let receipt = match services.create_booking(CreateBooking {
        event_id: EventId::new(event_agg),
        ticket_type_id: TicketTypeId::new(ticket_agg),
        price_paid: body.price_paid,
        user_id: principal.user_id(),
        booker: principal.booker_contact(),
    }) {
        Ok(receipt) => receipt,
        Err(e) => return errors::booking_error_to_response(e),
    };

    (StatusCode::CREATED, Json(dto::receipt_to_json(&receipt))).into_response()
}

/// Guest: own bookings, enriched.
pub async fn my_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    let bookings: Vec<_> = services
        .bookings_for_user(principal.user_id())
        .iter()
        .map(dto::enriched_booking_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "bookings": bookings }))).into_response()
}

/// Host: bookings across the host's events.
pub async fn host_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("bookings.list_host")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let bookings: Vec<_> = services
        .bookings_for_host(principal.user_id())
        .iter()
        .map(dto::enriched_booking_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "bookings": bookings }))).into_response()
}

/// Admin: every booking in the system.
pub async fn all_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("bookings.list_all")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let bookings: Vec<_> = services
        .bookings_all()
        .iter()
        .map(dto::enriched_booking_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "bookings": bookings }))).into_response()
}
