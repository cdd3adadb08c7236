//! Consistent JSON error responses.
//!
//! Every error body carries a stable machine-readable `error` code and a
//! human-readable `message`; server-side failures never leak internals.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use gatepass_core::DomainError;
use gatepass_infra::booking_flow::BookingFlowError;
use gatepass_infra::command_dispatcher::DispatchError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(_) | DispatchError::Store(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            "storage failure",
        ),
        DispatchError::Publish(_) => {
            json_error(StatusCode::BAD_GATEWAY, "publish_error", "event publication failed")
        }
    }
}

pub fn booking_error_to_response(err: BookingFlowError) -> axum::response::Response {
    match err {
        BookingFlowError::InvalidTicketType => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_ticket_type",
            "invalid ticket type",
        ),
        BookingFlowError::SoldOut => {
            json_error(StatusCode::CONFLICT, "sold_out", "tickets sold out")
        }
        BookingFlowError::EventNotBookable => json_error(
            StatusCode::BAD_REQUEST,
            "event_not_bookable",
            "event not live or not found",
        ),
        BookingFlowError::PriceMismatch { expected, supplied } => json_error(
            StatusCode::BAD_REQUEST,
            "price_mismatch",
            format!("ticket costs {expected}, request said {supplied}"),
        ),
        BookingFlowError::Conflict => json_error(
            StatusCode::CONFLICT,
            "conflict",
            "could not complete the booking due to contention, please retry",
        ),
        BookingFlowError::PaymentDeclined(msg) => {
            json_error(StatusCode::BAD_GATEWAY, "payment_failed", msg)
        }
        BookingFlowError::Persistence(_) | BookingFlowError::Deserialize(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            "storage failure",
        ),
        BookingFlowError::Publish(_) => {
            json_error(StatusCode::BAD_GATEWAY, "publish_error", "event publication failed")
        }
        BookingFlowError::Domain(e) => domain_error_to_response(e),
    }
}

fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => {
            json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized")
        }
    }
}
