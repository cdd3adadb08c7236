//! Request DTOs and JSON mapping helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use gatepass_catalog::RefundPolicy;
use gatepass_infra::booking_directory::EnrichedBooking;
use gatepass_infra::booking_flow::BookingReceipt;
use gatepass_infra::projections::{EventSummary, TicketTypeSummary};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitEventRequest {
    pub title: String,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketTypeRequest {
    pub event_id: String,
    pub name: String,
    pub price: u64,
    pub quantity: u64,
    pub refund_policy: Option<RefundPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub event_id: String,
    pub ticket_type_id: String,
    /// Optional declared price; the server derives the charge from the
    /// ticket type and rejects a mismatch.
    pub price_paid: Option<u64>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

fn as_json<T: Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap_or(JsonValue::Null)
}

pub fn event_summary_to_json(summary: &EventSummary) -> JsonValue {
    serde_json::json!({
        "id": summary.event_id.to_string(),
        "host_id": summary.host_id.to_string(),
        "title": summary.title,
        "venue": summary.venue,
        "starts_at": summary.starts_at,
        "ends_at": summary.ends_at,
        "status": as_json(&summary.status),
    })
}

pub fn ticket_summary_to_json(summary: &TicketTypeSummary) -> JsonValue {
    serde_json::json!({
        "id": summary.ticket_type_id.to_string(),
        "event_id": summary.event_id.to_string(),
        "name": summary.name,
        "price": summary.price,
        "quantity": {
            "total": summary.total,
            "available": summary.available,
        },
        "refund_policy": as_json(&summary.refund_policy),
    })
}

pub fn receipt_to_json(receipt: &BookingReceipt) -> JsonValue {
    serde_json::json!({
        "booking": {
            "id": receipt.booking_id.to_string(),
            "event_id": receipt.event_id.to_string(),
            "user_id": receipt.user_id.to_string(),
            "ticket_type_id": receipt.ticket_type_id.to_string(),
            "price_paid": receipt.price_paid,
            "check_in_code": receipt.check_in_code,
            "status": as_json(&receipt.status),
            "refund_status": as_json(&receipt.refund_status),
        },
        "transaction": {
            "id": receipt.transaction.transaction_id.to_string(),
            "booking_id": receipt.transaction.booking_id.to_string(),
            "amount": receipt.transaction.amount,
            "platform_fee": receipt.transaction.platform_fee,
            "payout_to_host": receipt.transaction.payout_to_host,
            "provider_ref": receipt.transaction.provider_ref,
            "status": as_json(&receipt.transaction.status),
        },
    })
}

pub fn enriched_booking_to_json(enriched: &EnrichedBooking) -> JsonValue {
    let booking = &enriched.booking;

    serde_json::json!({
        "id": booking.booking_id.to_string(),
        "event_id": booking.event_id.to_string(),
        "user_id": booking.user_id.to_string(),
        "ticket_type_id": booking.ticket_type_id.to_string(),
        "price_paid": booking.price_paid,
        "check_in_code": booking.check_in_code,
        "status": as_json(&booking.status),
        "refund_status": as_json(&booking.refund_status),
        "requested_at": booking.requested_at,
        "booker": {
            "name": booking.booker.name,
            "phone": booking.booker.phone,
            "email": booking.booker.email,
        },
        "event": enriched.event.as_ref().map(|e| serde_json::json!({
            "title": e.title,
            "venue": e.venue,
            "starts_at": e.starts_at,
        })),
        "ticket_type": enriched.ticket_type.as_ref().map(|t| serde_json::json!({
            "name": t.name,
            "price": t.price,
        })),
    })
}
