use axum::{Router, routing::get};

pub mod bookings;
pub mod events;
pub mod system;
pub mod tickets;

pub(crate) const EVENT_AGGREGATE: &str = "catalog.event";
pub(crate) const TICKET_TYPE_AGGREGATE: &str = "catalog.ticket_type";

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/events", events::router())
        .nest("/tickets", tickets::router())
        .nest("/bookings", bookings::router())
}
