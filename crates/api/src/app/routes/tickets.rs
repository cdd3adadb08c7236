use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use gatepass_auth::Permission;
use gatepass_catalog::{CreateTicketType, EventId, TicketType, TicketTypeCommand, TicketTypeId};
use gatepass_core::AggregateId;

use crate::app::routes::TICKET_TYPE_AGGREGATE;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::CmdAuth;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_ticket_type))
        .route("/event/:id", get(list_for_event))
}

pub async fn create_ticket_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateTicketTypeRequest>,
) -> axum::response::Response {
    let event_agg: AggregateId = match body.event_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id"),
    };
    let event_id = EventId::new(event_agg);

    let agg = AggregateId::new();
    let ticket_type_id = TicketTypeId::new(agg);

    let cmd = TicketTypeCommand::CreateTicketType(CreateTicketType {
        ticket_type_id,
        event_id,
        name: body.name,
        price: body.price,
        total: body.quantity,
        refund_policy: body.refund_policy.unwrap_or_default(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("tickets.create")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    // Ownership check against the store, not the projections, so a host can
    // attach tickets right after submitting the event.
    let event = match services.event_record(event_id) {
        Some(event) => event,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "event not found"),
    };
    if event.host_id() != Some(principal.user_id()) {
        return errors::json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "not authorized to add tickets for this event",
        );
    }

    let committed = match services.dispatch::<TicketType>(
        agg,
        TICKET_TYPE_AGGREGATE,
        cmd_auth.inner,
        |id| TicketType::empty(TicketTypeId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn list_for_event(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id"),
    };

    let tickets = services.tickets_for_event(EventId::new(agg));
    if tickets.is_empty() {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            "no tickets found for this event",
        );
    }

    let tickets: Vec<_> = tickets.iter().map(dto::ticket_summary_to_json).collect();
    (StatusCode::OK, Json(serde_json::json!({ "tickets": tickets }))).into_response()
}
