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
use gatepass_catalog::{ApproveEvent, Event, EventCommand, EventId, RejectEvent, SubmitEvent};
use gatepass_core::AggregateId;

use crate::app::routes::EVENT_AGGREGATE;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::CmdAuth;

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_event).get(list_live_events))
        .route("/mine", get(my_events))
        .route("/:id", get(get_event))
        .route("/:id/approve", post(approve_event))
        .route("/:id/reject", post(reject_event))
}

pub async fn submit_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::SubmitEventRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let event_id = EventId::new(agg);

    let cmd = EventCommand::SubmitEvent(SubmitEvent {
        event_id,
        host_id: principal.user_id(),
        title: body.title,
        venue: body.venue,
        starts_at: body.starts_at,
        ends_at: body.ends_at,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("events.submit")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Event>(agg, EVENT_AGGREGATE, cmd_auth.inner, |id| {
        Event::empty(EventId::new(id))
    }) {
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

pub async fn approve_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    moderate_event(services, principal, id, Moderation::Approve).await
}

pub async fn reject_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    moderate_event(services, principal, id, Moderation::Reject).await
}

enum Moderation {
    Approve,
    Reject,
}

async fn moderate_event(
    services: Arc<AppServices>,
    principal: crate::context::PrincipalContext,
    id: String,
    action: Moderation,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id"),
    };
    let event_id = EventId::new(agg);
    let now = Utc::now();

    let (cmd, permission) = match action {
        Moderation::Approve => (
            EventCommand::ApproveEvent(ApproveEvent {
                event_id,
                occurred_at: now,
            }),
            Permission::new("events.approve"),
        ),
        Moderation::Reject => (
            EventCommand::RejectEvent(RejectEvent {
                event_id,
                occurred_at: now,
            }),
            Permission::new("events.reject"),
        ),
    };

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![permission],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Event>(agg, EVENT_AGGREGATE, cmd_auth.inner, |id| {
        Event::empty(EventId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
            "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
        })),
    )
        .into_response()
}

pub async fn list_live_events(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let events: Vec<_> = services
        .events_live()
        .iter()
        .map(dto::event_summary_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "events": events }))).into_response()
}

pub async fn my_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    let events: Vec<_> = services
        .events_for_host(principal.user_id())
        .iter()
        .map(dto::event_summary_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "events": events }))).into_response()
}

pub async fn get_event(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id"),
    };

    match services.event_summary(&EventId::new(agg)) {
        Some(summary) => {
            (StatusCode::OK, Json(dto::event_summary_to_json(&summary))).into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "event not found"),
    }
}
