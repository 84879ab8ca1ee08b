use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::api::middleware::auth::{AppState, InternalAuth};
use crate::error::{AppError, Result};
use crate::models::{CreateEventData, Event, Ticket};

/// Upcoming events, soonest first
async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<Event>>> {
    let events = Event::list_upcoming(&state.pool).await?;
    Ok(Json(events))
}

async fn get_event(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Event>> {
    let event = Event::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Ok(Json(event))
}

/// Active listings for an event, cheapest first
async fn list_event_tickets(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Ticket>>> {
    Event::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let tickets = Ticket::list_active_by_event(&state.pool, id).await?;
    Ok(Json(tickets))
}

/// Events are synced in from the catalog service, not user-created.
async fn create_event(
    State(state): State<AppState>,
    _auth: InternalAuth,
    Json(data): Json<CreateEventData>,
) -> Result<(StatusCode, Json<Event>)> {
    let event = Event::create(&state.pool, data).await?;

    tracing::info!(event_id = %event.id, name = %event.name, "Event created");

    Ok((StatusCode::CREATED, Json(event)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/:id", get(get_event))
        .route("/events/:id/tickets", get(list_event_tickets))
        .route("/internal/events", post(create_event))
}
