use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::SharedAppState;
use crate::{api, auth::AuthClaims, reservation};

pub(super) async fn purchase_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(api::ticket::Purchase {
        event_id,
        attendee,
        quantity,
    }): Json<api::ticket::Purchase>,
) -> Result<(StatusCode, Json<api::Ticket>), reservation::Error> {
    let (ticket, event) = state
        .coordinator
        .purchase(
            auth_claims.user_id,
            reservation::Order {
                event_id,
                attendee,
                quantity,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(api::Ticket::new(ticket, Some(event))),
    ))
}

pub(super) async fn my_tickets(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<Vec<api::Ticket>>, reservation::Error> {
    let tickets = state.coordinator.tickets_of(auth_claims.user_id).await?;

    Ok(Json(
        tickets
            .into_iter()
            .map(|(ticket, event)| api::Ticket::new(ticket, event))
            .collect(),
    ))
}

pub(super) async fn cancel_ticket(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<api::Ticket>, reservation::Error> {
    let (ticket, event) =
        state.coordinator.cancel(id, auth_claims.user_id).await?;

    Ok(Json(api::Ticket::new(ticket, event)))
}
