use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::SharedAppState;
use crate::{api, auth::AuthClaims, reservation};

pub(super) async fn list_events(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<api::Event>>, reservation::Error> {
    let events = state.coordinator.events().await?;
    Ok(Json(events.into_iter().map(api::Event::from).collect()))
}

pub(super) async fn get_event(
    State(state): State<SharedAppState>,
    Path(id): Path<api::event::Id>,
) -> Result<Json<api::Event>, reservation::Error> {
    let event = state.coordinator.event(id).await?;
    Ok(Json(event.into()))
}

pub(super) async fn add_event(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Json(input): Json<api::event::Input>,
) -> Result<(StatusCode, Json<api::Event>), reservation::Error> {
    let event = state
        .coordinator
        .publish_event(auth_claims.user_id, input.into())
        .await?;
    Ok((StatusCode::CREATED, Json(event.into())))
}

pub(super) async fn edit_event(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::event::Id>,
    Json(input): Json<api::event::Input>,
) -> Result<Json<api::Event>, reservation::Error> {
    let event = state
        .coordinator
        .edit_event(id, auth_claims.user_id, input.into())
        .await?;
    Ok(Json(event.into()))
}

pub(super) async fn delete_event(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
    Path(id): Path<api::event::Id>,
) -> Result<StatusCode, reservation::Error> {
    state
        .coordinator
        .withdraw_event(id, auth_claims.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
