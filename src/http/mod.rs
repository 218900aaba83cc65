mod auth;
mod event;
mod ticket;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::{api, auth::AuthClaims, auth::Verifier, reservation};

pub use self::auth::AuthError;

pub type SharedAppState = Arc<AppState>;

pub struct AppState {
    pub coordinator: reservation::Coordinator,

    pub verifier: Verifier,
}

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/user", get(auth::get_user))
        .route("/events", get(event::list_events).post(event::add_event))
        .route(
            "/events/:id",
            get(event::get_event)
                .put(event::edit_event)
                .delete(event::delete_event),
        )
        .route("/tickets", post(ticket::purchase_ticket))
        .route("/tickets/my-tickets", get(ticket::my_tickets))
        .route("/tickets/:id", delete(ticket::cancel_ticket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.verifier.verify_headers(&parts.headers)?)
    }
}

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    let body = api::Error {
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for reservation::Error {
    fn into_response(self) -> Response {
        use reservation::Error as E;

        let status = match &self {
            E::Validation(_) => StatusCode::BAD_REQUEST,
            E::Forbidden(_) => StatusCode::FORBIDDEN,
            E::EventNotFound(_) | E::TicketNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            E::InsufficientInventory { .. }
            | E::AlreadyCancelled(_)
            | E::Conflict(_) => StatusCode::CONFLICT,
            E::Internal(e) => {
                error!("storage failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self)
    }
}
