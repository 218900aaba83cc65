pub mod event;
pub mod ticket;
pub mod user;

use serde::{Deserialize, Serialize};

pub use self::{event::Event, ticket::Ticket, user::User};

/// Body of every non-2xx response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Error {
    pub message: String,
}
