use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, db};

pub use crate::db::ticket::{Attendee, Id, Status};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    pub ticket_number: String,
    pub event_id: api::event::Id,
    /// Absent once the event has been removed.
    pub event: Option<api::Event>,
    pub user_id: api::user::Id,
    #[serde(flatten)]
    pub attendee: Attendee,
    pub quantity: u32,
    pub total_amount: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub purchase_date: OffsetDateTime,
    pub status: Status,
}

impl Ticket {
    pub fn new(ticket: db::Ticket, event: Option<db::Event>) -> Self {
        Self {
            id: ticket.id,
            ticket_number: ticket.number.to_string(),
            event_id: ticket.event_id,
            event: event.map(api::Event::from),
            user_id: ticket.user_id,
            attendee: ticket.attendee,
            quantity: ticket.quantity,
            total_amount: ticket.total_amount,
            purchase_date: ticket.purchased_at,
            status: ticket.status,
        }
    }
}

/// Body of `POST /tickets`. The buyer is always the authenticated caller.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub event_id: api::event::Id,
    #[serde(flatten)]
    pub attendee: Attendee,
    pub quantity: u32,
}
