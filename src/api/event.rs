use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::db;

pub use crate::db::event::Id;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Id,
    pub organizer: db::user::Id,
    pub title: String,
    pub description: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub time: String,
    pub venue: String,
    pub price: f64,
    pub category: String,
    pub image_url: String,
    pub total_tickets: u32,
    pub available_tickets: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<db::Event> for Event {
    fn from(event: db::Event) -> Self {
        Self {
            id: event.id,
            organizer: event.organizer,
            title: event.title,
            description: event.description,
            date: event.date,
            time: event.time,
            venue: event.venue,
            price: event.price,
            category: event.category,
            image_url: event.image_url,
            total_tickets: event.total_tickets,
            available_tickets: event.available_tickets,
            created_at: event.created_at,
        }
    }
}

/// Body of `POST /events` and `PUT /events/:id`.
///
/// `availableTickets` is not accepted; it follows from the total and the
/// tickets sold.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    pub title: String,
    pub description: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    pub time: String,
    pub venue: String,
    pub price: f64,
    pub category: String,
    #[serde(default)]
    pub image_url: String,
    pub total_tickets: u32,
}

impl From<Input> for db::event::Draft {
    fn from(input: Input) -> Self {
        Self {
            title: input.title.trim().to_owned(),
            description: input.description,
            date: input.date,
            time: input.time,
            venue: input.venue,
            price: input.price,
            category: input.category,
            image_url: input.image_url,
            total_tickets: input.total_tickets,
        }
    }
}
