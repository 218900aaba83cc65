use std::{collections::HashMap, error::Error as StdError};

use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Row,
};
use uuid::Uuid;

use super::{user, Client, Error, Events};

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub id: Id,
    pub organizer: user::Id,
    pub title: String,
    pub description: String,
    pub date: Date,
    pub time: String,
    pub venue: String,
    pub price: f64,
    pub category: String,
    pub image_url: String,
    pub total_tickets: u32,
    pub available_tickets: u32,
    pub created_at: OffsetDateTime,
}

impl Event {
    /// Publishes `draft` with the whole inventory available.
    pub fn new(organizer: user::Id, draft: Draft) -> Self {
        Self {
            id: Id::new(),
            organizer,
            title: draft.title,
            description: draft.description,
            date: draft.date,
            time: draft.time,
            venue: draft.venue,
            price: draft.price,
            category: draft.category,
            image_url: draft.image_url,
            total_tickets: draft.total_tickets,
            available_tickets: draft.total_tickets,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn sold_tickets(&self) -> u32 {
        self.total_tickets.saturating_sub(self.available_tickets)
    }
}

/// Organizer-editable part of an [`Event`].
#[derive(Clone, Debug)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub date: Date,
    pub time: String,
    pub venue: String,
    pub price: f64,
    pub category: String,
    pub image_url: String,
    pub total_tickets: u32,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl FromSql<'_> for Id {
    accepts!(UUID);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Uuid::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(UUID);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

const COLUMNS: &str = "\
    id, organizer_id, title, description, date, time, venue, price, \
    category, image_url, total_tickets, available_tickets, created_at";

fn count(row: &Row, column: &'static str) -> Result<u32, Error> {
    u32::try_from(row.get::<_, i32>(column))
        .map_err(|_| Error::InvalidRow(column))
}

fn from_row(row: &Row) -> Result<Event, Error> {
    Ok(Event {
        id: row.get("id"),
        organizer: row.get("organizer_id"),
        title: row.get("title"),
        description: row.get("description"),
        date: row.get("date"),
        time: row.get("time"),
        venue: row.get("venue"),
        price: row.get("price"),
        category: row.get("category"),
        image_url: row.get("image_url"),
        total_tickets: count(row, "total_tickets")?,
        available_tickets: count(row, "available_tickets")?,
        created_at: row.get("created_at"),
    })
}

fn to_int(value: u32, column: &'static str) -> Result<i32, Error> {
    i32::try_from(value).map_err(|_| Error::InvalidRow(column))
}

#[async_trait]
impl Events for Client {
    async fn create_event(&self, event: &Event) -> Result<(), Error> {
        let sql = format!(
            "INSERT INTO events ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        );

        self.0
            .execute(
                &sql,
                &[
                    &event.id,
                    &event.organizer,
                    &event.title,
                    &event.description,
                    &event.date,
                    &event.time,
                    &event.venue,
                    &event.price,
                    &event.category,
                    &event.image_url,
                    &to_int(event.total_tickets, "total_tickets")?,
                    &to_int(event.available_tickets, "available_tickets")?,
                    &event.created_at,
                ],
            )
            .await
            .map(drop)
            .map_err(Error::classify)
    }

    async fn get_event(&self, id: Id) -> Result<Option<Event>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM events WHERE id = $1");
        self.0
            .query_opt(&sql, &[&id])
            .await?
            .as_ref()
            .map(from_row)
            .transpose()
    }

    async fn get_events_by_ids(
        &self,
        ids: &[Id],
    ) -> Result<HashMap<Id, Event>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE id IN (SELECT unnest($1::UUID[]))"
        );
        self.0
            .query(&sql, &[&ids])
            .await?
            .iter()
            .map(|row| from_row(row).map(|event| (event.id, event)))
            .collect()
    }

    async fn list_events(&self) -> Result<Vec<Event>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM events \
             ORDER BY date ASC, created_at ASC, id ASC"
        );
        self.0.query(&sql, &[]).await?.iter().map(from_row).collect()
    }

    async fn update_event(
        &self,
        id: Id,
        draft: &Draft,
    ) -> Result<Event, Error> {
        // Expressions on the right of SET see the row before the update.
        let sql = format!(
            "UPDATE events \
             SET title = $2, description = $3, date = $4, time = $5, \
                 venue = $6, price = $7, category = $8, image_url = $9, \
                 available_tickets = \
                     available_tickets + ($10 - total_tickets), \
                 total_tickets = $10 \
             WHERE id = $1 \
               AND available_tickets + ($10 - total_tickets) >= 0 \
             RETURNING {COLUMNS}"
        );
        let total = to_int(draft.total_tickets, "total_tickets")?;

        let updated = self
            .0
            .query_opt(
                &sql,
                &[
                    &id,
                    &draft.title,
                    &draft.description,
                    &draft.date,
                    &draft.time,
                    &draft.venue,
                    &draft.price,
                    &draft.category,
                    &draft.image_url,
                    &total,
                ],
            )
            .await
            .map_err(Error::classify)?;
        if let Some(row) = updated {
            return from_row(&row);
        }

        match self.get_event(id).await? {
            Some(event) => Err(Error::CapacityBelowSold {
                sold: event.sold_tickets(),
            }),
            None => Err(Error::EventNotFound(id)),
        }
    }

    async fn delete_event(&self, id: Id) -> Result<(), Error> {
        const SQL: &str = "\
            DELETE FROM events \
            WHERE id = $1 \
              AND available_tickets = total_tickets \
              AND NOT EXISTS (SELECT 1 FROM tickets \
                              WHERE event_id = $1 AND status = $2)";

        let deleted = self
            .0
            .execute(SQL, &[&id, &super::ticket::Status::Confirmed])
            .await
            .map_err(Error::classify)?;
        if deleted > 0 {
            return Ok(());
        }

        match self.get_event(id).await? {
            Some(_) => Err(Error::EventHasTickets(id)),
            None => Err(Error::EventNotFound(id)),
        }
    }

    async fn adjust_availability(
        &self,
        id: Id,
        delta: i64,
    ) -> Result<Event, Error> {
        // A single conditional UPDATE takes the row lock, so concurrent
        // adjustments of one event serialize here.
        let sql = format!(
            "UPDATE events \
             SET available_tickets = available_tickets + $2 \
             WHERE id = $1 \
               AND available_tickets + $2 >= 0 \
               AND available_tickets + $2 <= total_tickets \
             RETURNING {COLUMNS}"
        );
        let delta = i32::try_from(delta).map_err(|_| {
            if delta < 0 {
                Error::InsufficientInventory { available: 0 }
            } else {
                Error::CapacityExceeded { total: 0 }
            }
        })?;

        let updated = self
            .0
            .query_opt(&sql, &[&id, &delta])
            .await
            .map_err(Error::classify)?;
        if let Some(row) = updated {
            return from_row(&row);
        }

        match self.get_event(id).await? {
            Some(event) if delta < 0 => Err(Error::InsufficientInventory {
                available: event.available_tickets,
            }),
            Some(event) => Err(Error::CapacityExceeded {
                total: event.total_tickets,
            }),
            None => Err(Error::EventNotFound(id)),
        }
    }
}
