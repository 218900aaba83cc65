use std::error::Error as StdError;

use async_trait::async_trait;
use derive_more::Display;
use enum_utils::TryFromRepr;
use rand::{distributions::Alphanumeric, Rng as _};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Row,
};
use uuid::Uuid;

use super::{event, user, Client, Error, Tickets};

#[derive(Clone, Debug, PartialEq)]
pub struct Ticket {
    pub id: Id,
    pub number: Number,
    pub event_id: event::Id,
    pub user_id: user::Id,
    pub attendee: Attendee,
    pub quantity: u32,
    pub total_amount: f64,
    pub purchased_at: OffsetDateTime,
    pub status: Status,
}

impl Ticket {
    /// Materializes a confirmed ticket from `draft` under a fresh number.
    pub fn issue(draft: &Draft) -> Self {
        let purchased_at = OffsetDateTime::now_utc();
        Self {
            id: Id::new(),
            number: Number::generate(purchased_at),
            event_id: draft.event_id,
            user_id: draft.user_id,
            attendee: draft.attendee.clone(),
            quantity: draft.quantity,
            total_amount: draft.total_amount,
            purchased_at,
            status: Status::Confirmed,
        }
    }
}

/// Everything about a ticket the buyer decides.
#[derive(Clone, Debug)]
pub struct Draft {
    pub event_id: event::Id,
    pub user_id: user::Id,
    pub attendee: Attendee,
    pub quantity: u32,
    pub total_amount: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Attendee {
    #[serde(rename = "attendeeName")]
    pub name: String,
    #[serde(rename = "attendeeEmail")]
    pub email: String,
    #[serde(rename = "attendeePhone")]
    pub phone: String,
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
        Id(Uuid::new_v4())
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

/// Human-readable ticket number, e.g. `TICK1718000000000K3J9QX2A`.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
pub struct Number(String);

impl Number {
    const PREFIX: &'static str = "TICK";

    const RANDOM_LEN: usize = 8;

    /// Millisecond timestamp followed by a random suffix, so two numbers only
    /// collide when drawn within the same millisecond with the same suffix.
    pub fn generate(at: OffsetDateTime) -> Self {
        let millis = at.unix_timestamp_nanos() / 1_000_000;
        let suffix = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(Self::RANDOM_LEN)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect::<String>();
        Self(format!("{}{millis}{suffix}", Self::PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, TryFromRepr, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Status {
    /// Tickets are subtracted from the event's availability.
    Confirmed = 1,

    /// Cancelled by the owner; tickets are returned to the event.
    Cancelled = 2,
}

impl FromSql<'_> for Status {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let status = Self::try_from(repr).map_err(|_| "invalid status")?;
        Ok(status)
    }
}

impl ToSql for Status {
    accepts!(INT2);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from((*self) as u8);
        repr.to_sql(ty, out)
    }
}

const COLUMNS: &str = "\
    id, ticket_number, event_id, user_id, attendee_name, attendee_email, \
    attendee_phone, quantity, total_amount, purchased_at, status";

fn from_row(row: &Row) -> Result<Ticket, Error> {
    Ok(Ticket {
        id: row.get("id"),
        number: Number(row.get("ticket_number")),
        event_id: row.get("event_id"),
        user_id: row.get("user_id"),
        attendee: Attendee {
            name: row.get("attendee_name"),
            email: row.get("attendee_email"),
            phone: row.get("attendee_phone"),
        },
        quantity: u32::try_from(row.get::<_, i32>("quantity"))
            .map_err(|_| Error::InvalidRow("quantity"))?,
        total_amount: row.get("total_amount"),
        purchased_at: row.get("purchased_at"),
        status: row.get("status"),
    })
}

#[async_trait]
impl Tickets for Client {
    async fn issue_ticket(&self, draft: &Draft) -> Result<Ticket, Error> {
        let sql = format!(
            "INSERT INTO tickets ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        let ticket = Ticket::issue(draft);
        let quantity = i32::try_from(ticket.quantity)
            .map_err(|_| Error::InvalidRow("quantity"))?;

        // A clashing number violates the unique index and surfaces as a
        // conflict, so a retry draws a new one.
        self.0
            .execute(
                &sql,
                &[
                    &ticket.id,
                    &ticket.number.as_str(),
                    &ticket.event_id,
                    &ticket.user_id,
                    &ticket.attendee.name,
                    &ticket.attendee.email,
                    &ticket.attendee.phone,
                    &quantity,
                    &ticket.total_amount,
                    &ticket.purchased_at,
                    &ticket.status,
                ],
            )
            .await
            .map_err(Error::classify)?;

        Ok(ticket)
    }

    async fn get_ticket(&self, id: Id) -> Result<Option<Ticket>, Error> {
        let sql = format!("SELECT {COLUMNS} FROM tickets WHERE id = $1");
        self.0
            .query_opt(&sql, &[&id])
            .await?
            .as_ref()
            .map(from_row)
            .transpose()
    }

    async fn tickets_by_user(
        &self,
        user_id: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM tickets \
             WHERE user_id = $1 \
             ORDER BY purchased_at DESC, id DESC"
        );
        self.0
            .query(&sql, &[&user_id])
            .await?
            .iter()
            .map(from_row)
            .collect()
    }

    async fn cancel_ticket(
        &self,
        id: Id,
        requester: user::Id,
    ) -> Result<Ticket, Error> {
        let sql = format!(
            "UPDATE tickets SET status = $4 \
             WHERE id = $1 AND user_id = $2 AND status = $3 \
             RETURNING {COLUMNS}"
        );

        let cancelled = self
            .0
            .query_opt(
                &sql,
                &[&id, &requester, &Status::Confirmed, &Status::Cancelled],
            )
            .await
            .map_err(Error::classify)?;
        if let Some(row) = cancelled {
            let mut ticket = from_row(&row)?;
            ticket.status = Status::Confirmed;
            return Ok(ticket);
        }

        match self.get_ticket(id).await? {
            None => Err(Error::TicketNotFound(id)),
            Some(ticket) if ticket.user_id != requester => {
                Err(Error::NotTicketOwner(id))
            }
            Some(_) => Err(Error::AlreadyCancelled(id)),
        }
    }
}
