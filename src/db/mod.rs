pub mod event;
pub mod memory;
pub mod ticket;
pub mod user;

use std::collections::HashMap;

use async_trait::async_trait;
use derive_more::{Display, From};
use tokio_postgres::{error::SqlState, tls::NoTlsStream, NoTls, Socket};

pub use self::{event::Event, memory::Memory, ticket::Ticket, user::User};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(url: &str) -> Result<(Client, Connection), Error> {
    let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
    Ok((Client(client), connection))
}

pub struct Client(tokio_postgres::Client);

impl Client {
    /// Creates missing tables. Existing data is left untouched.
    ///
    /// Concurrent callers are serialized by an advisory lock held for the
    /// duration of the transaction.
    pub async fn migrate(&self) -> Result<(), Error> {
        const SQL: &str = "\
            BEGIN; \
            SELECT pg_advisory_xact_lock(7461636b6574); \
            CREATE TABLE IF NOT EXISTS users ( \
                id UUID PRIMARY KEY, \
                name TEXT NOT NULL, \
                login TEXT NOT NULL UNIQUE, \
                password_hash TEXT NOT NULL \
            ); \
            CREATE TABLE IF NOT EXISTS events ( \
                id UUID PRIMARY KEY, \
                organizer_id UUID NOT NULL, \
                title TEXT NOT NULL, \
                description TEXT NOT NULL, \
                date DATE NOT NULL, \
                time TEXT NOT NULL, \
                venue TEXT NOT NULL, \
                price DOUBLE PRECISION NOT NULL CHECK (price >= 0), \
                category TEXT NOT NULL, \
                image_url TEXT NOT NULL DEFAULT '', \
                total_tickets INT NOT NULL CHECK (total_tickets >= 1), \
                available_tickets INT NOT NULL \
                    CHECK (available_tickets >= 0 \
                           AND available_tickets <= total_tickets), \
                created_at TIMESTAMPTZ NOT NULL \
            ); \
            CREATE TABLE IF NOT EXISTS tickets ( \
                id UUID PRIMARY KEY, \
                event_id UUID NOT NULL, \
                user_id UUID NOT NULL, \
                attendee_name TEXT NOT NULL, \
                attendee_email TEXT NOT NULL, \
                attendee_phone TEXT NOT NULL, \
                quantity INT NOT NULL CHECK (quantity >= 1), \
                total_amount DOUBLE PRECISION NOT NULL \
                    CHECK (total_amount >= 0), \
                ticket_number TEXT NOT NULL UNIQUE, \
                purchased_at TIMESTAMPTZ NOT NULL, \
                status SMALLINT NOT NULL \
            ); \
            CREATE INDEX IF NOT EXISTS tickets_user_id_idx \
                ON tickets (user_id); \
            CREATE INDEX IF NOT EXISTS tickets_event_id_idx \
                ON tickets (event_id); \
            COMMIT;";

        self.0.batch_execute(SQL).await?;
        Ok(())
    }
}

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("event {_0} not found")]
    EventNotFound(event::Id),

    #[display("ticket {_0} not found")]
    TicketNotFound(ticket::Id),

    #[display("ticket {_0} belongs to another user")]
    NotTicketOwner(ticket::Id),

    #[display("ticket {_0} is already cancelled")]
    AlreadyCancelled(ticket::Id),

    #[display("only {available} tickets available")]
    InsufficientInventory { available: u32 },

    #[display("available tickets would exceed the total of {total}")]
    CapacityExceeded { total: u32 },

    #[display("{sold} tickets are already sold")]
    CapacityBelowSold { sold: u32 },

    #[display("event {_0} still has tickets sold")]
    EventHasTickets(event::Id),

    #[display("login is already taken")]
    LoginTaken,

    #[display("concurrent write conflict")]
    Conflict,

    #[display("invalid `{_0}` column value")]
    InvalidRow(&'static str),

    #[from]
    #[display("{_0}")]
    Postgres(tokio_postgres::Error),
}

impl std::error::Error for Error {}

impl Error {
    /// Maps transient arbitration failures reported by PostgreSQL onto
    /// [`Error::Conflict`], so callers can retry them.
    fn classify(e: tokio_postgres::Error) -> Self {
        match e.code() {
            Some(code)
                if *code == SqlState::T_R_SERIALIZATION_FAILURE
                    || *code == SqlState::T_R_DEADLOCK_DETECTED
                    || *code == SqlState::UNIQUE_VIOLATION =>
            {
                Self::Conflict
            }
            _ => Self::Postgres(e),
        }
    }
}

/// Event Inventory Store.
#[async_trait]
pub trait Events: Send + Sync {
    async fn create_event(&self, event: &Event) -> Result<(), Error>;

    async fn get_event(&self, id: event::Id) -> Result<Option<Event>, Error>;

    async fn get_events_by_ids(
        &self,
        ids: &[event::Id],
    ) -> Result<HashMap<event::Id, Event>, Error>;

    async fn list_events(&self) -> Result<Vec<Event>, Error>;

    /// Replaces descriptive fields and the total, shifting availability by
    /// the change of the total.
    async fn update_event(
        &self,
        id: event::Id,
        draft: &event::Draft,
    ) -> Result<Event, Error>;

    /// Removes the event unless any of its tickets are taken, including
    /// ones reserved by a purchase that has not issued its ticket yet.
    async fn delete_event(&self, id: event::Id) -> Result<(), Error>;

    /// Atomically applies `available += delta` keeping
    /// `0 <= available <= total`.
    async fn adjust_availability(
        &self,
        id: event::Id,
        delta: i64,
    ) -> Result<Event, Error>;
}

/// Ticket Ledger.
#[async_trait]
pub trait Tickets: Send + Sync {
    /// Persists a confirmed ticket under a freshly generated number.
    async fn issue_ticket(&self, draft: &ticket::Draft)
        -> Result<Ticket, Error>;

    async fn get_ticket(&self, id: ticket::Id)
        -> Result<Option<Ticket>, Error>;

    async fn tickets_by_user(
        &self,
        user_id: user::Id,
    ) -> Result<Vec<Ticket>, Error>;

    /// Transitions a confirmed ticket owned by `requester` to cancelled and
    /// returns it as it was before the transition.
    async fn cancel_ticket(
        &self,
        id: ticket::Id,
        requester: user::Id,
    ) -> Result<Ticket, Error>;
}

#[async_trait]
pub trait Users: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), Error>;

    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error>;

    async fn get_user_by_id(&self, id: user::Id)
        -> Result<Option<User>, Error>;
}

pub trait Store: Events + Tickets + Users {}

impl<T: Events + Tickets + Users> Store for T {}
