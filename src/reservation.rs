//! Reservation Coordinator.
//!
//! The only place that mutates the inventory of an event and the ticket
//! ledger together. A purchase takes inventory first and issues the ticket
//! second, returning the inventory if issuing fails.

use std::{future::Future, sync::Arc};

use derive_more::Display;
use itertools::Itertools as _;
use tracing::{debug, error, info, warn};

use crate::db::{
    self, event, ticket, user, Event, Events as _, Store, Ticket, Tickets as _,
};

/// Attempts made for an operation that keeps hitting write conflicts.
const MAX_ATTEMPTS: usize = 3;

/// Largest ticket count a storage column holds.
pub const MAX_TICKETS: u32 = i32::MAX as u32;

#[derive(Debug, Display)]
pub enum Error {
    #[display("{_0}")]
    Validation(String),

    #[display("event {_0} not found")]
    EventNotFound(event::Id),

    #[display("ticket {_0} not found")]
    TicketNotFound(ticket::Id),

    #[display("{_0}")]
    Forbidden(&'static str),

    #[display(
        "requested {requested} tickets but only {available} are available"
    )]
    InsufficientInventory { requested: u32, available: u32 },

    #[display("ticket {_0} is already cancelled")]
    AlreadyCancelled(ticket::Id),

    #[display("{_0}")]
    Conflict(String),

    #[display("internal error")]
    Internal(db::Error),
}

impl From<db::Error> for Error {
    fn from(e: db::Error) -> Self {
        use db::Error as E;

        match e {
            E::EventNotFound(id) => Self::EventNotFound(id),
            E::TicketNotFound(id) => Self::TicketNotFound(id),
            E::NotTicketOwner(_) => {
                Self::Forbidden("only the owner can cancel a ticket")
            }
            E::AlreadyCancelled(id) => Self::AlreadyCancelled(id),
            E::InsufficientInventory { available } => {
                Self::InsufficientInventory {
                    requested: 0,
                    available,
                }
            }
            E::CapacityBelowSold { .. } => Self::Validation(e.to_string()),
            E::EventHasTickets(_) | E::LoginTaken | E::Conflict => {
                Self::Conflict(e.to_string())
            }
            E::CapacityExceeded { .. } | E::InvalidRow(_) | E::Postgres(_) => {
                Self::Internal(e)
            }
        }
    }
}

/// A purchase request of an authenticated buyer.
#[derive(Clone, Debug)]
pub struct Order {
    pub event_id: event::Id,
    pub attendee: ticket::Attendee,
    pub quantity: u32,
}

#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn Store>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub async fn events(&self) -> Result<Vec<Event>, Error> {
        Ok(self.store.list_events().await?)
    }

    pub async fn event(&self, id: event::Id) -> Result<Event, Error> {
        self.store
            .get_event(id)
            .await?
            .ok_or(Error::EventNotFound(id))
    }

    pub async fn publish_event(
        &self,
        organizer: user::Id,
        draft: event::Draft,
    ) -> Result<Event, Error> {
        validate_event(&draft)?;

        let event = Event::new(organizer, draft);
        retrying(|| self.store.create_event(&event)).await?;

        info!(
            event_id = %event.id,
            total = event.total_tickets,
            "event published"
        );
        Ok(event)
    }

    pub async fn edit_event(
        &self,
        id: event::Id,
        editor: user::Id,
        draft: event::Draft,
    ) -> Result<Event, Error> {
        validate_event(&draft)?;
        self.authorize_organizer(id, editor).await?;

        Ok(retrying(|| self.store.update_event(id, &draft)).await?)
    }

    pub async fn withdraw_event(
        &self,
        id: event::Id,
        editor: user::Id,
    ) -> Result<(), Error> {
        self.authorize_organizer(id, editor).await?;

        retrying(|| self.store.delete_event(id)).await?;
        info!(event_id = %id, "event withdrawn");
        Ok(())
    }

    async fn authorize_organizer(
        &self,
        id: event::Id,
        user_id: user::Id,
    ) -> Result<(), Error> {
        if self.event(id).await?.organizer != user_id {
            return Err(Error::Forbidden(
                "only the organizer can change an event",
            ));
        }
        Ok(())
    }

    /// Converts available inventory of an event into a ticket owned by
    /// `buyer`.
    pub async fn purchase(
        &self,
        buyer: user::Id,
        order: Order,
    ) -> Result<(Ticket, Event), Error> {
        let Order {
            event_id,
            attendee,
            quantity,
        } = order;
        if quantity < 1 {
            return Err(Error::Validation(
                "quantity must be at least 1".into(),
            ));
        }
        if quantity > MAX_TICKETS {
            return Err(Error::Validation(format!(
                "quantity must not exceed {MAX_TICKETS}"
            )));
        }
        let attendee = normalize_attendee(attendee)?;

        let event = retrying(|| {
            self.store
                .adjust_availability(event_id, -i64::from(quantity))
        })
        .await
        .map_err(|e| match e {
            db::Error::InsufficientInventory { available } => {
                Error::InsufficientInventory {
                    requested: quantity,
                    available,
                }
            }
            e => e.into(),
        })?;

        // The price is read together with the decrement, so the amount is
        // frozen at the moment the inventory is taken.
        let draft = ticket::Draft {
            event_id,
            user_id: buyer,
            attendee,
            quantity,
            total_amount: f64::from(quantity) * event.price,
        };
        match retrying(|| self.store.issue_ticket(&draft)).await {
            Ok(ticket) => {
                info!(
                    ticket_id = %ticket.id,
                    %event_id,
                    quantity,
                    "ticket purchased"
                );
                Ok((ticket, event))
            }
            Err(e) => {
                self.restore(event_id, quantity).await;
                Err(e.into())
            }
        }
    }

    /// Gives back inventory taken by a purchase whose ticket was not issued.
    async fn restore(&self, event_id: event::Id, quantity: u32) {
        let restored = retrying(|| {
            self.store
                .adjust_availability(event_id, i64::from(quantity))
        })
        .await;
        if let Err(e) = restored {
            error!(
                %event_id,
                quantity,
                "failed to restore inventory after failed issue: {e}"
            );
        }
    }

    /// Cancels a ticket of `requester` and returns its tickets to the event.
    ///
    /// The cancellation stands even if the event can no longer take the
    /// tickets back, in which case no event is returned.
    pub async fn cancel(
        &self,
        id: ticket::Id,
        requester: user::Id,
    ) -> Result<(Ticket, Option<Event>), Error> {
        let mut ticket =
            retrying(|| self.store.cancel_ticket(id, requester)).await?;

        let restored = retrying(|| {
            self.store.adjust_availability(
                ticket.event_id,
                i64::from(ticket.quantity),
            )
        })
        .await;
        let event = match restored {
            Ok(event) => {
                info!(
                    ticket_id = %id,
                    event_id = %ticket.event_id,
                    quantity = ticket.quantity,
                    "ticket cancelled"
                );
                Some(event)
            }
            Err(e) => {
                warn!(
                    ticket_id = %id,
                    event_id = %ticket.event_id,
                    quantity = ticket.quantity,
                    "ticket cancelled but inventory not restored: {e}"
                );
                None
            }
        };

        ticket.status = ticket::Status::Cancelled;
        Ok((ticket, event))
    }

    /// Tickets of `user_id` joined with their events, newest first. The event
    /// is absent if it was removed.
    pub async fn tickets_of(
        &self,
        user_id: user::Id,
    ) -> Result<Vec<(Ticket, Option<Event>)>, Error> {
        let tickets = self.store.tickets_by_user(user_id).await?;

        let event_ids = tickets
            .iter()
            .map(|ticket| ticket.event_id)
            .unique()
            .collect::<Vec<_>>();
        let events = self.store.get_events_by_ids(&event_ids).await?;

        Ok(tickets
            .into_iter()
            .map(|ticket| {
                let event = events.get(&ticket.event_id).cloned();
                (ticket, event)
            })
            .collect())
    }
}

async fn retrying<T, F, Fut>(mut op: F) -> Result<T, db::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, db::Error>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(db::Error::Conflict) if attempt < MAX_ATTEMPTS => {
                debug!(attempt, "write conflict, retrying");
                attempt += 1;
            }
            res => return res,
        }
    }
}

fn validate_event(draft: &event::Draft) -> Result<(), Error> {
    if draft.title.trim().is_empty() {
        return Err(Error::Validation("title is required".into()));
    }
    if !draft.price.is_finite() || draft.price < 0.0 {
        return Err(Error::Validation("price must not be negative".into()));
    }
    if draft.total_tickets < 1 {
        return Err(Error::Validation(
            "total tickets must be at least 1".into(),
        ));
    }
    if draft.total_tickets > MAX_TICKETS {
        return Err(Error::Validation(format!(
            "total tickets must not exceed {MAX_TICKETS}"
        )));
    }
    Ok(())
}

fn normalize_attendee(
    attendee: ticket::Attendee,
) -> Result<ticket::Attendee, Error> {
    let field = |value: String, name: &str| {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Validation(format!("{name} is required")));
        }
        Ok(value.to_owned())
    };
    Ok(ticket::Attendee {
        name: field(attendee.name, "attendee name")?,
        email: field(attendee.email, "attendee email")?,
        phone: field(attendee.phone, "attendee phone")?,
    })
}
