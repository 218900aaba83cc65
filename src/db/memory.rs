//! In-process storage backend.
//!
//! Every mutation of a single record happens under the [`DashMap`] shard
//! lock of its key, which gives per-event (and per-ticket) mutual exclusion
//! without any global lock.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use super::{
    event, ticket, user, Error, Event, Events, Ticket, Tickets, User, Users,
};

#[derive(Debug, Default)]
pub struct Memory {
    events: DashMap<event::Id, Event>,
    tickets: DashMap<ticket::Id, Ticket>,
    numbers: DashMap<ticket::Number, ticket::Id>,
    users: DashMap<user::Id, User>,
    logins: DashMap<String, user::Id>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops an event regardless of the tickets referencing it.
    #[cfg(test)]
    pub(crate) fn forget_event(&self, id: event::Id) {
        self.events.remove(&id);
    }

    /// Stores `ticket` unless its number is already taken.
    fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket, Error> {
        match self.numbers.entry(ticket.number.clone()) {
            Entry::Occupied(_) => Err(Error::Conflict),
            Entry::Vacant(v) => {
                self.tickets.insert(ticket.id, ticket.clone());
                v.insert(ticket.id);
                Ok(ticket)
            }
        }
    }

    fn has_confirmed_tickets(&self, event_id: event::Id) -> bool {
        self.tickets.iter().any(|t| {
            t.event_id == event_id && t.status == ticket::Status::Confirmed
        })
    }
}

#[async_trait]
impl Events for Memory {
    async fn create_event(&self, event: &Event) -> Result<(), Error> {
        match self.events.entry(event.id) {
            Entry::Occupied(_) => Err(Error::Conflict),
            Entry::Vacant(v) => {
                v.insert(event.clone());
                Ok(())
            }
        }
    }

    async fn get_event(&self, id: event::Id) -> Result<Option<Event>, Error> {
        Ok(self.events.get(&id).map(|e| e.clone()))
    }

    async fn get_events_by_ids(
        &self,
        ids: &[event::Id],
    ) -> Result<HashMap<event::Id, Event>, Error> {
        Ok(ids
            .iter()
            .filter_map(|id| self.events.get(id).map(|e| (*id, e.clone())))
            .collect())
    }

    async fn list_events(&self) -> Result<Vec<Event>, Error> {
        let mut events =
            self.events.iter().map(|e| e.clone()).collect::<Vec<_>>();
        events.sort_by(|a, b| {
            (a.date, a.created_at, a.id).cmp(&(b.date, b.created_at, b.id))
        });
        Ok(events)
    }

    async fn update_event(
        &self,
        id: event::Id,
        draft: &event::Draft,
    ) -> Result<Event, Error> {
        let mut event =
            self.events.get_mut(&id).ok_or(Error::EventNotFound(id))?;

        let sold = event.sold_tickets();
        if draft.total_tickets < sold {
            return Err(Error::CapacityBelowSold { sold });
        }

        event.title.clone_from(&draft.title);
        event.description.clone_from(&draft.description);
        event.date = draft.date;
        event.time.clone_from(&draft.time);
        event.venue.clone_from(&draft.venue);
        event.price = draft.price;
        event.category.clone_from(&draft.category);
        event.image_url.clone_from(&draft.image_url);
        event.total_tickets = draft.total_tickets;
        event.available_tickets = draft.total_tickets - sold;
        Ok(event.clone())
    }

    async fn delete_event(&self, id: event::Id) -> Result<(), Error> {
        match self.events.entry(id) {
            Entry::Vacant(_) => Err(Error::EventNotFound(id)),
            Entry::Occupied(entry)
                if entry.get().sold_tickets() > 0
                    || self.has_confirmed_tickets(id) =>
            {
                Err(Error::EventHasTickets(id))
            }
            Entry::Occupied(entry) => {
                entry.remove();
                Ok(())
            }
        }
    }

    async fn adjust_availability(
        &self,
        id: event::Id,
        delta: i64,
    ) -> Result<Event, Error> {
        let mut event =
            self.events.get_mut(&id).ok_or(Error::EventNotFound(id))?;

        let available = i64::from(event.available_tickets) + delta;
        if available < 0 {
            return Err(Error::InsufficientInventory {
                available: event.available_tickets,
            });
        }
        if available > i64::from(event.total_tickets) {
            return Err(Error::CapacityExceeded {
                total: event.total_tickets,
            });
        }

        event.available_tickets = u32::try_from(available)
            .map_err(|_| Error::InvalidRow("available_tickets"))?;
        Ok(event.clone())
    }
}

#[async_trait]
impl Tickets for Memory {
    async fn issue_ticket(
        &self,
        draft: &ticket::Draft,
    ) -> Result<Ticket, Error> {
        self.insert_ticket(Ticket::issue(draft))
    }

    async fn get_ticket(
        &self,
        id: ticket::Id,
    ) -> Result<Option<Ticket>, Error> {
        Ok(self.tickets.get(&id).map(|t| t.clone()))
    }

    async fn tickets_by_user(
        &self,
        user_id: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        let mut tickets = self
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.clone())
            .collect::<Vec<_>>();
        tickets.sort_by(|a, b| {
            (b.purchased_at, b.id).cmp(&(a.purchased_at, a.id))
        });
        Ok(tickets)
    }

    async fn cancel_ticket(
        &self,
        id: ticket::Id,
        requester: user::Id,
    ) -> Result<Ticket, Error> {
        let mut ticket =
            self.tickets.get_mut(&id).ok_or(Error::TicketNotFound(id))?;
        if ticket.user_id != requester {
            return Err(Error::NotTicketOwner(id));
        }
        if ticket.status == ticket::Status::Cancelled {
            return Err(Error::AlreadyCancelled(id));
        }

        let before = ticket.clone();
        ticket.status = ticket::Status::Cancelled;
        Ok(before)
    }
}

#[async_trait]
impl Users for Memory {
    async fn create_user(&self, user: &User) -> Result<(), Error> {
        match self.logins.entry(user.login.clone()) {
            Entry::Occupied(_) => Err(Error::LoginTaken),
            Entry::Vacant(v) => {
                self.users.insert(user.id, user.clone());
                v.insert(user.id);
                Ok(())
            }
        }
    }

    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        Ok(self
            .logins
            .get(login)
            .and_then(|id| self.users.get(&*id).map(|u| u.clone())))
    }

    async fn get_user_by_id(
        &self,
        id: user::Id,
    ) -> Result<Option<User>, Error> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }
}
