#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use constcat::concat;
use event_ticketing::{api, auth, db, http, reservation};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const EVENTS: &str = "/events";
const TICKETS: &str = "/tickets";
const MY_TICKETS: &str = concat!(TICKETS, "/my-tickets");

/// Starts the service over in-memory storage on an ephemeral port.
pub async fn spawn_server() -> String {
    let store = Arc::new(db::Memory::new());
    let state = Arc::new(http::AppState {
        coordinator: reservation::Coordinator::new(store),
        verifier: auth::Verifier::new(
            b"test-secret",
            Duration::from_secs(60 * 60),
        ),
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind");
    let addr = listener.local_addr().expect("no local address");
    tokio::spawn(async move {
        axum::serve(listener, http::router(state))
            .await
            .expect("server failed");
    });

    format!("http://{addr}")
}

#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
    base_url: String,
    pub auth_token: Option<String>,
    pub user: Option<api::User>,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.to_owned(),
            auth_token: None,
            user: None,
        }
    }

    pub async fn register(mut self, name: &str, login: &str) -> Self {
        let token = self
            .send::<api::user::Token>(self.post("/auth/register").json(
                &json!({
                    "name": name,
                    "login": login,
                    "password": "password",
                }),
            ))
            .await
            .expect("registration failed");

        self.auth_token = Some(token.token);
        self.user = Some(token.user);
        self
    }

    pub fn user_id(&self) -> api::user::Id {
        self.user.as_ref().expect("not registered").id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.post(self.url(path)))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.put(self.url(path)))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.authorized(self.inner.delete(self.url(path)))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, StatusCode> {
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<T>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn login(
        &self,
        login: &str,
        password: &str,
    ) -> Result<api::user::Token, StatusCode> {
        self.send(self.post("/auth/login").json(&json!({
            "login": login,
            "password": password,
        })))
        .await
    }

    pub async fn me(&self) -> Result<api::User, StatusCode> {
        self.send(self.get("/user")).await
    }

    pub async fn add_event(
        &self,
        title: &str,
        price: f64,
        total_tickets: u32,
    ) -> Result<api::Event, StatusCode> {
        self.send(self.post(EVENTS).json(&event_body(
            title,
            price,
            total_tickets,
        )))
        .await
    }

    pub async fn add_event_raw(
        &self,
        body: Value,
    ) -> Result<api::Event, StatusCode> {
        self.send(self.post(EVENTS).json(&body)).await
    }

    pub async fn edit_event(
        &self,
        id: api::event::Id,
        body: Value,
    ) -> Result<api::Event, StatusCode> {
        self.send(self.put(&format!("{EVENTS}/{id}")).json(&body))
            .await
    }

    pub async fn delete_event(
        &self,
        id: api::event::Id,
    ) -> Result<(), StatusCode> {
        self.delete(&format!("{EVENTS}/{id}"))
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))
            .map(drop)
    }

    pub async fn get_event(
        &self,
        id: api::event::Id,
    ) -> Result<api::Event, StatusCode> {
        self.send(self.get(&format!("{EVENTS}/{id}"))).await
    }

    pub async fn get_events(&self) -> Result<Vec<api::Event>, StatusCode> {
        self.send(self.get(EVENTS)).await
    }

    pub async fn buy_ticket(
        &self,
        event_id: api::event::Id,
        quantity: u32,
    ) -> Result<api::Ticket, StatusCode> {
        self.buy_ticket_raw(json!({
            "eventId": event_id,
            "attendeeName": "Alice Smith",
            "attendeeEmail": "alice@example.com",
            "attendeePhone": "+1 555 0100",
            "quantity": quantity,
        }))
        .await
    }

    pub async fn buy_ticket_raw(
        &self,
        body: Value,
    ) -> Result<api::Ticket, StatusCode> {
        self.send(self.post(TICKETS).json(&body)).await
    }

    pub async fn my_tickets(&self) -> Result<Vec<api::Ticket>, StatusCode> {
        self.send(self.get(MY_TICKETS)).await
    }

    pub async fn cancel_ticket(
        &self,
        id: api::ticket::Id,
    ) -> Result<api::Ticket, StatusCode> {
        self.send(self.delete(&format!("{TICKETS}/{id}"))).await
    }
}

pub fn event_body(title: &str, price: f64, total_tickets: u32) -> Value {
    json!({
        "title": title,
        "description": "An evening of live music",
        "date": "2030-06-01",
        "time": "19:30",
        "venue": "City Hall",
        "price": price,
        "category": "music",
        "totalTickets": total_tickets,
    })
}
