pub mod common;

use event_ticketing::api;
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn purchases_ticket() {
    let base_url = common::spawn_server().await;
    let organizer =
        common::Client::new(&base_url).register("Olga", "olga").await;
    let alice = common::Client::new(&base_url).register("Alice", "alice").await;
    let event = organizer.add_event("Concert", 10.0, 50).await.unwrap();

    let ticket = alice.buy_ticket(event.id, 3).await.unwrap();
    assert_eq!(ticket.event_id, event.id);
    assert_eq!(ticket.user_id, alice.user_id());
    assert_eq!(ticket.quantity, 3);
    assert_eq!(ticket.total_amount, 30.0);
    assert_eq!(ticket.status, api::ticket::Status::Confirmed);
    assert_eq!(ticket.attendee.name, "Alice Smith");
    assert_eq!(ticket.attendee.email, "alice@example.com");
    assert!(ticket.ticket_number.starts_with("TICK"));
    assert_eq!(ticket.event.unwrap().available_tickets, 47);

    let event = alice.get_event(event.id).await.unwrap();
    assert_eq!(event.available_tickets, 47);
}

#[tokio::test]
async fn owner_comes_from_token_not_body() {
    let base_url = common::spawn_server().await;
    let organizer =
        common::Client::new(&base_url).register("Olga", "olga").await;
    let alice = common::Client::new(&base_url).register("Alice", "alice").await;
    let bob = common::Client::new(&base_url).register("Bob", "bob").await;
    let event = organizer.add_event("Concert", 10.0, 50).await.unwrap();

    let ticket = alice
        .buy_ticket_raw(json!({
            "eventId": event.id,
            "userId": bob.user_id(),
            "attendeeName": "Alice",
            "attendeeEmail": "alice@example.com",
            "attendeePhone": "+1 555 0100",
            "quantity": 1,
        }))
        .await
        .unwrap();
    assert_eq!(ticket.user_id, alice.user_id());
    assert!(bob.my_tickets().await.unwrap().is_empty());
}

#[tokio::test]
async fn purchase_requires_token() {
    let base_url = common::spawn_server().await;
    let organizer =
        common::Client::new(&base_url).register("Olga", "olga").await;
    let event = organizer.add_event("Concert", 10.0, 5).await.unwrap();

    let status = common::Client::new(&base_url)
        .buy_ticket(event.id, 1)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let event = organizer.get_event(event.id).await.unwrap();
    assert_eq!(event.available_tickets, 5);
}

#[tokio::test]
async fn rejects_zero_quantity() {
    let base_url = common::spawn_server().await;
    let organizer =
        common::Client::new(&base_url).register("Olga", "olga").await;
    let event = organizer.add_event("Concert", 10.0, 5).await.unwrap();

    let status = organizer.buy_ticket(event.id, 0).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let status = organizer
        .buy_ticket(event.id, 3_000_000_000)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_blank_attendee_fields() {
    let base_url = common::spawn_server().await;
    let organizer =
        common::Client::new(&base_url).register("Olga", "olga").await;
    let event = organizer.add_event("Concert", 10.0, 5).await.unwrap();

    let status = organizer
        .buy_ticket_raw(json!({
            "eventId": event.id,
            "attendeeName": "  ",
            "attendeeEmail": "olga@example.com",
            "attendeePhone": "+1 555 0100",
            "quantity": 1,
        }))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let event = organizer.get_event(event.id).await.unwrap();
    assert_eq!(event.available_tickets, 5);
}

#[tokio::test]
async fn unknown_event_is_not_found() {
    let base_url = common::spawn_server().await;
    let alice = common::Client::new(&base_url).register("Alice", "alice").await;

    let status = alice
        .buy_ticket(api::event::Id::new(), 1)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejects_more_than_available() {
    let base_url = common::spawn_server().await;
    let organizer =
        common::Client::new(&base_url).register("Olga", "olga").await;
    let alice = common::Client::new(&base_url).register("Alice", "alice").await;
    let event = organizer.add_event("Concert", 10.0, 2).await.unwrap();

    let status = alice.buy_ticket(event.id, 3).await.unwrap_err();
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(alice.my_tickets().await.unwrap().is_empty());

    let event = alice.get_event(event.id).await.unwrap();
    assert_eq!(event.available_tickets, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_never_oversell() {
    const N: u32 = 20;

    let base_url = common::spawn_server().await;
    let organizer =
        common::Client::new(&base_url).register("Olga", "olga").await;
    let alice = common::Client::new(&base_url).register("Alice", "alice").await;
    let event = organizer.add_event("Concert", 10.0, N - 1).await.unwrap();

    let results =
        join_all((0..N).map(|_| alice.buy_ticket(event.id, 1))).await;

    let sold = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| **r == Err(StatusCode::CONFLICT))
        .count();
    assert_eq!(sold, (N - 1) as usize);
    assert_eq!(refused, 1);

    let event = alice.get_event(event.id).await.unwrap();
    assert_eq!(event.available_tickets, 0);
    assert_eq!(alice.my_tickets().await.unwrap().len(), (N - 1) as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn last_ticket_goes_to_one_of_two_buyers() {
    let base_url = common::spawn_server().await;
    let organizer =
        common::Client::new(&base_url).register("Olga", "olga").await;
    let alice = common::Client::new(&base_url).register("Alice", "alice").await;
    let bob = common::Client::new(&base_url).register("Bob", "bob").await;
    let event = organizer.add_event("Concert", 10.0, 1).await.unwrap();

    let (a, b) =
        tokio::join!(alice.buy_ticket(event.id, 1), bob.buy_ticket(event.id, 1));

    assert!(a.is_ok() != b.is_ok());
    let refused = if a.is_ok() { b } else { a };
    assert_eq!(refused.unwrap_err(), StatusCode::CONFLICT);

    let event = organizer.get_event(event.id).await.unwrap();
    assert_eq!(event.available_tickets, 0);
}
