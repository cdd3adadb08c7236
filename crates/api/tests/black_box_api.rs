use chrono::{Duration as ChronoDuration, Utc};
use gatepass_auth::{JwtClaims, Role};
use gatepass_core::UserId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = gatepass_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Caller {
    user_id: UserId,
    token: String,
}

fn mint(jwt_secret: &str, role: Role, name: Option<&str>, phone: Option<&str>) -> Caller {
    let now = Utc::now();
    let user_id = UserId::new();
    let claims = JwtClaims {
        sub: user_id,
        role,
        name: name.map(str::to_string),
        phone: phone.map(str::to_string),
        email: None,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt");

    Caller { user_id, token }
}

/// Submit + approve an event and attach one ticket type; returns
/// (event_id, ticket_type_id).
async fn seed_live_event_with_tickets(
    client: &reqwest::Client,
    base_url: &str,
    host: &Caller,
    admin: &Caller,
    price: u64,
    quantity: u64,
) -> (String, String) {
    let starts_at = Utc::now() + ChronoDuration::days(7);

    let res = client
        .post(format!("{}/events", base_url))
        .bearer_auth(&host.token)
        .json(&json!({
            "title": "Harbor Nights",
            "venue": "Pier 9",
            "starts_at": starts_at,
            "ends_at": starts_at + ChronoDuration::hours(5),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let event_id = body["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/events/{}/approve", base_url, event_id))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(format!("{}/tickets", base_url))
        .bearer_auth(&host.token)
        .json(&json!({
            "event_id": event_id,
            "name": "General Admission",
            "price": price,
            "quantity": quantity,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let ticket_type_id = body["id"].as_str().unwrap().to_string();

    (event_id, ticket_type_id)
}

async fn book(
    client: &reqwest::Client,
    base_url: &str,
    caller: &Caller,
    event_id: &str,
    ticket_type_id: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/bookings", base_url))
        .bearer_auth(&caller.token)
        .json(&json!({
            "event_id": event_id,
            "ticket_type_id": ticket_type_id,
        }))
        .send()
        .await
        .unwrap()
}

/// Listings converge asynchronously (command path vs projection update);
/// poll briefly until the expected count shows up.
async fn bookings_eventually(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    want: usize,
) -> serde_json::Value {
    for _ in 0..100 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if body["bookings"].as_array().map(|a| a.len()) == Some(want) {
                return body;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("bookings did not converge to {want} within timeout");
}

#[tokio::test]
async fn health_is_public_but_everything_else_requires_auth() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reflects_token_claims() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let host = mint(jwt_secret, Role::Host, Some("Hana"), None);
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(&host.token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["user_id"].as_str().unwrap(), host.user_id.to_string());
    assert_eq!(body["role"].as_str().unwrap(), "host");
}

#[tokio::test]
async fn booking_end_to_end_with_sellout() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let host = mint(jwt_secret, Role::Host, Some("Hana"), None);
    let admin = mint(jwt_secret, Role::Admin, None, None);
    let guest = mint(jwt_secret, Role::Guest, Some("Asha"), Some("+15550001111"));

    let (event_id, ticket_type_id) =
        seed_live_event_with_tickets(&client, &srv.base_url, &host, &admin, 1_000, 2).await;

    // First booking succeeds and returns both records.
    let res = book(&client, &srv.base_url, &guest, &event_id, &ticket_type_id).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();

    assert_eq!(body["booking"]["price_paid"].as_u64().unwrap(), 1_000);
    assert_eq!(body["booking"]["status"].as_str().unwrap(), "requested");
    assert_eq!(body["booking"]["refund_status"].as_str().unwrap(), "none");
    assert!(
        body["booking"]["check_in_code"]
            .as_str()
            .unwrap()
            .starts_with("CHK-")
    );

    assert_eq!(body["transaction"]["amount"].as_u64().unwrap(), 1_000);
    assert_eq!(body["transaction"]["platform_fee"].as_u64().unwrap(), 100);
    assert_eq!(body["transaction"]["payout_to_host"].as_u64().unwrap(), 900);
    assert_eq!(body["transaction"]["status"].as_str().unwrap(), "completed");
    assert!(
        body["transaction"]["provider_ref"]
            .as_str()
            .unwrap()
            .starts_with("mock_")
    );

    // The guest sees their booking, enriched with event + ticket summaries
    // and the contact snapshot from their token.
    let mine = bookings_eventually(
        &client,
        &format!("{}/bookings/my", srv.base_url),
        &guest.token,
        1,
    )
    .await;
    let entry = &mine["bookings"][0];
    assert_eq!(entry["event"]["title"].as_str().unwrap(), "Harbor Nights");
    assert_eq!(entry["ticket_type"]["price"].as_u64().unwrap(), 1_000);
    assert_eq!(entry["booker"]["phone"].as_str().unwrap(), "+15550001111");

    // Second unit goes to another guest; the pool is then dry.
    let other = mint(jwt_secret, Role::Guest, None, None);
    let res = book(&client, &srv.base_url, &other, &event_id, &ticket_type_id).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let third = mint(jwt_secret, Role::Guest, None, None);
    let res = book(&client, &srv.base_url, &third, &event_id, &ticket_type_id).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"].as_str().unwrap(), "sold_out");
}

#[tokio::test]
async fn pending_events_reject_bookings() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let host = mint(jwt_secret, Role::Host, None, None);
    let guest = mint(jwt_secret, Role::Guest, None, None);

    // Submit but never approve.
    let starts_at = Utc::now() + ChronoDuration::days(7);
    let res = client
        .post(format!("{}/events", srv.base_url))
        .bearer_auth(&host.token)
        .json(&json!({
            "title": "Unmoderated",
            "venue": "Warehouse 5",
            "starts_at": starts_at,
            "ends_at": starts_at + ChronoDuration::hours(2),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let event_id = body["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/tickets", srv.base_url))
        .bearer_auth(&host.token)
        .json(&json!({
            "event_id": event_id,
            "name": "GA",
            "price": 500,
            "quantity": 10,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let ticket_type_id = body["id"].as_str().unwrap().to_string();

    let res = book(&client, &srv.base_url, &guest, &event_id, &ticket_type_id).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"].as_str().unwrap(), "event_not_bookable");
}

#[tokio::test]
async fn ticket_must_belong_to_the_event_in_the_request() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let host = mint(jwt_secret, Role::Host, None, None);
    let admin = mint(jwt_secret, Role::Admin, None, None);
    let guest = mint(jwt_secret, Role::Guest, None, None);

    let (_event_a, ticket_of_a) =
        seed_live_event_with_tickets(&client, &srv.base_url, &host, &admin, 1_000, 5).await;
    let (event_b, _ticket_of_b) =
        seed_live_event_with_tickets(&client, &srv.base_url, &host, &admin, 2_000, 5).await;

    let res = book(&client, &srv.base_url, &guest, &event_b, &ticket_of_a).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"].as_str().unwrap(), "invalid_ticket_type");
}

#[tokio::test]
async fn declared_price_is_validated_against_the_ticket() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let host = mint(jwt_secret, Role::Host, None, None);
    let admin = mint(jwt_secret, Role::Admin, None, None);
    let guest = mint(jwt_secret, Role::Guest, None, None);

    let (event_id, ticket_type_id) =
        seed_live_event_with_tickets(&client, &srv.base_url, &host, &admin, 1_000, 5).await;

    let res = client
        .post(format!("{}/bookings", srv.base_url))
        .bearer_auth(&guest.token)
        .json(&json!({
            "event_id": event_id,
            "ticket_type_id": ticket_type_id,
            "price_paid": 5,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"].as_str().unwrap(), "price_mismatch");
}

#[tokio::test]
async fn role_gates_hold() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let guest = mint(jwt_secret, Role::Guest, None, None);
    let host = mint(jwt_secret, Role::Host, None, None);
    let admin = mint(jwt_secret, Role::Admin, None, None);

    // Guests cannot submit events.
    let starts_at = Utc::now() + ChronoDuration::days(1);
    let res = client
        .post(format!("{}/events", srv.base_url))
        .bearer_auth(&guest.token)
        .json(&json!({
            "title": "Nope",
            "venue": "Nowhere",
            "starts_at": starts_at,
            "ends_at": starts_at + ChronoDuration::hours(1),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Hosts cannot approve their own events.
    let res = client
        .post(format!(
            "{}/events/{}/approve",
            srv.base_url,
            gatepass_core::AggregateId::new()
        ))
        .bearer_auth(&host.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Listing gates.
    let res = client
        .get(format!("{}/bookings/host", srv.base_url))
        .bearer_auth(&guest.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(format!("{}/bookings/admin", srv.base_url))
        .bearer_auth(&host.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(format!("{}/bookings/admin", srv.base_url))
        .bearer_auth(&admin.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn host_booking_listing_is_scoped_to_own_events() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let host_a = mint(jwt_secret, Role::Host, Some("Hana"), None);
    let host_b = mint(jwt_secret, Role::Host, Some("Badru"), None);
    let admin = mint(jwt_secret, Role::Admin, None, None);

    let (event_a, tickets_a) =
        seed_live_event_with_tickets(&client, &srv.base_url, &host_a, &admin, 1_000, 5).await;
    let (event_b, tickets_b) =
        seed_live_event_with_tickets(&client, &srv.base_url, &host_b, &admin, 2_000, 5).await;

    for _ in 0..2 {
        let guest = mint(jwt_secret, Role::Guest, None, None);
        let res = book(&client, &srv.base_url, &guest, &event_a, &tickets_a).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }
    let guest = mint(jwt_secret, Role::Guest, None, None);
    let res = book(&client, &srv.base_url, &guest, &event_b, &tickets_b).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let for_a = bookings_eventually(
        &client,
        &format!("{}/bookings/host", srv.base_url),
        &host_a.token,
        2,
    )
    .await;
    for entry in for_a["bookings"].as_array().unwrap() {
        assert_eq!(entry["event_id"].as_str().unwrap(), event_a);
    }

    let for_b = bookings_eventually(
        &client,
        &format!("{}/bookings/host", srv.base_url),
        &host_b.token,
        1,
    )
    .await;
    assert_eq!(
        for_b["bookings"][0]["event_id"].as_str().unwrap(),
        event_b
    );

    let all = bookings_eventually(
        &client,
        &format!("{}/bookings/admin", srv.base_url),
        &admin.token,
        3,
    )
    .await;
    assert_eq!(all["bookings"].as_array().unwrap().len(), 3);
}
