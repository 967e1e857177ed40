mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{assert_error_envelope, bbq, TestApp};

#[tokio::test]
async fn admin_creates_event_with_empty_attendees() {
    let app = TestApp::new();
    let admin = app.admin("events@example.com").await;

    let mut body = bbq(Some(2));
    body["attendees"] = json!(["someone-else"]);
    let event = app.create_event(&admin, body).await;

    assert_eq!(event["title"], "Summer BBQ");
    assert_eq!(event["attendees"], json!([]));
    assert_eq!(event["maxAttendees"], 2);
    assert_eq!(event["createdBy"], admin.id);
}

#[tokio::test]
async fn create_validates_required_fields_and_dates() {
    let app = TestApp::new();
    let admin = app.admin("strict@example.com").await;

    let (status, body) = app.post("/api/events", &admin.token, json!({ "title": "Untitled" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");
    assert!(body["error"]["fields"]["location"].is_string());
    assert!(body["error"]["fields"]["date"].is_string());

    let mut backwards = bbq(None);
    backwards["endDate"] = json!("2030-07-04T15:00");
    let (status, body) = app.post("/api/events", &admin.token, backwards).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["fields"]["endDate"], "End time cannot be before start time");

    let (status, _) = app.post("/api/events", &admin.token, bbq(Some(0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn capacity_boundary() {
    let app = TestApp::new();
    let admin = app.admin("host@example.com").await;
    let event = app.create_event(&admin, bbq(Some(2))).await;
    let rsvp = format!("/api/events/{}/rsvp", event["id"].as_str().unwrap());

    let first = app.register("first@example.com").await;
    let second = app.register("second@example.com").await;
    let third = app.register("third@example.com").await;

    let (status, _) = app.request(Method::POST, &rsvp, Some(&first.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.request(Method::POST, &rsvp, Some(&second.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attendees"].as_array().unwrap().len(), 2);

    let (status, body) = app.request(Method::POST, &rsvp, Some(&third.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "VALIDATION_ERROR");
    assert_eq!(body["message"], "Event has reached maximum attendees.");

    // A cancellation frees the seat
    let (status, _) = app.request(Method::DELETE, &rsvp, Some(&first.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.request(Method::POST, &rsvp, Some(&third.token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rsvp_is_idempotent_per_user() {
    let app = TestApp::new();
    let admin = app.admin("idem@example.com").await;
    let user = app.register("twice@example.com").await;
    let event = app.create_event(&admin, bbq(None)).await;
    let id = event["id"].as_str().unwrap();
    let rsvp = format!("/api/events/{}/rsvp", id);

    let (status, _) = app.request(Method::POST, &rsvp, Some(&user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.request(Method::POST, &rsvp, Some(&user.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have already RSVP'd to this event");

    let (_, body) = app.get(&format!("/api/events/{}", id), &user.token).await;
    assert_eq!(body["data"]["attendees"], json!([user.id]));

    let (status, _) = app.request(Method::DELETE, &rsvp, Some(&user.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.request(Method::DELETE, &rsvp, Some(&user.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You have not RSVP'd to this event");
}

#[tokio::test]
async fn concurrent_rsvps_never_exceed_capacity() {
    let app = TestApp::new();
    let admin = app.admin("rush@example.com").await;
    let event = app.create_event(&admin, bbq(Some(3))).await;
    let id = event["id"].as_str().unwrap().to_string();

    let mut users = Vec::new();
    for i in 0..10 {
        users.push(app.register(&format!("guest{}@example.com", i)).await);
    }

    let mut handles = Vec::new();
    for user in users {
        let router = app.router.clone();
        let uri = format!("/api/events/{}/rsvp", id);
        handles.push(tokio::spawn(async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
                .body(Body::empty())
                .unwrap();
            router.oneshot(request).await.unwrap().status()
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => accepted += 1,
            StatusCode::BAD_REQUEST => {}
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(accepted, 3);

    let (_, body) = app.get(&format!("/api/events/{}", id), &admin.token).await;
    assert_eq!(body["data"]["attendees"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn update_cannot_drop_capacity_below_attendance() {
    let app = TestApp::new();
    let admin = app.admin("editor@example.com").await;
    let event = app.create_event(&admin, bbq(Some(5))).await;
    let id = event["id"].as_str().unwrap();

    for i in 0..2 {
        let user = app.register(&format!("seat{}@example.com", i)).await;
        let (status, _) = app
            .request(Method::POST, &format!("/api/events/{}/rsvp", id), Some(&user.token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let path = format!("/api/events/{}", id);
    let (status, body) = app.put(&path, &admin.token, json!({ "maxAttendees": 1 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["maxAttendees"].is_string());

    let (status, body) = app
        .put(&path, &admin.token, json!({ "maxAttendees": 2, "location": "Pool deck", "attendees": [] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["location"], "Pool deck");
    assert_eq!(body["data"]["attendees"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn null_capacity_makes_event_unlimited() {
    let app = TestApp::new();
    let admin = app.admin("uncap@example.com").await;
    let event = app.create_event(&admin, bbq(Some(1))).await;
    let id = event["id"].as_str().unwrap();
    let rsvp = format!("/api/events/{}/rsvp", id);

    let first = app.register("first@example.com").await;
    let second = app.register("second@example.com").await;
    let (status, _) = app.request(Method::POST, &rsvp, Some(&first.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.request(Method::POST, &rsvp, Some(&second.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(&format!("/api/events/{}", id), &admin.token, json!({ "maxAttendees": null }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["maxAttendees"].is_null());
    assert_eq!(body["data"]["title"], "Summer BBQ");

    let (status, body) = app.request(Method::POST, &rsvp, Some(&second.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["attendees"].as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lowering_capacity_during_rsvps_keeps_attendance_within_cap() {
    let app = TestApp::new();
    let admin = app.admin("squeeze@example.com").await;
    let event = app.create_event(&admin, bbq(Some(10))).await;
    let id = event["id"].as_str().unwrap().to_string();

    let mut users = Vec::new();
    for i in 0..8 {
        users.push(app.register(&format!("crowd{}@example.com", i)).await);
    }

    let mut handles = Vec::new();
    for (i, user) in users.into_iter().enumerate() {
        let router = app.router.clone();
        let rsvp = format!("/api/events/{}/rsvp", id);
        let edit = format!("/api/events/{}", id);
        let admin_token = admin.token.clone();
        handles.push(tokio::spawn(async move {
            if i == 4 {
                let request = Request::builder()
                    .method(Method::PUT)
                    .uri(edit)
                    .header(header::AUTHORIZATION, format!("Bearer {}", admin_token))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "maxAttendees": 2 }).to_string()))
                    .unwrap();
                let status = router.clone().oneshot(request).await.unwrap().status();
                assert!(status == StatusCode::OK || status == StatusCode::BAD_REQUEST, "cap update: {}", status);
            }
            let request = Request::builder()
                .method(Method::POST)
                .uri(rsvp)
                .header(header::AUTHORIZATION, format!("Bearer {}", user.token))
                .body(Body::empty())
                .unwrap();
            router.oneshot(request).await.unwrap().status()
        }));
    }
    for handle in handles {
        let status = handle.await.unwrap();
        assert!(status == StatusCode::OK || status == StatusCode::BAD_REQUEST, "rsvp: {}", status);
    }

    let (_, body) = app.get(&format!("/api/events/{}", id), &admin.token).await;
    let attendees = body["data"]["attendees"].as_array().unwrap().len() as u64;
    let cap = body["data"]["maxAttendees"].as_u64().unwrap();
    assert!(attendees <= cap, "{} attendees over a cap of {}", attendees, cap);
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let app = TestApp::new();
    let admin = app.admin("lister@example.com").await;
    for i in 0..3 {
        let mut body = bbq(None);
        body["title"] = json!(format!("Yoga {}", i));
        body["category"] = json!("fitness");
        app.create_event(&admin, body).await;
    }
    app.create_event(&admin, bbq(None)).await;

    let (status, body) = app.get("/api/events?category=fitness&limit=2", &admin.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], 3);
    assert_eq!(body["data"]["pagination"]["totalPages"], 2);

    let (_, body) = app.get("/api/events?search=bbq", &admin.token).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn missing_events_are_not_found() {
    let app = TestApp::new();
    let user = app.register("lost@example.com").await;

    for path in [
        "/api/events/00000000-0000-4000-8000-000000000000",
        "/api/events/not-a-uuid",
    ] {
        let (status, body) = app.get(path, &user.token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Event not found");
    }

    let (status, _) = app
        .request(
            Method::POST,
            "/api/events/00000000-0000-4000-8000-000000000000/rsvp",
            Some(&user.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
