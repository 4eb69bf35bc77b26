mod common;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::MockBackend;
use libris::api::{BookFilters, BookInput, Credentials, LibraryInput, Signup, SummaryRequest, UserUpdate};
use libris::chat::ChatPrompt;
use libris::http::{Attachment, RequestOptions};
use libris::model::{CurrentUser, Library};
use libris::{ApiError, MemorySessionStore, SessionStore};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn user(id: &str, name: &str) -> CurrentUser {
    CurrentUser::from_value(json!({"_id": id, "username": name})).unwrap()
}

#[tokio::test]
async fn books_by_creator_hits_query_and_returns_payload_unchanged() {
    let backend = MockBackend::start().await;
    let payload = json!({"result": [{"_id": "b1", "name": "Dune", "Created_By": {"_id": "u1"}}]});
    backend.respond("GET", "/books", 200, payload.clone());

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    let filters = BookFilters {
        created_by: Some("u1".into()),
        ..Default::default()
    };
    let data = api.get_books(&filters).await.unwrap();

    assert_eq!(data, payload);
    let req = backend.last();
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/books");
    assert_eq!(req.query.as_deref(), Some("created_by=u1"));
}

#[tokio::test]
async fn no_filters_means_no_query_string() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/libraries", 200, json!([]));

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    api.get_libraries(&Default::default()).await.unwrap();

    assert_eq!(backend.last().query, None);
}

#[tokio::test]
async fn forbidden_rejects_with_backend_message() {
    let backend = MockBackend::start().await;
    backend.respond("DELETE", "/books/b1", 403, json!({"error": "Forbidden"}));

    let api = backend.api(Arc::new(MemorySessionStore::with_token("tok")));
    let err = api.delete_book("b1").await.unwrap_err();

    assert_eq!(err.to_string(), "Forbidden");
    assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
}

#[tokio::test]
async fn error_message_falls_back_to_message_then_generic() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/libraries/l9/books", 404, json!({"message": "Library not found"}));
    backend.respond("GET", "/auth/profile/u1", 500, json!({}));

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    let err = api.get_library_books("l9").await.unwrap_err();
    assert_eq!(err.to_string(), "Library not found");

    let err = api.get_profile("u1").await.unwrap_err();
    assert_eq!(err.to_string(), "API Request Failed");
}

#[tokio::test]
async fn json_requests_carry_bearer_and_content_type() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/libraries", 201, json!({"library": {"_id": "l1"}}));

    let api = backend.api(Arc::new(MemorySessionStore::with_token("t0k")));
    let input = LibraryInput {
        name: Some("Central".into()),
        address: Some("Main St".into()),
        ..Default::default()
    };
    api.create_library(&input).await.unwrap();

    let req = backend.last();
    assert_eq!(req.header("authorization").as_deref(), Some("Bearer t0k"));
    assert_eq!(req.header("content-type").as_deref(), Some("application/json"));
    assert_eq!(req.json(), json!({"name": "Central", "address": "Main St"}));
}

#[tokio::test]
async fn signup_is_multipart_and_stores_returned_token() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/signup", 201, json!({"token": "fresh"}));

    let store = Arc::new(MemorySessionStore::new());
    let api = backend.api(store.clone());
    api.signup(Signup {
        username: "alice".into(),
        password: "pw".into(),
        avatar: Some(Attachment::new("me.png", vec![137u8, 80, 78, 71])),
    })
    .await
    .unwrap();

    let req = backend.last();
    let content_type = req.header("content-type").unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="), "{content_type}");
    let body = req.text();
    assert!(body.contains("name=\"Username\""));
    assert!(body.contains("alice"));
    assert!(body.contains("filename=\"me.png\""));
    assert_eq!(store.token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn multipart_keeps_bearer_header() {
    let backend = MockBackend::start().await;
    backend.respond("PATCH", "/auth/update/u1", 200, json!({"user": {"_id": "u1"}}));

    let api = backend.api(Arc::new(MemorySessionStore::with_token("t0k")));
    let update = UserUpdate {
        new_username: Some("bobby".into()),
        ..Default::default()
    };
    api.update_user("u1", &update).await.unwrap();

    let req = backend.last();
    assert_eq!(req.method, "PATCH");
    assert_eq!(req.header("authorization").as_deref(), Some("Bearer t0k"));
    assert!(req.header("content-type").unwrap().starts_with("multipart/form-data"));
    assert!(req.text().contains("name=\"newUsername\""));
}

#[tokio::test]
async fn login_stores_token_and_caches_user() {
    let backend = MockBackend::start().await;
    backend.respond(
        "POST",
        "/auth/login",
        200,
        json!({"token": "abc.def.ghi", "user": {"_id": "u1", "Username": "alice"}}),
    );

    let store = Arc::new(MemorySessionStore::new());
    let api = backend.api(store.clone());
    let creds = Credentials {
        username: "alice".into(),
        password: "pw".into(),
    };
    api.login(&creds).await.unwrap();

    assert_eq!(backend.last().json(), json!({"Username": "alice", "password": "pw"}));
    assert_eq!(store.token().as_deref(), Some("abc.def.ghi"));
    let me = api.current_user().unwrap();
    assert_eq!(me.id.as_deref(), Some("u1"));
    assert_eq!(me.username.as_deref(), Some("alice"));

    api.logout().unwrap();
    assert_eq!(store.token(), None);
    assert!(api.current_user().is_none());
}

#[tokio::test]
async fn second_login_replaces_cached_identity() {
    let backend = MockBackend::start().await;
    backend.respond(
        "POST",
        "/auth/login",
        200,
        json!({"token": "alice.tok.sig", "user": {"_id": "alice-id", "Username": "alice"}}),
    );
    let store = Arc::new(MemorySessionStore::new());
    let api = backend.api(store.clone());
    let creds = |name: &str| Credentials {
        username: name.into(),
        password: "pw".into(),
    };
    api.login(&creds("alice")).await.unwrap();
    assert_eq!(api.current_user().unwrap().id.as_deref(), Some("alice-id"));

    let claims = URL_SAFE_NO_PAD.encode(json!({"userId": "bob-id", "username": "bob"}).to_string());
    let bob_token = format!("h.{claims}.sig");
    backend.respond("POST", "/auth/login", 200, json!({"token": bob_token.clone()}));
    api.login(&creds("bob")).await.unwrap();

    assert_eq!(store.token().as_deref(), Some(bob_token.as_str()));
    assert_eq!(store.cached_user(), None);
    let me = api.current_user().unwrap();
    assert_eq!(me.id.as_deref(), Some("bob-id"));
    assert_eq!(me.username.as_deref(), Some("bob"));
}

#[tokio::test]
async fn unauthorized_tears_down_session() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/auth/profile/u1", 401, json!({"error": "jwt expired"}));

    let store = Arc::new(MemorySessionStore::with_token("stale"));
    let fired = Arc::new(AtomicBool::new(false));
    let hook = fired.clone();
    let http = backend
        .client(store.clone())
        .on_unauthorized(move || hook.store(true, Ordering::SeqCst));
    let api = libris::LibrisApi::new(http);

    let err = api.get_profile("u1").await.unwrap_err();

    assert!(matches!(&err, ApiError::Unauthorized { message } if message == "jwt expired"));
    assert_eq!(store.token(), None);
    assert!(fired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn rejected_login_does_not_report_an_expired_session() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/auth/login", 401, json!({"error": "Invalid credentials"}));

    let fired = Arc::new(AtomicBool::new(false));
    let hook = fired.clone();
    let http = backend
        .client(Arc::new(MemorySessionStore::new()))
        .on_unauthorized(move || hook.store(true, Ordering::SeqCst));
    let api = libris::LibrisApi::new(http);
    let creds = Credentials {
        username: "alice".into(),
        password: "wrong".into(),
    };

    let err = api.login(&creds).await.unwrap_err();

    assert!(matches!(&err, ApiError::Unauthorized { message } if message == "Invalid credentials"));
    assert!(!fired.load(Ordering::SeqCst));
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let backend = MockBackend::start().await;
    backend.respond_raw("GET", "/books", 200, "<html>oops</html>");

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    let err = api.get_books(&Default::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let config = libris::config::Config::new("http://127.0.0.1:1").unwrap();
    let http = libris::http::HttpClient::new(&config, libris::Session::in_memory()).unwrap();
    let err = libris::LibrisApi::new(http)
        .get_books(&Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn cancelled_request_resolves_promptly() {
    let backend = MockBackend::start().await;
    let client = backend.client(Arc::new(MemorySessionStore::new()));
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.request("/slow", RequestOptions::get().cancel(Some(token))),
    )
    .await
    .expect("cancellation should not wait for the response");
    assert!(matches!(result, Err(ApiError::Cancelled)));
}

#[tokio::test]
async fn cancellation_applies_to_every_facade_call() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/books", 200, json!([]));

    let token = CancellationToken::new();
    token.cancel();
    let api = backend
        .api(Arc::new(MemorySessionStore::new()))
        .with_cancellation(token);

    let err = api.get_books(&Default::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Cancelled));
}

#[tokio::test]
async fn headers_are_fixed_when_the_request_is_built() {
    let backend = MockBackend::start().await;
    let store = Arc::new(MemorySessionStore::with_token("early"));
    let client = backend.client(store.clone());

    let prepared = client.prepare("/books", &RequestOptions::get()).unwrap();
    store.clear().unwrap();

    assert_eq!(prepared.headers["authorization"], "Bearer early");
    let later = client.prepare("/books", &RequestOptions::get()).unwrap();
    assert!(later.headers.get("authorization").is_none());
}

#[tokio::test]
async fn suggest_decodes_chat_text() {
    let backend = MockBackend::start().await;
    let text = "{\n\"name\": \"Dune\",\n\"category\": \"Science Fiction\",\n\"author\": \"Frank Herbert\",\n\"topic\": \"ecology\",\n}{}\nshort\n";
    backend.respond("POST", "/chat", 200, json!({"data": text}));

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    let prompt = ChatPrompt {
        name: String::new(),
        category: "Science Fiction".into(),
        topic: "ecology".into(),
        author: String::new(),
    };
    let out = api.suggest(&prompt, "l7").await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name.as_deref(), Some("Dune"));
    assert_eq!(out[0].library.as_deref(), Some("l7"));
    assert_eq!(
        backend.last().json(),
        json!({"name": "", "category": "Science Fiction", "topic": "ecology", "author": ""})
    );
}

#[tokio::test]
async fn suggestion_library_is_last_owned_or_default() {
    let backend = MockBackend::start().await;
    backend.respond(
        "GET",
        "/libraries",
        200,
        json!({"result": [
            {"_id": "l1", "createdBy": {"_id": "u1"}},
            {"_id": "l2", "createdBy": {"Username": "bob"}},
            {"_id": "l3", "createdBy": {"id": "u2"}}
        ]}),
    );

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    assert_eq!(api.suggestion_library(&user("u1", "bob")).await.unwrap(), "l2");
    assert_eq!(
        api.suggestion_library(&user("u9", "nobody")).await.unwrap(),
        "Default Library"
    );
}

#[tokio::test]
async fn summary_reads_summary_then_data() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/summary", 200, json!({"summary": "A desert planet."}));

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    let req = SummaryRequest {
        name: "Dune".into(),
        category: "SF".into(),
        author: "Herbert".into(),
    };
    assert_eq!(api.get_summary(&req).await.unwrap(), "A desert planet.");

    backend.respond("POST", "/summary", 200, json!({"data": "Spice."}));
    assert_eq!(api.get_summary(&req).await.unwrap(), "Spice.");
}

#[tokio::test]
async fn book_with_cover_goes_multipart_update_goes_json() {
    let backend = MockBackend::start().await;
    backend.respond("POST", "/books", 201, json!({"book": {"_id": "b1"}}));
    backend.respond("PATCH", "/books/b1", 200, json!({"book": {"_id": "b1"}}));

    let api = backend.api(Arc::new(MemorySessionStore::with_token("t")));
    api.create_book(BookInput {
        name: Some("Dune".into()),
        category: Some("SF".into()),
        library: Some("l1".into()),
        cover: Some(Attachment::new("cover.jpg", vec![0xffu8, 0xd8])),
        ..Default::default()
    })
    .await
    .unwrap();
    let created = backend.last();
    assert!(created.header("content-type").unwrap().starts_with("multipart/form-data"));
    assert!(created.text().contains("name=\"library\""));

    api.update_book(
        "b1",
        BookInput {
            category: Some("Classic".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let updated = backend.last();
    assert_eq!(updated.path, "/books/b1");
    assert_eq!(updated.json(), json!({"category": "Classic"}));
}

#[tokio::test]
async fn deletes_map_to_their_endpoints() {
    let backend = MockBackend::start().await;
    backend.respond("DELETE", "/libraries/l1", 200, json!({"message": "deleted"}));
    backend.respond("DELETE", "/auth/delete/u1", 200, json!({"message": "deleted"}));
    backend.respond("PATCH", "/libraries/l1", 200, json!({"_id": "l1"}));

    let api = backend.api(Arc::new(MemorySessionStore::with_token("t")));
    api.update_library(
        "l1",
        &LibraryInput {
            name: Some("Renamed".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    api.delete_library("l1").await.unwrap();
    api.delete_user("u1").await.unwrap();

    let seen: Vec<(String, String)> = backend
        .requests()
        .into_iter()
        .map(|r| (r.method, r.path))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("PATCH".to_string(), "/libraries/l1".to_string()),
            ("DELETE".to_string(), "/libraries/l1".to_string()),
            ("DELETE".to_string(), "/auth/delete/u1".to_string()),
        ]
    );
}

#[tokio::test]
async fn dashboard_loads_books_and_libraries_together() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/books", 200, json!({"result": [{"_id": "b1", "name": "Dune"}]}));
    backend.respond(
        "GET",
        "/libraries",
        200,
        json!([
            {"_id": "l1", "name": "Mine", "Created_By": {"_id": "u1"}},
            {"_id": "l2", "name": "Theirs", "Created_By": {"_id": "u2"}}
        ]),
    );

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    let dash = api.dashboard(&user("u1", "bob")).await.unwrap();

    assert_eq!(dash.books.len(), 1);
    assert_eq!(dash.libraries.len(), 2);
    let owned: Vec<&str> = dash.owned_libraries.iter().map(|l: &Library| l.id.as_str()).collect();
    assert_eq!(owned, ["l1"]);
    assert!(
        backend
            .requests()
            .iter()
            .any(|r| r.path == "/books" && r.query.as_deref() == Some("created_by=u1"))
    );
}

#[tokio::test]
async fn dashboard_without_user_id_shows_no_books() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/books", 200, json!({"result": [{"_id": "b1"}, {"_id": "b2"}]}));
    backend.respond("GET", "/libraries", 200, json!([{"_id": "l1", "Created_By": {"_id": "u1"}}]));

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    let anonymous = CurrentUser::from_value(json!({"username": "bob"})).unwrap();
    let dash = api.dashboard(&anonymous).await.unwrap();

    assert!(dash.books.is_empty());
    assert!(dash.owned_libraries.is_empty());
    assert_eq!(dash.libraries.len(), 1);
    assert!(backend.requests().iter().all(|r| r.path != "/books"));
}

#[tokio::test]
async fn dashboard_fails_if_either_fetch_fails() {
    let backend = MockBackend::start().await;
    backend.respond("GET", "/books", 200, json!({"result": []}));
    backend.respond("GET", "/libraries", 500, json!({"error": "db down"}));

    let api = backend.api(Arc::new(MemorySessionStore::new()));
    let err = api.dashboard(&user("u1", "bob")).await.unwrap_err();
    assert_eq!(err.to_string(), "db down");
}
