mod common;

use std::{net::SocketAddr, sync::Arc};

use axum::http::{Request, StatusCode};
use axum::{Router, body::Body, extract::ConnectInfo, routing::get};
use chrono::{NaiveDate, Utc};
use common::{TestApp, body_json, header, json_request};
use jsonwebtoken::{EncodingKey, Header, encode};
use khanqah_backend::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, apply_middleware,
    auth::Claims,
    config::{Env, ThrottleConfig},
    models::{AboutSection, AboutSubsection, Audio, Event, Video},
    repository::RepositoryState,
    storage::StorageState,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_SECRET: &str = "super-secure-test-secret-value-local";

fn bearer_token(user_id: Uuid, secret: &str, expires_in_secs: i64) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + expires_in_secs) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn gallery_request_with_token(token: &str) -> Request<Body> {
    Request::post("/api/gallery/")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(json!({"name_en": "Urs", "name_ur": "عرس"}).to_string()))
        .unwrap()
}

fn from_address(mut request: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    request
}

fn contact_request() -> Request<Body> {
    json_request(
        "POST",
        "/contact/send-message/",
        None,
        json!({
            "name": "Ahmed",
            "email": "ahmed@example.com",
            "subject": "Visit",
            "message": "Salaam"
        }),
    )
}

// --- Envelope, routing and fallbacks ---

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_returns_not_found_envelope() {
    let app = TestApp::new().await;
    let response = app.get("/api/does-not-exist/").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"status": "error", "message": "Resource not found."})
    );
}

#[tokio::test]
async fn test_wrong_method_returns_method_not_allowed_envelope() {
    let app = TestApp::new().await;
    let response = app
        .send(
            Request::put("/api/events/")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Method not allowed.");
}

#[tokio::test]
async fn test_invalid_path_parameter_is_a_bad_request() {
    let app = TestApp::new().await;
    let response = app.get("/api/events/not-a-number/").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], "error");
}

#[tokio::test]
async fn test_missing_event_is_not_found() {
    let app = TestApp::new().await;
    let response = app.get("/api/events/999/").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Resource not found.");
}

// --- Content reads ---

#[tokio::test]
async fn test_about_sections_are_wrapped_and_filtered() {
    let app = TestApp::new().await;
    {
        let mut store = app.repo.store.write().await;
        store.about_sections.push(AboutSection {
            id: 1,
            title_en: "History".into(),
            title_ur: "تاریخ".into(),
            order: 2,
            is_active: true,
            ..Default::default()
        });
        store.about_sections.push(AboutSection {
            id: 2,
            title_en: "Hidden".into(),
            is_active: false,
            ..Default::default()
        });
        store.about_subsections.push(AboutSubsection {
            id: 10,
            section_id: 1,
            title_en: "Founding".into(),
            is_active: true,
            ..Default::default()
        });
        store.about_subsections.push(AboutSubsection {
            id: 11,
            section_id: 1,
            title_en: "Draft".into(),
            is_active: false,
            ..Default::default()
        });
    }

    let response = app.get("/api/about/sections/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "cache-control"),
        Some("public, max-age=3600, must-revalidate")
    );

    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Success");
    let sections = body["data"].as_array().unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0]["title_en"], "History");
    let subsections = sections[0]["subsections"].as_array().unwrap();
    assert_eq!(subsections.len(), 1);
    assert_eq!(subsections[0]["title_en"], "Founding");
}

#[tokio::test]
async fn test_current_nasheen_absent_yields_empty_success() {
    let app = TestApp::new().await;
    let response = app.get("/api/about/current-nasheen/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert!(body.get("data").is_none() || body["data"].is_null());
}

#[tokio::test]
async fn test_events_render_bilingual_date_text() {
    let app = TestApp::new().await;
    app.repo.store.write().await.events.push(Event {
        id: 1,
        title_en: "Weekly Dhikr".into(),
        title_ur: "ہفتہ وار ذکر".into(),
        recurring_type: "weekly".into(),
        day_of_week: Some(4),
        ..Default::default()
    });

    let response = app.get("/api/events/").await;
    assert_eq!(response.status(), StatusCode::OK);
    // Not in the duration table: the API default applies.
    assert_eq!(
        header(&response, "cache-control"),
        Some("private, max-age=300, must-revalidate")
    );

    let body = body_json(response).await;
    let event = &body["data"][0];
    assert_eq!(event["title"]["english"], "Weekly Dhikr");
    assert!(event["date"]["english"].as_str().unwrap().contains("Thursday"));
}

#[tokio::test]
async fn test_audio_and_video_lists_are_newest_first() {
    let app = TestApp::new().await;
    {
        let mut store = app.repo.store.write().await;
        for (id, day) in [(1, 1), (2, 20), (3, 10)] {
            store.audios.push(Audio {
                id,
                english_title: format!("Bayaan {id}"),
                urdu_title: format!("بیان {id}"),
                audio_file: format!("audios/{id}.mp3"),
                category: "Bayaan".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            });
        }
        store.videos.push(Video {
            id: 1,
            english_title: "Talk".into(),
            urdu_title: "گفتگو".into(),
            youtube_url: "https://youtu.be/abc".into(),
            category: "Event".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        });
    }

    let body = body_json(app.get("/api/video-audios/audios/").await).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 3, 1]);
    assert_eq!(
        body["data"][0]["audioUrl"],
        "http://localhost:8000/media/audios/2.mp3"
    );

    let body = body_json(app.get("/api/video-audios/videos/").await).await;
    assert_eq!(body["data"][0]["youtubeUrl"], "https://youtu.be/abc");
}

// --- Authentication and authorization ---

#[tokio::test]
async fn test_authenticated_api_reads_are_private() {
    let app = TestApp::new().await;
    let response = app.get_as("/api/about/sections/", app.editor_id).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "cache-control"), Some("private, max-age=60"));
}

#[tokio::test]
async fn test_unknown_bypass_user_is_anonymous() {
    let app = TestApp::new().await;
    let response = app.get_as("/api/about/sections/", Uuid::new_v4()).await;

    assert_eq!(
        header(&response, "cache-control"),
        Some("public, max-age=3600, must-revalidate")
    );
}

#[tokio::test]
async fn test_write_without_credentials_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "POST",
            "/api/gallery/",
            None,
            json!({"name_en": "Urs", "name_ur": "عرس"}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"status": "error", "message": "Authentication required."})
    );
}

#[tokio::test]
async fn test_write_by_non_admin_is_forbidden() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "POST",
            "/api/gallery/",
            Some(app.editor_id),
            json!({"name_en": "Urs", "name_ur": "عرس"}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["message"],
        "You don't have permission to perform this action."
    );
}

#[tokio::test]
async fn test_bypass_header_is_ignored_in_production() {
    let config = AppConfig {
        env: Env::Production,
        ..AppConfig::default()
    };
    let app = TestApp::with_config(config).await;
    let response = app
        .send(json_request(
            "POST",
            "/api/gallery/",
            Some(app.admin_id),
            json!({"name_en": "Urs", "name_ur": "عرس"}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// --- Bearer tokens ---

#[tokio::test]
async fn test_valid_bearer_token_authenticates_admin() {
    let app = TestApp::with_config(AppConfig {
        env: Env::Production,
        jwt_secret: TEST_SECRET.into(),
        ..AppConfig::default()
    })
    .await;
    let token = bearer_token(app.admin_id, TEST_SECRET, 3600);

    let response = app.send(gallery_request_with_token(&token)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.repo.store.read().await.gallery_collections.len(), 1);
}

#[tokio::test]
async fn test_bearer_token_reads_are_private() {
    let app = TestApp::new().await;
    let token = bearer_token(app.editor_id, TEST_SECRET, 3600);

    let response = app
        .send(
            Request::get("/api/about/sections/")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "cache-control"), Some("private, max-age=60"));
}

#[tokio::test]
async fn test_expired_bearer_token_is_unauthorized() {
    let app = TestApp::new().await;
    let token = bearer_token(app.admin_id, TEST_SECRET, -3600);

    let response = app.send(gallery_request_with_token(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"status": "error", "message": "Authentication required."})
    );
}

#[tokio::test]
async fn test_bearer_token_with_wrong_signature_is_unauthorized() {
    let app = TestApp::new().await;
    let token = bearer_token(app.admin_id, "some-other-secret-entirely", 3600);

    let response = app.send(gallery_request_with_token(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let garbage = app.send(gallery_request_with_token("not.a.jwt")).await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bearer_token_for_deleted_user_is_unauthorized() {
    let app = TestApp::new().await;
    let token = bearer_token(app.admin_id, TEST_SECRET, 3600);
    app.repo
        .store
        .write()
        .await
        .users
        .retain(|user| user.id != app.admin_id);

    let response = app.send(gallery_request_with_token(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.repo.store.read().await.gallery_collections.is_empty());
}

#[tokio::test]
async fn test_admin_creates_gallery_collection() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "POST",
            "/api/gallery/",
            Some(app.admin_id),
            json!({"name_en": "Urs 2024", "name_ur": "عرس"}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Created successfully");
    assert_eq!(body["data"]["name_en"], "Urs 2024");
    assert_eq!(app.repo.store.read().await.gallery_collections.len(), 1);
}

#[tokio::test]
async fn test_malformed_json_is_an_error_envelope() {
    let app = TestApp::new().await;
    let response = app
        .send(
            Request::post("/api/gallery/")
                .header("content-type", "application/json")
                .header("x-user-id", app.admin_id.to_string())
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert!(response.status().is_client_error());
    assert_eq!(body_json(response).await["status"], "error");
}

// --- Contact form ---

#[tokio::test]
async fn test_contact_message_is_stored_and_never_cached() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "POST",
            "/contact/send-message/",
            None,
            json!({
                "name": "Ahmed",
                "email": "ahmed@example.com",
                "subject": "Visit",
                "message": "When is the next gathering?"
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        body_json(response).await,
        json!({"status": "success", "message": "Your message has been sent successfully"})
    );
    assert_eq!(app.repo.store.read().await.contact_messages.len(), 1);
}

#[tokio::test]
async fn test_contact_validation_failures_use_field_envelope() {
    let app = TestApp::new().await;
    let response = app
        .send(json_request(
            "POST",
            "/contact/send-message/",
            None,
            json!({"name": "", "email": "not-an-email", "subject": "Hi", "message": "Hello"}),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(
        body["message"],
        "Validation failed. Please check the errors below."
    );
    assert_eq!(body["errors"]["name"][0], "This field may not be blank.");
    assert_eq!(body["errors"]["email"][0], "Enter a valid email address.");
    assert!(app.repo.store.read().await.contact_messages.is_empty());
}

// --- Security headers ---

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let app = TestApp::new().await;
    let response = app.get("/api/events/").await;

    assert_eq!(header(&response, "x-content-type-options"), Some("nosniff"));
    assert_eq!(header(&response, "x-xss-protection"), Some("1; mode=block"));
    assert_eq!(
        header(&response, "referrer-policy"),
        Some("strict-origin-when-cross-origin")
    );
    assert_eq!(header(&response, "x-frame-options"), Some("SAMEORIGIN"));
    let csp = header(&response, "content-security-policy").unwrap();
    assert!(csp.starts_with("default-src 'self'; script-src 'self' 'unsafe-inline'; "), "{csp}");
    assert!(csp.contains("frame-src 'self' https://www.youtube.com https://www.google.com"), "{csp}");
    assert!(csp.ends_with("frame-ancestors 'none'"), "{csp}");
    assert!(header(&response, "strict-transport-security").is_none());
    assert!(header(&response, "x-request-id").is_some());
}

#[tokio::test]
async fn test_production_frame_options_deny() {
    let config = AppConfig {
        env: Env::Production,
        x_frame_options: Some("DENY".into()),
        ..AppConfig::default()
    };
    let app = TestApp::with_config(config).await;
    let response = app.get("/api/events/").await;
    assert_eq!(header(&response, "x-frame-options"), Some("DENY"));
}

#[tokio::test]
async fn test_production_adds_hsts() {
    let config = AppConfig {
        env: Env::Production,
        hsts_seconds: 600,
        ..AppConfig::default()
    };
    let app = TestApp::with_config(config).await;
    let response = app.get("/health").await;

    assert_eq!(
        header(&response, "strict-transport-security"),
        Some("max-age=600; includeSubDomains; preload")
    );
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let app = TestApp::new().await;
    let response = app.get("/api/events/12345/").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(header(&response, "cache-control").is_none());
    // Security headers still apply to errors.
    assert_eq!(header(&response, "x-content-type-options"), Some("nosniff"));
}

// --- Panic capture ---

async fn failing_handler() -> &'static str {
    panic!("handler failure");
}

#[tokio::test]
async fn test_handler_panic_becomes_generic_error_envelope() {
    let media_dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        media_root: media_dir.path().to_path_buf(),
        ..AppConfig::default()
    };
    let state = AppState::new(
        Arc::new(InMemoryRepository::new()) as RepositoryState,
        Arc::new(MockStorageService::new()) as StorageState,
        config,
    )
    .unwrap();
    let routes = Router::<AppState>::new().route("/api/failing/", get(failing_handler));
    let router = apply_middleware(routes, state);

    let response = router
        .oneshot(Request::get("/api/failing/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header(&response, "x-content-type-options"), Some("nosniff"));
    assert!(header(&response, "x-request-id").is_some());
    assert_eq!(
        body_json(response).await,
        json!({
            "status": "error",
            "message": "An unexpected error occurred. Please try again later."
        })
    );
}

// --- CORS ---

#[tokio::test]
async fn test_cors_echoes_only_configured_origins() {
    let app = TestApp::new().await;

    let allowed = app
        .send(
            Request::get("/api/events/")
                .header("origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(
        header(&allowed, "access-control-allow-origin"),
        Some("http://localhost:5173")
    );

    let refused = app
        .send(
            Request::get("/api/events/")
                .header("origin", "https://elsewhere.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(header(&refused, "access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_cors_preflight_for_writes() {
    let app = TestApp::with_config(AppConfig {
        cors_allowed_origins: vec!["https://khanqah.example".into()],
        ..AppConfig::default()
    })
    .await;

    let response = app
        .send(
            Request::options("/api/gallery/")
                .header("origin", "https://khanqah.example")
                .header("access-control-request-method", "PATCH")
                .header("access-control-request-headers", "authorization")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(response.status().is_success());
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("https://khanqah.example")
    );
    assert!(header(&response, "access-control-allow-methods").unwrap().contains("PATCH"));
}

#[tokio::test]
async fn test_cors_allow_all_flag() {
    let app = TestApp::with_config(AppConfig {
        cors_allow_all: true,
        ..AppConfig::default()
    })
    .await;
    let response = app
        .send(
            Request::get("/health")
                .header("origin", "https://anywhere.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(header(&response, "access-control-allow-origin"), Some("*"));
}

// --- Throttling ---

#[tokio::test]
async fn test_contact_form_is_throttled_per_address() {
    let app = TestApp::with_config(AppConfig {
        throttle: ThrottleConfig {
            contact_per_hour: 2,
            ..ThrottleConfig::default()
        },
        ..AppConfig::default()
    })
    .await;

    for _ in 0..2 {
        let response = app.send(from_address(contact_request(), [10, 0, 0, 1])).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let throttled = app.send(from_address(contact_request(), [10, 0, 0, 1])).await;
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = header(&throttled, "retry-after").unwrap().parse().unwrap();
    assert!(retry_after > 0);
    assert_eq!(header(&throttled, "x-content-type-options"), Some("nosniff"));
    let body = body_json(throttled).await;
    assert_eq!(body["status"], "error");
    assert_eq!(
        body["message"],
        format!("Request was throttled. Expected available in {retry_after} seconds.")
    );
    assert_eq!(app.repo.store.read().await.contact_messages.len(), 2);

    let other = app.send(from_address(contact_request(), [10, 0, 0, 2])).await;
    assert_eq!(other.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_anonymous_api_budget_spares_users_and_media() {
    let app = TestApp::with_config(AppConfig {
        throttle: ThrottleConfig {
            anon_per_hour: 1,
            ..ThrottleConfig::default()
        },
        ..AppConfig::default()
    })
    .await;

    assert_eq!(app.get("/api/events/").await.status(), StatusCode::OK);
    assert_eq!(
        app.get("/api/events/").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let signed_in = app.get_as("/api/events/", app.editor_id).await;
    assert_eq!(signed_in.status(), StatusCode::OK);
    assert_eq!(app.get("/health").await.status(), StatusCode::OK);
}
