//! Integration tests for the onboarding REST API.
//!
//! Each test spins up an Axum server on a random port and drives the real
//! HTTP contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use recruit_onboard::onboarding::sessions::DEFAULT_IDLE_TIMEOUT;
use recruit_onboard::onboarding::{
    OnboardingDeps, OnboardingRouteState, QueuedResumeAuthoring, SessionRegistry,
    onboarding_routes,
};
use recruit_onboard::store::{FlagStore, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start an Axum server on a random port, return its base URL.
async fn start_server() -> String {
    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let flags: Arc<dyn FlagStore> = db.clone();
    let deps = OnboardingDeps::new(db.clone())
        .with_authoring(Arc::new(QueuedResumeAuthoring::new(Arc::clone(&flags))));
    let sessions = Arc::new(SessionRegistry::new(DEFAULT_IDLE_TIMEOUT));
    let app = onboarding_routes(OnboardingRouteState::new(deps, flags, sessions));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

/// Start a session and return its id.
async fn start_session(client: &reqwest::Client, base: &str, body: Value) -> String {
    let resp = client
        .post(format!("{base}/api/onboarding/sessions"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

async fn act(client: &reqwest::Client, base: &str, session: &str, action: &str) -> reqwest::Response {
    client
        .post(format!("{base}/api/onboarding/sessions/{session}/actions"))
        .json(&json!({"action": action}))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn employer_flow_over_http() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/api/profiles"))
            .json(&json!({
                "user_id": "grace",
                "email": "grace@example.com",
                "name": "Grace",
                "role": "employer"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);

        let session = start_session(
            &client,
            &base,
            json!({"user_id": "grace", "role": "employer", "name": "Grace", "company": "Hopper Labs"}),
        )
        .await;

        let resp = client
            .patch(format!("{base}/api/onboarding/sessions/{session}/draft"))
            .json(&json!({"phone": "555-0100", "location": "Lisbon", "bio": "Hiring"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let view: Value = resp.json().await.unwrap();
        assert_eq!(view["missing_fields"], json!(["industry"]));

        // Industry still missing.
        let resp = act(&client, &base, &session, "next").await;
        assert_eq!(resp.status(), 422);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Please fill in: industry");
        assert_eq!(body["retryable"], false);

        client
            .patch(format!("{base}/api/onboarding/sessions/{session}/draft"))
            .json(&json!({"industry": "Technology"}))
            .send()
            .await
            .unwrap();

        let resp = act(&client, &base, &session, "next").await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["outcome"], "step");
        assert_eq!(body["step"], "resume_or_details");
        assert_eq!(body["available_actions"], json!(["previous", "complete_setup"]));

        // Employers cannot upload a resume.
        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{session}/resume"))
            .json(&json!({"file_name": "cv.pdf", "content_type": "application/pdf", "size_bytes": 10}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        let resp = act(&client, &base, &session, "complete_setup").await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["outcome"], "completed");
        assert_eq!(body["intent"], "employer_setup");
        assert_eq!(body["profile"]["onboarding_completed"], true);
        assert_eq!(body["profile"]["email"], "grace@example.com");

        // Session is gone once completed.
        let resp = client
            .get(format!("{base}/api/onboarding/sessions/{session}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let profile: Value = client
            .get(format!("{base}/api/profiles/grace"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(profile["company"], "Hopper Labs");
        assert_eq!(profile["industry"], "Technology");

        // Onboarded users cannot start again.
        let resp = client
            .post(format!("{base}/api/onboarding/sessions"))
            .json(&json!({"user_id": "grace", "role": "employer"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);

        let resp = client
            .post(format!("{base}/api/profiles/grace/reset-onboarding"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        start_session(&client, &base, json!({"user_id": "grace", "role": "employer"})).await;
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn job_seeker_upload_rules_over_http() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let session = start_session(
            &client,
            &base,
            json!({"user_id": "ada", "role": "job_seeker", "name": "Ada"}),
        )
        .await;

        client
            .patch(format!("{base}/api/onboarding/sessions/{session}/draft"))
            .json(&json!({"phone": "555-0100", "location": "Remote", "bio": "Engineer"}))
            .send()
            .await
            .unwrap();
        let resp = act(&client, &base, &session, "next").await;
        assert_eq!(resp.status(), 200);

        let resp = client
            .post(format!("{base}/api/onboarding/sessions/{session}/resume"))
            .json(&json!({"file_name": "cv.png", "content_type": "image/png", "size_bytes": 10}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Please upload a PDF file");

        // Unknown actions for the step are conflicts, not state changes.
        let resp = act(&client, &base, &session, "complete_setup").await;
        assert_eq!(resp.status(), 409);

        let resp = act(&client, &base, &session, "skip_for_now").await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["intent"], "skip_resume");
        assert_eq!(body["resume"]["mode"], "none");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn abandoned_session_is_removed() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let session = start_session(
            &client,
            &base,
            json!({"user_id": "ada", "role": "job_seeker"}),
        )
        .await;

        let resp = client
            .delete(format!("{base}/api/onboarding/sessions/{session}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client
            .get(format!("{base}/api/onboarding/sessions/{session}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let resp = client
            .get(format!("{base}/api/onboarding/sessions/not-a-uuid"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client.get(format!("{base}/api/profiles/ada")).send().await.unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn flags_default_false_and_persist() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let url = format!("{base}/api/flags/ada/tour_completed");

        let body: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["value"], false);

        let resp = client.put(&url).json(&json!({"value": true})).send().await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        assert_eq!(body["key"], "tour_completed");
        assert_eq!(body["value"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn repeated_start_returns_the_live_session() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        let first = start_session(
            &client,
            &base,
            json!({"user_id": "ada", "role": "job_seeker", "name": "Ada"}),
        )
        .await;

        let resp = client
            .post(format!("{base}/api/onboarding/sessions"))
            .json(&json!({"user_id": "ada", "role": "job_seeker"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["session_id"], first.as_str());
        assert_eq!(body["view"]["draft"]["name"], "Ada");

        // Same user, other role: refused rather than opening a second flow.
        let resp = client
            .post(format!("{base}/api/onboarding/sessions"))
            .json(&json!({"user_id": "ada", "role": "employer"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Your account is registered as a job seeker");

        // Once abandoned, a fresh start opens a new session.
        client
            .delete(format!("{base}/api/onboarding/sessions/{first}"))
            .send()
            .await
            .unwrap();
        let second = start_session(&client, &base, json!({"user_id": "ada", "role": "job_seeker"})).await;
        assert_ne!(second, first);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn signup_role_is_enforced_over_http() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server().await;
        let client = reqwest::Client::new();
        client
            .post(format!("{base}/api/profiles"))
            .json(&json!({
                "user_id": "grace",
                "email": "grace@example.com",
                "name": "Grace",
                "role": "employer"
            }))
            .send()
            .await
            .unwrap();

        let resp = client
            .post(format!("{base}/api/onboarding/sessions"))
            .json(&json!({"user_id": "grace", "role": "job_seeker"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 409);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["retryable"], false);
    })
    .await
    .expect("test timed out");
}
