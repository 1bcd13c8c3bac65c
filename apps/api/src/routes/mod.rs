pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::calls::handlers as calls;
use crate::intake::handlers as intake;
use crate::referrals::handlers as referrals;
use crate::state::AppState;
use crate::webhook::handlers as webhook;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/db/ping", get(health::db_ping_handler))
        // Intake
        .route(
            "/api/candidates",
            get(intake::handle_list_candidates).post(intake::handle_create_candidate),
        )
        .route("/api/candidates/:id", get(intake::handle_get_candidate))
        .route("/api/workflows/start", post(intake::handle_create_candidate))
        // Referral link
        .route("/api/referrals/:token", post(referrals::handle_submit_referral))
        // Voice provider
        .route(
            "/api/vapi/webhook",
            post(webhook::handle_webhook).get(webhook::handle_webhook_probe),
        )
        .route(
            "/api/vapi/start-reference-call",
            post(calls::handle_start_reference_call),
        )
        .route("/api/calls", get(calls::handle_list_calls))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::models::candidate::{status, Stage, TaskStatus};
    use crate::testing::{
        test_config, BrokenWritesStore, FakeCaller, FakeClassifier, FakeMailer, TestHarness,
    };
    use crate::webhook::handlers::WEBHOOK_TOKEN_HEADER;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn end_of_call(call_id: &str, summary: &str, transcript: &str) -> Value {
        json!({
            "message": {
                "type": "end-of-call-report",
                "call": { "id": call_id },
                "endedReason": "customer-ended-call",
                "analysis": { "summary": summary },
                "artifact": { "transcript": transcript },
            }
        })
    }

    #[tokio::test]
    async fn test_health() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let app = build_router(harness.state(test_config()));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_candidate_to_decision_flow() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let app = build_router(harness.state(test_config()));

        let (status, body) = send(
            &app,
            post_json(
                "/api/candidates",
                json!({ "fullName": "Sam Lee", "email": "sam@x.com", "companyName": "Acme" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let token = body["candidate"]["referralToken"].as_str().unwrap().to_string();
        let id = body["candidate"]["id"].as_str().unwrap().to_string();
        assert_eq!(harness.mailer.sent().len(), 1);

        let (status, body) = send(
            &app,
            post_json(
                &format!("/api/referrals/{token}"),
                json!({ "refName": "Pat Kim", "refPhone": "+15551234567" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "callId": "call_1" }));
        assert_eq!(harness.caller.requests()[0].company_name, "Acme");

        let transcript = "AI: How was working with Sam? User: Great. ".repeat(12);
        let (status, body) = send(
            &app,
            post_json(
                "/api/vapi/webhook",
                end_of_call("call_1", "positive feedback", &transcript),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert_eq!(harness.classifier.calls(), 1);

        let request = Request::builder()
            .uri(format!("/api/candidates/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], json!(Stage::Decision));
        assert_eq!(body["status"], status::REF_CALL_PASSED);
        assert_eq!(body["humanCheckNeeded"], false);
        assert_eq!(body["tasks"]["referralResponses"], json!(TaskStatus::Done));
        assert_eq!(body["referenceCall"]["verdict"], "PASS");

        let records = harness.store.call_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].call_id, "call_1");
        assert_eq!(harness.store.raw_events().len(), 1);
    }

    #[tokio::test]
    async fn test_calls_listing_filters_by_candidate() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("fail"));
        let app = build_router(harness.state(test_config()));
        let mut payload = end_of_call("call_9", "hesitant", &"x".repeat(200));
        payload["message"]["artifact"]["variableValues"] = json!({ "candidate_name": "Sam Lee" });
        send(&app, post_json("/api/vapi/webhook", payload)).await;

        let request = Request::builder()
            .uri("/api/calls?candidate_name=Sam%20Lee")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);
        assert_eq!(body["results"][0]["verdict"], "FAIL");

        let request = Request::builder()
            .uri("/api/calls?candidate_name=Someone%20Else")
            .body(Body::empty())
            .unwrap();
        let (_, body) = send(&app, request).await;
        assert!(body["results"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_token() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let mut config = test_config();
        config.webhook_token = Some("s3cret".into());
        let app = build_router(harness.state(config));

        let mut request = post_json("/api/vapi/webhook", end_of_call("call_1", "ok", "short"));
        request
            .headers_mut()
            .insert(WEBHOOK_TOKEN_HEADER, "wrong".parse().unwrap());
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        assert!(harness.store.raw_events().is_empty());

        let mut request = post_json("/api/vapi/webhook", json!({ "type": "status-update" }));
        request
            .headers_mut()
            .insert(WEBHOOK_TOKEN_HEADER, "s3cret".parse().unwrap());
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_non_terminal_event_only_logs() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let app = build_router(harness.state(test_config()));

        let (status, body) = send(
            &app,
            post_json(
                "/api/vapi/webhook",
                json!({ "message": { "type": "status-update", "call": { "id": "call_1" } } }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert_eq!(harness.store.raw_events().len(), 1);
        assert!(harness.store.call_records().is_empty());
        assert_eq!(harness.classifier.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_email_is_bad_request() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let app = build_router(harness.state(test_config()));
        let (status, body) = send(
            &app,
            post_json(
                "/api/workflows/start",
                json!({ "fullName": "Sam Lee", "email": "not-an-email" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(harness.store.candidates().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_referral_token_is_not_found() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let app = build_router(harness.state(test_config()));
        let (status, _) = send(
            &app,
            post_json("/api/referrals/missing", json!({ "refPhone": "+15551234567" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(harness.caller.requests().is_empty());
    }

    #[tokio::test]
    async fn test_start_call_requires_fields() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let app = build_router(harness.state(test_config()));
        let (status, _) = send(
            &app,
            post_json("/api/vapi/start-reference-call", json!({ "candidateName": "Sam" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            post_json(
                "/api/vapi/start-reference-call",
                json!({ "candidateName": "Sam", "companyName": "Acme", "referencePhone": "+1555" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["callId"], "call_1");
    }

    #[tokio::test]
    async fn test_mistyped_fields_are_bad_request() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let app = build_router(harness.state(test_config()));

        let (status, body) = send(
            &app,
            post_json("/api/candidates", json!({ "fullName": "Sam", "email": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(harness.store.candidates().is_empty());
        assert!(harness.mailer.sent().is_empty());

        let (status, body) = send(
            &app,
            post_json("/api/referrals/x", json!({ "refPhone": 15551234567u64 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(harness.caller.requests().is_empty());
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let harness = TestHarness::new(FakeCaller::working(), FakeClassifier::replying("pass"));
        let app = build_router(harness.state(test_config()));

        let request = Request::builder()
            .method("POST")
            .uri("/api/referrals/x")
            .body(Body::from(json!({ "refPhone": "+15551234567" }).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let request = Request::builder()
            .method("POST")
            .uri("/api/vapi/start-reference-call")
            .body(Body::from("not json"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(harness.caller.requests().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_when_writes_fail() {
        let store = Arc::new(BrokenWritesStore::default());
        let state = AppState {
            store: store.clone(),
            caller: Arc::new(FakeCaller::working()),
            classifier: Arc::new(FakeClassifier::replying("pass")),
            mailer: Arc::new(FakeMailer::working()),
            config: test_config(),
        };
        let app = build_router(state);

        let transcript = "AI: How was working with Sam? User: Great. ".repeat(12);
        let (status, body) = send(
            &app,
            post_json(
                "/api/vapi/webhook",
                end_of_call("call_1", "positive feedback", &transcript),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        assert_eq!(store.inner.raw_events().len(), 1);
        assert!(store.inner.call_records().is_empty());
    }
}
