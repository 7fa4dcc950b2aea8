// API-level tests through the full router - registration, login, credit
// flows, and billing confirmation over HTTP

use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::setup_test_app;

#[tokio::test]
async fn test_register_login_me_flow() {
    let app = setup_test_app().await;

    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "SecureP@ssw0rd1",
            "password_confirmation": "SecureP@ssw0rd1",
            "accept_terms": true
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await;
    assert!(body["success"].as_bool().unwrap());
    assert_eq!(body["data"]["plan"], "demo");
    assert_eq!(body["data"]["demo_limit"], 5);
    assert!(body["message"].as_str().unwrap().contains("5 free demo leads"));

    let response = app
        .post("/v1/auth/login")
        .json(&json!({
            "identifier": "alice@example.com",
            "password": "SecureP@ssw0rd1"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert_eq!(body["data"]["user"]["demo_leads_remaining"], 5);

    let response = app.get("/v1/auth/me").bearer(&token).send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["data"]["email"], "alice@example.com");
    assert_eq!(body["data"]["agreed_to_terms"], true);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_input() {
    let app = setup_test_app().await;

    let registration = json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": "SecureP@ssw0rd1",
        "password_confirmation": "SecureP@ssw0rd1",
        "accept_terms": true
    });
    let response = app.post("/v1/auth/register").json(&registration).send().await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Same email with different case
    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "username": "alice2",
            "email": "Alice@Example.com",
            "password": "SecureP@ssw0rd1",
            "password_confirmation": "SecureP@ssw0rd1",
            "accept_terms": true
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json().await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("email already registered"));

    // Weak password
    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "username": "weakling",
            "email": "weak@example.com",
            "password": "weak",
            "password_confirmation": "weak",
            "accept_terms": true
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Terms not accepted
    let response = app
        .post("/v1/auth/register")
        .json(&json!({
            "username": "lawyer",
            "email": "lawyer@example.com",
            "password": "SecureP@ssw0rd1",
            "password_confirmation": "SecureP@ssw0rd1",
            "accept_terms": false
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failure_messages_differ() {
    let app = setup_test_app().await;
    app.register_and_login("alice", "alice@example.com", "SecureP@ssw0rd1")
        .await;

    let response = app
        .post("/v1/auth/login")
        .json(&json!({"identifier": "alice", "password": "WrongP@ssw0rd1"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await;
    assert!(body["message"].as_str().unwrap().contains("Invalid password"));

    let response = app
        .post("/v1/auth/login")
        .json(&json!({"identifier": "nobody", "password": "WrongP@ssw0rd1"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await;
    assert!(body["message"].as_str().unwrap().contains("User not found"));
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = setup_test_app().await;

    let response = app.get("/v1/credits/stats").send().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/v1/auth/me").bearer("not-a-jwt").send().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_demo_consumption_over_http() {
    let app = setup_test_app().await;
    let token = app
        .register_and_login("alice", "alice@example.com", "SecureP@ssw0rd1")
        .await;

    for remaining in (0..5).rev() {
        let response = app
            .post("/v1/credits/demo/consume")
            .bearer(&token)
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await;
        assert_eq!(body["demo_leads_remaining"], remaining);
    }

    // Exhausted
    let response = app
        .post("/v1/credits/demo/consume")
        .bearer(&token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let response = app.get("/v1/credits/demo").bearer(&token).send().await;
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["is_demo"], true);
    assert_eq!(body["remaining"], 0);
}

#[tokio::test]
async fn test_purchase_and_consume_over_http() {
    let app = setup_test_app().await;
    let token = app
        .register_and_login("bob", "bob@example.com", "SecureP@ssw0rd1")
        .await;

    // Pricing is public
    let response = app.get("/v1/billing/pricing").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let tiers: serde_json::Value = response.json().await;
    assert_eq!(tiers.as_array().unwrap().len(), 3);

    // Confirm a starter purchase (receipt email fails fast in tests and
    // must not affect the outcome)
    let response = app
        .post("/v1/billing/confirm")
        .bearer(&token)
        .json(&json!({
            "session_id": "cs_test_AB12CD34",
            "plan": "starter"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["credits_balance"], 500);
    assert_eq!(body["plan"], "starter");

    // Replay of the same session is rejected
    let response = app
        .post("/v1/billing/confirm")
        .bearer(&token)
        .json(&json!({
            "session_id": "cs_test_AB12CD34",
            "plan": "starter"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Check then consume
    let response = app
        .get("/v1/credits/check?required=100")
        .bearer(&token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["allowed"], true);

    let response = app
        .post("/v1/credits/consume")
        .bearer(&token)
        .json(&json!({
            "credits_used": 100,
            "leads_downloaded": 100,
            "platform": "twitter"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["credits_remaining"], 400);

    // Overdraw attempt
    let response = app
        .post("/v1/credits/consume")
        .bearer(&token)
        .json(&json!({
            "credits_used": 1000,
            "leads_downloaded": 1000,
            "platform": "twitter"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    // Stats reflect the whole story
    let response = app.get("/v1/credits/stats").bearer(&token).send().await;
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["current_credits"], 400);
    assert_eq!(body["total_purchased"], 500);
    assert_eq!(body["total_leads_downloaded"], 100);

    // Invoice for the purchase
    let response = app
        .get("/v1/billing/invoice/cs_test_AB12CD34")
        .bearer(&token)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["invoice_number"], "LGE-AB12CD34");
    assert_eq!(body["amount_usd"], 97);
}

#[tokio::test]
async fn test_lead_masking_follows_plan() {
    let app = setup_test_app().await;
    let token = app
        .register_and_login("alice", "alice@example.com", "SecureP@ssw0rd1")
        .await;

    let leads = json!({"leads": [{
        "name": "Jane",
        "email": "jane@example.com",
        "handle": "jane_fit",
        "phone": "555-123-4567"
    }]});

    // Demo plan: contact details obscured
    let response = app
        .post("/v1/leads/prepare")
        .bearer(&token)
        .json(&leads)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["plan"], "demo");
    assert_eq!(body["leads"][0]["email"], "ja***@example.com");
    assert_eq!(body["leads"][0]["demo_mode"], true);

    // After an ultimate upgrade the same rows pass through untouched
    app.ledger()
        .add_credits(
            "alice",
            5000,
            lge_backend_core::GrantKind::PlanUpgrade(lge_backend_core::Plan::Ultimate),
            "cs_up",
        )
        .await
        .unwrap();

    let response = app
        .post("/v1/leads/prepare")
        .bearer(&token)
        .json(&leads)
        .send()
        .await;
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["plan"], "ultimate");
    assert_eq!(body["leads"][0]["email"], "jane@example.com");
    assert!(body["leads"][0].get("demo_mode").is_none());
}

#[tokio::test]
async fn test_password_reset_over_http() {
    let app = setup_test_app().await;
    app.register_and_login("alice", "alice@example.com", "SecureP@ssw0rd1")
        .await;

    // Unknown email still answers 200 with the generic message
    let response = app
        .post("/v1/auth/forgot-password")
        .json(&json!({"email": "stranger@example.com"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Mint a token directly; over HTTP it would arrive by email
    let token_info = app
        .state
        .password_reset_service
        .create_reset_request("alice@example.com")
        .await
        .unwrap()
        .unwrap();

    let response = app
        .post("/v1/auth/reset-password")
        .json(&json!({
            "token": token_info.token,
            "new_password": "BrandNewP@ss1",
            "confirm_password": "BrandNewP@ss1"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Old password is dead, new one works
    let response = app
        .post("/v1/auth/login")
        .json(&json!({"identifier": "alice", "password": "SecureP@ssw0rd1"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post("/v1/auth/login")
        .json(&json!({"identifier": "alice", "password": "BrandNewP@ss1"}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_close_account_over_http() {
    let app = setup_test_app().await;
    let token = app
        .register_and_login("alice", "alice@example.com", "SecureP@ssw0rd1")
        .await;

    let response = app.delete("/v1/auth/account").bearer(&token).send().await;
    assert_eq!(response.status(), StatusCode::OK);

    // The record is gone; the still-valid token no longer maps to a user
    let response = app.get("/v1/auth/me").bearer(&token).send().await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_test_app().await;

    let response = app.get("/health").send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "lge-backend");
}
