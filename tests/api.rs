use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header::AUTHORIZATION},
};
use http_body_util::BodyExt;
use miniapp_back::{
    clock::ManualClock,
    config::AppConfig,
    dao::game_store::memory::MemoryGameStore,
    routes,
    services::{auth_service::sign_init_data, energy_service},
    state::{AppState, SharedState},
};
use serde_json::{Value, json};
use tower::ServiceExt;

const HOUR: Duration = Duration::from_secs(60 * 60);
const BOT_TOKEN: &str = "123456:integration";
const ADMIN_TOKEN: &str = "admin-secret";

struct TestApp {
    state: SharedState,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new(debug_mode: bool) -> Self {
        let mut config = AppConfig::default();
        config.auth.bot_token = BOT_TOKEN.into();
        config.auth.debug_mode = debug_mode;
        config.auth.admin_token = Some(ADMIN_TOKEN.into());

        let clock = Arc::new(ManualClock::default());
        let state = AppState::with_store(config, clock.clone(), Arc::new(MemoryGameStore::new()));
        Self { state, clock }
    }

    fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn as_user(
        &self,
        method: Method,
        uri: &str,
        user: i64,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Telegram {}", unsigned_init_data(user)));
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }
}

fn user_json(id: i64) -> String {
    json!({ "id": id, "first_name": "Test", "username": format!("user{id}") }).to_string()
}

fn unsigned_init_data(id: i64) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("auth_date", "1700000000")
        .append_pair("user", &user_json(id))
        .finish()
}

#[tokio::test]
async fn healthcheck_reports_storage_state() {
    let app = TestApp::new(true);
    let (status, body) = app
        .send(Request::get("/healthcheck").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let degraded = routes::router(AppState::new(AppConfig::default()));
    let response = degraded
        .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        serde_json::from_slice::<Value>(&bytes).unwrap(),
        json!({ "status": "degraded" })
    );
}

#[tokio::test]
async fn farm_routes_require_telegram_auth() {
    let app = TestApp::new(false);
    let (status, _) = app
        .send(Request::get("/farm/status").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.as_user(Method::GET, "/farm/status", 1, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "unsigned data outside debug mode");
}

#[tokio::test]
async fn signed_init_data_authenticates() {
    let app = TestApp::new(false);
    let init_data = sign_init_data(
        &[("auth_date", "1700000000"), ("user", &user_json(77))],
        BOT_TOKEN,
    );
    let request = Request::post("/users/register")
        .header(AUTHORIZATION, format!("Telegram {init_data}"))
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["telegram_id"], 77);
    assert_eq!(body["username"], "user77");
}

#[tokio::test]
async fn harvest_cycle_over_http() {
    let app = TestApp::new(true);
    let (status, _) = app
        .as_user(Method::POST, "/users/register", 1, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.as_user(Method::POST, "/farm/harvest", 1, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["started_at_unix"], 1_700_000_000);

    let (status, _) = app.as_user(Method::POST, "/farm/harvest", 1, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.clock.advance(HOUR);
    let (_, body) = app.as_user(Method::GET, "/farm/status", 1, None).await;
    assert_eq!(body["is_in_progress"], true);
    assert_eq!(body["seconds_remaining"], 7 * 3600);
    assert_eq!(body["point_reward"], 800);

    let (status, _) = app.as_user(Method::PATCH, "/farm/claim", 1, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.clock.advance(7 * HOUR);
    let (_, body) = app.as_user(Method::GET, "/farm/status", 1, None).await;
    assert_eq!(body["is_in_progress"], false);
    assert_eq!(body["is_previous_claimed"], false);

    let (status, body) = app.as_user(Method::PATCH, "/farm/claim", 1, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "points_earned": 800 }));

    let (status, _) = app.as_user(Method::PATCH, "/farm/claim", 1, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.as_user(Method::GET, "/users/me", 1, None).await;
    assert_eq!(body["points"], 800);
}

#[tokio::test]
async fn referrer_receives_bonus_on_claims() {
    let app = TestApp::new(true);
    app.as_user(Method::POST, "/users/register", 1, Some(json!({})))
        .await;
    let (status, _) = app
        .as_user(Method::POST, "/users/register", 2, Some(json!({ "referrer_id": 1 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    app.as_user(Method::POST, "/farm/harvest", 2, None).await;
    app.clock.advance(8 * HOUR);
    app.as_user(Method::PATCH, "/farm/claim", 2, None).await;

    let (_, referrer) = app.as_user(Method::GET, "/users/me", 1, None).await;
    assert_eq!(referrer["referrals"], 1);
    assert_eq!(referrer["points"], 80);
}

#[tokio::test]
async fn registration_rejects_bad_referrers() {
    let app = TestApp::new(true);
    let (status, _) = app
        .as_user(Method::POST, "/users/register", 1, Some(json!({ "referrer_id": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .as_user(Method::POST, "/users/register", 1, Some(json!({ "referrer_id": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .as_user(Method::POST, "/users/register", 1, Some(json!({ "referrer_id": 9 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.as_user(Method::GET, "/users/me", 1, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn storage_routes_are_unavailable_while_degraded() {
    let app = TestApp::new(true);
    app.state.update_degraded(true);
    let (status, _) = app.as_user(Method::GET, "/farm/status", 1, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_energy_reset_requires_token() {
    let app = TestApp::new(true);
    app.as_user(Method::POST, "/users/register", 4, Some(json!({})))
        .await;
    let ctx = app.state.game_context().await.unwrap();
    energy_service::consume(&ctx, 4).await.unwrap();
    energy_service::consume(&ctx, 4).await.unwrap();

    let (status, _) = app
        .send(
            Request::delete("/admin/4/reset-energy")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Request::delete("/admin/4/reset-energy")
                .header("x-admin-token", "nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Request::delete("/admin/4/reset-energy")
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining_energy"], 3);

    let (status, _) = app
        .send(
            Request::delete("/admin/404/reset-energy")
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn daily_bonus_over_http() {
    let app = TestApp::new(true);
    let (status, _) = app.as_user(Method::GET, "/quests/daily", 5, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    app.as_user(Method::POST, "/users/register", 5, Some(json!({})))
        .await;

    let (status, body) = app.as_user(Method::GET, "/quests/daily", 5, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_available"], true);
    assert_eq!(body["has_never_been_claimed"], true);
    assert_eq!(body["daily_rewards"][6], json!({ "day": 7, "reward": 1200 }));

    let (status, body) = app
        .as_user(Method::POST, "/quests/daily/claim", 5, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "points_earned": 500 }));

    let (status, _) = app
        .as_user(Method::POST, "/quests/daily/claim", 5, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.clock.advance(25 * HOUR);
    let (_, body) = app
        .as_user(Method::POST, "/quests/daily/claim", 5, None)
        .await;
    assert_eq!(body["points_earned"], 640);

    let (_, body) = app.as_user(Method::GET, "/quests/daily", 5, None).await;
    assert_eq!(body["consecutive_days_claimed"], 2);
    assert_eq!(body["is_available"], false);
    let (_, body) = app.as_user(Method::GET, "/users/me", 5, None).await;
    assert_eq!(body["points"], 1140);
}

#[tokio::test]
async fn referral_quest_over_http() {
    let app = TestApp::new(true);
    let create = |token: &str| {
        Request::post("/admin/referral-quests")
            .header("x-admin-token", token)
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "referrals_required": 1, "point_reward": 2000 }).to_string(),
            ))
            .unwrap()
    };
    let (status, _) = app.send(create("nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, quest) = app.send(create(ADMIN_TOKEN)).await;
    assert_eq!(status, StatusCode::CREATED);
    let quest_id = quest["quest_id"].as_str().unwrap().to_owned();

    app.as_user(Method::POST, "/users/register", 1, Some(json!({})))
        .await;
    let claim_uri = format!("/quests/referral/{quest_id}/claim");
    let (status, _) = app.as_user(Method::POST, &claim_uri, 1, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.as_user(Method::POST, "/users/register", 2, Some(json!({ "referrer_id": 1 })))
        .await;
    let (_, list) = app.as_user(Method::GET, "/quests/referral", 1, None).await;
    assert_eq!(list[0]["ready_to_claim"], true);
    assert_eq!(list[0]["current_referrals"], 1);

    let (status, body) = app.as_user(Method::POST, &claim_uri, 1, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points_earned"], 2000);
    let (status, _) = app.as_user(Method::POST, &claim_uri, 1, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, single) = app
        .as_user(Method::GET, &format!("/quests/referral/{quest_id}"), 1, None)
        .await;
    assert_eq!(single["completed"], true);

    let (status, _) = app
        .as_user(Method::GET, "/quests/referral/not-a-uuid", 1, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn payment_update(user: i64, payload: &str) -> Request<Body> {
    let update = json!({
        "update_id": 10,
        "message": {
            "from": { "id": user, "username": "buyer" },
            "successful_payment": {
                "currency": "XTR",
                "total_amount": 1,
                "invoice_payload": payload,
                "telegram_payment_charge_id": "charge-1"
            }
        }
    });
    Request::post("/store/webhook")
        .header("content-type", "application/json")
        .body(Body::from(update.to_string()))
        .unwrap()
}

#[tokio::test]
async fn webhook_grants_paid_items() {
    let app = TestApp::new(true);
    app.as_user(Method::POST, "/users/register", 5, Some(json!({})))
        .await;
    let ctx = app.state.game_context().await.unwrap();
    energy_service::consume(&ctx, 5).await.unwrap();

    let (status, _) = app
        .send(payment_update(5, r#"{"store_item":"ENERGY_RECHARGE","item_kind_id":0}"#))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(energy_service::snapshot(&ctx, 5).await.unwrap().remaining, 3);

    let (status, _) = app
        .send(payment_update(5, r#"{"store_item":"CUSTOM_BALL_SKIN","item_kind_id":2}"#))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, profile) = app.as_user(Method::GET, "/users/me", 5, None).await;
    assert_eq!(profile["ball_skin_id"], 2);
    assert_eq!(profile["ball_hit_reward_id"], Value::Null);

    let (status, _) = app.send(payment_update(5, "not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
