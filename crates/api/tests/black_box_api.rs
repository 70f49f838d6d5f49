use std::net::SocketAddr;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};
use ucaep_auth::{Role, TOKEN_ISSUER, TokenClaims};
use ucaep_core::{AccountId, SessionId};
use ucaep_infra::AppConfig;
use ucaep_infra::config::AdminSeed;

const JWT_SECRET: &str = "black-box-secret";
const ADMIN_EMAIL: &str = "admin@ucaep.test";
const ADMIN_PASSWORD: &str = "admin-password-1";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    async fn spawn_with(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::with_secret(JWT_SECRET);
        config.bcrypt_cost = 4;
        config.admin_seed = Some(AdminSeed {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        });
        tweak(&mut config);

        // Build app (same router as prod), but bind to an ephemeral port.
        let app = ucaep_api::app::build_app(config).await.expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, email: &str, password: &str, role: Option<&str>) -> reqwest::Response {
        let mut body = json!({
            "email": email,
            "password": password,
            "firstName": "Ama",
            "lastName": "Mensah",
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        self.client
            .post(self.url("/auth/register"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn login(&self, email: &str, password: &str) -> Value {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }

    async fn token_for(&self, email: &str, password: &str) -> String {
        self.login(email, password).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, sub: AccountId, role: Role) -> String {
    let now = Utc::now();
    let claims = TokenClaims {
        sub,
        email: "forged@ucaep.test".to_string(),
        role,
        iss: TOKEN_ISSUER.to_string(),
        jti: SessionId::new(),
        issued_at: now,
        expires_at: now + ChronoDuration::hours(1),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "token_invalid");
    assert_eq!(body["redirect"], "/login?returnTo=/auth/me");
}

#[tokio::test]
async fn register_login_and_read_own_account() {
    let server = TestServer::spawn().await;

    let res = server.register("Ama@Example.com", "producer-pass-1", None).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await.unwrap();
    assert_eq!(created["user"]["email"], "ama@example.com");
    assert_eq!(created["user"]["role"], "producer");
    assert!(created["user"].get("passwordHash").is_none());

    let login = server.login("ama@example.com", "producer-pass-1").await;
    assert_eq!(login["user"]["role"], "producer");
    let token = login["token"].as_str().unwrap();

    let res = server.get("/auth/me", token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["user"]["role"], "producer");
    let permissions: Vec<String> = serde_json::from_value(me["permissions"].clone()).unwrap();
    assert!(permissions.contains(&"profile:read".to_string()));
    assert!(!permissions.contains(&"user:delete".to_string()));
}

#[tokio::test]
async fn wrong_password_is_rejected_without_detail() {
    let server = TestServer::spawn().await;
    server.register("kofi@example.com", "producer-pass-1", None).await;

    let res = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "kofi@example.com", "password": "nope-nope-nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let server = TestServer::spawn().await;

    let first = server.register("dup@example.com", "producer-pass-1", None).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = server.register("DUP@example.com", "producer-pass-2", None).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"], "duplicate_email");
    assert_eq!(body["field"], "email");
}

#[tokio::test]
async fn self_registration_cannot_claim_admin() {
    let server = TestServer::spawn().await;

    let res = server.register("sneaky@example.com", "producer-pass-1", Some("admin")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "role");
}

#[tokio::test]
async fn producer_is_denied_admin_routes_and_the_denial_is_audited() {
    let server = TestServer::spawn().await;
    server.register("yaw@example.com", "producer-pass-1", None).await;
    let producer = server.token_for("yaw@example.com", "producer-pass-1").await;

    let res = server.get("/dashboard/admin", &producer).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_security_level");
    assert_eq!(body["redirect"], "/unauthorized");

    let res = server.get("/admin/accounts", &producer).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.get("/dashboard/producer", &producer).await;
    assert_eq!(res.status(), StatusCode::OK);

    let admin = server.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let res = server.get("/admin/audit?limit=100", &admin).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let entries = body["entries"].as_array().unwrap();
    let denial = entries
        .iter()
        .find(|e| e["action"] == "unauthorized_access" && e["resource"] == "/dashboard/admin")
        .expect("denial was not audited");
    assert_eq!(denial["details"]["reason"], "insufficient_role_level");
    assert_eq!(denial["role"], "producer");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let server = TestServer::spawn().await;
    let res = server.register("esi@example.com", "producer-pass-1", None).await;
    let created: Value = res.json().await.unwrap();
    let id: AccountId = created["user"]["id"].as_str().unwrap().parse().unwrap();

    let forged = mint_jwt("some-other-secret", id, Role::Admin);
    let res = server.get("/auth/me", &forged).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "token_invalid");
}

#[tokio::test]
async fn role_change_applies_on_the_next_request() {
    let server = TestServer::spawn().await;
    let res = server.register("abena@example.com", "producer-pass-1", None).await;
    let created: Value = res.json().await.unwrap();
    let id = created["user"]["id"].as_str().unwrap().to_string();
    let user = server.token_for("abena@example.com", "producer-pass-1").await;

    let res = server.get("/dashboard/moderation", &user).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let admin = server.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let res = server
        .client
        .put(server.url(&format!("/admin/accounts/{id}/role")))
        .bearer_auth(&admin)
        .json(&json!({ "role": "moderator" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Same token, new role.
    let res = server.get("/auth/me", &user).await;
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["user"]["role"], "moderator");

    let res = server.get("/dashboard/moderation", &user).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let server = TestServer::spawn().await;
    server.register("kwame@example.com", "producer-pass-1", None).await;
    let token = server.token_for("kwame@example.com", "producer-pass-1").await;

    let res = server
        .client
        .post(server.url("/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server.get("/auth/me", &token).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "session_expired");
}

#[tokio::test]
async fn deactivated_account_is_locked_out() {
    let server = TestServer::spawn().await;
    let res = server.register("efua@example.com", "producer-pass-1", None).await;
    let created: Value = res.json().await.unwrap();
    let id = created["user"]["id"].as_str().unwrap().to_string();
    let user = server.token_for("efua@example.com", "producer-pass-1").await;

    let admin = server.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let res = server
        .client
        .put(server.url(&format!("/admin/accounts/{id}/status")))
        .bearer_auth(&admin)
        .json(&json!({ "status": "inactive" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.get("/auth/me", &user).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rbac_roles_are_listed_lowest_first() {
    let server = TestServer::spawn().await;
    server.register("nana@example.com", "producer-pass-1", None).await;
    let token = server.token_for("nana@example.com", "producer-pass-1").await;

    let res = server.get("/rbac/roles", &token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let names: Vec<&str> = body["roles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["viewer", "producer", "moderator", "admin"]);
}

#[tokio::test]
async fn access_check_reports_the_guard_decision() {
    let server = TestServer::spawn().await;
    server.register("akua@example.com", "producer-pass-1", None).await;
    let token = server.token_for("akua@example.com", "producer-pass-1").await;

    let res = server
        .client
        .post(server.url("/access/check"))
        .bearer_auth(&token)
        .json(&json!({ "path": "/dashboard/producer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["allowed"], true);

    let res = server
        .client
        .post(server.url("/access/check"))
        .bearer_auth(&token)
        .json(&json!({ "path": "/dashboard/content" }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["allowed"], false);
    assert_eq!(body["decision"]["reason"], "insufficient_security_level");
}

#[tokio::test]
async fn bursts_are_rate_limited() {
    let server = TestServer::spawn_with(|config| config.rate_limit_per_minute = 2).await;

    for _ in 0..2 {
        let res = server.client.get(server.url("/health")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key("retry-after"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");
}

#[tokio::test]
async fn logging_in_again_does_not_revive_a_logged_out_token() {
    let server = TestServer::spawn().await;
    server.register("yaw@example.com", "producer-pass-1", None).await;
    let old = server.token_for("yaw@example.com", "producer-pass-1").await;

    let res = server.post("/auth/logout", &old, json!({})).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let fresh = server.token_for("yaw@example.com", "producer-pass-1").await;
    assert_ne!(old, fresh);

    let res = server.get("/auth/me", &old).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "session_expired");

    let res = server.get("/auth/me", &fresh).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn registration_missing_a_field_names_it() {
    let server = TestServer::spawn().await;

    let res = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({
            "email": "kofi@example.com",
            "password": "producer-pass-1",
            "lastName": "Boateng",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "firstName");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn login_missing_password_is_a_validation_error() {
    let server = TestServer::spawn().await;

    let res = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": ADMIN_EMAIL }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "password");
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let server = TestServer::spawn().await;

    let res = server
        .client
        .post(server.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{\"email\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "body");

    let res = server
        .client
        .post(server.url("/auth/login"))
        .body("email=someone")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["field"], "body");
}

#[tokio::test]
async fn forwarded_header_from_an_untrusted_peer_does_not_reset_the_limit() {
    let server = TestServer::spawn_with(|config| config.rate_limit_per_minute = 2).await;

    for i in 0..2 {
        let res = server.register(&format!("user{i}@example.com"), "producer-pass-1", None).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }
    let res = server.register("user2@example.com", "producer-pass-1", None).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    let res = server
        .client
        .post(server.url("/auth/register"))
        .header("x-forwarded-for", "198.51.100.23")
        .json(&json!({
            "email": "user3@example.com",
            "password": "producer-pass-1",
            "firstName": "Esi",
            "lastName": "Owusu",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn clients_behind_a_trusted_proxy_have_their_own_limits() {
    let server = TestServer::spawn_with(|config| {
        config.rate_limit_per_minute = 2;
        config.trusted_proxies = vec!["127.0.0.1".parse().unwrap()];
    })
    .await;
    let health_from = |client: &'static str| {
        server
            .client
            .get(server.url("/health"))
            .header("x-forwarded-for", client)
            .send()
    };

    for _ in 0..2 {
        assert_eq!(health_from("203.0.113.1").await.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(
        health_from("203.0.113.1").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(health_from("203.0.113.2").await.unwrap().status(), StatusCode::OK);
}

#[tokio::test]
async fn can_edit_honours_ownership_and_role() {
    let server = TestServer::spawn().await;
    let res = server.register("abena@example.com", "producer-pass-1", None).await;
    let created: Value = res.json().await.unwrap();
    let own_id = created["user"]["id"].as_str().unwrap().to_string();
    let producer = server.token_for("abena@example.com", "producer-pass-1").await;
    let other_id = AccountId::new().to_string();

    let res = server.post("/access/can-edit", &producer, json!({ "ownerId": own_id })).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["allowed"], true);

    let res = server.post("/access/can-edit", &producer, json!({ "ownerId": other_id })).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["allowed"], false);

    let admin = server.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let res = server.post("/access/can-edit", &admin, json!({ "ownerId": other_id })).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["allowed"], true);
}

#[tokio::test]
async fn admin_creates_a_moderator_account() {
    let server = TestServer::spawn().await;
    let admin = server.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let res = server
        .post(
            "/admin/accounts",
            &admin,
            json!({
                "email": "mod@example.com",
                "password": "moderator-pass-1",
                "firstName": "Kojo",
                "lastName": "Asante",
                "role": "moderator",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["role"], "moderator");
    assert!(body["user"].get("passwordHash").is_none());

    let moderator = server.token_for("mod@example.com", "moderator-pass-1").await;
    let res = server.get("/dashboard/moderation", &moderator).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Creating accounts is an admin operation.
    let res = server
        .post(
            "/admin/accounts",
            &moderator,
            json!({
                "email": "mod2@example.com",
                "password": "moderator-pass-1",
                "firstName": "Adjoa",
                "lastName": "Asante",
                "role": "moderator",
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleted_account_token_stops_working() {
    let server = TestServer::spawn().await;
    let res = server.register("kwabena@example.com", "producer-pass-1", None).await;
    let created: Value = res.json().await.unwrap();
    let id = created["user"]["id"].as_str().unwrap().to_string();
    let user = server.token_for("kwabena@example.com", "producer-pass-1").await;
    let admin = server.token_for(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let res = server
        .client
        .delete(server.url(&format!("/admin/accounts/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = server.get("/auth/me", &user).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = server.get(&format!("/admin/accounts/{id}"), &admin).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn viewer_can_update_their_profile() {
    let server = TestServer::spawn().await;
    server.register("afia@example.com", "viewer-pass-1", Some("viewer")).await;
    let token = server.token_for("afia@example.com", "viewer-pass-1").await;

    let res = server
        .client
        .put(server.url("/auth/profile"))
        .bearer_auth(&token)
        .json(&json!({ "lastName": "Darko" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["lastName"], "Darko");
}
