use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use tenantgate_api::app::{build_app, services::AppServices};
use tenantgate_auth::{InMemoryCredentialStore, InMemoryPolicyStore, PolicyTuple, TokenConfig, TokenPair};
use tenantgate_core::{RoleCode, TenantId, UserId};

const ACCESS_SECRET: &str = "access-secret-for-black-box-tests";
const REFRESH_SECRET: &str = "refresh-secret-for-black-box-test";

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    credentials: Arc<InMemoryCredentialStore>,
    policies: Arc<InMemoryPolicyStore>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let policies = Arc::new(InMemoryPolicyStore::new());
        let services = Arc::new(AppServices::with_stores(
            TokenConfig::new(ACCESS_SECRET, REFRESH_SECRET),
            credentials.clone(),
            policies.clone(),
        ));

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(services.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            credentials,
            policies,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, tenant: &'static str, user: &'static str, role: &'static str) -> TokenPair {
        self.services
            .tokens
            .issue(&TenantId::from(tenant), &UserId::from(user), &RoleCode::from(role))
            .await
            .unwrap()
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn error_of(res: reqwest::Response) -> (StatusCode, Value) {
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_store_reachability() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    server.policies.set_unavailable(true);
    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers().get("retry-after").unwrap(), "1");
}

#[tokio::test]
async fn requests_without_a_valid_token_are_rejected() {
    let server = TestServer::spawn().await;

    let res = server.client.get(server.url("/whoami")).send().await.unwrap();
    let (status, body) = error_of(res).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_missing");
    assert_eq!(body["kind"], "authentication_failed");

    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &json!({ "tenant_id": "acme", "user_id": "mallory", "exp": 4_000_000_000u64 }),
        &jsonwebtoken::EncodingKey::from_secret(b"not-the-server-secret-not-at-all"),
    )
    .unwrap();
    let (status, body) = error_of(server.get("/whoami", &forged).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");
}

#[tokio::test]
async fn whoami_reflects_the_verified_claims() {
    let server = TestServer::spawn().await;
    let pair = server.login("acme", "alice", "editor").await;

    let res = server.get("/whoami", &pair.access_token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"], "acme");
    assert_eq!(body["home_tenant_id"], "acme");
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["role_id"], "editor");
    assert_eq!(body["token_id"], pair.token_id.to_string());
    assert_eq!(body["cross_tenant"], false);
}

#[tokio::test]
async fn refresh_rotates_and_detects_replay() {
    let server = TestServer::spawn().await;
    let old = server.login("acme", "alice", "editor").await;

    let res = server
        .client
        .post(server.url("/auth/refresh"))
        .json(&json!({ "refresh_token": old.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let new: Value = res.json().await.unwrap();
    let new_access = new["access_token"].as_str().unwrap();
    assert_eq!(new["token_type"], "Bearer");

    let (status, body) = error_of(server.get("/whoami", &old.access_token).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_blacklisted");
    assert_eq!(server.get("/whoami", new_access).await.status(), StatusCode::OK);

    let res = server
        .client
        .post(server.url("/auth/refresh"))
        .json(&json!({ "refresh_token": old.refresh_token }))
        .send()
        .await
        .unwrap();
    let (status, body) = error_of(res).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_replayed");
    assert_eq!(body["kind"], "replay_or_tamper");
}

#[tokio::test]
async fn refresh_rejects_access_tokens_and_bad_bodies() {
    let server = TestServer::spawn().await;
    let pair = server.login("acme", "alice", "editor").await;

    let res = server
        .client
        .post(server.url("/auth/refresh"))
        .json(&json!({ "refresh_token": pair.access_token }))
        .send()
        .await
        .unwrap();
    let (status, body) = error_of(res).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");

    let res = server
        .client
        .post(server.url("/auth/refresh"))
        .json(&json!({ "token": "x" }))
        .send()
        .await
        .unwrap();
    let (status, body) = error_of(res).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn logout_kills_the_session_and_logout_all_every_session() {
    let server = TestServer::spawn().await;
    let first = server.login("acme", "alice", "editor").await;
    let second = server.login("acme", "alice", "editor").await;
    let third = server.login("acme", "alice", "editor").await;

    let res = server
        .client
        .post(server.url("/auth/logout"))
        .bearer_auth(&first.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        server.get("/whoami", &first.access_token).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let res = server
        .client
        .post(server.url("/auth/logout-all"))
        .bearer_auth(&second.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["revoked"], 2);

    for token in [&second.access_token, &third.access_token] {
        assert_eq!(server.get("/whoami", token).await.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn rbac_routes_are_enforced_against_policy() {
    let server = TestServer::spawn().await;
    let admin = server.login("acme", "carol", "tenant_admin").await;

    let (status, body) = error_of(server.get("/rbac/users/alice/roles", &admin.access_token).await).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");
    assert_eq!(body["kind"], "authorization_denied");

    let acme = TenantId::from("acme");
    let enforcer = &server.services.enforcer;
    enforcer
        .add_policy(PolicyTuple::new("tenant_admin", "acme", "/rbac/*", "*"))
        .await
        .unwrap();
    enforcer
        .assign_roles(&UserId::from("carol"), &[RoleCode::from("tenant_admin")], &acme)
        .await
        .unwrap();

    let res = server
        .client
        .post(server.url("/rbac/bindings"))
        .bearer_auth(&admin.access_token)
        .json(&json!({ "user_id": "alice", "roles": ["editor"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["added"], 1);
    assert_eq!(body["tenant_id"], "acme");

    let res = server.get("/rbac/users/alice/roles", &admin.access_token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["roles"], json!(["editor"]));

    let res = server
        .client
        .delete(server.url("/rbac/bindings"))
        .bearer_auth(&admin.access_token)
        .json(&json!({ "user_id": "alice", "roles": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // The same role in another tenant grants nothing.
    let foreign = server.login("globex", "carol", "tenant_admin").await;
    assert_eq!(
        server.get("/rbac/users/alice/roles", &foreign.access_token).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn cross_tenant_override_requires_platform_admin() {
    let server = TestServer::spawn().await;
    let user = server.login("acme", "alice", "editor").await;

    let res = server
        .client
        .get(server.url("/whoami"))
        .bearer_auth(&user.access_token)
        .header("x-tenant-id", "globex")
        .send()
        .await
        .unwrap();
    let (status, body) = error_of(res).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "cross_tenant_denied");

    // Naming the caller's own tenant is not an override.
    let res = server
        .client
        .get(server.url("/whoami"))
        .bearer_auth(&user.access_token)
        .header("x-tenant-id", "acme")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    server.services.enforcer.grant_super_admin(&UserId::from("root")).await.unwrap();

    // Same user id, different tenant: not the platform admin.
    let impostor = server.login("globex", "root", "viewer").await;
    let res = server
        .client
        .get(server.url("/rbac/users/alice/roles"))
        .bearer_auth(&impostor.access_token)
        .header("x-tenant-id", "acme")
        .send()
        .await
        .unwrap();
    let (status, body) = error_of(res).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "cross_tenant_denied");

    let root = server.login("default", "root", "super_admin").await;

    let res = server
        .client
        .get(server.url("/whoami"))
        .bearer_auth(&root.access_token)
        .header("x-tenant-id", "globex")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"], "globex");
    assert_eq!(body["home_tenant_id"], "default");
    assert_eq!(body["cross_tenant"], true);

    let res = server
        .client
        .get(server.url("/rbac/users/alice/roles"))
        .bearer_auth(&root.access_token)
        .header("x-tenant-id", "globex")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"], "globex");
}

#[tokio::test]
async fn store_outages_fail_closed_with_503() {
    let server = TestServer::spawn().await;
    let pair = server.login("acme", "alice", "editor").await;

    server.credentials.set_unavailable(true);
    let res = server.get("/whoami", &pair.access_token).await;
    assert_eq!(res.headers().get("retry-after").unwrap(), "1");
    let (status, body) = error_of(res).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "infrastructure_error");
    assert_eq!(body["message"], "service temporarily unavailable");
    server.credentials.set_unavailable(false);

    server.policies.set_unavailable(true);
    let (status, body) = error_of(server.get("/rbac/users/alice/roles", &pair.access_token).await).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "policy_store_unavailable");
}
