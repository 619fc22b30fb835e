use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use foxden::auth::{TokenHasher, create_admin_token};
use foxden::server::{AppState, create_router};
use foxden::store::{SqliteStore, Store};

/// The router wired to a scratch in-memory database, driven in-process.
pub struct TestApp {
    pub store: Arc<SqliteStore>,
    pub admin_token: String,
    router: Router,
}

pub struct TestUser {
    pub id: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let store = SqliteStore::open_in_memory().expect("open store");
        store.initialize().expect("initialize store");
        let admin_token = create_admin_token(&store, &TokenHasher::new())
            .expect("create admin token")
            .expect("fresh store has no admin token")
            .to_string();

        let store = Arc::new(store);
        let shared: Arc<dyn Store> = store.clone();
        let router = create_router(Arc::new(AppState::new(shared)));

        Self {
            store,
            admin_token,
            router,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self.router.clone().oneshot(request).await.expect("send request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn delete(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), Some(body)).await
    }

    pub async fn create_user(&self, name: &str) -> TestUser {
        let (status, body) = self
            .post(
                "/api/v1/admin/users",
                Some(&self.admin_token),
                serde_json::json!({ "name": name }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create user: {body}");
        TestUser {
            id: body["data"]["user"]["id"].as_str().expect("user id").to_string(),
            token: body["data"]["token"].as_str().expect("token").to_string(),
        }
    }

    /// Creates an organization named "acme" owned by `owner`. Returns its id.
    pub async fn create_organization(&self, owner: &TestUser) -> String {
        let (status, body) = self
            .post(
                "/api/v1/admin/organizations",
                Some(&self.admin_token),
                serde_json::json!({ "name": "acme", "owner_id": owner.id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create organization: {body}");
        body["data"]["id"].as_str().expect("org id").to_string()
    }

    /// Creates an organization owned by `owner` and one application in it.
    /// Returns the application id.
    pub async fn create_application(&self, owner: &TestUser) -> String {
        let org_id = self.create_organization(owner).await;

        let (status, body) = self
            .post(
                "/api/v1/applications",
                Some(&owner.token),
                serde_json::json!({ "organization_id": org_id, "name": "site" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create application: {body}");
        body["data"]["id"].as_str().expect("app id").to_string()
    }

    /// Creates a file of `kind` and returns (file id, content id).
    pub async fn create_file(&self, user: &TestUser, kind: &str, app_id: &str, name: &str) -> (String, String) {
        let (status, body) = self
            .post(
                &format!("/api/v1/{kind}"),
                Some(&user.token),
                serde_json::json!({ "application_id": app_id, "name": name }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create file: {body}");
        (
            body["data"]["id"].as_str().expect("file id").to_string(),
            body["data"]["contents"][0]["id"].as_str().expect("content id").to_string(),
        )
    }

    /// Creates a version with `relations` and returns its number.
    pub async fn create_version(&self, user: &TestUser, kind: &str, content_id: &str, relations: Value) -> (StatusCode, Value) {
        self.post(
            &format!("/api/v1/{kind}/versions"),
            Some(&user.token),
            serde_json::json!({
                "content_id": content_id,
                "relations": relations,
                "schemas": { "title": "hello" },
            }),
        )
        .await
    }

    pub async fn publish(&self, user: &TestUser, kind: &str, content_id: &str, version: i64) -> (StatusCode, Value) {
        self.put(
            &format!("/api/v1/{kind}/live"),
            &user.token,
            serde_json::json!({ "content_id": content_id, "version_number": version }),
        )
        .await
    }

    /// Creates a file whose first version is published. Returns (file id, content id).
    pub async fn create_live_file(
        &self,
        user: &TestUser,
        kind: &str,
        app_id: &str,
        relations: Value,
    ) -> (String, String) {
        let (file_id, content_id) = self.create_file(user, kind, app_id, kind).await;
        let (status, body) = self.create_version(user, kind, &content_id, relations).await;
        assert_eq!(status, StatusCode::OK, "create version: {body}");
        let (status, body) = self.publish(user, kind, &content_id, 1).await;
        assert_eq!(status, StatusCode::OK, "publish: {body}");
        (file_id, content_id)
    }
}
