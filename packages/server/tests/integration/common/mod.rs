use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::Client;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::{Value, json};
use tempfile::TempDir;

use server::config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, ResolverConfig, ServerConfig,
};
use server::entity::{competition, user};
use server::scoring::{DatasetResolver, ScoringEngine, StaticDatasetResolver};
use server::state::AppState;
use server::views::{ViewHub, ViewPropagator};

pub mod routes {
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const ME: &str = "/api/v1/auth/me";
    pub const COMPETITIONS: &str = "/api/v1/competitions";
    pub const SUBMISSIONS: &str = "/api/v1/submissions";
    pub const LEADERBOARD: &str = "/api/v1/leaderboard";

    pub fn public_view(name: &str) -> String {
        format!("/api/v1/views/{name}")
    }

    pub fn admin_view(name: &str) -> String {
        format!("/api/v1/admin/views/{name}")
    }
}

/// A running test server backed by a throwaway sqlite database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub engine: Arc<ScoringEngine>,
    pub resolver: Arc<StaticDatasetResolver>,
    pub views: ViewPropagator,
    _tmp: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

/// A registered test user.
pub struct TestUser {
    pub id: i32,
    pub username: String,
    pub api_key: String,
    pub api_secret: String,
    pub token: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let tmp = TempDir::new().expect("Failed to create temp dir");
        let db_path = tmp.path().join("rally-test.db");
        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let db = server::database::init_db(&db_url)
            .await
            .expect("Failed to initialize test database");

        let resolver = Arc::new(StaticDatasetResolver::new());
        let views = ViewPropagator::new(Arc::new(ViewHub::new()), Arc::new(ViewHub::new()));
        let engine = Arc::new(ScoringEngine::new(
            db.clone(),
            Arc::clone(&resolver) as Arc<dyn DatasetResolver>,
            views.clone(),
        ));

        server::seed::seed_views(&db, &views)
            .await
            .expect("Failed to host view tables");

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                base_path: "/".to_string(),
                cors: CorsConfig::default(),
            },
            database: DatabaseConfig { url: db_url },
            auth: AuthConfig {
                jwt_secret: "test-secret-for-integration-tests".to_string(),
                token_days: 1,
            },
            resolver: ResolverConfig::default(),
        };

        let state = AppState {
            db: db.clone(),
            config: app_config,
            engine: engine.clone(),
            views: views.clone(),
        };

        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            engine,
            resolver,
            views,
            _tmp: tmp,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// Register a user and log in.
    pub async fn create_user(&self, username: &str) -> TestUser {
        let reg = self
            .post_without_token(routes::REGISTER, &json!({ "username": username }))
            .await;
        assert_eq!(reg.status, 201, "Registration failed: {}", reg.text);

        let api_key = reg.body["api_key"].as_str().unwrap().to_string();
        let api_secret = reg.body["api_secret"].as_str().unwrap().to_string();
        let id = reg.body["id"].as_i64().unwrap() as i32;

        let login = self
            .post_without_token(
                routes::LOGIN,
                &json!({ "key": api_key, "secret": api_secret }),
            )
            .await;
        assert_eq!(login.status, 200, "Login failed: {}", login.text);

        TestUser {
            id,
            username: username.to_string(),
            api_key,
            api_secret,
            token: login.body["token"].as_str().unwrap().to_string(),
        }
    }

    /// Register a user, promote them to admin in the database, and log in
    /// again so the token carries the admin role.
    pub async fn create_admin(&self, username: &str) -> TestUser {
        let created = self.create_user(username).await;

        let db_user = user::Entity::find_by_id(created.id)
            .one(&self.db)
            .await
            .expect("DB query failed")
            .expect("User not found after registration");
        let mut active: user::ActiveModel = db_user.into();
        active.role = Set(user::ADMIN_ROLE.to_string());
        active.update(&self.db).await.expect("Failed to set role");

        let login = self
            .post_without_token(
                routes::LOGIN,
                &json!({ "key": created.api_key, "secret": created.api_secret }),
            )
            .await;
        assert_eq!(login.status, 200, "Admin login failed: {}", login.text);

        TestUser {
            token: login.body["token"].as_str().unwrap().to_string(),
            ..created
        }
    }

    /// Register a competition via the API and return its id.
    pub async fn create_competition(&self, token: &str, spec: &Value) -> i32 {
        let res = self
            .post_with_token(routes::COMPETITIONS, &json!({ "spec": spec }), token)
            .await;
        assert_eq!(res.status, 201, "create_competition failed: {}", res.text);
        res.body["competition_id"].as_i64().unwrap() as i32
    }

    /// Submit an answer via the API.
    pub async fn submit(&self, token: &str, competition_id: i32, data: Value) -> TestResponse {
        self.post_with_token(
            routes::SUBMISSIONS,
            &json!({
                "competition_id": competition_id,
                "submission": { "format": "Records", "data": data },
            }),
            token,
        )
        .await
    }

    /// Move a competition's expiration into the past, bypassing the API.
    pub async fn expire_competition(&self, competition_id: i32) {
        let comp = competition::Entity::find_by_id(competition_id)
            .one(&self.db)
            .await
            .expect("DB query failed")
            .expect("Competition not found");
        let mut active: competition::ActiveModel = comp.into();
        active.expiration = Set(Utc::now() - Duration::hours(1));
        active
            .update(&self.db)
            .await
            .expect("Failed to backdate expiration");
    }
}

/// A valid competition spec body for tests.
pub fn spec_json(
    competition_type: &str,
    dataset_url: &str,
    targets: Value,
    answer_delay_secs: i64,
) -> Value {
    json!({
        "title": format!("{competition_type} challenge"),
        "competition_type": competition_type,
        "dataset_url": dataset_url,
        "dataset_key": null,
        "targets": targets,
        "answer_delay_secs": answer_delay_secs,
        "expiration": (Utc::now() + Duration::hours(1)).to_rfc3339(),
    })
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }
}
