#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use genera::router::init_router;
use genera::state::AppState;
use genera_auth::create_access_token;
use genera_config::RateLimitConfig;
use genera_core::hash_password;
use genera_db::{AccessStore, MemoryStore};
use genera_models::ids::{GenerationId, NetworkId, SchoolId, UserId};
use genera_models::organizations::{Community, Generation, NewCommunity, Network, School};
use genera_models::permissions::default_matrix;
use genera_models::profiles::{ApprovalStatus, NewProfile, Profile};
use genera_models::roles::{AssignmentScope, NewRoleAssignment, RoleAssignment, RoleType};

pub const TEST_PASSWORD: &str = "testpass123";

fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(TEST_PASSWORD).unwrap())
}

pub fn generate_unique_email() -> String {
    format!("test-{}@test.cl", Uuid::new_v4())
}

pub fn generate_unique_name(prefix: &str) -> String {
    format!("{prefix} {}", Uuid::new_v4())
}

pub struct TestUser {
    pub profile: Profile,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> UserId {
        self.profile.id
    }

    pub fn email(&self) -> &str {
        &self.profile.email
    }
}

/// Router over an in-memory store with the default permission matrix.
pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_rate_limit(RateLimitConfig::disabled()).await
    }

    pub async fn with_rate_limit(config: RateLimitConfig) -> Self {
        dotenvy::dotenv().ok();
        let store: Arc<dyn AccessStore> = Arc::new(MemoryStore::new());
        store.seed_permissions(&default_matrix(), None).await.unwrap();
        let state = AppState::for_tests(store, config);
        let router = init_router(state.clone());
        Self { state, router }
    }

    pub fn store(&self) -> &dyn AccessStore {
        self.state.store()
    }

    pub async fn create_school(&self, has_generations: bool) -> School {
        self.store()
            .create_school(&generate_unique_name("Colegio"), has_generations)
            .await
            .unwrap()
    }

    pub async fn create_generation(&self, school_id: SchoolId) -> Generation {
        self.store()
            .create_generation(school_id, &generate_unique_name("Generación"), None)
            .await
            .unwrap()
    }

    pub async fn create_community(
        &self,
        school_id: SchoolId,
        generation_id: Option<GenerationId>,
    ) -> Community {
        self.store()
            .create_community(NewCommunity {
                school_id,
                generation_id,
                name: generate_unique_name("Comunidad"),
                max_teachers: 16,
            })
            .await
            .unwrap()
    }

    pub async fn create_network(&self, schools: &[SchoolId]) -> Network {
        let network = self
            .store()
            .create_network(&generate_unique_name("Red"), None, None)
            .await
            .unwrap();
        for school_id in schools {
            self.store()
                .add_network_school(network.id, *school_id, None)
                .await
                .unwrap();
        }
        network
    }

    pub async fn create_profile(
        &self,
        school_id: Option<SchoolId>,
        approval_status: ApprovalStatus,
    ) -> Profile {
        self.store()
            .create_profile(NewProfile {
                email: generate_unique_email(),
                first_name: "Test".into(),
                last_name: "Usuario".into(),
                password_hash: password_hash().to_string(),
                school_id,
                generation_id: None,
                community_id: None,
                approval_status,
            })
            .await
            .unwrap()
    }

    pub async fn assign(
        &self,
        user_id: UserId,
        role_type: RoleType,
        scope: AssignmentScope,
    ) -> RoleAssignment {
        self.store()
            .assign_role(
                NewRoleAssignment {
                    user_id,
                    role_type,
                    scope,
                    assigned_by: None,
                },
                None,
            )
            .await
            .unwrap()
    }

    pub fn token_for(&self, profile: &Profile) -> String {
        create_access_token(profile.id.into_inner(), &profile.email, &self.state.jwt_config)
            .unwrap()
    }

    /// Approved profile in `school_id` holding `role_type` anchored there.
    pub async fn user_with_role(
        &self,
        role_type: RoleType,
        school_id: Option<SchoolId>,
    ) -> TestUser {
        self.user_with_scope(
            role_type,
            school_id,
            AssignmentScope {
                school_id,
                ..AssignmentScope::default()
            },
        )
        .await
    }

    pub async fn user_with_scope(
        &self,
        role_type: RoleType,
        profile_school: Option<SchoolId>,
        scope: AssignmentScope,
    ) -> TestUser {
        let profile = self
            .create_profile(profile_school, ApprovalStatus::Approved)
            .await;
        self.assign(profile.id, role_type, scope).await;
        let token = self.token_for(&profile);
        TestUser { profile, token }
    }

    pub async fn admin(&self) -> TestUser {
        self.user_with_role(RoleType::Admin, None).await
    }

    pub async fn supervisor(&self, network_id: NetworkId) -> TestUser {
        self.user_with_scope(
            RoleType::SupervisorDeRed,
            None,
            AssignmentScope {
                network_id: Some(network_id),
                ..AssignmentScope::default()
            },
        )
        .await
    }

    pub async fn community_member(
        &self,
        role_type: RoleType,
        community: &Community,
    ) -> TestUser {
        self.user_with_scope(
            role_type,
            Some(community.school_id),
            AssignmentScope {
                school_id: Some(community.school_id),
                generation_id: community.generation_id,
                community_id: Some(community.id),
                network_id: None,
            },
        )
        .await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(token), body).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(token), None).await
    }

    /// POST /api/auth/login from `client_ip`.
    pub async fn login(&self, email: &str, password: &str, client_ip: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .header("x-forwarded-for", client_ip)
            .body(Body::from(
                serde_json::to_vec(&serde_json::json!({
                    "email": email,
                    "password": password
                }))
                .unwrap(),
            ))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

pub fn ids(list: &Value) -> Vec<String> {
    list.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}
