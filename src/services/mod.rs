// HTTP surface: axum routers over the listing engine and lifecycle manager

pub mod health_service;
pub mod items_service;
pub mod universities_service;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::directory::UniversityDirectory;
use crate::lifecycle::ItemLifecycleManager;
use crate::listing::{ListingQueryEngine, PageLimits};
use crate::storage::BlobReferenceResolver;

/// Shared handler state. Cloned per request, so everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub listing: Arc<ListingQueryEngine>,
    pub lifecycle: Arc<ItemLifecycleManager>,
    pub blobs: Arc<BlobReferenceResolver>,
    pub universities: Arc<dyn UniversityDirectory>,
    pub page_limits: PageLimits,
    pub enable_university_seed: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_service::health))
        .route(
            "/api/items",
            get(items_service::list_items).post(items_service::create_item),
        )
        .route("/api/items/seller/my-items", get(items_service::my_items))
        .route(
            "/api/items/{id}",
            get(items_service::get_item)
                .put(items_service::update_item)
                .delete(items_service::delete_item),
        )
        .route(
            "/api/universities",
            get(universities_service::list_universities),
        )
        .route(
            "/api/universities/seed",
            post(universities_service::seed_universities),
        )
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::catalog::MemoryCatalogStore;
    use crate::directory::{MemoryUserDirectory, StaticUniversityDirectory};
    use crate::identity::{issue_test_token, Identity, JwtIdentityGate};
    use crate::middleware::AuthLayer;
    use crate::models::{Role, UserProfile};
    use crate::storage::LocalBackend;

    pub const SECRET: &str = "test-secret";

    pub struct TestApp {
        pub router: Router,
        pub users: Arc<MemoryUserDirectory>,
        pub upload_dir: tempfile::TempDir,
    }

    impl TestApp {
        pub async fn new(enable_university_seed: bool) -> Self {
            let upload_dir = tempfile::tempdir().unwrap();
            let store = Arc::new(MemoryCatalogStore::new());
            let users = Arc::new(MemoryUserDirectory::new());
            let universities: Arc<dyn UniversityDirectory> =
                Arc::new(StaticUniversityDirectory::default());
            let blobs = Arc::new(BlobReferenceResolver::new(
                Arc::new(LocalBackend::new(upload_dir.path())),
                1024 * 1024,
            ));
            let state = AppState {
                listing: Arc::new(ListingQueryEngine::new(store.clone(), users.clone())),
                lifecycle: Arc::new(ItemLifecycleManager::new(
                    store,
                    users.clone(),
                    universities.clone(),
                    blobs.clone(),
                )),
                blobs,
                universities,
                page_limits: PageLimits::default(),
                enable_university_seed,
            };
            let router = router(state).layer(AuthLayer::new(Arc::new(JwtIdentityGate::new(SECRET))));
            Self {
                router,
                users,
                upload_dir,
            }
        }

        /// Registers a user and returns a bearer token for them.
        pub async fn user(&self, name: &str, role: Role) -> (UserProfile, String) {
            let profile = UserProfile {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email: format!("{}@example.edu", name.to_lowercase()),
                phone: Some("+233240000000".to_string()),
                role,
                university: "University of Ghana".to_string(),
            };
            self.users.upsert(profile.clone()).await;
            let token = issue_test_token(
                SECRET,
                &Identity {
                    user_id: profile.id,
                    role,
                    university: profile.university.clone(),
                },
                chrono::Duration::hours(1),
            );
            (profile, token)
        }

        pub async fn send(&self, req: Request<Body>) -> (http::StatusCode, Value) {
            let res = self.router.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = res.into_body().collect().await.unwrap().to_bytes();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json)
        }
    }

    pub const BOUNDARY: &str = "campusmarketboundary";

    /// Builds a multipart body from text fields and `images` PNG parts.
    pub fn multipart_body(fields: &[(&str, &str)], images: usize) -> Body {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            ));
        }
        for i in 0..images {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"photo{}.png\"\r\nContent-Type: image/png\r\n\r\nPNGDATA{}\r\n",
                BOUNDARY, i, i
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        Body::from(body)
    }

    pub fn multipart_request(method: &str, uri: &str, token: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(body)
            .unwrap()
    }
}
