//! Client side of the portal: token storage, the typed API, the session
//! and the route guard built on it.

pub mod api;
pub mod guard;
pub mod session;
pub mod storage;

pub use api::{ClientError, PortalApi};
pub use guard::{GuardPhase, GuardView, Redirect, RouteGuard};
pub use session::{AuthOutcome, SessionContext, SessionState};
pub use storage::{FileStorage, MemoryStorage, TOKEN_STORAGE_KEY, TokenStorage};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use super::*;
    use crate::api::{ApiContext, AppState, create_router};
    use crate::auth::UserContext;
    use crate::config::{ClientConfig, PortalConfig};
    use crate::db::DatabaseConfig;
    use crate::model::MembershipPurchase;
    use crate::types::UserId;

    pub struct TestServer {
        pub state: AppState,
        pub url: String,
    }

    impl TestServer {
        pub async fn grant_membership(&self, user_id: &UserId) {
            self.state
                .memberships
                .purchase(
                    &UserContext::new(user_id.clone()),
                    &MembershipPurchase {
                        membership_type: "annual".to_string(),
                        payment_id: None,
                        amount_paid: 50.0,
                    },
                    chrono::Utc::now().date_naive(),
                )
                .await
                .unwrap();
        }
    }

    /// Serve a fresh in-memory portal on an ephemeral port.
    pub async fn spawn_server() -> TestServer {
        let mut config = PortalConfig::new("test-secret");
        config.database = DatabaseConfig::memory();
        let state = ApiContext::connect(&config).await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestServer {
            state,
            url: format!("http://{}", addr),
        }
    }

    pub fn session_for<S: TokenStorage + 'static>(server: &TestServer, storage: Arc<S>) -> SessionContext {
        let api = PortalApi::new(&ClientConfig::new(&server.url).unwrap()).unwrap();
        SessionContext::new(api, Box::new(storage))
    }
}
