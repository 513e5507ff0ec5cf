use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::HeaderMap;
use axum::Router;
use practice_bot::api::credentials::TokenVault;
use practice_bot::api::portal::{PortalApi, QuizVariant};
use practice_bot::api::Portal;
use reqwest::Url;

pub const CHAT: i64 = 1001;

/// A request as seen by the mock backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct Hits(Arc<Mutex<Vec<Hit>>>);

impl Hits {
    pub fn record(&self, path: impl Into<String>, headers: &HeaderMap, body: Option<serde_json::Value>) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.0.lock().unwrap().push(Hit {
            path: path.into(),
            authorization,
            body,
        });
    }

    pub fn all(&self) -> Vec<Hit> {
        self.0.lock().unwrap().clone()
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let address = listener.local_addr().expect("mock backend address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock backend crashed");
    });
    Url::parse(&format!("http://{}", address)).expect("mock backend url")
}

pub fn api(base_url: Url, variant: QuizVariant, token: Option<&str>) -> (PortalApi, TokenVault) {
    let vault = TokenVault::in_memory();
    if let Some(token) = token {
        vault.insert(CHAT, token.to_string());
    }
    let portal = Portal::new(base_url, variant, vault.clone(), Duration::from_secs(5))
        .expect("build portal client");
    (portal.api_for(CHAT), vault)
}
