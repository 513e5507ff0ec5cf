pub mod client;
pub mod credentials;
pub mod portal;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;

use crate::quiz::QuizError;
use client::PortalClient;
use credentials::{ChatCredentials, TokenVault};
use portal::{PortalApi, QuizVariant};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Please login to attempt the quiz")]
    AuthRequired,
    #[error("access denied")]
    Forbidden,
    #[error("backend answered {status}")]
    Status { status: u16, message: Option<String> },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("{0} cannot be used as a base URL")]
    BaseUrl(String),
}

impl From<ApiError> for QuizError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::AuthRequired => QuizError::AuthRequired,
            ApiError::Forbidden => QuizError::Forbidden,
            ApiError::Status {
                message: Some(message),
                ..
            } => QuizError::NetworkOrServer(message),
            ApiError::Status { status, .. } => {
                QuizError::NetworkOrServer(format!("HTTP error! status: {}", status))
            }
            ApiError::Transport(err) => QuizError::NetworkOrServer(err.to_string()),
            ApiError::BaseUrl(url) => QuizError::NetworkOrServer(format!("bad backend URL {}", url)),
            ApiError::Decode(message) => QuizError::Validation(message),
        }
    }
}

/// Everything needed to talk to the portal on behalf of any chat.
#[derive(Clone)]
pub struct Portal {
    http: reqwest::Client,
    base_url: Url,
    variant: QuizVariant,
    tokens: TokenVault,
}

impl Portal {
    pub fn new(base_url: Url, variant: QuizVariant, tokens: TokenVault, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            variant,
            tokens,
        })
    }

    pub fn variant(&self) -> QuizVariant {
        self.variant
    }

    pub fn credentials(&self, chat: i64) -> ChatCredentials {
        self.tokens.for_chat(chat)
    }

    pub fn api_for(&self, chat: i64) -> PortalApi {
        let client = PortalClient::new(
            self.http.clone(),
            self.base_url.clone(),
            Arc::new(self.credentials(chat)),
        );
        PortalApi::new(client, self.variant)
    }
}
