use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};

use crate::api::credentials::CredentialProvider;
use crate::api::ApiError;

/// Whether a request may go out without a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Required,
    Optional,
}

#[derive(serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Thin JSON client for the portal backend.
///
/// Every request goes through [`PortalClient::send`], which attaches the
/// bearer token and turns 401/403/non-2xx responses into [`ApiError`]s. A
/// 401 also clears the stored token.
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl PortalClient {
    pub fn new(http: reqwest::Client, base_url: Url, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http,
            base_url,
            credentials,
        }
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str], auth: Auth) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        self.send(self.http.get(url), auth).await
    }

    pub async fn post<B, T>(&self, segments: &[&str], body: &B, auth: Auth) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        self.send(self.http.post(url).json(body), auth).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, auth: Auth) -> Result<T, ApiError> {
        let request = match (self.credentials.token(), auth) {
            (Some(token), _) => request.bearer_auth(token),
            (None, Auth::Required) => return Err(ApiError::AuthRequired),
            (None, Auth::Optional) => request,
        };

        let response = request.send().await?;
        let status = response.status();
        log::debug!("{} {}", status, response.url());

        if status == StatusCode::UNAUTHORIZED {
            log::info!("Backend rejected the token, clearing it");
            self.credentials.clear();
            return Err(ApiError::AuthRequired);
        }
        if status == StatusCode::FORBIDDEN {
            return Err(ApiError::Forbidden);
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message);
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }
}
