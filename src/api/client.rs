use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AuthError;

/// HTTP client for the hosted backend.
///
/// Every request carries the project API key; requests made while a user
/// is signed in also carry that user's access token so row-level policies
/// apply. Clones share the token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: String,
    api_key: String,
    client: Client,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AuthError> {
        // On wasm, we can't use timeout
        #[cfg(target_arch = "wasm32")]
        let client = {
            let _ = timeout;
            Client::new()
        };

        #[cfg(not(target_arch = "wasm32"))]
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(ApiClient {
            inner: Arc::new(ApiClientInner {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key: api_key.to_string(),
                client,
                token: RwLock::new(None),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.inner.token.write() = token;
    }

    pub fn get_token(&self) -> Option<String> {
        self.inner.token.read().clone()
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        let bearer = self
            .get_token()
            .unwrap_or_else(|| self.inner.api_key.clone());

        self.inner
            .client
            .request(method, &url)
            .header("apikey", &self.inner.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let response = self.request(Method::GET, path).send().await?;
        Self::handle_response(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, AuthError> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        Self::handle_response(response).await
    }

    pub async fn post_no_response<B: Serialize>(&self, path: &str, body: &B) -> Result<(), AuthError> {
        let response = self
            .request(Method::POST, path)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        Self::handle_empty_response(response).await
    }

    pub async fn patch_no_response<B: Serialize>(&self, path: &str, body: &B) -> Result<(), AuthError> {
        let response = self
            .request(Method::PATCH, path)
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        Self::handle_empty_response(response).await
    }

    async fn handle_empty_response(response: Response) -> Result<(), AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(AuthError::from_response_body(status.as_u16(), &text))
    }

    async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| AuthError::Unknown(format!("Invalid response: {e}")));
        }
        let text = response.text().await.unwrap_or_default();
        Err(AuthError::from_response_body(status.as_u16(), &text))
    }
}
