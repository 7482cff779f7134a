//! HTTP implementations of the microservice interfaces.
//!
//! [`RestClient`] is a thin wrapper over `reqwest` that owns a base URL and
//! optionally a [`TokenProvider`]. Response bodies are read as text before
//! parsing so failures can be logged with the offending payload.

use std::sync::Arc;

use async_trait::async_trait;
use cartside_core::ProductId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::{ApiError, IdentityApi, ShoppingApi};
use crate::models::{
    AddToCartRequest, CartSnapshot, LoginRequest, LoginResponse, OrderConfirmation,
    RegisterRequest, RegisteredUser,
};

/// Maximum response bytes retained in error values and logs.
const BODY_SNIPPET_LEN: usize = 500;

/// Source of the current bearer credential.
///
/// Implemented by the session manager. Returning `None` means the request
/// goes out unauthenticated; login and registration clients are built
/// without a provider at all, since the identity endpoints must never see a
/// stale credential.
pub trait TokenProvider: Send + Sync {
    /// The bearer token to attach, if a valid one is held.
    fn bearer_token(&self) -> Option<String>;
}

/// JSON-over-HTTP client for one microservice base URL.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Url,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl RestClient {
    /// Create a client that sends unauthenticated requests.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            tokens: None,
        }
    }

    /// Create a client that attaches the current bearer credential to every
    /// request.
    #[must_use]
    pub fn with_token_provider(base_url: Url, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            tokens: Some(tokens),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Unreachable(format!("invalid endpoint {path}: {e}")))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.as_ref().and_then(|t| t.bearer_token()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        // Read the body as text first for better error diagnostics.
        let text = response.text().await?;

        if !status.is_success() {
            let body: String = text.chars().take(BODY_SNIPPET_LEN).collect();
            tracing::error!(
                status = %status,
                body = %body,
                "microservice returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(BODY_SNIPPET_LEN).collect::<String>(),
                "failed to parse microservice response"
            );
            ApiError::Parse(e)
        })
    }

    /// GET a JSON resource.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.execute(self.client.get(url)).await
    }

    /// POST a JSON body and parse a JSON response.
    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.execute(self.client.post(url).json(body)).await
    }

    /// POST an empty JSON body, expecting only an acknowledgement.
    async fn post_ack(&self, path: &str) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        let request = self.client.post(url).json(&serde_json::json!({}));
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(BODY_SNIPPET_LEN).collect();
            tracing::error!(
                status = %status,
                body = %body,
                "microservice rejected mutation"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

// =============================================================================
// Identity service
// =============================================================================

/// `reqwest`-backed client for the identity (users) microservice.
///
/// Built without a token provider: credentials endpoints are the one place a
/// bearer header must not be attached.
pub struct HttpIdentityApi {
    rest: RestClient,
}

impl HttpIdentityApi {
    /// Wrap a [`RestClient`] pointed at the identity service.
    #[must_use]
    pub const fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityApi {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.rest.post_json("api/auth/login", request).await
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegisterRequest) -> Result<RegisteredUser, ApiError> {
        self.rest.post_json("api/auth/register", request).await
    }
}

// =============================================================================
// Shopping service
// =============================================================================

/// `reqwest`-backed client for the shopping (carts and orders) microservice.
pub struct HttpShoppingApi {
    rest: RestClient,
}

impl HttpShoppingApi {
    /// Wrap a [`RestClient`] pointed at the shopping service.
    ///
    /// The client should carry a [`TokenProvider`]; every cart and order
    /// endpoint expects a bearer credential.
    #[must_use]
    pub const fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl ShoppingApi for HttpShoppingApi {
    #[instrument(skip(self), fields(owner = %owner))]
    async fn fetch_cart(&self, owner: &str) -> Result<CartSnapshot, ApiError> {
        self.rest.get_json(&format!("api/carts/email/{owner}")).await
    }

    #[instrument(skip(self), fields(owner = %owner, product = %product))]
    async fn add_item(
        &self,
        owner: &str,
        product: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, ApiError> {
        let request = AddToCartRequest {
            product_id: product.clone(),
            quantity,
        };
        self.rest
            .post_json(
                &format!("api/cartdetails/addToCartDetailAndCart/{owner}"),
                &request,
            )
            .await
    }

    #[instrument(skip(self), fields(owner = %owner, product = %product))]
    async fn remove_item(
        &self,
        owner: &str,
        product: &ProductId,
        amount: u32,
    ) -> Result<(), ApiError> {
        self.rest
            .post_ack(&format!(
                "api/cartdetails/removeFromCartDetailAndCart/{owner}?productId={product}&amount={amount}"
            ))
            .await
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn create_order(&self, owner: &str) -> Result<OrderConfirmation, ApiError> {
        self.rest
            .post_json(
                &format!("api/orders/from-cart/{owner}"),
                &serde_json::json!({}),
            )
            .await
    }
}
