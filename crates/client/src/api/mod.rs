//! Service interfaces for the consumed REST microservices.
//!
//! Each microservice is modeled as a trait so that the session and cart
//! components depend on an explicit contract rather than a concrete HTTP
//! client. The contract documents, per operation, whether the response is a
//! full snapshot or a bare acknowledgement that requires a reload - the cart
//! mirror must never diverge from server truth after a mutation.
//!
//! [`HttpIdentityApi`] and [`HttpShoppingApi`] are the production
//! implementations over `reqwest`.

mod rest;

pub use rest::{HttpIdentityApi, HttpShoppingApi, RestClient, TokenProvider};

use async_trait::async_trait;
use cartside_core::ProductId;
use thiserror::Error;

use crate::models::{
    CartSnapshot, LoginRequest, LoginResponse, OrderConfirmation, RegisterRequest, RegisteredUser,
};

/// Errors that can occur when calling a microservice.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure before any HTTP status was received - the
    /// service could not be reached at all.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// The response body could not be parsed.
    #[error("malformed response body: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// The HTTP status of the failure, if one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unreachable(err.to_string())
    }
}

/// Interface to the identity (users) microservice.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the credentials or cannot be
    /// reached. Status mapping is the caller's concern.
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError>;

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns an error if the service rejects the registration or cannot be
    /// reached.
    async fn register(&self, request: &RegisterRequest) -> Result<RegisteredUser, ApiError>;
}

/// Interface to the shopping (carts and orders) microservice.
#[async_trait]
pub trait ShoppingApi: Send + Sync {
    /// Fetch the cart owned by `owner`. Returns a full snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner has no provisioned cart or the service
    /// cannot be reached.
    async fn fetch_cart(&self, owner: &str) -> Result<CartSnapshot, ApiError>;

    /// Add `quantity` units of a product to the owner's cart.
    ///
    /// The response is a full post-mutation snapshot; no reload is required.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation is rejected or the service cannot be
    /// reached.
    async fn add_item(
        &self,
        owner: &str,
        product: &ProductId,
        quantity: u32,
    ) -> Result<CartSnapshot, ApiError>;

    /// Decrement a product in the owner's cart by `amount` units.
    ///
    /// The endpoint acknowledges without returning a snapshot; callers must
    /// reload the cart afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the mutation is rejected or the service cannot be
    /// reached.
    async fn remove_item(
        &self,
        owner: &str,
        product: &ProductId,
        amount: u32,
    ) -> Result<(), ApiError>;

    /// Turn the owner's cart into an order. The server empties the cart as a
    /// side effect, so callers must reload it afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if order creation fails or the service cannot be
    /// reached.
    async fn create_order(&self, owner: &str) -> Result<OrderConfirmation, ApiError>;
}
