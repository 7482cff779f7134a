//! Client SDK for the retail microservices.
//!
//! Wraps the identity (users) and shopping (carts and orders) services
//! behind two cooperating components:
//!
//! - [`SessionManager`](session::SessionManager) owns authentication state,
//!   credential persistence, and token validity.
//! - [`CartSynchronizer`](cart::CartSynchronizer) mirrors the server-owned
//!   cart and reacts to session changes.
//!
//! [`CartsideClient`] wires both together from a [`ClientConfig`].
//!
//! ```no_run
//! use cartside::CartsideClient;
//!
//! # async fn demo() -> Result<(), cartside::ClientError> {
//! let client = CartsideClient::from_env()?;
//! let sync = client.spawn_cart_sync();
//!
//! client.session().login("ana@example.com", "secret").await?;
//! client.cart().add_to_cart(&"p1".into(), 2).await?;
//! let order = client.cart().checkout().await?;
//! println!("order {} placed", order.id_order);
//! # sync.abort();
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod error;
pub mod models;
pub mod session;

pub use cartside_core::{Email, EmailError, ProductId, Role};

pub use crate::api::ApiError;
pub use crate::cart::{CartError, CartSynchronizer};
pub use crate::config::{ClientConfig, ConfigError};
pub use crate::error::{ClientError, Result};
pub use crate::models::{Cart, CartItem, OrderConfirmation, Session, User};
pub use crate::session::{AuthError, SessionManager, SessionState};

use std::sync::Arc;

use crate::api::{HttpIdentityApi, HttpShoppingApi, RestClient};
use crate::session::{CredentialStore, FileStore, MemoryStore};

/// Fully wired SDK entry point.
///
/// Cheap to clone; clones share session and cart state.
#[derive(Clone)]
pub struct CartsideClient {
    session: SessionManager,
    cart: CartSynchronizer,
}

impl CartsideClient {
    /// Wire up both components against the configured service URLs.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let store: Box<dyn CredentialStore> = match &config.session_file {
            Some(path) => Box::new(FileStore::open(path)),
            None => Box::new(MemoryStore::new()),
        };

        let identity = RestClient::new(config.users_base_url.clone());
        let session = SessionManager::new(Arc::new(HttpIdentityApi::new(identity)), store);

        // Cart and order requests carry the session's bearer credential.
        let shopping = RestClient::with_token_provider(
            config.shopping_base_url.clone(),
            Arc::new(session.clone()),
        );
        let cart = CartSynchronizer::new(Arc::new(HttpShoppingApi::new(shopping)), session.clone());

        Self { session, cart }
    }

    /// Load configuration from the environment and wire up the client.
    ///
    /// # Errors
    ///
    /// Returns an error if configured service URLs do not parse.
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        Ok(Self::from_config(&config))
    }

    /// The session manager.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// The cart synchronizer.
    #[must_use]
    pub fn cart(&self) -> &CartSynchronizer {
        &self.cart
    }

    /// Spawn the background task that keeps the cart in step with session
    /// state. Abort the handle (or drop the client) to stop it.
    #[must_use]
    pub fn spawn_cart_sync(&self) -> tokio::task::JoinHandle<()> {
        let cart = self.cart.clone();
        tokio::spawn(async move { cart.run().await })
    }
}
