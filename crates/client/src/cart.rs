//! Cart synchronization.
//!
//! [`CartSynchronizer`] keeps a local mirror of the server-owned shopping
//! cart. The mirror is never computed locally: every mutation either applies
//! the server's post-mutation snapshot or performs a full reload, so the
//! local view cannot drift from server truth. All operations are gated on an
//! authenticated shopper session; administrative sessions never hold a cart.
//!
//! The synchronizer subscribes to the session manager's published state:
//! a shopper logging in loads their cart, anything else collapses the
//! mirror to absent.

use std::cmp::Ordering;
use std::sync::Arc;

use cartside_core::ProductId;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, ShoppingApi};
use crate::models::{Cart, OrderConfirmation};
use crate::session::{SessionManager, SessionState};

/// Errors surfaced by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No authenticated shopper session; cart operations are role-gated.
    #[error("no authenticated shopper session")]
    Unauthenticated,

    /// No cart has been loaded yet.
    #[error("no cart loaded")]
    NoCart,

    /// The referenced product is not in the local cart.
    #[error("product {0} is not in the cart")]
    ItemNotFound(ProductId),

    /// The shopping service rejected the call or could not be reached.
    #[error("cart service error: {0}")]
    Api(#[from] ApiError),
}

/// Keeps the local cart mirror consistent with the shopping service.
///
/// Cheap to clone; clones share the same mirror.
#[derive(Clone)]
pub struct CartSynchronizer {
    inner: Arc<CartInner>,
}

struct CartInner {
    api: Arc<dyn ShoppingApi>,
    session: SessionManager,
    cart: watch::Sender<Option<Cart>>,
}

impl CartSynchronizer {
    /// Create a synchronizer bound to a session manager.
    ///
    /// The synchronizer does not start reacting to session changes on its
    /// own; drive it with [`CartSynchronizer::run`] (usually via
    /// `tokio::spawn`).
    #[must_use]
    pub fn new(api: Arc<dyn ShoppingApi>, session: SessionManager) -> Self {
        let (cart, _) = watch::channel(None);
        Self {
            inner: Arc::new(CartInner { api, session, cart }),
        }
    }

    // =========================================================================
    // Session coupling
    // =========================================================================

    /// React to every published session state until the session manager is
    /// dropped.
    ///
    /// This is the only cross-component ordering guarantee in the SDK: cart
    /// loads and clears happen in session-state order, so a cart can never
    /// survive a logout or a role change.
    pub async fn run(&self) {
        let mut states = self.inner.session.subscribe();
        loop {
            let state = states.borrow_and_update().clone();
            self.apply_session_state(&state).await;
            if states.changed().await.is_err() {
                break;
            }
        }
    }

    /// Apply one session state to the mirror: load the cart for a shopper,
    /// clear it for anyone else.
    ///
    /// Exposed for drivers that manage their own subscription.
    pub async fn apply_session_state(&self, state: &SessionState) {
        match state.user() {
            Some(user) if user.role.is_shopper() => {
                if let Err(err) = self.load_cart().await {
                    warn!(error = %err, "cart load after session change failed");
                }
            }
            Some(user) => {
                debug!(role = %user.role, "non-shopper session; cart stays absent");
                self.clear_cart();
            }
            None => self.clear_cart(),
        }
    }

    /// The session owner eligible for cart operations.
    fn owner(&self) -> Result<String, CartError> {
        let user = self
            .inner
            .session
            .current_user()
            .ok_or(CartError::Unauthenticated)?;
        if !user.role.is_shopper() {
            return Err(CartError::Unauthenticated);
        }
        // Re-check validity so an expired token collapses the session here
        // rather than surfacing as a confusing service error.
        if !self.inner.session.is_authenticated() {
            return Err(CartError::Unauthenticated);
        }
        Ok(user.owner_key().to_owned())
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Replace the mirror with the server's cart for the current shopper.
    ///
    /// A fetch failure is not fatal: the server provisions carts lazily, so
    /// "no cart yet" simply becomes an empty local cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unauthenticated` without an eligible session.
    #[instrument(skip(self))]
    pub async fn load_cart(&self) -> Result<Cart, CartError> {
        let owner = self.owner()?;
        let cart = match self.inner.api.fetch_cart(&owner).await {
            Ok(snapshot) => Cart::from(snapshot),
            Err(err) => {
                debug!(error = %err, "no server cart available; starting empty");
                Cart::empty(owner)
            }
        };
        self.inner.cart.send_replace(Some(cart.clone()));
        Ok(cart)
    }

    /// Add `quantity` units of a product.
    ///
    /// The server returns a full post-mutation snapshot, which replaces the
    /// mirror.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unauthenticated` without an eligible session, or
    /// `CartError::Api` if the mutation fails.
    #[instrument(skip(self), fields(product = %product))]
    pub async fn add_to_cart(&self, product: &ProductId, quantity: u32) -> Result<Cart, CartError> {
        let owner = self.owner()?;
        let snapshot = self.inner.api.add_item(&owner, product, quantity).await?;
        let cart = Cart::from(snapshot);
        self.inner.cart.send_replace(Some(cart.clone()));
        Ok(cart)
    }

    /// Set a product's quantity to an absolute value.
    ///
    /// The product must already be in the cart. The call is translated into
    /// the service's delta operations:
    ///
    /// - `quantity == 0` removes the item entirely;
    /// - above the current quantity, the difference is added (snapshot
    ///   response, no reload);
    /// - below it, the difference is decremented and the cart reloaded (the
    ///   decrement endpoint returns no snapshot);
    /// - equal to it, nothing happens - no network call is made.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the product is not in the cart,
    /// `CartError::NoCart` if no cart is loaded, `CartError::Unauthenticated`
    /// without an eligible session, or `CartError::Api` on service failure.
    #[instrument(skip(self), fields(product = %product, quantity))]
    pub async fn update_cart_item(
        &self,
        product: &ProductId,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        let owner = self.owner()?;
        let current = self.current_cart().ok_or(CartError::NoCart)?;
        let current_quantity = current
            .item(product)
            .map(|item| item.quantity)
            .ok_or_else(|| CartError::ItemNotFound(product.clone()))?;

        if quantity == 0 {
            return self.remove_from_cart(product).await;
        }

        match quantity.cmp(&current_quantity) {
            Ordering::Equal => Ok(current),
            Ordering::Greater => self.add_to_cart(product, quantity - current_quantity).await,
            Ordering::Less => {
                self.inner
                    .api
                    .remove_item(&owner, product, current_quantity - quantity)
                    .await?;
                self.load_cart().await
            }
        }
    }

    /// Remove a product entirely by decrementing its full current quantity,
    /// then reloading the cart.
    ///
    /// # Errors
    ///
    /// Same conditions as [`CartSynchronizer::update_cart_item`].
    #[instrument(skip(self), fields(product = %product))]
    pub async fn remove_from_cart(&self, product: &ProductId) -> Result<Cart, CartError> {
        let owner = self.owner()?;
        let current = self.current_cart().ok_or(CartError::NoCart)?;
        let current_quantity = current
            .item(product)
            .map(|item| item.quantity)
            .ok_or_else(|| CartError::ItemNotFound(product.clone()))?;

        self.inner
            .api
            .remove_item(&owner, product, current_quantity)
            .await?;
        self.load_cart().await
    }

    /// Reset the mirror to absent. Local only; the server cart is untouched.
    pub fn clear_cart(&self) {
        self.inner.cart.send_replace(None);
    }

    /// Turn the current cart into an order, then reload the (now empty)
    /// server cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unauthenticated` without an eligible session, or
    /// `CartError::Api` if order creation fails.
    #[instrument(skip(self))]
    pub async fn checkout(&self) -> Result<OrderConfirmation, CartError> {
        let owner = self.owner()?;
        let confirmation = self.inner.api.create_order(&owner).await?;
        debug!(order = confirmation.id_order, "order placed from cart");
        // The server emptied the cart; bring the mirror back in line.
        self.load_cart().await?;
        Ok(confirmation)
    }

    // =========================================================================
    // Local queries
    // =========================================================================

    /// The current mirror, if a cart is loaded.
    #[must_use]
    pub fn current_cart(&self) -> Option<Cart> {
        self.inner.cart.borrow().clone()
    }

    /// Subscribe to cart mirror changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Cart>> {
        self.inner.cart.subscribe()
    }

    /// Total quantity across all lines; 0 with no cart loaded.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.current_cart().map_or(0, |cart| cart.total_items())
    }

    /// Whether the product has a line in the cart; false with no cart
    /// loaded.
    #[must_use]
    pub fn contains_product(&self, product: &ProductId) -> bool {
        self.current_cart()
            .is_some_and(|cart| cart.item(product).is_some())
    }

    /// Quantity of a product in the cart; 0 when absent or with no cart
    /// loaded.
    #[must_use]
    pub fn product_quantity(&self, product: &ProductId) -> u32 {
        self.current_cart()
            .and_then(|cart| cart.item(product).map(|item| item.quantity))
            .unwrap_or(0)
    }
}
