//! Domain and wire models shared by the session and cart components.
//!
//! Wire structs mirror the JSON emitted by the identity and shopping
//! microservices (camelCase fields, server-computed totals). Domain structs
//! are what the rest of the SDK and its consumers work with; conversions are
//! one-way, server to client, because the server is the source of truth.

use cartside_core::{Email, ProductId, Role};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// Identity of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user ID.
    pub id: String,
    /// Login name. For accounts provisioned by the identity service this is
    /// the email address.
    pub username: String,
    /// Email address, when the identity service reports one.
    #[serde(default)]
    pub email: Option<Email>,
    /// Display name.
    pub name: String,
    /// Role used for authorization gating.
    pub role: Role,
}

impl User {
    /// The key that identifies this user's cart and orders on the shopping
    /// service: the email address, falling back to the username.
    #[must_use]
    pub fn owner_key(&self) -> &str {
        self.email
            .as_ref()
            .map_or(self.username.as_str(), Email::as_str)
    }
}

/// Credentials sent to the identity service.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration payload for the identity service.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Acknowledgement returned by the register endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredUser {
    pub email: String,
    pub name: String,
}

/// Raw login response.
///
/// The identity service has shipped two shapes: the canonical
/// `{token, user: {...}}` and a flat `{token, email, role, expiresAt}`.
/// Both are accepted and normalized into a [`Session`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LoginResponse {
    /// Canonical shape with a nested user record.
    Canonical { token: String, user: User },
    /// Flat shape without a user record; identity fields sit at the top level.
    Flat {
        token: String,
        #[serde(default)]
        id: Option<String>,
        email: Email,
        role: Role,
    },
}

/// Normalized authentication result: the bearer credential plus the user it
/// belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer credential.
    pub token: String,
    /// The authenticated user.
    pub user: User,
}

impl Session {
    /// Normalize either login response shape into the canonical session.
    ///
    /// The flat shape carries no display name, so one is derived from the
    /// local part of the email, and a missing ID defaults to `"1"`.
    #[must_use]
    pub fn from_response(response: LoginResponse) -> Self {
        match response {
            LoginResponse::Canonical { token, user } => Self { token, user },
            LoginResponse::Flat {
                token,
                id,
                email,
                role,
            } => {
                let user = User {
                    id: id.unwrap_or_else(|| "1".to_owned()),
                    username: email.as_str().to_owned(),
                    name: email.local_part().to_owned(),
                    role,
                    email: Some(email),
                };
                Self { token, user }
            }
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A single line of the local cart mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub product_id: ProductId,
    pub product_name: String,
    /// Unit price, as reported by the server.
    pub unit_price: Decimal,
    pub quantity: u32,
    pub image_url: Option<String>,
    /// Stock the server reported as available at snapshot time.
    pub available_stock: u32,
}

/// The local mirror of a server-owned cart.
///
/// `total_amount` is server-computed and never recomputed locally; the mirror
/// is rebuilt from server snapshots after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    /// Server-assigned cart ID, absent until the server has provisioned one.
    pub id: Option<i64>,
    /// Owner key (email or username).
    pub owner: String,
    pub items: Vec<CartItem>,
    pub total_amount: Decimal,
}

impl Cart {
    /// An empty cart for an owner the server has not provisioned yet.
    #[must_use]
    pub fn empty(owner: impl Into<String>) -> Self {
        Self {
            id: None,
            owner: owner.into(),
            items: Vec::new(),
            total_amount: Decimal::ZERO,
        }
    }

    /// Look up a line by product.
    #[must_use]
    pub fn item(&self, product: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product)
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Wire shape of a cart returned by the shopping service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub id: i64,
    pub email: String,
    pub items: Vec<CartLine>,
    pub total_amount: Decimal,
}

/// Wire shape of a cart line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    pub stock: u32,
}

impl From<CartSnapshot> for Cart {
    fn from(snapshot: CartSnapshot) -> Self {
        Self {
            id: Some(snapshot.id),
            owner: snapshot.email,
            items: snapshot.items.into_iter().map(CartItem::from).collect(),
            total_amount: snapshot.total_amount,
        }
    }
}

impl From<CartLine> for CartItem {
    fn from(line: CartLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name,
            unit_price: line.price,
            quantity: line.quantity,
            image_url: line.image_url,
            available_stock: line.stock,
        }
    }
}

/// Delta posted to the add-to-cart endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

// =============================================================================
// Orders
// =============================================================================

/// Order created from a cart by the shopping service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub id_order: i64,
    pub order_date: String,
    pub payment_method: String,
    pub total: Decimal,
    pub user_email: String,
    pub cart_id: i64,
    #[serde(default)]
    pub order_details: Vec<OrderLine>,
}

/// A line of a confirmed order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id_order_detail: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub amount: u32,
    pub price: Decimal,
    pub total: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_canonical_shape() {
        let json = r#"{
            "token": "abc.def.ghi",
            "user": {
                "id": "7",
                "username": "ana@example.com",
                "email": "ana@example.com",
                "name": "Ana",
                "role": "user"
            }
        }"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();
        let session = Session::from_response(response);
        assert_eq!(session.token, "abc.def.ghi");
        assert_eq!(session.user.name, "Ana");
        assert_eq!(session.user.role, Role::Shopper);
    }

    #[test]
    fn test_login_response_flat_shape_derives_name() {
        let json = r#"{
            "token": "abc.def.ghi",
            "email": "ana.perez@example.com",
            "role": "ADMIN",
            "expiresAt": "2026-09-01T00:00:00Z"
        }"#;
        let response: LoginResponse = serde_json::from_str(json).unwrap();
        let session = Session::from_response(response);
        assert_eq!(session.user.id, "1");
        assert_eq!(session.user.username, "ana.perez@example.com");
        assert_eq!(session.user.name, "ana.perez");
        assert_eq!(session.user.role, Role::Admin);
    }

    #[test]
    fn test_owner_key_prefers_email() {
        let user = User {
            id: "1".to_owned(),
            username: "ana".to_owned(),
            email: Some(Email::parse("ana@example.com").unwrap()),
            name: "Ana".to_owned(),
            role: Role::Shopper,
        };
        assert_eq!(user.owner_key(), "ana@example.com");

        let no_email = User {
            email: None,
            ..user
        };
        assert_eq!(no_email.owner_key(), "ana");
    }

    #[test]
    fn test_cart_snapshot_conversion() {
        let json = r#"{
            "id": 12,
            "email": "ana@example.com",
            "items": [
                {
                    "productId": "p1",
                    "productName": "Keyboard",
                    "price": 49.90,
                    "quantity": 2,
                    "imageUrl": "http://img/p1.png",
                    "stock": 8
                }
            ],
            "totalAmount": 99.80
        }"#;
        let snapshot: CartSnapshot = serde_json::from_str(json).unwrap();
        let cart = Cart::from(snapshot);
        assert_eq!(cart.id, Some(12));
        assert_eq!(cart.owner, "ana@example.com");
        assert_eq!(cart.total_items(), 2);
        let item = cart.item(&ProductId::new("p1")).unwrap();
        assert_eq!(item.product_name, "Keyboard");
        assert_eq!(item.available_stock, 8);
        assert_eq!(cart.total_amount, Decimal::new(9980, 2));
    }

    #[test]
    fn test_empty_cart_defaults() {
        let cart = Cart::empty("ana@example.com");
        assert_eq!(cart.id, None);
        assert_eq!(cart.total_items(), 0);
        assert!(cart.item(&ProductId::new("p1")).is_none());
        assert_eq!(cart.total_amount, Decimal::ZERO);
    }

    #[test]
    fn test_order_confirmation_parse() {
        let json = r#"{
            "idOrder": 3,
            "orderDate": "2026-08-30T10:00:00Z",
            "paymentMethod": "card",
            "total": 99.80,
            "userEmail": "ana@example.com",
            "cartId": 12,
            "orderDetails": [
                {
                    "idOrderDetail": 1,
                    "orderId": 3,
                    "productId": 41,
                    "amount": 2,
                    "price": 49.90,
                    "total": 99.80
                }
            ]
        }"#;
        let order: OrderConfirmation = serde_json::from_str(json).unwrap();
        assert_eq!(order.id_order, 3);
        assert_eq!(order.order_details.len(), 1);
    }
}
