//! Carts, reservations and the orders they turn into.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tristore_core::{AddressId, CartId, CustomerId, ListingId, OrderId, OrderPositionId, SupplierId};

/// A customer's shopping cart. Mirrored as a `ShoppingCart` graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingCart {
    pub id: CartId,
    pub customer_id: CustomerId,
    pub date_created: DateTime<Utc>,
}

/// Amount of a listing held in a cart (`IS_IN` edge with `Amount`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub cart_id: CartId,
    pub listing_id: ListingId,
    pub amount: i32,
}

/// An order header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerOrder {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub billing_address_id: AddressId,
    pub order_date: DateTime<Utc>,
    pub is_paid: bool,
}

/// One committed line of an order. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPosition {
    pub id: OrderPositionId,
    pub order_id: OrderId,
    pub listing_id: ListingId,
    pub amount: i32,
    pub delivery_address_id: AddressId,
    pub delivery_date: DateTime<Utc>,
    pub supplier_id: SupplierId,
}

/// Result of checking out a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order: CustomerOrder,
    pub positions: Vec<OrderPosition>,
}
