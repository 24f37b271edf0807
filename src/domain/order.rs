//! Order lifecycle.
//!
//! A user's working cart and their placed orders live in the same table and
//! differ only by `state`. In code the two are distinct types: only a [`Cart`]
//! can be mutated, and [`Cart::place`] is the single way to obtain a
//! [`PlacedOrder`].

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Cart,
    Placed,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Cart => "cart",
            OrderState::Placed => "placed",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = PlaceOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cart" => Ok(OrderState::Cart),
            "placed" => Ok(OrderState::Placed),
            other => Err(PlaceOrderError::UnknownState(other.to_string())),
        }
    }
}

/// One product line, priced against the shop's offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub product_info_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

impl LineItem {
    fn subtotal(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Clone)]
pub struct Cart {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub items: Vec<LineItem>,
    pub total_amount: i64,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum OrderRecord {
    Cart(Cart),
    Placed(PlacedOrder),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaceOrderError {
    #[error("Cart is empty")]
    EmptyCart,
    #[error("invalid quantity for product {0}")]
    InvalidQuantity(Uuid),
    #[error("order total overflows")]
    TotalOverflow,
    #[error("order is already placed")]
    AlreadyPlaced,
    #[error("placed order has no placement time")]
    MissingPlacedAt,
    #[error("unknown order state `{0}`")]
    UnknownState(String),
}

impl OrderRecord {
    /// Rebuild a record from a stored row. Placed rows must carry their
    /// placement timestamp and total.
    pub fn from_parts(
        order_id: Uuid,
        user_id: Uuid,
        state: &str,
        contact_id: Option<Uuid>,
        total_amount: Option<i64>,
        placed_at: Option<DateTime<Utc>>,
        items: Vec<LineItem>,
    ) -> Result<Self, PlaceOrderError> {
        match state.parse::<OrderState>()? {
            OrderState::Cart => Ok(OrderRecord::Cart(Cart {
                order_id,
                user_id,
                items,
            })),
            OrderState::Placed => {
                let placed_at = placed_at.ok_or(PlaceOrderError::MissingPlacedAt)?;
                Ok(OrderRecord::Placed(PlacedOrder {
                    order_id,
                    user_id,
                    contact_id,
                    total_amount: total_amount.unwrap_or_default(),
                    placed_at,
                    items,
                }))
            }
        }
    }

    pub fn state(&self) -> OrderState {
        match self {
            OrderRecord::Cart(_) => OrderState::Cart,
            OrderRecord::Placed(_) => OrderState::Placed,
        }
    }

    pub fn items(&self) -> &[LineItem] {
        match self {
            OrderRecord::Cart(cart) => &cart.items,
            OrderRecord::Placed(order) => &order.items,
        }
    }

    pub fn into_cart(self) -> Result<Cart, PlaceOrderError> {
        match self {
            OrderRecord::Cart(cart) => Ok(cart),
            OrderRecord::Placed(_) => Err(PlaceOrderError::AlreadyPlaced),
        }
    }
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> Option<i64> {
        self.items
            .iter()
            .try_fold(0_i64, |acc, item| acc.checked_add(item.subtotal()?))
    }

    /// Transition cart -> placed. Consumes the cart.
    pub fn place(
        self,
        contact_id: Option<Uuid>,
        placed_at: DateTime<Utc>,
    ) -> Result<PlacedOrder, PlaceOrderError> {
        if self.is_empty() {
            return Err(PlaceOrderError::EmptyCart);
        }
        if let Some(bad) = self.items.iter().find(|item| item.quantity < 1) {
            return Err(PlaceOrderError::InvalidQuantity(bad.product_info_id));
        }
        let total_amount = self.total().ok_or(PlaceOrderError::TotalOverflow)?;

        Ok(PlacedOrder {
            order_id: self.order_id,
            user_id: self.user_id,
            contact_id,
            items: self.items,
            total_amount,
            placed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price: i64) -> LineItem {
        LineItem {
            product_info_id: Uuid::new_v4(),
            quantity,
            unit_price,
        }
    }

    fn cart(items: Vec<LineItem>) -> Cart {
        Cart {
            order_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            items,
        }
    }

    #[test]
    fn placing_empty_cart_is_rejected() {
        let err = cart(vec![]).place(None, Utc::now()).unwrap_err();
        assert_eq!(err, PlaceOrderError::EmptyCart);
    }

    #[test]
    fn placed_order_keeps_identity_and_sums_lines() {
        let c = cart(vec![line(2, 1500), line(1, 250)]);
        let order_id = c.order_id;
        let contact = Uuid::new_v4();

        let placed = c.place(Some(contact), Utc::now()).unwrap();

        assert_eq!(placed.order_id, order_id);
        assert_eq!(placed.contact_id, Some(contact));
        assert_eq!(placed.total_amount, 3250);
        assert_eq!(placed.items.len(), 2);
    }

    #[test]
    fn zero_quantity_line_blocks_placement() {
        let bad = line(0, 100);
        let bad_id = bad.product_info_id;
        let err = cart(vec![line(1, 100), bad]).place(None, Utc::now()).unwrap_err();
        assert_eq!(err, PlaceOrderError::InvalidQuantity(bad_id));
    }

    #[test]
    fn overflowing_total_is_an_error() {
        let err = cart(vec![line(2, i64::MAX)]).place(None, Utc::now()).unwrap_err();
        assert_eq!(err, PlaceOrderError::TotalOverflow);
    }

    #[test]
    fn placed_record_cannot_be_reopened_as_cart() {
        let record = OrderRecord::from_parts(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "placed",
            None,
            Some(10),
            Some(Utc::now()),
            vec![line(1, 10)],
        )
        .unwrap();

        assert_eq!(record.state(), OrderState::Placed);
        assert_eq!(record.items().len(), 1);
        assert_eq!(record.into_cart().unwrap_err(), PlaceOrderError::AlreadyPlaced);
    }

    #[test]
    fn unknown_state_is_rejected() {
        let err = OrderRecord::from_parts(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "shipped",
            None,
            None,
            None,
            vec![],
        )
        .unwrap_err();
        assert_eq!(err, PlaceOrderError::UnknownState("shipped".into()));
    }
}
