use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::validation::{
    validate_non_negative, validate_optional_text, validate_price, validate_range, validate_text,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoreItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_cents: i64,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStoreItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_cents: i64,
    pub stock_quantity: i32,
    pub image_url: Option<String>,
}

impl CreateStoreItemRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_text("name", &self.name, 150)?;
        validate_optional_text("description", self.description.as_deref(), 4000)?;
        validate_text("category", &self.category, 60)?;
        validate_price("price_cents", self.price_cents)?;
        validate_non_negative("stock_quantity", self.stock_quantity as i64)?;
        validate_optional_text("image_url", self.image_url.as_deref(), 1000)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateStoreItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub stock_quantity: Option<i32>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateStoreItemRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_optional_text("name", self.name.as_deref(), 150)?;
        validate_optional_text("description", self.description.as_deref(), 4000)?;
        validate_optional_text("category", self.category.as_deref(), 60)?;
        if let Some(price) = self.price_cents {
            validate_price("price_cents", price)?;
        }
        if let Some(stock) = self.stock_quantity {
            validate_non_negative("stock_quantity", stock as i64)?;
        }
        validate_optional_text("image_url", self.image_url.as_deref(), 1000)
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemListQuery {
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One cart line joined with the current item price and stock
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartLine {
    pub item_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
    pub stock_quantity: i32,
    pub is_active: bool,
}

fn amount_too_large() -> AppError {
    AppError::validation("Order amount is too large")
}

impl CartLine {
    pub fn line_total_cents(&self) -> AppResult<i64> {
        self.unit_price_cents
            .checked_mul(i64::from(self.quantity))
            .ok_or_else(amount_too_large)
    }
}

/// Sum of all line totals, failing instead of overflowing
pub fn subtotal_cents(lines: &[CartLine]) -> AppResult<i64> {
    lines.iter().try_fold(0i64, |total, line| {
        total
            .checked_add(line.line_total_cents()?)
            .ok_or_else(amount_too_large)
    })
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal_cents: i64,
}

impl CartView {
    pub fn new(lines: Vec<CartLine>) -> AppResult<Self> {
        let subtotal_cents = subtotal_cents(&lines)?;
        Ok(Self {
            lines,
            subtotal_cents,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub item_id: Uuid,
    pub quantity: i32,
}

impl AddToCartRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_range("quantity", self.quantity, 1, 100)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}

impl UpdateCartRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_range("quantity", self.quantity, 0, 100)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    pub points_to_redeem: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Cancelled) | (Processing, Completed) | (Processing, Cancelled)
        )
    }

    pub fn ensure_transition(self, next: OrderStatus) -> AppResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::conflict(format!(
                "Cannot move order from {self:?} to {next:?}"
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub member_id: Uuid,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub points_redeemed: i64,
    pub points_earned: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::validation::MAX_PRICE_CENTS;

    #[test]
    fn test_order_transitions() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(Completed.ensure_transition(Processing).is_err());
    }

    fn line(price: i64, quantity: i32) -> CartLine {
        CartLine {
            item_id: Uuid::new_v4(),
            name: "Shaker".to_string(),
            unit_price_cents: price,
            quantity,
            stock_quantity: 10,
            is_active: true,
        }
    }

    #[test]
    fn test_cart_subtotal() {
        let cart = CartView::new(vec![line(1299, 2), line(450, 1)]).unwrap();
        assert_eq!(cart.subtotal_cents, 3048);
        assert_eq!(CartView::new(vec![]).unwrap().subtotal_cents, 0);
    }

    #[test]
    fn test_item_price_is_capped() {
        let request = CreateStoreItemRequest {
            name: "Gold Dumbbell".to_string(),
            description: None,
            category: "equipment".to_string(),
            price_cents: i64::MAX / 2 + 1,
            stock_quantity: 1,
            image_url: None,
        };
        assert!(request.validate().is_err());

        let update = UpdateStoreItemRequest {
            price_cents: Some(MAX_PRICE_CENTS + 1),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_oversized_amounts_fail_instead_of_wrapping() {
        let huge = i64::MAX / 2 + 1;
        assert!(line(huge, 2).line_total_cents().is_err());
        assert!(CartView::new(vec![line(huge, 1), line(huge, 1)]).is_err());
        assert_eq!(line(MAX_PRICE_CENTS, 100).line_total_cents().unwrap(), 10_000_000_000);
    }

    #[test]
    fn test_cart_quantity_bounds() {
        assert!(AddToCartRequest { item_id: Uuid::new_v4(), quantity: 0 }.validate().is_err());
        assert!(UpdateCartRequest { quantity: 0 }.validate().is_ok());
        assert!(UpdateCartRequest { quantity: -1 }.validate().is_err());
    }
}
