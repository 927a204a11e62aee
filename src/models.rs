use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub brand: String,
    pub price: i64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCartItem {
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A cart item joined with the product it points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct CartLine {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub brand: String,
    pub price: i64,
    pub stock: i32,
    pub quantity: i32,
}

impl CartLine {
    /// Saturates at `i64::MAX` instead of wrapping.
    pub fn line_total(&self) -> i64 {
        self.price.saturating_mul(i64::from(self.quantity))
    }
}

pub fn cart_subtotal(lines: &[CartLine]) -> i64 {
    lines
        .iter()
        .map(CartLine::line_total)
        .fold(0, i64::saturating_add)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    /// Fraction of the subtotal, `0.10` is ten percent.
    pub discount_percent: f64,
    pub usage_limit: i32,
    pub maximum_discount_price: i64,
    pub minimum_purchase_price: i64,
    pub expiry_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCoupon {
    pub code: String,
    pub discount_percent: f64,
    pub usage_limit: i32,
    pub maximum_discount_price: i64,
    pub minimum_purchase_price: i64,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subtotal: i64,
    pub discount: i64,
    pub total_amount: i64,
    pub coupon_code: Option<String>,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: i32) -> CartLine {
        CartLine {
            item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "Ferris Mug".into(),
            brand: "Rustacean".into(),
            price,
            stock: 10,
            quantity,
        }
    }

    #[test]
    fn subtotal_sums_line_totals() {
        assert_eq!(cart_subtotal(&[line(100, 2), line(50, 2)]), 300);
        assert_eq!(cart_subtotal(&[]), 0);
    }

    #[test]
    fn subtotal_saturates_instead_of_overflowing() {
        assert_eq!(line(i64::MAX / 2, 3).line_total(), i64::MAX);
        assert_eq!(cart_subtotal(&[line(i64::MAX, 1), line(1, 1)]), i64::MAX);
    }
}
