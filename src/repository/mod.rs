//! Persistence adapter consumed by the cart and coupon services.
//!
//! Every read returns plain records from [`crate::models`]; nothing above this
//! layer touches SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Cart, CartItem, CartLine, Coupon, NewCartItem, NewCoupon, Product};

mod postgres;

pub use postgres::PgStore;
pub(crate) use postgres::coupon_from_entity;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write. Carries what was duplicated.
    #[error("duplicate {0}")]
    Duplicate(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Orm(#[from] sea_orm::DbErr),
}

#[automock]
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn find_cart_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError>;

    /// Returns the user's cart, creating it when absent. Safe under concurrent callers.
    async fn create_cart(&self, user_id: Uuid) -> Result<Cart, StoreError>;

    async fn find_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, StoreError>;

    async fn count_cart_items(&self, cart_id: Uuid) -> Result<i64, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the product is already in the cart.
    async fn insert_cart_item(&self, item: NewCartItem) -> Result<CartItem, StoreError>;

    async fn delete_cart_item(&self, id: Uuid) -> Result<u64, StoreError>;

    /// Sets the quantity only while the product's stock still covers it.
    /// `None` means the stock guard rejected the update.
    async fn update_cart_item_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItem>, StoreError>;

    async fn list_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartLine>, StoreError>;

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, StoreError>;

    /// Page of coupons plus the total count. With `active_at`, expired and
    /// exhausted coupons are left out.
    async fn list_coupons(
        &self,
        active_at: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Coupon>, i64), StoreError>;

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, StoreError>;

    async fn update_coupon(
        &self,
        id: Uuid,
        coupon: NewCoupon,
    ) -> Result<Option<Coupon>, StoreError>;

    async fn delete_coupon(&self, id: Uuid) -> Result<u64, StoreError>;
}
