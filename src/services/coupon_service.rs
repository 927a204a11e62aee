use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{Coupon, NewCoupon, cart_subtotal},
    repository::{Store, StoreError},
};

#[derive(Debug, Error)]
pub enum CouponError {
    #[error("coupon not found")]
    CouponNotFound,

    #[error("coupon has expired")]
    CouponExpired,

    #[error("cart subtotal {subtotal} is below the coupon minimum of {minimum}")]
    MinimumNotMet { minimum: i64, subtotal: i64 },

    #[error("coupon usage limit reached")]
    UsageLimitReached,

    #[error("coupon code already exists")]
    DuplicateCode,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of quoting a coupon against the current cart.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AppliedCoupon {
    pub code: String,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
}

/// Discount `coupon` grants on `subtotal` at `now`.
///
/// `floor(subtotal * discount_percent)` capped at `maximum_discount_price`.
/// Fails when the coupon is expired, used up, or the subtotal is below the
/// minimum purchase.
pub fn compute_discount(
    coupon: &Coupon,
    subtotal: i64,
    now: DateTime<Utc>,
) -> Result<i64, CouponError> {
    if now > coupon.expiry_date {
        return Err(CouponError::CouponExpired);
    }
    if coupon.usage_limit <= 0 {
        return Err(CouponError::UsageLimitReached);
    }
    if subtotal < coupon.minimum_purchase_price {
        return Err(CouponError::MinimumNotMet {
            minimum: coupon.minimum_purchase_price,
            subtotal,
        });
    }

    // percent resolved to parts per million so the floor runs on integers
    let ppm = (coupon.discount_percent * PPM as f64).round() as i128;
    let raw = i128::from(subtotal.max(0)) * ppm / i128::from(PPM);
    let raw = i64::try_from(raw).unwrap_or(i64::MAX);
    Ok(raw.clamp(0, coupon.maximum_discount_price))
}

const PPM: i64 = 1_000_000;

/// Canonical form of a coupon code: trimmed and upper-cased.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn validate(mut coupon: NewCoupon) -> Result<NewCoupon, CouponError> {
    coupon.code = normalize_code(&coupon.code);
    if coupon.code.is_empty() {
        return Err(CouponError::Validation("code is required".into()));
    }
    if !(coupon.discount_percent > 0.0 && coupon.discount_percent <= 1.0) {
        return Err(CouponError::Validation(
            "discount_percent must be in (0, 1]".into(),
        ));
    }
    if coupon.usage_limit < 0 {
        return Err(CouponError::Validation(
            "usage_limit must not be negative".into(),
        ));
    }
    if coupon.maximum_discount_price < 0 || coupon.minimum_purchase_price < 0 {
        return Err(CouponError::Validation(
            "discount and purchase amounts must not be negative".into(),
        ));
    }
    Ok(coupon)
}

fn map_duplicate(err: StoreError) -> CouponError {
    match err {
        StoreError::Duplicate(_) => CouponError::DuplicateCode,
        other => CouponError::Store(other),
    }
}

pub struct CouponService<S> {
    store: Arc<S>,
}

impl<S> Clone for CouponService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> CouponService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, CouponError> {
        let coupon = validate(coupon)?;
        let created = self
            .store
            .create_coupon(coupon)
            .await
            .map_err(map_duplicate)?;
        tracing::info!(code = %created.code, "coupon created");
        Ok(created)
    }

    pub async fn update_coupon(&self, id: Uuid, coupon: NewCoupon) -> Result<Coupon, CouponError> {
        let coupon = validate(coupon)?;
        self.store
            .update_coupon(id, coupon)
            .await
            .map_err(map_duplicate)?
            .ok_or(CouponError::CouponNotFound)
    }

    pub async fn delete_coupon(&self, id: Uuid) -> Result<(), CouponError> {
        if self.store.delete_coupon(id).await? == 0 {
            return Err(CouponError::CouponNotFound);
        }
        Ok(())
    }

    pub async fn view_coupon(&self, id: Uuid) -> Result<Coupon, CouponError> {
        self.store
            .find_coupon(id)
            .await?
            .ok_or(CouponError::CouponNotFound)
    }

    /// With `active_at` only coupons still redeemable at that instant are listed.
    pub async fn list_coupons(
        &self,
        active_at: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Coupon>, i64), CouponError> {
        Ok(self.store.list_coupons(active_at, limit, offset).await?)
    }

    /// Quote `code` against the user's cart. Usage is consumed at checkout, not here.
    pub async fn apply_coupon(&self, user_id: Uuid, code: &str) -> Result<AppliedCoupon, CouponError> {
        let code = normalize_code(code);
        let coupon = self
            .store
            .find_coupon_by_code(&code)
            .await?
            .ok_or(CouponError::CouponNotFound)?;

        let lines = match self.store.find_cart_by_user(user_id).await? {
            Some(cart) => self.store.list_cart_items(cart.id).await?,
            None => Vec::new(),
        };
        let subtotal = cart_subtotal(&lines);

        let discount = compute_discount(&coupon, subtotal, Utc::now()).inspect_err(|err| {
            tracing::info!(%user_id, code = %coupon.code, error = %err, "coupon rejected");
        })?;

        Ok(AppliedCoupon {
            code: coupon.code,
            subtotal,
            discount,
            total: subtotal - discount,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        models::{Cart, CartLine},
        repository::MockStore,
    };

    fn coupon(percent: f64, max: i64, min: i64, expiry: DateTime<Utc>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            discount_percent: percent,
            usage_limit: 10,
            maximum_discount_price: max,
            minimum_purchase_price: min,
            expiry_date: expiry,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(price: i64, quantity: i32) -> CartLine {
        CartLine {
            item_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "Axum Hoodie".into(),
            brand: "Tokio".into(),
            price,
            stock: 10,
            quantity,
        }
    }

    fn store_with(found: Option<Coupon>, lines: Vec<CartLine>) -> MockStore {
        let mut store = MockStore::new();
        store
            .expect_find_coupon_by_code()
            .return_once(move |_| Ok(found));
        store.expect_find_cart_by_user().return_once(|user_id| {
            Ok(Some(Cart {
                id: Uuid::new_v4(),
                user_id,
                created_at: Utc::now(),
            }))
        });
        store.expect_list_cart_items().return_once(move |_| Ok(lines));
        store
    }

    fn service(store: MockStore) -> CouponService<MockStore> {
        CouponService::new(Arc::new(store))
    }

    #[test]
    fn discount_is_clamped_to_maximum() {
        let c = coupon(0.10, 20, 50, Utc::now() + Duration::days(1));
        assert_eq!(compute_discount(&c, 300, Utc::now()).unwrap(), 20);
    }

    #[test]
    fn discount_below_cap_is_the_percentage() {
        let c = coupon(0.10, 20, 50, Utc::now() + Duration::days(1));
        assert_eq!(compute_discount(&c, 155, Utc::now()).unwrap(), 15);
    }

    #[test]
    fn subtotal_below_minimum_is_rejected() {
        let c = coupon(0.10, 20, 50, Utc::now() + Duration::days(1));
        let result = compute_discount(&c, 49, Utc::now());
        assert!(matches!(
            result,
            Err(CouponError::MinimumNotMet {
                minimum: 50,
                subtotal: 49
            })
        ));
    }

    #[test]
    fn expired_coupon_is_rejected() {
        let now = Utc::now();
        let c = coupon(0.10, 20, 0, now - Duration::seconds(1));
        assert!(matches!(
            compute_discount(&c, 500, now),
            Err(CouponError::CouponExpired)
        ));
    }

    #[test]
    fn exhausted_coupon_is_rejected() {
        let mut c = coupon(0.10, 20, 0, Utc::now() + Duration::days(1));
        c.usage_limit = 0;
        assert!(matches!(
            compute_discount(&c, 500, Utc::now()),
            Err(CouponError::UsageLimitReached)
        ));
    }

    #[test]
    fn discount_floors_exact_percentages() {
        let expiry = Utc::now() + Duration::days(1);
        let c = coupon(0.29, 1000, 0, expiry);
        assert_eq!(compute_discount(&c, 100, Utc::now()).unwrap(), 29);

        let c = coupon(0.57, 1000, 0, expiry);
        assert_eq!(compute_discount(&c, 100, Utc::now()).unwrap(), 57);

        let c = coupon(0.15, 1000, 0, expiry);
        assert_eq!(compute_discount(&c, 99, Utc::now()).unwrap(), 14);
    }

    #[test]
    fn coupon_is_still_valid_at_its_expiry_instant() {
        let c = coupon(0.10, 20, 0, Utc::now() + Duration::hours(1));
        assert_eq!(compute_discount(&c, 500, c.expiry_date).unwrap(), 20);

        let just_after = c.expiry_date + Duration::milliseconds(1);
        assert!(matches!(
            compute_discount(&c, 500, just_after),
            Err(CouponError::CouponExpired)
        ));
    }

    #[tokio::test]
    async fn apply_coupon_clamps_discount_on_cart_subtotal() {
        let c = coupon(0.10, 20, 50, Utc::now() + Duration::days(1));
        let store = store_with(Some(c), vec![line(100, 2), line(50, 2)]);

        let applied = service(store)
            .apply_coupon(Uuid::new_v4(), "save10")
            .await
            .unwrap();

        assert_eq!(applied.subtotal, 300);
        assert_eq!(applied.discount, 20);
        assert_eq!(applied.total, 280);
    }

    #[tokio::test]
    async fn apply_coupon_below_minimum_returns_no_discount() {
        let c = coupon(0.10, 20, 50, Utc::now() + Duration::days(1));
        let store = store_with(Some(c), vec![line(40, 1)]);

        let result = service(store).apply_coupon(Uuid::new_v4(), "SAVE10").await;

        assert!(
            matches!(result, Err(CouponError::MinimumNotMet { .. })),
            "expected MinimumNotMet, got {result:?}"
        );
    }

    #[tokio::test]
    async fn apply_unknown_coupon_is_not_found() {
        let mut store = MockStore::new();
        store
            .expect_find_coupon_by_code()
            .return_once(|_| Ok(None));
        store.expect_find_cart_by_user().never();

        let result = service(store).apply_coupon(Uuid::new_v4(), "NOPE").await;

        assert!(matches!(result, Err(CouponError::CouponNotFound)));
    }

    #[tokio::test]
    async fn create_coupon_rejects_percent_above_one() {
        let mut store = MockStore::new();
        store.expect_create_coupon().never();

        let result = service(store)
            .create_coupon(NewCoupon {
                code: "BIG".into(),
                discount_percent: 10.0,
                usage_limit: 1,
                maximum_discount_price: 100,
                minimum_purchase_price: 0,
                expiry_date: Utc::now() + Duration::days(1),
            })
            .await;

        assert!(matches!(result, Err(CouponError::Validation(_))));
    }

    #[tokio::test]
    async fn create_coupon_normalizes_code_and_maps_duplicates() {
        let mut store = MockStore::new();
        store
            .expect_create_coupon()
            .once()
            .withf(|new| new.code == "WELCOME")
            .return_once(|_| Err(StoreError::Duplicate("coupon code")));

        let result = service(store)
            .create_coupon(NewCoupon {
                code: "  welcome ".into(),
                discount_percent: 0.25,
                usage_limit: 5,
                maximum_discount_price: 100,
                minimum_purchase_price: 0,
                expiry_date: Utc::now() + Duration::days(7),
            })
            .await;

        assert!(matches!(result, Err(CouponError::DuplicateCode)));
    }

    #[tokio::test]
    async fn delete_missing_coupon_is_not_found() {
        let mut store = MockStore::new();
        store.expect_delete_coupon().return_once(|_| Ok(0));

        let result = service(store).delete_coupon(Uuid::new_v4()).await;

        assert!(matches!(result, Err(CouponError::CouponNotFound)));
    }
}
