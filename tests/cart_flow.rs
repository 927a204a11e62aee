mod common;

use std::sync::Arc;

use axum_storefront_api::{
    models::NewCoupon,
    services::{
        cart_service::{CartError, CartService},
        coupon_service::{CouponError, CouponService},
    },
};
use chrono::{Duration, Utc};
use common::MemoryStore;
use testresult::TestResult;
use uuid::Uuid;

#[tokio::test]
async fn add_duplicate_adjust_remove_leaves_cart_empty() -> TestResult {
    let store = Arc::new(MemoryStore::default());
    let hoodie = store.add_product("Axum Hoodie", 5500, 5);
    let carts = CartService::new(store.clone());
    let user = Uuid::new_v4();

    let item = carts.add_item(user, hoodie).await?;
    assert_eq!(item.quantity, 1);

    let duplicate = carts.add_item(user, hoodie).await;
    assert!(matches!(duplicate, Err(CartError::DuplicateItem)));

    let adjusted = carts.adjust_quantity(user, hoodie, 3).await?;
    assert_eq!(adjusted.quantity, 3);
    assert_eq!(store.quantity_of(hoodie), Some(3));

    carts.remove_item(user, hoodie).await?;
    assert!(carts.list_cart(user).await?.is_empty());

    let again = carts.remove_item(user, hoodie).await;
    assert!(matches!(again, Err(CartError::EmptyCart)));
    Ok(())
}

#[tokio::test]
async fn adjust_beyond_stock_keeps_previous_quantity() -> TestResult {
    let store = Arc::new(MemoryStore::default());
    let mug = store.add_product("Ferris Mug", 1200, 2);
    let carts = CartService::new(store.clone());
    let user = Uuid::new_v4();

    carts.add_item(user, mug).await?;
    let result = carts.adjust_quantity(user, mug, 3).await;

    assert!(matches!(result, Err(CartError::InsufficientStock)));
    assert_eq!(store.quantity_of(mug), Some(1));
    Ok(())
}

#[tokio::test]
async fn out_of_stock_product_cannot_be_added() -> TestResult {
    let store = Arc::new(MemoryStore::default());
    let sticker = store.add_product("Rust Sticker Pack", 500, 0);
    let carts = CartService::new(store);

    let result = carts.add_item(Uuid::new_v4(), sticker).await;

    assert!(matches!(result, Err(CartError::OutOfStock)));
    Ok(())
}

#[tokio::test]
async fn coupon_discount_is_capped_on_cart_subtotal() -> TestResult {
    let store = Arc::new(MemoryStore::default());
    let book = store.add_product("E-book: Async Rust", 100, 10);
    let carts = CartService::new(store.clone());
    let coupons = CouponService::new(store);
    let user = Uuid::new_v4();

    carts.add_item(user, book).await?;
    carts.adjust_quantity(user, book, 3).await?;

    coupons
        .create_coupon(NewCoupon {
            code: "save10".into(),
            discount_percent: 0.10,
            usage_limit: 5,
            maximum_discount_price: 20,
            minimum_purchase_price: 50,
            expiry_date: Utc::now() + Duration::days(1),
        })
        .await?;

    let applied = coupons.apply_coupon(user, " Save10 ").await?;
    assert_eq!(applied.code, "SAVE10");
    assert_eq!(applied.subtotal, 300);
    assert_eq!(applied.discount, 20);
    assert_eq!(applied.total, 280);
    Ok(())
}

#[tokio::test]
async fn users_only_see_redeemable_coupons() -> TestResult {
    let store = Arc::new(MemoryStore::default());
    let coupons = CouponService::new(store);
    let base = NewCoupon {
        code: String::new(),
        discount_percent: 0.2,
        usage_limit: 1,
        maximum_discount_price: 1000,
        minimum_purchase_price: 0,
        expiry_date: Utc::now() + Duration::days(3),
    };

    coupons
        .create_coupon(NewCoupon {
            code: "LIVE".into(),
            ..base.clone()
        })
        .await?;
    coupons
        .create_coupon(NewCoupon {
            code: "USEDUP".into(),
            usage_limit: 0,
            ..base.clone()
        })
        .await?;
    coupons
        .create_coupon(NewCoupon {
            code: "OLD".into(),
            expiry_date: Utc::now() - Duration::days(1),
            ..base
        })
        .await?;

    let (all, total) = coupons.list_coupons(None, 20, 0).await?;
    assert_eq!((all.len(), total), (3, 3));

    let (active, total) = coupons.list_coupons(Some(Utc::now()), 20, 0).await?;
    assert_eq!(total, 1);
    assert_eq!(active[0].code, "LIVE");
    Ok(())
}

#[tokio::test]
async fn updating_to_an_existing_code_is_a_conflict() -> TestResult {
    let store = Arc::new(MemoryStore::default());
    let coupons = CouponService::new(store);
    let template = NewCoupon {
        code: "FIRST".into(),
        discount_percent: 0.5,
        usage_limit: 3,
        maximum_discount_price: 500,
        minimum_purchase_price: 0,
        expiry_date: Utc::now() + Duration::days(1),
    };

    coupons.create_coupon(template.clone()).await?;
    let second = coupons
        .create_coupon(NewCoupon {
            code: "SECOND".into(),
            ..template.clone()
        })
        .await?;

    let result = coupons.update_coupon(second.id, template).await;
    assert!(matches!(result, Err(CouponError::DuplicateCode)));
    Ok(())
}
