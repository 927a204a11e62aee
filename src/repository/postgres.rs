use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr,
};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::{
    db::{DbPool, OrmConn},
    entity::coupons::{ActiveModel as CouponActive, Column as CouponCol, Entity as Coupons, Model as CouponModel},
    models::{Cart, CartItem, CartLine, Coupon, NewCartItem, NewCoupon, Product},
};

/// Postgres-backed [`Store`]. Cart access goes through sqlx, coupons through SeaORM.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
    orm: OrmConn,
}

impl PgStore {
    pub fn new(pool: DbPool, orm: OrmConn) -> Self {
        Self { pool, orm }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, category_id, name, description, brand, price, stock, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn find_cart_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, user_id, created_at FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cart)
    }

    async fn create_cart(&self, user_id: Uuid) -> Result<Cart, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(cart)
    }

    async fn find_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, StoreError> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"
            SELECT id, cart_id, product_id, quantity, created_at
            FROM cart_items
            WHERE cart_id = $1 AND product_id = $2
            "#,
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn count_cart_items(&self, cart_id: Uuid) -> Result<i64, StoreError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(total.0)
    }

    async fn insert_cart_item(&self, item: NewCartItem) -> Result<CartItem, StoreError> {
        let inserted = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (id, cart_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id) DO NOTHING
            RETURNING id, cart_id, product_id, quantity, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(item.cart_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .fetch_optional(&self.pool)
        .await?;

        inserted.ok_or(StoreError::Duplicate("cart item"))
    }

    async fn delete_cart_item(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn update_cart_item_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItem>, StoreError> {
        let updated = sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart_items ci
            SET quantity = $2
            FROM products p
            WHERE ci.id = $1 AND p.id = ci.product_id AND p.stock >= $2
            RETURNING ci.id, ci.cart_id, ci.product_id, ci.quantity, ci.created_at
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn list_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartLine>, StoreError> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT ci.id AS item_id, p.id AS product_id, p.name, p.brand, p.price, p.stock,
                   ci.quantity
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let coupon = Coupons::find()
            .filter(CouponCol::Code.eq(code))
            .one(&self.orm)
            .await?
            .map(coupon_from_entity);
        Ok(coupon)
    }

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, StoreError> {
        let coupon = Coupons::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(coupon_from_entity);
        Ok(coupon)
    }

    async fn list_coupons(
        &self,
        active_at: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Coupon>, i64), StoreError> {
        let mut condition = Condition::all();
        if let Some(now) = active_at {
            condition = condition
                .add(CouponCol::ExpiryDate.gt(now))
                .add(CouponCol::UsageLimit.gt(0));
        }

        let finder = Coupons::find()
            .filter(condition)
            .order_by_desc(CouponCol::CreatedAt);

        let total = finder.clone().count(&self.orm).await? as i64;

        let items = finder
            .limit(limit as u64)
            .offset(offset as u64)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(coupon_from_entity)
            .collect();

        Ok((items, total))
    }

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, StoreError> {
        let active = CouponActive {
            id: Set(Uuid::new_v4()),
            code: Set(coupon.code),
            discount_percent: Set(coupon.discount_percent),
            usage_limit: Set(coupon.usage_limit),
            maximum_discount_price: Set(coupon.maximum_discount_price),
            minimum_purchase_price: Set(coupon.minimum_purchase_price),
            expiry_date: Set(coupon.expiry_date.into()),
            created_at: NotSet,
            updated_at: NotSet,
        };
        let model = active.insert(&self.orm).await.map_err(duplicate_code)?;
        Ok(coupon_from_entity(model))
    }

    async fn update_coupon(
        &self,
        id: Uuid,
        coupon: NewCoupon,
    ) -> Result<Option<Coupon>, StoreError> {
        let Some(existing) = Coupons::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };

        let mut active: CouponActive = existing.into();
        active.code = Set(coupon.code);
        active.discount_percent = Set(coupon.discount_percent);
        active.usage_limit = Set(coupon.usage_limit);
        active.maximum_discount_price = Set(coupon.maximum_discount_price);
        active.minimum_purchase_price = Set(coupon.minimum_purchase_price);
        active.expiry_date = Set(coupon.expiry_date.into());
        active.updated_at = Set(Utc::now().into());

        let model = active.update(&self.orm).await.map_err(duplicate_code)?;
        Ok(Some(coupon_from_entity(model)))
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<u64, StoreError> {
        let result = Coupons::delete_by_id(id).exec(&self.orm).await?;
        Ok(result.rows_affected)
    }
}

fn duplicate_code(err: DbErr) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Duplicate("coupon code"),
        _ => StoreError::Orm(err),
    }
}

pub(crate) fn coupon_from_entity(model: CouponModel) -> Coupon {
    Coupon {
        id: model.id,
        code: model.code,
        discount_percent: model.discount_percent,
        usage_limit: model.usage_limit,
        maximum_discount_price: model.maximum_discount_price,
        minimum_purchase_price: model.minimum_purchase_price,
        expiry_date: model.expiry_date.with_timezone(&Utc),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
