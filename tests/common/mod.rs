//! In-memory [`Store`] for driving the services without Postgres.
#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use axum_storefront_api::{
    models::{Cart, CartItem, CartLine, Coupon, NewCartItem, NewCoupon, Product},
    repository::{Store, StoreError},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    products: Vec<Product>,
    carts: Vec<Cart>,
    items: Vec<CartItem>,
    coupons: Vec<Coupon>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn add_product(&self, name: &str, price: i64, stock: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().products.push(Product {
            id,
            category_id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            brand: "Ferris".to_string(),
            price,
            stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        id
    }

    pub fn quantity_of(&self, product_id: Uuid) -> Option<i32> {
        self.tables
            .lock()
            .unwrap()
            .items
            .iter()
            .find(|item| item.product_id == product_id)
            .map(|item| item.quantity)
    }
}

fn to_coupon(id: Uuid, new: NewCoupon, created_at: DateTime<Utc>) -> Coupon {
    Coupon {
        id,
        code: new.code,
        discount_percent: new.discount_percent,
        usage_limit: new.usage_limit,
        maximum_discount_price: new.maximum_discount_price,
        minimum_purchase_price: new.minimum_purchase_price,
        expiry_date: new.expiry_date,
        created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_cart_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.carts.iter().find(|c| c.user_id == user_id).cloned())
    }

    async fn create_cart(&self, user_id: Uuid) -> Result<Cart, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(cart) = tables.carts.iter().find(|c| c.user_id == user_id) {
            return Ok(cart.clone());
        }
        let cart = Cart {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
        };
        tables.carts.push(cart.clone());
        Ok(cart)
    }

    async fn find_cart_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .items
            .iter()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
            .cloned())
    }

    async fn count_cart_items(&self, cart_id: Uuid) -> Result<i64, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.items.iter().filter(|i| i.cart_id == cart_id).count() as i64)
    }

    async fn insert_cart_item(&self, item: NewCartItem) -> Result<CartItem, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .items
            .iter()
            .any(|i| i.cart_id == item.cart_id && i.product_id == item.product_id)
        {
            return Err(StoreError::Duplicate("cart item"));
        }
        let created = CartItem {
            id: Uuid::new_v4(),
            cart_id: item.cart_id,
            product_id: item.product_id,
            quantity: item.quantity,
            created_at: Utc::now(),
        };
        tables.items.push(created.clone());
        Ok(created)
    }

    async fn delete_cart_item(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.items.len();
        tables.items.retain(|i| i.id != id);
        Ok((before - tables.items.len()) as u64)
    }

    async fn update_cart_item_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItem>, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(product_id) = tables.items.iter().find(|i| i.id == id).map(|i| i.product_id)
        else {
            return Ok(None);
        };
        let stock = tables
            .products
            .iter()
            .find(|p| p.id == product_id)
            .map(|p| p.stock)
            .unwrap_or(0);
        if stock < quantity {
            return Ok(None);
        }
        let item = tables.items.iter_mut().find(|i| i.id == id).unwrap();
        item.quantity = quantity;
        Ok(Some(item.clone()))
    }

    async fn list_cart_items(&self, cart_id: Uuid) -> Result<Vec<CartLine>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .items
            .iter()
            .filter(|i| i.cart_id == cart_id)
            .filter_map(|i| {
                let p = tables.products.iter().find(|p| p.id == i.product_id)?;
                Some(CartLine {
                    item_id: i.id,
                    product_id: p.id,
                    name: p.name.clone(),
                    brand: p.brand.clone(),
                    price: p.price,
                    stock: p.stock,
                    quantity: i.quantity,
                })
            })
            .collect())
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.coupons.iter().find(|c| c.id == id).cloned())
    }

    async fn list_coupons(
        &self,
        active_at: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Coupon>, i64), StoreError> {
        let tables = self.tables.lock().unwrap();
        let matching: Vec<Coupon> = tables
            .coupons
            .iter()
            .filter(|c| match active_at {
                Some(now) => c.expiry_date > now && c.usage_limit > 0,
                None => true,
            })
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables.coupons.iter().any(|c| c.code == coupon.code) {
            return Err(StoreError::Duplicate("coupon code"));
        }
        let created = to_coupon(Uuid::new_v4(), coupon, Utc::now());
        tables.coupons.push(created.clone());
        Ok(created)
    }

    async fn update_coupon(
        &self,
        id: Uuid,
        coupon: NewCoupon,
    ) -> Result<Option<Coupon>, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .coupons
            .iter()
            .any(|c| c.code == coupon.code && c.id != id)
        {
            return Err(StoreError::Duplicate("coupon code"));
        }
        let Some(slot) = tables.coupons.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        *slot = to_coupon(id, coupon, slot.created_at);
        Ok(Some(slot.clone()))
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.coupons.len();
        tables.coupons.retain(|c| c.id != id);
        Ok((before - tables.coupons.len()) as u64)
    }
}
