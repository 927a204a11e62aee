use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{CartItem, CartLine, NewCartItem},
    repository::{Store, StoreError},
};

/// Quantity a product enters the cart with; changing it is a separate call.
pub const DEFAULT_QUANTITY: i32 = 1;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("product not found")]
    ProductNotFound,

    #[error("product is currently out of stock")]
    OutOfStock,

    #[error("product already exists in cart")]
    DuplicateItem,

    #[error("user has no cart")]
    NoCart,

    #[error("cart is empty")]
    EmptyCart,

    #[error("product does not exist in your cart")]
    ItemNotInCart,

    #[error("insufficient product quantity in stock")]
    InsufficientStock,

    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(i32),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cart operations for a single user, on top of a [`Store`].
pub struct CartService<S> {
    store: Arc<S>,
}

impl<S> Clone for CartService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> CartService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn add_item(&self, user_id: Uuid, product_id: Uuid) -> Result<CartItem, CartError> {
        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        if product.stock <= 0 {
            tracing::info!(%product_id, "add to cart rejected, out of stock");
            return Err(CartError::OutOfStock);
        }

        let cart = match self.store.find_cart_by_user(user_id).await? {
            Some(cart) => cart,
            None => {
                let cart = self.store.create_cart(user_id).await?;
                tracing::debug!(cart_id = %cart.id, %user_id, "cart created");
                cart
            }
        };

        if self
            .store
            .find_cart_item(cart.id, product_id)
            .await?
            .is_some()
        {
            return Err(CartError::DuplicateItem);
        }

        let item = self
            .store
            .insert_cart_item(NewCartItem {
                cart_id: cart.id,
                product_id,
                quantity: DEFAULT_QUANTITY,
            })
            .await
            .map_err(|err| match err {
                // lost the race against a concurrent add of the same product
                StoreError::Duplicate(_) => CartError::DuplicateItem,
                other => CartError::Store(other),
            })?;

        tracing::info!(cart_id = %cart.id, %product_id, "item added to cart");
        Ok(item)
    }

    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), CartError> {
        self.store
            .find_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        let cart = self
            .store
            .find_cart_by_user(user_id)
            .await?
            .ok_or(CartError::NoCart)?;

        if self.store.count_cart_items(cart.id).await? == 0 {
            return Err(CartError::EmptyCart);
        }

        let item = self
            .store
            .find_cart_item(cart.id, product_id)
            .await?
            .ok_or(CartError::ItemNotInCart)?;

        if self.store.delete_cart_item(item.id).await? == 0 {
            return Err(CartError::ItemNotInCart);
        }

        tracing::info!(cart_id = %cart.id, %product_id, "item removed from cart");
        Ok(())
    }

    pub async fn adjust_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        count: i32,
    ) -> Result<CartItem, CartError> {
        if count < 1 {
            return Err(CartError::InvalidQuantity(count));
        }

        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        if count > product.stock {
            tracing::info!(%product_id, count, stock = product.stock, "quantity exceeds stock");
            return Err(CartError::InsufficientStock);
        }

        let cart = self
            .store
            .find_cart_by_user(user_id)
            .await?
            .ok_or(CartError::NoCart)?;

        let item = self
            .store
            .find_cart_item(cart.id, product_id)
            .await?
            .ok_or(CartError::ItemNotInCart)?;

        // stock is re-checked by the update itself
        self.store
            .update_cart_item_quantity(item.id, count)
            .await?
            .ok_or(CartError::InsufficientStock)
    }

    /// Lines of the user's cart, empty when the user has no cart yet.
    pub async fn list_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>, CartError> {
        match self.store.find_cart_by_user(user_id).await? {
            Some(cart) => Ok(self.store.list_cart_items(cart.id).await?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        models::{Cart, Product},
        repository::MockStore,
    };

    fn product(id: Uuid, stock: i32) -> Product {
        Product {
            id,
            category_id: Uuid::new_v4(),
            name: "Ferris Mug".into(),
            description: None,
            brand: "Rustacean".into(),
            price: 120,
            stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn cart(user_id: Uuid) -> Cart {
        Cart {
            id: Uuid::new_v4(),
            user_id,
            created_at: Utc::now(),
        }
    }

    fn item(cart_id: Uuid, product_id: Uuid, quantity: i32) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            cart_id,
            product_id,
            quantity,
            created_at: Utc::now(),
        }
    }

    fn service(store: MockStore) -> CartService<MockStore> {
        CartService::new(Arc::new(store))
    }

    #[tokio::test]
    async fn add_item_unknown_product_is_not_found() {
        let mut store = MockStore::new();
        store.expect_find_product().return_once(|_| Ok(None));
        store.expect_find_cart_by_user().never();
        store.expect_insert_cart_item().never();

        let result = service(store).add_item(Uuid::new_v4(), Uuid::new_v4()).await;

        assert!(
            matches!(result, Err(CartError::ProductNotFound)),
            "expected ProductNotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn add_item_out_of_stock_creates_nothing() {
        let product_id = Uuid::new_v4();
        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 0))));
        store.expect_find_cart_by_user().never();
        store.expect_create_cart().never();
        store.expect_insert_cart_item().never();

        let result = service(store).add_item(Uuid::new_v4(), product_id).await;

        assert!(
            matches!(result, Err(CartError::OutOfStock)),
            "expected OutOfStock, got {result:?}"
        );
    }

    #[tokio::test]
    async fn add_item_creates_cart_when_missing() {
        let user_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let new_cart = cart(user_id);
        let cart_id = new_cart.id;

        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 5))));
        store.expect_find_cart_by_user().return_once(|_| Ok(None));
        store
            .expect_create_cart()
            .once()
            .withf(move |id| *id == user_id)
            .return_once(move |_| Ok(new_cart));
        store.expect_find_cart_item().return_once(|_, _| Ok(None));
        store
            .expect_insert_cart_item()
            .once()
            .withf(move |new| {
                new.cart_id == cart_id
                    && new.product_id == product_id
                    && new.quantity == DEFAULT_QUANTITY
            })
            .return_once(move |new| Ok(item(new.cart_id, new.product_id, new.quantity)));

        let added = service(store).add_item(user_id, product_id).await.unwrap();

        assert_eq!(added.cart_id, cart_id);
        assert_eq!(added.quantity, 1);
    }

    #[tokio::test]
    async fn add_item_twice_is_a_conflict() {
        let user_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let existing_cart = cart(user_id);
        let cart_id = existing_cart.id;

        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 5))));
        store
            .expect_find_cart_by_user()
            .return_once(move |_| Ok(Some(existing_cart)));
        store
            .expect_find_cart_item()
            .return_once(move |_, _| Ok(Some(item(cart_id, product_id, 1))));
        store.expect_insert_cart_item().never();

        let result = service(store).add_item(user_id, product_id).await;

        assert!(
            matches!(result, Err(CartError::DuplicateItem)),
            "expected DuplicateItem, got {result:?}"
        );
    }

    #[tokio::test]
    async fn add_item_losing_insert_race_is_a_conflict() {
        let user_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let existing_cart = cart(user_id);

        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 1))));
        store
            .expect_find_cart_by_user()
            .return_once(move |_| Ok(Some(existing_cart)));
        store.expect_find_cart_item().return_once(|_, _| Ok(None));
        store
            .expect_insert_cart_item()
            .return_once(|_| Err(StoreError::Duplicate("cart item")));

        let result = service(store).add_item(user_id, product_id).await;

        assert!(matches!(result, Err(CartError::DuplicateItem)));
    }

    #[tokio::test]
    async fn adjust_quantity_above_stock_leaves_item_untouched() {
        let product_id = Uuid::new_v4();
        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 2))));
        store.expect_find_cart_by_user().never();
        store.expect_update_cart_item_quantity().never();

        let result = service(store)
            .adjust_quantity(Uuid::new_v4(), product_id, 3)
            .await;

        assert!(
            matches!(result, Err(CartError::InsufficientStock)),
            "expected InsufficientStock, got {result:?}"
        );
    }

    #[tokio::test]
    async fn adjust_quantity_rejected_by_stock_guard_is_insufficient_stock() {
        let user_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let existing_cart = cart(user_id);
        let cart_id = existing_cart.id;

        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 4))));
        store
            .expect_find_cart_by_user()
            .return_once(move |_| Ok(Some(existing_cart)));
        store
            .expect_find_cart_item()
            .return_once(move |_, _| Ok(Some(item(cart_id, product_id, 1))));
        store
            .expect_update_cart_item_quantity()
            .once()
            .return_once(|_, _| Ok(None));

        let result = service(store).adjust_quantity(user_id, product_id, 4).await;

        assert!(matches!(result, Err(CartError::InsufficientStock)));
    }

    #[tokio::test]
    async fn adjust_quantity_to_zero_is_invalid() {
        let mut store = MockStore::new();
        store.expect_find_product().never();

        let result = service(store)
            .adjust_quantity(Uuid::new_v4(), Uuid::new_v4(), 0)
            .await;

        assert!(matches!(result, Err(CartError::InvalidQuantity(0))));
    }

    #[tokio::test]
    async fn adjust_quantity_without_cart_is_no_cart() {
        let product_id = Uuid::new_v4();
        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 9))));
        store.expect_find_cart_by_user().return_once(|_| Ok(None));

        let result = service(store)
            .adjust_quantity(Uuid::new_v4(), product_id, 2)
            .await;

        assert!(matches!(result, Err(CartError::NoCart)));
    }

    #[tokio::test]
    async fn adjust_quantity_of_product_missing_from_cart_is_item_not_in_cart() {
        let user_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let existing_cart = cart(user_id);

        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 9))));
        store
            .expect_find_cart_by_user()
            .return_once(move |_| Ok(Some(existing_cart)));
        store.expect_find_cart_item().return_once(|_, _| Ok(None));
        store.expect_update_cart_item_quantity().never();

        let result = service(store).adjust_quantity(user_id, product_id, 2).await;

        assert!(
            matches!(result, Err(CartError::ItemNotInCart)),
            "expected ItemNotInCart, got {result:?}"
        );
    }

    #[tokio::test]
    async fn remove_item_unknown_product_is_not_found() {
        let mut store = MockStore::new();
        store.expect_find_product().return_once(|_| Ok(None));
        store.expect_find_cart_by_user().never();
        store.expect_delete_cart_item().never();

        let result = service(store)
            .remove_item(Uuid::new_v4(), Uuid::new_v4())
            .await;

        assert!(
            matches!(result, Err(CartError::ProductNotFound)),
            "expected ProductNotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn remove_item_without_cart_is_no_cart() {
        let product_id = Uuid::new_v4();
        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 1))));
        store.expect_find_cart_by_user().return_once(|_| Ok(None));
        store.expect_delete_cart_item().never();

        let result = service(store).remove_item(Uuid::new_v4(), product_id).await;

        assert!(matches!(result, Err(CartError::NoCart)));
    }

    #[tokio::test]
    async fn remove_item_from_empty_cart_is_empty_cart() {
        let user_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let existing_cart = cart(user_id);

        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 1))));
        store
            .expect_find_cart_by_user()
            .return_once(move |_| Ok(Some(existing_cart)));
        store.expect_count_cart_items().return_once(|_| Ok(0));
        store.expect_find_cart_item().never();
        store.expect_delete_cart_item().never();

        let result = service(store).remove_item(user_id, product_id).await;

        assert!(matches!(result, Err(CartError::EmptyCart)));
    }

    #[tokio::test]
    async fn remove_item_not_in_cart_is_item_not_in_cart() {
        let user_id = Uuid::new_v4();
        let product_id = Uuid::new_v4();
        let existing_cart = cart(user_id);

        let mut store = MockStore::new();
        store
            .expect_find_product()
            .return_once(move |_| Ok(Some(product(product_id, 1))));
        store
            .expect_find_cart_by_user()
            .return_once(move |_| Ok(Some(existing_cart)));
        store.expect_count_cart_items().return_once(|_| Ok(2));
        store.expect_find_cart_item().return_once(|_, _| Ok(None));
        store.expect_delete_cart_item().never();

        let result = service(store).remove_item(user_id, product_id).await;

        assert!(matches!(result, Err(CartError::ItemNotInCart)));
    }

    #[tokio::test]
    async fn list_cart_without_cart_is_empty() {
        let mut store = MockStore::new();
        store.expect_find_cart_by_user().return_once(|_| Ok(None));
        store.expect_list_cart_items().never();

        let lines = service(store).list_cart(Uuid::new_v4()).await.unwrap();

        assert!(lines.is_empty());
    }
}
