use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::record,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        coupons::{Column as CouponCol, Entity as Coupons},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::{Order, OrderItem},
    repository::coupon_from_entity,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::coupon_service::{CouponError, compute_discount, normalize_code},
    state::AppState,
};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_CANCELLED: &str = "cancelled";
pub const STATUS_RETURNED: &str = "returned";
pub const ORDER_STATUSES: [&str; 6] = [
    "pending",
    "paid",
    "shipped",
    "completed",
    "cancelled",
    "returned",
];

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_customer(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Turn the caller's cart into an order.
///
/// Cart, products and coupon rows are locked for the whole transaction, so
/// stock and coupon usage are checked and consumed atomically.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;
    let payment_method = payload.payment_method.trim().to_lowercase();
    if payment_method.is_empty() {
        return Err(AppError::BadRequest("payment_method is required".into()));
    }

    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Unprocessable("cart is empty".into()))?;

    let cart_items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?;
    if cart_items.is_empty() {
        return Err(AppError::Unprocessable("cart is empty".into()));
    }

    // lock in id order so concurrent checkouts cannot deadlock
    let product_ids: Vec<Uuid> = cart_items.iter().map(|item| item.product_id).collect();
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .order_by_asc(ProdCol::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let mut lines = Vec::with_capacity(cart_items.len());
    for item in cart_items {
        let product = products
            .get(&item.product_id)
            .ok_or_else(|| AppError::NotFound(format!("product {} not found", item.product_id)))?;
        if product.stock < item.quantity {
            return Err(AppError::Unprocessable(format!(
                "insufficient stock for {}",
                product.name
            )));
        }
        lines.push((item, product.price));
    }
    let subtotal = lines
        .iter()
        .map(|(item, price)| price.saturating_mul(i64::from(item.quantity)))
        .fold(0, i64::saturating_add);

    let (coupon_code, discount) = match payload.coupon_code.as_deref().map(normalize_code) {
        Some(code) if !code.is_empty() => {
            let discount = redeem_coupon(&txn, &code, subtotal).await?;
            (Some(code), discount)
        }
        _ => (None, 0),
    };

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        subtotal: Set(subtotal),
        discount: Set(discount),
        total_amount: Set(subtotal - discount),
        coupon_code: Set(coupon_code),
        status: Set(STATUS_PENDING.into()),
        payment_method: Set(payment_method),
        payment_status: Set("unpaid".into()),
        invoice_number: Set(build_invoice_number(order_id)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (item, price) in &lines {
        let created = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            price: Set(*price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(order_item_from_entity(created));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        total = order.total_amount,
        "checkout completed"
    );
    record(
        &state.pool,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "coupon": order.coupon_code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order: order_from_entity(order),
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

/// Price `code` against `subtotal` and take one use from it.
async fn redeem_coupon(txn: &DatabaseTransaction, code: &str, subtotal: i64) -> AppResult<i64> {
    let coupon = Coupons::find()
        .filter(CouponCol::Code.eq(code))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .map(coupon_from_entity)
        .ok_or(CouponError::CouponNotFound)?;

    let discount = compute_discount(&coupon, subtotal, Utc::now())?;

    let consumed = Coupons::update_many()
        .col_expr(
            CouponCol::UsageLimit,
            Expr::col(CouponCol::UsageLimit).sub(1),
        )
        .filter(CouponCol::Id.eq(coupon.id))
        .filter(CouponCol::UsageLimit.gt(0))
        .exec(txn)
        .await?;
    if consumed.rows_affected == 0 {
        return Err(CouponError::UsageLimitReached.into());
    }

    Ok(discount)
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound("order not found".into())),
    };

    let items = order_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Cancel a pending order of the caller and put its items back in stock.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;
    let (order, items) =
        restock_order(state, user.user_id, id, STATUS_PENDING, STATUS_CANCELLED).await?;

    record(
        &state.pool,
        user.user_id,
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Return a completed order of the caller; its items go back in stock.
pub async fn return_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_customer(user)?;
    let (order, items) =
        restock_order(state, user.user_id, id, STATUS_COMPLETED, STATUS_RETURNED).await?;

    tracing::info!(order_id = %order.id, user_id = %user.user_id, "order returned");
    record(
        &state.pool,
        user.user_id,
        "order_return",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order returned",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Move the user's order from `from` to `to` and add its quantities back to stock.
async fn restock_order(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    from: &str,
    to: &str,
) -> AppResult<(Order, Vec<OrderItem>)> {
    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("order not found".into()))?;

    if order.status != from {
        return Err(AppError::Unprocessable(format!(
            "order is {}, only {} orders can be {}",
            order.status, from, to
        )));
    }

    let items = order_items(&txn, order.id).await?;
    for item in &items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(&txn)
            .await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set(to.to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    Ok((order_from_entity(order), items))
}

pub(crate) async fn order_items<C>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>>
where
    C: sea_orm::ConnectionTrait,
{
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect())
}

pub(crate) fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        subtotal: model.subtotal,
        discount: model.discount,
        total_amount: model.total_amount,
        coupon_code: model.coupon_code,
        status: model.status,
        payment_method: model.payment_method,
        payment_status: model.payment_status,
        invoice_number: model.invoice_number,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn build_invoice_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    format!("INV-{}-{}", date, &suffix[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_carries_date_and_order_prefix() {
        let id = Uuid::parse_str("0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0").unwrap();
        let invoice = build_invoice_number(id);

        let today = Utc::now().format("%Y%m%d").to_string();
        assert_eq!(invoice, format!("INV-{today}-0F1E2D3C"));
    }

    #[test]
    fn lifecycle_statuses_are_known() {
        for status in [
            STATUS_PENDING,
            STATUS_COMPLETED,
            STATUS_CANCELLED,
            STATUS_RETURNED,
        ] {
            assert!(ORDER_STATUSES.contains(&status), "{status} missing");
        }
    }
}
