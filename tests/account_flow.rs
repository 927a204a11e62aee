use axum_storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::addresses::AddressRequest,
    entity::{
        categories::ActiveModel as CategoryActive, products::ActiveModel as ProductActive,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::{AuthUser, ROLE_USER},
    routes::params::Pagination,
    services::{address_service, wishlist_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

#[tokio::test]
async fn wishlist_and_address_book_flow() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;
    let user_id = create_user(&state, "wish@example.com", "+15550002222").await?;
    let customer = AuthUser {
        user_id,
        role: ROLE_USER.into(),
    };
    let product_id = create_product(&state, "Wished Widget").await?;

    let first = wishlist_service::add_to_wishlist(&state, &customer, product_id)
        .await?
        .data
        .expect("wishlist item");
    let second = wishlist_service::add_to_wishlist(&state, &customer, product_id)
        .await?
        .data
        .expect("wishlist item");
    assert_eq!(first.id, second.id);

    let missing = wishlist_service::add_to_wishlist(&state, &customer, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let listed = wishlist_service::list_wishlist(&state, &customer, Pagination::default()).await?;
    assert_eq!(listed.meta.expect("meta").total, Some(1));
    assert_eq!(listed.data.expect("products").items[0].id, product_id);

    wishlist_service::remove_from_wishlist(&state, &customer, product_id).await?;
    let gone = wishlist_service::remove_from_wishlist(&state, &customer, product_id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));

    let address = AddressRequest {
        name: "Ferris".into(),
        phone: "+15550002222".into(),
        line1: "1 Crab Lane".into(),
        line2: None,
        city: "Portland".into(),
        state: "OR".into(),
        postal_code: "97201".into(),
    };
    let saved = address_service::create_address(&state, &customer, address.clone())
        .await?
        .data
        .expect("address");
    assert_eq!(saved.user_id, user_id);

    let moved = address_service::update_address(
        &state,
        &customer,
        saved.id,
        AddressRequest {
            city: "Salem".into(),
            ..address.clone()
        },
    )
    .await?
    .data
    .expect("address");
    assert_eq!(moved.city, "Salem");

    let stranger = AuthUser {
        user_id: create_user(&state, "other@example.com", "+15550003333").await?,
        role: ROLE_USER.into(),
    };
    let foreign = address_service::update_address(&state, &stranger, saved.id, address).await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));

    let book = address_service::list_addresses(&state, &customer)
        .await?
        .data
        .expect("addresses");
    assert_eq!(book.items.len(), 1);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;
    let orm = create_orm_conn(&pool);

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE wishlist_items, addresses, order_items, orders, cart_items, carts, products, categories, audit_logs, users CASCADE",
    ))
    .await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        token_ttl_hours: 1,
        otp: None,
    };

    Ok(AppState::new(pool, orm, config))
}

async fn create_user(state: &AppState, email: &str, phone: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set("Wishful User".into()),
        email: Set(email.to_string()),
        phone: Set(phone.to_string()),
        password_hash: Set("dummy".into()),
        is_blocked: Set(false),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_product(state: &AppState, name: &str) -> anyhow::Result<Uuid> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(format!("{name} category")),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        category_id: Set(category.id),
        name: Set(name.to_string()),
        description: Set(None),
        brand: Set("Acme".into()),
        price: Set(250),
        stock: Set(3),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
