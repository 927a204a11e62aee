use utoipa::{
    Modify, OpenApi,
    openapi::{
        self, OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        addresses::{AddressList, AddressRequest},
        admin::UserList,
        auth::{
            AdminRegisterRequest, LoginRequest, LoginResponse, OtpSendRequest, OtpSendResponse,
            OtpVerifyRequest, RegisterRequest,
        },
        cart::{AddToCartRequest, AdjustQuantityRequest, CartView},
        categories::{CategoryList, CategoryRequest},
        coupons::{CouponList, CouponRequest},
        orders::{
            CheckoutRequest, OrderList, OrderStatusList, OrderWithItems, UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        wishlist::WishlistProducts,
    },
    models::{
        Address, Admin, CartItem, CartLine, Category, Coupon, Order, OrderItem, Product, User,
        WishlistItem,
    },
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, categories, coupons, health, orders, params, products,
        wishlist,
    },
    services::coupon_service::AppliedCoupon,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::otp_send,
        auth::otp_verify,
        auth::admin_register,
        auth::admin_login,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::adjust_quantity,
        cart::remove_from_cart,
        coupons::list_coupons,
        coupons::create_coupon,
        coupons::view_coupon,
        coupons::update_coupon,
        coupons::delete_coupon,
        coupons::apply_coupon,
        orders::list_orders,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        orders::return_order,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        addresses::list_addresses,
        addresses::create_address,
        addresses::update_address,
        admin::list_users,
        admin::get_user,
        admin::block_user,
        admin::unblock_user,
        admin::list_all_orders,
        admin::list_order_statuses,
        admin::get_order_admin,
        admin::update_order_status
    ),
    components(
        schemas(
            User,
            Admin,
            Category,
            Product,
            CartItem,
            CartLine,
            Coupon,
            Order,
            OrderItem,
            WishlistItem,
            Address,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AdminRegisterRequest,
            OtpSendRequest,
            OtpSendResponse,
            OtpVerifyRequest,
            CategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddToCartRequest,
            AdjustQuantityRequest,
            CartView,
            CouponRequest,
            CouponList,
            coupons::ApplyCouponRequest,
            AppliedCoupon,
            CheckoutRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            OrderStatusList,
            WishlistProducts,
            AddressRequest,
            AddressList,
            UserList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<AppliedCoupon>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Signup, login and OTP endpoints"),
        (name = "Categories", description = "Category endpoints"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Coupons", description = "Coupon endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Addresses", description = "Address book endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
