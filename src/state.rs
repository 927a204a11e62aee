use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    repository::PgStore,
    services::{
        cart_service::CartService,
        coupon_service::CouponService,
        otp_service::OtpService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub carts: CartService<PgStore>,
    pub coupons: CouponService<PgStore>,
    pub otp: Option<OtpService>,
}

impl AppState {
    pub fn new(pool: DbPool, orm: OrmConn, config: AppConfig) -> Self {
        let store = Arc::new(PgStore::new(pool.clone(), orm.clone()));
        let otp = config.otp.clone().map(OtpService::twilio);
        Self {
            pool,
            orm,
            config: Arc::new(config),
            carts: CartService::new(store.clone()),
            coupons: CouponService::new(store),
            otp,
        }
    }
}
