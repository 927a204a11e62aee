use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Coupon, NewCoupon};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CouponRequest {
    pub code: String,
    /// Fraction of the subtotal, `0.1` for ten percent.
    pub discount_percent: f64,
    pub usage_limits: i32,
    pub maximum_discount_price: i64,
    pub minimum_purchase_price: i64,
    pub expiry_date: DateTime<Utc>,
}

impl From<CouponRequest> for NewCoupon {
    fn from(req: CouponRequest) -> Self {
        NewCoupon {
            code: req.code,
            discount_percent: req.discount_percent,
            usage_limit: req.usage_limits,
            maximum_discount_price: req.maximum_discount_price,
            minimum_purchase_price: req.minimum_purchase_price,
            expiry_date: req.expiry_date,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct CouponList {
    #[schema(value_type = Vec<Coupon>)]
    pub items: Vec<Coupon>,
}
