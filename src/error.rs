use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    repository::StoreError,
    response::{ApiResponse, Meta},
    services::{cart_service::CartError, coupon_service::CouponError, otp_service::OtpError},
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DbError(_) | AppError::OrmError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorData {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }

        let message = status
            .canonical_reason()
            .unwrap_or("Error")
            .to_string();
        let body = ApiResponse {
            message,
            data: Some(ErrorData {
                error: self.to_string(),
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => AppError::Conflict(format!("{what} already exists")),
            StoreError::Database(e) => AppError::DbError(e),
            StoreError::Orm(e) => AppError::OrmError(e),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ProductNotFound | CartError::NoCart | CartError::ItemNotInCart => {
                AppError::NotFound(err.to_string())
            }
            CartError::DuplicateItem => AppError::Conflict(err.to_string()),
            CartError::OutOfStock | CartError::InsufficientStock | CartError::EmptyCart => {
                AppError::Unprocessable(err.to_string())
            }
            CartError::InvalidQuantity(_) => AppError::BadRequest(err.to_string()),
            CartError::Store(e) => e.into(),
        }
    }
}

impl From<CouponError> for AppError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::CouponNotFound => AppError::NotFound(err.to_string()),
            CouponError::DuplicateCode => AppError::Conflict(err.to_string()),
            CouponError::CouponExpired
            | CouponError::MinimumNotMet { .. }
            | CouponError::UsageLimitReached => AppError::Unprocessable(err.to_string()),
            CouponError::Validation(_) => AppError::BadRequest(err.to_string()),
            CouponError::Store(e) => e.into(),
        }
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::MissingField(_) => AppError::BadRequest(err.to_string()),
            OtpError::Rejected => AppError::Unauthorized(err.to_string()),
            OtpError::Http(_) | OtpError::Provider(_) => AppError::Internal(err.into()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_errors_follow_the_taxonomy() {
        assert_eq!(
            AppError::from(CartError::ProductNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(CartError::DuplicateItem).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(CartError::OutOfStock).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(CartError::InvalidQuantity(0)).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn coupon_errors_follow_the_taxonomy() {
        assert_eq!(
            AppError::from(CouponError::CouponNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(CouponError::MinimumNotMet {
                minimum: 50,
                subtotal: 10
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(CouponError::Validation("code is required".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn duplicate_store_rows_become_conflicts() {
        let err = AppError::from(StoreError::Duplicate("coupon code"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "coupon code already exists");
    }
}
