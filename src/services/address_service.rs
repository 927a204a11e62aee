use uuid::Uuid;

use crate::{
    audit::record,
    dto::addresses::{AddressList, AddressRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::Address,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Addresses a single user may keep.
pub const MAX_ADDRESSES: i64 = 10;

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    ensure_customer(user)?;
    let items = sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        AddressList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_address(
    state: &AppState,
    user: &AuthUser,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    ensure_customer(user)?;
    let payload = validate_address(payload)?;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM addresses WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;
    if count.0 >= MAX_ADDRESSES {
        return Err(AppError::Unprocessable(format!(
            "at most {MAX_ADDRESSES} addresses can be saved"
        )));
    }

    let address = sqlx::query_as::<_, Address>(
        r#"
        INSERT INTO addresses (id, user_id, name, phone, line1, line2, city, state, postal_code)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&payload.name)
    .bind(&payload.phone)
    .bind(&payload.line1)
    .bind(&payload.line2)
    .bind(&payload.city)
    .bind(&payload.state)
    .bind(&payload.postal_code)
    .fetch_one(&state.pool)
    .await?;

    record(
        &state.pool,
        user.user_id,
        "address_create",
        "addresses",
        serde_json::json!({ "address_id": address.id }),
    )
    .await;

    Ok(ApiResponse::success("Address saved", address, None))
}

pub async fn update_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AddressRequest,
) -> AppResult<ApiResponse<Address>> {
    ensure_customer(user)?;
    let payload = validate_address(payload)?;

    let address = sqlx::query_as::<_, Address>(
        r#"
        UPDATE addresses
        SET name = $3, phone = $4, line1 = $5, line2 = $6, city = $7, state = $8,
            postal_code = $9, updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .bind(&payload.name)
    .bind(&payload.phone)
    .bind(&payload.line1)
    .bind(&payload.line2)
    .bind(&payload.city)
    .bind(&payload.state)
    .bind(&payload.postal_code)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("address not found".into()))?;

    record(
        &state.pool,
        user.user_id,
        "address_update",
        "addresses",
        serde_json::json!({ "address_id": address.id }),
    )
    .await;

    Ok(ApiResponse::success("Address updated", address, None))
}

/// Trims every field and rejects blank required ones. A blank `line2` is dropped.
fn validate_address(mut payload: AddressRequest) -> AppResult<AddressRequest> {
    let required = [
        ("name", &mut payload.name),
        ("phone", &mut payload.phone),
        ("line1", &mut payload.line1),
        ("city", &mut payload.city),
        ("state", &mut payload.state),
        ("postal_code", &mut payload.postal_code),
    ];
    for (field, value) in required {
        *value = value.trim().to_string();
        if value.is_empty() {
            return Err(AppError::BadRequest(format!("{field} is required")));
        }
    }

    if !payload
        .postal_code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
    {
        return Err(AppError::BadRequest("postal_code is invalid".into()));
    }

    payload.line2 = payload
        .line2
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty());

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AddressRequest {
        AddressRequest {
            name: " Ferris ".into(),
            phone: "+15550001111".into(),
            line1: "1 Crab Lane".into(),
            line2: Some("   ".into()),
            city: "Portland".into(),
            state: "OR".into(),
            postal_code: "97201".into(),
        }
    }

    #[test]
    fn address_fields_are_trimmed_and_blank_line2_dropped() {
        let address = validate_address(request()).unwrap();
        assert_eq!(address.name, "Ferris");
        assert_eq!(address.line2, None);
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let mut payload = request();
        payload.city = "  ".into();
        match validate_address(payload) {
            Err(AppError::BadRequest(msg)) => assert_eq!(msg, "city is required"),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn postal_code_with_symbols_is_rejected() {
        let mut payload = request();
        payload.postal_code = "97201;--".into();
        assert!(matches!(
            validate_address(payload),
            Err(AppError::BadRequest(_))
        ));
    }
}
