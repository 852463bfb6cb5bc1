use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartList},
    entity::{
        cart_items::{ActiveModel, Column, Entity as CartItems, Model as CartItemModel},
        products::Entity as Products,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::CartItem,
    response::{ApiResponse, Meta},
    state::AppState,
};

async fn ensure_user_exists(state: &AppState, user_id: Uuid) -> AppResult<()> {
    let user = Users::find_by_id(user_id).one(&state.orm).await?;
    if user.is_none() {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn list_cart(state: &AppState, user_id: Uuid) -> AppResult<ApiResponse<CartList>> {
    ensure_user_exists(state, user_id).await?;

    let items = CartItems::find()
        .filter(Column::UserId.eq(user_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(cart_item_from_entity)
        .collect();

    Ok(ApiResponse::success("OK", CartList { items }, None))
}

/// Adds a product to the cart, freezing the product's current price into
/// `price_at_add`. Later product price changes never touch existing rows.
pub async fn add_to_cart(
    state: &AppState,
    user_id: Uuid,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_user_exists(state, user_id).await?;

    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };

    let cart_item = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        product_id: Set(product.id),
        quantity: Set(payload.quantity),
        price_at_add: Set(product.price),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "OK",
        cart_item_from_entity(cart_item),
        None,
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user_id: Uuid,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(Column::Id.eq(item_id))
        .filter(Column::UserId.eq(user_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "item_id": item_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_user_exists(state, user_id).await?;

    let result = CartItems::delete_many()
        .filter(Column::UserId.eq(user_id))
        .exec(&state.orm)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "cart_clear",
        Some("cart_items"),
        Some(serde_json::json!({ "removed": result.rows_affected })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": result.rows_affected }),
        Some(Meta::empty()),
    ))
}

fn cart_item_from_entity(model: CartItemModel) -> CartItem {
    CartItem {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price_at_add: model.price_at_add,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
