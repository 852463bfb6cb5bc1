use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderRequest},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Entity as Products,
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const ORDER_STATUSES: [&str; 5] = ["NEW", "PROCESSING", "SHIPPED", "COMPLETED", "CANCELED"];

pub fn validate_order_status(status: &str) -> Result<(), AppError> {
    if ORDER_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid order status".into()))
    }
}

pub async fn list_orders_by_user(
    state: &AppState,
    user_id: Uuid,
) -> AppResult<ApiResponse<OrderList>> {
    let user = Users::find_by_id(user_id).one(&state.orm).await?;
    if user.is_none() {
        return Err(AppError::NotFound);
    }

    let items = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success("Orders", OrderList { items }, None))
}

pub async fn list_orders_by_status(
    state: &AppState,
    status: &str,
) -> AppResult<ApiResponse<OrderList>> {
    validate_order_status(status)?;

    let items = Orders::find()
        .filter(OrderCol::Status.eq(status))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success("Orders", OrderList { items }, None))
}

/// Creates an order with its items in one transaction. Each item's price is
/// copied from the product at creation time and never changes afterwards.
pub async fn create_order(
    state: &AppState,
    user_id: Uuid,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let user = Users::find_by_id(user_id).one(&state.orm).await?;
    if user.is_none() {
        return Err(AppError::NotFound);
    }

    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }

    let txn = state.orm.begin().await?;

    let mut priced_items: Vec<(Uuid, i32, i64)> = Vec::with_capacity(payload.items.len());
    let mut total_amount: i64 = 0;
    for item in &payload.items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(
                "quantity must be greater than 0".into(),
            ));
        }
        let product = Products::find_by_id(item.product_id).one(&txn).await?;
        let product = match product {
            Some(p) => p,
            None => {
                return Err(AppError::BadRequest(format!(
                    "product {} not found",
                    item.product_id
                )));
            }
        };
        total_amount += product.price * (item.quantity as i64);
        priced_items.push((product.id, item.quantity, product.price));
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        status: Set("NEW".into()),
        total_amount: Set(total_amount),
        address: Set(payload.address),
        payment_method: Set(payload.payment_method),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::new();
    for (product_id, quantity, price) in priced_items {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            price: Set(price),
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": total_amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn update_order(
    state: &AppState,
    order_id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let existing = Orders::find_by_id(order_id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let mut active: OrderActive = existing.into();
    if let Some(status) = payload.status {
        validate_order_status(&status)?;
        active.status = Set(status);
    }
    if let Some(address) = payload.address {
        active.address = Set(Some(address));
    }
    if let Some(payment_method) = payload.payment_method {
        active.payment_method = Set(Some(payment_method));
    }
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(order.user_id),
        "order_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Items first, then the order, in one transaction.
pub async fn delete_order(
    state: &AppState,
    order_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id).one(&txn).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    OrderItems::delete_many()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .exec(&txn)
        .await?;
    Orders::delete_by_id(order_id).exec(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(order.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        status: model.status,
        total_amount: model.total_amount,
        address: model.address,
        payment_method: model.payment_method,
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
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_validation() {
        for status in ORDER_STATUSES {
            assert!(validate_order_status(status).is_ok());
        }
        assert!(validate_order_status("new").is_err());
        assert!(validate_order_status("PAID").is_err());
        assert!(validate_order_status("").is_err());
    }
}
