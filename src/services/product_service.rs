use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{
        CreateProductRequest, FilePayload, ImagePayload, ProductList, ProductWithAssets,
        UpdateProductRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        categories::Entity as Categories,
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        product_files::{
            ActiveModel as FileActive, Column as FileCol, Entity as ProductFiles,
            Model as FileModel,
        },
        product_images::{
            ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages,
            Model as ImageModel,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
        reviews::{Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::MaybeUser,
    models::{Product, ProductFile, ProductImage},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Title).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Title => Column::Title,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductWithAssets>> {
    let product = Products::find_by_id(id).one(&state.orm).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let data = load_assets(&state.orm, product).await?;
    Ok(ApiResponse::success("Product", data, None))
}

pub async fn list_by_category(
    state: &AppState,
    category_id: Uuid,
) -> AppResult<ApiResponse<ProductList>> {
    let category = Categories::find_by_id(category_id).one(&state.orm).await?;
    if category.is_none() {
        return Err(AppError::NotFound);
    }

    let items = Products::find()
        .filter(Column::CategoryId.eq(category_id))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success("Products", ProductList { items }, None))
}

pub async fn search_products(state: &AppState, q: &str) -> AppResult<ApiResponse<ProductList>> {
    let pattern = format!("%{}%", q);
    let items = Products::find()
        .filter(Expr::col(Column::Title).ilike(pattern))
        .order_by_desc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success("Products", ProductList { items }, None))
}

/// Persist the product first to obtain its id, then each supplied image with
/// its back-reference. The returned images reflect what was saved, not a
/// reload.
pub async fn create_product(
    state: &AppState,
    actor: &MaybeUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductWithAssets>> {
    let category_id = match payload.category_id {
        Some(cid) => Categories::find_by_id(cid)
            .one(&state.orm)
            .await?
            .map(|c| c.id),
        None => None,
    };

    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(payload.title),
        description: Set(payload.description),
        price: Set(payload.price),
        currency: Set(payload.currency.unwrap_or_else(|| "EUR".to_string())),
        stock: Set(payload.stock),
        material: Set(payload.material),
        dimensions: Set(payload.dimensions),
        weight: Set(payload.weight),
        main_image_url: Set(payload.main_image_url),
        category_id: Set(category_id),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let mut images = Vec::new();
    for image in &payload.images {
        let saved = insert_image(&state.orm, &product, image).await?;
        if let Some(model) = saved {
            images.push(image_from_entity(model));
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        actor.0.as_ref().map(|u| u.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let data = ProductWithAssets {
        product: product_from_entity(product),
        images,
        files: Vec::new(),
    };
    Ok(ApiResponse::success(
        "Product created",
        data,
        Some(Meta::empty()),
    ))
}

/// Replace-style update: existing images are dropped (best-effort per image),
/// patch fields are merged onto the stored row, and a fresh image set is
/// created. Omitting the category clears it.
pub async fn update_product(
    state: &AppState,
    actor: &MaybeUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductWithAssets>> {
    let txn = state.orm.begin().await?;

    let existing = Products::find_by_id(id).one(&txn).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let old_images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(id))
        .all(&txn)
        .await?;
    for image in old_images {
        if let Err(err) = ProductImages::delete_by_id(image.id).exec(&txn).await {
            tracing::warn!(image_id = %image.id, error = %err, "failed to delete product image, skipping");
        }
    }

    let mut active: ActiveModel = existing.into();

    if let Some(title) = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        active.title = Set(title.to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(currency) = payload
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        active.currency = Set(currency.to_string());
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(material) = payload.material {
        active.material = Set(Some(material));
    }
    if let Some(dimensions) = payload.dimensions {
        active.dimensions = Set(Some(dimensions));
    }
    if let Some(weight) = payload.weight {
        active.weight = Set(Some(weight));
    }
    if let Some(main_image_url) = payload.main_image_url {
        active.main_image_url = Set(Some(main_image_url));
    }

    // Category: set only when the supplied id resolves; cleared when it does
    // not resolve or when the field is omitted entirely.
    let category_id = match payload.category_id {
        Some(cid) => Categories::find_by_id(cid).one(&txn).await?.map(|c| c.id),
        None => None,
    };
    active.category_id = Set(category_id);

    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    for image in &payload.images {
        if let Err(err) = insert_image(&txn, &product, image).await {
            tracing::warn!(error = %err, "failed to create product image, skipping");
        }
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor.0.as_ref().map(|u| u.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    // Reload so the response reflects storage; fall back to the saved value.
    let reloaded = Products::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap_or(product);
    let data = load_assets(&state.orm, reloaded).await?;
    Ok(ApiResponse::success("Updated", data, Some(Meta::empty())))
}

/// Cascading delete: images, files, cart items, reviews, order items, then the
/// product itself, all in one transaction. Image and review deletion are
/// best-effort per row; everything else aborts the transaction on failure.
pub async fn delete_product(
    state: &AppState,
    actor: &MaybeUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(id).one(&txn).await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }

    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(id))
        .order_by_asc(ImageCol::OrderIndex)
        .all(&txn)
        .await?;
    for image in images {
        if let Err(err) = ProductImages::delete_by_id(image.id).exec(&txn).await {
            tracing::warn!(image_id = %image.id, error = %err, "failed to delete product image, skipping");
        }
    }

    let files = ProductFiles::find()
        .filter(FileCol::ProductId.eq(id))
        .all(&txn)
        .await?;
    for file in files {
        ProductFiles::delete_by_id(file.id).exec(&txn).await?;
    }

    CartItems::delete_many()
        .filter(CartCol::ProductId.eq(id))
        .exec(&txn)
        .await?;

    let reviews = Reviews::find()
        .filter(ReviewCol::ProductId.eq(id))
        .all(&txn)
        .await?;
    for review in reviews {
        if let Err(err) = Reviews::delete_by_id(review.id).exec(&txn).await {
            tracing::warn!(review_id = %review.id, error = %err, "failed to delete review, skipping");
        }
    }

    // Removes the product from historical orders as well.
    OrderItems::delete_many()
        .filter(OrderItemCol::ProductId.eq(id))
        .exec(&txn)
        .await?;

    Products::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor.0.as_ref().map(|u| u.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
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

/// Attach a downloadable asset (model file, manual) to an existing product.
pub async fn add_product_file(
    state: &AppState,
    actor: &MaybeUser,
    product_id: Uuid,
    payload: FilePayload,
) -> AppResult<ApiResponse<ProductFile>> {
    let product = Products::find_by_id(product_id).one(&state.orm).await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }

    let url = payload.file_url.trim();
    if url.is_empty() {
        return Err(AppError::BadRequest("file_url must not be blank".into()));
    }

    let file = FileActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        file_url: Set(url.to_string()),
        file_type: Set(payload.file_type),
        downloadable: Set(payload.downloadable),
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        actor.0.as_ref().map(|u| u.user_id),
        "product_file_add",
        Some("product_files"),
        Some(serde_json::json!({ "product_id": product_id, "file_id": file.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "File added",
        file_from_entity(file),
        Some(Meta::empty()),
    ))
}

pub async fn remove_product_file(
    state: &AppState,
    actor: &MaybeUser,
    product_id: Uuid,
    file_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = ProductFiles::delete_many()
        .filter(FileCol::Id.eq(file_id))
        .filter(FileCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        actor.0.as_ref().map(|u| u.user_id),
        "product_file_remove",
        Some("product_files"),
        Some(serde_json::json!({ "product_id": product_id, "file_id": file_id })),
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

/// Insert one image for a product, skipping blank URLs. Alt text defaults to
/// `"<title> - Image"` and the order index to 0.
async fn insert_image<C: ConnectionTrait>(
    conn: &C,
    product: &ProductModel,
    image: &ImagePayload,
) -> AppResult<Option<ImageModel>> {
    let url = image.image_url.trim();
    if url.is_empty() {
        return Ok(None);
    }

    let alt_text = image
        .alt_text
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_alt_text(&product.title));

    let model = ImageActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        image_url: Set(url.to_string()),
        alt_text: Set(Some(alt_text)),
        order_index: Set(image.order_index.unwrap_or(0)),
    }
    .insert(conn)
    .await?;
    Ok(Some(model))
}

fn default_alt_text(title: &str) -> String {
    if title.is_empty() {
        "Product Image".to_string()
    } else {
        format!("{title} - Image")
    }
}

async fn load_assets<C: ConnectionTrait>(
    conn: &C,
    product: ProductModel,
) -> AppResult<ProductWithAssets> {
    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(product.id))
        .order_by_asc(ImageCol::OrderIndex)
        .all(conn)
        .await?
        .into_iter()
        .map(image_from_entity)
        .collect();

    let files = ProductFiles::find()
        .filter(FileCol::ProductId.eq(product.id))
        .all(conn)
        .await?
        .into_iter()
        .map(file_from_entity)
        .collect();

    Ok(ProductWithAssets {
        product: product_from_entity(product),
        images,
        files,
    })
}

pub(crate) fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        title: model.title,
        description: model.description,
        price: model.price,
        currency: model.currency,
        stock: model.stock,
        material: model.material,
        dimensions: model.dimensions,
        weight: model.weight,
        main_image_url: model.main_image_url,
        category_id: model.category_id,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn image_from_entity(model: ImageModel) -> ProductImage {
    ProductImage {
        id: model.id,
        product_id: model.product_id,
        image_url: model.image_url,
        alt_text: model.alt_text,
        order_index: model.order_index,
    }
}

fn file_from_entity(model: FileModel) -> ProductFile {
    ProductFile {
        id: model.id,
        product_id: model.product_id,
        file_url: model.file_url,
        file_type: model.file_type,
        downloadable: model.downloadable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_text_defaults_to_title() {
        assert_eq!(default_alt_text("Benchy"), "Benchy - Image");
        assert_eq!(default_alt_text(""), "Product Image");
    }
}
