use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    dto::tags::{CreateTagRequest, TagList, UpdateTagRequest},
    entity::{
        product_tags::{ActiveModel as ProductTagActive, Column as ProductTagCol, Entity as ProductTags},
        products::Entity as Products,
        tags::{ActiveModel, Column, Entity as Tags, Model as TagModel},
    },
    error::{AppError, AppResult},
    models::Tag,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_tags(state: &AppState) -> AppResult<ApiResponse<TagList>> {
    let items = Tags::find()
        .order_by_asc(Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(tag_from_entity)
        .collect();
    Ok(ApiResponse::success("Tags", TagList { items }, None))
}

pub async fn get_tag(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Tag>> {
    let tag = Tags::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(tag_from_entity);
    match tag {
        Some(t) => Ok(ApiResponse::success("Tag", t, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_tag_by_slug(state: &AppState, slug: &str) -> AppResult<ApiResponse<Tag>> {
    let tag = Tags::find()
        .filter(Column::Slug.eq(slug))
        .one(&state.orm)
        .await?
        .map(tag_from_entity);
    match tag {
        Some(t) => Ok(ApiResponse::success("Tag", t, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn create_tag(
    state: &AppState,
    payload: CreateTagRequest,
) -> AppResult<ApiResponse<Tag>> {
    let slug_taken = Tags::find()
        .filter(Column::Slug.eq(payload.slug.as_str()))
        .one(&state.orm)
        .await?
        .is_some();
    if slug_taken {
        return Err(AppError::Conflict("Tag slug already exists".into()));
    }

    let tag = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        slug: Set(payload.slug),
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Tag created",
        tag_from_entity(tag),
        Some(Meta::empty()),
    ))
}

pub async fn update_tag(
    state: &AppState,
    id: Uuid,
    payload: UpdateTagRequest,
) -> AppResult<ApiResponse<Tag>> {
    let existing = Tags::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(t) => t,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(slug) = payload.slug {
        active.slug = Set(slug);
    }

    let tag = active.update(&state.orm).await?;
    Ok(ApiResponse::success(
        "Tag updated",
        tag_from_entity(tag),
        Some(Meta::empty()),
    ))
}

pub async fn delete_tag(state: &AppState, id: Uuid) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Tags::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Attach a tag to a product; attaching twice is a no-op.
pub async fn attach_tag(
    state: &AppState,
    product_id: Uuid,
    tag_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let product = Products::find_by_id(product_id).one(&state.orm).await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }
    let tag = Tags::find_by_id(tag_id).one(&state.orm).await?;
    if tag.is_none() {
        return Err(AppError::NotFound);
    }

    let existing = ProductTags::find()
        .filter(ProductTagCol::ProductId.eq(product_id))
        .filter(ProductTagCol::TagId.eq(tag_id))
        .one(&state.orm)
        .await?;
    if existing.is_none() {
        ProductTagActive {
            product_id: Set(product_id),
            tag_id: Set(tag_id),
        }
        .insert(&state.orm)
        .await?;
    }

    Ok(ApiResponse::success(
        "Tag attached",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn detach_tag(
    state: &AppState,
    product_id: Uuid,
    tag_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = ProductTags::delete_many()
        .filter(ProductTagCol::ProductId.eq(product_id))
        .filter(ProductTagCol::TagId.eq(tag_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(ApiResponse::success(
        "Tag detached",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn tag_from_entity(model: TagModel) -> Tag {
    Tag {
        id: model.id,
        name: model.name,
        slug: model.slug,
    }
}
