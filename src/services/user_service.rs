use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::users::{RegisterRequest, UpdateUserRequest, UserList},
    entity::users::{ActiveModel, Column, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Roles are stored as given but the admin limit matches case-insensitively.
fn is_admin_role(role: &str) -> bool {
    role.eq_ignore_ascii_case("ADMIN")
}

async fn count_admins<C: sea_orm::ConnectionTrait>(
    conn: &C,
    excluding: Option<Uuid>,
) -> AppResult<u64> {
    let mut finder = Users::find().filter(Expr::col(Column::Role).ilike("admin"));
    if let Some(id) = excluding {
        finder = finder.filter(Column::Id.ne(id));
    }
    Ok(finder.count(conn).await?)
}

/// Registers a new user: uniqueness checks, the one-admin limit, password
/// hashing, and the USER role default.
pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let username_taken = Users::find()
        .filter(Column::Username.eq(payload.username.as_str()))
        .one(&state.orm)
        .await?
        .is_some();
    if username_taken {
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let email_taken = Users::find()
        .filter(Column::Email.eq(payload.email.as_str()))
        .one(&state.orm)
        .await?
        .is_some();
    if email_taken {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let role = match payload.role.as_deref() {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => "USER".to_string(),
    };

    if is_admin_role(&role) && count_admins(&state.orm, None).await? >= 1 {
        return Err(AppError::Conflict(
            "Admin user already exists. Only one admin is allowed.".into(),
        ));
    }

    let password_hash = super::auth_service::hash_password(&payload.password)?;

    let user = ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(payload.username),
        email: Set(payload.email),
        password_hash: Set(password_hash),
        role: Set(role),
        name: Set(payload.name),
        phone: Set(payload.phone),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User created",
        user_from_entity(user),
        None,
    ))
}

/// Merge-on-provided-fields update. Username/email are revalidated only when
/// actually changing; the admin limit is re-enforced only when promoting a
/// non-admin; password is re-hashed only for a new non-empty value.
pub async fn update_user(
    state: &AppState,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    let existing = Users::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.clone().into();

    if let Some(username) = payload.username {
        if username != existing.username {
            let taken = Users::find()
                .filter(Column::Username.eq(username.as_str()))
                .one(&state.orm)
                .await?
                .is_some();
            if taken {
                return Err(AppError::Conflict("Username already taken".into()));
            }
            active.username = Set(username);
        }
    }

    if let Some(email) = payload.email {
        if email != existing.email {
            let taken = Users::find()
                .filter(Column::Email.eq(email.as_str()))
                .one(&state.orm)
                .await?
                .is_some();
            if taken {
                return Err(AppError::Conflict("Email already registered".into()));
            }
            active.email = Set(email);
        }
    }

    if let Some(role) = payload.role {
        // Promotion check compares against the stored role, not the patch.
        if is_admin_role(&role)
            && !is_admin_role(&existing.role)
            && count_admins(&state.orm, Some(id)).await? >= 1
        {
            return Err(AppError::Conflict(
                "Admin user already exists. Only one admin is allowed.".into(),
            ));
        }
        active.role = Set(role);
    }

    if let Some(name) = payload.name {
        active.name = Set(Some(name));
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(Some(phone));
    }

    if let Some(password) = payload.password
        && !password.is_empty()
    {
        active.password_hash = Set(super::auth_service::hash_password(&password)?);
    }

    active.updated_at = Set(Utc::now().into());
    let user = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_update",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User updated",
        user_from_entity(user),
        Some(Meta::empty()),
    ))
}

pub async fn list_users(state: &AppState) -> AppResult<ApiResponse<UserList>> {
    let items = Users::find()
        .order_by_asc(Column::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();
    Ok(ApiResponse::success("Users", UserList { items }, None))
}

pub async fn get_user(state: &AppState, id: Uuid) -> AppResult<ApiResponse<User>> {
    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(user_from_entity);
    match user {
        Some(u) => Ok(ApiResponse::success("User", u, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn get_user_by_username(
    state: &AppState,
    username: &str,
) -> AppResult<ApiResponse<User>> {
    let user = Users::find()
        .filter(Column::Username.eq(username))
        .one(&state.orm)
        .await?
        .map(user_from_entity);
    match user {
        Some(u) => Ok(ApiResponse::success("User", u, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn delete_user(state: &AppState, id: Uuid) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Users::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(id),
        "user_delete",
        Some("users"),
        Some(serde_json::json!({ "user_id": id })),
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

pub(crate) fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        username: model.username,
        email: model.email,
        password_hash: model.password_hash,
        role: model.role,
        name: model.name,
        phone: model.phone,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_role_matches_case_insensitively() {
        assert!(is_admin_role("ADMIN"));
        assert!(is_admin_role("admin"));
        assert!(is_admin_role("Admin"));
        assert!(!is_admin_role("USER"));
        assert!(!is_admin_role(""));
    }
}
