use crate::{
    config::AuthConfig,
    db::{DbPool, OrmConn},
};

/// Shared per-request context. SeaORM carries the domain queries; the plain
/// sqlx pool exists for the audit writer and raw SQL. Auth settings are read
/// once at startup and cloned in, not re-read per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub auth: AuthConfig,
}
