use sqlx::{pool::PoolConnection, Postgres};

use crate::common::error::AppError;
use crate::config::AppState;
use crate::middleware::auth::AuthenticatedUser;
use crate::middleware::tenancy::TenantContext;

pub(crate) type ClinicConnection = PoolConnection<Postgres>;

/// Conexão da pool já marcada com a clínica e o utilizador do pedido.
///
/// `app.tenant_id` e `app.user_id` ficam como variáveis de sessão (não locais
/// à transação): os serviços abrem as suas próprias transações sobre esta
/// conexão e as políticas RLS continuam a vê-las. São reescritas a cada
/// aquisição, por isso uma conexão devolvida à pool nunca leva a clínica
/// anterior para o pedido seguinte.
pub(crate) async fn get_rls_connection(
    app_state: &AppState,
    tenant_ctx: &TenantContext,
    user: &AuthenticatedUser,
) -> Result<ClinicConnection, AppError> {
    let mut conn = app_state.db_pool.acquire().await?;

    sqlx::query("SELECT set_config('app.tenant_id', $1, false), set_config('app.user_id', $2, false)")
        .bind(tenant_ctx.0.to_string())
        .bind(user.0.id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(conn)
}

/// Violação de chave única vira `UniqueConstraintViolation(resource)`.
pub(crate) fn map_unique_violation(err: sqlx::Error, resource: &str) -> AppError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            AppError::UniqueConstraintViolation(resource.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}
