// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::common::error::{ApiError, AppError};
use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// O nome do nosso cabeçalho HTTP customizado
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

// A clínica (tenant) do pedido, já conferida com o token pelo `tenant_guard`.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

impl TenantContext {
    /// Lê o X-Tenant-ID. `None` quando falta ou não é um UUID.
    pub fn from_headers(headers: &HeaderMap) -> Option<Uuid> {
        headers
            .get(TENANT_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
    }
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .copied()
            .ok_or_else(|| {
                AppError::TenantMismatch
                    .to_api_error(&Locale::from_headers(&parts.headers), &I18nStore::default())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_must_be_a_uuid() {
        let mut headers = HeaderMap::new();
        assert_eq!(TenantContext::from_headers(&headers), None);

        headers.insert(TENANT_ID_HEADER, HeaderValue::from_static("clinica-1"));
        assert_eq!(TenantContext::from_headers(&headers), None);

        let id = Uuid::new_v4();
        headers.insert(TENANT_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(TenantContext::from_headers(&headers), Some(id));
    }
}
