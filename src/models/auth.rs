// src/models/auth.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Perfis emitidos pelo provedor de autenticação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Doctor,
    FrontDesk,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Doctor => "DOCTOR",
            Role::FrontDesk => "FRONT_DESK",
            Role::Assistant => "ASSISTANT",
        }
    }
}

// O utilizador autenticado, tal como o token o descreve.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub clinic_id: Uuid,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // Subject (ID do utilizador)
    pub role: Role,      // Perfil
    pub clinic_id: Uuid, // Clínica (tenant) do utilizador
    pub exp: usize,      // Expiration time
    pub iat: usize,      // Issued At
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            clinic_id: claims.clinic_id,
        }
    }
}
