// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// Faces dentárias aceites: Mesial, Distal, Vestibular, Lingual, Oclusal, Incisal
pub const VALID_FACES: [&str; 6] = ["M", "D", "V", "L", "O", "I"];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "Maria Silva")]
    pub name: String,
    #[schema(example = "123456789")]
    pub tax_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Entidade pagadora (seguradora ou "particular")
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayerEntity {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "particular")]
    pub slug: String,
    #[schema(example = "Particular")]
    pub name: String,
}

// Artigo do catálogo (procedimento faturável)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "A01")]
    pub code: String,
    #[schema(example = "Restauração em resina")]
    pub description: String,
    #[schema(example = "Dentisteria")]
    pub category: String,
    pub requires_tooth: bool,
    pub requires_faces: bool,
    #[schema(example = 2)]
    pub face_count: Option<i16>,
    pub created_at: DateTime<Utc>,
}

// Preço por (artigo, entidade)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub procedure_id: Uuid,
    pub entity_id: Uuid,
    #[schema(example = "35.00")]
    pub entity_price: Decimal,
    #[schema(example = "15.00")]
    pub patient_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Posição dentária já validada contra as exigências do artigo.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DentalPosition {
    pub tooth_number: Option<i16>,
    pub faces: Option<Vec<String>>,
}

impl Procedure {
    /// Aplica as regras de dente/faces do artigo.
    /// Faces de um artigo que não as exige são descartadas.
    pub fn resolve_position(
        &self,
        tooth_number: Option<i16>,
        faces: Option<Vec<String>>,
    ) -> Result<DentalPosition, AppError> {
        if self.requires_tooth && tooth_number.is_none() {
            return Err(AppError::ToothRequired);
        }

        if !self.requires_faces {
            return Ok(DentalPosition {
                tooth_number,
                faces: None,
            });
        }

        let mut normalized: Vec<String> = Vec::new();
        let mut invalid: Vec<String> = Vec::new();

        for face in faces.unwrap_or_default() {
            let face = face.trim().to_uppercase();
            if !VALID_FACES.contains(&face.as_str()) {
                invalid.push(face);
            } else if !normalized.contains(&face) {
                normalized.push(face);
            }
        }

        if !invalid.is_empty() {
            return Err(AppError::InvalidFaces(invalid.join(", ")));
        }
        if normalized.is_empty() {
            return Err(AppError::FacesRequired);
        }

        Ok(DentalPosition {
            tooth_number,
            faces: Some(normalized),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn procedure(requires_tooth: bool, requires_faces: bool) -> Procedure {
        Procedure {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            code: "A01".into(),
            description: "Restauração".into(),
            category: "Dentisteria".into(),
            requires_tooth,
            requires_faces,
            face_count: None,
            created_at: Utc::now(),
        }
    }

    fn faces(list: &[&str]) -> Option<Vec<String>> {
        Some(list.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn missing_tooth_is_rejected() {
        let err = procedure(true, false).resolve_position(None, None).unwrap_err();
        assert!(matches!(err, AppError::ToothRequired));
    }

    #[test]
    fn faces_are_required_when_the_procedure_asks_for_them() {
        let p = procedure(true, true);
        assert!(matches!(p.resolve_position(Some(36), None), Err(AppError::FacesRequired)));
        assert!(matches!(p.resolve_position(Some(36), faces(&[])), Err(AppError::FacesRequired)));
    }

    #[test]
    fn unknown_faces_are_reported() {
        let err = procedure(true, true)
            .resolve_position(Some(36), faces(&["M", "X", "z"]))
            .unwrap_err();
        match err {
            AppError::InvalidFaces(list) => assert_eq!(list, "X, Z"),
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[test]
    fn faces_are_normalized() {
        let position = procedure(true, true)
            .resolve_position(Some(36), faces(&["m", " O ", "M"]))
            .unwrap();
        assert_eq!(position.faces, faces(&["M", "O"]));
        assert_eq!(position.tooth_number, Some(36));
    }

    #[test]
    fn faces_are_dropped_when_not_required() {
        let position = procedure(false, false)
            .resolve_position(Some(11), faces(&["M"]))
            .unwrap();
        assert_eq!(position, DentalPosition { tooth_number: Some(11), faces: None });
    }
}
