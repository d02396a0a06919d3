// src/handlers.rs

use rust_decimal::Decimal;
use validator::ValidationError;

pub mod audit;
pub mod auth;
pub mod budgets;
pub mod cash_register;
pub mod catalog;
pub mod consultations;
pub mod invoices;
pub mod plans;
pub mod prices;

// ---
// Validações partilhadas pelos payloads
// ---
// Valores monetários ficam em NUMERIC(12,2): mais de duas casas seria arredondado ao gravar
fn check_cents(val: &Decimal) -> Result<(), ValidationError> {
    if val.normalize().scale() > 2 {
        let mut err = ValidationError::new("scale");
        err.add_param("max_decimals".into(), &2);
        err.message = Some("O valor não pode ter mais de duas casas decimais.".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    check_cents(val)?;
    if *val < Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    check_cents(val)?;
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param("exclusive_min".into(), &0.0);
        err.message = Some("O valor deve ser maior que zero.".into());
        return Err(err);
    }
    Ok(())
}

// Número de dente na notação FDI (11..48 permanentes, 51..85 decíduos)
pub(crate) fn validate_tooth_number(val: impl std::borrow::Borrow<i16>) -> Result<(), ValidationError> {
    let val = *val.borrow();
    let quadrant = val / 10;
    let position = val % 10;
    let valid = match quadrant {
        1..=4 => (1..=8).contains(&position),
        5..=8 => (1..=5).contains(&position),
        _ => false,
    };
    if !valid {
        let mut err = ValidationError::new("tooth_number");
        err.message = Some("Número de dente inválido (notação FDI).".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(validate_not_negative(&Decimal::ZERO).is_ok());
        assert!(validate_not_negative(&Decimal::from_str("-0.01").unwrap()).is_err());
    }

    #[test]
    fn negative_zero_counts_as_zero() {
        assert!(validate_not_negative(&Decimal::from_str("-0").unwrap()).is_ok());
        assert!(validate_not_negative(&Decimal::from_str("-0.00").unwrap()).is_ok());
    }

    #[test]
    fn payments_must_be_positive() {
        assert!(validate_positive(&Decimal::from_str("0.01").unwrap()).is_ok());
        assert!(validate_positive(&Decimal::ZERO).is_err());
    }

    #[test]
    fn amounts_are_limited_to_cents() {
        assert!(validate_positive(&Decimal::from_str("0.001").unwrap()).is_err());
        assert!(validate_positive(&Decimal::from_str("50.004").unwrap()).is_err());
        assert!(validate_not_negative(&Decimal::from_str("100.005").unwrap()).is_err());
        // Zeros à direita não contam
        assert!(validate_positive(&Decimal::from_str("50.000").unwrap()).is_ok());
        assert!(validate_not_negative(&Decimal::from_str("100.10").unwrap()).is_ok());
    }

    #[test]
    fn tooth_numbers_follow_fdi() {
        for tooth in [11, 18, 36, 48, 51, 85] {
            assert!(validate_tooth_number(&tooth).is_ok(), "{tooth}");
        }
        for tooth in [0, 10, 19, 49, 56, 90, -11] {
            assert!(validate_tooth_number(&tooth).is_err(), "{tooth}");
        }
    }
}
