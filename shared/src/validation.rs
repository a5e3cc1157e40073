//! Validation and weight/money arithmetic for the Trading Ledger
//!
//! Everything here is pure so the same rules apply whichever store backs
//! the services.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::Payment;
use crate::types::{Amount, Weight};

// ============================================================================
// Weight Rules
// ============================================================================

/// Validate that a weight is strictly positive
pub fn validate_weight(weight: Weight) -> Result<(), &'static str> {
    if weight <= 0 {
        return Err("Weight must be positive");
    }
    Ok(())
}

/// Validate the starting allocatable weight of a sort
pub fn validate_current_weight(current: Weight, weight: Weight) -> Result<(), &'static str> {
    if current < 0 {
        return Err("Current weight cannot be negative");
    }
    if current > weight {
        return Err("Current weight cannot exceed weight");
    }
    Ok(())
}

/// Remaining weight after allocating `requested` out of `current`
pub fn decrement_weight(current: Weight, requested: Weight) -> Result<Weight, &'static str> {
    validate_weight(requested)?;
    match current.checked_sub(requested) {
        Some(remaining) if remaining >= 0 => Ok(remaining),
        _ => Err("Insufficient stock"),
    }
}

/// Weight after returning `returned` to a sort whose original weight is `weight`
pub fn restore_weight(
    current: Weight,
    returned: Weight,
    weight: Weight,
) -> Result<Weight, &'static str> {
    match current.checked_add(returned) {
        Some(restored) if restored <= weight && restored >= 0 => Ok(restored),
        _ => Err("Restored weight exceeds original weight"),
    }
}

// ============================================================================
// Money Rules
// ============================================================================

/// Validate that a price per weight unit is strictly positive
pub fn validate_price(price: Amount) -> Result<(), &'static str> {
    if price <= 0 {
        return Err("Price must be positive");
    }
    Ok(())
}

/// Validate a price that may be zero (shrinkage sorts, free add-ons)
pub fn validate_non_negative_price(price: Amount) -> Result<(), &'static str> {
    if price < 0 {
        return Err("Price cannot be negative");
    }
    Ok(())
}

/// Validate that a payment amount is strictly positive
pub fn validate_amount(amount: Amount) -> Result<(), &'static str> {
    if amount <= 0 {
        return Err("Amount must be positive");
    }
    Ok(())
}

/// weight x price, rejecting overflow
pub fn line_total(weight: Weight, price_per_unit: Amount) -> Result<Amount, &'static str> {
    weight
        .checked_mul(price_per_unit)
        .ok_or("Line total is out of range")
}

/// Net of INCOME minus EXPENSE over non-deleted entries
pub fn ledger_balance<'a, I>(entries: I) -> Amount
where
    I: IntoIterator<Item = &'a Payment>,
{
    entries
        .into_iter()
        .filter(|p| !p.is_deleted)
        .map(|p| p.payment_type.signed(p.total))
        .sum()
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate that a list of ids has no repeats
pub fn validate_unique_ids(ids: &[Uuid]) -> Result<(), &'static str> {
    let mut seen = HashSet::with_capacity(ids.len());
    if ids.iter().all(|id| seen.insert(*id)) {
        Ok(())
    } else {
        Err("Duplicate ids are not allowed")
    }
}

/// Validate a display name (non-blank, at most 255 characters)
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty");
    }
    if trimmed.chars().count() > 255 {
        return Err("Name must be at most 255 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentType;
    use chrono::Utc;
    use proptest::prelude::*;

    fn payment(total: Amount, payment_type: PaymentType, is_deleted: bool) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            total,
            payment_type,
            sale_id: None,
            purchase_id: None,
            description: String::new(),
            is_deleted,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_decrement_weight() {
        assert_eq!(decrement_weight(100, 40), Ok(60));
        assert_eq!(decrement_weight(60, 60), Ok(0));
        assert_eq!(decrement_weight(60, 70), Err("Insufficient stock"));
        assert!(decrement_weight(60, 0).is_err());
        assert!(decrement_weight(60, -5).is_err());
    }

    #[test]
    fn test_restore_weight_bounded_by_original() {
        assert_eq!(restore_weight(60, 40, 100), Ok(100));
        assert!(restore_weight(90, 40, 100).is_err());
    }

    #[test]
    fn test_current_weight_bounds() {
        assert!(validate_current_weight(0, 10).is_ok());
        assert!(validate_current_weight(10, 10).is_ok());
        assert!(validate_current_weight(11, 10).is_err());
        assert!(validate_current_weight(-1, 10).is_err());
    }

    #[test]
    fn test_line_total_overflow() {
        assert_eq!(line_total(25, 40), Ok(1000));
        assert!(line_total(i64::MAX, 2).is_err());
    }

    #[test]
    fn test_balance_excludes_deleted_entries() {
        let entries = vec![
            payment(500, PaymentType::Income, false),
            payment(200, PaymentType::Expense, false),
            payment(1000, PaymentType::Income, true),
        ];
        assert_eq!(ledger_balance(&entries), 300);
        assert_eq!(ledger_balance(&Vec::new()), 0);
    }

    #[test]
    fn test_unique_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_unique_ids(&[a, b]).is_ok());
        assert!(validate_unique_ids(&[a, b, a]).is_err());
        assert!(validate_unique_ids(&[]).is_ok());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Grade A").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Allocating then returning the same weight is an identity
        #[test]
        fn prop_decrement_then_restore_is_identity(
            weight in 1i64..1_000_000,
            consumed_ratio in 0.0f64..1.0,
        ) {
            let requested = ((weight as f64 * consumed_ratio) as i64).max(1);
            let remaining = decrement_weight(weight, requested).unwrap();
            prop_assert!(remaining >= 0 && remaining <= weight);
            prop_assert_eq!(restore_weight(remaining, requested, weight), Ok(weight));
        }

        /// Decrement never yields a negative weight
        #[test]
        fn prop_decrement_never_negative(current in 0i64..10_000, requested in 1i64..20_000) {
            match decrement_weight(current, requested) {
                Ok(remaining) => {
                    prop_assert!(remaining >= 0);
                    prop_assert_eq!(remaining, current - requested);
                }
                Err(_) => prop_assert!(requested > current),
            }
        }

        /// Balance is the signed sum of live entries
        #[test]
        fn prop_balance_is_signed_sum(
            entries in prop::collection::vec((1i64..100_000, any::<bool>(), any::<bool>()), 0..30)
        ) {
            let payments: Vec<Payment> = entries
                .iter()
                .map(|(total, income, deleted)| {
                    let kind = if *income { PaymentType::Income } else { PaymentType::Expense };
                    payment(*total, kind, *deleted)
                })
                .collect();

            let expected: Amount = entries
                .iter()
                .filter(|(_, _, deleted)| !deleted)
                .map(|(total, income, _)| if *income { *total } else { -*total })
                .sum();

            prop_assert_eq!(ledger_balance(&payments), expected);
        }
    }
}
