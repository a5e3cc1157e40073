//! Common types used across the ledger

/// Weight in the smallest weight unit (e.g. grams)
pub type Weight = i64;

/// Money in the smallest currency unit
pub type Amount = i64;

/// Prefix of the display code assigned to every sale
pub const SALE_CODE_PREFIX: &str = "SELL";

/// Prefix of the display code assigned to every purchase
pub const PURCHASE_CODE_PREFIX: &str = "BUY";

/// Build a display code from a prefix and a store-generated sequence
pub fn display_code(prefix: &str, sequence: i64) -> String {
    format!("{}{}", prefix, sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_code() {
        assert_eq!(display_code(SALE_CODE_PREFIX, 42), "SELL42");
        assert_eq!(display_code(PURCHASE_CODE_PREFIX, 1), "BUY1");
    }
}
