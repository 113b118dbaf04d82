//! Fixed catalog of insurance products.
//!
//! The offering is deliberately static: five products, each with a stable
//! code that is what gets persisted in the `active_insurances` column.
//! Labels and prices live only here so a price change never requires a
//! data migration.

use serde::Serialize;

/// One product in the insurance offering.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub code: &'static str,
    pub label: &'static str,
    /// Monthly price in CZK.
    pub price: u32,
}

/// The full offering, in display order.
pub const PRODUCTS: &[Product] = &[
    Product {
        code: "nemovitost",
        label: "Nemovitostní",
        price: 250,
    },
    Product {
        code: "zivotni",
        label: "Životní",
        price: 199,
    },
    Product {
        code: "zdravotni",
        label: "Zdravotní",
        price: 149,
    },
    Product {
        code: "povinne",
        label: "Povinné ručení",
        price: 320,
    },
    Product {
        code: "zvirata",
        label: "Pojištění zvířat",
        price: 180,
    },
];

/// Looks up a product by its persisted code.
pub fn find(code: &str) -> Option<&'static Product> {
    PRODUCTS.iter().find(|p| p.code == code)
}

#[must_use]
pub fn contains(code: &str) -> bool {
    find(code).is_some()
}

/// Parses the comma-separated `active_insurances` cell into known codes.
///
/// Tokens are trimmed; blanks, duplicates and codes missing from the
/// catalog are dropped. First-occurrence order is preserved so the cell
/// reads back in the order the products were added.
#[must_use]
pub fn parse_active_codes(raw: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for token in raw.split(',') {
        let code = token.trim();
        if !code.is_empty() && contains(code) && !codes.iter().any(|c| c == code) {
            codes.push(code.to_string());
        }
    }
    codes
}

/// Sum of monthly prices for the given codes, in CZK.
#[must_use]
pub fn monthly_total(codes: &[String]) -> u32 {
    codes.iter().filter_map(|c| find(c)).map(|p| p.price).sum()
}

/// Human-readable labels for a raw `active_insurances` cell,
/// e.g. `"zivotni,povinne"` becomes `"Životní, Povinné ručení"`.
#[must_use]
pub fn display_names(raw: &str) -> String {
    parse_active_codes(raw)
        .iter()
        .filter_map(|c| find(c))
        .map(|p| p.label)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_unknown_and_blank_tokens() {
        let codes = parse_active_codes("zivotni, ,ufo,povinne");
        assert_eq!(codes, vec!["zivotni", "povinne"]);
    }

    #[test]
    fn test_parse_deduplicates_keeping_first_position() {
        let codes = parse_active_codes("povinne,zivotni,povinne");
        assert_eq!(codes, vec!["povinne", "zivotni"]);
    }

    #[test]
    fn test_monthly_total_sums_catalog_prices() {
        let codes = vec!["zivotni".to_string(), "povinne".to_string()];
        assert_eq!(monthly_total(&codes), 519);
    }

    #[test]
    fn test_display_names_uses_labels_in_stored_order() {
        assert_eq!(display_names("zivotni,povinne"), "Životní, Povinné ručení");
        assert_eq!(display_names(""), "");
    }
}
