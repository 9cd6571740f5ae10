//! Supported destinations, delivery methods and the completion gate.
//!
//! The model is instructed with these same lists; the functions here re-check its
//! proposals deterministically before anything is committed to a session.

use rust_decimal::Decimal;

use crate::domain::transfer::{PromoData, TransferField, TransferState};

pub const SUPPORTED_COUNTRIES: [&str; 10] =
    ["USA", "Mexico", "India", "Philippines", "Canada", "UK", "Brazil", "France", "Germany", "Japan"];

pub const DELIVERY_METHODS: [&str; 3] = ["Bank Deposit", "Cash Pickup", "Mobile Wallet"];

pub const COUNTRY_CURRENCIES: [(&str, &str); 10] = [
    ("USA", "USD"),
    ("Mexico", "MXN"),
    ("India", "INR"),
    ("Philippines", "PHP"),
    ("Canada", "CAD"),
    ("UK", "GBP"),
    ("Brazil", "BRL"),
    ("France", "EUR"),
    ("Germany", "EUR"),
    ("Japan", "JPY"),
];

pub const PROMO_IMAGE_URL: &str = "https://cdn.prod.website-files.com/663002023d3d42ffa6937084/692e0e7ee90ceebca6e1077c_home-troca.avif";
pub const PROMO_LINK: &str = "https://www.felixpago.com";
pub const PROMO_TITLE: &str = "Send money home and enter to win a Ford F-150 XL";
pub const PROMO_DESCRIPTION: &str = "All your transfers in December of $100 or more enter the draw.";
pub const PROMO_BUTTON_TEXT: &str = "Send and participate now";
pub const PROMO_FOOTER: &str = "T&Cs apply. Promotion not valid for NY and FL.";

/// English promo template. The model localizes the text; the URLs never change.
pub fn default_promo() -> PromoData {
    PromoData {
        image_url: PROMO_IMAGE_URL.to_string(),
        title: PROMO_TITLE.to_string(),
        description: PROMO_DESCRIPTION.to_string(),
        button_text: PROMO_BUTTON_TEXT.to_string(),
        link: PROMO_LINK.to_string(),
        footer: PROMO_FOOTER.to_string(),
    }
}

pub fn canonical_country(value: &str) -> Option<&'static str> {
    let wanted = normalize(value);
    SUPPORTED_COUNTRIES.into_iter().find(|country| normalize(country) == wanted)
}

pub fn canonical_method(value: &str) -> Option<&'static str> {
    let wanted = normalize(value);
    DELIVERY_METHODS.into_iter().find(|method| normalize(method) == wanted)
}

pub fn currency_for(country: &str) -> Option<&'static str> {
    let country = canonical_country(country)?;
    COUNTRY_CURRENCIES
        .into_iter()
        .find(|(candidate, _)| *candidate == country)
        .map(|(_, currency)| currency)
}

/// First and last name at minimum.
pub fn is_full_name(name: &str) -> bool {
    name.split_whitespace().count() >= 2
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedAmount {
    pub value: Decimal,
    pub currency: Option<String>,
}

/// Parses amounts such as `500 BRL`, `1,250.50 USD`, `$100` or `500`.
pub fn parse_amount(raw: &str) -> Option<ParsedAmount> {
    let mut value = None;
    let mut currency = None;

    for token in raw.split_whitespace() {
        let trimmed = token.trim_start_matches(['$', '€', '£', '¥', 'R']).replace(',', "");
        if value.is_none() {
            if let Ok(parsed) = trimmed.parse::<Decimal>() {
                value = Some(parsed);
                continue;
            }
        }
        let is_code = token.len() == 3 && token.chars().all(|ch| ch.is_ascii_alphabetic());
        if currency.is_none() && is_code {
            currency = Some(token.to_ascii_uppercase());
        }
    }

    let value = value.filter(|parsed| *parsed > Decimal::ZERO)?;
    Some(ParsedAmount { value, currency })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldViolation {
    Missing(TransferField),
    UnsupportedCountry(String),
    UnsupportedMethod(String),
    IncompleteName(String),
    UnparseableAmount(String),
}

impl FieldViolation {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "field_missing",
            Self::UnsupportedCountry(_) => "unsupported_country",
            Self::UnsupportedMethod(_) => "unsupported_method",
            Self::IncompleteName(_) => "incomplete_beneficiary_name",
            Self::UnparseableAmount(_) => "unparseable_amount",
        }
    }
}

/// Every reason the state cannot be marked complete. Empty means the gate passes.
pub fn validate_transfer(state: &TransferState) -> Vec<FieldViolation> {
    let mut violations =
        state.missing_fields().into_iter().map(FieldViolation::Missing).collect::<Vec<_>>();

    if let Some(country) = state.destination_country.as_deref() {
        if canonical_country(country).is_none() {
            violations.push(FieldViolation::UnsupportedCountry(country.to_string()));
        }
    }
    if let Some(method) = state.delivery_method.as_deref() {
        if canonical_method(method).is_none() {
            violations.push(FieldViolation::UnsupportedMethod(method.to_string()));
        }
    }
    if let Some(name) = state.beneficiary_name.as_deref() {
        if !is_full_name(name) {
            violations.push(FieldViolation::IncompleteName(name.to_string()));
        }
    }
    if let Some(amount) = state.amount.as_deref() {
        if parse_amount(amount).is_none() {
            violations.push(FieldViolation::UnparseableAmount(amount.to_string()));
        }
    }

    violations
}

/// A stated currency that differs from the destination's. The model may still complete
/// the transfer when the user explicitly accepted it, so this is informational only.
pub fn currency_mismatch(state: &TransferState) -> Option<(String, &'static str)> {
    let expected = currency_for(state.destination_country.as_deref()?)?;
    let stated = parse_amount(state.amount.as_deref()?)?.currency?;
    (stated != expected).then_some((stated, expected))
}

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        canonical_country, canonical_method, currency_for, currency_mismatch, is_full_name,
        parse_amount, validate_transfer, FieldViolation,
    };
    use crate::domain::transfer::{TransferField, TransferState};

    fn complete_state() -> TransferState {
        TransferState {
            destination_country: Some("Brazil".to_string()),
            amount: Some("500 BRL".to_string()),
            beneficiary_name: Some("John Smith".to_string()),
            delivery_method: Some("Bank Deposit".to_string()),
            is_complete: true,
        }
    }

    #[test]
    fn lookups_are_case_and_space_insensitive() {
        assert_eq!(canonical_country(" brazil "), Some("Brazil"));
        assert_eq!(canonical_country("usa"), Some("USA"));
        assert_eq!(canonical_country("Atlantis"), None);
        assert_eq!(canonical_method("bank   deposit"), Some("Bank Deposit"));
        assert_eq!(currency_for("germany"), Some("EUR"));
        assert_eq!(currency_for("Narnia"), None);
    }

    #[test]
    fn amounts_parse_value_and_optional_currency() {
        assert_eq!(
            parse_amount("500 BRL"),
            Some(super::ParsedAmount {
                value: Decimal::new(500, 0),
                currency: Some("BRL".to_string())
            })
        );
        assert_eq!(parse_amount("1,250.50 usd").map(|amount| amount.value), Some(Decimal::new(125050, 2)));
        assert_eq!(parse_amount("$100").and_then(|amount| amount.currency), None);
        assert!(parse_amount("a lot").is_none());
        assert!(parse_amount("0 USD").is_none());
    }

    #[test]
    fn full_name_requires_two_tokens() {
        assert!(is_full_name("Ana Silva"));
        assert!(is_full_name("Maria da Silva"));
        assert!(!is_full_name("John"));
        assert!(!is_full_name("   "));
    }

    #[test]
    fn complete_state_passes_the_gate() {
        assert!(validate_transfer(&complete_state()).is_empty());
    }

    #[test]
    fn gate_reports_every_violation() {
        let state = TransferState {
            destination_country: Some("Atlantis".to_string()),
            amount: None,
            beneficiary_name: Some("John".to_string()),
            delivery_method: Some("Carrier Pigeon".to_string()),
            is_complete: true,
        };

        let violations = validate_transfer(&state);

        assert!(violations.contains(&FieldViolation::Missing(TransferField::Amount)));
        assert!(violations.contains(&FieldViolation::UnsupportedCountry("Atlantis".to_string())));
        assert!(violations.contains(&FieldViolation::UnsupportedMethod("Carrier Pigeon".to_string())));
        assert!(violations.contains(&FieldViolation::IncompleteName("John".to_string())));
    }

    #[test]
    fn currency_mismatch_is_detected_only_when_stated() {
        let mut state = complete_state();
        assert_eq!(currency_mismatch(&state), None);

        state.amount = Some("100 EUR".to_string());
        assert_eq!(currency_mismatch(&state), Some(("EUR".to_string(), "BRL")));

        state.amount = Some("100".to_string());
        assert_eq!(currency_mismatch(&state), None);
    }
}
