use std::collections::BTreeMap;

use serde::Serialize;

use super::types::PropertyData;

pub const MAX_LOAN_TERM_YEARS: f64 = 30.0;
pub const MAX_INTEREST_RATE: f64 = 20.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKey {
    PropertyValue,
    Deposit,
    DepositTooBig,
    LoanTerm,
    LoanInterest,
}

impl ErrorKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKey::PropertyValue => "propertyValue",
            ErrorKey::Deposit => "deposit",
            ErrorKey::DepositTooBig => "depositTooBig",
            ErrorKey::LoanTerm => "loanTerm",
            ErrorKey::LoanInterest => "loanInterest",
        }
    }
}

pub type ErrorMap = BTreeMap<ErrorKey, String>;

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

pub fn validate(data: &PropertyData) -> ErrorMap {
    let mut errors = ErrorMap::new();
    let property_value = present(data.property_value);
    let deposit = present(data.deposit);

    if !property_value.is_some_and(|v| v > 0.0) {
        errors.insert(
            ErrorKey::PropertyValue,
            "Property value must be greater than 0".to_string(),
        );
    }

    if !deposit.is_some_and(|v| v > 0.0) {
        errors.insert(
            ErrorKey::Deposit,
            "Deposit must be greater than 0".to_string(),
        );
    }

    if let (Some(value), Some(deposit)) = (property_value, deposit) {
        if deposit > value {
            errors.insert(
                ErrorKey::DepositTooBig,
                "Deposit cannot exceed the property value".to_string(),
            );
        }
    }

    if let Some(term) = present(data.loan.term) {
        if term > MAX_LOAN_TERM_YEARS {
            errors.insert(
                ErrorKey::LoanTerm,
                format!("Loan term cannot exceed {MAX_LOAN_TERM_YEARS} years"),
            );
        }
    }

    if !present(data.loan.interest).is_some_and(|rate| rate > 0.0 && rate <= MAX_INTEREST_RATE) {
        errors.insert(
            ErrorKey::LoanInterest,
            format!("Interest rate must be greater than 0% and at most {MAX_INTEREST_RATE}%"),
        );
    }

    errors
}

pub fn is_valid(data: &PropertyData) -> bool {
    validate(data).is_empty()
}
