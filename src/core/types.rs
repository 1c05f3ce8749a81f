use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::projection::compute_projections;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioId(String);

impl ScenarioId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScenarioId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ScenarioId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    House,
    Unit,
    Townhouse,
    Land,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AustralianState {
    #[default]
    Nsw,
    Vic,
    Qld,
    Wa,
    Sa,
    Tas,
    Act,
    Nt,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoanDetails {
    pub amount: Option<f64>,
    /// Years.
    pub term: Option<f64>,
    /// Annual rate in percent.
    pub interest: Option<f64>,
    pub is_interest_only: bool,
    pub lvr: Option<f64>,
    pub lmi: Option<f64>,
    pub monthly_mortgage: Option<f64>,
}

impl Default for LoanDetails {
    fn default() -> Self {
        Self {
            amount: None,
            term: Some(30.0),
            interest: Some(6.0),
            is_interest_only: false,
            lvr: None,
            lmi: None,
            monthly_mortgage: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Expenses {
    pub one_time_total: f64,
    /// Annual running costs excluding strata.
    pub ongoing_total: f64,
    pub breakdown: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Projection {
    pub year: u32,
    pub property_value: f64,
    pub loan_balance: f64,
    pub weekly_rent: f64,
    pub rental_income: f64,
    pub annual_interest: f64,
    pub taxable_amount: f64,
    pub tax_return: f64,
    pub net_cash_flow: f64,
    pub spent: f64,
    pub equity: f64,
    pub returns: f64,
    pub roi: f64,
}

/// Inputs for one property plan. Percentages are stored as percent values
/// (`5.0` means 5%), money in whole currency units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyData {
    pub property_value: Option<f64>,
    pub deposit: Option<f64>,
    pub stamp_duty: Option<f64>,
    pub rental_growth: Option<f64>,
    pub capital_growth: Option<f64>,
    /// Annual strata levies.
    pub strata_fees: Option<f64>,
    pub weekly_rent: Option<f64>,
    /// Marginal income tax rate applied to rental profit or loss.
    pub tax_rate: Option<f64>,
    pub property_type: PropertyType,
    pub state: AustralianState,
    pub first_home_buyer: bool,
    pub is_living_here: bool,
    pub is_brand_new: bool,
    pub loan: LoanDetails,
    pub expenses: Expenses,
    /// Derived from the other fields, so never read back from input.
    #[serde(skip_deserializing)]
    pub projections: Vec<Projection>,
}

impl Default for PropertyData {
    fn default() -> Self {
        Self {
            property_value: None,
            deposit: None,
            stamp_duty: None,
            rental_growth: Some(3.0),
            capital_growth: Some(5.0),
            strata_fees: None,
            weekly_rent: None,
            tax_rate: Some(32.5),
            property_type: PropertyType::default(),
            state: AustralianState::default(),
            first_home_buyer: false,
            is_living_here: false,
            is_brand_new: false,
            loan: LoanDetails::default(),
            expenses: Expenses::default(),
            projections: Vec::new(),
        }
    }
}

impl PropertyData {
    /// Replaces `projections` with the ones derived from the other fields.
    pub fn with_projections(mut self) -> Self {
        self.projections = compute_projections(&self);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    pub data: PropertyData,
    pub created_at: DateTime<Utc>,
}

impl Scenario {
    pub fn new(id: ScenarioId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            data: PropertyData::default().with_projections(),
            created_at,
        }
    }

    pub fn projection(&self, year: u32) -> Option<&Projection> {
        self.data.projections.iter().find(|p| p.year == year)
    }
}

/// Top-level fields to replace on an existing scenario. `data` is swapped
/// wholesale, never merged field by field.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioPatch {
    pub name: Option<String>,
    pub data: Option<PropertyData>,
}

impl ScenarioPatch {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            data: None,
        }
    }

    pub fn replace_data(data: PropertyData) -> Self {
        Self {
            name: None,
            data: Some(data),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.data.is_none()
    }
}
