pub mod field_sync;
pub mod format;
mod projection;
mod store;
mod types;
mod validation;

pub use field_sync::{Emit, FieldSyncEngine, InputMode};
pub use projection::{PROJECTION_YEARS, compute_projections, monthly_repayment};
pub use store::{Action, ScenarioStore, StoreChange, StoreSnapshot};
pub use types::{
    AustralianState, Expenses, LoanDetails, Projection, PropertyData, PropertyType, Scenario,
    ScenarioId, ScenarioPatch,
};
pub use validation::{ErrorKey, ErrorMap, MAX_INTEREST_RATE, MAX_LOAN_TERM_YEARS, is_valid, validate};
