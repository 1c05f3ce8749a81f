use super::format::valid_base;
use super::types::{Projection, PropertyData};

pub const PROJECTION_YEARS: u32 = 30;

const WEEKS_PER_YEAR: f64 = 52.0;
const MONTHS_PER_YEAR: u32 = 12;

#[derive(Debug, Clone, Copy, Default)]
struct LoanYear {
    interest: f64,
    repayments: f64,
}

#[derive(Debug)]
struct LoanSchedule {
    balance: f64,
    monthly_rate: f64,
    monthly_payment: f64,
    interest_only: bool,
}

impl LoanSchedule {
    fn new(principal: f64, annual_rate_pct: f64, monthly_payment: f64, interest_only: bool) -> Self {
        Self {
            balance: principal.max(0.0),
            monthly_rate: annual_rate_pct.max(0.0) / 100.0 / MONTHS_PER_YEAR as f64,
            monthly_payment,
            interest_only,
        }
    }

    fn run_year(&mut self) -> LoanYear {
        let mut year = LoanYear::default();
        for _ in 0..MONTHS_PER_YEAR {
            if self.balance <= 0.0 {
                break;
            }
            let interest = self.balance * self.monthly_rate;
            let payment = if self.interest_only {
                interest
            } else {
                self.monthly_payment.min(self.balance + interest)
            };
            self.balance = (self.balance + interest - payment).max(0.0);
            year.interest += interest;
            year.repayments += payment;
        }
        year
    }
}

/// Monthly repayment for a loan. Principal-and-interest loans amortize over
/// `term_years`; interest-only loans pay the monthly interest.
pub fn monthly_repayment(
    principal: f64,
    annual_rate_pct: f64,
    term_years: f64,
    interest_only: bool,
) -> f64 {
    if principal <= 0.0 {
        return 0.0;
    }
    let rate = annual_rate_pct.max(0.0) / 100.0 / MONTHS_PER_YEAR as f64;
    if interest_only {
        return principal * rate;
    }
    let months = (term_years.max(0.0) * MONTHS_PER_YEAR as f64).round();
    if months < 1.0 {
        return principal;
    }
    if rate == 0.0 {
        return principal / months;
    }
    principal * rate / (1.0 - (1.0 + rate).powf(-months))
}

fn loan_principal(data: &PropertyData, property_value: f64, deposit: f64) -> f64 {
    data.loan
        .amount
        .filter(|a| a.is_finite())
        .unwrap_or(property_value - deposit)
        .max(0.0)
}

fn upfront_cost(data: &PropertyData, deposit: f64) -> f64 {
    deposit + data.stamp_duty.unwrap_or(0.0).max(0.0) + data.expenses.one_time_total.max(0.0)
}

/// Year-by-year outcome of holding the property. Returns no rows until both
/// the property value and the deposit are known.
pub fn compute_projections(data: &PropertyData) -> Vec<Projection> {
    let (Some(purchase_price), Some(deposit)) = (
        valid_base(data.property_value),
        data.deposit.filter(|d| d.is_finite() && *d >= 0.0),
    ) else {
        return Vec::new();
    };

    let principal = loan_principal(data, purchase_price, deposit);
    let rate = data.loan.interest.unwrap_or(0.0);
    let term = data.loan.term.unwrap_or(PROJECTION_YEARS as f64);
    let payment = data
        .loan
        .monthly_mortgage
        .filter(|m| m.is_finite() && *m > 0.0)
        .unwrap_or_else(|| monthly_repayment(principal, rate, term, data.loan.is_interest_only));
    let mut loan = LoanSchedule::new(principal, rate, payment, data.loan.is_interest_only);

    let rental_growth = data.rental_growth.unwrap_or(0.0) / 100.0;
    let capital_growth = data.capital_growth.unwrap_or(0.0) / 100.0;
    let tax_rate = data.tax_rate.unwrap_or(0.0).clamp(0.0, 100.0) / 100.0;
    let holding_costs =
        data.strata_fees.unwrap_or(0.0).max(0.0) + data.expenses.ongoing_total.max(0.0);
    let upfront = upfront_cost(data, deposit);

    let mut weekly_rent = data.weekly_rent.unwrap_or(0.0).max(0.0);
    let mut property_value = purchase_price;
    let mut cumulative_cash_flow = 0.0;
    let mut projections = Vec::with_capacity(PROJECTION_YEARS as usize);

    for year in 1..=PROJECTION_YEARS {
        let loan_year = loan.run_year();
        property_value *= 1.0 + capital_growth;

        let rental_income = if data.is_living_here {
            0.0
        } else {
            weekly_rent * WEEKS_PER_YEAR
        };
        let taxable_amount = rental_income - loan_year.interest - holding_costs;
        let tax_return = if data.is_living_here {
            0.0
        } else {
            -taxable_amount * tax_rate
        };
        let net_cash_flow = rental_income - loan_year.repayments - holding_costs + tax_return;
        cumulative_cash_flow += net_cash_flow;

        let spent = upfront - cumulative_cash_flow;
        let equity = property_value - loan.balance;
        let returns = equity - spent;
        let roi = if spent > 0.0 {
            returns / spent * 100.0
        } else {
            0.0
        };

        projections.push(Projection {
            year,
            property_value,
            loan_balance: loan.balance,
            weekly_rent,
            rental_income,
            annual_interest: loan_year.interest,
            taxable_amount,
            tax_return,
            net_cash_flow,
            spent,
            equity,
            returns,
            roi,
        });

        weekly_rent *= 1.0 + rental_growth;
    }

    if !projections.iter().all(is_finite) {
        return Vec::new();
    }
    projections
}

fn is_finite(p: &Projection) -> bool {
    [
        p.property_value,
        p.loan_balance,
        p.weekly_rent,
        p.rental_income,
        p.annual_interest,
        p.taxable_amount,
        p.tax_return,
        p.net_cash_flow,
        p.spent,
        p.equity,
        p.returns,
        p.roi,
    ]
    .iter()
    .all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected} +/- {tol}, got {actual}"
        );
    }

    fn sample_data() -> PropertyData {
        let mut data = PropertyData::default();
        data.property_value = Some(600_000.0);
        data.deposit = Some(120_000.0);
        data.stamp_duty = Some(22_000.0);
        data.weekly_rent = Some(550.0);
        data.rental_growth = Some(3.0);
        data.capital_growth = Some(5.0);
        data.strata_fees = Some(2_400.0);
        data.tax_rate = Some(32.5);
        data.loan.interest = Some(6.0);
        data.loan.term = Some(30.0);
        data.expenses.one_time_total = 3_000.0;
        data.expenses.ongoing_total = 4_000.0;
        data
    }

    #[test]
    fn missing_value_or_deposit_yields_no_rows() {
        let mut data = sample_data();
        data.property_value = None;
        assert!(compute_projections(&data).is_empty());

        let mut data = sample_data();
        data.deposit = None;
        assert!(compute_projections(&data).is_empty());
    }

    #[test]
    fn overflowing_inputs_yield_no_rows() {
        let mut data = sample_data();
        data.property_value = Some(1e308);
        data.deposit = Some(1_000.0);
        assert!(compute_projections(&data).is_empty());

        let mut data = sample_data();
        data.weekly_rent = Some(f64::MAX);
        assert!(compute_projections(&data).is_empty());
    }

    #[test]
    fn monthly_repayment_matches_annuity_formula() {
        assert_approx_tol(monthly_repayment(480_000.0, 6.0, 30.0, false), 2_877.84, 0.01);
        assert_approx(monthly_repayment(480_000.0, 6.0, 30.0, true), 2_400.0);
        assert_approx(monthly_repayment(120_000.0, 0.0, 10.0, false), 1_000.0);
        assert_approx(monthly_repayment(0.0, 6.0, 30.0, false), 0.0);
        assert_approx(monthly_repayment(50_000.0, 6.0, 0.0, false), 50_000.0);
    }

    #[test]
    fn first_year_cash_flow_accounting() {
        let data = sample_data();
        let rows = compute_projections(&data);
        assert_eq!(rows.len(), PROJECTION_YEARS as usize);

        let first = &rows[0];
        assert_eq!(first.year, 1);
        assert_approx(first.weekly_rent, 550.0);
        assert_approx(first.rental_income, 550.0 * 52.0);
        assert_approx(first.property_value, 630_000.0);

        let holding = 2_400.0 + 4_000.0;
        assert_approx(
            first.taxable_amount,
            first.rental_income - first.annual_interest - holding,
        );
        assert_approx(first.tax_return, -first.taxable_amount * 0.325);
        assert_approx(first.spent, 120_000.0 + 22_000.0 + 3_000.0 - first.net_cash_flow);
        assert_approx(first.equity, first.property_value - first.loan_balance);
        assert_approx(first.returns, first.equity - first.spent);
        assert!(first.loan_balance < 480_000.0);
    }

    #[test]
    fn rent_grows_year_on_year() {
        let rows = compute_projections(&sample_data());
        assert_approx(rows[1].weekly_rent, 550.0 * 1.03);
    }

    #[test]
    fn interest_only_keeps_balance_flat() {
        let mut data = sample_data();
        data.loan.is_interest_only = true;
        let rows = compute_projections(&data);
        assert_approx(rows[0].loan_balance, 480_000.0);
        assert_approx(rows[9].loan_balance, 480_000.0);
        assert_approx(rows[0].annual_interest, 28_800.0);
    }

    #[test]
    fn owner_occupier_has_no_rent_or_tax_return() {
        let mut data = sample_data();
        data.is_living_here = true;
        let rows = compute_projections(&data);
        assert_approx(rows[0].rental_income, 0.0);
        assert_approx(rows[0].tax_return, 0.0);
        assert!(rows[0].net_cash_flow < 0.0);
    }

    #[test]
    fn explicit_loan_amount_and_repayment_override_derived_values() {
        let mut data = sample_data();
        data.loan.amount = Some(400_000.0);
        data.loan.monthly_mortgage = Some(3_000.0);
        let rows = compute_projections(&data);
        assert_approx(
            rows[0].annual_interest + (400_000.0 - rows[0].loan_balance),
            36_000.0,
        );
    }

    #[test]
    fn loan_is_repaid_by_end_of_term() {
        let mut data = sample_data();
        data.loan.term = Some(10.0);
        let rows = compute_projections(&data);
        assert_approx_tol(rows[9].loan_balance, 0.0, 1e-3);
        assert_approx(rows[10].annual_interest, 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_rows_are_finite_and_balances_never_grow(
            value in 100_000u32..3_000_000,
            deposit_pct in 5u32..100,
            rate_bp in 0u32..2_000,
            term in 1u32..31,
            rent in 0u32..2_000,
            interest_only in proptest::bool::ANY
        ) {
            let mut data = sample_data();
            data.property_value = Some(value as f64);
            data.deposit = Some(value as f64 * deposit_pct as f64 / 100.0);
            data.loan.interest = Some(rate_bp as f64 / 100.0);
            data.loan.term = Some(term as f64);
            data.loan.is_interest_only = interest_only;
            data.weekly_rent = Some(rent as f64);

            let rows = compute_projections(&data);
            prop_assert_eq!(rows.len(), PROJECTION_YEARS as usize);
            let mut previous_balance = f64::INFINITY;
            for row in &rows {
                for v in [row.loan_balance, row.equity, row.spent, row.roi, row.net_cash_flow] {
                    prop_assert!(v.is_finite());
                }
                prop_assert!(row.loan_balance >= 0.0);
                prop_assert!(row.loan_balance <= previous_balance + 1e-6);
                previous_balance = row.loan_balance;
            }
        }
    }
}
