//! Side-by-side comparison table and its CSV rendering.

use thiserror::Error;

use crate::core::{Projection, Scenario};
use crate::core::format::{
    format_currency, format_optional_currency, format_optional_percent, format_percent,
};

pub type Accessor = fn(&Scenario) -> String;

/// One line of the comparison table. Accessors are pure functions of a
/// scenario snapshot.
#[derive(Clone, Copy)]
pub struct ExportRow {
    pub label: &'static str,
    pub accessor: Accessor,
    pub section: Option<&'static str>,
    pub highlight: bool,
}

impl ExportRow {
    const fn new(label: &'static str, section: &'static str, accessor: Accessor) -> Self {
        Self {
            label,
            accessor,
            section: Some(section),
            highlight: false,
        }
    }

    const fn highlighted(mut self) -> Self {
        self.highlight = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV buffer: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV output was not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

fn year_value(scenario: &Scenario, year: u32, pick: fn(&Projection) -> f64) -> String {
    scenario
        .projection(year)
        .map(|p| format_currency(pick(p)))
        .unwrap_or_else(|| "-".to_string())
}

fn year_roi(scenario: &Scenario, year: u32) -> String {
    scenario
        .projection(year)
        .map(|p| format!("{}%", format_percent(p.roi)))
        .unwrap_or_else(|| "-".to_string())
}

const PROPERTY: &str = "Property";
const LOAN: &str = "Loan";
const YEAR_1: &str = "Year 1";
const YEAR_10: &str = "Year 10";

pub fn comparison_rows() -> Vec<ExportRow> {
    vec![
        ExportRow::new("Property value", PROPERTY, |s| {
            format_optional_currency(s.data.property_value)
        })
        .highlighted(),
        ExportRow::new("Deposit", PROPERTY, |s| format_optional_currency(s.data.deposit)),
        ExportRow::new("Stamp duty", PROPERTY, |s| {
            format_optional_currency(s.data.stamp_duty)
        }),
        ExportRow::new("Weekly rent", PROPERTY, |s| {
            format_optional_currency(s.data.weekly_rent)
        }),
        ExportRow::new("Rental growth", PROPERTY, |s| {
            format_optional_percent(s.data.rental_growth)
        }),
        ExportRow::new("Capital growth", PROPERTY, |s| {
            format_optional_percent(s.data.capital_growth)
        }),
        ExportRow::new("Living here", PROPERTY, |s| yes_no(s.data.is_living_here)),
        ExportRow::new("Loan amount", LOAN, |s| {
            format_optional_currency(s.data.loan.amount)
        }),
        ExportRow::new("Interest rate", LOAN, |s| {
            format_optional_percent(s.data.loan.interest)
        }),
        ExportRow::new("Term (years)", LOAN, |s| {
            s.data
                .loan
                .term
                .map(format_percent)
                .unwrap_or_else(|| "-".to_string())
        }),
        ExportRow::new("Interest only", LOAN, |s| yes_no(s.data.loan.is_interest_only)),
        ExportRow::new("Rental income", YEAR_1, |s| {
            year_value(s, 1, |p| p.rental_income)
        }),
        ExportRow::new("Interest", YEAR_1, |s| year_value(s, 1, |p| p.annual_interest)),
        ExportRow::new("Tax return", YEAR_1, |s| year_value(s, 1, |p| p.tax_return)),
        ExportRow::new("Net cash flow", YEAR_1, |s| {
            year_value(s, 1, |p| p.net_cash_flow)
        })
        .highlighted(),
        ExportRow::new("Equity", YEAR_10, |s| year_value(s, 10, |p| p.equity)),
        ExportRow::new("Total spent", YEAR_10, |s| year_value(s, 10, |p| p.spent)),
        ExportRow::new("Returns", YEAR_10, |s| year_value(s, 10, |p| p.returns)),
        ExportRow::new("ROI", YEAR_10, |s| year_roi(s, 10)).highlighted(),
    ]
}

/// Header row of scenario names, then a section line whenever the section
/// changes, then one line per row. Highlighted rows get a trailing `*` on
/// their label.
pub fn render_csv(rows: &[ExportRow], scenarios: &[&Scenario]) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let mut header = vec![String::new()];
    header.extend(scenarios.iter().map(|s| s.name.clone()));
    writer.write_record(&header)?;

    let mut current_section = None;
    for row in rows {
        if row.section.is_some() && row.section != current_section {
            current_section = row.section;
            writer.write_record(row.section)?;
        }
        let label = if row.highlight {
            format!("{} *", row.label)
        } else {
            row.label.to_string()
        };
        let mut record = vec![label];
        record.extend(scenarios.iter().map(|s| (row.accessor)(s)));
        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::core::{PropertyData, ScenarioId};

    fn scenario(name: &str, value: f64, deposit: f64) -> Scenario {
        let mut scenario = Scenario::new(ScenarioId::generate(), name, Utc::now());
        let mut data = PropertyData::default();
        data.property_value = Some(value);
        data.deposit = Some(deposit);
        data.weekly_rent = Some(500.0);
        scenario.data = data.with_projections();
        scenario
    }

    #[test]
    fn csv_has_header_sections_and_one_column_per_scenario() {
        let a = scenario("Unit, Carlton", 600_000.0, 120_000.0);
        let b = scenario("House", 900_000.0, 180_000.0);
        let rows = comparison_rows();
        let csv = render_csv(&rows, &[&a, &b]).expect("csv should render");
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], ",\"Unit, Carlton\",House");
        assert_eq!(lines[1], "Property");
        assert_eq!(lines[2], "Property value *,\"600,000\",\"900,000\"");
        assert_eq!(lines[3], "Deposit,\"120,000\",\"180,000\"");
        assert!(lines.iter().any(|l| l.starts_with("ROI *,")));
        assert!(lines.contains(&"Loan"));
        assert!(lines.contains(&"Year 10"));
        assert!(lines.iter().any(|l| l.starts_with("Interest only,No,No")));
        assert_eq!(lines.len(), 1 + rows.len() + 4);
    }

    #[test]
    fn accessors_are_pure() {
        let a = scenario("A", 500_000.0, 100_000.0);
        for row in comparison_rows() {
            assert_eq!((row.accessor)(&a), (row.accessor)(&a), "{}", row.label);
        }
    }

    #[test]
    fn missing_projections_render_as_dashes() {
        let bare = Scenario::new(ScenarioId::generate(), "Empty", Utc::now());
        let rows = comparison_rows();
        let roi = rows.iter().find(|r| r.label == "ROI").expect("roi row");
        assert_eq!((roi.accessor)(&bare), "-");
        assert!(roi.highlight);
    }
}
