//! Keeps a currency input and a percentage-of-base input consistent while
//! either one is edited, the base moves, or the owner pushes a new amount.
//!
//! Text is stored exactly as typed; canonical formatting only happens on blur
//! or when a field is derived from the other one. Amounts the engine emits are
//! remembered as the external watermark, so the owner echoing them back through
//! [`FieldSyncEngine::sync_external`] does not reformat text under the cursor.

use super::format::{
    amount_from_percent, format_currency, format_percent, parse_number, percent_of,
    round_currency, valid_base,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputMode {
    Currency,
    Percent,
}

/// Amount handed to the owner after an edit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Emit {
    Value(f64),
    Cleared,
}

impl Emit {
    pub fn value(self) -> Option<f64> {
        match self {
            Emit::Value(v) => Some(v),
            Emit::Cleared => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FieldSyncEngine {
    currency_text: String,
    percent_text: String,
    base_value: Option<f64>,
    // Outer `None` means no external value has been seen yet.
    last_external_value: Option<Option<f64>>,
    input_mode: Option<InputMode>,
}

impl FieldSyncEngine {
    pub fn new(base_value: Option<f64>) -> Self {
        Self {
            base_value,
            ..Self::default()
        }
    }

    pub fn currency_text(&self) -> &str {
        &self.currency_text
    }

    pub fn percent_text(&self) -> &str {
        &self.percent_text
    }

    pub fn base_value(&self) -> Option<f64> {
        self.base_value
    }

    pub fn input_mode(&self) -> Option<InputMode> {
        self.input_mode
    }

    pub fn on_currency_change(&mut self, text: &str) -> Option<Emit> {
        self.currency_text = text.to_string();
        self.input_mode = Some(InputMode::Currency);

        if text.trim().is_empty() {
            self.percent_text.clear();
            return Some(self.emit(None));
        }

        let amount = parse_number(text)?;
        if let Some(base) = valid_base(self.base_value) {
            self.percent_text = format_percent(percent_of(amount, base));
        }
        Some(self.emit(Some(amount)))
    }

    pub fn on_percent_change(&mut self, text: &str) -> Option<Emit> {
        self.percent_text = text.to_string();
        self.input_mode = Some(InputMode::Percent);

        let base = valid_base(self.base_value)?;
        if text.trim().is_empty() {
            self.currency_text.clear();
            return Some(self.emit(None));
        }

        let percent = parse_number(text)?;
        let amount = round_currency(amount_from_percent(percent, base));
        self.currency_text = format_currency(amount);
        Some(self.emit(Some(amount)))
    }

    pub fn on_currency_blur(&mut self) {
        if let Some(amount) = parse_number(&self.currency_text) {
            self.currency_text = format_currency(amount);
        }
    }

    pub fn on_percent_blur(&mut self) {
        if let Some(percent) = parse_number(&self.percent_text) {
            self.percent_text = format_percent(percent);
        }
    }

    /// Applies the owner's authoritative amount. Repeats of the last seen or
    /// emitted amount are ignored.
    pub fn sync_external(&mut self, value: Option<f64>) {
        if self.last_external_value == Some(value) {
            return;
        }
        self.last_external_value = Some(value);

        match value {
            Some(amount) => {
                self.currency_text = format_currency(amount);
                self.percent_text = match valid_base(self.base_value) {
                    Some(base) => format_percent(percent_of(amount, base)),
                    None => String::new(),
                };
            }
            None => {
                self.currency_text.clear();
                self.percent_text.clear();
            }
        }
    }

    /// Moves the base. The field the user edited last stays authoritative and
    /// the other one is derived from it; an amount re-derived from a percent
    /// is emitted so the owner can store it.
    pub fn set_base_value(&mut self, base_value: Option<f64>) -> Option<Emit> {
        if self.base_value == base_value {
            return None;
        }
        self.base_value = base_value;
        let base = valid_base(base_value)?;

        let has_currency = !self.currency_text.trim().is_empty();
        let has_percent = !self.percent_text.trim().is_empty();

        match self.input_mode {
            Some(InputMode::Percent) if has_percent => {
                let percent = parse_number(&self.percent_text)?;
                let amount = round_currency(amount_from_percent(percent, base));
                self.currency_text = format_currency(amount);
                Some(self.emit(Some(amount)))
            }
            _ if has_currency => {
                let amount = parse_number(&self.currency_text)?;
                self.percent_text = format_percent(percent_of(amount, base));
                None
            }
            _ => None,
        }
    }

    fn emit(&mut self, value: Option<f64>) -> Emit {
        self.last_external_value = Some(value);
        match value {
            Some(v) => Emit::Value(v),
            None => Emit::Cleared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert_eq, proptest};

    fn mounted(base: Option<f64>, value: Option<f64>) -> FieldSyncEngine {
        let mut engine = FieldSyncEngine::new(base);
        engine.sync_external(value);
        engine
    }

    #[test]
    fn committing_percent_derives_currency() {
        let mut engine = mounted(Some(500_000.0), None);
        let emitted = engine.on_percent_change("20");
        engine.on_percent_blur();

        assert_eq!(emitted, Some(Emit::Value(100_000.0)));
        assert_eq!(parse_number(engine.currency_text()), Some(100_000.0));
        assert_eq!(engine.percent_text(), "20");
    }

    #[test]
    fn committing_currency_derives_percent() {
        let mut engine = mounted(Some(500_000.0), None);
        let emitted = engine.on_currency_change("100000");
        engine.on_currency_blur();

        assert_eq!(emitted, Some(Emit::Value(100_000.0)));
        assert_eq!(engine.percent_text(), "20");
        assert_eq!(engine.currency_text(), "100,000");
    }

    #[test]
    fn typing_keeps_raw_text_until_blur() {
        let mut engine = mounted(Some(500_000.0), None);
        engine.on_currency_change("1000.");
        assert_eq!(engine.currency_text(), "1000.");
        engine.on_currency_blur();
        assert_eq!(engine.currency_text(), "1,000");
    }

    #[test]
    fn unparseable_text_is_kept_without_emitting() {
        let mut engine = mounted(Some(500_000.0), Some(50_000.0));
        assert_eq!(engine.on_currency_change("12abc"), None);
        assert_eq!(engine.currency_text(), "12abc");
        assert_eq!(engine.percent_text(), "10");
    }

    #[test]
    fn clearing_either_field_clears_the_other_and_emits_cleared() {
        let mut engine = mounted(Some(500_000.0), Some(100_000.0));
        assert_eq!(engine.on_currency_change(""), Some(Emit::Cleared));
        assert_eq!(engine.percent_text(), "");

        let mut engine = mounted(Some(500_000.0), Some(100_000.0));
        assert_eq!(engine.on_percent_change(""), Some(Emit::Cleared));
        assert_eq!(engine.currency_text(), "");
    }

    #[test]
    fn percent_edits_never_touch_currency_without_a_base() {
        for base in [None, Some(0.0), Some(-10.0)] {
            let mut engine = mounted(base, Some(40_000.0));
            assert_eq!(engine.on_percent_change("15"), None);
            assert_eq!(engine.on_percent_change(""), None);
            assert_eq!(engine.currency_text(), "40,000");
        }
    }

    #[test]
    fn currency_edits_without_a_base_leave_percent_as_typed() {
        let mut engine = mounted(None, None);
        engine.on_percent_change("12");
        assert_eq!(engine.on_currency_change("5000"), Some(Emit::Value(5_000.0)));
        assert_eq!(engine.percent_text(), "12");
    }

    #[test]
    fn external_value_overwrites_both_fields() {
        let mut engine = mounted(Some(400_000.0), None);
        engine.sync_external(Some(80_000.0));
        assert_eq!(engine.currency_text(), "80,000");
        assert_eq!(engine.percent_text(), "20");

        engine.sync_external(None);
        assert_eq!(engine.currency_text(), "");
        assert_eq!(engine.percent_text(), "");
    }

    #[test]
    fn external_value_without_base_clears_percent() {
        let mut engine = mounted(None, Some(10.0));
        assert_eq!(engine.currency_text(), "10");
        assert_eq!(engine.percent_text(), "");
    }

    #[test]
    fn echo_of_emitted_value_does_not_reformat_typing() {
        let mut engine = mounted(Some(500_000.0), None);
        let emitted = engine.on_currency_change("100000.5").and_then(Emit::value);
        engine.sync_external(emitted);
        assert_eq!(engine.currency_text(), "100000.5");
    }

    #[test]
    fn base_change_alone_does_not_resync_external_value() {
        let mut engine = mounted(Some(500_000.0), Some(100_000.0));
        engine.on_currency_change("100000");
        engine.set_base_value(Some(400_000.0));
        engine.sync_external(Some(100_000.0));

        assert_eq!(engine.currency_text(), "100000");
        assert_eq!(engine.percent_text(), "25");
    }

    #[test]
    fn base_change_keeps_percent_authoritative_after_percent_edit() {
        let mut engine = mounted(Some(500_000.0), None);
        engine.on_percent_change("20");
        let emitted = engine.set_base_value(Some(600_000.0));

        assert_eq!(emitted, Some(Emit::Value(120_000.0)));
        assert_eq!(engine.percent_text(), "20");
        assert_eq!(engine.currency_text(), "120,000");
    }

    #[test]
    fn base_change_keeps_currency_authoritative_by_default() {
        let mut engine = mounted(Some(500_000.0), Some(100_000.0));
        assert_eq!(engine.set_base_value(Some(800_000.0)), None);
        assert_eq!(engine.currency_text(), "100,000");
        assert_eq!(engine.percent_text(), "12.5");
    }

    #[test]
    fn invalid_base_change_leaves_fields_alone() {
        let mut engine = mounted(Some(500_000.0), None);
        engine.on_percent_change("20");
        assert_eq!(engine.set_base_value(Some(0.0)), None);
        assert_eq!(engine.percent_text(), "20");
        assert_eq!(engine.currency_text(), "100,000");
    }

    #[test]
    fn unchanged_base_is_ignored() {
        let mut engine = mounted(Some(500_000.0), None);
        engine.on_percent_change("20");
        assert_eq!(engine.set_base_value(Some(500_000.0)), None);
    }

    proptest! {
        #[test]
        fn prop_second_derivation_round_is_stable(
            base in 20_000u32..5_000_000,
            percent_bp in 0u32..10_000
        ) {
            let mut engine = mounted(Some(base as f64), None);
            engine.on_percent_change(&format_percent(percent_bp as f64 / 100.0));
            let first_currency = engine.currency_text().to_string();

            engine.on_currency_change(&first_currency);
            let derived_percent = engine.percent_text().to_string();
            prop_assert_eq!(&derived_percent, &format_percent(percent_bp as f64 / 100.0));

            engine.on_percent_change(&derived_percent);
            prop_assert_eq!(engine.currency_text(), first_currency.as_str());
        }
    }
}
