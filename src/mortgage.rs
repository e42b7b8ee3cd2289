use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use tracing::{debug, info};

use crate::error::{ValidationError, ValidationErrors};

/// Highest annual rate, in percent, the estimator accepts.
pub const MAX_INTEREST_RATE_PERCENT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MortgageField {
    HomePrice,
    DownPayment,
    LoanTerm,
    InterestRate,
    PropertyTax,
    HomeInsurance,
    Pmi,
}

impl MortgageField {
    pub const ALL: [MortgageField; 7] = [
        MortgageField::HomePrice,
        MortgageField::DownPayment,
        MortgageField::LoanTerm,
        MortgageField::InterestRate,
        MortgageField::PropertyTax,
        MortgageField::HomeInsurance,
        MortgageField::Pmi,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MortgageField::HomePrice => "Home Price",
            MortgageField::DownPayment => "Down Payment",
            MortgageField::LoanTerm => "Loan Term",
            MortgageField::InterestRate => "Interest Rate",
            MortgageField::PropertyTax => "Property Tax (annual)",
            MortgageField::HomeInsurance => "Home Insurance (annual)",
            MortgageField::Pmi => "PMI (monthly)",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LoanTerm {
    Fifteen,
    Twenty,
    TwentyFive,
    #[default]
    Thirty,
}

impl LoanTerm {
    pub const ALL: [LoanTerm; 4] = [
        LoanTerm::Fifteen,
        LoanTerm::Twenty,
        LoanTerm::TwentyFive,
        LoanTerm::Thirty,
    ];

    pub fn years(self) -> u32 {
        match self {
            LoanTerm::Fifteen => 15,
            LoanTerm::Twenty => 20,
            LoanTerm::TwentyFive => 25,
            LoanTerm::Thirty => 30,
        }
    }

    pub fn payments(self) -> u32 {
        self.years() * 12
    }

    pub fn next(self) -> Self {
        match self {
            LoanTerm::Fifteen => LoanTerm::Twenty,
            LoanTerm::Twenty => LoanTerm::TwentyFive,
            LoanTerm::TwentyFive => LoanTerm::Thirty,
            LoanTerm::Thirty => LoanTerm::Fifteen,
        }
    }
}

/// Raw text of the calculator form, exactly as typed.
#[derive(Debug, Clone, Default)]
pub struct MortgageForm {
    pub home_price: String,
    pub down_payment: String,
    pub loan_term: LoanTerm,
    pub interest_rate: String,
    pub property_tax: String,
    pub home_insurance: String,
    pub pmi: String,
}

impl MortgageForm {
    pub fn text(&self, field: MortgageField) -> &str {
        match field {
            MortgageField::HomePrice => &self.home_price,
            MortgageField::DownPayment => &self.down_payment,
            MortgageField::LoanTerm => "",
            MortgageField::InterestRate => &self.interest_rate,
            MortgageField::PropertyTax => &self.property_tax,
            MortgageField::HomeInsurance => &self.home_insurance,
            MortgageField::Pmi => &self.pmi,
        }
    }

    fn text_mut(&mut self, field: MortgageField) -> Option<&mut String> {
        match field {
            MortgageField::HomePrice => Some(&mut self.home_price),
            MortgageField::DownPayment => Some(&mut self.down_payment),
            MortgageField::LoanTerm => None,
            MortgageField::InterestRate => Some(&mut self.interest_rate),
            MortgageField::PropertyTax => Some(&mut self.property_tax),
            MortgageField::HomeInsurance => Some(&mut self.home_insurance),
            MortgageField::Pmi => Some(&mut self.pmi),
        }
    }

    /// Home price, down payment and rate all have text in them.
    pub fn key_fields_filled(&self) -> bool {
        [&self.home_price, &self.down_payment, &self.interest_rate]
            .iter()
            .all(|text| !text.trim().is_empty())
    }
}

/// Validated loan parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoanInput {
    pub home_price: f64,
    pub down_payment: f64,
    pub loan_term: LoanTerm,
    pub annual_interest_rate_percent: f64,
    pub annual_property_tax: f64,
    pub annual_home_insurance: f64,
    pub monthly_pmi: f64,
}

impl LoanInput {
    pub fn loan_amount(&self) -> f64 {
        self.home_price - self.down_payment
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_interest_rate_percent / 100.0 / 12.0
    }
}

/// Monthly payment split into the parts shown in the breakdown panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaymentBreakdown {
    pub principal_and_interest: f64,
    pub property_tax: f64,
    pub home_insurance: f64,
    pub pmi: f64,
}

impl PaymentBreakdown {
    pub fn total(&self) -> f64 {
        self.principal_and_interest + self.property_tax + self.home_insurance + self.pmi
    }

    pub fn items(&self) -> [(&'static str, f64); 4] {
        [
            ("Principal & Interest", self.principal_and_interest),
            ("Property Tax", self.property_tax),
            ("Home Insurance", self.home_insurance),
            ("PMI", self.pmi),
        ]
    }

    /// Fraction of the total monthly payment, 0 when nothing is owed.
    pub fn share(&self, amount: f64) -> f64 {
        let total = self.total();
        if total > 0.0 {
            amount / total
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoanResult {
    pub loan_amount: f64,
    pub monthly_principal_and_interest: f64,
    pub total_monthly_payment: f64,
    pub total_interest_over_term: f64,
    pub total_paid_over_term: f64,
    pub breakdown: PaymentBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmortizationRow {
    pub month: u32,
    pub interest: f64,
    pub principal: f64,
    pub balance: f64,
}

/// Lenient number parsing: surrounding whitespace, `$` and thousands
/// separators are ignored. Anything else that does not parse is `None`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn validate(form: &MortgageForm) -> Result<LoanInput, ValidationErrors<MortgageField>> {
    let mut errors = ValidationErrors::default();

    let home_price = match parse_amount(&form.home_price) {
        Some(v) if v > 0.0 => v,
        _ => {
            errors.insert(MortgageField::HomePrice, ValidationError::InvalidHomePrice);
            0.0
        }
    };

    let down_payment = match parse_amount(&form.down_payment) {
        Some(v) if v < 0.0 => {
            errors.insert(MortgageField::DownPayment, ValidationError::InvalidDownPayment);
            0.0
        }
        Some(v) => {
            if home_price > 0.0 && v > home_price {
                errors.insert(
                    MortgageField::DownPayment,
                    ValidationError::DownPaymentExceedsPrice,
                );
            }
            v
        }
        None => {
            errors.insert(MortgageField::DownPayment, ValidationError::InvalidDownPayment);
            0.0
        }
    };

    let annual_interest_rate_percent = match parse_amount(&form.interest_rate) {
        Some(v) if (0.0..=MAX_INTEREST_RATE_PERCENT).contains(&v) => v,
        _ => {
            errors.insert(MortgageField::InterestRate, ValidationError::InvalidInterestRate);
            0.0
        }
    };

    let mut escrow = |field: MortgageField| -> f64 {
        let value = parse_amount(form.text(field)).unwrap_or(0.0);
        if value < 0.0 {
            errors.insert(field, ValidationError::NegativeAmount);
            0.0
        } else {
            value
        }
    };
    let annual_property_tax = escrow(MortgageField::PropertyTax);
    let annual_home_insurance = escrow(MortgageField::HomeInsurance);
    let monthly_pmi = escrow(MortgageField::Pmi);

    errors.into_result(LoanInput {
        home_price,
        down_payment,
        loan_term: form.loan_term,
        annual_interest_rate_percent,
        annual_property_tax,
        annual_home_insurance,
        monthly_pmi,
    })
}

fn principal_and_interest(loan_amount: f64, monthly_rate: f64, num_payments: u32) -> f64 {
    // (1 + r)^n - 1, computed without losing r when it is tiny
    let growth_less_one = (num_payments as f64 * monthly_rate.ln_1p()).exp_m1();
    if monthly_rate > 0.0 && growth_less_one > 0.0 && growth_less_one.is_finite() {
        loan_amount * monthly_rate * (growth_less_one + 1.0) / growth_less_one
    } else {
        loan_amount / num_payments as f64
    }
}

pub fn compute_monthly_payment(input: &LoanInput) -> LoanResult {
    let loan_amount = input.loan_amount();
    let num_payments = input.loan_term.payments();
    let years = input.loan_term.years() as f64;

    let monthly_pi = principal_and_interest(loan_amount, input.monthly_rate(), num_payments);
    let total_paid = monthly_pi * num_payments as f64;
    let total_interest = total_paid - loan_amount;

    let breakdown = PaymentBreakdown {
        principal_and_interest: monthly_pi,
        property_tax: input.annual_property_tax / 12.0,
        home_insurance: input.annual_home_insurance / 12.0,
        pmi: input.monthly_pmi,
    };

    // Escrow is summed nominally over the term, not discounted.
    let total_paid_over_term = total_paid
        + input.annual_property_tax * years
        + input.annual_home_insurance * years
        + input.monthly_pmi * num_payments as f64;

    LoanResult {
        loan_amount,
        monthly_principal_and_interest: monthly_pi,
        total_monthly_payment: breakdown.total(),
        total_interest_over_term: total_interest,
        total_paid_over_term,
        breakdown,
    }
}

pub fn amortization_schedule(input: &LoanInput) -> Vec<AmortizationRow> {
    let monthly_rate = input.monthly_rate();
    let num_payments = input.loan_term.payments();
    let payment = principal_and_interest(input.loan_amount(), monthly_rate, num_payments);

    let mut rows = Vec::with_capacity(num_payments as usize);
    let mut remaining_balance = input.loan_amount();

    for month in 1..=num_payments {
        if remaining_balance <= 0.0 {
            break;
        }

        let interest = remaining_balance * monthly_rate;
        let mut principal = payment - interest;

        // Last payment absorbs rounding drift
        if principal > remaining_balance || month == num_payments {
            principal = remaining_balance;
        }

        remaining_balance -= principal;
        if remaining_balance.abs() < 1e-6 {
            remaining_balance = 0.0;
        }

        rows.push(AmortizationRow {
            month,
            interest,
            principal,
            balance: remaining_balance,
        });
    }

    rows
}

pub fn export_schedule_csv(path: &Path, input: &LoanInput, result: &LoanResult) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut file = BufWriter::new(file);

    writeln!(file, "Month,Interest,Principal,Balance")?;
    for row in amortization_schedule(input) {
        writeln!(
            file,
            "{},{:.2},{:.2},{:.2}",
            row.month, row.interest, row.principal, row.balance
        )?;
    }

    writeln!(file)?;
    writeln!(file, "Summary")?;
    writeln!(file, "Loan Amount,{:.2}", result.loan_amount)?;
    writeln!(file, "Principal & Interest,{:.2}", result.monthly_principal_and_interest)?;
    writeln!(file, "Total Monthly Payment,{:.2}", result.total_monthly_payment)?;
    writeln!(file, "Total Interest,{:.2}", result.total_interest_over_term)?;
    writeln!(file, "Total Paid Over Term,{:.2}", result.total_paid_over_term)?;
    file.flush()?;

    info!(path = %path.display(), "exported amortization schedule");
    Ok(())
}

/// Calculator state: the form, its field errors and the last good result.
#[derive(Debug, Clone, Default)]
pub struct MortgageEstimator {
    form: MortgageForm,
    errors: ValidationErrors<MortgageField>,
    input: Option<LoanInput>,
    result: Option<LoanResult>,
}

impl MortgageEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form(form: MortgageForm) -> Self {
        Self {
            form,
            ..Self::default()
        }
    }

    pub fn form(&self) -> &MortgageForm {
        &self.form
    }

    pub fn errors(&self) -> &ValidationErrors<MortgageField> {
        &self.errors
    }

    pub fn input(&self) -> Option<&LoanInput> {
        self.input.as_ref()
    }

    pub fn result(&self) -> Option<&LoanResult> {
        self.result.as_ref()
    }

    pub fn update_field(&mut self, field: MortgageField, value: &str) {
        if let Some(text) = self.form.text_mut(field) {
            text.clear();
            text.push_str(value);
            self.errors.remove(field);
        }
    }

    pub fn push_char(&mut self, field: MortgageField, c: char) {
        if let Some(text) = self.form.text_mut(field) {
            text.push(c);
            self.errors.remove(field);
        }
    }

    pub fn pop_char(&mut self, field: MortgageField) {
        if let Some(text) = self.form.text_mut(field) {
            text.pop();
            self.errors.remove(field);
        }
    }

    pub fn cycle_loan_term(&mut self) {
        self.form.loan_term = self.form.loan_term.next();
    }

    /// The calculate action is enabled once the three key fields have text.
    pub fn can_calculate(&self) -> bool {
        self.form.key_fields_filled()
    }

    /// Re-derives the result from the current form. Invalid input records
    /// field errors and leaves the previous result in place.
    pub fn recompute(&mut self) -> Option<&LoanResult> {
        if !self.can_calculate() {
            return self.result.as_ref();
        }

        match validate(&self.form) {
            Ok(input) => {
                let result = compute_monthly_payment(&input);
                debug!(
                    loan_amount = result.loan_amount,
                    monthly = result.total_monthly_payment,
                    "recomputed mortgage"
                );
                self.errors = ValidationErrors::default();
                self.input = Some(input);
                self.result = Some(result);
            }
            Err(errors) => {
                debug!(%errors, "mortgage input rejected");
                self.errors = errors;
            }
        }

        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn form(price: &str, down: &str, rate: &str) -> MortgageForm {
        MortgageForm {
            home_price: price.to_string(),
            down_payment: down.to_string(),
            interest_rate: rate.to_string(),
            ..MortgageForm::default()
        }
    }

    fn input(loan_amount: f64, rate: f64, term: LoanTerm) -> LoanInput {
        LoanInput {
            home_price: loan_amount,
            down_payment: 0.0,
            loan_term: term,
            annual_interest_rate_percent: rate,
            annual_property_tax: 0.0,
            annual_home_insurance: 0.0,
            monthly_pmi: 0.0,
        }
    }

    #[test]
    fn thirty_year_standard_payment() {
        let input = validate(&form("500000", "100000", "3.5")).unwrap();
        let result = compute_monthly_payment(&input);
        assert_eq!(result.loan_amount, 400_000.0);
        assert!((result.monthly_principal_and_interest - 1796.18).abs() < 0.01);
        assert!((result.total_interest_over_term - 246_625.0).abs() < 5.0);
    }

    #[test]
    fn full_down_payment_means_no_loan() {
        let input = validate(&form("100000", "100000", "5")).unwrap();
        let result = compute_monthly_payment(&input);
        assert_eq!(result.loan_amount, 0.0);
        assert_eq!(result.monthly_principal_and_interest, 0.0);
        assert_eq!(result.total_monthly_payment, 0.0);
        assert_eq!(result.total_interest_over_term, 0.0);
    }

    #[test]
    fn zero_rate_is_straight_line() {
        let input = validate(&form("360000", "0", "0")).unwrap();
        let result = compute_monthly_payment(&input);
        assert_eq!(result.monthly_principal_and_interest, 360000.0 / 360.0);
        assert_eq!(result.total_interest_over_term, 0.0);
    }

    #[test]
    fn escrow_is_added_monthly_and_summed_nominally() {
        let mut f = form("300000", "60000", "6");
        f.property_tax = "3,600".to_string();
        f.home_insurance = "1200".to_string();
        f.pmi = "$50".to_string();
        f.loan_term = LoanTerm::Fifteen;
        let input = validate(&f).unwrap();
        let result = compute_monthly_payment(&input);

        let escrow = 300.0 + 100.0 + 50.0;
        assert!((result.total_monthly_payment - result.monthly_principal_and_interest - escrow).abs() < 1e-9);

        let base = result.monthly_principal_and_interest * 180.0;
        let expected = base + 3600.0 * 15.0 + 1200.0 * 15.0 + 50.0 * 180.0;
        assert!((result.total_paid_over_term - expected).abs() < 1e-6);
        assert_eq!(result.breakdown.items()[1], ("Property Tax", 300.0));
    }

    #[test]
    fn validation_reports_each_field() {
        let errors = validate(&form("", "-1", "abc")).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.get(MortgageField::HomePrice),
            Some(&ValidationError::InvalidHomePrice)
        );
        assert_eq!(
            errors.get(MortgageField::DownPayment),
            Some(&ValidationError::InvalidDownPayment)
        );
        assert_eq!(
            errors.get(MortgageField::InterestRate),
            Some(&ValidationError::InvalidInterestRate)
        );
    }

    #[test]
    fn down_payment_above_price_is_rejected() {
        let errors = validate(&form("100000", "150000", "5")).unwrap_err();
        assert_eq!(
            errors.get(MortgageField::DownPayment),
            Some(&ValidationError::DownPaymentExceedsPrice)
        );
    }

    #[test]
    fn malformed_escrow_reads_as_zero() {
        let mut f = form("200000", "20000", "4");
        f.property_tax = "lots".to_string();
        let input = validate(&f).unwrap();
        assert_eq!(input.annual_property_tax, 0.0);

        f.pmi = "-10".to_string();
        let errors = validate(&f).unwrap_err();
        assert_eq!(errors.get(MortgageField::Pmi), Some(&ValidationError::NegativeAmount));
    }

    #[test]
    fn recompute_keeps_last_result_on_bad_input() {
        let mut estimator = MortgageEstimator::with_form(form("500000", "100000", "3.5"));
        let first = *estimator.recompute().unwrap();

        estimator.update_field(MortgageField::HomePrice, "-5");
        let kept = estimator.recompute().copied();
        assert_eq!(kept, Some(first));
        assert_eq!(
            estimator.errors().get(MortgageField::HomePrice),
            Some(&ValidationError::InvalidHomePrice)
        );

        estimator.pop_char(MortgageField::HomePrice);
        assert!(estimator.errors().get(MortgageField::HomePrice).is_none());
    }

    #[test]
    fn recompute_waits_for_key_fields() {
        let mut estimator = MortgageEstimator::new();
        estimator.update_field(MortgageField::HomePrice, "400000");
        estimator.update_field(MortgageField::InterestRate, "6");
        assert!(!estimator.can_calculate());
        assert!(estimator.recompute().is_none());
        assert!(estimator.errors().is_empty());
    }

    #[test]
    fn schedule_pays_off_loan() {
        let input = input(250_000.0, 5.0, LoanTerm::Twenty);
        let rows = amortization_schedule(&input);
        assert_eq!(rows.len(), 240);
        assert_eq!(rows.last().unwrap().balance, 0.0);
        let principal: f64 = rows.iter().map(|r| r.principal).sum();
        assert!((principal - 250_000.0).abs() < 1e-3);
    }

    #[test]
    fn export_writes_schedule_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.csv");
        let input = input(100_000.0, 4.0, LoanTerm::Fifteen);
        let result = compute_monthly_payment(&input);
        export_schedule_csv(&path, &input, &result).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Month,Interest,Principal,Balance\n1,333.33,"));
        assert!(text.contains("Loan Amount,100000.00"));
        assert_eq!(text.lines().filter(|l| l.starts_with("180,")).count(), 1);
    }

    #[test]
    fn rate_above_ceiling_is_rejected() {
        let errors = validate(&form("500000", "100000", "100000")).unwrap_err();
        assert_eq!(
            errors.get(MortgageField::InterestRate),
            Some(&ValidationError::InvalidInterestRate)
        );
        assert!(validate(&form("500000", "100000", "100")).is_ok());
    }

    #[test]
    fn vanishing_rate_stays_finite() {
        let input = validate(&form("500000", "100000", "0.0000000000000001")).unwrap();
        let result = compute_monthly_payment(&input);
        assert!(result.monthly_principal_and_interest.is_finite());
        assert!((result.monthly_principal_and_interest - 400_000.0 / 360.0).abs() < 1e-6);
        assert!(result.total_interest_over_term.abs() < 1e-3);

        let schedule = amortization_schedule(&input);
        assert_eq!(schedule.len(), 360);
        assert_eq!(schedule.last().unwrap().balance, 0.0);
    }

    #[test]
    fn ceiling_rate_stays_finite() {
        let input = validate(&form("500000", "100000", "100")).unwrap();
        let result = compute_monthly_payment(&input);
        assert!(result.monthly_principal_and_interest.is_finite());
        assert!(result.total_interest_over_term.is_finite());
        // interest alone on 400k at 100%/12
        assert!(result.monthly_principal_and_interest > 400_000.0 / 12.0);
    }

    fn any_rate() -> impl Strategy<Value = f64> {
        prop_oneof![
            Just(0.0),
            Just(1e-16),
            1e-15f64..1e-6,
            0.01f64..MAX_INTEREST_RATE_PERCENT,
            Just(MAX_INTEREST_RATE_PERCENT),
        ]
    }

    proptest! {
        #[test]
        fn totals_round_trip(loan in 0.0f64..5_000_000.0, rate in any_rate(), term_idx in 0usize..4) {
            let input = input(loan, rate, LoanTerm::ALL[term_idx]);
            let result = compute_monthly_payment(&input);
            prop_assert!(result.monthly_principal_and_interest.is_finite());
            prop_assert!(result.total_interest_over_term.is_finite());
            let n = input.loan_term.payments() as f64;
            let lhs = result.monthly_principal_and_interest * n;
            let rhs = result.loan_amount + result.total_interest_over_term;
            prop_assert!((lhs - rhs).abs() <= 1e-6 * lhs.abs().max(1.0));
        }

        #[test]
        fn compute_is_idempotent(loan in 0.0f64..2_000_000.0, rate in 0.0f64..15.0) {
            let input = input(loan, rate, LoanTerm::Thirty);
            prop_assert_eq!(compute_monthly_payment(&input), compute_monthly_payment(&input));
        }
    }
}
