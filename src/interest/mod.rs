pub mod accrual;

use chrono::{Datelike, NaiveDate};

use crate::config::InterestConfig;
use crate::decimal::{Money, Rate};
use crate::models::{Invoice, LineItem};

pub use accrual::{AccrualEngine, AccrualReport, AccruedInterest};

/// interest calculation result
#[derive(Debug, Clone, PartialEq)]
pub struct InterestCalculation {
    pub interest_amount: Money,
    pub monthly_rate: Rate,
    pub days_overdue: i64,
    pub months_overdue: u32,
    pub principal_base: Money,
}

/// late interest rules shared by the accrual engine and the statement builder
#[derive(Debug, Clone)]
pub struct InterestPolicy {
    monthly_rate: Rate,
    days_per_month: u32,
    label_prefix: String,
}

impl InterestPolicy {
    pub fn new(monthly_rate: Rate, days_per_month: u32, label_prefix: impl Into<String>) -> Self {
        Self {
            monthly_rate,
            days_per_month,
            label_prefix: label_prefix.into(),
        }
    }

    pub fn from_config(config: &InterestConfig) -> Self {
        Self::new(config.monthly_rate, config.days_per_month, config.label_prefix.clone())
    }

    pub fn monthly_rate(&self) -> Rate {
        self.monthly_rate
    }

    /// whole overdue months, `floor(days / days_per_month)`, never negative
    pub fn months_overdue(&self, due_date: NaiveDate, as_of: NaiveDate) -> u32 {
        let days = (as_of - due_date).num_days();
        let per_month = i64::from(self.days_per_month).max(1);
        u32::try_from((days / per_month).max(0)).unwrap_or(u32::MAX)
    }

    /// simple interest on the base amount, never on prior interest
    pub fn calculate(&self, base: Money, due_date: NaiveDate, as_of: NaiveDate) -> InterestCalculation {
        let months = self.months_overdue(due_date, as_of);
        InterestCalculation {
            interest_amount: base.simple_interest(self.monthly_rate, months),
            monthly_rate: self.monthly_rate,
            days_overdue: (as_of - due_date).num_days().max(0),
            months_overdue: months,
            principal_base: base,
        }
    }

    pub fn calculate_for(&self, invoice: &Invoice, as_of: NaiveDate) -> InterestCalculation {
        self.calculate(invoice.base_amount, invoice.due_date, as_of)
    }

    /// concept for a persisted interest item
    pub fn accrual_label(&self, months: u32) -> String {
        let unit = if months == 1 { "month" } else { "months" };
        format!("{} ({} x {} {})", self.label_prefix, self.monthly_rate, months, unit)
    }

    /// concept for an unpersisted statement projection
    pub fn projection_label(&self) -> String {
        format!("{} ({} monthly)", self.label_prefix, self.monthly_rate)
    }

    pub fn is_interest_concept(&self, concept: &str) -> bool {
        concept.starts_with(&self.label_prefix)
    }

    pub fn has_interest(&self, items: &[LineItem]) -> bool {
        items.iter().any(|item| self.is_interest_concept(&item.concept))
    }

    /// interest already recorded on an invoice
    pub fn recorded_interest(&self, items: &[LineItem]) -> Money {
        items
            .iter()
            .filter(|item| self.is_interest_concept(&item.concept))
            .map(|item| item.amount)
            .sum()
    }
}

impl Default for InterestPolicy {
    fn default() -> Self {
        Self::from_config(&InterestConfig::default())
    }
}

/// first day of the month containing `date`
pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
