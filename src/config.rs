use std::path::{Path, PathBuf};

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{DuesError, Result};

/// club configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClubConfig {
    pub club_name: String,
    pub currency_symbol: String,
    pub interest: InterestConfig,
    pub payments: PaymentConfig,
    pub receipts: ReceiptConfig,
}

/// late interest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestConfig {
    /// simple rate charged per full overdue month on the base amount
    pub monthly_rate: Rate,
    /// length of an overdue "month" in days
    pub days_per_month: u32,
    /// concept prefix that marks interest line items
    pub label_prefix: String,
    pub accrual_mode: AccrualMode,
}

/// what accrual does for an invoice that already carries interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualMode {
    /// never add interest once any interest item exists
    FirstOnly,
    /// add a top-up item for months accrued since the last recorded interest
    Incremental,
}

/// payment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// balance at or below which an invoice counts as paid
    pub settlement_tolerance: Money,
    pub receipt_prefix: String,
}

/// receipt document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptConfig {
    /// directory receipts are published into
    pub directory: PathBuf,
    /// url path under which `directory` is served
    pub public_prefix: String,
    pub file_extension: String,
}

impl Default for ClubConfig {
    fn default() -> Self {
        Self {
            club_name: "CLUB ATENAS".to_string(),
            currency_symbol: "S/".to_string(),
            interest: InterestConfig::default(),
            payments: PaymentConfig::default(),
            receipts: ReceiptConfig::default(),
        }
    }
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            monthly_rate: Rate::from_percentage(2),
            days_per_month: 30,
            label_prefix: "Late interest".to_string(),
            accrual_mode: AccrualMode::FirstOnly,
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            settlement_tolerance: Money::from_decimal(dec!(0.01)),
            receipt_prefix: "REC".to_string(),
        }
    }
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("public/receipts"),
            public_prefix: "/receipts".to_string(),
            file_extension: "txt".to_string(),
        }
    }
}

impl ClubConfig {
    /// parse from json, filling missing fields with defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ClubConfig =
            serde_json::from_str(json).map_err(|e| DuesError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| DuesError::InvalidConfiguration {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_json_str(&raw)
    }

    /// same configuration with receipts published under `directory`
    pub fn with_receipt_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.receipts.directory = directory.into();
        self
    }

    pub fn with_monthly_rate(mut self, rate: Rate) -> Self {
        self.interest.monthly_rate = rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interest.monthly_rate.is_negative() {
            return Err(DuesError::InvalidInterestRate {
                rate: self.interest.monthly_rate,
            });
        }
        if self.interest.days_per_month == 0 {
            return Err(DuesError::InvalidConfiguration {
                message: "days_per_month must be positive".to_string(),
            });
        }
        if self.interest.label_prefix.trim().is_empty() {
            return Err(DuesError::InvalidConfiguration {
                message: "interest label prefix must not be empty".to_string(),
            });
        }
        if self.payments.settlement_tolerance.is_negative() {
            return Err(DuesError::InvalidConfiguration {
                message: "settlement tolerance must not be negative".to_string(),
            });
        }
        if self.payments.receipt_prefix.trim().is_empty() {
            return Err(DuesError::InvalidConfiguration {
                message: "receipt prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
