//! Closed registry of processing configurations.
//!
//! Each upstream export format has one [`ProcessingConfig`], selected by a
//! [`ConfigKey`]. Business constants live here as named values.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use clap::ValueEnum;

use crate::{adjacency::AdjacencyFormulaKind, sort::SortKey};

/// Unit price that marks an add-on duplicate charge in invoice detail exports.
pub const DUPLICATE_TRIGGER_PRICE: f64 = 1.6;

/// Fee amounts treated as the standard fee schedule.
pub const STANDARD_FEE_AMOUNTS: &[i64] = &[85, 140];

/// Risk type that precedes an add-on roadside charge.
pub const KEY_RISK_TYPE: &str = "KEY";

/// Risk type flagged when it directly follows [`KEY_RISK_TYPE`].
pub const ROADSIDE_RISK_TYPE: &str = "ROADSIDE";

/// Fields that together identify a claim; a row with all of them blank is
/// rejected.
pub const IDENTITY_COLUMNS: &[&str] = &["CLAIM #", "CONTACT", "INSURED"];

/// Column holding the invoiced amount.
pub const AMOUNT_COLUMN: &str = "AMOUNT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ConfigKey {
    /// Invoice detail export: duplicate VIN charges at the trigger price
    #[value(name = "default")]
    VinDuplicates,
    /// Roadside export: roadside charge directly after a key charge
    #[value(name = "custom_file_2")]
    RoadsideAfterKey,
    /// CPR invoice template: standard vs non-standard fee amounts
    #[value(name = "cpr_invoice")]
    CprInvoice,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 3] = [
        ConfigKey::VinDuplicates,
        ConfigKey::RoadsideAfterKey,
        ConfigKey::CprInvoice,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::VinDuplicates => "default",
            ConfigKey::RoadsideAfterKey => "custom_file_2",
            ConfigKey::CprInvoice => "cpr_invoice",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| anyhow!("Unknown processing config '{wanted}'"))
    }
}

/// Which columns an export carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportColumns {
    All,
    Only(Vec<String>),
}

/// Fee schedule for the predicate partition strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub amount_column: String,
    pub standard_amounts: Vec<i64>,
    pub identity_columns: Vec<String>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            amount_column: AMOUNT_COLUMN.to_string(),
            standard_amounts: STANDARD_FEE_AMOUNTS.to_vec(),
            identity_columns: IDENTITY_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Derive the adjacency flag and keep flagged rows.
    Adjacency(AdjacencyFormulaKind),
    /// Split rows by fee amount into standard and non-standard buckets.
    FeeSchedule(FeeSchedule),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    pub key: ConfigKey,
    pub required_columns: Vec<String>,
    pub sort_by: Vec<SortKey>,
    /// Columns coerced to numbers before sorting.
    pub numeric_columns: Vec<String>,
    pub strategy: Strategy,
    pub export_columns: ExportColumns,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub fn vin_duplicate_formula() -> AdjacencyFormulaKind {
    AdjacencyFormulaKind::ExactMatchWithTrigger {
        match_fields: owned(&["VIN", "TERM", "START DATE"]),
        trigger_field: "PRICE".to_string(),
        trigger_value: DUPLICATE_TRIGGER_PRICE,
    }
}

pub fn roadside_after_key_formula() -> AdjacencyFormulaKind {
    AdjacencyFormulaKind::CategoryTransition {
        match_fields: owned(&["FORM", "VIN"]),
        category_field: "PURE RISK TYPE".to_string(),
        previous: KEY_RISK_TYPE.to_string(),
        current: ROADSIDE_RISK_TYPE.to_string(),
    }
}

impl ProcessingConfig {
    pub fn for_key(key: ConfigKey) -> Self {
        match key {
            ConfigKey::VinDuplicates => ProcessingConfig {
                key,
                required_columns: owned(&["VIN", "TERM", "START DATE", "PRICE"]),
                sort_by: vec![SortKey::asc("VIN"), SortKey::desc("PRICE")],
                numeric_columns: owned(&["PRICE"]),
                strategy: Strategy::Adjacency(vin_duplicate_formula()),
                export_columns: ExportColumns::All,
            },
            ConfigKey::RoadsideAfterKey => ProcessingConfig {
                key,
                required_columns: owned(&["FORM", "VIN", "PURE RISK TYPE"]),
                sort_by: vec![
                    SortKey::asc("FORM"),
                    SortKey::asc("VIN"),
                    SortKey::asc("PURE RISK TYPE"),
                ],
                numeric_columns: Vec::new(),
                strategy: Strategy::Adjacency(roadside_after_key_formula()),
                export_columns: ExportColumns::All,
            },
            ConfigKey::CprInvoice => {
                let schedule = FeeSchedule::default();
                let mut required = schedule.identity_columns.clone();
                required.push(schedule.amount_column.clone());
                ProcessingConfig {
                    key,
                    required_columns: required,
                    sort_by: Vec::new(),
                    numeric_columns: Vec::new(),
                    strategy: Strategy::FeeSchedule(schedule),
                    export_columns: ExportColumns::All,
                }
            }
        }
    }

    pub fn describe_strategy(&self) -> String {
        match &self.strategy {
            Strategy::Adjacency(formula) => formula.describe(),
            Strategy::FeeSchedule(schedule) => format!(
                "{} in {:?} -> standardFee, else nonStandardFee",
                schedule.amount_column, schedule.standard_amounts
            ),
        }
    }
}
