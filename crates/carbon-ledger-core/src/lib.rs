use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::macros::format_description;
use time::{Date, Time};

mod import;
pub mod reference;

pub use import::{
    coerce_rows, decode_document_row, missing_columns, ImportRow, EMISSIONS_COLUMN,
    REQUIRED_COLUMNS,
};

pub const DEFAULT_BUSINESS_UNIT: &str = "Corporate";
pub const DEFAULT_PROJECT: &str = "Not Applicable";
pub const DEFAULT_COUNTRY: &str = "Bangladesh";

const KG_PER_TONNE: f64 = 1000.0;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("index error: position {index} is out of range for a ledger of {len} records")]
    Index { index: usize, len: usize },
    #[error("schema error: missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error("persistence error: {0}")]
    Persistence(String),
}

fn normalize_label(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '_' && *ch != '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Scope {
    #[serde(rename = "Scope 1")]
    Scope1,
    #[serde(rename = "Scope 2")]
    Scope2,
    #[serde(rename = "Scope 3")]
    Scope3,
}

impl Scope {
    pub const ALL: [Self; 3] = [Self::Scope1, Self::Scope2, Self::Scope3];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scope1 => "Scope 1",
            Self::Scope2 => "Scope 2",
            Self::Scope3 => "Scope 3",
        }
    }

    /// Accepts the persisted label (`Scope 2`) as well as loose operator spellings
    /// such as `scope2`, `scope-2` or a bare `2`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_label(value).as_str() {
            "scope1" | "1" => Some(Self::Scope1),
            "scope2" | "2" => Some(Self::Scope2),
            "scope3" | "3" => Some(Self::Scope3),
            _ => None,
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Scope1 => "Direct emissions from owned sources (generators, vehicles, boilers)",
            Self::Scope2 => "Indirect emissions from purchased electricity from Bangladesh grid",
            Self::Scope3 => "Value chain emissions (transport, materials, waste, business travel)",
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum DataQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl DataQuality {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_label(value).as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum VerificationStatus {
    #[default]
    Unverified,
    #[serde(rename = "Internally Verified")]
    InternallyVerified,
    #[serde(rename = "Third-Party Verified")]
    ThirdPartyVerified,
    Audited,
}

impl VerificationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unverified => "Unverified",
            Self::InternallyVerified => "Internally Verified",
            Self::ThirdPartyVerified => "Third-Party Verified",
            Self::Audited => "Audited",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match normalize_label(value).as_str() {
            "unverified" => Some(Self::Unverified),
            "internallyverified" => Some(Self::InternallyVerified),
            "thirdpartyverified" => Some(Self::ThirdPartyVerified),
            "audited" => Some(Self::Audited),
            _ => None,
        }
    }
}

/// Stored emissions amount in kgCO2e.
///
/// Documents written by older tooling can carry a non-numeric value here; those
/// are kept verbatim and count as zero in every aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RecordedAmount {
    Numeric(f64),
    Unparsed(Value),
}

impl Default for RecordedAmount {
    fn default() -> Self {
        Self::Unparsed(Value::Null)
    }
}

impl RecordedAmount {
    #[must_use]
    pub fn as_kg(&self) -> f64 {
        match self {
            Self::Numeric(value) if value.is_finite() => *value,
            Self::Unparsed(Value::String(raw)) => {
                raw.trim().parse::<f64>().ok().filter(|value| value.is_finite()).unwrap_or(0.0)
            }
            Self::Numeric(_) | Self::Unparsed(_) => 0.0,
        }
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_business_unit() -> String {
    DEFAULT_BUSINESS_UNIT.to_string()
}

fn default_project() -> String {
    DEFAULT_PROJECT.to_string()
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionRecord {
    pub date: String,
    #[serde(default = "default_business_unit", deserialize_with = "nullable_string")]
    pub business_unit: String,
    #[serde(default = "default_project", deserialize_with = "nullable_string")]
    pub project: String,
    pub scope: Scope,
    pub category: String,
    pub activity: String,
    #[serde(default = "default_country", deserialize_with = "nullable_string")]
    pub country: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub facility: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub responsible_person: String,
    pub quantity: f64,
    pub unit: String,
    pub emission_factor: f64,
    #[serde(rename = "emissions_kgCO2e", default)]
    pub emissions_kgco2e: RecordedAmount,
    #[serde(default)]
    pub data_quality: DataQuality,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default, deserialize_with = "nullable_string")]
    pub notes: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmissionRecord {
    #[must_use]
    pub fn emissions_kg(&self) -> f64 {
        self.emissions_kgco2e.as_kg()
    }

    #[must_use]
    pub fn derived_emissions(&self) -> f64 {
        derive_emissions(self.quantity, self.emission_factor)
    }

    #[must_use]
    pub fn calendar_date(&self) -> Option<Date> {
        parse_calendar_date(&self.date)
    }

    /// Calendar month of the record as `YYYY-MM`, or `None` when the date does not parse.
    #[must_use]
    pub fn month(&self) -> Option<String> {
        self.calendar_date()
            .and_then(|date| date.format(format_description!("[year]-[month]")).ok())
    }
}

/// One manually entered activity occurrence, before it becomes a ledger record.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionEntry {
    pub date: Date,
    pub scope: Scope,
    pub category: String,
    pub activity: String,
    pub quantity: f64,
    pub unit: String,
    pub emission_factor: f64,
    pub business_unit: String,
    pub project: String,
    pub country: String,
    pub facility: String,
    pub responsible_person: String,
    pub data_quality: DataQuality,
    pub verification_status: VerificationStatus,
    pub notes: String,
}

impl EmissionEntry {
    #[must_use]
    pub fn new(
        date: Date,
        scope: Scope,
        category: impl Into<String>,
        activity: impl Into<String>,
        quantity: f64,
        unit: impl Into<String>,
        emission_factor: f64,
    ) -> Self {
        Self {
            date,
            scope,
            category: category.into(),
            activity: activity.into(),
            quantity,
            unit: unit.into(),
            emission_factor,
            business_unit: DEFAULT_BUSINESS_UNIT.to_string(),
            project: DEFAULT_PROJECT.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            facility: String::new(),
            responsible_person: String::new(),
            data_quality: DataQuality::default(),
            verification_status: VerificationStatus::default(),
            notes: String::new(),
        }
    }

    /// Validate a manual entry before it is derived and appended.
    ///
    /// # Errors
    /// Returns [`LedgerError::Validation`] when quantity is not strictly positive, the
    /// factor is negative or non-finite, or a required text field is blank.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(LedgerError::Validation(format!(
                "quantity MUST be greater than zero, got {}",
                self.quantity
            )));
        }

        if !self.emission_factor.is_finite() || self.emission_factor < 0.0 {
            return Err(LedgerError::Validation(format!(
                "emission_factor MUST be a non-negative number, got {}",
                self.emission_factor
            )));
        }

        for (name, value) in
            [("category", &self.category), ("activity", &self.activity), ("unit", &self.unit)]
        {
            if value.trim().is_empty() {
                return Err(LedgerError::Validation(format!("{name} MUST be provided")));
            }
        }

        Ok(())
    }

    /// Validate the entry and turn it into a record with its derived emissions.
    ///
    /// # Errors
    /// Returns [`LedgerError::Validation`] under the same conditions as [`Self::validate`].
    pub fn into_record(self) -> Result<EmissionRecord, LedgerError> {
        self.validate()?;
        let emissions = derive_emissions(self.quantity, self.emission_factor);
        Ok(EmissionRecord {
            date: format_calendar_date(self.date),
            business_unit: self.business_unit,
            project: self.project,
            scope: self.scope,
            category: self.category,
            activity: self.activity,
            country: self.country,
            facility: self.facility,
            responsible_person: self.responsible_person,
            quantity: self.quantity,
            unit: self.unit,
            emission_factor: self.emission_factor,
            emissions_kgco2e: RecordedAmount::Numeric(emissions),
            data_quality: self.data_quality,
            verification_status: self.verification_status,
            notes: self.notes,
            extra: Map::new(),
        })
    }
}

/// Emissions in kgCO2e for `quantity` units of an activity at `factor` kgCO2e per unit.
#[must_use]
pub fn derive_emissions(quantity: f64, factor: f64) -> f64 {
    quantity * factor
}

#[must_use]
pub fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

#[must_use]
pub fn format_factor(value: f64) -> String {
    format!("{value:.4}")
}

#[must_use]
pub fn format_calendar_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]")).unwrap_or_else(|_| date.to_string())
}

fn parse_date_part(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .or_else(|_| {
            Date::parse(raw, format_description!("[year]/[month padding:none]/[day padding:none]"))
        })
        .or_else(|_| {
            Date::parse(raw, format_description!("[month padding:none]/[day padding:none]/[year]"))
        })
        .ok()
}

fn is_time_of_day(raw: &str) -> bool {
    Time::parse(raw, format_description!("[hour]:[minute]:[second]")).is_ok()
        || Time::parse(raw, format_description!("[hour]:[minute]:[second].[subsecond]")).is_ok()
        || Time::parse(raw, format_description!("[hour]:[minute]")).is_ok()
}

/// Parse the calendar date forms seen in ledger documents and import files:
/// `YYYY-MM-DD`, `YYYY/M/D`, `M/D/YYYY`, optionally followed by a `T` or space and
/// a time of day.
#[must_use]
pub fn parse_calendar_date(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    match trimmed.split_once(|ch: char| ch == 'T' || ch == ' ') {
        Some((date_part, time_part)) if is_time_of_day(time_part.trim()) => {
            parse_date_part(date_part)
        }
        Some(_) => None,
        None => parse_date_part(trimmed),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeTotal {
    pub scope: Scope,
    pub emissions_kgco2e: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryTotal {
    pub category: String,
    pub emissions_kgco2e: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyScopeTotal {
    pub month: String,
    pub scope: Scope,
    pub emissions_kgco2e: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmissionsSummary {
    pub total_kgco2e: f64,
    /// Headline carbon intensity: the total in tonnes CO2e.
    pub carbon_intensity_tco2e: f64,
    pub entry_count: usize,
    pub latest_date: Option<String>,
    pub by_scope: Vec<ScopeTotal>,
    pub by_category: Vec<CategoryTotal>,
}

#[must_use]
pub fn total_emissions(records: &[EmissionRecord]) -> f64 {
    records.iter().map(EmissionRecord::emissions_kg).sum()
}

/// Per-scope totals for the scopes present, in Scope 1, 2, 3 order.
#[must_use]
pub fn by_scope(records: &[EmissionRecord]) -> Vec<ScopeTotal> {
    let mut totals: BTreeMap<Scope, f64> = BTreeMap::new();
    for record in records {
        *totals.entry(record.scope).or_insert(0.0) += record.emissions_kg();
    }

    totals
        .into_iter()
        .map(|(scope, emissions_kgco2e)| ScopeTotal { scope, emissions_kgco2e })
        .collect()
}

/// Per-category totals sorted by amount descending; equal amounts keep first-seen order.
#[must_use]
pub fn by_category(records: &[EmissionRecord]) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = Vec::new();
    let mut positions: BTreeMap<&str, usize> = BTreeMap::new();

    for record in records {
        if let Some(&position) = positions.get(record.category.as_str()) {
            totals[position].emissions_kgco2e += record.emissions_kg();
            continue;
        }

        positions.insert(record.category.as_str(), totals.len());
        totals.push(CategoryTotal {
            category: record.category.clone(),
            emissions_kgco2e: record.emissions_kg(),
        });
    }

    totals.sort_by(|lhs, rhs| rhs.emissions_kgco2e.total_cmp(&lhs.emissions_kgco2e));
    totals
}

/// Totals per (`YYYY-MM`, scope) ordered by month then scope. Records whose date
/// does not parse are left out of this view.
#[must_use]
pub fn by_month_and_scope(records: &[EmissionRecord]) -> Vec<MonthlyScopeTotal> {
    let mut totals: BTreeMap<(String, Scope), f64> = BTreeMap::new();
    for record in records {
        let Some(month) = record.month() else {
            continue;
        };
        *totals.entry((month, record.scope)).or_insert(0.0) += record.emissions_kg();
    }

    totals
        .into_iter()
        .map(|((month, scope), emissions_kgco2e)| MonthlyScopeTotal {
            month,
            scope,
            emissions_kgco2e,
        })
        .collect()
}

#[must_use]
pub fn summarize(records: &[EmissionRecord]) -> EmissionsSummary {
    let total_kgco2e = total_emissions(records);
    EmissionsSummary {
        total_kgco2e,
        carbon_intensity_tco2e: total_kgco2e / KG_PER_TONNE,
        entry_count: records.len(),
        latest_date: records
            .iter()
            .filter_map(EmissionRecord::calendar_date)
            .max()
            .map(format_calendar_date),
        by_scope: by_scope(records),
        by_category: by_category(records),
    }
}
