use serde_json::{Map, Value};

use crate::{
    derive_emissions, format_calendar_date, parse_calendar_date, DataQuality, EmissionRecord,
    LedgerError, RecordedAmount, Scope, VerificationStatus, DEFAULT_BUSINESS_UNIT,
    DEFAULT_COUNTRY, DEFAULT_PROJECT,
};

/// One tabular import row keyed by column name.
pub type ImportRow = Map<String, Value>;

pub const REQUIRED_COLUMNS: [&str; 7] =
    ["date", "scope", "category", "activity", "quantity", "unit", "emission_factor"];

pub const EMISSIONS_COLUMN: &str = "emissions_kgCO2e";

const TEXT_COLUMNS: [(&str, &str); 6] = [
    ("business_unit", DEFAULT_BUSINESS_UNIT),
    ("project", DEFAULT_PROJECT),
    ("country", DEFAULT_COUNTRY),
    ("facility", ""),
    ("responsible_person", ""),
    ("notes", ""),
];

const ENUM_COLUMNS: [&str; 2] = ["data_quality", "verification_status"];

/// Required columns absent from at least one row, in canonical column order.
#[must_use]
pub fn missing_columns(rows: &[ImportRow]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|column| rows.iter().any(|row| !row.contains_key(**column)))
        .map(|column| (*column).to_string())
        .collect()
}

/// Coerce every import row into a record, all or nothing.
///
/// # Errors
/// Returns [`LedgerError::Schema`] when a required column is missing, and
/// [`LedgerError::Validation`] naming the first row (1-based) and column whose value
/// cannot be coerced.
pub fn coerce_rows(rows: &[ImportRow]) -> Result<Vec<EmissionRecord>, LedgerError> {
    let missing = missing_columns(rows);
    if !missing.is_empty() {
        return Err(LedgerError::Schema { missing });
    }

    rows.iter().enumerate().map(|(index, row)| coerce_row(index + 1, row)).collect()
}

fn invalid(row: usize, column: &str, expected: &str, value: &Value) -> LedgerError {
    LedgerError::Validation(format!("row {row}: column `{column}` MUST be {expected}, got {value}"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn finite_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn required<'a>(row: &'a ImportRow, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn coerce_row(row_number: usize, row: &ImportRow) -> Result<EmissionRecord, LedgerError> {
    let date_cell = required(row, "date");
    let date = parse_calendar_date(&cell_text(date_cell))
        .map(format_calendar_date)
        .ok_or_else(|| invalid(row_number, "date", "a calendar date", date_cell))?;

    let scope_cell = required(row, "scope");
    let scope = Scope::parse(&cell_text(scope_cell)).ok_or_else(|| {
        invalid(row_number, "scope", "one of Scope 1, Scope 2, Scope 3", scope_cell)
    })?;

    let quantity_cell = required(row, "quantity");
    let quantity = finite_number(quantity_cell)
        .ok_or_else(|| invalid(row_number, "quantity", "a finite number", quantity_cell))?;

    let factor_cell = required(row, "emission_factor");
    let emission_factor = finite_number(factor_cell)
        .ok_or_else(|| invalid(row_number, "emission_factor", "a finite number", factor_cell))?;

    let emissions_kgco2e = match row.get(EMISSIONS_COLUMN) {
        None => RecordedAmount::Numeric(derive_emissions(quantity, emission_factor)),
        Some(value) if is_blank(value) => {
            RecordedAmount::Numeric(derive_emissions(quantity, emission_factor))
        }
        Some(value) => finite_number(value)
            .map_or_else(|| RecordedAmount::Unparsed(value.clone()), RecordedAmount::Numeric),
    };

    let data_quality = match row.get("data_quality") {
        Some(value) if !is_blank(value) => DataQuality::parse(&cell_text(value))
            .ok_or_else(|| invalid(row_number, "data_quality", "one of Low, Medium, High", value))?,
        _ => DataQuality::default(),
    };

    let verification_status = match row.get("verification_status") {
        Some(value) if !is_blank(value) => VerificationStatus::parse(&cell_text(value))
            .ok_or_else(|| {
                invalid(row_number, "verification_status", "a known verification status", value)
            })?,
        _ => VerificationStatus::default(),
    };

    let text = |column: &str| -> String {
        let fallback = TEXT_COLUMNS
            .iter()
            .find(|(name, _)| *name == column)
            .map_or("", |(_, fallback)| *fallback);
        match row.get(column) {
            Some(value) if !value.is_null() => cell_text(value),
            _ => fallback.to_string(),
        }
    };

    let extra = row
        .iter()
        .filter(|(key, _)| !is_known_column(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect::<Map<_, _>>();

    Ok(EmissionRecord {
        date,
        business_unit: text("business_unit"),
        project: text("project"),
        scope,
        category: cell_text(required(row, "category")),
        activity: cell_text(required(row, "activity")),
        country: text("country"),
        facility: text("facility"),
        responsible_person: text("responsible_person"),
        quantity,
        unit: cell_text(required(row, "unit")),
        emission_factor,
        emissions_kgco2e,
        data_quality,
        verification_status,
        notes: text("notes"),
        extra,
    })
}

fn is_known_column(column: &str) -> bool {
    column == EMISSIONS_COLUMN
        || REQUIRED_COLUMNS.contains(&column)
        || ENUM_COLUMNS.contains(&column)
        || TEXT_COLUMNS.iter().any(|(name, _)| *name == column)
}

/// Decode one element of a persisted ledger document, tolerating the loose typing
/// older tooling wrote: numeric strings for `quantity` and `emission_factor`, loose
/// scope spellings and unknown quality or verification labels. Returns the record
/// and one note per value that had to be repaired.
///
/// # Errors
/// Returns [`LedgerError::Validation`] when the element is not an object or still
/// lacks a usable date, scope, category, activity, quantity, unit or factor.
pub fn decode_document_row(value: Value) -> Result<(EmissionRecord, Vec<String>), LedgerError> {
    let mut row = match value {
        Value::Object(row) => row,
        other => {
            return Err(LedgerError::Validation(format!(
                "ledger entry MUST be an object, got {other}"
            )))
        }
    };

    let mut notes = Vec::new();
    for column in ["quantity", "emission_factor"] {
        if let Some(Value::String(raw)) = row.get(column) {
            let Some(number) = raw.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64)
            else {
                continue;
            };
            notes.push(format!("column `{column}` held numeric text `{raw}`"));
            row.insert(column.to_string(), Value::Number(number));
        }
    }

    let loose_scope = match row.get("scope") {
        Some(Value::String(raw)) => Scope::parse(raw)
            .filter(|scope| scope.as_str() != raw.as_str())
            .map(|scope| (raw.clone(), scope)),
        _ => None,
    };
    if let Some((raw, scope)) = loose_scope {
        notes.push(format!("scope `{raw}` read as {scope}"));
        row.insert("scope".to_string(), Value::String(scope.as_str().to_string()));
    }

    let quality_fallback = DataQuality::default().as_str();
    repair_label(&mut row, "data_quality", quality_fallback, &mut notes, |raw| {
        DataQuality::parse(raw).map(DataQuality::as_str)
    });
    let verification_fallback = VerificationStatus::default().as_str();
    repair_label(&mut row, "verification_status", verification_fallback, &mut notes, |raw| {
        VerificationStatus::parse(raw).map(VerificationStatus::as_str)
    });

    let record = serde_json::from_value::<EmissionRecord>(Value::Object(row))
        .map_err(|err| LedgerError::Validation(format!("ledger entry is unusable: {err}")))?;
    Ok((record, notes))
}

/// Replace a label cell with its canonical spelling, or with `fallback` when it is
/// not a known label.
fn repair_label(
    row: &mut ImportRow,
    column: &str,
    fallback: &'static str,
    notes: &mut Vec<String>,
    canonical: impl Fn(&str) -> Option<&'static str>,
) {
    let Some(value) = row.get(column) else {
        return;
    };
    let repaired = match value {
        Value::String(raw) => match canonical(raw) {
            Some(label) if label == raw.as_str() => return,
            Some(label) => {
                notes.push(format!("{column} `{raw}` read as {label}"));
                label
            }
            None => {
                notes.push(format!("unknown {column} `{raw}`, using {fallback}"));
                fallback
            }
        },
        other => {
            notes.push(format!("unknown {column} {other}, using {fallback}"));
            fallback
        }
    };
    row.insert(column.to_string(), Value::String(repaired.to_string()));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(value: Value) -> ImportRow {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture row must be an object, got {other}"),
        }
    }

    fn diesel_row() -> Value {
        json!({
            "date": "2024-01-15",
            "scope": "Scope 1",
            "category": "Stationary Combustion",
            "activity": "Diesel",
            "quantity": 200,
            "unit": "liter",
            "emission_factor": 2.5
        })
    }

    #[test]
    fn missing_unit_column_is_a_schema_error() {
        let mut incomplete = row(diesel_row());
        incomplete.remove("unit");
        let rows = vec![row(diesel_row()), incomplete];

        assert_eq!(
            coerce_rows(&rows),
            Err(LedgerError::Schema { missing: vec!["unit".to_string()] })
        );
    }

    #[test]
    fn rows_without_amount_are_derived_and_defaulted() {
        let mut second = row(diesel_row());
        second.insert("quantity".to_string(), json!("40"));
        second.insert("emission_factor".to_string(), json!("0.5"));
        second.insert(EMISSIONS_COLUMN.to_string(), Value::Null);

        let records = match coerce_rows(&[row(diesel_row()), second]) {
            Ok(records) => records,
            Err(err) => panic!("rows should coerce: {err}"),
        };

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].emissions_kgco2e, RecordedAmount::Numeric(500.0));
        assert_eq!(records[1].emissions_kgco2e, RecordedAmount::Numeric(20.0));
        assert_eq!(records[0].business_unit, "Corporate");
        assert_eq!(records[0].project, "Not Applicable");
        assert_eq!(records[0].country, "Bangladesh");
        assert_eq!(records[0].data_quality, DataQuality::Medium);
        assert_eq!(records[0].verification_status, VerificationStatus::Unverified);
        assert_eq!(records[0].notes, "");
    }

    #[test]
    fn supplied_amounts_are_kept_even_when_they_disagree() {
        let mut supplied = row(diesel_row());
        supplied.insert(EMISSIONS_COLUMN.to_string(), json!(12.0));
        let mut legacy = row(diesel_row());
        legacy.insert(EMISSIONS_COLUMN.to_string(), json!("pending"));

        let records = match coerce_rows(&[supplied, legacy]) {
            Ok(records) => records,
            Err(err) => panic!("rows should coerce: {err}"),
        };

        assert_eq!(records[0].emissions_kg(), 12.0);
        assert_eq!(records[1].emissions_kgco2e, RecordedAmount::Unparsed(json!("pending")));
        assert_eq!(records[1].emissions_kg(), 0.0);
    }

    #[test]
    fn bad_cells_name_row_and_column() {
        let mut bad_scope = row(diesel_row());
        bad_scope.insert("scope".to_string(), json!("Scope 9"));
        let rows = vec![row(diesel_row()), bad_scope];

        match coerce_rows(&rows) {
            Err(LedgerError::Validation(message)) => {
                assert!(message.starts_with("row 2: column `scope`"), "{message}");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut bad_quantity = row(diesel_row());
        bad_quantity.insert("quantity".to_string(), json!("lots"));
        assert!(matches!(coerce_rows(&[bad_quantity]), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn optional_columns_and_unknown_columns_survive() {
        let mut full = row(diesel_row());
        full.insert("date".to_string(), json!("01/20/2024"));
        full.insert("facility".to_string(), json!("Gazipur Plant"));
        full.insert("verification_status".to_string(), json!("Audited"));
        full.insert("data_quality".to_string(), json!(""));
        full.insert("batch".to_string(), json!(7));

        let records = match coerce_rows(&[full]) {
            Ok(records) => records,
            Err(err) => panic!("row should coerce: {err}"),
        };

        assert_eq!(records[0].date, "2024-01-20");
        assert_eq!(records[0].facility, "Gazipur Plant");
        assert_eq!(records[0].verification_status, VerificationStatus::Audited);
        assert_eq!(records[0].data_quality, DataQuality::Medium);
        assert_eq!(records[0].extra.get("batch"), Some(&json!(7)));
    }

    #[test]
    fn document_rows_with_loose_typing_are_repaired() {
        let legacy = json!({
            "date": "2023-07-04",
            "scope": "scope2",
            "category": "Electricity",
            "activity": "Bangladesh Grid",
            "quantity": "12",
            "unit": "kWh",
            "emission_factor": "0.6815",
            "emissions_kgCO2e": 8.178,
            "data_quality": "Estimated",
            "verification_status": "internally verified"
        });

        let (record, notes) = match decode_document_row(legacy) {
            Ok(decoded) => decoded,
            Err(err) => panic!("legacy row should decode: {err}"),
        };

        assert_eq!(record.quantity, 12.0);
        assert_eq!(record.emission_factor, 0.6815);
        assert_eq!(record.scope, Scope::Scope2);
        assert_eq!(record.data_quality, DataQuality::Medium);
        assert_eq!(record.verification_status, VerificationStatus::InternallyVerified);
        assert_eq!(notes.len(), 5, "{notes:?}");
        assert!(notes.iter().any(|note| note.contains("unknown data_quality `Estimated`")));
    }

    #[test]
    fn canonical_document_rows_need_no_repair() {
        let mut canonical = row(diesel_row());
        canonical.insert("data_quality".to_string(), json!("High"));
        canonical.insert(EMISSIONS_COLUMN.to_string(), json!(500.0));

        match decode_document_row(Value::Object(canonical)) {
            Ok((record, notes)) => {
                assert!(notes.is_empty(), "{notes:?}");
                assert_eq!(record.data_quality, DataQuality::High);
            }
            Err(err) => panic!("canonical row should decode: {err}"),
        }
    }

    #[test]
    fn unusable_document_rows_are_rejected() {
        let mut no_scope = row(diesel_row());
        no_scope.remove("scope");
        let mut wordy_quantity = row(diesel_row());
        wordy_quantity.insert("quantity".to_string(), json!("a dozen"));

        for value in [Value::Object(no_scope), Value::Object(wordy_quantity), json!("2024-01-01")] {
            assert!(matches!(decode_document_row(value), Err(LedgerError::Validation(_))));
        }
    }

    #[test]
    fn empty_input_has_no_missing_columns() {
        assert!(missing_columns(&[]).is_empty());
        assert_eq!(coerce_rows(&[]), Ok(Vec::new()));
    }
}
