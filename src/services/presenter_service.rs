use crate::models::{TransactionRecord, COLUMN_AMOUNT, COLUMN_DATE};
use crate::utils::AppError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::BTreeSet;

const NOT_AVAILABLE: &str = "N/A";

/// Colunas presentes no conjunto de linhas, em ordem alfabética
pub fn columns(rows: &[TransactionRecord]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Filtro adicional: mantém as linhas cuja célula em `column` contém
/// `fragment` (sem diferenciar maiúsculas). Coluna inexistente é erro e o
/// chamador deve exibir o conjunto original.
pub fn refine(
    rows: &[TransactionRecord],
    column: &str,
    fragment: &str,
) -> Result<Vec<TransactionRecord>, AppError> {
    if fragment.is_empty() {
        return Ok(rows.to_vec());
    }

    if !rows.iter().any(|row| row.contains_key(column)) {
        return Err(AppError::UnknownColumn(column.to_string()));
    }

    let needle = fragment.to_lowercase();
    Ok(rows
        .iter()
        .filter(|row| {
            row.get(column)
                .and_then(cell_text)
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect())
}

/// Texto da célula para comparação; nulo nunca casa
fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Copia das linhas com valor em reais e data no formato brasileiro
pub fn format_rows(rows: &[TransactionRecord]) -> Vec<TransactionRecord> {
    rows.iter()
        .map(|row| {
            let mut row = row.clone();
            if let Some(value) = row.get_mut(COLUMN_AMOUNT) {
                let formatted = coerce_number(value)
                    .map(format_brl)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                *value = Value::String(formatted);
            }
            if let Some(value) = row.get_mut(COLUMN_DATE) {
                let formatted = parse_date(value)
                    .map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                *value = Value::String(formatted);
            }
            row
        })
        .collect()
}

fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(|dt| dt.date())
        })
}

/// `1234567.891` -> `R$ 1.234.567,89` (ponto no milhar, vírgula no decimal)
pub fn format_brl(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (integer, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("R$ {}{},{}", sign, grouped, cents)
}
