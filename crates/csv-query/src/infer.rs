//! Cell-level parsing and per-column type inference for the CSV reader.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use csv_query_table::{Column, ColumnType, Value};

use crate::reader::ReadError;

/// Tokens read as missing unless `keep_default_na` is turned off.
pub(crate) const DEFAULT_NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub(crate) const DEFAULT_TRUE_VALUES: &[&str] = &["True", "TRUE", "true"];
pub(crate) const DEFAULT_FALSE_VALUES: &[&str] = &["False", "FALSE", "false"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%S",
    "%Y%m%d %H%M%S",
    "%Y%m%d%H%M%S",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];
const MONTH_FIRST_DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S%.f", "%m/%d/%Y %H:%M"];
const MONTH_FIRST_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y"];
const DAY_FIRST_DATETIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S%.f", "%d/%m/%Y %H:%M"];
const DAY_FIRST_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

/// How raw field text maps to typed cells.
#[derive(Clone, Debug)]
pub(crate) struct CellSyntax {
    pub na_values: HashSet<String>,
    pub true_values: HashSet<String>,
    pub false_values: HashSet<String>,
    pub decimal: char,
    pub thousands: Option<char>,
    pub date_format: Option<String>,
    pub dayfirst: bool,
}

impl Default for CellSyntax {
    fn default() -> Self {
        Self {
            na_values: DEFAULT_NA_VALUES.iter().map(|s| s.to_string()).collect(),
            true_values: DEFAULT_TRUE_VALUES.iter().map(|s| s.to_string()).collect(),
            false_values: DEFAULT_FALSE_VALUES.iter().map(|s| s.to_string()).collect(),
            decimal: '.',
            thousands: None,
            date_format: None,
            dayfirst: false,
        }
    }
}

impl CellSyntax {
    fn is_missing(&self, raw: &str) -> bool {
        self.na_values.contains(raw)
    }

    pub fn parse_integer(&self, raw: &str) -> Option<i64> {
        let digits = self.strip_thousands(raw.trim());
        let body = digits.strip_prefix(['+', '-']).unwrap_or(&digits);
        if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn parse_float(&self, raw: &str) -> Option<f64> {
        let s = raw.trim();
        let (sign, body) = match s.as_bytes().first() {
            Some(b'-') => (-1.0, &s[1..]),
            Some(b'+') => (1.0, &s[1..]),
            _ => (1.0, s),
        };
        if body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity") {
            return Some(sign * f64::INFINITY);
        }
        let normalized = normalize_number(&self.strip_thousands(body), self.decimal)?;
        let parsed: f64 = normalized.parse().ok()?;
        Some(sign * parsed)
    }

    pub fn parse_bool(&self, raw: &str) -> Option<bool> {
        let v = raw.trim();
        if self.true_values.contains(v) {
            Some(true)
        } else if self.false_values.contains(v) {
            Some(false)
        } else {
            None
        }
    }

    pub fn parse_datetime(&self, raw: &str) -> Option<NaiveDateTime> {
        let v = raw.trim();
        if let Some(format) = &self.date_format {
            return parse_with_formats(v, std::slice::from_ref(&format.as_str()), &[format]);
        }

        let (slash_datetimes, slash_dates) = if self.dayfirst {
            (DAY_FIRST_DATETIME_FORMATS, DAY_FIRST_DATE_FORMATS)
        } else {
            (MONTH_FIRST_DATETIME_FORMATS, MONTH_FIRST_DATE_FORMATS)
        };

        parse_with_formats(v, DATETIME_FORMATS, DATE_FORMATS)
            .or_else(|| parse_with_formats(v, slash_datetimes, slash_dates))
    }

    fn strip_thousands(&self, s: &str) -> String {
        match self.thousands {
            Some(sep) => s.chars().filter(|&c| c != sep).collect(),
            None => s.to_string(),
        }
    }
}

fn parse_with_formats<S: AsRef<str>>(
    v: &str,
    datetime_formats: &[&str],
    date_formats: &[S],
) -> Option<NaiveDateTime> {
    datetime_formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(v, f).ok())
        .or_else(|| {
            date_formats
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(v, f.as_ref()).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Rewrite a decimal literal into Rust float syntax, rejecting anything that is not one.
fn normalize_number(s: &str, decimal_separator: char) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut saw_digit = false;
    let mut saw_decimal = false;
    let mut saw_exp = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            saw_digit = true;
            out.push(ch);
            continue;
        }

        if !saw_exp && ch == decimal_separator {
            if saw_decimal {
                return None;
            }
            saw_decimal = true;
            out.push('.');
            continue;
        }

        if !saw_exp && matches!(ch, 'e' | 'E') {
            if !saw_digit {
                return None;
            }
            saw_exp = true;
            out.push('e');
            continue;
        }

        // Exponent sign is only valid immediately after `e` / `E`.
        if saw_exp && matches!(ch, '+' | '-') && out.ends_with('e') {
            out.push(ch);
            continue;
        }

        return None;
    }

    if !saw_digit || out.ends_with('e') || out.ends_with("e+") || out.ends_with("e-") {
        return None;
    }
    Some(out)
}

/// Raw text of one column: `None` for fields a short row did not have.
pub(crate) struct RawColumn {
    pub name: String,
    pub fields: Vec<Option<String>>,
}

/// How a column's cells should be typed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Conversion {
    Infer,
    /// `parse_dates`: date/time if every cell parses, otherwise fall back to inference.
    PreferDates,
    Forced(ColumnType),
}

pub(crate) fn convert_column(
    raw: RawColumn,
    conversion: Conversion,
    syntax: &CellSyntax,
) -> Result<Column, ReadError> {
    let RawColumn { name, fields } = raw;
    let cells: Vec<Option<String>> = fields
        .into_iter()
        .map(|f| f.filter(|s| !syntax.is_missing(s)))
        .collect();

    match conversion {
        Conversion::Forced(column_type) => {
            let values = cells
                .into_iter()
                .map(|cell| match cell {
                    None => Ok(Value::Missing),
                    Some(s) => {
                        forced_value(&s, column_type, syntax).ok_or_else(|| ReadError::InvalidValue {
                            column: name.clone(),
                            value: s,
                            column_type,
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            if column_type == ColumnType::Mixed {
                return Ok(Column::from_values(name, values));
            }
            Ok(Column::new(name, column_type, values))
        }
        Conversion::PreferDates => match parse_all(&cells, |s| syntax.parse_datetime(s)) {
            Some(values) => Ok(Column::new(
                name,
                ColumnType::DateTime,
                values.into_iter().map(Value::from).collect(),
            )),
            None => {
                log::warn!("column {name:?} is listed in parse_dates but holds non-date values; keeping it as parsed");
                Ok(infer_column(name, cells, syntax))
            }
        },
        Conversion::Infer => Ok(infer_column(name, cells, syntax)),
    }
}

fn forced_value(s: &str, column_type: ColumnType, syntax: &CellSyntax) -> Option<Value> {
    match column_type {
        ColumnType::Integer => syntax.parse_integer(s).map(Value::Integer),
        ColumnType::Float => syntax.parse_float(s).map(Value::Float),
        ColumnType::Boolean => syntax.parse_bool(s).map(Value::Boolean),
        ColumnType::String => Some(Value::String(s.to_string())),
        ColumnType::DateTime => syntax.parse_datetime(s).map(Value::DateTime),
        ColumnType::Mixed => Some(infer_cell(s, syntax)),
    }
}

fn infer_cell(s: &str, syntax: &CellSyntax) -> Value {
    if let Some(i) = syntax.parse_integer(s) {
        Value::Integer(i)
    } else if let Some(f) = syntax.parse_float(s) {
        Value::Float(f)
    } else if let Some(b) = syntax.parse_bool(s) {
        Value::Boolean(b)
    } else {
        Value::String(s.to_string())
    }
}

/// `Some` only when every present cell parses.
fn parse_all<T>(
    cells: &[Option<String>],
    parse: impl Fn(&str) -> Option<T>,
) -> Option<Vec<Option<T>>> {
    cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => parse(s).map(Some),
        })
        .collect()
}

fn infer_column(name: String, cells: Vec<Option<String>>, syntax: &CellSyntax) -> Column {
    if cells.iter().all(Option::is_none) {
        return Column::new(name, ColumnType::Float, vec![Value::Missing; cells.len()]);
    }
    if let Some(values) = parse_all(&cells, |s| syntax.parse_integer(s)) {
        return Column::new(name, ColumnType::Integer, values.into_iter().map(Value::from).collect());
    }
    if let Some(values) = parse_all(&cells, |s| syntax.parse_float(s)) {
        return Column::new(name, ColumnType::Float, values.into_iter().map(Value::from).collect());
    }
    if let Some(values) = parse_all(&cells, |s| syntax.parse_bool(s)) {
        return Column::new(name, ColumnType::Boolean, values.into_iter().map(Value::from).collect());
    }
    Column::new(
        name,
        ColumnType::String,
        cells.into_iter().map(Value::from).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn raw(name: &str, fields: &[Option<&str>]) -> RawColumn {
        RawColumn {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.map(str::to_string)).collect(),
        }
    }

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, mi, s))
            .unwrap()
    }

    #[test]
    fn integers_with_gaps_stay_integers() {
        let syntax = CellSyntax::default();
        let column = convert_column(
            raw("a", &[Some("1"), Some(""), Some("NA"), None, Some("-4")]),
            Conversion::Infer,
            &syntax,
        )
        .unwrap();
        assert_eq!(column.column_type(), ColumnType::Integer);
        assert_eq!(
            column.values(),
            &[
                Value::Integer(1),
                Value::Missing,
                Value::Missing,
                Value::Missing,
                Value::Integer(-4)
            ]
        );
    }

    #[test]
    fn numbers_widen_to_float() {
        let syntax = CellSyntax::default();
        let column =
            convert_column(raw("a", &[Some("1"), Some("2.5"), Some("1e3")]), Conversion::Infer, &syntax)
                .unwrap();
        assert_eq!(column.column_type(), ColumnType::Float);
        assert_eq!(
            column.values(),
            &[Value::Float(1.0), Value::Float(2.5), Value::Float(1000.0)]
        );
    }

    #[test]
    fn boolean_tokens_with_missing_cells() {
        let syntax = CellSyntax::default();
        let column =
            convert_column(raw("c", &[Some("True"), Some("FALSE"), Some("")]), Conversion::Infer, &syntax)
                .unwrap();
        assert_eq!(column.column_type(), ColumnType::Boolean);
        assert_eq!(
            column.values(),
            &[Value::Boolean(true), Value::Boolean(false), Value::Missing]
        );
    }

    #[test]
    fn compact_timestamps_are_text_unless_dates_requested() {
        let syntax = CellSyntax::default();
        let cells = [Some("20221003T182105"), Some("20221003T182106")];

        let text = convert_column(raw("b", &cells), Conversion::Infer, &syntax).unwrap();
        assert_eq!(text.column_type(), ColumnType::String);

        let dates = convert_column(raw("b", &cells), Conversion::PreferDates, &syntax).unwrap();
        assert_eq!(dates.column_type(), ColumnType::DateTime);
        assert_eq!(
            dates.values()[0],
            Value::DateTime(ymd_hms(2022, 10, 3, 18, 21, 5))
        );
    }

    #[test]
    fn unparseable_dates_fall_back_to_inference() {
        let syntax = CellSyntax::default();
        let column = convert_column(
            raw("b", &[Some("2022-10-03"), Some("soon")]),
            Conversion::PreferDates,
            &syntax,
        )
        .unwrap();
        assert_eq!(column.column_type(), ColumnType::String);
    }

    #[test]
    fn dayfirst_and_explicit_formats() {
        let mut syntax = CellSyntax::default();
        assert_eq!(
            syntax.parse_datetime("02/03/2024"),
            Some(ymd_hms(2024, 2, 3, 0, 0, 0))
        );
        syntax.dayfirst = true;
        assert_eq!(
            syntax.parse_datetime("02/03/2024"),
            Some(ymd_hms(2024, 3, 2, 0, 0, 0))
        );
        syntax.date_format = Some("%d %b %Y".to_string());
        assert_eq!(
            syntax.parse_datetime("05 Jan 2021"),
            Some(ymd_hms(2021, 1, 5, 0, 0, 0))
        );
        assert_eq!(syntax.parse_datetime("2021-01-05"), None);
    }

    #[test]
    fn forced_types_reject_bad_cells() {
        let syntax = CellSyntax::default();
        let err = convert_column(
            raw("n", &[Some("1"), Some("x")]),
            Conversion::Forced(ColumnType::Integer),
            &syntax,
        )
        .unwrap_err();
        assert!(matches!(err, ReadError::InvalidValue { ref value, .. } if value == "x"));

        let text = convert_column(
            raw("n", &[Some("1"), Some("")]),
            Conversion::Forced(ColumnType::String),
            &syntax,
        )
        .unwrap();
        assert_eq!(text.values(), &[Value::from("1"), Value::Missing]);
    }

    #[test]
    fn locale_number_syntax() {
        let syntax = CellSyntax {
            decimal: ',',
            thousands: Some('.'),
            ..CellSyntax::default()
        };
        assert_eq!(syntax.parse_float("1.234,5"), Some(1234.5));
        assert_eq!(syntax.parse_integer("1.234"), Some(1234));
        assert_eq!(syntax.parse_float("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(syntax.parse_float("1e"), None);
    }
}
