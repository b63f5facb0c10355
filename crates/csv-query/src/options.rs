use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use csv_query_table::ColumnType;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// A column addressed by header name or zero-based position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Position(usize),
    Name(String),
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Position(p) => write!(f, "#{p}"),
            ColumnRef::Name(name) => write!(f, "{name:?}"),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(value: &str) -> Self {
        ColumnRef::Name(value.to_string())
    }
}

impl From<usize> for ColumnRef {
    fn from(value: usize) -> Self {
        ColumnRef::Position(value)
    }
}

/// Whether (and how) leading fields become row-index columns instead of data.
///
/// JSON forms: `false` → [`IndexCol::Disabled`]; `null` or `"infer"` → [`IndexCol::Infer`];
/// a string or non-negative integer → [`IndexCol::Column`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexCol {
    /// Every field is data. Fields beyond the header width are dropped.
    Disabled,
    /// When the first data row is wider than the header, its leading surplus fields (and the
    /// same positions in every row) become unnamed index columns.
    Infer,
    /// Use this header column as the index.
    Column(ColumnRef),
}

impl FromStr for IndexCol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "false" | "off" | "no" => IndexCol::Disabled,
            "infer" | "none" | "null" => IndexCol::Infer,
            _ => match trimmed.parse::<usize>() {
                Ok(position) => IndexCol::Column(ColumnRef::Position(position)),
                Err(_) => IndexCol::Column(ColumnRef::Name(trimmed.to_string())),
            },
        })
    }
}

impl Serialize for IndexCol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IndexCol::Disabled => serializer.serialize_bool(false),
            IndexCol::Infer => serializer.serialize_str("infer"),
            IndexCol::Column(column) => column.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for IndexCol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IndexColVisitor)
    }
}

struct IndexColVisitor;

impl<'de> Visitor<'de> for IndexColVisitor {
    type Value = IndexCol;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("false, null, \"infer\", a column name or a column position")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<IndexCol, E> {
        if v {
            return Err(E::invalid_value(de::Unexpected::Bool(true), &self));
        }
        Ok(IndexCol::Disabled)
    }

    fn visit_unit<E: de::Error>(self) -> Result<IndexCol, E> {
        Ok(IndexCol::Infer)
    }

    fn visit_none<E: de::Error>(self) -> Result<IndexCol, E> {
        Ok(IndexCol::Infer)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<IndexCol, E> {
        usize::try_from(v)
            .map(|p| IndexCol::Column(ColumnRef::Position(p)))
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<IndexCol, E> {
        usize::try_from(v)
            .map(|p| IndexCol::Column(ColumnRef::Position(p)))
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<IndexCol, E> {
        if v == "infer" {
            return Ok(IndexCol::Infer);
        }
        Ok(IndexCol::Column(ColumnRef::Name(v.to_string())))
    }
}

/// `Some(IndexCol::Infer)` for an explicit JSON `null`, so it overrides the service default.
fn explicit_index_col<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<IndexCol>, D::Error> {
    IndexCol::deserialize(deserializer).map(Some)
}

/// Requested text encoding: a concrete name, or `"auto"` (UTF-8, falling back to Latin-1).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EncodingOption {
    Auto,
    Named(String),
}

impl EncodingOption {
    pub fn named(name: impl Into<String>) -> Self {
        EncodingOption::Named(name.into())
    }
}

impl From<String> for EncodingOption {
    fn from(value: String) -> Self {
        if value == "auto" {
            EncodingOption::Auto
        } else {
            EncodingOption::Named(value)
        }
    }
}

impl From<&str> for EncodingOption {
    fn from(value: &str) -> Self {
        EncodingOption::from(value.to_string())
    }
}

impl From<EncodingOption> for String {
    fn from(value: EncodingOption) -> Self {
        match value {
            EncodingOption::Auto => "auto".to_string(),
            EncodingOption::Named(name) => name,
        }
    }
}

impl fmt::Display for EncodingOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingOption::Auto => f.write_str("auto"),
            EncodingOption::Named(name) => f.write_str(name),
        }
    }
}

/// Options forwarded to the table reader.
///
/// Every field is optional: `None` means "not specified", so layers of options can be merged
/// with [`ParseOptions::merge`] and the reader fills in its own defaults for whatever is left.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseOptions {
    /// Field separator (single ASCII character). Reader default: `,`.
    #[serde(alias = "sep")]
    pub delimiter: Option<char>,
    /// Quote character (single ASCII character). Reader default: `"`.
    #[serde(alias = "quotechar")]
    pub quote: Option<char>,
    /// Lines starting with this ASCII character are ignored.
    pub comment: Option<char>,
    /// Whether the first record holds column names. Reader default: `true`.
    pub header: Option<bool>,
    /// Explicit column names; replaces the header row when both are present.
    pub names: Option<Vec<String>>,
    /// Records skipped before the header.
    #[serde(alias = "skiprows")]
    pub skip_rows: Option<usize>,
    /// Row-index handling. Reader default: [`IndexCol::Infer`]; service default:
    /// [`IndexCol::Disabled`].
    #[serde(deserialize_with = "explicit_index_col")]
    pub index_col: Option<IndexCol>,
    /// Columns to reinterpret as date/time values.
    pub parse_dates: Option<Vec<ColumnRef>>,
    /// `chrono` format string tried for `parse_dates` columns.
    pub date_format: Option<String>,
    /// Prefer day-first for ambiguous `a/b/yyyy` dates. Reader default: `false`.
    pub dayfirst: Option<bool>,
    /// Forced column types by header name.
    pub dtype: Option<BTreeMap<String, ColumnType>>,
    /// Additional tokens read as missing.
    pub na_values: Option<Vec<String>>,
    /// Whether the built-in missing tokens apply. Reader default: `true`.
    pub keep_default_na: Option<bool>,
    /// Additional tokens read as `true`.
    pub true_values: Option<Vec<String>>,
    /// Additional tokens read as `false`.
    pub false_values: Option<Vec<String>>,
    /// Decimal separator for floats. Reader default: `.`.
    pub decimal: Option<char>,
    /// Grouping separator stripped from numbers.
    pub thousands: Option<char>,
    /// Text encoding of the file. Reader default: UTF-8.
    pub encoding: Option<EncodingOption>,
}

impl ParseOptions {
    /// Defaults the query service applies beneath caller options.
    pub fn service_defaults() -> Self {
        Self {
            index_col: Some(IndexCol::Disabled),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Layer `overrides` on top of `self`: every field set in `overrides` wins.
    pub fn merge(self, overrides: ParseOptions) -> ParseOptions {
        let ParseOptions {
            delimiter,
            quote,
            comment,
            header,
            names,
            skip_rows,
            index_col,
            parse_dates,
            date_format,
            dayfirst,
            dtype,
            na_values,
            keep_default_na,
            true_values,
            false_values,
            decimal,
            thousands,
            encoding,
        } = overrides;

        ParseOptions {
            delimiter: delimiter.or(self.delimiter),
            quote: quote.or(self.quote),
            comment: comment.or(self.comment),
            header: header.or(self.header),
            names: names.or(self.names),
            skip_rows: skip_rows.or(self.skip_rows),
            index_col: index_col.or(self.index_col),
            parse_dates: parse_dates.or(self.parse_dates),
            date_format: date_format.or(self.date_format),
            dayfirst: dayfirst.or(self.dayfirst),
            dtype: dtype.or(self.dtype),
            na_values: na_values.or(self.na_values),
            keep_default_na: keep_default_na.or(self.keep_default_na),
            true_values: true_values.or(self.true_values),
            false_values: false_values.or(self.false_values),
            decimal: decimal.or(self.decimal),
            thousands: thousands.or(self.thousands),
            encoding: encoding.or(self.encoding),
        }
    }

    /// Copy of these options with `encoding` replaced.
    pub fn with_encoding(&self, encoding: EncodingOption) -> ParseOptions {
        ParseOptions {
            encoding: Some(encoding),
            ..self.clone()
        }
    }
}
