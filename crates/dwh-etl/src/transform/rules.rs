//! Column coercion rules
//!
//! Each rule renders the SQL fragment used inside an insert and exposes the
//! same semantics over a single value through `apply`.

use chrono::{Duration, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

use crate::query::quote_literal;
use crate::warehouse::Scalar;

/// Day zero of SAS-style epoch dates
pub const EPOCH_DATE: &str = "1960/01/01";

#[allow(clippy::unwrap_used)]
static PACKED_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{8}$").unwrap());

/// Warehouse column types used in casts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Int2,
    Int4,
    Int8,
    Float8,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Int2 => "int2",
            SqlType::Int4 => "int4",
            SqlType::Int8 => "int8",
            SqlType::Float8 => "float8",
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, SqlType::Float8)
    }

    /// Cast a value the way the warehouse does: floats round to the nearest integer
    pub fn cast(&self, value: &Scalar) -> Scalar {
        match (self.is_integer(), value) {
            (true, Scalar::Float(v)) => Scalar::Int(v.round() as i64),
            (false, Scalar::Int(v)) => Scalar::Float(*v as f64),
            _ => value.clone(),
        }
    }
}

/// Value substituted for a code missing from its lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentinel {
    Int(i64),
    Text(&'static str),
}

impl Sentinel {
    pub fn value(&self) -> Scalar {
        match self {
            Sentinel::Int(v) => Scalar::Int(*v),
            Sentinel::Text(v) => Scalar::Text(v.to_string()),
        }
    }
}

/// Replace a code with a sentinel when it has no match in a lookup table
///
/// Rendered as a `LEFT JOIN` against the lookup plus a `CASE` on the joined
/// key, so unknown codes are coerced instead of rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeLookup {
    pub column: &'static str,
    pub lookup: &'static str,
    /// Alias of the joined lookup, unique within one select
    pub alias: &'static str,
    pub cast: Option<SqlType>,
    pub sentinel: Sentinel,
}

impl CodeLookup {
    pub fn new(column: &'static str, lookup: &'static str, alias: &'static str) -> Self {
        Self {
            column,
            lookup,
            alias,
            cast: None,
            sentinel: Sentinel::Text(""),
        }
    }

    pub fn cast(mut self, ty: SqlType) -> Self {
        self.cast = Some(ty);
        self
    }

    pub fn or(mut self, sentinel: Sentinel) -> Self {
        self.sentinel = sentinel;
        self
    }

    pub fn sql(&self) -> String {
        let (sentinel, value) = match self.cast {
            Some(ty) => (
                self.render_sentinel_cast(ty),
                format!("{}::{}", self.column, ty.as_str()),
            ),
            None => (self.render_sentinel(), self.column.to_string()),
        };

        format!(
            "CASE WHEN {}.id IS NULL THEN {} ELSE {} END AS {}",
            self.alias, sentinel, value, self.column
        )
    }

    fn render_sentinel(&self) -> String {
        match self.sentinel {
            Sentinel::Int(v) => v.to_string(),
            Sentinel::Text(v) => quote_literal(v),
        }
    }

    fn render_sentinel_cast(&self, ty: SqlType) -> String {
        format!("{}::{}", self.render_sentinel(), ty.as_str())
    }

    /// Join condition against `source`, the alias or name of the staging table
    pub fn join_sql(&self, source: &str) -> String {
        format!(
            "LEFT JOIN public.{} {}\n             ON {}.{} = {}.id",
            self.lookup, self.alias, source, self.column, self.alias
        )
    }

    /// Coerce `raw` given the codes present in the lookup
    pub fn apply(&self, raw: &Scalar, codes: &[Scalar]) -> Scalar {
        if raw.is_null() || !codes.iter().any(|code| code.matches(raw)) {
            return self.sentinel.value();
        }
        match self.cast {
            Some(ty) => ty.cast(raw),
            None => raw.clone(),
        }
    }
}

/// Day offset from [`EPOCH_DATE`] converted to a date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochDate {
    pub column: &'static str,
    pub cast: SqlType,
}

impl EpochDate {
    pub fn new(column: &'static str, cast: SqlType) -> Self {
        Self { column, cast }
    }

    pub fn sql(&self) -> String {
        format!(
            "DATEADD(day, {}::{}, '{}')::date AS {}",
            self.column,
            self.cast.as_str(),
            EPOCH_DATE,
            self.column
        )
    }

    pub fn apply(&self, days: Option<f64>) -> Option<NaiveDate> {
        let days = days?.round() as i64;
        NaiveDate::from_ymd_opt(1960, 1, 1)?.checked_add_signed(Duration::try_days(days)?)
    }
}

/// Digit layout of a packed date string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// `YYYYMMDD`
    YearMonthDay,
    /// `MMDDYYYY`
    MonthDayYear,
}

impl DateLayout {
    fn sql_format(&self) -> &'static str {
        match self {
            DateLayout::YearMonthDay => "YYYYMMDD",
            DateLayout::MonthDayYear => "MMDDYYYY",
        }
    }

    fn chrono_format(&self) -> &'static str {
        match self {
            DateLayout::YearMonthDay => "%Y%m%d",
            DateLayout::MonthDayYear => "%m%d%Y",
        }
    }
}

/// Eight-digit date string converted with `to_date`
///
/// A guarded conversion trims the value, requires exactly eight digits and
/// maps the listed placeholder values to NULL before converting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedDate {
    pub column: &'static str,
    pub layout: DateLayout,
    pub guarded: bool,
    pub null_values: &'static [&'static str],
}

impl PackedDate {
    pub fn new(column: &'static str, layout: DateLayout) -> Self {
        Self {
            column,
            layout,
            guarded: false,
            null_values: &[],
        }
    }

    pub fn guarded(column: &'static str, layout: DateLayout, null_values: &'static [&'static str]) -> Self {
        Self {
            column,
            layout,
            guarded: true,
            null_values,
        }
    }

    pub fn sql(&self) -> String {
        if !self.guarded {
            return format!(
                "to_date({}, '{}') AS {}",
                self.column,
                self.layout.sql_format(),
                self.column
            );
        }

        let trimmed = format!("TRIM({})", self.column);
        let mut condition = format!("{} ~ '{}'", trimmed, PACKED_DIGITS.as_str());
        if !self.null_values.is_empty() {
            let values: Vec<String> = self.null_values.iter().map(|v| quote_literal(v)).collect();
            condition.push_str(&format!(" AND {} NOT IN ({})", trimmed, values.join(", ")));
        }

        format!(
            "to_date(CASE WHEN {} THEN {} ELSE NULL END, '{}') AS {}",
            condition,
            self.column,
            self.layout.sql_format(),
            self.column
        )
    }

    /// Date of `raw`, or `None` when the value is rejected or not a calendar date
    pub fn apply(&self, raw: Option<&str>) -> Option<NaiveDate> {
        let value = raw?.trim();
        if self.guarded && (!PACKED_DIGITS.is_match(value) || self.null_values.contains(&value)) {
            return None;
        }
        NaiveDate::parse_from_str(value, self.layout.chrono_format()).ok()
    }
}

/// Coordinate with a hemisphere suffix, e.g. `57.05N` or `10.33W`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HemisphereCoordinate {
    pub column: &'static str,
    /// Suffix of positive values: `N` for latitude, `E` for longitude
    pub positive: char,
}

impl HemisphereCoordinate {
    pub fn latitude(column: &'static str) -> Self {
        Self {
            column,
            positive: 'N',
        }
    }

    pub fn longitude(column: &'static str) -> Self {
        Self {
            column,
            positive: 'E',
        }
    }

    pub fn sql(&self) -> String {
        let magnitude = format!(
            "CAST(LEFT({c}, LEN({c})-1) AS float8)",
            c = self.column
        );
        format!(
            "CASE WHEN RIGHT({c}, 1) = '{p}' THEN {m} ELSE {m} * (-1) END AS {c}",
            c = self.column,
            p = self.positive,
            m = magnitude
        )
    }

    pub fn apply(&self, raw: &str) -> Option<f64> {
        let mut chars = raw.chars();
        let suffix = chars.next_back()?;
        let magnitude: f64 = chars.as_str().trim().parse().ok()?;
        if suffix == self.positive {
            Some(magnitude)
        } else {
            Some(-magnitude)
        }
    }
}

/// One delimited part of a text column, cast to a number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPart {
    pub column: &'static str,
    pub delimiter: char,
    /// 1-based part index
    pub part: usize,
    pub alias: &'static str,
}

impl SplitPart {
    pub fn new(column: &'static str, delimiter: char, part: usize, alias: &'static str) -> Self {
        Self {
            column,
            delimiter,
            part,
            alias,
        }
    }

    pub fn sql(&self) -> String {
        format!(
            "CAST(SPLIT_PART({}, '{}', {}) AS float8) AS {}",
            self.column, self.delimiter, self.part, self.alias
        )
    }

    pub fn apply(&self, raw: &str) -> Option<f64> {
        raw.split(self.delimiter)
            .nth(self.part.checked_sub(1)?)?
            .trim()
            .parse()
            .ok()
    }
}

/// Text after a fixed-length prefix, e.g. `US-CA` to `CA`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionSuffix {
    pub column: &'static str,
    pub skip: usize,
    pub alias: &'static str,
}

impl RegionSuffix {
    pub fn new(column: &'static str, skip: usize, alias: &'static str) -> Self {
        Self {
            column,
            skip,
            alias,
        }
    }

    pub fn sql(&self) -> String {
        format!(
            "RIGHT({c}, LEN({c})-{n}) AS {a}",
            c = self.column,
            n = self.skip,
            a = self.alias
        )
    }

    pub fn apply(&self, raw: &str) -> String {
        raw.chars().skip(self.skip).collect()
    }
}

/// Rows whose column equals a value are left out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exclude {
    pub column: &'static str,
    pub value: &'static str,
}

impl Exclude {
    pub fn new(column: &'static str, value: &'static str) -> Self {
        Self { column, value }
    }

    pub fn sql(&self) -> String {
        format!("{} <> {}", self.column, quote_literal(self.value))
    }

    /// Whether a row survives; NULL never compares unequal, so it is dropped too
    pub fn keeps(&self, raw: Option<&str>) -> bool {
        raw.is_some_and(|v| v != self.value)
    }
}

/// Long-to-wide pivot of a category column into one summed column per category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPivot {
    pub category: &'static str,
    pub value: &'static str,
    /// `(category value, output column)` pairs in output order
    pub categories: &'static [(&'static str, &'static str)],
}

impl CategoryPivot {
    pub fn new(
        category: &'static str,
        value: &'static str,
        categories: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            category,
            value,
            categories,
        }
    }

    /// One select item per category
    pub fn sql(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|(label, column)| {
                format!(
                    "SUM(CASE WHEN {} = {} THEN {} ELSE NULL END) AS {}",
                    self.category,
                    quote_literal(label),
                    self.value,
                    column
                )
            })
            .collect()
    }

    /// Per-category sums over the rows of one group; `None` where no row contributes
    pub fn apply<'a, I>(&self, rows: I) -> Vec<Option<i64>>
    where
        I: IntoIterator<Item = (&'a str, Option<i64>)>,
    {
        let mut sums = vec![None; self.categories.len()];
        for (category, value) in rows {
            let Some(value) = value else { continue };
            if let Some(i) = self.categories.iter().position(|(label, _)| *label == category) {
                sums[i] = Some(sums[i].unwrap_or(0) + value);
            }
        }
        sums
    }
}
