use crate::error::{FetchError, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ── Report query ──────────────────────────────────────────────────────────────

/// First reporting year the finance pages carry data for.
pub const EARLIEST_REPORT_YEAR: i32 = 1989;

/// A validated (year, quarter) pair. Only constructible through [`ReportQuery::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportQuery {
    year: i32,
    quarter: u8,
}

impl ReportQuery {
    /// Returns `None` for a quarter outside 1..=4 or a year before 1989.
    pub fn new(year: i32, quarter: i32) -> Option<Self> {
        if year < EARLIEST_REPORT_YEAR || !(1..=4).contains(&quarter) {
            return None;
        }
        Some(Self {
            year,
            quarter: quarter as u8,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u8 {
        self.quarter
    }
}

impl fmt::Display for ReportQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

// ── Datasets ──────────────────────────────────────────────────────────────────

pub const REPORT_COLUMNS: &[&str] = &[
    "code",
    "name",
    "eps",
    "eps_yoy",
    "bvps",
    "roe",
    "epcf",
    "net_profits",
    "profits_yoy",
    "distrib",
    "report_date",
];

pub const PROFIT_COLUMNS: &[&str] = &[
    "code",
    "name",
    "roe",
    "net_profit_ratio",
    "gross_profit_rate",
    "net_profits",
    "eps",
    "business_income",
    "bips",
];

pub const OPERATION_COLUMNS: &[&str] = &[
    "code",
    "name",
    "arturnover",
    "arturndays",
    "inventory_turnover",
    "inventory_days",
    "currentasset_turnover",
    "currentasset_days",
];

pub const GROWTH_COLUMNS: &[&str] = &["code", "name", "mbrg", "nprg", "nav", "targ", "epsg", "seg"];

pub const DEBT_PAYING_COLUMNS: &[&str] = &[
    "code",
    "name",
    "currentratio",
    "quickratio",
    "cashratio",
    "icratio",
    "sheqratio",
    "adratio",
];

pub const CASH_FLOW_COLUMNS: &[&str] = &[
    "code",
    "name",
    "cf_sales",
    "rateofreturn",
    "cf_nm",
    "cf_liabilities",
    "cashflowratio",
];

/// Field names of the stock screener listing, in output order.
pub const PROFILE_COLUMNS: &[&str] = &[
    "symbol",
    "net_profit_cagr",
    "ps",
    "percent",
    "pb_ttm",
    "float_shares",
    "current",
    "amplitude",
    "pcf",
    "current_year_percent",
    "float_market_capital",
    "market_capital",
    "dividend_yield",
    "roe_ttm",
    "total_percent",
    "income_cagr",
    "amount",
    "chg",
    "issue_date_ts",
    "main_net_inflows",
    "volume",
    "volume_ratio",
    "pb",
    "followers",
    "turnover_rate",
    "name",
    "pe_ttm",
    "total_shares",
];

/// Quarterly finance-analysis tables served as paginated HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Report,
    Profit,
    Operation,
    Growth,
    DebtPaying,
    CashFlow,
}

impl Dataset {
    pub const ALL: [Dataset; 6] = [
        Dataset::Report,
        Dataset::Profit,
        Dataset::Operation,
        Dataset::Growth,
        Dataset::DebtPaying,
        Dataset::CashFlow,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dataset::Report => "report",
            Dataset::Profit => "profit",
            Dataset::Operation => "operation",
            Dataset::Growth => "growth",
            Dataset::DebtPaying => "debt_paying",
            Dataset::CashFlow => "cash_flow",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Dataset::Report => REPORT_COLUMNS,
            Dataset::Profit => PROFIT_COLUMNS,
            Dataset::Operation => OPERATION_COLUMNS,
            Dataset::Growth => GROWTH_COLUMNS,
            Dataset::DebtPaying => DEBT_PAYING_COLUMNS,
            Dataset::CashFlow => CASH_FLOW_COLUMNS,
        }
    }

    /// The main-index page carries a trailing detail-link column.
    pub fn drop_column(self) -> Option<usize> {
        match self {
            Dataset::Report => Some(11),
            _ => None,
        }
    }

    pub fn shape(self) -> TableShape {
        TableShape::new(ColumnSchema::from_static(self.columns()), self.drop_column())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Dataset::ALL
            .into_iter()
            .find(|d| d.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Dataset::ALL.iter().map(|d| d.name()).collect();
                format!("unknown dataset {:?} (expected one of: {})", s, known.join(", "))
            })
    }
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Ordered canonical column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema(Vec<String>);

impl ColumnSchema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn from_static(columns: &[&str]) -> Self {
        Self::new(columns.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c == name)
    }
}

/// Raw source columns → optional positional drop → canonical rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableShape {
    schema: ColumnSchema,
    drop_column: Option<usize>,
}

impl TableShape {
    pub fn new(schema: ColumnSchema, drop_column: Option<usize>) -> Self {
        Self {
            schema,
            drop_column,
        }
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn drop_column(&self) -> Option<usize> {
        self.drop_column
    }

    /// Aligns one raw row to the schema, or fails if the widths disagree.
    pub fn reshape(&self, mut raw: Vec<Value>) -> Result<Vec<Value>> {
        let found = raw.len();
        let mismatch = || FetchError::SchemaMismatch {
            expected: self.schema.len(),
            found,
            drop_column: self.drop_column,
        };

        if let Some(idx) = self.drop_column {
            if idx >= raw.len() {
                return Err(mismatch());
            }
            raw.remove(idx);
        }

        if raw.len() != self.schema.len() {
            return Err(mismatch());
        }
        Ok(raw)
    }
}

// ── Values ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Empty => serializer.serialize_none(),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

// ── Result table ──────────────────────────────────────────────────────────────

/// Rows collected across pages, every row as wide as `columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: ColumnSchema,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new(columns: ColumnSchema) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &ColumnSchema {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a page of rows after the ones already collected.
    pub fn append(&mut self, rows: Vec<Vec<Value>>) -> Result<()> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.columns.len()) {
            return Err(FetchError::SchemaMismatch {
                expected: self.columns.len(),
                found: bad.len(),
                drop_column: None,
            });
        }
        self.rows.extend(rows);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.index_of(name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Rewrites every cell of `column`. Returns false if the column is unknown.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> bool
    where
        F: FnMut(&Value) -> Value,
    {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        true
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: self.columns.names(),
            values,
        })
    }
}

impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for record in self.records() {
            seq.serialize_element(&record)?;
        }
        seq.end()
    }
}

/// One row viewed as an ordered column → value mapping.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_query_validation() {
        for quarter in 1..=4 {
            assert!(ReportQuery::new(2018, quarter).is_some());
            assert!(ReportQuery::new(EARLIEST_REPORT_YEAR, quarter).is_some());
        }
        for quarter in [-1, 0, 5, 12] {
            assert!(ReportQuery::new(2018, quarter).is_none());
        }
        assert!(ReportQuery::new(1988, 1).is_none());
        assert!(ReportQuery::new(0, 3).is_none());

        let q = ReportQuery::new(2018, 3).unwrap();
        assert_eq!((q.year(), q.quarter()), (2018, 3));
        assert_eq!(q.to_string(), "2018Q3");
    }

    #[test]
    fn test_dataset_from_str() {
        assert_eq!("debt-paying".parse::<Dataset>(), Ok(Dataset::DebtPaying));
        assert_eq!("CASH_FLOW".parse::<Dataset>(), Ok(Dataset::CashFlow));
        assert!("balance".parse::<Dataset>().is_err());
    }

    #[test]
    fn test_report_shape_drops_trailing_column() {
        let shape = Dataset::Report.shape();
        let raw: Vec<Value> = (0..12).map(|i| Value::Number(i as f64)).collect();
        let row = shape.reshape(raw).unwrap();
        assert_eq!(row.len(), 11);
        assert_eq!(row.len(), shape.schema().len());
        assert_eq!(row.last(), Some(&Value::Number(10.0)));
    }

    #[test]
    fn test_reshape_rejects_width_mismatch() {
        let shape = Dataset::Growth.shape();
        let err = shape.reshape(vec![Value::Empty; 9]).unwrap_err();
        assert!(matches!(
            err,
            FetchError::SchemaMismatch {
                expected: 8,
                found: 9,
                drop_column: None
            }
        ));

        let shape = TableShape::new(ColumnSchema::from_static(&["a"]), Some(4));
        assert!(shape.reshape(vec![Value::Empty; 2]).is_err());
    }

    #[test]
    fn test_table_append_and_map_column() {
        let mut table = ResultTable::new(ColumnSchema::from_static(&["code", "name"]));
        table
            .append(vec![vec![Value::Number(1.0), Value::Text("A".into())]])
            .unwrap();
        table
            .append(vec![vec![Value::Number(2.0), Value::Text("B".into())]])
            .unwrap();
        assert!(table.append(vec![vec![Value::Empty]]).is_err());
        assert_eq!(table.len(), 2);

        assert!(table.map_column("code", |v| Value::Text(format!("#{}", v))));
        assert!(!table.map_column("missing", |v| v.clone()));
        assert_eq!(table.get(1, "code"), Some(&Value::Text("#2".into())));
        assert_eq!(table.get(0, "name").and_then(Value::as_str), Some("A"));
    }

    #[test]
    fn test_table_serializes_as_records() {
        let mut table = ResultTable::new(ColumnSchema::from_static(&["code", "roe", "distrib"]));
        table
            .append(vec![vec![
                Value::Text("000001".into()),
                Value::Number(12.5),
                Value::Empty,
            ]])
            .unwrap();

        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"code":"000001","roe":12.5,"distrib":null}]"#);
    }
}
