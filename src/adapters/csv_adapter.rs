//! CSV file series source.
//!
//! One file per security, named `<code>.csv`, in a single directory. Columns
//! are located by header name; both the Chinese headers written by the
//! downloader (`日期`, `开盘`, ...) and plain English headers are accepted.

use crate::domain::error::RevscanError;
use crate::domain::price::{PriceBar, PriceSeries};
use crate::domain::universe::SecurityNames;
use crate::ports::series_source::SeriesSource;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::path::{Path, PathBuf};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

const DATE: &[&str] = &["日期", "date"];
const OPEN: &[&str] = &["开盘", "open"];
const HIGH: &[&str] = &["最高", "high"];
const LOW: &[&str] = &["最低", "low"];
const CLOSE: &[&str] = &["收盘", "close"];
const VOLUME: &[&str] = &["成交量", "volume"];
const AMOUNT: &[&str] = &["成交额", "amount"];
const TURNOVER: &[&str] = &["换手率", "turnover"];
const CODE: &[&str] = &["代码", "code"];
const NAME: &[&str] = &["名称", "name"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Column positions resolved from the header row.
struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    amount: Option<usize>,
    turnover: Option<usize>,
}

fn find(headers: &StringRecord, aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().trim_start_matches('\u{feff}');
        aliases.iter().any(|a| h.eq_ignore_ascii_case(a))
    })
}

impl Columns {
    fn resolve(code: &str, headers: &StringRecord) -> Result<Self, RevscanError> {
        let required = |aliases: &[&str]| {
            find(headers, aliases).ok_or_else(|| RevscanError::MalformedSeries {
                code: code.to_string(),
                reason: format!("missing {} column", aliases[aliases.len() - 1]),
            })
        };
        Ok(Columns {
            date: required(DATE)?,
            open: required(OPEN)?,
            high: required(HIGH)?,
            low: required(LOW)?,
            close: required(CLOSE)?,
            volume: required(VOLUME)?,
            amount: find(headers, AMOUNT),
            turnover: find(headers, TURNOVER),
        })
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn parse(&self, code: &str, content: &str) -> Result<Vec<PriceBar>, RevscanError> {
        let malformed = |reason: String| RevscanError::MalformedSeries {
            code: code.to_string(),
            reason,
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| malformed(format!("CSV header error: {}", e)))?
            .clone();
        let cols = Columns::resolve(code, &headers)?;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| malformed(format!("CSV parse error: {}", e)))?;
            let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");
            let number = |idx: usize, name: &str| -> Result<f64, RevscanError> {
                field(idx)
                    .parse::<f64>()
                    .map_err(|e| malformed(format!("row {}: invalid {} value: {}", row + 1, name, e)))
            };
            let optional = |idx: Option<usize>| {
                idx.map(field)
                    .filter(|v| !v.is_empty())
                    .and_then(|v| v.parse::<f64>().ok())
            };

            let date = parse_date(field(cols.date))
                .ok_or_else(|| malformed(format!("row {}: invalid date '{}'", row + 1, field(cols.date))))?;
            let volume = number(cols.volume, "volume")?;

            bars.push(PriceBar {
                date,
                open: number(cols.open, "open")?,
                high: number(cols.high, "high")?,
                low: number(cols.low, "low")?,
                close: number(cols.close, "close")?,
                volume: volume.round() as i64,
                turnover: optional(cols.turnover),
                amount: optional(cols.amount),
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl SeriesSource for CsvAdapter {
    fn list_codes(&self) -> Result<Vec<String>, RevscanError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RevscanError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RevscanError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                codes.push(stem.to_string());
            }
        }

        codes.sort();
        Ok(codes)
    }

    fn load(&self, code: &str) -> Result<PriceSeries, RevscanError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| RevscanError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let bars = self.parse(code, &content)?;
        PriceSeries::new(code, bars)
    }
}

/// Read a `code,name` list. Numeric codes are zero-padded to six digits.
pub fn read_security_names(path: &Path) -> Result<SecurityNames, RevscanError> {
    let failed = |reason: String| RevscanError::DataSource {
        reason: format!("{}: {}", path.display(), reason),
    };

    let content = fs::read_to_string(path).map_err(|e| failed(e.to_string()))?;
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr.headers().map_err(|e| failed(e.to_string()))?.clone();
    let (Some(code_col), Some(name_col)) = (find(&headers, CODE), find(&headers, NAME)) else {
        return Err(failed("missing code or name column".to_string()));
    };

    let mut entries = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| failed(e.to_string()))?;
        let code = record.get(code_col).map(str::trim).unwrap_or("");
        let name = record.get(name_col).map(str::trim).unwrap_or("");
        if code.is_empty() {
            continue;
        }
        let code = if code.chars().all(|c| c.is_ascii_digit()) {
            format!("{:0>6}", code)
        } else {
            code.to_string()
        };
        entries.push((code, name.to_string()));
    }
    Ok(SecurityNames::new(entries))
}
