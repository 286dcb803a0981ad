use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tresor_core::{DraftTransaction, Money};

/// Description given to rows whose description cell is blank or absent.
pub const PLACEHOLDER_DESCRIPTION: &str = "Imported Transaction";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// Header matching runs on lower-cased, accent-folded text. Candidates are in
// priority order; "tail" also catches mis-decoded exports ("DÃ©tail").
const DATE_CANDIDATES: &[&str] = &["date"];
const DESCRIPTION_CANDIDATES: &[&str] = &["detail", "tail", "libell", "desc", "label"];
const AMOUNT_CANDIDATES: &[&str] = &["montant", "amount", "debit", "credit"];
const LOCALE_DATE_MARKERS: &[&str] = &["date de"];

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];
const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£', '¥'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Date,
    Description,
    Amount,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Date => write!(f, "date"),
            Field::Description => write!(f, "description"),
            Field::Amount => write!(f, "amount"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("File is not valid UTF-8 (invalid byte at offset {offset})")]
    Decode { offset: usize },
    #[error("Unsupported text encoding: {0}")]
    UnsupportedEncoding(&'static str),
    #[error("Could not find a header row (expected a line starting with \"Date\")")]
    HeaderNotFound,
    #[error("Missing required column: {0}")]
    MissingColumn(Field),
    #[error("File is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("File has more than {limit} data rows")]
    TooManyRows { limit: usize },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CsvError {
    /// Which step of normalization rejected the file.
    pub fn stage(&self) -> &'static str {
        match self {
            CsvError::Decode { .. } | CsvError::UnsupportedEncoding(_) => "decode",
            CsvError::HeaderNotFound | CsvError::Csv(_) => "header",
            CsvError::MissingColumn(_) => "columns",
            CsvError::TooLarge { .. } | CsvError::TooManyRows { .. } => "limits",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImportLimits {
    pub max_bytes: usize,
    pub max_rows: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            max_rows: 50_000,
        }
    }
}

/// Why a data row was left out of the drafts. Not an error: the batch goes on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    MissingValue { field: Field },
    InvalidDate { value: String },
    InvalidAmount { value: String },
    Malformed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number in the uploaded file.
    pub line: u64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedStatement {
    pub drafts: Vec<DraftTransaction>,
    pub skipped: Vec<SkippedRow>,
}

impl NormalizedStatement {
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

/// How the sign of a cell is read. Split exports put outflows and inflows in
/// separate unsigned columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountSign {
    AsWritten,
    Outflow,
    Inflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnMapping {
    date: Vec<usize>,
    description: Vec<usize>,
    amount: Vec<(usize, AmountSign)>,
}

impl ColumnMapping {
    fn resolve(headers: &StringRecord) -> Result<Self, CsvError> {
        let folded: Vec<String> = headers.iter().map(fold_header).collect();

        let date = matching_columns(&folded, DATE_CANDIDATES)
            .into_iter()
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        if date.is_empty() {
            return Err(CsvError::MissingColumn(Field::Date));
        }

        let amount = matching_columns(&folded, AMOUNT_CANDIDATES)
            .into_iter()
            .map(|(idx, candidate)| {
                let sign = match candidate {
                    "debit" => AmountSign::Outflow,
                    "credit" => AmountSign::Inflow,
                    _ => AmountSign::AsWritten,
                };
                (idx, sign)
            })
            .collect::<Vec<_>>();
        if amount.is_empty() {
            return Err(CsvError::MissingColumn(Field::Amount));
        }

        let description = matching_columns(&folded, DESCRIPTION_CANDIDATES)
            .into_iter()
            .map(|(idx, _)| idx)
            .filter(|idx| !date.contains(idx) && !amount.iter().any(|(a, _)| a == idx))
            .collect();

        Ok(ColumnMapping {
            date,
            description,
            amount,
        })
    }
}

/// Columns whose header contains a candidate, in candidate priority order.
fn matching_columns<'c>(folded: &[String], candidates: &[&'c str]) -> Vec<(usize, &'c str)> {
    let mut found: Vec<(usize, &'c str)> = Vec::new();
    for candidate in candidates {
        for (idx, header) in folded.iter().enumerate() {
            if header.contains(candidate) && !found.iter().any(|(i, _)| *i == idx) {
                found.push((idx, *candidate));
            }
        }
    }
    found
}

fn fold_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' | 'á' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' => 'i',
            'ô' | 'ö' | 'ó' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn decode(data: &[u8]) -> Result<&str, CsvError> {
    if data.starts_with(b"\xFF\xFE") || data.starts_with(b"\xFE\xFF") {
        return Err(CsvError::UnsupportedEncoding("UTF-16"));
    }
    let (body, skipped) = match data.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, UTF8_BOM.len()),
        None => (data, 0),
    };
    std::str::from_utf8(body).map_err(|e| CsvError::Decode {
        offset: skipped + e.valid_up_to(),
    })
}

fn is_header_line(line: &str) -> bool {
    let line = line
        .trim()
        .trim_start_matches(['"', '\''])
        .to_lowercase();
    line.starts_with("date") || LOCALE_DATE_MARKERS.iter().any(|m| line.contains(m))
}

/// Returns the number of lines dropped before the header and the text from the
/// header onwards. Bank exports often open with account metadata.
fn locate_header(text: &str) -> Result<(u64, &str), CsvError> {
    let mut offset = 0;
    for (idx, line) in text.split_inclusive('\n').enumerate() {
        if is_header_line(line) {
            return Ok((idx as u64, &text[offset..]));
        }
        offset += line.len();
    }
    Err(CsvError::HeaderNotFound)
}

fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains(';') {
        b';'
    } else {
        b','
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_amount(s: &str) -> Option<Money> {
    let s: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    let (negative, s) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner.to_string()),
        None => (false, s),
    };

    // With both separators present the later one is the decimal mark.
    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        _ => s,
    };
    let normalized = normalized.strip_prefix('+').unwrap_or(&normalized);
    if normalized.is_empty() {
        return None;
    }

    let mut dec = Decimal::from_str(normalized).ok()?;
    if negative {
        dec = -dec;
    }
    Some(Money::from_decimal(dec))
}

fn first_value<'r, I>(record: &'r StringRecord, columns: I) -> Option<(usize, &'r str)>
where
    I: IntoIterator<Item = usize>,
{
    columns
        .into_iter()
        .filter_map(|idx| record.get(idx).map(|v| (idx, v.trim())))
        .find(|(_, v)| !v.is_empty())
}

fn parse_row(record: &StringRecord, mapping: &ColumnMapping) -> Result<DraftTransaction, SkipReason> {
    let (_, date_raw) = first_value(record, mapping.date.iter().copied()).ok_or(SkipReason::MissingValue {
        field: Field::Date,
    })?;
    let date = parse_date(date_raw).ok_or_else(|| SkipReason::InvalidDate {
        value: date_raw.to_string(),
    })?;

    let (amount_idx, amount_raw) = first_value(record, mapping.amount.iter().map(|(idx, _)| *idx))
        .ok_or(SkipReason::MissingValue {
            field: Field::Amount,
        })?;
    // Amounts must fit the ledger's cent representation.
    let amount = parse_amount(amount_raw)
        .filter(|amount| amount.to_cents().is_ok())
        .ok_or_else(|| SkipReason::InvalidAmount {
            value: amount_raw.to_string(),
        })?;
    let amount = match mapping.amount.iter().find(|(idx, _)| *idx == amount_idx) {
        Some((_, AmountSign::Outflow)) => -amount.abs(),
        Some((_, AmountSign::Inflow)) => amount.abs(),
        _ => amount,
    };

    let description = first_value(record, mapping.description.iter().copied())
        .map(|(_, v)| v)
        .unwrap_or(PLACEHOLDER_DESCRIPTION);

    Ok(DraftTransaction::new(date, description, amount))
}

pub fn normalize(data: &[u8]) -> Result<NormalizedStatement, CsvError> {
    normalize_with_limits(data, &ImportLimits::default())
}

/// Turns an uploaded bank statement into drafts. File-level problems abort;
/// row-level problems are collected in `skipped` and the rest of the file is kept.
pub fn normalize_with_limits(
    data: &[u8],
    limits: &ImportLimits,
) -> Result<NormalizedStatement, CsvError> {
    if data.len() > limits.max_bytes {
        return Err(CsvError::TooLarge {
            size: data.len(),
            limit: limits.max_bytes,
        });
    }

    let text = decode(data)?;
    let (lines_before_header, body) = locate_header(text)?;
    let header_line = body.lines().next().unwrap_or_default();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(detect_delimiter(header_line))
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let mapping = ColumnMapping::resolve(&headers)?;

    let mut statement = NormalizedStatement::default();
    for (index, result) in reader.records().enumerate() {
        if index >= limits.max_rows {
            return Err(CsvError::TooManyRows {
                limit: limits.max_rows,
            });
        }

        match result {
            Ok(record) => {
                if record.iter().all(|field| field.trim().is_empty()) {
                    continue;
                }
                let line = lines_before_header + record.position().map_or(0, |p| p.line());
                match parse_row(&record, &mapping) {
                    Ok(draft) => statement.drafts.push(draft),
                    Err(reason) => statement.skipped.push(SkippedRow { line, reason }),
                }
            }
            Err(e) => {
                let line = lines_before_header + e.position().map_or(0, |p| p.line());
                statement.skipped.push(SkippedRow {
                    line,
                    reason: SkipReason::Malformed {
                        message: e.to_string(),
                    },
                });
            }
        }
    }

    Ok(statement)
}
