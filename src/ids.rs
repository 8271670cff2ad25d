//! Canonical ID grammar for every entity in the store.
//!
//! Grammar (v1):
//!
//! ```text
//! company/<ticker>
//! sector/<sector_name>
//! macro/<regime>
//! ai_adoption/<theme_or_sector>
//! pattern/<pattern_name>
//! risk/<portfolio_or_policy_state>
//!
//! company/<ticker>/quarter/<YYYY-Q#>
//! company/<ticker>/earnings/<YYYY-MM-DD>
//! company/<ticker>/filing/<YYYY-MM-DD>/<kind>
//! company/<ticker>/news/<event_id>
//! company/<ticker>/catalyst/<event_id>
//!
//! thesis/<ticker>/<mode>/<window>
//! ```
//!
//! Tickers are uppercased with `.`, `-`, `_` preserved (AHT.L stays AHT.L).
//! Every other segment is slugified to lowercase `[a-z0-9._-]`. IDs are plain
//! strings used consistently across containers, KG nodes, and write events.

use crate::constants::ALLOWED_THESIS_MODES;
use crate::error::{Error, Result};
use crate::timefmt;

/// Normalize an arbitrary value into a safe canonical ID segment.
///
/// Lowercases, trims, maps `/` `\` and spaces to `_`, strips anything outside
/// `[a-z0-9._-]`, collapses runs of the same separator, and trims separators
/// from both ends. An empty result is an error.
pub fn slugify_segment(value: &str) -> Result<String> {
    let slug = slugify_lossy(value);
    if slug.is_empty() {
        return Err(Error::InvalidId(format!(
            "segment {value:?} is empty after normalization"
        )));
    }
    Ok(slug)
}

/// `slugify_segment` that maps an empty result to `""` instead of an error.
pub fn slugify_lossy(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last: Option<char> = None;
    for c in lowered.chars() {
        let c = match c {
            '/' | '\\' | ' ' => '_',
            other => other,
        };
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')) {
            continue;
        }
        // collapse runs of the same separator only
        if matches!(c, '.' | '_' | '-') && last == Some(c) {
            continue;
        }
        out.push(c);
        last = Some(c);
    }
    out.trim_matches(|c| matches!(c, '.' | '_' | '-')).to_string()
}

/// Normalize a ticker for canonical IDs.
///
/// Uppercases, strips all whitespace, preserves `.`, `-`, `_`. Accepts only
/// `[A-Z0-9]+([._-][A-Z0-9]+)*`; anything else (for example `AHT/L`) is an
/// `InvalidId`.
pub fn normalize_ticker(ticker: &str) -> Result<String> {
    let t: String = ticker
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if t.is_empty() {
        return Err(Error::InvalidId("ticker is empty".to_string()));
    }
    if !ticker_shape_ok(&t) {
        return Err(Error::InvalidId(format!("invalid ticker format: {ticker:?}")));
    }
    Ok(t)
}

fn ticker_shape_ok(t: &str) -> bool {
    let mut expect_alnum = true;
    for c in t.chars() {
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            expect_alnum = false;
        } else if matches!(c, '.' | '_' | '-') {
            if expect_alnum {
                return false;
            }
            expect_alnum = true;
        } else {
            return false;
        }
    }
    !expect_alnum
}

/// Two-letter uppercase country code, `"gb"` -> `"GB"`.
pub fn normalize_country_code(code: &str) -> Result<String> {
    let c = code.trim().to_uppercase();
    if c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_uppercase()) {
        return Err(Error::InvalidId(format!(
            "country code must be 2 letters, got {code:?}"
        )));
    }
    Ok(c)
}

/// Syntax-level check for canonical IDs: `root/<seg>(/<seg>)*` with a
/// lowercase root and `[A-Za-z0-9._-]` segments. Constructors layer stronger
/// semantic checks on top.
pub fn validate_canonical_id(canonical_id: &str) -> Result<String> {
    let cid = canonical_id.trim();
    if cid.is_empty() {
        return Err(Error::InvalidId("canonical id is empty".to_string()));
    }
    let mut parts = cid.split('/');
    let root = parts.next().unwrap_or_default();
    let mut root_chars = root.chars();
    let root_ok = matches!(root_chars.next(), Some(c) if c.is_ascii_lowercase())
        && root_chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !root_ok {
        return Err(Error::InvalidId(format!("invalid canonical id syntax: {cid:?}")));
    }
    let mut tail_segments = 0usize;
    for seg in parts {
        if seg.is_empty()
            || !seg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(Error::InvalidId(format!("invalid canonical id syntax: {cid:?}")));
        }
        tail_segments += 1;
    }
    if tail_segments == 0 {
        return Err(Error::InvalidId(format!("invalid canonical id syntax: {cid:?}")));
    }
    Ok(cid.to_string())
}

/// Parse `YYYY-Q#` into `(year, quarter)`. Quarter must be 1..=4 and the year
/// must fall in 1900..=3000.
pub fn parse_quarter_label(label: &str) -> Result<(i32, u8)> {
    let s = label.trim().to_uppercase();
    let (year_part, q_part) = s
        .split_once("-Q")
        .ok_or_else(|| Error::InvalidId(format!("invalid quarter label: {label:?}")))?;
    if year_part.len() != 4 || !year_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidId(format!("invalid quarter label: {label:?}")));
    }
    let year: i32 = year_part
        .parse()
        .map_err(|_| Error::InvalidId(format!("invalid quarter label: {label:?}")))?;
    let quarter: u8 = match q_part {
        "1" => 1,
        "2" => 2,
        "3" => 3,
        "4" => 4,
        _ => {
            return Err(Error::InvalidId(format!(
                "quarter must be 1..4 in label: {label:?}"
            )))
        }
    };
    if !(1900..=3000).contains(&year) {
        return Err(Error::InvalidId(format!("invalid year in quarter label: {label:?}")));
    }
    Ok((year, quarter))
}

/// Format `(year, quarter)` as `YYYY-Q#` with the same bounds as
/// [`parse_quarter_label`].
pub fn make_quarter_label(year: i32, quarter: u8) -> Result<String> {
    if !(1900..=3000).contains(&year) {
        return Err(Error::InvalidId(format!("invalid year for quarter label: {year}")));
    }
    if !(1..=4).contains(&quarter) {
        return Err(Error::InvalidId(format!("quarter must be 1..4, got {quarter}")));
    }
    Ok(format!("{year}-Q{quarter}"))
}

pub fn make_company_id(ticker: &str) -> Result<String> {
    let t = normalize_ticker(ticker)?;
    validate_canonical_id(&format!("company/{t}"))
}

pub fn make_sector_id(sector_name: &str) -> Result<String> {
    let seg = slugify_segment(sector_name)?;
    validate_canonical_id(&format!("sector/{seg}"))
}

pub fn make_macro_id(regime: &str) -> Result<String> {
    let seg = slugify_segment(regime)?;
    validate_canonical_id(&format!("macro/{seg}"))
}

pub fn make_ai_adoption_id(theme_or_sector: &str) -> Result<String> {
    let seg = slugify_segment(theme_or_sector)?;
    validate_canonical_id(&format!("ai_adoption/{seg}"))
}

pub fn make_pattern_id(pattern_name: &str) -> Result<String> {
    let seg = slugify_segment(pattern_name)?;
    validate_canonical_id(&format!("pattern/{seg}"))
}

pub fn make_risk_id(portfolio_or_policy_state: &str) -> Result<String> {
    let seg = slugify_segment(portfolio_or_policy_state)?;
    validate_canonical_id(&format!("risk/{seg}"))
}

/// `company/<ticker>/quarter/<YYYY-Q#>`
pub fn make_quarter_event_id(ticker: &str, year: i32, quarter: u8) -> Result<String> {
    let t = normalize_ticker(ticker)?;
    let label = make_quarter_label(year, quarter)?;
    validate_canonical_id(&format!("company/{t}/quarter/{label}"))
}

/// `make_quarter_event_id` from an existing `YYYY-Q#` label.
pub fn make_quarter_event_id_from_label(ticker: &str, quarter_label: &str) -> Result<String> {
    let (year, quarter) = parse_quarter_label(quarter_label)?;
    make_quarter_event_id(ticker, year, quarter)
}

/// `company/<ticker>/earnings/<YYYY-MM-DD>`
pub fn make_earnings_event_id(ticker: &str, ymd: &str) -> Result<String> {
    let t = normalize_ticker(ticker)?;
    let d = timefmt::date_str(ymd)?;
    validate_canonical_id(&format!("company/{t}/earnings/{d}"))
}

/// `company/<ticker>/filing/<YYYY-MM-DD>/<kind>` where kind is e.g.
/// `annual_report`, `half_year_results`, `trading_update`, `10q`, `10k`.
pub fn make_filing_event_id(ticker: &str, ymd: &str, kind: &str) -> Result<String> {
    let t = normalize_ticker(ticker)?;
    let d = timefmt::date_str(ymd)?;
    let k = slugify_segment(kind)?;
    validate_canonical_id(&format!("company/{t}/filing/{d}/{k}"))
}

/// `company/<ticker>/news/<event_id>`
pub fn make_news_event_id(ticker: &str, event_id: &str) -> Result<String> {
    let t = normalize_ticker(ticker)?;
    let e = slugify_segment(event_id)?;
    validate_canonical_id(&format!("company/{t}/news/{e}"))
}

/// `company/<ticker>/catalyst/<event_id>`
pub fn make_catalyst_event_id(ticker: &str, event_id: &str) -> Result<String> {
    let t = normalize_ticker(ticker)?;
    let e = slugify_segment(event_id)?;
    validate_canonical_id(&format!("company/{t}/catalyst/{e}"))
}

/// `thesis/<ticker>/<mode>/<window>`. The mode must be one of the allowed
/// thesis modes after slugification.
pub fn make_thesis_id(ticker: &str, mode: &str, window: &str) -> Result<String> {
    let t = normalize_ticker(ticker)?;
    let m = slugify_segment(mode)?;
    let w = slugify_segment(window)?;
    if !ALLOWED_THESIS_MODES.contains(&m.as_str()) {
        return Err(Error::InvalidId(format!(
            "invalid thesis mode: {mode:?} (allowed: {})",
            ALLOWED_THESIS_MODES.join(", ")
        )));
    }
    validate_canonical_id(&format!("thesis/{t}/{m}/{w}"))
}

pub fn is_company_id(canonical_id: &str) -> bool {
    match validate_canonical_id(canonical_id) {
        Ok(cid) => {
            let parts: Vec<&str> = cid.split('/').collect();
            parts.len() == 2 && parts[0] == "company"
        }
        Err(_) => false,
    }
}

pub fn is_thesis_id(canonical_id: &str) -> bool {
    match validate_canonical_id(canonical_id) {
        Ok(cid) => {
            let parts: Vec<&str> = cid.split('/').collect();
            parts.len() == 4 && parts[0] == "thesis"
        }
        Err(_) => false,
    }
}

/// True for `company/<ticker>/(quarter|earnings|filing|news|catalyst)/...`.
pub fn is_company_event_id(canonical_id: &str) -> bool {
    match validate_canonical_id(canonical_id) {
        Ok(cid) => {
            let parts: Vec<&str> = cid.split('/').collect();
            parts.len() >= 4
                && parts[0] == "company"
                && matches!(parts[2], "quarter" | "earnings" | "filing" | "news" | "catalyst")
        }
        Err(_) => false,
    }
}

/// Pre-normalized ticker with constructors for every ID rooted at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdBundle {
    ticker: String,
}

impl IdBundle {
    pub fn new(ticker: &str) -> Result<Self> {
        Ok(Self {
            ticker: normalize_ticker(ticker)?,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn company(&self) -> String {
        format!("company/{}", self.ticker)
    }

    pub fn quarter(&self, year: i32, quarter: u8) -> Result<String> {
        make_quarter_event_id(&self.ticker, year, quarter)
    }

    pub fn quarter_from_label(&self, quarter_label: &str) -> Result<String> {
        make_quarter_event_id_from_label(&self.ticker, quarter_label)
    }

    pub fn earnings(&self, ymd: &str) -> Result<String> {
        make_earnings_event_id(&self.ticker, ymd)
    }

    pub fn filing(&self, ymd: &str, kind: &str) -> Result<String> {
        make_filing_event_id(&self.ticker, ymd, kind)
    }

    pub fn news(&self, event_id: &str) -> Result<String> {
        make_news_event_id(&self.ticker, event_id)
    }

    pub fn catalyst(&self, event_id: &str) -> Result<String> {
        make_catalyst_event_id(&self.ticker, event_id)
    }

    pub fn thesis(&self, mode: &str, window: &str) -> Result<String> {
        make_thesis_id(&self.ticker, mode, window)
    }
}
