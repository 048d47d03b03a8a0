//! UPI 回执文本字段提取
//!
//! 每个字段对应一张按优先级排列的规则表，第一条命中的规则生效。
//! 规则从"带标签"到"裸模式"排列，所以带标签的结果总是优先于猜测。
//! 任何字段都可以缺失，提取本身不会失败。

use crate::models::ExtractedCandidate;
use crate::service::months::{self, expand_year, month_from_name};
use bigdecimal::{BigDecimal, Zero};
use chrono::{Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

/// 规则命中后取整段匹配还是某个捕获组
#[derive(Debug, Clone, Copy)]
enum Take {
    Whole,
    Group(usize),
}

struct Rule {
    pattern: Regex,
    take: Take,
}

impl Rule {
    fn new(pattern: &str, take: Take) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("receipt pattern must compile"),
            take,
        }
    }

    fn group(pattern: &str) -> Self {
        Self::new(pattern, Take::Group(1))
    }

    fn whole(pattern: &str) -> Self {
        Self::new(pattern, Take::Whole)
    }

    fn apply<'t>(&self, text: &'t str) -> Option<&'t str> {
        let caps = self.pattern.captures(text)?;
        let m = match self.take {
            Take::Whole => caps.get(0),
            Take::Group(i) => caps.get(i),
        }?;
        Some(m.as_str())
    }
}

/// 依次尝试规则，`accept` 返回 `Some` 即命中
fn first_accepted<F>(rules: &[Rule], text: &str, accept: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    rules
        .iter()
        .filter_map(|rule| rule.apply(text))
        .find_map(|value| accept(value))
}

fn trimmed_non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

static TRANSACTION_ID_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::group(r"(?i)(?:UPI transaction ID|UPI Ref|Ref No|Transaction ID)[:\s]+([A-Za-z0-9]+)"),
        Rule::group(r"(?i)UTR[:\s]+([0-9]+)"),
        // PhonePe: T25050205362948966034486
        Rule::whole(r"(?i)T[0-9]{20,}"),
        Rule::group(r"(?i)Google transaction ID[:\s]*([A-Za-z0-9]+)"),
        Rule::whole(r"[A-Za-z0-9]{10,}"),
        Rule::group(r"(?i)UTR[:\s]*([0-9]+)"),
    ]
});

const TRANSACTION_LINE_KEYWORDS: [&str; 4] = ["transaction id", "upi ref", "ref no", "utr"];

static TRANSACTION_LINE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9]{6,}").expect("receipt pattern must compile"));

static AMOUNT_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::group(r"₹\s*([0-9,]+(?:\.[0-9]{2})?)"),
        Rule::group(r"([0-9,]+)\s*₹"),
        Rule::group(r"(?i)(?:Amount|Rs|INR|Paid)[:\s]*([0-9,]+(?:\.[0-9]{2})?)"),
        Rule::group(r"(?i)(?:Amount|Rs|₹|INR|Paid)[:\s]*([0-9,.]+)"),
        Rule::group(r"([0-9]+,[0-9]+\.[0-9]+)"),
        Rule::group(r"([0-9]+\.[0-9]+)"),
        Rule::group(r"₹\s*([0-9,]+)"),
        Rule::group(r"₹([0-9]+)"),
        Rule::group(r"\s*([0-9,]+)"),
        Rule::group(r"([0-9]+)"),
    ]
});

static PAYEE_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::group(
            r"(?i)(?:Paid to|To)[:\s]+([A-Za-z0-9\s]+(?:WELFARE|ASSOCIATION|SOCIETY|APARTMENT|COMPLEX|RESIDENCY|TOWERS|ENCLAVE))",
        ),
        Rule::group(r"(?i)(?:Paid to|To)[:\s]+([A-Za-z0-9\s]+)"),
        Rule::group(r"(?i)To ([A-Za-z0-9\s]+)"),
    ]
});

static UPI_ID_RULES: Lazy<Vec<Rule>> =
    Lazy::new(|| vec![Rule::whole(r"[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+")]);

static PAYER_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule::group(r"(?i)From[:\s]+([A-Za-z0-9\s]+)"),
        Rule::group(r"(?i)Debited from[:\s]*([A-Za-z0-9\s]+)"),
        Rule::group(r"(?i)Google Pay[•\s]+([A-Za-z0-9._%+\-]+@[a-zA-Z0-9.\-]+)"),
    ]
});

/// 日期格式，每种格式自带解析器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// 2 May 2025
    DayMonthAbbrev,
    /// 2 September 2025
    DayMonthFull,
    /// 02/05/2025, 2-5-25 (日/月/年)
    Numeric,
    /// 4 Apr 2025, 9:01 am
    DayMonthTime,
}

struct DateRule {
    format: DateFormat,
    pattern: Regex,
}

static DATE_RULES: Lazy<Vec<DateRule>> = Lazy::new(|| {
    let rule = |format, pattern: &str| DateRule {
        format,
        pattern: Regex::new(pattern).expect("receipt pattern must compile"),
    };
    vec![
        rule(
            DateFormat::DayMonthAbbrev,
            r"(?i)[0-9]{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+[0-9]{4}",
        ),
        rule(
            DateFormat::DayMonthFull,
            r"(?i)[0-9]{1,2}\s+(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+[0-9]{4}",
        ),
        rule(DateFormat::Numeric, r"[0-9]{1,2}[-/][0-9]{1,2}[-/][0-9]{2,4}"),
        rule(
            DateFormat::DayMonthTime,
            r"(?i)[0-9]{1,2}\s+[A-Za-z]{3,}\s+[0-9]{4},\s+[0-9]{1,2}:[0-9]{2}\s*(?:am|pm)",
        ),
    ]
});

static NAMED_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{1,2})\s+([A-Za-z]+)\s+([0-9]{4})").expect("receipt pattern must compile")
});

static NUMERIC_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{1,2})[/-]([0-9]{1,2})[/-]([0-9]{2,4})").expect("receipt pattern must compile")
});

static TIMED_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9]{1,2})\s+([A-Za-z]+)\s+([0-9]{4}),\s+([0-9]{1,2}):([0-9]{2})\s*(am|pm)")
        .expect("receipt pattern must compile")
});

impl DateFormat {
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        match self {
            DateFormat::DayMonthAbbrev | DateFormat::DayMonthFull => parse_named(&NAMED_DATE, raw),
            DateFormat::DayMonthTime => parse_named(&TIMED_DATE, raw),
            DateFormat::Numeric => {
                let caps = NUMERIC_DATE.captures(raw)?;
                let day: u32 = caps[1].parse().ok()?;
                let month: u32 = caps[2].parse().ok()?;
                let year: i32 = caps[3].parse().ok()?;
                calendar_date(expand_year(year), month, day)
            }
        }
    }
}

/// 按日历进位构造日期
///
/// 超出范围的日、月向后顺延: 31/02/2025 为 2025-03-03，第 13 月为次年 1 月，
/// 第 0 日为上月最后一天。
fn calendar_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let months = i64::from(year) * 12 + i64::from(month) - 1;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12) + 1).ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_signed(Duration::days(i64::from(day) - 1))
}

fn parse_named(pattern: &Regex, raw: &str) -> Option<NaiveDate> {
    let caps = pattern.captures(raw)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_from_name(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    calendar_date(year, month, day)
}

/// 命中的日期原文及解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    pub raw: String,
    pub format: DateFormat,
    pub parsed: Option<NaiveDate>,
}

/// 合并连续空白并去掉首尾空白
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 金额字符串 -> 非负十进制
pub fn parse_amount(value: &str) -> Option<BigDecimal> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let amount = BigDecimal::from_str(value).ok()?;
    (amount >= BigDecimal::zero()).then_some(amount)
}

pub fn extract_transaction_id(normalized: &str, raw: &str) -> Option<String> {
    if let Some(id) = first_accepted(&TRANSACTION_ID_RULES, normalized, trimmed_non_empty) {
        return Some(id);
    }

    // 逐行兜底: 含关键字的行里第一个 6 位以上字母数字串
    raw.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            TRANSACTION_LINE_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .find_map(|line| TRANSACTION_LINE_TOKEN.find(line))
        .map(|m| m.as_str().to_string())
}

/// 逗号去掉后必须是合法非负数，否则看下一条规则
pub fn extract_amount(normalized: &str) -> Option<String> {
    first_accepted(&AMOUNT_RULES, normalized, |value| {
        let cleaned = value.replace(',', "");
        parse_amount(&cleaned).map(|_| cleaned)
    })
}

pub fn extract_date(normalized: &str) -> Option<DateMatch> {
    DATE_RULES.iter().find_map(|rule| {
        let m = rule.pattern.find(normalized)?;
        let raw = m.as_str().trim().to_string();
        Some(DateMatch {
            parsed: rule.format.parse(&raw),
            format: rule.format,
            raw,
        })
    })
}

pub fn extract_payee(normalized: &str) -> Option<String> {
    first_accepted(&PAYEE_RULES, normalized, trimmed_non_empty)
}

pub fn extract_upi_id(normalized: &str) -> Option<String> {
    first_accepted(&UPI_ID_RULES, normalized, |v| trimmed_non_empty(v).map(|v| v.to_lowercase()))
}

pub fn extract_payer(normalized: &str) -> Option<String> {
    first_accepted(&PAYER_RULES, normalized, trimmed_non_empty)
}

/// 以本地当前日期提取
pub fn extract_fields(text: &str) -> ExtractedCandidate {
    extract_fields_at(text, Local::now().date_naive())
}

/// `today` 只用于日期缺失时的月份兜底
pub fn extract_fields_at(text: &str, today: NaiveDate) -> ExtractedCandidate {
    let normalized = normalize(text);
    tracing::debug!("Parsing OCR text ({} chars)", normalized.len());

    let date = extract_date(&normalized);
    let month = match date.as_ref().and_then(|d| d.parsed) {
        Some(parsed) => months::month_label(parsed),
        None => {
            tracing::debug!("No parsable date, using current month");
            months::month_label(today)
        }
    };

    let candidate = ExtractedCandidate {
        transaction_id: extract_transaction_id(&normalized, text).unwrap_or_default(),
        amount: extract_amount(&normalized).unwrap_or_default(),
        date: date.map(|d| d.raw).unwrap_or_default(),
        payer_info: extract_payer(&normalized).unwrap_or_default(),
        payee_name: extract_payee(&normalized).unwrap_or_default(),
        upi_id: extract_upi_id(&normalized).unwrap_or_default(),
        month: Some(month),
    };

    tracing::debug!("Extracted candidate: {:?}", candidate);
    candidate
}
