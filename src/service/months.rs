use chrono::{Datelike, Local, Months, NaiveDate};

/// "May 2025"
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

pub fn current_month_label() -> String {
    month_label(Local::now().date_naive())
}

/// 英文月份名 (全称或前三个字母) -> 1..=12
pub fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// 两位年份按 20xx 处理
pub fn expand_year(year: i32) -> i32 {
    if year < 100 {
        2000 + year
    } else {
        year
    }
}

/// 当前月份及之前 11 个月，新的在前
pub fn month_options(today: NaiveDate) -> Vec<String> {
    let first = today.with_day(1).unwrap_or(today);
    (0..12)
        .filter_map(|i| first.checked_sub_months(Months::new(i)))
        .map(month_label)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_long_month_name() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        assert_eq!(month_label(date), "May 2025");
        let date = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();
        assert_eq!(month_label(date), "September 2024");
    }

    #[test]
    fn month_names_accept_abbreviations() {
        assert_eq!(month_from_name("Sep"), Some(9));
        assert_eq!(month_from_name("SEPTEMBER"), Some(9));
        assert_eq!(month_from_name("Sept"), Some(9));
        assert_eq!(month_from_name("Foo"), None);
        assert_eq!(month_from_name("Ma"), None);
    }

    #[test]
    fn options_cross_year_boundary() {
        let today = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        let options = month_options(today);
        assert_eq!(options.len(), 12);
        assert_eq!(options[0], "February 2025");
        assert_eq!(options[1], "January 2025");
        assert_eq!(options[2], "December 2024");
        assert_eq!(options[11], "March 2024");
    }
}
