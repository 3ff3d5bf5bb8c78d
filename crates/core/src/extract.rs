use crate::sanitize::strip_matched_span;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const TWO_DIGIT_YEAR_PIVOT: u32 = 80;

const MONTH_ABBREVS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

// ハイフン+4桁年は常に日-月-年として読む (12-03-2024 は 2024年3月12日)。
const DATE_PATTERN_PRIORITY: &[DatePattern] = &[
    DatePattern::YearMonthDay,
    DatePattern::DayMonthYear,
    DatePattern::YearFirstCompact,
    DatePattern::MonthFirstCompact,
    DatePattern::DayMonthNameYear,
    DatePattern::MonthNameDayYear,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePattern {
    Timestamp,
    YearMonthDay,
    DayMonthYear,
    YearFirstCompact,
    MonthFirstCompact,
    DayMonthNameYear,
    MonthNameDayYear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DateCandidate {
    start: usize,
    end: usize,
    date: NaiveDate,
    pattern: DatePattern,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TimestampCandidate {
    start: usize,
    end: usize,
    date: NaiveDate,
    time: NaiveTime,
    millis: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub stamp: String,
    pub pattern: DatePattern,
    pub residual: String,
    pub extension: String,
}

pub fn extract(filename: &str) -> Option<Extraction> {
    let (stem, extension) = split_extension(filename);
    if !stem.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    if let Some(found) = find_timestamp(stem) {
        let mut stamp = format!(
            "{:04}{:02}{:02}T{:02}{:02}{:02}",
            found.date.year(),
            found.date.month(),
            found.date.day(),
            found.time.hour(),
            found.time.minute(),
            found.time.second()
        );
        if let Some(millis) = found.millis {
            stamp.push_str(&format!(".{millis:03}"));
        }
        return Some(Extraction {
            stamp,
            pattern: DatePattern::Timestamp,
            residual: strip_matched_span(stem, found.start, found.end),
            extension: extension.to_string(),
        });
    }

    let found = find_date(stem)?;
    Some(Extraction {
        stamp: format!(
            "{:04}{:02}{:02}",
            found.date.year(),
            found.date.month(),
            found.date.day()
        ),
        pattern: found.pattern,
        residual: strip_matched_span(stem, found.start, found.end),
        extension: extension.to_string(),
    })
}

// 正規化済みプレフィックス (YYYYMMDD_ / YYYYMMDDTHHMMSS[.mmm]_) で始まるか。
pub fn has_canonical_prefix(filename: &str) -> bool {
    let (stem, _) = split_extension(filename);
    let bytes = stem.as_bytes();
    let Some(year) = digits(bytes, 0, 4) else {
        return false;
    };
    let Some(month) = digits(bytes, 4, 2) else {
        return false;
    };
    let Some(day) = digits(bytes, 6, 2) else {
        return false;
    };
    if NaiveDate::from_ymd_opt(year as i32, month, day).is_none() {
        return false;
    }

    match bytes.get(8) {
        Some(b'_') => true,
        Some(b'T') => {
            let Some(hour) = digits(bytes, 9, 2) else {
                return false;
            };
            let Some(minute) = digits(bytes, 11, 2) else {
                return false;
            };
            let Some(second) = digits(bytes, 13, 2) else {
                return false;
            };
            if NaiveTime::from_hms_opt(hour, minute, second).is_none() {
                return false;
            }
            match bytes.get(15) {
                Some(b'_') => true,
                Some(b'.') => digits(bytes, 16, 3).is_some() && bytes.get(19) == Some(&b'_'),
                _ => false,
            }
        }
        _ => false,
    }
}

fn find_timestamp(stem: &str) -> Option<TimestampCandidate> {
    let bytes = stem.as_bytes();
    for start in 0..bytes.len() {
        if start > 0 && bytes[start - 1].is_ascii_digit() {
            continue;
        }
        if let Some(candidate) = match_timestamp_at(bytes, start) {
            return Some(candidate);
        }
    }
    None
}

fn match_timestamp_at(bytes: &[u8], start: usize) -> Option<TimestampCandidate> {
    let year = digits(bytes, start, 4)?;
    let month = digits(bytes, start + 4, 2)?;
    let day = digits(bytes, start + 6, 2)?;
    separator_at(bytes, start + 8)?;
    let time_start = start + 9;
    let hour = digits(bytes, time_start, 2)?;
    let minute = digits(bytes, time_start + 2, 2)?;
    let second = digits(bytes, time_start + 4, 2)?;
    let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    let (millis, end) = match digits(bytes, time_start + 6, 3) {
        Some(millis) => (Some(millis), time_start + 9),
        None => (None, time_start + 6),
    };
    Some(TimestampCandidate {
        start,
        end,
        date,
        time,
        millis,
    })
}

fn find_date(stem: &str) -> Option<DateCandidate> {
    let bytes = stem.as_bytes();
    for start in 0..bytes.len() {
        for &pattern in DATE_PATTERN_PRIORITY {
            if let Some(candidate) = match_pattern_at(bytes, start, pattern) {
                return Some(candidate);
            }
        }
    }
    None
}

fn match_pattern_at(bytes: &[u8], start: usize, pattern: DatePattern) -> Option<DateCandidate> {
    match pattern {
        DatePattern::Timestamp => None,
        DatePattern::YearMonthDay => {
            let year = digits(bytes, start, 4)?;
            separator_at(bytes, start + 4)?;
            let month = digits(bytes, start + 5, 2)?;
            separator_at(bytes, start + 7)?;
            let day = digits(bytes, start + 8, 2)?;
            candidate(start, start + 10, year as i32, month, day, pattern)
        }
        DatePattern::DayMonthYear => {
            let day = digits(bytes, start, 2)?;
            separator_at(bytes, start + 2)?;
            let month = digits(bytes, start + 3, 2)?;
            separator_at(bytes, start + 5)?;
            let year = digits(bytes, start + 6, 4)?;
            candidate(start, start + 10, year as i32, month, day, pattern)
        }
        DatePattern::YearFirstCompact => {
            compact_run_at(bytes, start)?;
            let year = digits(bytes, start, 4)?;
            let month = digits(bytes, start + 4, 2)?;
            let day = digits(bytes, start + 6, 2)?;
            candidate(start, start + 8, year as i32, month, day, pattern)
        }
        DatePattern::MonthFirstCompact => {
            compact_run_at(bytes, start)?;
            let month = digits(bytes, start, 2)?;
            let day = digits(bytes, start + 2, 2)?;
            let year = digits(bytes, start + 4, 4)?;
            candidate(start, start + 8, year as i32, month, day, pattern)
        }
        DatePattern::DayMonthNameYear => {
            for day_len in [2usize, 1] {
                let Some(day) = digits(bytes, start, day_len) else {
                    continue;
                };
                let mut pos = start + day_len;
                if separator_at(bytes, pos).is_some() {
                    pos += 1;
                }
                let Some(month) = month_at(bytes, pos) else {
                    continue;
                };
                pos += 3;
                if separator_at(bytes, pos).is_some() {
                    pos += 1;
                }
                let Some((year, end)) = year_at(bytes, pos) else {
                    continue;
                };
                if let Some(found) = candidate(start, end, year, month, day, pattern) {
                    return Some(found);
                }
            }
            None
        }
        DatePattern::MonthNameDayYear => {
            let month = month_at(bytes, start)?;
            let mut pos = start + 3;
            if separator_at(bytes, pos).is_some() {
                pos += 1;
            }
            for day_len in [2usize, 1] {
                let Some(day) = digits(bytes, pos, day_len) else {
                    continue;
                };
                let mut year_pos = pos + day_len;
                if matches!(bytes.get(year_pos), Some(b'-' | b'_' | b',')) {
                    year_pos += 1;
                }
                let Some((year, end)) = year_at(bytes, year_pos) else {
                    continue;
                };
                if let Some(found) = candidate(start, end, year, month, day, pattern) {
                    return Some(found);
                }
            }
            None
        }
    }
}

fn candidate(
    start: usize,
    end: usize,
    year: i32,
    month: u32,
    day: u32,
    pattern: DatePattern,
) -> Option<DateCandidate> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(DateCandidate {
        start,
        end,
        date,
        pattern,
    })
}

// 4桁年を優先し、なければ直後に数字が続かない2桁年を西暦へ展開する。
fn year_at(bytes: &[u8], start: usize) -> Option<(i32, usize)> {
    if let Some(year) = digits(bytes, start, 4) {
        if !is_digit_at(bytes, start + 4) {
            return Some((year as i32, start + 4));
        }
    }
    let year = digits(bytes, start, 2)?;
    if is_digit_at(bytes, start + 2) {
        return None;
    }
    Some((expand_two_digit_year(year), start + 2))
}

fn expand_two_digit_year(year: u32) -> i32 {
    if year < TWO_DIGIT_YEAR_PIVOT {
        2000 + year as i32
    } else {
        1900 + year as i32
    }
}

fn month_at(bytes: &[u8], start: usize) -> Option<u32> {
    if start + 3 > bytes.len() {
        return None;
    }
    let name = [
        bytes[start].to_ascii_lowercase(),
        bytes[start + 1].to_ascii_lowercase(),
        bytes[start + 2].to_ascii_lowercase(),
    ];
    MONTH_ABBREVS
        .iter()
        .position(|abbrev| abbrev.as_bytes() == &name[..])
        .map(|index| index as u32 + 1)
}

// 8桁連続パターンはより長い数字列の一部であってはならない。
fn compact_run_at(bytes: &[u8], start: usize) -> Option<()> {
    let preceded = start > 0 && bytes[start - 1].is_ascii_digit();
    let followed = is_digit_at(bytes, start + 8);
    (!preceded && !followed).then_some(())
}

fn separator_at(bytes: &[u8], index: usize) -> Option<()> {
    matches!(bytes.get(index), Some(b'-' | b'_')).then_some(())
}

fn digits(bytes: &[u8], start: usize, len: usize) -> Option<u32> {
    if start + len > bytes.len() {
        return None;
    }
    let mut value = 0u32;
    for &b in &bytes[start..start + len] {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value * 10 + u32::from(b - b'0');
    }
    Some(value)
}

fn is_digit_at(bytes: &[u8], index: usize) -> bool {
    index < bytes.len() && bytes[index].is_ascii_digit()
}

fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(index) if index > 0 => filename.split_at(index),
        _ => (filename, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::{extract, has_canonical_prefix, DatePattern};

    #[test]
    fn extracts_year_month_day_with_mixed_text() {
        let found = extract("data_2023-12-25_raw.csv").expect("must match");
        assert_eq!(found.stamp, "20231225");
        assert_eq!(found.residual, "data_raw");
        assert_eq!(found.extension, ".csv");
        assert_eq!(found.pattern, DatePattern::YearMonthDay);
    }

    #[test]
    fn extracts_underscore_separated_year_first_date() {
        let found = extract("2024_01_15_meeting.docx").expect("must match");
        assert_eq!(found.stamp, "20240115");
        assert_eq!(found.residual, "meeting");
    }

    #[test]
    fn dash_four_digit_year_is_day_first() {
        // 12-03-2024 は 2024年3月12日。月-日-年ではない。
        let found = extract("invoice_12-03-2024.pdf").expect("must match");
        assert_eq!(found.stamp, "20240312");
        assert_eq!(found.residual, "invoice");
        assert_eq!(found.pattern, DatePattern::DayMonthYear);
    }

    #[test]
    fn extracts_month_name_first_with_single_digit_day() {
        let found = extract("report_Mar_8_21.txt").expect("must match");
        assert_eq!(found.stamp, "20210308");
        assert_eq!(found.residual, "report");
        assert_eq!(found.pattern, DatePattern::MonthNameDayYear);
    }

    #[test]
    fn extracts_day_month_name_with_four_digit_year() {
        let found = extract("summary_08Dec2022.xlsx").expect("must match");
        assert_eq!(found.stamp, "20221208");
        assert_eq!(found.residual, "summary");
        assert_eq!(found.pattern, DatePattern::DayMonthNameYear);
    }

    #[test]
    fn month_name_is_case_insensitive() {
        let found = extract("notes_14-DEC-21.md").expect("must match");
        assert_eq!(found.stamp, "20211214");
        assert_eq!(found.residual, "notes");
    }

    #[test]
    fn month_name_day_accepts_comma_before_year() {
        let found = extract("memo_Mar8,21.txt").expect("must match");
        assert_eq!(found.stamp, "20210308");
        assert_eq!(found.residual, "memo");
    }

    #[test]
    fn extracts_compact_month_first_date() {
        let found = extract("report_03152024.txt").expect("must match");
        assert_eq!(found.stamp, "20240315");
        assert_eq!(found.residual, "report");
        assert_eq!(found.pattern, DatePattern::MonthFirstCompact);
    }

    #[test]
    fn extracts_compact_year_first_date() {
        let found = extract("IMG-20260204-WA0002.jpeg").expect("must match");
        assert_eq!(found.stamp, "20260204");
        assert_eq!(found.residual, "IMG_WA0002");
        assert_eq!(found.pattern, DatePattern::YearFirstCompact);

        let found = extract("photo_20250815_archived.jpg").expect("must match");
        assert_eq!(found.stamp, "20250815");
        assert_eq!(found.residual, "photo_archived");
    }

    #[test]
    fn compact_pattern_ignores_longer_digit_runs() {
        assert!(extract("serial_202503151.bin").is_none());
    }

    #[test]
    fn returns_none_without_any_date() {
        assert!(extract("no_date_here.txt").is_none());
    }

    #[test]
    fn returns_none_when_no_reading_is_a_valid_date() {
        assert!(extract("photo_13-13-2024.jpg").is_none());
    }

    #[test]
    fn rejects_invalid_calendar_day() {
        assert!(extract("report_13-45-2024.txt").is_none());
        assert!(extract("scan_2023-04-31.pdf").is_none());
    }

    #[test]
    fn earliest_match_wins_over_later_dates() {
        let found = extract("2024-01-15_report_Mar-8-21.txt").expect("must match");
        assert_eq!(found.stamp, "20240115");
        assert_eq!(found.residual, "report_Mar_8_21");
    }

    #[test]
    fn two_digit_year_pivot_is_1980() {
        let found = extract("log_05Jan80.txt").expect("must match");
        assert_eq!(found.stamp, "19800105");
        let found = extract("log_05Jan79.txt").expect("must match");
        assert_eq!(found.stamp, "20790105");
    }

    #[test]
    fn extracts_timestamp_with_milliseconds() {
        let found = extract("PXL_20260204_181153683.MP.jpg").expect("must match");
        assert_eq!(found.stamp, "20260204T181153.683");
        assert_eq!(found.residual, "PXL.MP");
        assert_eq!(found.extension, ".jpg");
        assert_eq!(found.pattern, DatePattern::Timestamp);
    }

    #[test]
    fn extracts_timestamp_without_milliseconds() {
        let found = extract("photo_20240315_120530.jpg").expect("must match");
        assert_eq!(found.stamp, "20240315T120530");
        assert_eq!(found.residual, "photo");
    }

    #[test]
    fn timestamp_survives_long_prefixes() {
        let found = extract("original_066327a2-b97c-416a-b6db-b6296a669edf_PXL_20260204_181153683.MP.jpg")
            .expect("must match");
        assert_eq!(found.stamp, "20260204T181153.683");
        assert_eq!(found.residual, "original_066327a2_b97c_416a_b6db_b6296a669edf_PXL.MP");
    }

    #[test]
    fn timestamp_takes_precedence_over_earlier_date() {
        let found = extract("2023-12-25_PXL_20260204_181153.jpg").expect("must match");
        assert_eq!(found.stamp, "20260204T181153");
        assert_eq!(found.residual, "2023_12_25_PXL");
    }

    #[test]
    fn invalid_timestamp_falls_back_to_date_patterns() {
        // 時刻が 25:61:99 で無効なので日付のみ拾う。
        let found = extract("cam_20240315_256199.jpg").expect("must match");
        assert_eq!(found.stamp, "20240315");
        assert_eq!(found.pattern, DatePattern::YearFirstCompact);
        assert_eq!(found.residual, "cam_256199");
    }

    #[test]
    fn all_date_stem_yields_empty_residual() {
        let found = extract("2024-01-15.pdf").expect("must match");
        assert_eq!(found.stamp, "20240115");
        assert_eq!(found.residual, "");
        assert_eq!(found.extension, ".pdf");
    }

    #[test]
    fn extension_is_preserved_verbatim() {
        let found = extract("REPORT_2024-01-15.TXT").expect("must match");
        assert_eq!(found.extension, ".TXT");
        let found = extract("2024-01-15_dump").expect("must match");
        assert_eq!(found.extension, "");
        assert_eq!(found.residual, "dump");
    }

    #[test]
    fn normalized_name_re_extracts_to_itself() {
        let found = extract("20240312_invoice.pdf").expect("must match");
        assert_eq!(found.stamp, "20240312");
        assert_eq!(found.residual, "invoice");
    }

    #[test]
    fn detects_canonical_prefixes() {
        assert!(has_canonical_prefix("20240312_invoice.pdf"));
        assert!(has_canonical_prefix("20260204T181153_PXL.jpg"));
        assert!(has_canonical_prefix("20260204T181153.683_PXL.MP.jpg"));
        assert!(!has_canonical_prefix("invoice_12-03-2024.pdf"));
        assert!(!has_canonical_prefix("12345678_x.txt"));
        assert!(!has_canonical_prefix("20240312-invoice.pdf"));
        assert!(!has_canonical_prefix("20240312.pdf"));
    }
}
