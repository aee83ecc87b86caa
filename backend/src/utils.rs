use chrono::{Datelike, NaiveDate, Weekday};

/// Parse ISO8601 duration string (PT1H2M3S) to total seconds.
///
/// Hours, minutes and an optional leading day part must be integers, seconds
/// may be fractional and are truncated. Anything that does not parse is 0.
pub fn parse_iso8601_duration_to_seconds(duration_str: &str) -> i64 {
    let Some(rest) = duration_str.strip_prefix('P') else {
        return 0;
    };

    let (day_part, time_part) = match rest.split_once('T') {
        Some((days, time)) => (days, time),
        None => (rest, ""),
    };

    let mut total_seconds: i64 = 0;

    if !day_part.is_empty() {
        match day_part.strip_suffix('D').map(str::parse::<i64>) {
            Some(Ok(days)) if days >= 0 => match days.checked_mul(86_400) {
                Some(seconds) => total_seconds = seconds,
                None => return 0,
            },
            _ => return 0,
        }
    }

    let mut current_number = String::new();
    for ch in time_part.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            current_number.push(ch);
            continue;
        }

        let value = match ch {
            'H' | 'M' => match current_number.parse::<i64>() {
                Ok(num) => match num.checked_mul(if ch == 'H' { 3600 } else { 60 }) {
                    Some(seconds) => seconds,
                    None => return 0,
                },
                Err(_) => return 0,
            },
            'S' => match current_number.parse::<f64>() {
                Ok(num) if num.is_finite() && num >= 0.0 && num < i64::MAX as f64 => {
                    num.trunc() as i64
                }
                _ => return 0,
            },
            _ => return 0,
        };
        total_seconds = match total_seconds.checked_add(value) {
            Some(sum) => sum,
            None => return 0,
        };
        current_number.clear();
    }

    // Dangling digits without a unit designator.
    if !current_number.is_empty() {
        return 0;
    }

    total_seconds
}

/// English weekday name of a `YYYY-MM-DD` date, or "Unknown".
pub fn publication_day(date_str: &str) -> String {
    let day = date_str.get(..10).unwrap_or(date_str);
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(date) => weekday_name(date.weekday()).to_string(),
        Err(_) => "Unknown".to_string(),
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_durations() {
        assert_eq!(parse_iso8601_duration_to_seconds("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration_to_seconds("PT45S"), 45);
        assert_eq!(parse_iso8601_duration_to_seconds("PT2M"), 120);
        assert_eq!(parse_iso8601_duration_to_seconds("PT3H"), 10_800);
    }

    #[test]
    fn zero_and_garbage_are_zero() {
        assert_eq!(parse_iso8601_duration_to_seconds("PT0S"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds(""), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("1H2M"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("PT5X"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("PT12"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("PTHMS"), 0);
    }

    #[test]
    fn fractional_seconds_are_truncated() {
        assert_eq!(parse_iso8601_duration_to_seconds("PT1M30.9S"), 90);
        assert_eq!(parse_iso8601_duration_to_seconds("PT0.999S"), 0);
    }

    #[test]
    fn day_component_is_accepted() {
        assert_eq!(parse_iso8601_duration_to_seconds("P1DT1S"), 86_401);
        assert_eq!(parse_iso8601_duration_to_seconds("P2D"), 172_800);
    }

    #[test]
    fn oversized_components_are_zero_not_a_panic() {
        assert_eq!(parse_iso8601_duration_to_seconds("P999999999999999DT1S"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("PT9999999999999999H"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("PT999999999999999999M"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("PT99999999999999999999S"), 0);
        // each part fits, the sum does not
        assert_eq!(parse_iso8601_duration_to_seconds("PT2562047788015215H3600M"), 0);
        assert_eq!(parse_iso8601_duration_to_seconds("P-1DT5S"), 0);
    }

    #[test]
    fn duration_formula_holds_over_a_grid() {
        for h in [0, 1, 7] {
            for m in [0, 5, 59] {
                for s in [0.0, 12.5, 59.99] {
                    let literal = format!("PT{h}H{m}M{s}S");
                    let expected = h * 3600 + m * 60 + s as i64;
                    assert_eq!(parse_iso8601_duration_to_seconds(&literal), expected, "{literal}");
                }
            }
        }
    }

    #[test]
    fn weekday_of_publish_date() {
        assert_eq!(publication_day("2024-03-04"), "Monday");
        assert_eq!(publication_day("2024-03-10T09:00:00Z"), "Sunday");
        assert_eq!(publication_day("not a date"), "Unknown");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("Agilité", 6), "Agilit");
        assert_eq!(truncate_chars("é", 5), "é");
    }
}
