//! Purpose: Convert between decimal price text and integer minor units (cents).
//! Exports: `parse_price`, `format_price`, `format_average`, `format_date`.
//! Role: The only place where money crosses the text/integer boundary.
//! Invariants: Parsing never goes through floating point.
//! Invariants: Output uses pt-BR conventions: `,` radix and `.` thousands grouping.
use crate::core::error::{Error, ErrorKind};

const MINOR_PER_UNIT: i64 = 100;

/// Parse a typed price into minor units.
///
/// Accepts `19,99`, `R$ 1.234,56`, `19.99` and bare integers. When a comma is
/// present it is the radix and dots are grouping; otherwise a single dot
/// followed by at most two digits is read as the radix.
pub fn parse_price(input: &str) -> Result<i64, Error> {
    let mut text = input.trim();
    if let Some(rest) = text.strip_prefix("R$") {
        text = rest.trim_start();
    }
    let compact: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(price_error("price is required"));
    }

    let (negative, digits) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.as_str()),
    };

    let (whole, fraction) = split_radix(digits)?;
    let whole_digits: String = whole.chars().filter(|ch| *ch != '.').collect();
    if whole_digits.is_empty() && fraction.is_empty() {
        return Err(price_error(format!("invalid price: {}", input.trim())));
    }
    if !whole_digits.chars().all(|ch| ch.is_ascii_digit())
        || !fraction.chars().all(|ch| ch.is_ascii_digit())
    {
        return Err(price_error(format!("invalid price: {}", input.trim())));
    }
    if fraction.len() > 2 {
        return Err(price_error("price must have at most two decimal places"));
    }

    let units = if whole_digits.is_empty() {
        0
    } else {
        whole_digits
            .parse::<i64>()
            .map_err(|err| price_error("price is too large").with_source(err))?
    };
    let cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().unwrap_or(0) * 10,
        _ => fraction.parse::<i64>().unwrap_or(0),
    };

    let minor = units
        .checked_mul(MINOR_PER_UNIT)
        .and_then(|value| value.checked_add(cents))
        .ok_or_else(|| price_error("price is too large"))?;
    Ok(if negative { -minor } else { minor })
}

fn split_radix(digits: &str) -> Result<(&str, &str), Error> {
    if digits.matches(',').count() > 1 {
        return Err(price_error(format!("invalid price: {digits}")));
    }
    if let Some((whole, fraction)) = digits.split_once(',') {
        return Ok((whole, fraction));
    }
    if digits.matches('.').count() == 1 {
        if let Some((whole, fraction)) = digits.split_once('.') {
            if fraction.len() <= 2 {
                return Ok((whole, fraction));
            }
        }
    }
    Ok((digits, ""))
}

fn price_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Validation)
        .with_message(message)
        .with_field("price")
}

/// Render minor units as `1.234,56`.
pub fn format_price(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let magnitude = minor.unsigned_abs();
    let units = magnitude / MINOR_PER_UNIT as u64;
    let cents = magnitude % MINOR_PER_UNIT as u64;
    format!("{sign}{},{cents:02}", group_thousands(units))
}

/// Render a (possibly fractional) average expressed in minor units.
pub fn format_average(minor: f64) -> String {
    if !minor.is_finite() {
        return format_price(0);
    }
    format_price(minor.round() as i64)
}

fn group_thousands(value: u64) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (idx, ch) in raw.chars().enumerate() {
        if idx > 0 && (raw.len() - idx) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// Render an ISO-8601 timestamp as `DD/MM/YYYY`; unknown shapes pass through.
///
/// Accepts the backend's offset-less `LocalDateTime` text (with or without
/// fractional seconds), a bare date, and RFC 3339 with an offset. Dates are
/// shown in the offset they were written in.
pub fn format_date(timestamp: &str) -> String {
    let trimmed = timestamp.trim();
    parse_calendar_date(trimmed)
        .and_then(|date| {
            let format = time::format_description::parse("[day]/[month]/[year]").ok()?;
            date.format(&format).ok()
        })
        .unwrap_or_else(|| timestamp.to_string())
}

fn parse_calendar_date(value: &str) -> Option<time::Date> {
    const LOCAL_FORMATS: [&str; 2] = [
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]",
        "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]",
    ];
    for description in LOCAL_FORMATS {
        let Ok(format) = time::format_description::parse(description) else {
            continue;
        };
        if let Ok(parsed) = time::PrimitiveDateTime::parse(value, &format) {
            return Some(parsed.date());
        }
    }
    if let Ok(parsed) =
        time::OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
    {
        return Some(parsed.date());
    }
    let format = time::format_description::parse("[year]-[month]-[day]").ok()?;
    time::Date::parse(value, &format).ok()
}
