use crate::error::{CoraError, Result};

/// Format integer cents as a dollar amount with thousands separators: $1,234.56
pub fn money(cents: i64) -> String {
    let negative = cents < 0;
    let abs = cents.unsigned_abs();
    let int_part = (abs / 100).to_string();
    let dec_part = abs % 100;

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part:02}")
    } else {
        format!("${with_commas}.{dec_part:02}")
    }
}

/// Parse a human-entered amount ("1,234.5", "$20", "(50.00)") into cents
/// without going through floating point.
pub fn parse_cents(raw: &str) -> Result<i64> {
    let invalid = || CoraError::InputValidation(format!("not an amount: {raw:?}"));

    let s: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '"' | '$' | ' '))
        .collect();
    let (negative, s) = if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        (true, inner.to_string())
    } else if let Some(rest) = s.strip_prefix('-') {
        (true, rest.to_string())
    } else {
        (false, s)
    };
    if s.is_empty() {
        return Err(invalid());
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s.as_str(), ""),
    };
    if frac.len() > 2
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
        || (whole.is_empty() && frac.is_empty())
    {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
        _ => frac.parse().map_err(|_| invalid())?,
    };
    let cents = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)?;
    Ok(if negative { -cents } else { cents })
}
