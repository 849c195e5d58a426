use chrono::{DateTime, Utc};

/// Renders binary-suffixed sizes the way quantities read in the dashboard (`28.0Gi`).
pub fn human_bytes(b: f64) -> String {
    const UNIT: f64 = 1024.0;
    if b < UNIT {
        return format!("{}", b.max(0.0).round() as i64);
    }
    let suffixes = ["Ki", "Mi", "Gi", "Ti", "Pi"];
    let mut div = UNIT;
    let mut exp = 0;
    while b / div >= UNIT && exp < suffixes.len() - 1 {
        div *= UNIT;
        exp += 1;
    }
    format!("{:.1}{}", b / div, suffixes[exp])
}

/// Core counts with at most three decimals and no trailing zeros (`8`, `0.3`).
pub fn format_cores(cores: f64) -> String {
    let fixed = format!("{:.3}", cores);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Go-style duration rendering: `72h0m0s`, `5m0s`, `42s`.
pub fn duration_string(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

fn elapsed_secs(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    created.map(|t| (now - t).num_seconds().max(0))
}

/// Node age, floored to the hour.
pub fn age_in_hours(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match elapsed_secs(created, now) {
        Some(secs) => duration_string(secs - secs % 3600),
        None => String::new(),
    }
}

/// Pod age, rounded to the nearest minute (halves round up).
pub fn age_in_minutes(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match elapsed_secs(created, now) {
        Some(secs) => duration_string((secs + 30) / 60 * 60),
        None => String::new(),
    }
}

/// Parses a resource quantity such as `3800m`, `16Gi`, `16384Ki` or `4`.
pub fn parse_quantity(q: &str) -> Option<f64> {
    let q = q.trim();
    if q.is_empty() {
        return None;
    }

    const KI: f64 = 1024.0;
    // (suffix, multiplier, divisor)
    const SUFFIXES: [(&str, f64, f64); 15] = [
        ("Ki", KI, 1.0),
        ("Mi", KI * KI, 1.0),
        ("Gi", KI * KI * KI, 1.0),
        ("Ti", KI * KI * KI * KI, 1.0),
        ("Pi", KI * KI * KI * KI * KI, 1.0),
        ("Ei", KI * KI * KI * KI * KI * KI, 1.0),
        ("n", 1.0, 1e9),
        ("u", 1.0, 1e6),
        ("m", 1.0, 1e3),
        ("k", 1e3, 1.0),
        ("M", 1e6, 1.0),
        ("G", 1e9, 1.0),
        ("T", 1e12, 1.0),
        ("P", 1e15, 1.0),
        ("E", 1e18, 1.0),
    ];

    for (suffix, mul, div) in SUFFIXES {
        if let Some(num) = q.strip_suffix(suffix) {
            return num.parse::<f64>().ok().map(|n| n * mul / div);
        }
    }
    q.parse::<f64>().ok()
}
