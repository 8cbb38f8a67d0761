use iso8601_duration::Duration as IsoDuration;

use crate::error::{Error, Result};

pub fn iso_to_seconds(iso_duration: &IsoDuration) -> f64 {
    f64::from(iso_duration.day) * 86_400.0
        + f64::from(iso_duration.hour) * 3600.0
        + f64::from(iso_duration.minute) * 60.0
        + f64::from(iso_duration.second)
}

/// Parse an ISO-8601 duration such as `PT1H2M3.5S` into seconds.
///
/// Hours, minutes and seconds are each optional. Year and month components
/// have no fixed length and are rejected.
pub fn parse_iso_duration(value: &str) -> Result<f64> {
    let iso_duration = value.trim().parse::<IsoDuration>().map_err(|e| {
        Error::malformed(format!(
            "invalid ISO-8601 duration {value:?} at position {}",
            e.position
        ))
    })?;

    if iso_duration.year != 0.0 || iso_duration.month != 0.0 {
        return Err(Error::malformed(format!(
            "calendar duration {value:?} has no fixed length"
        )));
    }

    Ok(iso_to_seconds(&iso_duration))
}

/// Format seconds as an ISO-8601 duration, omitting zero hour and minute
/// components (`594.0` becomes `PT9M54S`).
pub fn format_iso_duration(seconds: f64) -> String {
    let millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let rest = millis % 60_000;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if rest > 0 || (hours == 0 && minutes == 0) {
        if rest % 1000 == 0 {
            out.push_str(&format!("{}S", rest / 1000));
        } else {
            let fraction = format!("{:03}", rest % 1000);
            out.push_str(&format!("{}.{}S", rest / 1000, fraction.trim_end_matches('0')));
        }
    }
    out
}

/// Parse a DASH/HLS frame rate: `25`, `29.97` or `30000/1001`.
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let value = value.trim();
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}
