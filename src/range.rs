//! Reference-range classification for lab values.
//!
//! Reference ranges are free text in one of three shapes: `"min-max"`,
//! `"<max"` or `">min"`. Classification is fail-open: anything that cannot
//! be interpreted comes back as `Normal` so display is never blocked.
//! `classify_detailed` keeps the reason a value went unclassified, for
//! callers that must not confuse "in range" with "could not tell".

use serde::Serialize;

use crate::models::{RangeStatus, TestResult, TestValue};

/// How a reference range was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RangeBasis {
    Interval { min: Option<f64>, max: Option<f64> },
    UpperBound { max: f64 },
    LowerBound { min: f64 },
    Unclassified { reason: UnclassifiedReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedReason {
    NoRange,
    NonNumericValue,
    UnrecognizedShape,
    MalformedBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub status: RangeStatus,
    pub basis: RangeBasis,
}

impl Classification {
    fn unclassified(reason: UnclassifiedReason) -> Self {
        Self {
            status: RangeStatus::Normal,
            basis: RangeBasis::Unclassified { reason },
        }
    }

    /// True when the status came from an actual comparison.
    pub fn is_classified(&self) -> bool {
        !matches!(self.basis, RangeBasis::Unclassified { .. })
    }
}

/// Classify a value against its reference range.
pub fn classify(value: &TestValue, reference_range: Option<&str>) -> RangeStatus {
    classify_detailed(value, reference_range).status
}

pub fn classify_detailed(value: &TestValue, reference_range: Option<&str>) -> Classification {
    let Some(range) = reference_range.filter(|r| !r.is_empty()) else {
        return Classification::unclassified(UnclassifiedReason::NoRange);
    };
    let Some(v) = value.as_number() else {
        return Classification::unclassified(UnclassifiedReason::NonNumericValue);
    };

    // Shape precedence: '-' first, then '<', then '>'.
    if let Some((low, high)) = range.split_once('-') {
        let min = parse_leading_float(low);
        let max = parse_leading_float(high);
        if min.is_none() && max.is_none() {
            return Classification::unclassified(UnclassifiedReason::MalformedBound);
        }
        let status = match (min, max) {
            (Some(min), _) if v < min => RangeStatus::Low,
            (_, Some(max)) if v > max => RangeStatus::High,
            _ => RangeStatus::Normal,
        };
        return Classification {
            status,
            basis: RangeBasis::Interval { min, max },
        };
    }

    if range.contains('<') {
        let Some(max) = parse_leading_float(range.replacen('<', "", 1).trim()) else {
            return Classification::unclassified(UnclassifiedReason::MalformedBound);
        };
        let status = if v >= max { RangeStatus::High } else { RangeStatus::Normal };
        return Classification {
            status,
            basis: RangeBasis::UpperBound { max },
        };
    }

    if range.contains('>') {
        let Some(min) = parse_leading_float(range.replacen('>', "", 1).trim()) else {
            return Classification::unclassified(UnclassifiedReason::MalformedBound);
        };
        let status = if v <= min { RangeStatus::Low } else { RangeStatus::Normal };
        return Classification {
            status,
            basis: RangeBasis::LowerBound { min },
        };
    }

    Classification::unclassified(UnclassifiedReason::UnrecognizedShape)
}

/// Copy of `results` with `flagged` set from classification.
pub fn flag_results(results: &[TestResult]) -> Vec<TestResult> {
    results
        .iter()
        .map(|r| {
            let mut flagged = r.clone();
            flagged.flagged = Some(classify(&r.value, r.reference_range.as_deref()).is_abnormal());
            flagged
        })
        .collect()
}

/// The results classified Low or High, flagged, in input order.
pub fn abnormal_results(results: &[TestResult]) -> Vec<TestResult> {
    flag_results(results)
        .into_iter()
        .filter(|r| r.flagged == Some(true))
        .collect()
}

/// Parse the longest numeric prefix after leading whitespace, e.g.
/// `" 15.5 g/dL"` gives 15.5. Returns `None` when no digits lead.
fn parse_leading_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    // Optional exponent, only consumed when complete.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}
