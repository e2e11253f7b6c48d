use serde::{Deserialize, Serialize};

/// Where a value falls against its reference range. Serialized by
/// variant name (`"Normal"`, `"Low"`, `"High"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeStatus {
    Normal,
    Low,
    High,
}

impl RangeStatus {
    /// Low and High are the statuses shown as flagged.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_low_and_high_are_abnormal() {
        assert!(!RangeStatus::Normal.is_abnormal());
        assert!(RangeStatus::Low.is_abnormal());
        assert!(RangeStatus::High.is_abnormal());
    }

    #[test]
    fn range_status_serializes_as_variant_name() {
        assert_eq!(serde_json::to_string(&RangeStatus::High).unwrap(), "\"High\"");
        let parsed: RangeStatus = serde_json::from_str("\"Low\"").unwrap();
        assert_eq!(parsed, RangeStatus::Low);
        assert!(serde_json::from_str::<RangeStatus>("\"high\"").is_err());
    }
}
