//! Pass/fail classification of a captured route feed.

/// Outcome of one observation window against its declared expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

/// Classify an already-filtered capture buffer.
///
/// Strict emptiness: any surviving content counts as churn, a single
/// leftover line included. No fuzzy matching.
pub fn classify(buffer: &str, expect_churn: bool) -> Verdict {
    let churned = !buffer.is_empty();
    if churned == expect_churn {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_churn_present_passes() {
        assert_eq!(classify("[ts] 10.244.1.0/24 deleted\n", true), Verdict::Pass);
    }

    #[test]
    fn test_expected_churn_absent_fails() {
        assert_eq!(classify("", true), Verdict::Fail);
    }

    #[test]
    fn test_unexpected_churn_fails() {
        assert_eq!(classify("[ts] 10.244.1.0/24 deleted\n", false), Verdict::Fail);
    }

    #[test]
    fn test_silent_feed_passes_when_silence_expected() {
        assert_eq!(classify("", false), Verdict::Pass);
    }

    #[test]
    fn test_whitespace_counts_as_churn() {
        assert_eq!(classify("\n", false), Verdict::Fail);
    }
}
