#![forbid(unsafe_code)]

use taskhub_kernel_contracts::unsub::{HintKind, InputHint, MatchState, MatchStatus};
use taskhub_kernel_contracts::ContractViolation;

pub const HINT_FULL_MATCH: &str = "✓ Code matches";
pub const HINT_PARTIAL_MISMATCH: &str = "Mismatch: look carefully, they look alike!";
pub const HINT_CONFIRM_MISMATCH: &str = "✗ Code does not match. Try again.";

/// Number of leading characters of `typed` that equal `expected` position by position.
pub fn matched_prefix_len(typed: &str, expected: &str) -> usize {
    typed
        .chars()
        .zip(expected.chars())
        .take_while(|(t, e)| t == e)
        .count()
}

/// `round(100 * matched / expected_len)`, half rounding up.
pub fn progress_percent(matched: usize, expected_len: usize) -> u8 {
    if expected_len == 0 {
        return 0;
    }
    let matched = matched.min(expected_len) as u64;
    let expected_len = expected_len as u64;
    let pct = (200 * matched + expected_len) / (2 * expected_len);
    pct.min(100) as u8
}

/// Strict, order-sensitive comparison of a typed answer against the expected code.
///
/// `expected` is only borrowed for the duration of the call.
pub fn evaluate(typed: &str, expected: &str) -> Result<MatchState, ContractViolation> {
    let expected_len = expected.chars().count();
    if expected_len == 0 {
        return Err(ContractViolation::InvalidValue {
            field: "unsub_match.expected",
            reason: "must not be empty",
        });
    }
    let typed_len = typed.chars().count();
    let matched = matched_prefix_len(typed, expected);
    let percent = progress_percent(matched, expected_len);

    let status = if typed_len == 0 {
        MatchStatus::Empty
    } else if exact_match(typed, expected) {
        MatchStatus::FullMatch
    } else if matched == typed_len && typed_len < expected_len {
        MatchStatus::PartialMatch
    } else {
        MatchStatus::PartialMismatch
    };

    MatchState::v1(matched, typed_len, expected_len, percent, status)
}

/// Length-exact, case-sensitive equality that inspects every byte.
pub fn exact_match(typed: &str, expected: &str) -> bool {
    if typed.len() != expected.len() {
        return false;
    }
    typed
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (t, e)| acc | (t ^ e))
        == 0
}

pub fn hint_for(state: &MatchState) -> InputHint {
    match state.status {
        MatchStatus::Empty => InputHint::none(),
        MatchStatus::PartialMatch => InputHint::new(
            HintKind::Partial,
            format!("{} / {} chars…", state.typed_len, state.expected_len),
        ),
        MatchStatus::PartialMismatch => InputHint::new(HintKind::Error, HINT_PARTIAL_MISMATCH),
        MatchStatus::FullMatch => InputHint::new(HintKind::Valid, HINT_FULL_MATCH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: &str = "Il1|!O0";

    #[test]
    fn at_match_01_scenario_a_prefix_then_full_match() {
        let partial = evaluate("Il1", EXPECTED).unwrap();
        assert_eq!(partial.status, MatchStatus::PartialMatch);
        assert_eq!(partial.percent, 43);
        assert!(!partial.confirm_enabled());
        assert_eq!(hint_for(&partial).text, "3 / 7 chars…");

        let full = evaluate("Il1|!O0", EXPECTED).unwrap();
        assert_eq!(full.status, MatchStatus::FullMatch);
        assert_eq!(full.percent, 100);
        assert!(full.confirm_enabled());
    }

    #[test]
    fn at_match_02_scenario_b_divergence_is_mismatch() {
        let state = evaluate("Ix", EXPECTED).unwrap();
        assert_eq!(state.status, MatchStatus::PartialMismatch);
        assert_eq!(state.matched_prefix_len, 1);
        assert!(!state.confirm_enabled());
        assert_eq!(hint_for(&state).kind, HintKind::Error);
    }

    #[test]
    fn at_match_03_every_proper_prefix_is_partial_match() {
        let expected_len = EXPECTED.chars().count();
        for end in 1..expected_len {
            let prefix: String = EXPECTED.chars().take(end).collect();
            let state = evaluate(&prefix, EXPECTED).unwrap();
            assert_eq!(state.status, MatchStatus::PartialMatch);
            let exact = 100.0 * end as f64 / expected_len as f64;
            assert_eq!(state.percent, exact.round() as u8);
        }
    }

    #[test]
    fn at_match_04_full_match_only_on_exact_equality() {
        let candidates = [
            "", "I", "Il1|!O", "Il1|!O0", "Il1|!O0 ", "il1|!O0", "Il1|!0O", "Il1|!O00", "lI1|!O0",
        ];
        for typed in candidates {
            let state = evaluate(typed, EXPECTED).unwrap();
            assert_eq!(
                state.status == MatchStatus::FullMatch,
                typed == EXPECTED,
                "typed={typed:?}"
            );
        }
    }

    #[test]
    fn at_match_05_overlong_input_is_mismatch_not_full() {
        let state = evaluate("Il1|!O0!", EXPECTED).unwrap();
        assert_eq!(state.status, MatchStatus::PartialMismatch);
        assert_eq!(state.matched_prefix_len, 7);
        assert_eq!(state.percent, 100);
    }

    #[test]
    fn at_match_06_empty_input_and_empty_expected() {
        let state = evaluate("", EXPECTED).unwrap();
        assert_eq!(state.status, MatchStatus::Empty);
        assert_eq!(hint_for(&state), InputHint::none());
        assert!(evaluate("abc", "").is_err());
    }

    #[test]
    fn at_match_07_out_of_order_correctness_earns_nothing() {
        let state = evaluate("l", EXPECTED).unwrap();
        assert_eq!(state.matched_prefix_len, 0);
        assert_eq!(state.percent, 0);
        assert_eq!(state.status, MatchStatus::PartialMismatch);
    }
}
