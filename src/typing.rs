//! Human typing latency model.
//!
//! Each character has a cost in milliseconds taken from a keyboard-row table (Nordic
//! layout): home row keys are cheapest, rows further away cost more, and shifted or AltGr
//! combinations add a modifier penalty. Characters outside the table cost
//! [`HUMAN_REACTION_TIME_MS`]. The estimate for a string is the sum of its characters.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;

/// Cost of any character not in the table.
pub const HUMAN_REACTION_TIME_MS: u32 = 100;

/// Cheapest entry of the table (space).
pub const MIN_CHAR_COST_MS: u32 = 30;

// (characters, cost in ms)
const COST_TIERS: &[(&str, u32)] = &[
    // number row
    ("§1234567890+", 90),
    ("½!\"#¤%&/()=?", 130),
    ("@£${[]}\\", 130),
    // above home row
    ("qwertyuiopå", 80),
    ("QWERTYUIOPÅ", 120),
    ("¨", 110),
    ("^~", 150),
    // home row
    ("asdfghjklöä'", 60),
    ("ASDFGHJKLÖÄ*", 90),
    // below home row
    ("<zxcvbnm,.-", 80),
    (">ZXCVBNM;:_|", 120),
    (" ", MIN_CHAR_COST_MS),
];

static CHAR_COSTS: Lazy<HashMap<char, u32>> = Lazy::new(|| {
    COST_TIERS
        .iter()
        .flat_map(|(chars, cost)| chars.chars().map(move |c| (c, *cost)))
        .collect()
});

/// Milliseconds an average person needs to type `c`.
pub fn char_cost(c: char) -> u32 {
    CHAR_COSTS
        .get(&c)
        .copied()
        .unwrap_or(HUMAN_REACTION_TIME_MS)
}

/// Milliseconds an average person needs to type `text`.
pub fn estimate_ms(text: &str) -> u64 {
    text.chars().map(|c| u64::from(char_cost(c))).sum()
}

/// Time an average person needs to type `text`.
pub fn estimate(text: &str) -> Duration {
    Duration::from_millis(estimate_ms(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_costs_nothing() {
        assert_eq!(estimate(""), Duration::ZERO);
    }

    #[test]
    fn test_row_tiers() {
        assert_eq!(char_cost('a'), 60);
        assert_eq!(char_cost('A'), 90);
        assert_eq!(char_cost('q'), 80);
        assert_eq!(char_cost('Q'), 120);
        assert_eq!(char_cost('1'), 90);
        assert_eq!(char_cost('!'), 130);
        assert_eq!(char_cost('@'), 130);
        assert_eq!(char_cost('¨'), 110);
        assert_eq!(char_cost('~'), 150);
        assert_eq!(char_cost('|'), 120);
        assert_eq!(char_cost(' '), 30);
    }

    #[test]
    fn test_unknown_characters_cost_reaction_time() {
        assert_eq!(char_cost('é'), HUMAN_REACTION_TIME_MS);
        assert_eq!(char_cost('\n'), HUMAN_REACTION_TIME_MS);
        assert_eq!(char_cost('字'), HUMAN_REACTION_TIME_MS);
    }

    #[test]
    fn test_estimate_is_sum_of_char_costs() {
        // h(60) e(80) l(60) l(60) o(80) ' '(30) W(120) !(130)
        assert_eq!(estimate_ms("hello W!"), 620);
        assert_eq!(estimate("hello W!"), Duration::from_millis(620));
    }

    #[test]
    fn test_estimate_lower_bound() {
        for text in ["", " ", "abc", "Hej på dig!", "ünïcödé 字"] {
            let n = text.chars().count() as u64;
            assert!(estimate_ms(text) >= n * u64::from(MIN_CHAR_COST_MS));
        }
    }

    #[test]
    fn test_table_has_no_cheaper_entry_than_space() {
        assert!(CHAR_COSTS.values().all(|c| *c >= MIN_CHAR_COST_MS));
    }
}
