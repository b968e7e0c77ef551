//! The word count map and reduce functions, kept apart from the streaming machinery that drives them

use clap::ValueEnum;

/// How a raw line is cut into keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Normalization {
    /// Lower-case, then take every maximal run of ASCII alphanumerics as a key.
    /// `don't` yields `don` and `t`.
    #[default]
    Runs,
    /// Lower-case, split on whitespace, then delete every character that is not an ASCII alphanumeric.
    /// `don't` yields `dont`.
    Squash,
}

/// Word Count application
pub mod wc {
    use std::sync::OnceLock;

    use regex::Regex;

    use super::Normalization;
    use crate::mr::record::KeyValue;

    fn word_runs() -> &'static Regex {
        static WORD_RUNS: OnceLock<Regex> = OnceLock::new();
        WORD_RUNS.get_or_init(|| Regex::new(r"[a-z0-9]+").unwrap())
    }

    /// Word separators for `Squash`: Unicode whitespace plus the four ASCII
    /// information separators `\x1c`..`\x1f`
    fn is_separator(c: char) -> bool {
        c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
    }

    /// Emit one `(key, 1)` record per token occurrence in `line`, duplicates included
    pub fn map(line: &[u8], normalization: Normalization) -> Vec<KeyValue> {
        // Undecodable bytes become U+FFFD, which never ends up inside a key.
        // Lowering comes first so characters like the Kelvin sign fold into ASCII.
        let line = String::from_utf8_lossy(line).to_lowercase();
        let line = line.trim();
        match normalization {
            Normalization::Runs => word_runs()
                .find_iter(line)
                .map(|m| KeyValue::one(m.as_str().to_owned()))
                .collect(),
            Normalization::Squash => line
                .split(is_separator)
                .filter_map(|word| {
                    let key = word.chars().filter(char::is_ascii_alphanumeric).collect::<String>();
                    (!key.is_empty()).then(|| KeyValue::one(key))
                })
                .collect(),
        }
    }

    /// Fold one more value into a key's running total, saturating at the `i64` bounds
    pub fn reduce(total: i64, value: i64) -> i64 {
        total.saturating_add(value)
    }
}

#[cfg(test)]
mod tests {
    use super::wc;
    use super::Normalization;

    fn keys(line: &str, normalization: Normalization) -> Vec<String> {
        wc::map(line.as_bytes(), normalization)
            .into_iter()
            .map(|kv| {
                assert_eq!(kv.value(), 1);
                kv.key().to_string()
            })
            .collect()
    }

    #[test]
    fn runs_split_on_punctuation() {
        assert_eq!(keys("Hello, HELLO!! hello.", Normalization::Runs), ["hello", "hello", "hello"]);
        assert_eq!(keys("don't e-mail R2D2", Normalization::Runs), ["don", "t", "e", "mail", "r2d2"]);
    }

    #[test]
    fn squash_joins_within_words() {
        assert_eq!(keys("don't e-mail R2D2", Normalization::Squash), ["dont", "email", "r2d2"]);
        assert_eq!(keys("-- ... !!", Normalization::Squash), Vec::<String>::new());
    }

    #[test]
    fn punctuation_only_lines_yield_nothing() {
        assert!(keys("  ?!,.;  ", Normalization::Runs).is_empty());
        assert!(keys("", Normalization::Runs).is_empty());
    }

    #[test]
    fn non_ascii_bytes_delimit() {
        let records = wc::map(b"caf\xc3\xa9 na\xffve", Normalization::Runs);
        let keys = records.iter().map(|kv| kv.key()).collect::<Vec<_>>();
        assert_eq!(keys, ["caf", "na", "ve"]);

        let records = wc::map(b"na\xffve", Normalization::Squash);
        assert_eq!(records[0].key(), "nave");
    }

    #[test]
    fn lowers_before_extracting() {
        // KELVIN SIGN lowers to `k`, dotted capital I to `i` plus a combining dot
        assert_eq!(keys("\u{212A}elvin", Normalization::Runs), ["kelvin"]);
        assert_eq!(keys("\u{0130}stanbul", Normalization::Runs), ["i", "stanbul"]);
        assert_eq!(keys("\u{212A}elvin", Normalization::Squash), ["kelvin"]);
    }

    #[test]
    fn squash_splits_on_every_separator() {
        assert_eq!(
            keys("ab\x0bcd\x1cef\x1fgh\u{00a0}ij\tkl", Normalization::Squash),
            ["ab", "cd", "ef", "gh", "ij", "kl"]
        );
    }

    #[test]
    fn reduce_saturates() {
        assert_eq!(wc::reduce(2, 3), 5);
        assert_eq!(wc::reduce(i64::MAX, 1), i64::MAX);
    }
}
