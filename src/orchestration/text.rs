//! Inbound text normalization and small content predicates.

/// Normalize raw inbound text: trim, collapse whitespace runs to a single
/// space, drop control characters, and squeeze `!?.` runs down to three.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    let mut punct_run: Option<(char, usize)> = None;

    for c in raw.trim().chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            punct_run = None;
            continue;
        }
        if c.is_control() {
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if matches!(c, '!' | '?' | '.') {
            match punct_run {
                Some((p, n)) if p == c => {
                    if n >= 3 {
                        continue;
                    }
                    punct_run = Some((p, n + 1));
                }
                _ => punct_run = Some((c, 1)),
            }
        } else {
            punct_run = None;
        }
        out.push(c);
    }

    out
}

/// True when the normalized text carries no classifiable signal: empty, or
/// punctuation and symbols only.
pub fn is_noise(normalized: &str) -> bool {
    !normalized.chars().any(|c| c.is_alphanumeric())
}

pub fn contains_digits(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

const TIME_WORDS: &[&str] = &[
    "o'clock",
    "noon",
    "midnight",
    "morning",
    "afternoon",
    "evening",
    "tonight",
    "today",
    "tomorrow",
];

/// Whether a greeting already names a time or day, which skips the
/// time-request follow-up.
pub fn mentions_time(text: &str) -> bool {
    if contains_digits(text) {
        return true;
    }
    let lower = text.to_lowercase();
    TIME_WORDS.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_is_collapsed_and_trimmed() {
        assert_eq!(normalize("  hello    world \n "), "hello world");
    }

    #[test]
    fn test_punctuation_runs_are_squeezed() {
        assert_eq!(normalize("help!!!!!!"), "help!!!");
        assert_eq!(normalize("really????"), "really???");
        assert_eq!(normalize("ok."), "ok.");
    }

    #[test]
    fn test_control_characters_are_dropped() {
        assert_eq!(normalize("hi\u{0007} there\u{0000}"), "hi there");
    }

    #[test]
    fn test_noise_detection() {
        assert!(is_noise(""));
        assert!(is_noise("!!! ???"));
        assert!(is_noise("..."));
        assert!(!is_noise("ok"));
        assert!(!is_noise("at 5"));
    }

    #[test]
    fn test_time_mentions() {
        assert!(mentions_time("hi, my lesson is at 17:00"));
        assert!(mentions_time("good morning"));
        assert!(mentions_time("see you tomorrow"));
        assert!(!mentions_time("hello there"));
    }
}
