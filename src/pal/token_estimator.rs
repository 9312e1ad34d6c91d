//! Heuristic token estimator used for pre-flight budgeting when a
//! provider doesn't echo back usage, grounded on original_source's
//! `pal/router.py::TokenEstimator`.

use crate::pal::types::Message;

pub struct TokenEstimator;

impl TokenEstimator {
    /// Ascii chars cost roughly 1/4 token, non-ascii (CJK etc.) roughly
    /// 2/3 of a token each — matches the Python heuristic exactly.
    pub fn estimate(text: &str) -> u32 {
        let mut ascii_chars = 0usize;
        let mut non_ascii_chars = 0usize;
        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }
        (ascii_chars as f64 / 4.0 + non_ascii_chars as f64 / 1.5).ceil() as u32
    }

    /// Per original_source, each message carries a flat 4-token overhead
    /// for role/framing on top of its content estimate.
    pub fn estimate_messages(messages: &[Message]) -> u32 {
        messages.iter().map(|m| Self::estimate(&m.content) + 4).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pal::types::Message;

    #[test]
    fn ascii_only_uses_quarter_char_heuristic() {
        let estimate = TokenEstimator::estimate("abcdefgh");
        assert_eq!(estimate, 2);
    }

    #[test]
    fn non_ascii_costs_more_per_char() {
        let ascii = TokenEstimator::estimate("aaaa");
        let cjk = TokenEstimator::estimate("一二三四");
        assert!(cjk > ascii);
    }

    #[test]
    fn empty_text_estimates_to_zero() {
        assert_eq!(TokenEstimator::estimate(""), 0);
    }

    #[test]
    fn messages_add_per_message_overhead() {
        let messages = vec![Message::user("hi"), Message::assistant("there")];
        let estimate = TokenEstimator::estimate_messages(&messages);
        let raw: u32 = messages.iter().map(|m| TokenEstimator::estimate(&m.content)).sum();
        assert_eq!(estimate, raw + 4 * messages.len() as u32);
    }
}
