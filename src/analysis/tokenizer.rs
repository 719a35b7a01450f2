use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn Tokenizer>;
}

/// Standard Unicode tokenizer
///
/// Splits on Unicode word boundaries, then again on every non-alphanumeric
/// character, so `"e-mail"` and `"can't"` each yield two terms. Output is
/// lower-cased and positions are consecutive.
#[derive(Clone)]
pub struct StandardTokenizer {
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            max_token_length: 255,
        }
    }
}

impl StandardTokenizer {
    pub fn new(max_token_length: usize) -> Self {
        StandardTokenizer { max_token_length }
    }

    fn push_piece(&self, tokens: &mut Vec<Token>, piece: &str, offset: usize, position: &mut u32) {
        if piece.is_empty() {
            return;
        }
        let normalized = piece.to_lowercase();
        if normalized.len() > self.max_token_length {
            return;
        }
        tokens.push(Token::new(normalized, *position, offset));
        *position += 1;
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (word_offset, word) in text.unicode_word_indices() {
            let mut start: Option<usize> = None;
            for (i, c) in word.char_indices() {
                if c.is_alphanumeric() {
                    if start.is_none() {
                        start = Some(i);
                    }
                } else if let Some(s) = start.take() {
                    self.push_piece(&mut tokens, &word[s..i], word_offset + s, &mut position);
                }
            }
            if let Some(s) = start {
                self.push_piece(&mut tokens, &word[s..], word_offset + s, &mut position);
            }
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(text: &str) -> Vec<String> {
        StandardTokenizer::default()
            .tokenize(text)
            .into_iter()
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_lowercases_and_splits() {
        assert_eq!(terms("The Quick, brown FOX!"), vec!["the", "quick", "brown", "fox"]);
    }

    #[test]
    fn test_splits_on_inner_punctuation() {
        assert_eq!(terms("e-mail can't 3.14"), vec!["e", "mail", "can", "t", "3", "14"]);
    }

    #[test]
    fn test_positions_are_consecutive() {
        let tokens = StandardTokenizer::default().tokenize("  alpha -- beta\tgamma ");
        let positions: Vec<u32> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(tokens[1].offset, 11);
    }

    #[test]
    fn test_empty_and_symbol_only_input() {
        assert!(terms("").is_empty());
        assert!(terms("!!! --- ???").is_empty());
    }

    #[test]
    fn test_unicode_terms() {
        assert_eq!(terms("Straße Café"), vec!["straße", "café"]);
    }

    #[test]
    fn test_drops_overlong_tokens() {
        let tokenizer = StandardTokenizer::new(4);
        let tokens = tokenizer.tokenize("tiny enormous word");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["tiny", "word"]);
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_deterministic() {
        let text = "Repeatable output, repeatable output.";
        assert_eq!(terms(text), terms(text));
    }
}
