use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Snowball languages exposed through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StemmerLanguage {
    English,
    French,
    German,
    Italian,
    Portuguese,
    Spanish,
}

impl StemmerLanguage {
    pub fn algorithm(self) -> Algorithm {
        match self {
            StemmerLanguage::English => Algorithm::English,
            StemmerLanguage::French => Algorithm::French,
            StemmerLanguage::German => Algorithm::German,
            StemmerLanguage::Italian => Algorithm::Italian,
            StemmerLanguage::Portuguese => Algorithm::Portuguese,
            StemmerLanguage::Spanish => Algorithm::Spanish,
        }
    }
}

pub struct StemmerFilter {
    pub language: StemmerLanguage,
}

impl StemmerFilter {
    pub fn new(language: StemmerLanguage) -> Self {
        StemmerFilter { language }
    }
}

impl TokenFilter for StemmerFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        let stemmer = Stemmer::create(self.language.algorithm());

        tokens.into_iter()
            .map(|mut token| {
                token.text = stemmer.stem(&token.text).to_string();
                token
            })
            .collect()
    }

    fn name(&self) -> &str {
        "stemmer"
    }

    fn clone_box(&self) -> Box<dyn TokenFilter> {
        Box::new(StemmerFilter {
            language: self.language,
        })
    }
}
