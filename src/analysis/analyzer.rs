use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer};
use crate::core::config::AnalyzerConfig;

/// Text analysis pipeline
///
/// Documents and queries go through the same analyzer, otherwise query
/// terms would not line up with indexed terms.
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Plain lower-cased alphanumeric terms, nothing removed or rewritten.
    pub fn standard() -> Self {
        Analyzer::new("standard".to_string(), Box::new(StandardTokenizer::default()))
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let mut analyzer = Analyzer::new(
            "configured".to_string(),
            Box::new(StandardTokenizer::new(config.max_token_length)),
        );
        if config.remove_stop_words {
            analyzer = analyzer.add_filter(Box::new(StopWordFilter::english()));
        }
        if let Some(language) = config.stemmer {
            analyzer = analyzer.add_filter(Box::new(StemmerFilter::new(language)));
        }
        analyzer
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

impl Clone for Analyzer {
    fn clone(&self) -> Self {
        Analyzer {
            tokenizer: self.tokenizer.clone_box(),
            filters: self.filters.iter().map(|f| f.clone_box()).collect(),
            name: self.name.clone(),
        }
    }
}
