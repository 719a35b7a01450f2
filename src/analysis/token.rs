use serde::{Serialize, Deserialize};

/// Token representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,      // Normalized term text
    pub position: u32,     // Token offset in the document, counted in tokens
    pub offset: usize,     // Byte offset in original text
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Word,
    Number,
}

impl Token {
    pub fn new(text: String, position: u32, offset: usize) -> Self {
        let token_type = if text.chars().all(|c| c.is_numeric()) {
            TokenType::Number
        } else {
            TokenType::Word
        };
        Token {
            text,
            position,
            offset,
            token_type,
        }
    }
}
