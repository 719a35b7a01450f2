pub mod stopword;
pub mod stemmer;
