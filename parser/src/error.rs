use std::error;
use std::fmt;

/// A token that does not denote a reference id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReferenceError {
    pub input: String,
    pub reason: &'static str,
}

impl ParseReferenceError {
    pub(crate) fn new(input: &str, reason: &'static str) -> Self {
        ParseReferenceError {
            input: input.to_string(),
            reason,
        }
    }
}

impl error::Error for ParseReferenceError {}

impl fmt::Display for ParseReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let space = 20;
        let end = self
            .input
            .char_indices()
            .nth(space)
            .map(|(idx, _)| idx)
            .unwrap_or(self.input.len());
        write!(f, "'{}': {}", &self.input[..end], self.reason)
    }
}
