//! Positional parameter parsing for operations
//!
//! Action parameters arrive as raw string tokens. Each operation reads the
//! positions it needs through `Params`, which turns absent or malformed
//! tokens into `OperationError`s.

use std::str::FromStr;

use crate::constants::DEFAULT_MAX_SOURCE_PIXELS;
use crate::transform::error::OperationError;

/// Read-only view over an operation's raw parameter tokens
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    tokens: &'a [String],
    /// Largest width * height an operation may allocate
    max_pixels: u64,
}

impl<'a> Params<'a> {
    pub fn new(tokens: &'a [String]) -> Self {
        Self {
            tokens,
            max_pixels: DEFAULT_MAX_SOURCE_PIXELS,
        }
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token at `index`, treating an empty token as absent
    pub fn raw(&self, index: usize) -> Option<&'a str> {
        self.tokens
            .get(index)
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
    }

    pub fn required<T: FromStr>(&self, index: usize, name: &'static str) -> Result<T, OperationError> {
        let raw = self
            .raw(index)
            .ok_or(OperationError::MissingParameter { index, name })?;
        parse_token(raw, name)
    }

    pub fn optional<T: FromStr>(
        &self,
        index: usize,
        name: &'static str,
        default: T,
    ) -> Result<T, OperationError> {
        match self.raw(index) {
            Some(raw) => parse_token(raw, name),
            None => Ok(default),
        }
    }
}

/// Parse an integer-valued token, accepting float notation (`"100.0"`)
/// since numbers in the action string are untyped.
fn parse_token<T: FromStr>(raw: &str, name: &'static str) -> Result<T, OperationError> {
    if let Ok(value) = raw.parse::<T>() {
        return Ok(value);
    }

    // Fall back to integral floats for integer parameters
    if let Ok(float) = raw.parse::<f64>() {
        if float.fract() == 0.0 && float.is_finite() {
            if let Ok(value) = format!("{}", float as i64).parse::<T>() {
                return Ok(value);
            }
        }
    }

    Err(OperationError::InvalidParameter {
        name,
        value: raw.to_string(),
    })
}
