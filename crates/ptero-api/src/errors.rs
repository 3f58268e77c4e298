//! The structured error set returned by the panel on 4xx responses

use std::fmt;
use std::ops::Index;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// A single error record from the panel's error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code (e.g. `ValidationException`)
    pub code: String,
    /// Human-readable description of the failure
    pub detail: String,
    /// HTTP-equivalent status for this individual error
    #[serde(deserialize_with = "status_code")]
    pub status: u16,
}

/// The ordered, possibly multi-entry error payload of a failed request.
///
/// Deserializes directly from the panel's error envelope
/// (`{"errors": [{code, detail, status}, ...]}`). Entries keep the order of
/// the source array and are indexable by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrors {
    errors: Vec<ApiError>,
}

impl ApiErrors {
    pub fn new(errors: Vec<ApiError>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ApiError> {
        self.errors.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ApiError> {
        self.errors.iter()
    }

    /// Iterator over the machine codes of all contained errors.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.code.as_str())
    }
}

impl Index<usize> for ApiErrors {
    type Output = ApiError;

    fn index(&self, index: usize) -> &ApiError {
        &self.errors[index]
    }
}

impl<'a> IntoIterator for &'a ApiErrors {
    type Item = &'a ApiError;
    type IntoIter = std::slice::Iter<'a, ApiError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for ApiErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.first() {
            Some(first) if self.errors.len() == 1 => {
                write!(f, "{}: {}", first.code, first.detail)
            }
            Some(first) => write!(
                f,
                "{}: {} (and {} more)",
                first.code,
                first.detail,
                self.errors.len() - 1
            ),
            None => write!(f, "empty error set"),
        }
    }
}

impl std::error::Error for ApiErrors {}

// The panel encodes `status` as a string ("422") in some versions and as a
// number in others; accept both.
fn status_code<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u16),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(de::Error::custom),
    }
}
