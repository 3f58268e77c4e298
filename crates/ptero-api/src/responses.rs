//! Response envelope types for the panel API
//!
//! The panel wraps every resource in a JSON-API style envelope: collections
//! as `{"data": [{"attributes": {...}}, ...]}`, single resources as
//! `{"attributes": {...}}`, and a handful of endpoints (websocket auth,
//! two-factor details) as a bare `{"data": {...}}` object.

use serde::Deserialize;

/// A single wrapped resource.
#[derive(Debug, Clone, Deserialize)]
pub struct Item<T> {
    pub attributes: T,
}

/// A wrapped collection of resources.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub data: Vec<Item<T>>,
}

impl<T> Listing<T> {
    /// Unwraps every element down to its attributes, preserving order.
    pub fn into_attributes(self) -> Vec<T> {
        self.data.into_iter().map(|item| item.attributes).collect()
    }
}

/// A bare `data` object wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct DataWrapper<T> {
    pub data: T,
}
