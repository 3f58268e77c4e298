//! Structured query options for list endpoints

use std::fmt;

use url::form_urlencoded::byte_serialize;

/// Filter, include, sort and pagination options for a list request.
///
/// Renders to a `?`-prefixed query string with components in a fixed order
/// (filter, include, sort, page, per_page, extra pairs) regardless of the
/// order the builder methods were called in; an empty set of options
/// renders to an empty string.
///
/// # Example
/// ```
/// use ptero_client::Query;
///
/// let query = Query::new()
///     .filter("email", "admin@example.com")
///     .include("servers")
///     .per_page(25);
///
/// assert_eq!(
///     query.to_string(),
///     "?filter[email]=admin%40example.com&include=servers&per_page=25"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filter: Option<(String, String)>,
    include: Vec<String>,
    sort: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
    extra: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter results where `field` matches `value`.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some((field.into(), value.into()));
        self
    }

    /// Add a relationship to include (repeatable, order preserved).
    #[must_use]
    pub fn include(mut self, name: impl Into<String>) -> Self {
        self.include.push(name.into());
        self
    }

    /// Sort results by the given key.
    #[must_use]
    pub fn sort(mut self, key: impl Into<String>) -> Self {
        self.sort = Some(key.into());
        self
    }

    /// Set page number
    #[must_use]
    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Set items per page
    #[must_use]
    pub fn per_page(mut self, per_page: u64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Append an extra key/value pair (repeatable, order preserved).
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_none()
            && self.include.is_empty()
            && self.sort.is_none()
            && self.page.is_none()
            && self.per_page.is_none()
            && self.extra.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();

        if let Some((field, value)) = &self.filter {
            parts.push(format!("filter[{field}]={}", encode(value)));
        }
        if !self.include.is_empty() {
            let names: Vec<String> = self.include.iter().map(|n| encode(n)).collect();
            parts.push(format!("include={}", names.join(",")));
        }
        if let Some(sort) = &self.sort {
            parts.push(format!("sort={}", encode(sort)));
        }
        if let Some(page) = self.page {
            parts.push(format!("page={page}"));
        }
        if let Some(per_page) = self.per_page {
            parts.push(format!("per_page={per_page}"));
        }
        for (key, value) in &self.extra {
            parts.push(format!("{key}={}", encode(value)));
        }

        if parts.is_empty() {
            Ok(())
        } else {
            write!(f, "?{}", parts.join("&"))
        }
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_query_renders_empty() {
        assert_eq!(Query::new().to_string(), "");
        assert!(Query::new().is_empty());
    }

    #[test]
    fn test_component_order_is_fixed() {
        // Built back to front; output order must not change.
        let query = Query::new()
            .param("directory", "/logs")
            .per_page(50)
            .page(2)
            .sort("-id")
            .include("servers")
            .include("location")
            .filter("email", "a@b.c");

        assert_eq!(
            query.to_string(),
            "?filter[email]=a%40b.c&include=servers,location&sort=-id&page=2&per_page=50&directory=%2Flogs"
        );
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let query = Query::new().filter("name", "my server");
        assert_eq!(query.to_string(), "?filter[name]=my+server");
    }

    #[test]
    fn test_single_option() {
        assert_eq!(Query::new().page(3).to_string(), "?page=3");
        assert_eq!(Query::new().include("eggs").to_string(), "?include=eggs");
    }
}
