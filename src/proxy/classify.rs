//! Decides whether a response carries rewritable search results.

use axum::http::{header::CONTENT_TYPE, HeaderMap};
use std::collections::BTreeMap;

use crate::config::RewriteConfig;
use crate::normalize::META_QUERY;

/// Request-side half of "is this a search response".
#[derive(Debug, Clone)]
pub struct SearchClassifier {
    path_marker: String,
    param: String,
    search_types: Vec<String>,
    include_query_metadata: bool,
}

impl SearchClassifier {
    pub fn new(config: &RewriteConfig) -> Self {
        Self {
            path_marker: config.search_path_marker.to_ascii_lowercase(),
            param: config.search_param.clone(),
            search_types: config
                .search_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
            include_query_metadata: config.include_query_metadata,
        }
    }

    /// True when the path carries the search marker and the operation
    /// parameter names a recognized search type.
    pub fn is_search_request(&self, path: &str, query: Option<&str>) -> bool {
        if !path.to_ascii_lowercase().contains(&self.path_marker) {
            return false;
        }
        query_param(query, &self.param)
            .map(|op| {
                let op = op.trim().to_ascii_lowercase();
                self.search_types.iter().any(|t| *t == op)
            })
            .unwrap_or(false)
    }

    /// Document-wide metadata taken from the request query.
    pub fn request_metadata(&self, query: Option<&str>) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        if self.include_query_metadata {
            if let Some(q) = query_param(query, "q").filter(|q| !q.trim().is_empty()) {
                metadata.insert(META_QUERY.to_string(), q.trim().to_string());
            }
        }
        metadata
    }
}

/// Response-side half: the declared content type is an XML document.
pub fn is_xml_response(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("xml"))
        .unwrap_or(false)
}

/// First value of `name` in a URL query string, percent-decoded.
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn classifier() -> SearchClassifier {
        SearchClassifier::new(&RewriteConfig::default())
    }

    #[test]
    fn test_search_requests() {
        let c = classifier();
        assert!(c.is_search_request("/1/api", Some("t=search&q=naruto")));
        assert!(c.is_search_request("/api/v1/indexer/3/newznab/api", Some("apikey=x&t=TVSEARCH")));
        assert!(c.is_search_request("/2/api", Some("t=movie")));
    }

    #[test]
    fn test_non_search_requests() {
        let c = classifier();
        assert!(!c.is_search_request("/1/api", Some("t=caps")));
        assert!(!c.is_search_request("/1/api", None));
        assert!(!c.is_search_request("/1/download", Some("t=search")));
        assert!(!c.is_search_request("/1/api", Some("type=search")));
    }

    #[test]
    fn test_xml_content_types() {
        let mut headers = HeaderMap::new();
        assert!(!is_xml_response(&headers));

        for ct in ["application/rss+xml; charset=utf-8", "text/xml", "application/xml"] {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
            assert!(is_xml_response(&headers), "{ct}");
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_xml_response(&headers));
    }

    #[test]
    fn test_query_metadata() {
        let c = classifier();
        let meta = c.request_metadata(Some("t=tvsearch&q=Golden+Kamuy%202&season=2"));
        assert_eq!(meta.get(META_QUERY).map(String::as_str), Some("Golden Kamuy 2"));
        assert!(c.request_metadata(Some("t=search&q=")).is_empty());

        let config = RewriteConfig {
            include_query_metadata: false,
            ..RewriteConfig::default()
        };
        let c = SearchClassifier::new(&config);
        assert!(c.request_metadata(Some("t=search&q=x")).is_empty());
    }
}
