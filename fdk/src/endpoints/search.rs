//! Endpoint search

use serde::{Deserialize, Serialize};

use super::EndpointDescriptor;

/// A descriptor field that search can look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Id,
    Name,
    Path,
    Description,
    Category,
    Method,
    Tags,
}

impl SearchField {
    pub const DEFAULT: [SearchField; 6] = [
        SearchField::Name,
        SearchField::Path,
        SearchField::Description,
        SearchField::Category,
        SearchField::Method,
        SearchField::Tags,
    ];

    /// Values of this field; array fields yield one value per element
    fn values<'a>(&self, endpoint: &'a EndpointDescriptor) -> Vec<&'a str> {
        match self {
            SearchField::Id => vec![endpoint.id.as_str()],
            SearchField::Name => vec![endpoint.name.as_str()],
            SearchField::Path => vec![endpoint.path.as_str()],
            SearchField::Description => vec![endpoint.description.as_str()],
            SearchField::Category => vec![endpoint.category.as_str()],
            SearchField::Method => vec![endpoint.method.as_str()],
            SearchField::Tags => endpoint.tags.iter().map(String::as_str).collect(),
        }
    }
}

impl std::str::FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(SearchField::Id),
            "name" => Ok(SearchField::Name),
            "path" => Ok(SearchField::Path),
            "description" => Ok(SearchField::Description),
            "category" => Ok(SearchField::Category),
            "method" => Ok(SearchField::Method),
            "tags" | "tag" => Ok(SearchField::Tags),
            other => Err(format!("Unknown search field: '{}'", other)),
        }
    }
}

/// How [`search`] matches
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub fields: Vec<SearchField>,
    pub case_sensitive: bool,
    /// Match whole values instead of substrings
    pub exact: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            fields: SearchField::DEFAULT.to_vec(),
            case_sensitive: false,
            exact: false,
        }
    }
}

/// Endpoints where any selected field matches `query`
///
/// An empty query matches everything.
pub fn search<'a>(endpoints: &'a [EndpointDescriptor], query: &str, options: &SearchOptions) -> Vec<&'a EndpointDescriptor> {
    let query = query.trim();
    if query.is_empty() {
        return endpoints.iter().collect();
    }
    let needle = fold(query, options.case_sensitive);

    endpoints
        .iter()
        .filter(|endpoint| {
            options.fields.iter().any(|field| {
                field.values(endpoint).into_iter().any(|value| {
                    let hay = fold(value, options.case_sensitive);
                    if options.exact { hay == needle } else { hay.contains(&needle) }
                })
            })
        })
        .collect()
}

fn fold(s: &str, case_sensitive: bool) -> String {
    if case_sensitive { s.to_string() } else { s.to_lowercase() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::process_endpoints;
    use serde_json::json;

    fn catalog() -> Vec<EndpointDescriptor> {
        process_endpoints(
            json!({
                "Users": [
                    {"path": "/api/users", "name": "List users", "tags": ["admin", "people"]},
                    {"path": "/api/users", "method": "POST", "name": "Create user"}
                ],
                "Flows": [
                    {"path": "/api/flows", "name": "List flows", "description": "All saved Flows"}
                ]
            }),
            false,
        )
        .unwrap()
    }

    fn names(found: Vec<&EndpointDescriptor>) -> Vec<String> {
        found.into_iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_empty_query_returns_everything() {
        let endpoints = catalog();
        assert_eq!(search(&endpoints, "  ", &SearchOptions::default()).len(), 3);
    }

    #[test]
    fn test_case_insensitive_substring_by_default() {
        let endpoints = catalog();
        assert_eq!(names(search(&endpoints, "FLOW", &SearchOptions::default())), vec!["List flows"]);
        assert_eq!(search(&endpoints, "post", &SearchOptions::default()).len(), 1);
    }

    #[test]
    fn test_case_sensitive() {
        let endpoints = catalog();
        let options = SearchOptions {
            case_sensitive: true,
            ..Default::default()
        };
        assert_eq!(names(search(&endpoints, "Flows", &options)), vec!["List flows"]);
        assert!(search(&endpoints, "FLOWS", &options).is_empty());
    }

    #[test]
    fn test_tags_are_scanned_element_wise() {
        let endpoints = catalog();
        let options = SearchOptions {
            fields: vec![SearchField::Tags],
            exact: true,
            ..Default::default()
        };
        assert_eq!(names(search(&endpoints, "people", &options)), vec!["List users"]);
        assert!(search(&endpoints, "peop", &options).is_empty());
    }

    #[test]
    fn test_field_selection() {
        let endpoints = catalog();
        let options = SearchOptions {
            fields: vec![SearchField::Name],
            ..Default::default()
        };
        // "saved" only appears in a description
        assert!(search(&endpoints, "saved", &options).is_empty());
        assert_eq!(search(&endpoints, "saved", &SearchOptions::default()).len(), 1);
    }

    #[test]
    fn test_parse_field() {
        assert_eq!("Tags".parse::<SearchField>().unwrap(), SearchField::Tags);
        assert!("color".parse::<SearchField>().is_err());
    }
}
