//! Query string and body encoding.
//!
//! Parameters are an ordered list of `(name, QueryValue)` pairs. Every key
//! renders to exactly one `QueryItem`, except the reserved `sort` key whose
//! value is split into one item per sort criterion.

use std::fmt::Display;

use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::errors::Error;

/// Key whose value is exploded into repeated query items.
pub const SORT_KEY: &str = "sort";

/// A single rendered `name=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryItem {
    pub name: String,
    pub value: String,
}

impl QueryItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Scalar(String),
    List(Vec<String>),
}

/// Ordered query parameters for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

/// Explicit mapping from a request type to its query parameters.
pub trait ToQuery {
    fn to_query(&self) -> QueryParams;
}

impl ToQuery for QueryParams {
    fn to_query(&self) -> QueryParams {
        self.clone()
    }
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.entries
            .push((name.into(), QueryValue::Scalar(value.to_string())));
        self
    }

    /// Adds the parameter only when a value is present.
    pub fn push_opt<V: Display>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.push(name, value),
            None => self,
        }
    }

    pub fn push_list<I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.entries.push((name.into(), QueryValue::List(values)));
        self
    }

    /// Builds parameters from a serializable struct, keeping field declaration
    /// order. `None` fields are skipped.
    pub fn from_serialize<T: Serialize + ?Sized>(params: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(params).map_err(|e| Error::Encode(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(Error::Encode(
                "query parameters must serialize to an object".to_string(),
            ));
        };
        let mut entries = Vec::with_capacity(map.len());
        for (name, value) in map {
            let value = match value {
                Value::Null => continue,
                Value::Array(items) => {
                    QueryValue::List(items.into_iter().filter_map(scalar_text).collect())
                }
                other => match scalar_text(other) {
                    Some(text) => QueryValue::Scalar(text),
                    None => continue,
                },
            };
            entries.push((name, value));
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(String, QueryValue)] {
        &self.entries
    }

    /// Renders the parameters into wire-order query items.
    pub fn to_items(&self) -> Vec<QueryItem> {
        let mut items = Vec::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            if name == SORT_KEY {
                let tokens = match value {
                    QueryValue::Scalar(raw) => split_sort_tokens(raw),
                    QueryValue::List(values) => values
                        .iter()
                        .flat_map(|v| split_sort_tokens(v))
                        .collect(),
                };
                items.extend(tokens.into_iter().map(|t| QueryItem::new(SORT_KEY, t)));
                continue;
            }
            let text = match value {
                QueryValue::Scalar(text) => text.clone(),
                QueryValue::List(values) => values.join(","),
            };
            items.push(QueryItem::new(name.clone(), text));
        }
        items
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Splits a delimited sort value into individual criteria.
///
/// `"(name,asc),(date,desc)"` yields `["name,asc", "date,desc"]`. Outside
/// parentheses commas separate criteria; a value with no parentheses at all is
/// one criterion. Nested parentheses are dropped, so `"((name,asc))"` is
/// `name,asc`.
pub fn split_sort_tokens(raw: &str) -> Vec<String> {
    if !raw.contains('(') {
        return normalize_token(raw).into_iter().collect();
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in raw.chars() {
        match ch {
            '(' => {
                if depth == 0 {
                    tokens.extend(normalize_token(&current));
                    current.clear();
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    tokens.extend(normalize_token(&current));
                    current.clear();
                }
            }
            ',' if depth == 0 => {
                tokens.extend(normalize_token(&current));
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    tokens.extend(normalize_token(&current));
    tokens
}

fn normalize_token(raw: &str) -> Option<String> {
    let token: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let token = token.trim_matches(|c| matches!(c, '"' | '(' | ')'));
    if token.is_empty() || token.chars().all(|c| matches!(c, '(' | ')' | ',')) {
        return None;
    }
    Some(token.to_string())
}

/// Percent-encodes items into `a=1&b=2` form.
pub fn encode_query(items: &[QueryItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{}={}",
                urlencoding::encode(&item.name),
                urlencoding::encode(&item.value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Parses a query string back into ordered items. A leading `?` is ignored.
pub fn parse_query(query: &str) -> Vec<QueryItem> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            QueryItem::new(decode_component(name), decode_component(value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

/// Joins base, relative path and query items into an absolute URL.
pub fn build_url(base_url: &str, path: &str, items: &[QueryItem]) -> Result<Url, Error> {
    if path.contains("://") {
        return Err(Error::UrlBuild(format!("path '{path}' must be relative")));
    }
    let base = base_url.trim_end_matches('/');
    let mut url = if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    };
    if !items.is_empty() {
        url.push('?');
        url.push_str(&encode_query(items));
    }
    let parsed =
        Url::parse(&url).map_err(|e| Error::UrlBuild(format!("'{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::UrlBuild(format!(
            "'{url}': unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

/// JSON body bytes, or `None` when the body is an empty object or null.
pub fn encode_body(body: &Value) -> Result<Option<Vec<u8>>, Error> {
    match body {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        other => serde_json::to_vec(other)
            .map(Some)
            .map_err(|e| Error::Encode(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parenthesised_groups_become_tokens() {
        assert_eq!(
            split_sort_tokens("(name,asc),(date,desc)"),
            vec!["name,asc".to_string(), "date,desc".to_string()]
        );
    }

    #[test]
    fn whitespace_and_quotes_are_stripped() {
        assert_eq!(
            split_sort_tokens("( \"name, asc\" ),\n  ( date , desc )"),
            vec!["name,asc".to_string(), "date,desc".to_string()]
        );
    }

    #[test]
    fn bare_value_is_a_single_token() {
        assert_eq!(split_sort_tokens("createdAt,desc"), vec!["createdAt,desc"]);
    }

    #[test]
    fn punctuation_only_tokens_are_dropped() {
        assert_eq!(split_sort_tokens("(),(,),( ),"), Vec::<String>::new());
        assert_eq!(split_sort_tokens(","), Vec::<String>::new());
    }

    #[test]
    fn bare_tokens_between_groups_are_kept() {
        assert_eq!(
            split_sort_tokens("(name,asc),id"),
            vec!["name,asc".to_string(), "id".to_string()]
        );
    }

    #[test]
    fn sort_list_values_emit_one_item_each() {
        let items = QueryParams::new()
            .push_list("sort", ["name,asc", " (", "date ,desc"])
            .to_items();
        assert_eq!(
            items,
            vec![
                QueryItem::new("sort", "name,asc"),
                QueryItem::new("sort", "date,desc"),
            ]
        );
    }

    #[test]
    fn sort_list_elements_are_tokenised() {
        let items = QueryParams::new()
            .push_list("sort", ["(name,asc)", "(date,desc),(id,asc)"])
            .to_items();
        assert_eq!(
            encode_query(&items),
            "sort=name%2Casc&sort=date%2Cdesc&sort=id%2Casc"
        );
    }

    #[test]
    fn nested_groups_lose_every_paren() {
        assert_eq!(split_sort_tokens("((name,asc))"), vec!["name,asc"]);
        assert_eq!(
            split_sort_tokens("((name,asc)),(date,desc)"),
            vec!["name,asc", "date,desc"]
        );
    }

    #[test]
    fn stray_parens_are_trimmed() {
        assert_eq!(split_sort_tokens("name,asc)"), vec!["name,asc"]);
    }

    #[test]
    fn non_sort_list_is_joined() {
        let items = QueryParams::new().push_list("ids", [1, 2, 3]).to_items();
        assert_eq!(items, vec![QueryItem::new("ids", "1,2,3")]);
    }

    #[test]
    fn build_url_joins_with_single_slash() {
        let url = build_url("http://localhost:8080/", "/api/v1/stores", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v1/stores");
        let url = build_url("http://localhost:8080", "api/v1/stores", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/v1/stores");
    }

    #[test]
    fn build_url_rejects_absolute_path() {
        let err = build_url("http://localhost", "https://evil.example/x", &[]).unwrap_err();
        assert!(matches!(err, Error::UrlBuild(_)));
    }

    #[test]
    fn build_url_rejects_schemeless_base() {
        let err = build_url("localhost:8080", "/x", &[]).unwrap_err();
        assert!(matches!(err, Error::UrlBuild(_)));
    }

    #[test]
    fn empty_object_body_is_omitted() {
        assert_eq!(encode_body(&serde_json::json!({})).unwrap(), None);
        assert_eq!(encode_body(&Value::Null).unwrap(), None);
        assert_eq!(
            encode_body(&serde_json::json!({"a": 1})).unwrap(),
            Some(br#"{"a":1}"#.to_vec())
        );
    }
}
