use popup_net::query::{build_url, encode_body, encode_query, parse_query};
use popup_net::{Dispatcher, Endpoint, Error, QueryItem, QueryParams, ToQuery, WithResponse};
use serde::Serialize;

#[derive(Serialize)]
struct SearchParams {
    query: String,
    sort: String,
    page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

struct BookmarkFilter {
    user_id: u64,
    only_open: bool,
}

impl ToQuery for BookmarkFilter {
    fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .push("userId", self.user_id)
            .push("onlyOpen", self.only_open)
    }
}

#[test]
fn search_example_encodes_repeated_sort_items() {
    let params = QueryParams::new()
        .push("query", "cafe")
        .push("sort", "(name,asc),(date,desc)");
    assert_eq!(
        encode_query(&params.to_items()),
        "query=cafe&sort=name%2Casc&sort=date%2Cdesc"
    );

    let endpoint: Endpoint<WithResponse<serde_json::Value>> =
        Endpoint::get("https://api.example.com", "/search/popup-stores").query(params);
    let prepared = Dispatcher::default().prepare(&endpoint).unwrap();
    assert_eq!(
        prepared.url.as_str(),
        "https://api.example.com/search/popup-stores?query=cafe&sort=name%2Casc&sort=date%2Cdesc"
    );
}

#[test]
fn one_item_per_key_without_sort() {
    let params = QueryParams::new()
        .push("query", "pop up & more")
        .push("page", 2)
        .push("size", 20)
        .push("open", true)
        .push("lat", 37.5665);
    let items = params.to_items();
    assert_eq!(items.len(), params.len());
    assert_eq!(
        items,
        vec![
            QueryItem::new("query", "pop up & more"),
            QueryItem::new("page", "2"),
            QueryItem::new("size", "20"),
            QueryItem::new("open", "true"),
            QueryItem::new("lat", "37.5665"),
        ]
    );
}

#[test]
fn encode_then_parse_round_trips() {
    let params = QueryParams::new()
        .push("query", "성수 팝업")
        .push("sort", "(viewCount,desc),(name,asc),(id,desc)")
        .push("cursor", "a+b=c");
    let encoded = encode_query(&params.to_items());
    let parsed = parse_query(&encoded);

    let sorts: Vec<&str> = parsed
        .iter()
        .filter(|item| item.name == "sort")
        .map(|item| item.value.as_str())
        .collect();
    assert_eq!(sorts, vec!["viewCount,desc", "name,asc", "id,desc"]);

    let scalar = |name: &str| {
        parsed
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value.clone())
    };
    assert_eq!(scalar("query").as_deref(), Some("성수 팝업"));
    assert_eq!(scalar("cursor").as_deref(), Some("a+b=c"));
}

#[test]
fn serialized_struct_keeps_field_order_and_skips_absent() {
    let params = QueryParams::from_serialize(&SearchParams {
        query: "cafe".into(),
        sort: "(name,asc)".into(),
        page: 0,
        category: None,
    })
    .unwrap();
    let items = params.to_items();
    assert_eq!(
        items,
        vec![
            QueryItem::new("query", "cafe"),
            QueryItem::new("sort", "name,asc"),
            QueryItem::new("page", "0"),
        ]
    );
}

#[test]
fn serialized_sort_array_explodes() {
    #[derive(Serialize)]
    struct Paged {
        sort: Vec<&'static str>,
        size: u8,
    }
    let items = QueryParams::from_serialize(&Paged {
        sort: vec!["createdAt,desc", "id,asc"],
        size: 10,
    })
    .unwrap()
    .to_items();
    assert_eq!(
        encode_query(&items),
        "sort=createdAt%2Cdesc&sort=id%2Casc&size=10"
    );
}

#[test]
fn non_object_parameters_are_rejected() {
    let err = QueryParams::from_serialize(&vec![1, 2, 3]).unwrap_err();
    assert!(matches!(err, Error::Encode(_)));
}

#[test]
fn explicit_mapping_feeds_the_endpoint() {
    let endpoint: Endpoint<WithResponse<serde_json::Value>> =
        Endpoint::get("http://localhost:8080", "/api/v1/bookmarks").query_from(&BookmarkFilter {
            user_id: 42,
            only_open: false,
        });
    let prepared = Dispatcher::default().prepare(&endpoint).unwrap();
    assert_eq!(prepared.url.query(), Some("userId=42&onlyOpen=false"));
}

#[test]
fn empty_body_is_not_sent() {
    #[derive(Serialize)]
    struct Empty {}

    let endpoint: Endpoint<WithResponse<serde_json::Value>> =
        Endpoint::post("http://localhost:8080", "/api/v1/popup-stores/1/views")
            .json(&Empty {})
            .unwrap();
    let prepared = Dispatcher::default().prepare(&endpoint).unwrap();
    assert!(prepared.body.is_none());
    assert!(prepared.headers.get("content-type").is_none());

    assert_eq!(encode_body(&serde_json::json!({})).unwrap(), None);
}

#[test]
fn json_body_sets_content_type() {
    let endpoint: Endpoint<WithResponse<serde_json::Value>> =
        Endpoint::post("http://localhost:8080", "/api/v1/comments")
            .json(&serde_json::json!({"content": "great store"}))
            .unwrap();
    let prepared = Dispatcher::default().prepare(&endpoint).unwrap();
    assert_eq!(
        prepared.body.as_deref(),
        Some(br#"{"content":"great store"}"#.as_slice())
    );
    assert_eq!(
        prepared.headers.get("content-type").unwrap(),
        "application/json"
    );
}

#[test]
fn malformed_urls_fail_before_io() {
    let err = build_url("not a url", "/x", &[]).unwrap_err();
    assert!(matches!(err, Error::UrlBuild(_)));

    let endpoint: Endpoint<WithResponse<serde_json::Value>> =
        Endpoint::get("http://localhost", "http://other.example/x");
    let err = Dispatcher::default().prepare(&endpoint).unwrap_err();
    assert!(matches!(err, Error::UrlBuild(_)));
}

#[test]
fn invalid_header_names_are_encode_errors() {
    let endpoint: Endpoint<WithResponse<serde_json::Value>> =
        Endpoint::get("http://localhost", "/x").header("bad header", "v");
    let err = Dispatcher::default().prepare(&endpoint).unwrap_err();
    assert!(matches!(err, Error::Encode(_)));
}

#[test]
fn grouped_sort_list_matches_scalar_form() {
    #[derive(Serialize)]
    struct Search {
        query: &'static str,
        sort: Vec<&'static str>,
    }
    let from_list = QueryParams::from_serialize(&Search {
        query: "cafe",
        sort: vec!["(name,asc)", "(date,desc)"],
    })
    .unwrap();
    let from_builder = QueryParams::new()
        .push("query", "cafe")
        .push_list("sort", ["(name,asc)", "(date,desc)"]);

    let expected = "query=cafe&sort=name%2Casc&sort=date%2Cdesc";
    assert_eq!(encode_query(&from_list.to_items()), expected);
    assert_eq!(encode_query(&from_builder.to_items()), expected);
}
