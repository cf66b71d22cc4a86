use super::{Resolution, Resolved, Resolver, Route, RouteTable};
use crate::content::{ContentVariant, Endpoint};
use crate::error::{RouteError, WebError};
use crate::object::StatefulObject;
use http::Method;
use serde_json::json;

fn kind(table: &RouteTable, path: &str) -> Option<&'static str> {
    table.resolve(path, &Method::GET).ok().map(|r| r.content.kind())
}

#[test]
fn test_prefix_leaf_matches_exact_path_only() {
    let table = RouteTable::new(vec![
        Route::prefix("/", ContentVariant::bytes("<html>Hello, Flub</html>")).unwrap()
    ]);
    assert_eq!(kind(&table, "/"), Some("static_bytes"));
    assert_eq!(kind(&table, "/other"), None);
}

#[test]
fn test_first_match_wins() {
    let table = RouteTable::new(vec![
        Route::prefix("/a", ContentVariant::bytes("first")).unwrap(),
        Route::prefix("/a", ContentVariant::file("/srv/second.css")).unwrap(),
    ]);
    assert_eq!(kind(&table, "/a"), Some("static_bytes"));
}

#[test]
fn test_pattern_route_captures_groups_in_order() {
    let ep = Endpoint::get(2, |c| Ok(json!([c.capture(0), c.capture(1)])));
    let table = RouteTable::new(vec![
        Route::pattern(r"/users/(\w+)/posts/(\d+)", ep).unwrap()
    ]);
    let hit = table.resolve("/users/ann/posts/7", &Method::GET).unwrap();
    assert_eq!(hit.captures, vec!["ann".to_string(), "7".to_string()]);
    assert!(table.resolve("/users/ann/posts/7/extra", &Method::GET).is_err());
}

#[test]
fn test_leaf_pattern_requires_full_match() {
    let table = RouteTable::new(vec![
        Route::pattern("/a|/ab", ContentVariant::bytes("x")).unwrap()
    ]);
    assert!(table.resolve("/ab", &Method::GET).is_ok());
    assert!(table.resolve("/abc", &Method::GET).is_err());
}

#[test]
fn test_endpoint_arity_checked_when_route_is_built() {
    let err = Route::pattern(r"/items/(\d+)", Endpoint::get(2, |_| Ok(json!(null)))).unwrap_err();
    assert!(matches!(
        err,
        RouteError::ArityMismatch {
            groups: 1,
            arity: 2,
            ..
        }
    ));
    assert!(Route::prefix("/x", Endpoint::get(1, |_| Ok(json!(null)))).is_err());
}

#[test]
fn test_invalid_pattern_rejected() {
    assert!(matches!(
        Route::pattern("/items/(", ContentVariant::bytes("x")),
        Err(RouteError::InvalidPattern { .. })
    ));
}

#[test]
fn test_not_found_error() {
    let table = RouteTable::new(Vec::new());
    assert!(table.is_empty());
    assert!(matches!(
        table.resolve("/missing", &Method::GET),
        Err(WebError::RouteNotFound { path }) if path == "/missing"
    ));
}

#[test]
fn test_object_route_exposes_object_and_event_stream() {
    let flub = StatefulObject::builder("flub")
        .broadcast_field("count", json!(0))
        .build();
    let table = RouteTable::new(vec![Route::prefix("/flub", flub).unwrap()]);
    assert_eq!(kind(&table, "/flub"), Some("object"));
    assert_eq!(kind(&table, "/flub+events"), Some("events"));
    assert_eq!(kind(&table, "/flub/other"), None);
}

#[test]
fn test_object_under_slash_prefix_serves_event_stream() {
    let object = || {
        StatefulObject::builder("flub")
            .broadcast_field("count", json!(0))
            .build()
    };
    let root = RouteTable::new(vec![Route::prefix("/", object()).unwrap()]);
    assert_eq!(kind(&root, "/"), Some("object"));
    assert_eq!(kind(&root, "/+events"), Some("events"));
    assert_eq!(kind(&root, "//+events"), None);

    let nested = RouteTable::new(vec![Route::prefix("/flub/", object()).unwrap()]);
    assert_eq!(kind(&nested, "/flub/"), Some("object"));
    assert_eq!(kind(&nested, "/flub/+events"), Some("events"));
    assert_eq!(kind(&nested, "/flub+events"), None);
}

struct Echo;

impl Resolver for Echo {
    fn resolve(&self, remainder: &str, captures: &[String], _method: &Method) -> Option<Resolved> {
        if remainder == "/skip" {
            return None;
        }
        let mut captures = captures.to_vec();
        captures.push(remainder.to_string());
        Some(Resolved {
            content: ContentVariant::bytes(remainder),
            captures,
        })
    }
}

#[test]
fn test_mount_receives_remainder_with_leading_slash() {
    let route = Route::prefix("/api/", ContentVariant::mount(Echo)).unwrap();
    match route.matches("/api/v1/things", &Method::GET) {
        Resolution::Matched(r) => assert_eq!(r.captures, vec!["/v1/things".to_string()]),
        other => panic!("unexpected {other:?}"),
    }
    let route = Route::prefix("/api", ContentVariant::mount(Echo)).unwrap();
    match route.matches("/api/v1", &Method::GET) {
        Resolution::Matched(r) => assert_eq!(r.captures, vec!["/v1".to_string()]),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        route.matches("/other", &Method::GET),
        Resolution::NoMatch
    ));
}

#[test]
fn test_declined_mount_falls_through_to_later_routes() {
    let table = RouteTable::new(vec![
        Route::prefix("/", ContentVariant::mount(Echo)).unwrap(),
        Route::prefix("/skip", ContentVariant::file("/srv/fallback.html")).unwrap(),
    ]);
    assert_eq!(kind(&table, "/skip"), Some("static_file"));
    assert_eq!(kind(&table, "/anything"), Some("static_bytes"));
}

#[test]
fn test_pattern_mount_passes_captures_and_remainder() {
    let route = Route::pattern(r"/u/(\d+)", ContentVariant::mount(Echo)).unwrap();
    match route.matches("/u/12/profile", &Method::GET) {
        Resolution::Matched(r) => {
            assert_eq!(r.captures, vec!["12".to_string(), "/profile".to_string()]);
        }
        other => panic!("unexpected {other:?}"),
    }
}
