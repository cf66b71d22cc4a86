mod common;

use common::http::{get, with_body};
use common::test_server::start;
use http::Method;
use serde_json::json;
use webobj::content::{ContentVariant, Endpoint};
use webobj::router::{Resolved, Resolver};
use webobj::{Route, RouteTable};

/// Serves `/<name>` for a fixed set of names; declines everything else and every non-GET.
struct Catalog(&'static [&'static str]);

impl Resolver for Catalog {
    fn resolve(&self, remainder: &str, captures: &[String], method: &Method) -> Option<Resolved> {
        if method != Method::GET {
            return None;
        }
        let name = remainder.strip_prefix('/')?;
        self.0.contains(&name).then(|| Resolved {
            content: ContentVariant::typed_bytes(format!("item {name}"), "text/plain"),
            captures: captures.to_vec(),
        })
    }
}

fn table() -> RouteTable {
    RouteTable::new(vec![
        Route::pattern(
            r"/users/(\w+)/posts/(\d+)",
            Endpoint::get(2, |call| {
                Ok(json!({ "user": call.capture(0), "post": call.capture(1) }))
            }),
        )
        .unwrap(),
        Route::pattern(r"/users/(\w+)", Endpoint::get(1, |call| Ok(json!(call.capture(0))))).unwrap(),
        Route::prefix("/catalog", ContentVariant::mount(Catalog(&["apple", "pear"]))).unwrap(),
        Route::prefix("/catalog/special", ContentVariant::bytes("special")).unwrap(),
        Route::pattern(r"/.*", ContentVariant::bytes("catch-all")).unwrap(),
    ])
}

#[test]
fn test_specific_routes_win_over_catch_all() {
    let handle = start(table());
    let addr = handle.local_addr();

    assert_eq!(
        get(addr, "/users/bob/posts/3").text(),
        r#"{"post":"3","user":"bob"}"#
    );
    assert_eq!(get(addr, "/users/bob").text(), r#""bob""#);
    // Leaf patterns must cover the whole path.
    assert_eq!(get(addr, "/users/bob/extra").text(), "catch-all");
    assert_eq!(get(addr, "/anything/else").text(), "catch-all");
    handle.stop();
}

#[test]
fn test_mount_resolves_or_declines() {
    let handle = start(table());
    let addr = handle.local_addr();

    let apple = get(addr, "/catalog/apple");
    assert_eq!(apple.text(), "item apple");
    assert_eq!(apple.header("content-type"), Some("text/plain"));

    assert_eq!(get(addr, "/catalog/special").text(), "special");
    assert_eq!(get(addr, "/catalog/plum").text(), "catch-all");

    // The mount declines POST; the catch-all answers and does not support it.
    assert_eq!(with_body(addr, "POST", "/catalog/apple", "{}").status, 501);
    handle.stop();
}

#[test]
fn test_table_without_match_is_404() {
    let handle = start(RouteTable::new(vec![Route::prefix(
        "/only",
        ContentVariant::bytes("only"),
    )
    .unwrap()]));
    let addr = handle.local_addr();
    assert_eq!(get(addr, "/only").status, 200);
    assert_eq!(get(addr, "/only/not").status, 404);
    assert_eq!(get(addr, "/").status, 404);
    handle.stop();
}
