//! Dispatch through the engine: group middleware, chain ordering, fail, 404 and accessors.

use std::sync::{Arc, Mutex};

use gee_core::middleware::{logger, recovery};
use gee_core::{Context, EngineBuilder, Request};
use serde_json::{json, Value};

type Trace = Arc<Mutex<Vec<String>>>;

fn traced(trace: &Trace, name: &'static str) -> impl Fn(&mut Context) + Send + Sync + 'static {
    let trace = Arc::clone(trace);
    move |c: &mut Context| {
        trace.lock().unwrap().push(format!("{name}-pre"));
        c.next();
        trace.lock().unwrap().push(format!("{name}-post"));
    }
}

fn body_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[test]
fn middleware_wraps_handler_in_lifo_order() {
    let trace: Trace = Arc::default();
    let mut r = EngineBuilder::new();
    {
        let mut g = r.group("/api");
        g.use_middleware(traced(&trace, "A"));
        g.use_middleware(traced(&trace, "B"));
        let t = Arc::clone(&trace);
        g.get("/items", move |c| {
            t.lock().unwrap().push("H".into());
            c.string(200, "ok");
        })
        .unwrap();
    }
    let engine = r.build();

    let resp = engine.handle(Request::new("GET", "/api/items"));
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body_str(), "ok");
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["A-pre", "B-pre", "H", "B-post", "A-post"]
    );
}

#[test]
fn middleware_without_next_still_reaches_handler() {
    let trace: Trace = Arc::default();
    let mut r = EngineBuilder::new();
    let t = Arc::clone(&trace);
    r.use_middleware(move |_c| t.lock().unwrap().push("M".into()));
    let t = Arc::clone(&trace);
    r.get("/", move |c| {
        t.lock().unwrap().push("H".into());
        c.html(200, "<h1>Hello Gee</h1>");
    })
    .unwrap();
    let engine = r.build();

    let resp = engine.handle(Request::new("GET", "/"));
    assert_eq!(resp.header("content-type"), Some("text/html"));
    assert_eq!(*trace.lock().unwrap(), vec!["M", "H"]);
}

#[test]
fn fail_short_circuits_the_rest_of_the_chain() {
    let trace: Trace = Arc::default();
    let mut r = EngineBuilder::new();
    {
        let mut g = r.group("/v2");
        g.use_middleware(traced(&trace, "A"));
        let t = Arc::clone(&trace);
        g.use_middleware(move |c: &mut Context| {
            t.lock().unwrap().push("B".into());
            c.fail(500, "x");
            t.lock().unwrap().push("B-after-fail".into());
        });
        let t = Arc::clone(&trace);
        g.get("/hello/:name", move |c| {
            t.lock().unwrap().push("H".into());
            c.string(200, "unreachable");
        })
        .unwrap();
    }
    let engine = r.build();

    let resp = engine.handle(Request::new("GET", "/v2/hello/geektutu"));
    assert_eq!(resp.status_code, 500);
    assert_eq!(resp.header("Content-Type"), Some("application/json"));
    assert_eq!(body_json(&resp.body), json!({ "message": "x" }));
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["A-pre", "B", "B-after-fail", "A-post"]
    );
}

#[test]
fn unmatched_path_and_method_answer_404() {
    let trace: Trace = Arc::default();
    let mut r = EngineBuilder::new();
    r.use_middleware(traced(&trace, "global"));
    r.get("/hello", |c| c.string(200, "hi")).unwrap();
    let engine = r.build();

    let resp = engine.handle(Request::new("GET", "/missing"));
    assert_eq!(resp.status_code, 404);
    assert_eq!(resp.body_str(), "404 NOT FOUND: /missing\n");

    let resp = engine.handle(Request::new("DELETE", "/hello"));
    assert_eq!(resp.status_code, 404);

    // Middleware still wraps the not-found handler.
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["global-pre", "global-post", "global-pre", "global-post"]
    );
}

#[test]
fn group_middleware_applies_by_path_prefix_in_creation_order() {
    let trace: Trace = Arc::default();
    let mut r = EngineBuilder::new();
    r.use_middleware(traced(&trace, "root"));
    {
        let mut v1 = r.group("/v1");
        v1.use_middleware(traced(&trace, "v1"));
        {
            let mut admin = v1.group("/admin");
            assert_eq!(admin.prefix(), "/v1/admin");
            admin.use_middleware(traced(&trace, "admin"));
            admin.get("/stats", |c| c.string(200, "stats")).unwrap();
        }
        v1.get("/ping", |c| c.string(200, "pong")).unwrap();
    }
    {
        let mut v2 = r.group("/v2");
        v2.use_middleware(traced(&trace, "v2"));
    }
    let engine = r.build();
    assert_eq!(engine.group_prefixes(), vec!["", "/v1", "/v1/admin", "/v2"]);

    let resp = engine.handle(Request::new("GET", "/v1/admin/stats"));
    assert_eq!(resp.body_str(), "stats");
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["root-pre", "v1-pre", "admin-pre", "admin-post", "v1-post", "root-post"]
    );

    trace.lock().unwrap().clear();
    let resp = engine.handle(Request::new("GET", "/v1/ping"));
    assert_eq!(resp.body_str(), "pong");
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["root-pre", "v1-pre", "v1-post", "root-post"]
    );
}

#[test]
fn params_query_and_form_are_exposed_to_handlers() {
    let mut r = EngineBuilder::new();
    r.get("/assets/*filepath", |c| {
        let filepath = c.param("filepath").unwrap_or("").to_string();
        c.json(200, &json!({ "filepath": filepath }));
    })
    .unwrap();
    r.get("/hello", |c| {
        let name = c.query("name").unwrap_or_default();
        c.string(200, format!("hello {name}"));
    })
    .unwrap();
    r.post("/login", |c| {
        let user = c.post_form("username").unwrap_or_default();
        let source = c.post_form("source").unwrap_or_default();
        c.json(201, &json!({ "username": user, "source": source }));
    })
    .unwrap();
    let engine = r.build();

    let resp = engine.handle(Request::new("GET", "/assets/css/geektutu.css"));
    assert_eq!(body_json(&resp.body), json!({ "filepath": "css/geektutu.css" }));

    let resp = engine.handle(Request::new("GET", "/hello?name=gee%20tutu"));
    assert_eq!(resp.body_str(), "hello gee tutu");

    let req = Request::new("POST", "/login?source=query")
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body("username=geektutu&password=1234");
    let resp = engine.handle(req);
    assert_eq!(resp.status_code, 201);
    assert_eq!(
        body_json(&resp.body),
        json!({ "username": "geektutu", "source": "query" })
    );
}

#[test]
fn last_status_and_header_write_wins() {
    let mut r = EngineBuilder::new();
    r.put("/item", |c| {
        c.status(202);
        c.set_header("X-Trace", "one");
        c.set_header("x-trace", "two");
        c.data(204, b"");
    })
    .unwrap();
    let engine = r.build();

    let resp = engine.handle(Request::new("PUT", "/item"));
    assert_eq!(resp.status_code, 204);
    assert_eq!(resp.headers, vec![("X-Trace".to_string(), "two".to_string())]);
}

#[test]
fn handler_without_status_defaults_to_200() {
    let mut r = EngineBuilder::new();
    r.delete("/item/:id", |_c| {}).unwrap();
    r.patch("/item/:id", |c| c.status(304)).unwrap();
    let engine = r.build();

    let resp = engine.handle(Request::new("DELETE", "/item/3"));
    assert_eq!(resp.status_code, 200);
    assert!(resp.body.is_empty());
    let resp = engine.handle(Request::new("PATCH", "/item/3"));
    assert_eq!(resp.status_code, 304);
}

#[test]
fn recovery_turns_panics_into_500() {
    let mut r = EngineBuilder::new();
    r.use_middleware(logger()).use_middleware(recovery());
    r.get("/panic", |c| {
        let id = c.param("id").map(str::to_owned);
        panic!("missing id: {id:?}");
    })
    .unwrap();
    r.get("/fine", |c| c.string(200, "fine")).unwrap();
    let engine = r.build();

    let resp = engine.handle(Request::new("GET", "/panic"));
    assert_eq!(resp.status_code, 500);
    assert_eq!(
        body_json(&resp.body),
        json!({ "message": "Internal Server Error" })
    );

    let resp = engine.handle(Request::new("GET", "/fine"));
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body_str(), "fine");
}

#[test]
fn with_defaults_installs_logger_and_recovery() {
    let mut r = EngineBuilder::with_defaults();
    r.get("/boom", |_c| panic!("boom")).unwrap();
    let engine = r.build();
    let resp = engine.handle(Request::new("GET", "/boom"));
    assert_eq!(resp.status_code, 500);
}

#[test]
fn engine_lists_routes_per_method() {
    let mut r = EngineBuilder::new();
    r.get("/a", |_c| {}).unwrap();
    r.post("/b/:id", |_c| {}).unwrap();
    let engine = r.build();

    assert_eq!(engine.router().methods(), vec!["GET", "POST"]);
    let posts: Vec<&str> = engine.routes("POST").iter().map(|n| n.pattern()).collect();
    assert_eq!(posts, vec!["/b/:id"]);
    assert!(engine.routes("PUT").is_empty());
}

#[test]
fn silent_handler_reports_effective_status_200() {
    let seen: Arc<Mutex<Vec<(u16, u16)>>> = Arc::default();
    let mut r = EngineBuilder::new();
    let s = Arc::clone(&seen);
    r.use_middleware(move |c| {
        c.next();
        s.lock().unwrap().push((c.status_code(), c.effective_status()));
    });
    r.use_middleware(logger());
    r.get("/quiet", |_c| {}).unwrap();
    let engine = r.build();

    let resp = engine.handle(Request::new("GET", "/quiet"));
    assert_eq!(resp.status_code, 200);
    assert_eq!(*seen.lock().unwrap(), vec![(0, 200)]);
}

#[test]
fn lowercase_method_in_raw_request_still_dispatches() {
    let mut r = EngineBuilder::new();
    r.get("/x/:id", |c| {
        let id = c.param("id").unwrap_or("").to_owned();
        c.string(200, id);
    })
    .unwrap();
    let engine = r.build();

    let req = Request {
        method: "get".into(),
        path: "/x/42".into(),
        ..Request::default()
    };
    let resp = engine.handle(req);
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body_str(), "42");
}
