//! Groups, middleware ordering and chain control.

use super::*;
use crate::{ErrorKind, Route, Router};

#[test]
fn test_group_prefixes_nest() {
    let mut router = Router::new(create_base_config()).unwrap();
    {
        let mut api = router.group("/api");
        api.get("/health", reply("ok")).unwrap();
        let mut admin = api.group("admin/");
        assert_eq!(admin.prefix(), "/api/admin");
        admin.get("/users/:id", echo_param("id")).unwrap();
        admin.get("/", reply("admin-root")).unwrap();
    }
    let engine = router.freeze().unwrap();

    assert_eq!(body_string(&engine.dispatch(get_request("/api/health"))), "ok");
    assert_eq!(
        body_string(&engine.dispatch(get_request("/api/admin/users/5"))),
        "5"
    );
    assert_eq!(
        body_string(&engine.dispatch(get_request("/api/admin"))),
        "admin-root"
    );
    assert_eq!(
        engine.dispatch(get_request("/admin/users/5")).status(),
        StatusCode::NOT_FOUND
    );
}

#[test]
fn test_middleware_runs_global_then_outer_then_inner_then_route() {
    let mut router = Router::new(create_base_config()).unwrap();
    router.use_middleware(mark("global")).unwrap();
    {
        let mut api = router.group("/api");
        api.use_middleware(mark("api")).unwrap();
        let mut admin = api.group("/admin");
        admin.use_middleware(mark("admin")).unwrap();
        admin
            .add(Route::new(Method::GET, "/trace", trace_of).middleware(mark("route")))
            .unwrap();
    }
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(get_request("/api/admin/trace"));
    assert_eq!(body_string(&response), "global>api>admin>route");
}

#[test]
fn test_sibling_groups_do_not_share_middleware() {
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .group("/a")
        .use_middleware(mark("a"))
        .unwrap()
        .get("/trace", trace_of)
        .unwrap();
    router
        .group("/b")
        .use_middleware(mark("b"))
        .unwrap()
        .get("/trace", trace_of)
        .unwrap();
    let engine = router.freeze().unwrap();

    assert_eq!(body_string(&engine.dispatch(get_request("/a/trace"))), "a");
    assert_eq!(body_string(&engine.dispatch(get_request("/b/trace"))), "b");
}

#[test]
fn test_middleware_added_after_routes_still_applies() {
    let mut router = Router::new(create_base_config()).unwrap();
    router.get("/trace", trace_of).unwrap();
    router.use_middleware(mark("late")).unwrap();
    let engine = router.freeze().unwrap();

    assert_eq!(body_string(&engine.dispatch(get_request("/trace"))), "late");
}

#[test]
fn test_global_middleware_wraps_fallback_and_options() {
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .use_middleware(from_fn(|ctx: &mut Context, next: Next<'_>| {
            next.run(ctx);
            ctx.response_headers_mut()
                .insert("x-wrapped", http::HeaderValue::from_static("yes"));
        }))
        .unwrap()
        .get("/known", reply("known"))
        .unwrap();
    let engine = router.freeze().unwrap();

    let missing = engine.dispatch(get_request("/missing"));
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.headers()["x-wrapped"], "yes");

    let not_allowed = engine.dispatch(request(Method::POST, "/known"));
    assert_eq!(not_allowed.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(not_allowed.headers()["x-wrapped"], "yes");

    let options = engine.dispatch(request(Method::OPTIONS, "/known"));
    assert_eq!(options.status(), StatusCode::NO_CONTENT);
    assert_eq!(options.headers()["x-wrapped"], "yes");
}

#[test]
fn test_group_middleware_does_not_wrap_fallback() {
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .group("/api")
        .use_middleware(mark("api"))
        .unwrap()
        .get("/x", reply("x"))
        .unwrap();
    router.fallback(trace_of).unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(get_request("/api/missing"));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(&response), "");
}

#[test]
fn test_abort_stops_the_chain() {
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .use_middleware(mark("outer"))
        .unwrap()
        .use_middleware(from_fn(|ctx: &mut Context, next: Next<'_>| {
            if ctx.header("authorization").is_none() {
                ctx.abort_with_status(StatusCode::UNAUTHORIZED);
                return;
            }
            next.run(ctx);
        }))
        .unwrap()
        .use_middleware(mark("inner"))
        .unwrap()
        .get("/secret", trace_of)
        .unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(get_request("/secret"));
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.body().is_empty());

    let authorized = Request::builder()
        .uri("/secret")
        .header("authorization", "Bearer token")
        .body(bytes::Bytes::new())
        .unwrap();
    assert_eq!(body_string(&engine.dispatch(authorized)), "outer>inner");
}

#[test]
fn test_next_after_abort_is_a_no_op() {
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .use_middleware(from_fn(|ctx: &mut Context, next: Next<'_>| {
            ctx.abort();
            next.run(ctx);
            if !ctx.is_committed() {
                ctx.text(StatusCode::FORBIDDEN, "stopped");
            }
        }))
        .unwrap()
        .get("/x", reply("handler"))
        .unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(get_request("/x"));
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(&response), "stopped");
}

#[test]
fn test_middleware_sees_response_after_next() {
    let mut router = Router::new(create_base_config()).unwrap();
    router
        .use_middleware(from_fn(|ctx: &mut Context, next: Next<'_>| {
            next.run(ctx);
            let seen = format!("{}:{}", ctx.status().as_u16(), ctx.cursor());
            ctx.response_headers_mut()
                .insert("x-seen", http::HeaderValue::from_str(&seen).unwrap());
        }))
        .unwrap()
        .get("/x", |ctx: &mut Context| ctx.text(StatusCode::ACCEPTED, "x"))
        .unwrap();
    let engine = router.freeze().unwrap();

    let response = engine.dispatch(get_request("/x"));
    assert_eq!(response.headers()["x-seen"], "202:2");
}

#[test]
fn test_group_routes_share_duplicate_detection() {
    let mut router = Router::new(create_base_config()).unwrap();
    router.get("/api/users", reply("plain")).unwrap();
    let err = router
        .group("/api")
        .get("/users", reply("group"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateRoute);
}

#[test]
fn test_frozen_group_rejects_middleware() {
    let mut router = Router::new(create_base_config()).unwrap();
    router.get("/x", reply("x")).unwrap();
    let _engine = router.freeze().unwrap();

    let err = router
        .group("/api")
        .use_middleware(mark("late"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RouterFrozen);
}
