use request_tags::{
    Context, Engine, EngineOptions, Error, Method, QueryDict, Request, TemplateSyntaxError, Value,
};

// ── Helpers ─────────────────────────────────────────────────────────────

fn render(source: &str, ctx: &mut Context) -> String {
    Engine::new()
        .render_string(source, ctx)
        .unwrap_or_else(|e| panic!("render failed: {e}"))
}

fn compile_error(source: &str) -> TemplateSyntaxError {
    match Engine::new().from_string(source) {
        Ok(template) => panic!("expected a syntax error, compiled {:?}", template.ast()),
        Err(e) => e,
    }
}

fn mutable(query: &str) -> QueryDict {
    QueryDict::parse(query, true)
}

fn request_ctx(path: &str) -> Context {
    let mut ctx = Context::new();
    ctx.set("request", Value::request(Request::new(Method::Get, "http", "testserver", path)));
    ctx
}

// ── append_key ──────────────────────────────────────────────────────────

#[test]
fn test_append_key() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% append_key query_dict "foo" "baz" %}{{ query_dict.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=bar&foo=baz");
}

#[test]
fn test_append_key_multiple_values() {
    let mut ctx: Context = [("qd", mutable(""))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% append_key qd "k" "a" "b" 3 %}{{ qd.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "k=a&k=b&k=3");
}

#[test]
fn test_append_key_bad_args() {
    let err = compile_error("{% load request_utils %}{% append_key query_dict %}");
    assert_eq!(
        err.message,
        "'append_key' tag requires at least three values: a querydict, a key, and one or more values to append"
    );
}

#[test]
fn test_append_key_bad_var() {
    let out = render(
        r#"{% load request_utils %}{% append_key query_dict "foo" "baz" %}{{ query_dict.urlencode|safe }}"#,
        &mut Context::new(),
    );
    assert_eq!(out, "");
}

#[test]
fn test_append_key_key_not_in_context() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% append_key query_dict foo "bar" %}{{ query_dict.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=bar");
}

#[test]
fn test_append_key_value_not_in_context() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% append_key query_dict "foo" bar "baz" %}{{ query_dict.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=bar&foo=baz");
}

// ── replace_key ─────────────────────────────────────────────────────────

#[test]
fn test_replace_key() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% replace_key query_dict "foo" "baz" %}{{ query_dict.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=baz");
}

#[test]
fn test_replace_key_bad_args() {
    let err = compile_error("{% load request_utils %}{% replace_key query_dict %}");
    assert!(err.message.starts_with("'replace_key' tag requires at least three values"));
}

#[test]
fn test_replace_key_bad_var() {
    let out = render(
        r#"{% load request_utils %}{% replace_key query_dict "foo" "baz" %}{{ query_dict.urlencode|safe }}"#,
        &mut Context::new(),
    );
    assert_eq!(out, "");
}

#[test]
fn test_replace_key_key_not_in_context() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% replace_key query_dict foo "bar" %}{{ query_dict.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=bar");
}

#[test]
fn test_replace_key_value_not_in_context() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% replace_key query_dict "foo" bar %}{{ query_dict.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "");
}

// ── delete_key ──────────────────────────────────────────────────────────

#[test]
fn test_delete_key() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{{ query_dict.urlencode|safe }}{% delete_key query_dict "foo" %}{{ query_dict.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=bar");
}

#[test]
fn test_delete_key_bad_args() {
    let err = compile_error("{% load request_utils %}{% delete_key query_dict %}");
    assert_eq!(
        err.message,
        "'delete_key' tag requires at least two values: a querydict and one or more keys to delete"
    );
}

#[test]
fn test_delete_key_key_not_in_context() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        "{% load request_utils %}{% delete_key query_dict foo %}{{ query_dict.urlencode|safe }}",
        &mut ctx,
    );
    assert_eq!(out, "foo=bar");
}

#[test]
fn test_delete_key_key_not_in_dict() {
    let mut ctx: Context = [("query_dict", mutable("bar=baz"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% delete_key query_dict "foo" %}{{ query_dict.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "bar=baz");
}

// ── update_query_dict ───────────────────────────────────────────────────

#[test]
fn test_update_query_dict() {
    let mut ctx = Context::new();
    ctx.set("original", mutable("foo=bar"));
    ctx.set("new", [("baz", "quux")].into_iter().collect::<Value>());
    let out = render(
        "{% load request_utils %}{% update_query_dict original new %}{{ original.urlencode|safe }}",
        &mut ctx,
    );
    assert_eq!(out, "foo=bar&baz=quux");
}

#[test]
fn test_update_query_dict_from_query_dicts() {
    let mut ctx = Context::new();
    ctx.set("original", mutable("a=1"));
    ctx.set("first", QueryDict::parse("a=2&b=3", false));
    ctx.set("second", QueryDict::parse("c=4", false));
    let out = render(
        "{% load request_utils %}{% update_query_dict original first missing second %}{{ original.urlencode|safe }}",
        &mut ctx,
    );
    assert_eq!(out, "a=1&a=2&b=3&c=4");
}

#[test]
fn test_update_query_dict_bad_args() {
    let err = compile_error("{% load request_utils %}{% update_query_dict query_dict %}");
    assert!(err.message.starts_with("'update_query_dict' tag requires at least two values"));
}

#[test]
fn test_update_query_dict_update_dict_not_in_context() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        "{% load request_utils %}{% update_query_dict query_dict other %}{{ query_dict.urlencode|safe }}",
        &mut ctx,
    );
    assert_eq!(out, "foo=bar");
}

// ── clone_query_dict ────────────────────────────────────────────────────

#[test]
fn test_clone_query_dict() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% clone_query_dict query_dict as "new" %}{{ new.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=bar");
}

#[test]
fn test_clone_query_dict_is_independent() {
    let mut ctx: Context = [("query_dict", mutable("foo=bar"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% clone_query_dict query_dict as "new" %}{% append_key new "x" "1" %}{{ query_dict.urlencode|safe }}|{{ new.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=bar|foo=bar&x=1");
}

#[test]
fn test_clone_of_immutable_is_mutable() {
    let mut ctx = request_ctx("/list/?page=1&sort=name");
    let out = render(
        r#"{% load request_utils %}{% clone_query_dict request.GET as "qd" %}{% replace_key qd "page" 2 %}{{ qd.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "sort=name&page=2");
}

#[test]
fn test_mutating_immutable_renders_nothing() {
    let mut ctx = Context::new();
    ctx.set("qd", QueryDict::parse("foo=bar", false));
    let out = render(
        r#"{% load request_utils %}{% append_key qd "foo" "baz" %}{% delete_key qd "foo" %}{{ qd.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "foo=bar");
}

#[test]
fn test_clone_query_dict_bad_args() {
    let err = compile_error("{% load request_utils %}{% clone_query_dict query_dict %}");
    assert_eq!(
        err.message,
        "'clone_query_dict' tag must be called with the arguments: querydict variable, 'as', and a context variable name"
    );
    assert!(compile_error(r#"{% load request_utils %}{% clone_query_dict query_dict to "x" %}"#)
        .message
        .starts_with("'clone_query_dict' tag must be called"));
}

#[test]
fn test_clone_query_dict_destination_not_in_context() {
    let mut ctx: Context = [("query_dict", QueryDict::parse("foo=bar", false))]
        .into_iter()
        .collect();
    let out = render(
        "{% load request_utils %}{% clone_query_dict query_dict as destination %}{{ some_var.urlencode|safe }}",
        &mut ctx,
    );
    assert_eq!(out, "");
}

#[test]
fn test_clone_query_dict_destination_from_variable() {
    let mut ctx = Context::new();
    ctx.set("query_dict", mutable("foo=bar"));
    ctx.set("name", "copied");
    let out = render(
        "{% load request_utils %}{% clone_query_dict query_dict as name %}{{ copied.urlencode|safe }}",
        &mut ctx,
    );
    assert_eq!(out, "foo=bar");
}

// ── query_dict ──────────────────────────────────────────────────────────

#[test]
fn test_query_dict() {
    let out = render(
        r#"{% load request_utils %}{% query_dict as "foo" %}{% append_key foo "foo" "bar" %}{{ foo.urlencode|safe }}"#,
        &mut Context::new(),
    );
    assert_eq!(out, "foo=bar");
}

#[test]
fn test_query_dict_bad_args() {
    let err = compile_error("{% load request_utils %}{% query_dict %}");
    assert_eq!(
        err.message,
        "'query_dict' tag must be called with the arguments: 'as', and a context variable name"
    );
}

#[test]
fn test_query_dict_destination_not_in_context() {
    let out = render(
        "{% load request_utils %}{% query_dict as destination %}{{ some_var.urlencode|safe }}",
        &mut Context::new(),
    );
    assert_eq!(out, "");
}

// ── qualified_url ───────────────────────────────────────────────────────

#[test]
fn test_qualified_url() {
    let mut ctx = request_ctx("/foo/");
    let out = render("{% load request_utils %}{% qualified_url request.path %}", &mut ctx);
    assert_eq!(out, "http://testserver/foo/");
}

#[test]
fn test_qualified_url_relative_path() {
    let mut ctx = request_ctx("/foo/bar");
    let out = render(r#"{% load request_utils %}{% qualified_url "baz/" %}"#, &mut ctx);
    assert_eq!(out, "http://testserver/foo/baz/");
}

#[test]
fn test_qualified_url_with_as_var() {
    let mut ctx = request_ctx("/foo/");
    let out = render(
        r#"{% load request_utils %}{% qualified_url request.path as "foo" %}No output, then suddenly: {{ foo|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "No output, then suddenly: http://testserver/foo/");
}

#[test]
fn test_qualified_url_bad_args() {
    let err = compile_error("{% load request_utils %}{% qualified_url %}");
    assert_eq!(
        err.message,
        "'qualified_url' tag must be called with the arguments: 'as', and a context variable name"
    );
}

#[test]
fn test_qualified_url_destination_not_in_context() {
    let mut ctx = request_ctx("/foo/");
    let out = render(
        "{% load request_utils %}{% qualified_url request.path as destination %}{{ some_var.urlencode|safe }}",
        &mut ctx,
    );
    assert_eq!(out, "");
}

#[test]
fn test_qualified_url_without_request() {
    let out = render(r#"{% load request_utils %}{% qualified_url "/foo/" %}"#, &mut Context::new());
    assert_eq!(out, "");
}

// ── current_location ────────────────────────────────────────────────────

#[test]
fn test_current_location() {
    let mut ctx = request_ctx("/foo/");
    let out = render("{% load request_utils %}{% current_location %}", &mut ctx);
    assert_eq!(out, "/foo/");
}

#[test]
fn test_current_location_with_query() {
    let mut ctx = request_ctx("/foo/?a=1");
    let out = render("{% load request_utils %}{% current_location %}", &mut ctx);
    assert_eq!(out, "/foo/?a=1");
}

#[test]
fn test_current_location_with_as_var() {
    let mut ctx = request_ctx("/foo/");
    let out = render(
        r#"{% load request_utils %}{% current_location as "path" %}No output, then suddenly: {{ path|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "No output, then suddenly: /foo/");
}

#[test]
fn test_current_location_bad_args() {
    let err = compile_error(r#"{% load request_utils %}{% current_location as "foo" "bar" %}"#);
    assert!(err.message.starts_with("'current_location' tag must be called"));
}

#[test]
fn test_current_location_destination_not_in_context() {
    let mut ctx = request_ctx("/foo/");
    let out = render(
        "{% load request_utils %}{% current_location as destination %}{{ some_var.urlencode|safe }}",
        &mut ctx,
    );
    assert_eq!(out, "");
}

// ── Engine ──────────────────────────────────────────────────────────────

#[test]
fn test_tags_require_load() {
    let err = compile_error("{% current_location %}");
    assert!(err.message.contains("Invalid block tag"), "{}", err.message);
}

#[test]
fn test_unknown_library() {
    let err = compile_error("{% load nope %}");
    assert_eq!(err.message, "'nope' is not a registered tag library");
}

#[test]
fn test_syntax_error_has_span() {
    let source = "line one\n{% load request_utils %}{% query_dict %}";
    let err = compile_error(source);
    assert!(err.span.is_some());
    assert!(err.format_with_source(source, Some("page.html")).contains("page.html:2:"));
}

#[test]
fn test_render_string_reports_syntax_errors() {
    let result = Engine::new().render_string("{% load request_utils %}{% query_dict %}", &mut Context::new());
    assert!(matches!(result, Err(Error::Syntax(_))));
}

#[test]
fn test_compiled_template_renders_repeatedly() {
    let template = Engine::new()
        .from_string(r#"{% load request_utils %}{% append_key qd "n" 1 %}{{ qd.urlencode|safe }}"#)
        .unwrap();
    let mut ctx: Context = [("qd", mutable(""))].into_iter().collect();
    assert_eq!(template.render(&mut ctx).unwrap(), "n=1");
    assert_eq!(template.render(&mut ctx).unwrap(), "n=1&n=1");
}

#[test]
fn test_custom_request_variable() {
    let engine = Engine::with_options(EngineOptions::new().request_variable("req"));
    let mut ctx = Context::new();
    ctx.set("req", Value::request(Request::new(Method::Get, "https", "example.com", "/a/")));
    let out = engine
        .render_string(r#"{% load request_utils %}{% qualified_url "b" %}"#, &mut ctx)
        .unwrap();
    assert_eq!(out, "https://example.com/a/b");
}

#[test]
fn test_from_uri_request() {
    let request = Request::from_uri(Method::Get, "http://localhost:8000/x/?q=1").unwrap();
    let mut ctx = Context::new();
    ctx.set("request", Value::request(request));
    let out = render(
        "{% load request_utils %}{% qualified_url request.get_full_path %}",
        &mut ctx,
    );
    assert_eq!(out, "http://localhost:8000/x/?q=1");
}

// ── Properties ──────────────────────────────────────────────────────────

#[test]
fn test_replace_removes_every_prior_value() {
    let mut ctx: Context = [("qd", mutable("a=1&a=2&b=3&a=4"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% replace_key qd "a" "x" "y" %}{{ qd.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "b=3&a=x&a=y");
}

#[test]
fn test_delete_removes_every_value() {
    let mut ctx: Context = [("qd", mutable("a=1&b=2&a=3"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% delete_key qd "a" "missing" %}{{ qd.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "b=2");
}

#[test]
fn test_failed_target_leaves_context_untouched() {
    let mut ctx = Context::new();
    let out = render(
        r#"{% load request_utils %}{% clone_query_dict missing as "copy" %}{% append_key missing "a" "b" %}{% qualified_url "/x/" as "url" %}"#,
        &mut ctx,
    );
    assert_eq!(out, "");
    assert!(!ctx.contains("copy"));
    assert!(!ctx.contains("missing"));
    assert!(!ctx.contains("url"));
}

#[test]
fn test_qualified_url_absolute_path_binds_with_as() {
    let mut ctx = request_ctx("/some/where/");
    let out = render(
        r#"{% load request_utils %}{% qualified_url "/foo/" as "url" %}"#,
        &mut ctx,
    );
    assert_eq!(out, "");
    assert_eq!(ctx.get("url"), Some(&Value::from("http://testserver/foo/")));
}

// ── Argument resolution ─────────────────────────────────────────────────

#[test]
fn test_clone_request_query_and_link() {
    let mut ctx = request_ctx("/foo/?a=1");
    let out = render(
        concat!(
            r#"{% load request_utils %}{% clone_query_dict request.GET as "qd" %}"#,
            r#"{% replace_key qd "a" 2 %}{% qualified_url "bar/" %}?{{ qd.urlencode }}"#,
        ),
        &mut ctx,
    );
    assert_eq!(out, "http://testserver/foo/bar/?a=2");
}

#[test]
fn test_unquoted_destination_is_looked_up() {
    let mut ctx = request_ctx("/foo/?a=1");
    let out = render(
        "{% load request_utils %}{% clone_query_dict request.GET as qd %}{{ qd.urlencode }}",
        &mut ctx,
    );
    assert_eq!(out, "");
    assert!(!ctx.contains("qd"));
}

#[test]
fn test_replace_key_reads_values_before_removing() {
    let mut ctx: Context = [("qd", mutable("a=1&b=2"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% replace_key qd "a" qd.a "x" %}{{ qd.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "b=2&a=1&a=x");
}

#[test]
fn test_safe_keeps_missing_values_absent() {
    let mut ctx: Context = [("qd", mutable(""))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% append_key qd "k" missing|safe "v" %}{{ qd.urlencode|safe }}[{{ missing|safe }}]"#,
        &mut ctx,
    );
    assert_eq!(out, "k=v[]");
}

#[test]
fn test_query_dict_key_shadows_attribute() {
    let mut ctx: Context = [("qd", mutable("a=1"))].into_iter().collect();
    let out = render(
        r#"{% load request_utils %}{% append_key qd "copy" "x" %}{{ qd.copy }}"#,
        &mut ctx,
    );
    assert_eq!(out, "x");
}

#[test]
fn test_non_mapping_arguments_are_skipped() {
    let mut ctx = Context::new();
    ctx.set("qd", mutable("a=1"));
    ctx.set("text", "b=2");
    let out = render(
        r#"{% load request_utils %}{% update_query_dict qd text %}{% append_key text "c" "3" %}{{ qd.urlencode|safe }}"#,
        &mut ctx,
    );
    assert_eq!(out, "a=1");
    assert_eq!(ctx.get("text"), Some(&Value::from("b=2")));
}

#[test]
fn test_add_to_builtins() {
    let mut engine = Engine::new();
    engine.add_to_builtins(&request_tags::tags::library());
    let mut ctx = request_ctx("/foo/?a=1");
    let out = engine
        .render_string("{% current_location %}", &mut ctx)
        .unwrap();
    assert_eq!(out, "/foo/?a=1");
}
