use vellum::{safe_html, Record, Set, Value, VarMap};

fn prepare(path: &str, content: &str) -> Set {
    let set = Set::new();
    set.cache(path, content).expect("template should parse");
    set
}

fn run_with_set(set: &Set, path: &str, vars: &VarMap, context: Value, expected: &str) {
    let tmpl = set.get_template(path).expect("template should resolve");
    let mut buf = Vec::new();
    tmpl.execute(&mut buf, vars, context)
        .unwrap_or_else(|err| panic!("error executing {}: {}", path, err));
    let output = String::from_utf8(buf).expect("output should be utf-8");
    assert_eq!(output, expected, "in {}", path);
}

fn run(path: &str, content: &str, vars: &VarMap, context: Value, expected: &str) {
    let set = prepare(path, content);
    run_with_set(&set, path, vars, context, expected);
}

fn run_err(path: &str, content: &str, context: Value) -> vellum::Error {
    let set = prepare(path, content);
    let tmpl = set.get_template(path).expect("template should resolve");
    let mut buf = Vec::new();
    tmpl.execute(&mut buf, &VarMap::new(), context)
        .expect_err("execution should fail")
}

fn no_vars() -> VarMap {
    VarMap::new()
}

// ═══════════════════════════════════════════════════════════════════════
// String helpers
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn case_and_trim() {
    run("/lower", r#"{{lower("AbC")}}"#, &no_vars(), Value::Nil, "abc");
    run("/upper", r#"{{upper("AbC")}}"#, &no_vars(), Value::Nil, "ABC");
    run("/trim", r#"{{trimSpace("  x  ")}}"#, &no_vars(), Value::Nil, "x");
}

#[test]
fn prefix_and_suffix() {
    run("/prefix", r#"{{hasPrefix("abc", "ab")}}"#, &no_vars(), Value::Nil, "true");
    run("/prefix/no", r#"{{hasPrefix("abc", "b")}}"#, &no_vars(), Value::Nil, "false");
    run("/suffix", r#"{{hasSuffix("abc", "bc")}}"#, &no_vars(), Value::Nil, "true");
}

#[test]
fn repeat_and_replace() {
    run("/repeat", r#"{{repeat("ab", 3)}}"#, &no_vars(), Value::Nil, "ababab");
    run(
        "/replace",
        r#"{{replace("My Name Is", " ", "_", -1)}}"#,
        &no_vars(),
        Value::Nil,
        "My_Name_Is",
    );
    run(
        "/replace/count",
        r#"{{replace("a a a", "a", "b", 2)}}"#,
        &no_vars(),
        Value::Nil,
        "b b a",
    );
    run(
        "/replace/multiline",
        "{{replace(\"My Name Is II\",\n\t\" \",\n\t\"_\",\n\t-1,\n)}}",
        &no_vars(),
        Value::Nil,
        "My_Name_Is_II",
    );
}

#[test]
fn split_builds_sequences() {
    run("/split/len", r#"{{len(split("a,b,c", ","))}}"#, &no_vars(), Value::Nil, "3");
    run(
        "/split/range",
        r#"{{range p := split("a,b", ",")}}{{p}};{{end}}"#,
        &no_vars(),
        Value::Nil,
        "a;b;",
    );
}

#[test]
fn repeat_rejects_negative_counts() {
    let err = run_err("/repeat/neg", r#"{{repeat("x", -1)}}"#, Value::Nil);
    assert!(err.to_string().contains("negative repeat count"), "got: {}", err);
}

// ═══════════════════════════════════════════════════════════════════════
// map / len
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn map_builds_mappings() {
    run(
        "/map",
        r#"{{ m := map("a", 1, "b", 2) }}{{m["a"]}}{{m["b"]}}"#,
        &no_vars(),
        Value::Nil,
        "12",
    );
    run("/map/len", r#"{{len(map("a", 1))}}"#, &no_vars(), Value::Nil, "1");
}

#[test]
fn map_rejects_odd_argument_counts() {
    let err = run_err("/map/odd", r#"{{map("a", 1, "b")}}"#, Value::Nil);
    assert!(
        err.to_string().contains("even number of arguments"),
        "got: {}",
        err
    );
}

#[test]
fn len_by_kind() {
    run("/len/string", r#"{{len("111")}}"#, &no_vars(), Value::Nil, "3");
    run(
        "/len/seq",
        "{{len(.)}}",
        &no_vars(),
        Value::sequence(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        "3",
    );
    run(
        "/len/record",
        "{{len(.)}}",
        &no_vars(),
        Value::record(Record::new("User").with_field("Name", "x").with_field("Email", "y")),
        "2",
    );
}

#[test]
fn len_of_scalars_fails() {
    let err = run_err("/len/int", "{{len(1)}}", Value::Nil);
    assert!(err.to_string().contains("len builtin"), "got: {}", err);
}

// ═══════════════════════════════════════════════════════════════════════
// Escaping
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn safe_html_escapes_through_the_pipeline() {
    run(
        "/safe_html",
        r#"<h1>{{"<h1>Hello Buddy!</h1>" |safeHtml}}</h1>"#,
        &no_vars(),
        Value::Nil,
        "<h1>&lt;h1&gt;Hello Buddy!&lt;/h1&gt;</h1>",
    );
    run(
        "/safe_html/command",
        r#"<h1>{{safeHtml: "<h1>Hello Buddy!</h1>"}}</h1>"#,
        &no_vars(),
        Value::Nil,
        "<h1>&lt;h1&gt;Hello Buddy!&lt;/h1&gt;</h1>",
    );
}

#[test]
fn simple_escape_scenario() {
    run(
        "/escape/min",
        r#"<h1>{{"<x>" | safeHtml}}</h1>"#,
        &no_vars(),
        Value::Nil,
        "<h1>&lt;x&gt;</h1>",
    );
}

#[test]
fn html_and_url_return_strings() {
    run(
        "/html",
        r#"<h1>{{html: "<h1>Hello Buddy!</h1>"}}</h1>"#,
        &no_vars(),
        Value::Nil,
        "<h1>&lt;h1&gt;Hello Buddy!&lt;/h1&gt;</h1>",
    );
    run(
        "/url",
        r#"<h1>{{url: "<h1>Hello Buddy!</h1>"}}</h1>"#,
        &no_vars(),
        Value::Nil,
        "<h1>%3Ch1%3EHello+Buddy%21%3C%2Fh1%3E</h1>",
    );
}

#[test]
fn commands_after_a_writer_command_fail() {
    let err = run_err("/safe/trailing", r#"{{ "a" | safeHtml | upper }}"#, Value::Nil);
    assert!(
        err.to_string().contains("writer command"),
        "got: {}",
        err
    );
}

#[test]
fn autoescape_set_escapes_by_default() {
    let set = Set::builder().escape(safe_html).build();
    set.cache("/autoescape/1", r#"<h1>{{"<h1>Hello Buddy!</h1>" }}</h1>"#)
        .unwrap();
    run_with_set(
        &set,
        "/autoescape/1",
        &no_vars(),
        Value::Nil,
        "<h1>&lt;h1&gt;Hello Buddy!&lt;/h1&gt;</h1>",
    );

    set.cache("/autoescape/2", r#"<h1>{{"<h1>Hello Buddy!</h1>" |unsafe }}</h1>"#)
        .unwrap();
    run_with_set(
        &set,
        "/autoescape/2",
        &no_vars(),
        Value::Nil,
        "<h1><h1>Hello Buddy!</h1></h1>",
    );
}

// ═══════════════════════════════════════════════════════════════════════
// JSON
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn write_json_renders_into_the_writer() {
    let u = Value::record(
        Record::new("User")
            .with_field("Name", "Mario Santos")
            .with_field("Email", "mario@gmail.com"),
    );
    run(
        "/write_json",
        "{{. |writeJson}}",
        &no_vars(),
        u,
        "{\"Name\":\"Mario Santos\",\"Email\":\"mario@gmail.com\"}\n",
    );
}

#[test]
fn json_returns_encoded_text() {
    run(
        "/json",
        "{{json: .}}",
        &no_vars(),
        Value::sequence(vec![Value::Int(1), Value::Bool(true)]),
        "[1,true]",
    );
}

// ═══════════════════════════════════════════════════════════════════════
// includeIfExists / exec
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn include_if_exists_renders_present_templates() {
    let set = prepare("/existent", "Hi, i exist!!");
    set.cache("/page", r#"{{includeIfExists("/existent")}}"#).unwrap();
    run_with_set(&set, "/page", &no_vars(), Value::Nil, "Hi, i exist!!");
}

#[test]
fn include_if_exists_suppresses_missing_templates() {
    let set = prepare("/page", r#"{{includeIfExists("/notExistent")}}"#);
    run_with_set(&set, "/page", &no_vars(), Value::Nil, "");
}

#[test]
fn include_if_exists_marker_is_truthy_only_on_success() {
    let set = prepare("/existent", "E");
    set.cache(
        "/cond",
        r#"{{if includeIfExists("/existent")}} was included{{end}}{{if includeIfExists("/nope")}} was not{{end}}"#,
    )
    .unwrap();
    run_with_set(&set, "/cond", &no_vars(), Value::Nil, "E was included");
}

#[test]
fn include_if_exists_passes_context() {
    let set = prepare("/greeting", "Hi, {{.}}!");
    set.cache(
        "/wcontext",
        "{{includeIfExists(\"/greeting\", \"Buddy\")}}\n{{includeIfExists(\"/greeting\", .)}}",
    )
    .unwrap();
    run_with_set(
        &set,
        "/wcontext",
        &no_vars(),
        Value::string("World"),
        "Hi, Buddy!\nHi, World!",
    );
}

#[test]
fn include_if_exists_bubbles_runtime_errors() {
    let set = prepare("/broken", "{{ 1/0 }}");
    set.cache("/includeBroken", r#"{{includeIfExists("/broken")}}"#).unwrap();
    let tmpl = set.get_template("/includeBroken").unwrap();
    let mut buf = Vec::new();
    let err = tmpl.execute(&mut buf, &VarMap::new(), Value::Nil);
    assert!(err.is_err(), "broken includes must not fail silently");
}

#[test]
fn exec_discards_output_and_returns_the_value() {
    let set = prepare("/noisy", "LOUD{{return 42}}");
    set.cache("/page", r#"{{ exec("/noisy") }}"#).unwrap();
    run_with_set(&set, "/page", &no_vars(), Value::Nil, "42");
}

#[test]
fn exec_of_missing_template_fails() {
    let set = prepare("/page", r#"{{ exec("/nope") }}"#);
    let tmpl = set.get_template("/page").unwrap();
    let mut buf = Vec::new();
    let err = tmpl
        .execute(&mut buf, &VarMap::new(), Value::Nil)
        .expect_err("exec of a missing template should fail");
    assert!(matches!(err, vellum::Error::TemplateNotFound { .. }), "got: {}", err);
}
