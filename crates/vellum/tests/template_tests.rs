use vellum::{Record, Set, Value, VarMap};

fn user(name: &str, email: &str) -> Value {
    Value::record(
        Record::new("User")
            .with_field("Name", name)
            .with_field("Email", email),
    )
}

fn prepare(path: &str, content: &str) -> Set {
    let set = Set::new();
    set.cache(path, content).expect("template should parse");
    set
}

fn must_cache(set: &Set, path: &str, content: &str) {
    set.cache(path, content)
        .unwrap_or_else(|err| panic!("could not cache {}: {}", path, err));
}

fn run_with_set(set: &Set, path: &str, vars: &VarMap, context: Value, expected: &str) {
    let tmpl = set.get_template(path).expect("template should resolve");
    let mut buf = Vec::new();
    tmpl.execute(&mut buf, vars, context)
        .unwrap_or_else(|err| panic!("error executing {}: {}", path, err));
    let output = String::from_utf8(buf).expect("output should be utf-8");
    assert_eq!(output, expected, "in {}", path);
}

// ═══════════════════════════════════════════════════════════════════════
// Blocks and Yields
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn block_executes_in_place_with_its_context() {
    let set = prepare("/block", r#"{{block hello() "Buddy" }}Hello {{ . }}{{end}}"#);
    run_with_set(&set, "/block", &VarMap::new(), Value::Nil, "Hello Buddy");
}

#[test]
fn yield_invokes_with_caller_context() {
    let vars = VarMap::new().with("user", user("José Santos", "email@example.com"));
    let set = prepare(
        "/block_yield",
        r#"{{block hello() "Buddy" }}Hello {{ . }}{{end}}, {{yield hello() user.Name}}"#,
    );
    run_with_set(
        &set,
        "/block_yield",
        &vars,
        Value::Nil,
        "Hello Buddy, Hello José Santos",
    );
}

#[test]
fn extends_overrides_blocks() {
    let vars = VarMap::new().with("user", user("José Santos", "email@example.com"));
    let set = prepare(
        "/block_yield",
        r#"{{block hello() "Buddy" }}Hello {{ . }}{{end}}, {{yield hello() user.Name}}"#,
    );
    must_cache(
        &set,
        "/extend/override",
        r#"{{extends "/block_yield"}}{{block hello() "Buddy" }}Hey {{ . }}{{end}}"#,
    );
    run_with_set(
        &set,
        "/extend/override",
        &vars,
        Value::Nil,
        "Hey Buddy, Hey José Santos",
    );
}

#[test]
fn extends_chain_uses_nearest_override() {
    let set = prepare("/a", "[{{block x()}}A{{end}}]");
    must_cache(&set, "/b", r#"{{extends "/a"}}"#);
    must_cache(&set, "/c", r#"{{extends "/b"}}{{block x()}}C{{end}}"#);
    run_with_set(&set, "/c", &VarMap::new(), Value::Nil, "[C]");
    // the middle template inherits the ancestor's definition untouched
    run_with_set(&set, "/b", &VarMap::new(), Value::Nil, "[A]");
}

#[test]
fn child_blocks_fill_parent_yields() {
    let set = prepare("/p", r#"{{yield h() "Y"}}"#);
    must_cache(&set, "/child", r#"{{extends "/p"}}{{block h() "B"}}Hi {{.}}{{end}}"#);
    run_with_set(&set, "/child", &VarMap::new(), Value::Nil, "Hi Y");
}

#[test]
fn import_adds_blocks_without_changing_root() {
    let set = prepare("/block", r#"{{block hello() "Buddy" }}Hello {{ . }}{{end}}"#);
    must_cache(&set, "/import", r#"{{import "/block"}}{{yield hello() "Buddy"}}"#);
    run_with_set(&set, "/import", &VarMap::new(), Value::Nil, "Hello Buddy");
}

#[test]
fn imported_blocks_reach_included_templates() {
    let set = prepare("/block", r#"{{block hello() "Buddy" }}Hello {{ . }}{{end}}"#);
    must_cache(&set, "/yield", r#"{{yield hello() "Buddy"}}"#);
    must_cache(&set, "/outer", r#"{{import "/block"}}{{include "/yield"}}"#);
    run_with_set(&set, "/outer", &VarMap::new(), Value::Nil, "Hello Buddy");
}

#[test]
fn yield_content_with_parameters() {
    let set = prepare(
        "/yield_content",
        "{{ block foo(bar=2) }}bar: {{ bar }} content: {{ yield content }}{{ end }}, \
         {{ block header() }}{{ yield foo(bar=4) content }}some content{{ end }}{{ end }}",
    );
    run_with_set(
        &set,
        "/yield_content",
        &VarMap::new(),
        Value::Nil,
        "bar: 2 content: , bar: 4 content: some content",
    );
}

#[test]
fn yield_args_bind_positionally() {
    let set = prepare(
        "/positional",
        "{{block pair(a, b)}}{{a}}-{{b}}{{end}}{{yield pair(1, 2)}}",
    );
    // the definition runs first with defaultless params bound to false
    run_with_set(&set, "/positional", &VarMap::new(), Value::Nil, "false-false1-2");
}

#[test]
fn content_expression_sets_the_continuation_context() {
    let set = prepare(
        "/content_ctx",
        r#"{{block wrap()}}[{{yield content .}}]{{end}}{{yield wrap() "X" content}}{{.}}{{end}}"#,
    );
    // the block body runs once for the definition (no caller content),
    // then for the yield with the caller body spliced in
    run_with_set(&set, "/content_ctx", &VarMap::new(), Value::Nil, "[][X]");
}

#[test]
fn nested_content_continuations() {
    let set = prepare(
        "/nested_content",
        "{{block inner()}}<i>{{yield content}}</i>{{end}}\
         {{block outer()}}<o>{{yield inner() content}}{{yield content}}{{end}}</o>{{end}}\
         {{yield outer() content}}X{{end}}",
    );
    // definitions run bare first, then the composed yield
    run_with_set(
        &set,
        "/nested_content",
        &VarMap::new(),
        Value::Nil,
        "<i></i><o><i></i></o><o><i>X</i></o>",
    );
}

#[test]
fn block_default_content_part() {
    let set = prepare(
        "/default_content",
        "{{block note()}}[{{yield content}}]{{content}}fallback{{end}}",
    );
    // the definition's own content part feeds its `yield content`
    run_with_set(&set, "/default_content", &VarMap::new(), Value::Nil, "[fallback]");
}

#[test]
fn unresolved_block_fails() {
    let set = prepare("/missing_block", "{{yield nothere()}}");
    let tmpl = set.get_template("/missing_block").unwrap();
    let mut buf = Vec::new();
    let err = tmpl
        .execute(&mut buf, &VarMap::new(), Value::Nil)
        .expect_err("unresolved block should fail");
    assert!(err.to_string().contains("unresolved block"), "got: {}", err);
}

// ═══════════════════════════════════════════════════════════════════════
// Include
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn include_with_explicit_context() {
    let set = prepare("/greet", "Hi, {{.}}!");
    must_cache(&set, "/page", r#"{{include "/greet" "World"}}"#);
    run_with_set(&set, "/page", &VarMap::new(), Value::Nil, "Hi, World!");
}

#[test]
fn include_inherits_context_and_scope() {
    let set = prepare("/inner", "{{.}} and {{shared}}");
    must_cache(&set, "/outer", r#"{{ shared := "var" }}{{include "/inner"}}"#);
    run_with_set(&set, "/outer", &VarMap::new(), Value::string("ctx"), "ctx and var");
}

#[test]
fn include_resolves_relative_paths() {
    let set = Set::new();
    must_cache(&set, "/sub/inner", "IN");
    must_cache(&set, "/sub/outer", r#"{{include "inner"}}"#);
    run_with_set(&set, "/sub/outer", &VarMap::new(), Value::Nil, "IN");
}

#[test]
fn include_propagates_return_values() {
    let set = prepare("/returns", r#"{{return "R"}}ignored"#);
    must_cache(&set, "/caller", r#"A{{include "/returns"}}B"#);
    // the include's return value short-circuits the calling list
    run_with_set(&set, "/caller", &VarMap::new(), Value::Nil, "A");
}

#[test]
fn include_of_missing_template_fails() {
    let set = prepare("/page", r#"{{include "/nope"}}"#);
    let tmpl = set.get_template("/page").unwrap();
    let mut buf = Vec::new();
    let err = tmpl
        .execute(&mut buf, &VarMap::new(), Value::Nil)
        .expect_err("missing include should fail");
    assert!(matches!(err, vellum::Error::TemplateNotFound { .. }), "got: {}", err);
}

// ═══════════════════════════════════════════════════════════════════════
// Globals
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn globals_resolve_after_scope() {
    let set = prepare("/globals", "{{greeting}}, {{who}}");
    set.add_global("greeting", "Hello");
    set.add_global("who", "World");
    run_with_set(&set, "/globals", &VarMap::new(), Value::Nil, "Hello, World");
}

#[test]
fn scope_variables_shadow_globals() {
    let set = prepare("/shadow", "{{name}}");
    set.add_global("name", "global");
    run_with_set(
        &set,
        "/shadow",
        &VarMap::new().with("name", "local"),
        Value::Nil,
        "local",
    );
}

#[test]
fn global_fast_functions() {
    let set = prepare("/func", r#"{{greet("Bob")}}"#);
    set.add_global_func("greet", |a| {
        a.require_num_of_arguments("greet", 1, 1)?;
        let name = a.get(0)?;
        Ok(Value::string(format!("hello {}", name)))
    });
    run_with_set(&set, "/func", &VarMap::new(), Value::Nil, "hello Bob");
}

#[test]
fn varmap_fast_functions() {
    let vars = VarMap::new().with_func("twice", |a| {
        a.require_num_of_arguments("twice", 1, 1)?;
        let v = a.get(0)?;
        Ok(Value::string(format!("{}{}", v, v)))
    });
    let set = prepare("/varfunc", r#"{{twice("ab")}}"#);
    run_with_set(&set, "/varfunc", &vars, Value::Nil, "abab");
}

// ═══════════════════════════════════════════════════════════════════════
// Writer behavior
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn partial_output_remains_on_error() {
    let set = prepare("/partial", "written{{ 1/0 }}never");
    let tmpl = set.get_template("/partial").unwrap();
    let mut buf = Vec::new();
    let err = tmpl.execute(&mut buf, &VarMap::new(), Value::Nil);
    assert!(err.is_err());
    assert_eq!(String::from_utf8(buf).unwrap(), "written");
}

#[test]
fn templates_load_from_a_root_directory() {
    let dir = std::env::temp_dir().join(format!("vellum-resolve-{}", std::process::id()));
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    std::fs::write(dir.join("simple.jet"), "simple {{ 1+1 }}").unwrap();
    std::fs::write(dir.join("sub").join("page.jet.html"), r#"{{include "../simple"}}!"#)
        .unwrap();

    let set = Set::html(dir.clone());
    run_with_set(&set, "/simple", &VarMap::new(), Value::Nil, "simple 2");
    run_with_set(&set, "/sub/page", &VarMap::new(), Value::Nil, "simple 2!");
    assert!(matches!(
        set.get_template("/sub/missing"),
        Err(vellum::Error::TemplateNotFound { .. })
    ));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn shared_set_renders_from_multiple_runtimes() {
    let set = prepare("/par", "{{ n }}");
    let threads: Vec<_> = (0..4)
        .map(|i| {
            let set = set.clone();
            std::thread::spawn(move || {
                let tmpl = set.get_template("/par").unwrap();
                let mut buf = Vec::new();
                tmpl.execute(&mut buf, &VarMap::new().with("n", i as i64), Value::Nil)
                    .unwrap();
                String::from_utf8(buf).unwrap()
            })
        })
        .collect();
    let mut outputs: Vec<String> = threads.into_iter().map(|t| t.join().unwrap()).collect();
    outputs.sort();
    assert_eq!(outputs, vec!["0", "1", "2", "3"]);
}
