//! End-to-end instantiation scenarios against small schemas.

use serde_json::json;
use textmodel_core::{
    ExactDecimal, InstantiateOptions, Instantiation, Instantiator, Model, Schema, Value,
};

fn test_schema() -> Schema {
    Schema::from_value(json!({
        "enable_generics": true,
        "enums": [{ "name": "SomeEnum", "literals": ["A", "B", "non-word*chars", "true"] }],
        "classes": [
            { "name": "TestNode", "features": [
                { "name": "text", "kind": "string" },
                { "name": "integer", "kind": "integer" },
                { "name": "float", "kind": "float" },
                { "name": "boolean", "kind": "boolean" },
                { "name": "enum", "kind": "enum", "target": "SomeEnum" },
                { "name": "nums", "kind": "integer", "many": true },
                { "name": "related", "kind": "reference", "target": "TestNode" },
                { "name": "others", "kind": "reference", "target": "TestNode", "many": true },
                { "name": "childs", "kind": "containment", "target": "TestNode", "many": true }
            ] },
            { "name": "SubNode", "supertypes": ["TestNode"], "root": false },
            { "name": "Holder", "features": [
                { "name": "one", "kind": "containment", "target": "TestNode" },
                { "name": "two", "kind": "containment", "target": "TestNode" }
            ] }
        ]
    }))
    .unwrap()
}

fn instantiate(schema: &Schema, text: &str) -> (Model, Instantiation) {
    let mut model = Model::new();
    let out = Instantiator::new(schema).instantiate(text, &mut model, InstantiateOptions::default());
    (model, out)
}

#[test]
fn malformed_token_yields_one_problem_and_a_full_element() {
    let schema = test_schema();
    let (model, out) = instantiate(&schema, "TestNode text: \"bla\", * nums: 1\n");

    assert_eq!(out.problems.len(), 1);
    assert_eq!(out.problems[0].message, "Parse error on token '*'");
    assert_eq!(out.problems[0].line, 1);

    let node = out.roots[0];
    assert_eq!(model.values_named(&schema, node, "text"), &[Value::String("bla".into())]);
    assert_eq!(model.values_named(&schema, node, "nums"), &[Value::Integer(1)]);
}

#[test]
fn nested_children_and_references() {
    let schema = test_schema();
    let text = "\
TestNode text: root {
  TestNode text: a, related: /x/y
  SubNode others: [/p, /q/r] {
    TestNode
  }
}
";
    let (model, out) = instantiate(&schema, text);
    assert!(out.problems.is_empty(), "{:?}", out.problems);
    assert_eq!(out.roots.len(), 1);
    assert_eq!(out.elements.len(), 4);

    let root = out.roots[0];
    let childs = schema
        .feature_by_name(schema.class_by_name("TestNode").unwrap(), "childs")
        .unwrap();
    let kids: Vec<_> = model.children(root, childs).collect();
    assert_eq!(kids.len(), 2);
    assert_eq!(model.class_of(kids[1]), schema.class_by_name("SubNode").unwrap());
    assert_eq!(model.parent(kids[0]), Some(root));

    let targets: Vec<_> = out.unresolved.iter().map(|u| u.target.as_str()).collect();
    assert_eq!(targets, vec!["/x/y", "/p", "/q/r"]);
    assert_eq!(out.unresolved[1].feature, "others");
}

#[test]
fn second_child_in_single_role_is_rejected() {
    let schema = test_schema();
    let text = "\
Holder {
  one:
    TestNode text: first
  one:
    TestNode text: second
}
";
    let (model, out) = instantiate(&schema, text);
    assert_eq!(out.problems.len(), 1);
    assert_eq!(out.problems[0].message, "Only one child allowed in role 'one'");
    assert_eq!(out.problems[0].line, 5);

    let holder = out.roots[0];
    let kept = model.values_named(&schema, holder, "one");
    assert_eq!(kept.len(), 1);
    let child = kept[0].as_element().unwrap();
    assert_eq!(model.values_named(&schema, child, "text"), &[Value::String("first".into())]);
}

#[test]
fn ambiguous_child_needs_role_label() {
    let schema = test_schema();
    let (_, out) = instantiate(&schema, "Holder {\n  TestNode\n}\n");
    assert_eq!(out.problems.len(), 1);
    assert_eq!(out.problems[0].message, "Role of element is ambiguous, use a role label");
    assert_eq!(out.problems[0].line, 2);
}

#[test]
fn unknown_roles_are_reported() {
    let schema = test_schema();
    let (_, out) = instantiate(&schema, "Holder {\n  three:\n    TestNode\n  one: [\n  ]\n}\n");
    assert_eq!(out.problems.len(), 1);
    assert_eq!(out.problems[0].message, "Unknown child role 'three'");
}

#[test]
fn command_resolution_is_context_scoped() {
    let schema = Schema::from_value(json!({
        "classes": [
            { "name": "A::Command", "features": [
                { "name": "sub", "kind": "containment", "target": "B::Command", "many": true }
            ] },
            { "name": "B::Command", "root": false, "features": [
                { "name": "level", "kind": "integer" }
            ] }
        ]
    }))
    .unwrap();
    let (model, out) = instantiate(&schema, "Command {\n  Command level: 2\n}\n");
    assert!(out.problems.is_empty(), "{:?}", out.problems);

    let outer = out.roots[0];
    let inner = model.first_child(&schema, outer).unwrap();
    assert_eq!(schema.class(model.class_of(outer)).name, "A::Command");
    assert_eq!(schema.class(model.class_of(inner)).name, "B::Command");
    assert_eq!(model.values_named(&schema, inner, "level"), &[Value::Integer(2)]);
}

#[test]
fn enum_literals_are_case_sensitive() {
    let schema = test_schema();
    let (model, out) = instantiate(
        &schema,
        "TestNode enum: A\nTestNode enum: a\nTestNode enum: \"non-word*chars\"\n",
    );
    assert_eq!(out.problems.len(), 1);
    assert_eq!(out.problems[0].line, 2);
    assert_eq!(
        model.values_named(&schema, out.roots[2], "enum"),
        &[Value::Enum("non-word*chars".into())]
    );
}

#[test]
fn long_floats_stay_exact() {
    let schema = test_schema();
    let (model, out) = instantiate(&schema, "TestNode float: 1234567890.123456789\n");
    assert!(out.problems.is_empty());
    match &model.values_named(&schema, out.roots[0], "float")[0] {
        Value::Decimal(d) => assert_eq!(d.to_string(), "1234567890.123456789"),
        other => panic!("expected decimal, got {:?}", other),
    }

    let (model, out) = instantiate(&schema, "TestNode float: 123456789012345678901234567890.5\n");
    assert!(out.problems.is_empty());
    assert_eq!(
        model.values_named(&schema, out.roots[0], "float"),
        &[Value::Decimal(ExactDecimal::Literal("123456789012345678901234567890.5".into()))]
    );
}

#[test]
fn progress_callback_counts_commands() {
    let schema = test_schema();
    let mut count = 0;
    let mut tick = || count += 1;
    let mut model = Model::new();
    Instantiator::new(&schema).instantiate(
        "TestNode {\n  TestNode\n}\nTestNode\n",
        &mut model,
        InstantiateOptions {
            on_progress: Some(&mut tick),
            ..Default::default()
        },
    );
    assert_eq!(count, 3);
}

#[test]
fn abstract_classes_cannot_be_instantiated() {
    let schema = Schema::from_value(json!({
        "classes": [
            { "name": "Shape", "abstract": true },
            { "name": "Circle", "root": false, "supertypes": ["Shape"] },
            { "name": "Canvas", "features": [
                { "name": "shapes", "kind": "containment", "target": "Shape", "many": true }
            ] }
        ]
    }))
    .unwrap();
    let (model, out) = instantiate(&schema, "Shape\nCanvas {\n  Shape\n  Circle\n}\n");

    let problems: Vec<_> = out.problems.iter().map(|p| (p.line, p.message.as_str())).collect();
    assert_eq!(
        problems,
        vec![
            (1, "Command 'Shape' names abstract class 'Shape'"),
            (3, "Command 'Shape' names abstract class 'Shape'"),
        ]
    );
    assert_eq!(out.roots.len(), 1);
    assert_eq!(model.values_named(&schema, out.roots[0], "shapes").len(), 1);
}

#[test]
fn known_command_outside_its_context() {
    let schema = test_schema();
    let (_, out) = instantiate(&schema, "Holder {\n  one:\n    Holder\n}\nSubNode\n");
    let problems: Vec<_> = out.problems.iter().map(|p| (p.line, p.message.as_str())).collect();
    assert_eq!(
        problems,
        vec![
            (3, "Command 'Holder' cannot be used in this context"),
            (5, "Command 'SubNode' cannot be used on root level"),
        ]
    );
}
