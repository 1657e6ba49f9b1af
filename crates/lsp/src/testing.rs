//! Shared schema for unit tests.

use serde_json::json;
use textmodel_core::Schema;

pub(crate) fn test_schema() -> Schema {
    Schema::from_value(json!({
        "enums": [{ "name": "SomeEnum", "literals": ["A", "B", "non-word*chars", "true"] }],
        "classes": [
            { "name": "TestNode", "features": [
                { "name": "text", "kind": "string" },
                { "name": "unquoted", "kind": "string", "unquoted": true },
                { "name": "integer", "kind": "integer" },
                { "name": "sized", "kind": "integer", "default": 7 },
                { "name": "float", "kind": "float" },
                { "name": "boolean", "kind": "boolean" },
                { "name": "enum", "kind": "enum", "target": "SomeEnum" },
                { "name": "nums", "kind": "integer", "many": true },
                { "name": "related", "kind": "reference", "target": "TestNode" },
                { "name": "others", "kind": "reference", "target": "TestNode", "many": true },
                { "name": "childs", "kind": "containment", "target": "TestNode", "many": true }
            ] },
            { "name": "SubNode", "supertypes": ["TestNode"], "root": false },
            { "name": "Named", "unlabeled": ["name", "kind"], "backward_reference": "name",
              "features": [
                { "name": "name", "kind": "string" },
                { "name": "kind", "kind": "enum", "target": "SomeEnum", "many": true },
                { "name": "text", "kind": "string" },
                { "name": "target", "kind": "reference", "target": "Named" }
            ] },
            { "name": "Holder", "features": [
                { "name": "one", "kind": "containment", "target": "TestNode" },
                { "name": "two", "kind": "containment", "target": "TestNode" },
                { "name": "named", "kind": "containment", "target": "Named", "many": true }
            ] }
        ]
    }))
    .unwrap()
}
