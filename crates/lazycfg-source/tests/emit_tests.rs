use lazycfg_source::{load, parse_literal, render_flat, to_source};
use lazycfg_test_utils::{model_tree, nested_x, sample_list, Fixture, EXPECTED_SOURCE};
use lazycfg_tree::{CallNode, ConfigMap, ConfigTree, Value};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn test_to_source_fixture() {
    let fixture = Fixture::new();
    let mut tree = load(fixture.root()).unwrap();
    tree.set("lazyobj.x", nested_x()).unwrap();
    tree.insert("list", sample_list());

    assert_eq!(to_source(&tree), EXPECTED_SOURCE);
}

fn reload(tree: &ConfigTree) -> ConfigTree {
    let fixture = Fixture::empty();
    let path = fixture.write("emitted.py", &to_source(tree));
    load(path).unwrap()
}

#[test]
fn test_source_round_trip() {
    let fixture = Fixture::new();
    let mut tree = load(fixture.root()).unwrap();
    tree.set("lazyobj.x", nested_x()).unwrap();
    tree.insert("list", sample_list());
    assert_eq!(reload(&tree), tree);

    let model = model_tree();
    assert_eq!(reload(&model), model);
}

#[test]
fn test_round_trip_awkward_keys_and_targets() {
    let mut odd = ConfigMap::new();
    odd.insert("with space".to_string(), Value::Int(1));
    odd.insert("class".to_string(), Value::from("kw"));
    odd.insert("_private".to_string(), Value::Float(f64::INFINITY));

    let call = CallNode::new("Undotted")
        .with_arg("normal", 1)
        .with_arg("not valid", Value::List(Vec::new()))
        .with_arg("nested", CallNode::new("builtins.dict").with_arg("k", Value::Null));

    let mut tree = ConfigTree::new();
    tree.insert("odd", Value::Map(odd));
    tree.insert("empty", Value::Map(ConfigMap::new()));
    tree.insert("_hidden", Value::Int(5));
    tree.insert("text", "quote \" backslash \\ newline \n tab \t");
    tree.insert("call", call);

    assert_eq!(reload(&tree), tree);
}

#[test]
fn test_round_trip_keys_shadowing_emitted_names() {
    let mut tree = ConfigTree::new();
    tree.insert("itertools", Value::List(vec![Value::Int(1)]));
    tree.insert("lazyobj", CallNode::new("itertools.count").with_arg("x", 1));
    let text = to_source(&tree);
    assert_eq!(
        text,
        "cfg.itertools = [1]\ncfg.lazyobj = LazyCall(\"itertools.count\")(x=1)\n"
    );
    assert_eq!(reload(&tree), tree);

    let mut tree = ConfigTree::new();
    tree.insert("cfg", Value::Int(1));
    tree.insert("seed", Value::Int(2));
    tree.insert("float", Value::Float(f64::INFINITY));
    tree.insert("LazyCall", Value::from("helper"));
    tree.insert("L", Value::Float(f64::NEG_INFINITY));
    tree.insert("model", CallNode::new("Model").with_arg("depth", 50));
    let text = to_source(&tree);
    assert!(text.starts_with("from lazycfg import LazyCall as _lazy_call\n"));
    assert!(text.contains("cfg.model = _lazy_call(\"Model\")(depth=50)\n"));
    assert!(text.contains("cfg.float = 1e999\n"));
    assert_eq!(reload(&tree), tree);
}

#[test]
fn test_round_trip_most_negative_integer() {
    let mut tree = ConfigTree::new();
    tree.insert("x", Value::Int(i64::MIN));
    tree.insert("xs", Value::List(vec![Value::Int(i64::MIN), Value::Int(i64::MAX)]));
    assert_eq!(to_source(&tree), "cfg.x = -9223372036854775808\ncfg.xs = [-9223372036854775808, 9223372036854775807]\n");
    assert_eq!(reload(&tree), tree);
    assert_eq!(parse_literal("-9223372036854775808"), Some(Value::Int(i64::MIN)));
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::Float),
        "[ -~\\n\\t]{0,16}".prop_map(Value::Str),
    ]
}

fn literal_value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            proptest::collection::vec(("[a-z_ ]{0,6}", inner), 0..4).prop_map(|pairs| {
                Value::Map(pairs.into_iter().collect::<ConfigMap>())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn prop_rendered_literals_parse_back(value in literal_value()) {
        let text = render_flat(&value);
        prop_assert_eq!(parse_literal(&text), Some(value), "rendered as {}", text);
    }
}
