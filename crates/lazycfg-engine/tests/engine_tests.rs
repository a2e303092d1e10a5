use std::fs;

use lazycfg_engine::{
    EngineError, EngineOptions, InstantiateError, Instance, Kwargs, LazyConfig, OverrideErrorKind, Overrides, Registry,
    Value,
};
use lazycfg_test_utils::{nested_x, sample_list, tree_with_opaque, Fixture, EXPECTED_SOURCE};
use lazycfg_tree::{BindError, Object};
use pretty_assertions::assert_eq;

const MODEL_CFG: &str = r#"import models

model = models.Classifier(
    backbone=models.ResNet(depth=50, norm="BN", pretrained=True),
    head=models.Head(in_features=2048, num_classes=1000, dropout=0.1),
)

train = dict(epochs=90, lr=0.1)
"#;

#[derive(Debug)]
struct ResNet {
    depth: i64,
    norm: String,
    pretrained: bool,
}

#[derive(Debug)]
struct Head {
    in_features: i64,
    num_classes: i64,
    dropout: f64,
}

#[derive(Debug)]
struct Classifier {
    backbone: Object,
    head: Object,
}

fn model_registry() -> Registry {
    let mut registry = Registry::with_builtins();
    registry
        .register_fn("models.ResNet", |mut args: Kwargs| {
            let resnet = ResNet {
                depth: args.require_as("depth")?,
                norm: args.optional_as("norm")?.unwrap_or_else(|| "BN".to_string()),
                pretrained: args.optional_as("pretrained")?.unwrap_or(false),
            };
            args.finish()?;
            Ok(Instance::object(resnet))
        })
        .register_fn("models.Head", |mut args: Kwargs| {
            let head = Head {
                in_features: args.require_as("in_features")?,
                num_classes: args.require_as("num_classes")?,
                dropout: args.optional_as("dropout")?.unwrap_or(0.0),
            };
            args.finish()?;
            Ok(Instance::object(head))
        })
        .register_fn("models.Classifier", |mut args: Kwargs| {
            let classifier = Classifier {
                backbone: args.require_as("backbone")?,
                head: args.require_as("head")?,
            };
            args.finish()?;
            Ok(Instance::object(classifier))
        });
    registry
}

#[test]
fn test_save_load() {
    let fixture = Fixture::new();
    let engine = LazyConfig::default();
    let tree = engine.load(fixture.root()).unwrap();

    let dest = fixture.path("out/config.yaml");
    fs::create_dir_all(dest.parent().unwrap()).unwrap();
    let report = engine.save(&tree, &dest).unwrap();
    assert_eq!(report.path, dest);
    assert_eq!(report.sidecar, None);

    let loaded = engine.load_saved(&dest).unwrap();
    assert_eq!(loaded, tree);
    assert_eq!(loaded.get("lazyobj.x"), Some(&Value::from("base_a_1")));
}

#[test]
fn test_failed_save() {
    let fixture = Fixture::empty();
    let engine = LazyConfig::default();
    let dest = fixture.path("config.yaml");
    let tree = tree_with_opaque();

    let report = engine.save(&tree, &dest).unwrap();
    assert!(dest.exists());
    assert!(fixture.path("config.yaml.sidecar").exists());
    assert!(report.has_fallbacks());
    assert_eq!(engine.load(&dest).unwrap(), tree);
}

#[test]
fn test_overrides() {
    let fixture = Fixture::new();
    let engine = LazyConfig::default();
    let mut tree = engine.load(fixture.root()).unwrap();

    LazyConfig::apply_overrides(&mut tree, &["lazyobj.x=123", "dir1b_dict.a=\"123\""]).unwrap();
    assert_eq!(tree.get("lazyobj.x"), Some(&Value::Int(123)));
    assert_eq!(tree.get("dir1b_dict.a"), Some(&Value::from("123")));
}

#[test]
fn test_invalid_overrides() {
    let fixture = Fixture::new();
    let engine = LazyConfig::default();
    let mut tree = engine.load(fixture.root()).unwrap();

    let err = LazyConfig::apply_overrides(&mut tree, &["lazyobj.x.xxx=123"]).unwrap_err();
    let EngineError::Override(err) = err else {
        panic!("expected an override error, got {err}");
    };
    assert!(matches!(err.kind, OverrideErrorKind::PathNotFound { ref segment, .. } if segment == "xxx"));
}

#[test]
fn test_to_source() {
    let fixture = Fixture::new();
    let engine = LazyConfig::default();
    let mut tree = engine.load(fixture.root()).unwrap();
    tree.set("lazyobj.x", nested_x()).unwrap();
    tree.insert("list", sample_list());

    assert_eq!(engine.to_source(&tree), EXPECTED_SOURCE);
}

#[test]
fn test_saved_form_survives_source_round_trip() {
    let fixture = Fixture::new();
    let engine = LazyConfig::default();
    let mut tree = engine.load(fixture.root()).unwrap();
    tree.set("lazyobj.x", nested_x()).unwrap();

    let emitted = fixture.write("emitted.py", &engine.to_source(&tree));
    let dest = fixture.path("emitted.yaml");
    engine.save(&engine.load(&emitted).unwrap(), &dest).unwrap();
    assert_eq!(engine.load(&dest).unwrap(), tree);
}

#[test]
fn test_instantiate_model() {
    let fixture = Fixture::empty();
    let path = fixture.write("model.py", MODEL_CFG);
    let engine = LazyConfig::new(EngineOptions::default()).with_registry(model_registry());

    let mut tree = engine.load(&path).unwrap();
    LazyConfig::apply_overrides(&mut tree, &["model.backbone.depth=101", "model.head.dropout=0"]).unwrap();

    let model = engine.instantiate(tree.get("model").unwrap()).unwrap();
    let classifier = model.downcast_ref::<Classifier>().unwrap();
    let backbone = classifier.backbone.downcast_ref::<ResNet>().unwrap();
    let head = classifier.head.downcast_ref::<Head>().unwrap();
    assert_eq!((backbone.depth, backbone.norm.as_str(), backbone.pretrained), (101, "BN", true));
    assert_eq!((head.in_features, head.num_classes), (2048, 1000));
    assert_eq!(head.dropout, 0.0);

    let train = engine.instantiate(tree.get("train").unwrap()).unwrap();
    assert_eq!(train.as_map().and_then(|m| m.get("epochs")).and_then(Instance::as_i64), Some(90));
}

#[test]
fn test_instantiate_with_caller_overrides() {
    let fixture = Fixture::empty();
    let path = fixture.write("model.py", MODEL_CFG);
    let engine = LazyConfig::default().with_registry(model_registry());
    let tree = engine.load(&path).unwrap();

    let head = tree.get("model.head").unwrap();
    let mut overrides = Overrides::new();
    overrides.insert("num_classes".to_string(), Instance::Int(10));
    let built = engine.instantiate_with(head, overrides).unwrap();
    assert_eq!(built.downcast_ref::<Head>().map(|h| h.num_classes), Some(10));

    let whole = engine.instantiate(&tree).unwrap();
    let map = whole.as_map().unwrap();
    assert!(map["model"].downcast_ref::<Classifier>().is_some());
}

#[test]
fn test_constructor_errors_pass_through() {
    let fixture = Fixture::new();
    let engine = LazyConfig::default();
    let tree = engine.load(fixture.root()).unwrap();

    let err = engine.instantiate(tree.get("lazyobj").unwrap()).unwrap_err();
    let EngineError::Instantiate(InstantiateError::ArgumentBinding { target, source }) = err else {
        panic!("expected a binding error, got {err}");
    };
    assert_eq!(target, "itertools.count");
    assert_eq!(
        source.downcast_ref::<BindError>(),
        Some(&BindError::Unexpected {
            target: "itertools.count".into(),
            names: vec!["x".into(), "y".into()],
        })
    );
}

#[test]
fn test_unregistered_target() {
    let fixture = Fixture::empty();
    let path = fixture.write("model.py", MODEL_CFG);
    let engine = LazyConfig::default();
    let tree = engine.load(&path).unwrap();

    let err = engine.instantiate(tree.get("model").unwrap()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Instantiate(InstantiateError::TargetResolution { ref name }) if name == "models.ResNet"
    ));
}
