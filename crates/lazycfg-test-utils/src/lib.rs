//! Testing utilities for the lazycfg workspace
//!
//! Shared fixtures: the three-file config tree used across crates and a few
//! in-memory trees.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use lazycfg_tree::{CallNode, ConfigMap, ConfigTree, Opaque, Value};
use tempfile::TempDir;

/// Entry config of the fixture, at `root.py`
pub const ROOT_CFG: &str = r#"from itertools import count

from libai.config import LazyCall

from .dir1.dir1_a import dir1a_dict, dir1a_str

dir1a_dict.a = "modified"

# modification above won't affect future imports
from .dir1.dir1_b import dir1b_dict, dir1b_str

lazyobj = LazyCall(count)(x=dir1a_str, y=dir1b_str)
"#;

/// `dir1/dir1_a.py`
pub const DIR1_A: &str = r#"dir1a_str = "base_a_1"
dir1a_dict = {"a": 1, "b": 2}
"#;

/// `dir1/dir1_b.py`, loading `dir1_a.py` through `LazyConfig.load_rel`
pub const DIR1_B: &str = r#"from libai.config import LazyConfig

# equivalent to relative import
dir1a_str, dir1a_dict = LazyConfig.load_rel("dir1_a.py", ("dir1a_str", "dir1a_dict"))

dir1b_str = dir1a_str + "_from_b"
dir1b_dict = dir1a_dict

# Every import is a reload: not modified by other config files
assert dir1a_dict.a == 1
"#;

/// Source text expected for the fixture tree after `lazyobj.x` is replaced by
/// [`nested_x`] and `list` is appended
pub const EXPECTED_SOURCE: &str = r#"cfg.dir1a_dict.a = "modified"
cfg.dir1a_dict.b = 2
cfg.dir1b_dict.a = 1
cfg.dir1b_dict.b = 2
cfg.lazyobj = itertools.count(
    x={
        "a": 1,
        "b": 2,
        "c": itertools.count(x={"r": "a", "s": 2.4, "t": [1, 2, 3, "z"]}),
    },
    y="base_a_1_from_b",
)
cfg.list = ["a", 1, "b", 3.2]
"#;

/// Config source files written into a scratch directory
///
/// The directory is removed when the fixture is dropped.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Empty scratch directory
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Scratch directory holding `root_cfg.py`, `dir1/dir1_a.py` and
    /// `dir1/dir1_b.py`
    pub fn new() -> Self {
        let fixture = Self::empty();
        fixture.write("root_cfg.py", ROOT_CFG);
        fixture.write("dir1/dir1_a.py", DIR1_A);
        fixture.write("dir1/dir1_b.py", DIR1_B);
        fixture
    }

    /// Fixture root directory
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file relative to the fixture directory
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Path of `root_cfg.py`
    pub fn root(&self) -> PathBuf {
        self.path("root_cfg.py")
    }

    /// Write `text` to `rel`, creating parent directories
    pub fn write(&self, rel: &str, text: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, text).expect("write fixture file");
        path
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// `{"a": 1, "b": 2, "c": itertools.count(x={"r": "a", "s": 2.4, "t": [1, 2, 3, "z"]})}`
pub fn nested_x() -> Value {
    let inner: Value = [
        ("r", Value::from("a")),
        ("s", Value::Float(2.4)),
        (
            "t",
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::from("z")]),
        ),
    ]
    .into_iter()
    .collect();
    [
        ("a", Value::Int(1)),
        ("b", Value::Int(2)),
        ("c", Value::Call(CallNode::new("itertools.count").with_arg("x", inner))),
    ]
    .into_iter()
    .collect()
}

/// `["a", 1, "b", 3.2]`
pub fn sample_list() -> Value {
    Value::List(vec![Value::from("a"), Value::Int(1), Value::from("b"), Value::Float(3.2)])
}

/// The tree `root_cfg.py` loads to
pub fn fixture_tree() -> ConfigTree {
    let mut tree = ConfigTree::new();
    tree.insert("dir1a_dict", dict(&[("a", Value::from("modified")), ("b", Value::Int(2))]));
    tree.insert("dir1b_dict", dict(&[("a", Value::Int(1)), ("b", Value::Int(2))]));
    tree.insert(
        "lazyobj",
        CallNode::new("itertools.count")
            .with_arg("x", "base_a_1")
            .with_arg("y", "base_a_1_from_b"),
    );
    tree
}

/// A model-style tree with nested calls, a list of calls and a scalar section
pub fn model_tree() -> ConfigTree {
    let backbone = CallNode::new("models.ResNet")
        .with_arg("depth", 50)
        .with_arg("norm", "BN")
        .with_arg("pretrained", true);
    let head = CallNode::new("models.Head")
        .with_arg("in_features", 2048)
        .with_arg("num_classes", 1000)
        .with_arg("dropout", 0.1);
    let model = CallNode::new("models.Classifier")
        .with_arg("backbone", backbone)
        .with_arg("head", head);

    let mut tree = ConfigTree::new();
    tree.insert("model", model);
    tree.insert(
        "augment",
        Value::List(vec![
            Value::Call(CallNode::new("transforms.Flip").with_arg("p", 0.5)),
            Value::Call(CallNode::new("transforms.Crop").with_arg("size", 224)),
        ]),
    );
    tree.insert(
        "train",
        dict(&[
            ("epochs", Value::Int(90)),
            ("lr", Value::Float(0.1)),
            ("output_dir", Value::from("runs/resnet")),
            ("resume", Value::Null),
        ]),
    );
    tree
}

/// [`model_tree`] with an opaque leaf under `train.schedule`
pub fn tree_with_opaque() -> ConfigTree {
    let mut tree = model_tree();
    let schedule = Opaque::new("function", b"<lambda: 3>".to_vec());
    tree.set("train.schedule", schedule).expect("train exists");
    tree
}

/// Mapping value from pairs
pub fn dict(pairs: &[(&str, Value)]) -> Value {
    let map: ConfigMap = pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
    Value::Map(map)
}
