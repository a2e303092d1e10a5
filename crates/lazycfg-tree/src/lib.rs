//! lazycfg Tree Model
//!
//! Ordered configuration trees whose leaves may be deferred object
//! constructions.
//!
//! # Core Concepts
//!
//! - [`Value`]: Tagged variant for every node of a tree (scalar, list, mapping,
//!   call node, opaque leaf)
//! - [`CallNode`]: A call-to-be-made, a [`Target`] plus ordered keyword arguments
//! - [`ConfigTree`]: The root mapping with dotted-path addressing
//! - [`ConfigPath`]: Parsed dotted path (`model.cfg.depth`, `layers.0.dim`)
//! - [`Opaque`]: Leaf the structural formats cannot represent, identified by
//!   its [`ContentHash`]
//! - [`Instance`]: Live value produced by instantiating a tree
//!
//! # Example
//!
//! ```rust
//! use lazycfg_tree::{CallNode, ConfigTree, Value};
//!
//! let mut tree = ConfigTree::new();
//! tree.insert(
//!     "optim",
//!     CallNode::new("optim.AdamW").with_arg("lr", 1e-3).with_arg("eps", 1e-8),
//! );
//! tree.set("optim.lr", 5e-4).unwrap();
//! assert_eq!(tree.get("optim.lr"), Some(&Value::Float(5e-4)));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod call;
mod hash;
mod instance;
mod opaque;
mod path;
mod tree;
mod value;

pub use call::{CallNode, Target, TargetHandle, TARGET_KEY};
pub use hash::{ContentHash, HashError};
pub use instance::{BindError, ConstructError, Constructor, FromInstance, Instance, Kwargs, Object};
pub use opaque::Opaque;
pub use path::{ConfigPath, PathError};
pub use tree::ConfigTree;
pub use value::{ConfigMap, Value, ValueKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
