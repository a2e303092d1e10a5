//! Command-line style overrides
//!
//! An override is `dotted.key=value`. The value is read as a literal when it
//! parses as one (`123`, `"123"`, `[1, 2]`); anything else is a raw token
//! converted to the type of the slot it replaces.

use lazycfg_source::parse_literal;
use lazycfg_tree::{ConfigPath, ConfigTree, PathError, Value, TARGET_KEY};
use tracing::debug;

use crate::error::{OverrideError, OverrideErrorKind};

/// Apply overrides in order
///
/// Stops at the first failure; overrides before it stay applied.
///
/// # Errors
///
/// The first failing override, with its index and text.
pub fn apply_overrides<'t, S: AsRef<str>>(
    tree: &'t mut ConfigTree,
    overrides: &[S],
) -> Result<&'t mut ConfigTree, OverrideError> {
    for (index, text) in overrides.iter().enumerate() {
        let text = text.as_ref();
        apply_override(tree, text).map_err(|kind| OverrideError {
            index,
            text: text.to_string(),
            kind,
        })?;
    }
    Ok(tree)
}

/// Apply a single `key=value` override
///
/// # Errors
///
/// [`OverrideErrorKind`] describing why the override was rejected.
pub fn apply_override(tree: &mut ConfigTree, text: &str) -> Result<(), OverrideErrorKind> {
    let (key, token) = text.split_once('=').ok_or(OverrideErrorKind::MalformedOverride)?;
    let key = key.trim();
    let token = token.trim();
    if key.is_empty() {
        return Err(OverrideErrorKind::MalformedOverride);
    }
    let path: ConfigPath = key.parse().map_err(OverrideErrorKind::InvalidPath)?;
    let Some(last) = path.last() else {
        return Err(OverrideErrorKind::MalformedOverride);
    };

    let parent_path = path.prefix(path.len() - 1);
    let current = if parent_path.is_empty() {
        tree.root().get(last)
    } else {
        let parent = tree.get_path(&parent_path).map_err(|e| not_found(key, &e, last))?;
        if let Value::Call(call) = parent {
            if last == TARGET_KEY {
                let target = target_name(key, token)?;
                debug!(path = key, from = call.target_name(), to = %target, "override call target");
                if let Ok(Value::Call(call)) = tree.get_path_mut(&parent_path) {
                    call.set_target(target);
                }
                return Ok(());
            }
        }
        match parent {
            Value::Map(_) | Value::Call(_) => parent.child(last),
            Value::List(_) => Some(parent.child(last).ok_or_else(|| not_found_segment(key, last))?),
            _ => return Err(not_found_segment(key, last)),
        }
    };

    let value = coerce(key, token, current)?;
    let old_kind = current.map(|v| v.kind().to_string());
    let new_kind = value.kind();
    tree.set_path(&path, value).map_err(|e| not_found(key, &e, last))?;
    debug!(path = key, from = old_kind.as_deref().unwrap_or("<new>"), to = %new_kind, "applied override");
    Ok(())
}

fn not_found(key: &str, error: &PathError, fallback: &str) -> OverrideErrorKind {
    OverrideErrorKind::PathNotFound {
        path: key.to_string(),
        segment: error.missing_segment().unwrap_or_else(|| fallback.to_string()),
    }
}

fn not_found_segment(key: &str, segment: &str) -> OverrideErrorKind {
    OverrideErrorKind::PathNotFound {
        path: key.to_string(),
        segment: segment.to_string(),
    }
}

fn target_name(key: &str, token: &str) -> Result<String, OverrideErrorKind> {
    match parse_literal(token) {
        Some(Value::Str(name)) => Ok(name),
        None if !token.is_empty() => Ok(token.to_string()),
        other => Err(OverrideErrorKind::TypeCoercion {
            path: key.to_string(),
            expected: "str".to_string(),
            given: other.map_or_else(|| token.to_string(), |v| v.kind().to_string()),
        }),
    }
}

/// Convert `token` for the slot currently holding `current`
fn coerce(key: &str, token: &str, current: Option<&Value>) -> Result<Value, OverrideErrorKind> {
    if let Some(literal) = parse_literal(token) {
        #[allow(clippy::cast_precision_loss)]
        let value = match (current, literal) {
            (Some(Value::Float(_)), Value::Int(i)) => Value::Float(i as f64),
            (_, literal) => literal,
        };
        return Ok(value);
    }

    match current {
        None | Some(Value::Null | Value::Str(_)) => Ok(Value::Str(token.to_string())),
        Some(Value::Bool(_)) => parse_bool(token).map(Value::Bool).ok_or_else(|| mismatch(key, "bool", token)),
        Some(other) => Err(mismatch(key, other.kind().name(), token)),
    }
}

fn parse_bool(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn mismatch(key: &str, expected: &str, token: &str) -> OverrideErrorKind {
    OverrideErrorKind::TypeCoercion {
        path: key.to_string(),
        expected: expected.to_string(),
        given: token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazycfg_test_utils::{dict, fixture_tree, model_tree};
    use lazycfg_tree::CallNode;
    use proptest::prelude::*;

    #[test]
    fn literal_and_quoted_values() {
        let mut tree = fixture_tree();
        apply_overrides(&mut tree, &["lazyobj.x=123", "dir1b_dict.a=\"123\""]).unwrap();
        assert_eq!(tree.get("lazyobj.x"), Some(&Value::Int(123)));
        assert_eq!(tree.get("dir1b_dict.a"), Some(&Value::from("123")));
    }

    #[test]
    fn int_into_float_slot() {
        let mut tree = model_tree();
        apply_override(&mut tree, "train.lr=1").unwrap();
        assert_eq!(tree.get("train.lr"), Some(&Value::Float(1.0)));
    }

    #[test]
    fn raw_tokens() {
        let mut tree = model_tree();
        apply_override(&mut tree, "train.output_dir=runs/other").unwrap();
        assert_eq!(tree.get("train.output_dir"), Some(&Value::from("runs/other")));

        apply_override(&mut tree, "model.backbone.pretrained=off").unwrap();
        assert_eq!(tree.get("model.backbone.pretrained"), Some(&Value::Bool(false)));

        apply_override(&mut tree, "train.resume=checkpoints/last.ckpt").unwrap();
        assert_eq!(tree.get("train.resume"), Some(&Value::from("checkpoints/last.ckpt")));

        let err = apply_override(&mut tree, "train.epochs=ninety").unwrap_err();
        assert_eq!(
            err,
            OverrideErrorKind::TypeCoercion {
                path: "train.epochs".into(),
                expected: "int".into(),
                given: "ninety".into(),
            }
        );
    }

    #[test]
    fn new_keys_need_existing_parent() {
        let mut tree = model_tree();
        apply_override(&mut tree, "train.seed=7").unwrap();
        apply_override(&mut tree, "model.head.bias=True").unwrap();
        apply_override(&mut tree, "extra=[1, 2]").unwrap();
        assert_eq!(tree.get("train.seed"), Some(&Value::Int(7)));
        assert_eq!(tree.get("model.head.bias"), Some(&Value::Bool(true)));
        assert_eq!(tree.get("extra.1"), Some(&Value::Int(2)));

        let err = apply_override(&mut tree, "missing.x=1").unwrap_err();
        assert!(matches!(err, OverrideErrorKind::PathNotFound { ref segment, .. } if segment == "missing"));
    }

    #[test]
    fn scalar_parent_is_not_found() {
        let mut tree = fixture_tree();
        let err = apply_overrides(&mut tree, &["lazyobj.x.xxx=123"]).unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(
            err.kind,
            OverrideErrorKind::PathNotFound {
                path: "lazyobj.x.xxx".into(),
                segment: "xxx".into(),
            }
        );
    }

    #[test]
    fn list_indices() {
        let mut tree = model_tree();
        apply_override(&mut tree, "augment.0.p=0.25").unwrap();
        assert_eq!(tree.get("augment.0.p"), Some(&Value::Float(0.25)));
        assert!(matches!(
            apply_override(&mut tree, "augment.5=1"),
            Err(OverrideErrorKind::PathNotFound { .. })
        ));
    }

    #[test]
    fn call_target_rewrite() {
        let mut tree = model_tree();
        apply_override(&mut tree, "model.backbone._target_=models.ResNeXt").unwrap();
        apply_override(&mut tree, "model.head._target_='models.LinearHead'").unwrap();
        let backbone = tree.get("model.backbone").and_then(Value::as_call).unwrap();
        assert_eq!(backbone.target_name(), "models.ResNeXt");
        assert_eq!(backbone.arg("depth"), Some(&Value::Int(50)));
        let head = tree.get("model.head").and_then(Value::as_call).map(CallNode::target_name);
        assert_eq!(head, Some("models.LinearHead"));

        assert!(matches!(
            apply_override(&mut tree, "model._target_=3"),
            Err(OverrideErrorKind::TypeCoercion { .. })
        ));
    }

    #[test]
    fn batch_stops_at_first_failure() {
        let mut tree = model_tree();
        let err = apply_overrides(&mut tree, &["train.epochs=10", "nope", "train.lr=0.5"]).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.text, "nope");
        assert_eq!(err.kind, OverrideErrorKind::MalformedOverride);
        assert_eq!(tree.get("train.epochs"), Some(&Value::Int(10)));
        assert_eq!(tree.get("train.lr"), Some(&Value::Float(0.1)));
    }

    #[test]
    fn mapping_slot_takes_literal_mapping() {
        let mut tree = model_tree();
        apply_override(&mut tree, "train={'epochs': 1}").unwrap();
        assert_eq!(tree.get("train"), Some(&dict(&[("epochs", Value::Int(1))])));
        assert!(matches!(
            apply_override(&mut tree, "train=short"),
            Err(OverrideErrorKind::TypeCoercion { .. })
        ));
    }

    #[test]
    fn invalid_keys() {
        let mut tree = model_tree();
        assert!(matches!(apply_override(&mut tree, "=1"), Err(OverrideErrorKind::MalformedOverride)));
        assert!(matches!(apply_override(&mut tree, "a..b=1"), Err(OverrideErrorKind::InvalidPath(_))));
    }

    #[test]
    fn integer_extremes() {
        let mut tree = model_tree();
        apply_overrides(&mut tree, &["train.epochs=-9223372036854775808", "model.backbone.depth=9223372036854775807"])
            .unwrap();
        assert_eq!(tree.get("train.epochs"), Some(&Value::Int(i64::MIN)));
        assert_eq!(tree.get("model.backbone.depth"), Some(&Value::Int(i64::MAX)));
        assert!(matches!(
            apply_override(&mut tree, "train.epochs=9223372036854775808"),
            Err(OverrideErrorKind::TypeCoercion { .. })
        ));
    }

    proptest! {
        #[test]
        fn integers_follow_the_slot(n in -(1i64 << 53)..(1i64 << 53)) {
            let mut tree = model_tree();
            apply_overrides(&mut tree, &[format!("model.backbone.depth={n}"), format!("model.head.dropout={n}")])
                .unwrap();
            prop_assert_eq!(tree.get("model.backbone.depth"), Some(&Value::Int(n)));
            #[allow(clippy::cast_precision_loss)]
            let expected = Value::Float(n as f64);
            prop_assert_eq!(tree.get("model.head.dropout"), Some(&expected));
        }

        #[test]
        fn bare_words_fill_string_slots(word in "[a-z][a-z0-9_]{0,8}") {
            let mut tree = model_tree();
            apply_override(&mut tree, &format!("model.backbone.norm={word}")).unwrap();
            prop_assert_eq!(tree.get("model.backbone.norm"), Some(&Value::Str(word)));
        }
    }
}
