//! Saved form of a config tree
//!
//! The primary file is YAML. Call nodes become mappings led by `_target_`;
//! opaque leaves become `{_opaque_: <hash>, _type_: <type>}` references whose
//! bytes live in a tar sidecar next to the primary file:
//!
//! ```text
//! config.yaml.sidecar
//! ├── manifest.json        {"version": 1, "objects": {"<hash>": {"type": .., "size": ..}}}
//! └── objects/<hash>       raw payload
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lazycfg_tree::{CallNode, ConfigMap, ConfigTree, ContentHash, Opaque, Value, TARGET_KEY};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Number, Value as YamlValue};
use tar::{Archive, Builder, Header};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{PersistError, PersistResult};
use crate::options::EngineOptions;

/// Key of the content hash in an opaque reference
pub const OPAQUE_KEY: &str = "_opaque_";

/// Key of the type name in an opaque reference
pub const TYPE_KEY: &str = "_type_";

/// Keys user mappings may not use
pub const RESERVED_KEYS: [&str; 3] = [TARGET_KEY, OPAQUE_KEY, TYPE_KEY];

const MANIFEST_ENTRY: &str = "manifest.json";
const OBJECTS_DIR: &str = "objects/";
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    objects: BTreeMap<String, ManifestObject>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestObject {
    #[serde(rename = "type")]
    type_name: String,
    size: u64,
}

/// An opaque leaf was routed to the sidecar instead of the primary file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializationFallbackNotice {
    /// Dotted path of the leaf
    pub path: String,
    /// Type name recorded in the manifest
    pub type_name: String,
    /// Sidecar entry holding the payload
    pub hash: ContentHash,
}

impl fmt::Display for SerializationFallbackNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({}) stored in sidecar as {}", self.path, self.type_name, self.hash.short())
    }
}

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// The primary YAML file
    pub path: PathBuf,
    /// The sidecar archive, when any opaque leaf was saved
    pub sidecar: Option<PathBuf>,
    /// One notice per opaque leaf, in tree order
    pub notices: Vec<SerializationFallbackNotice>,
}

impl SaveReport {
    /// Whether any leaf went to the sidecar
    #[inline]
    #[must_use]
    pub fn has_fallbacks(&self) -> bool {
        !self.notices.is_empty()
    }
}

/// Writes and reads the saved form
#[derive(Debug, Clone, Default)]
pub struct Persister {
    options: EngineOptions,
}

impl Persister {
    /// Persister using the sidecar suffix of `options`
    #[must_use]
    pub const fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    /// Sidecar path for a primary file at `dest`
    #[must_use]
    pub fn sidecar_path(&self, dest: &Path) -> PathBuf {
        self.options.sidecar_path(dest)
    }

    /// Save `tree` to `dest`, with a sidecar when it holds opaque leaves
    ///
    /// The sidecar is written before the primary file so a saved file never
    /// points at objects that are not on disk. Without opaque leaves any
    /// sidecar left by an earlier save is removed.
    ///
    /// # Errors
    ///
    /// [`PersistError::ReservedKey`] for mappings using a reserved key, or
    /// any I/O or serialization failure.
    #[tracing::instrument(level = "debug", skip_all, fields(dest = %dest.display()))]
    pub fn save(&self, tree: &ConfigTree, dest: &Path) -> PersistResult<SaveReport> {
        let mut encoder = Encoder::default();
        let root = encoder.mapping("", tree.root())?;
        let text = serde_yaml::to_string(&YamlValue::Mapping(root)).map_err(|source| PersistError::Yaml {
            path: dest.to_path_buf(),
            source,
        })?;

        let sidecar_path = self.sidecar_path(dest);
        let sidecar = if encoder.objects.is_empty() {
            remove_stale(&sidecar_path)?;
            None
        } else {
            let archive = build_sidecar(&encoder.objects).map_err(|e| PersistError::sidecar(&sidecar_path, e.to_string()))?;
            write_atomic(&sidecar_path, &archive)?;
            debug!(sidecar = %sidecar_path.display(), objects = encoder.objects.len(), "wrote sidecar");
            Some(sidecar_path)
        };
        write_atomic(dest, text.as_bytes())?;

        for notice in &encoder.notices {
            warn!(path = %notice.path, type_name = %notice.type_name, hash = %notice.hash.short(), "opaque leaf saved to sidecar");
        }
        Ok(SaveReport {
            path: dest.to_path_buf(),
            sidecar,
            notices: encoder.notices,
        })
    }

    /// Read a tree written by [`Persister::save`]
    ///
    /// # Errors
    ///
    /// I/O and YAML failures, malformed references, and references whose
    /// objects are missing from the sidecar.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn load_saved(&self, path: &Path) -> PersistResult<ConfigTree> {
        let text = fs::read_to_string(path).map_err(|e| PersistError::io(path, e))?;
        if text.trim().is_empty() {
            return Ok(ConfigTree::new());
        }
        let document: YamlValue = serde_yaml::from_str(&text).map_err(|source| PersistError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        let mut decoder = Decoder {
            file: path,
            sidecar: self.sidecar_path(path),
            objects: None,
        };
        match document {
            YamlValue::Null => Ok(ConfigTree::new()),
            YamlValue::Mapping(mapping) => {
                let entries = decoder.entries("", mapping)?;
                let root = entries
                    .into_iter()
                    .map(|(key, value)| {
                        if RESERVED_KEYS.contains(&key.as_str()) {
                            return Err(reserved_on_load(&key, &key));
                        }
                        let value = decoder.decode(&key, value)?;
                        Ok((key, value))
                    })
                    .collect::<PersistResult<ConfigMap>>()?;
                Ok(ConfigTree::from_map(root))
            }
            other => Err(decoder.invalid(format!("top level must be a mapping, found {}", yaml_kind(&other)))),
        }
    }
}

/// Save with default options
///
/// # Errors
///
/// See [`Persister::save`].
pub fn save(tree: &ConfigTree, dest: impl AsRef<Path>) -> PersistResult<SaveReport> {
    Persister::default().save(tree, dest.as_ref())
}

/// Load a saved tree with default options
///
/// # Errors
///
/// See [`Persister::load_saved`].
pub fn load_saved(path: impl AsRef<Path>) -> PersistResult<ConfigTree> {
    Persister::default().load_saved(path.as_ref())
}

/// Saved-form YAML for a single value
///
/// Opaque leaves render as references; their payloads are not written
/// anywhere.
///
/// # Errors
///
/// [`PersistError::ReservedKey`] for mappings using a reserved key.
pub fn to_yaml_value(value: &Value) -> PersistResult<YamlValue> {
    Encoder::default().value("", value)
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

#[derive(Default)]
struct Encoder {
    objects: IndexMap<ContentHash, Opaque>,
    notices: Vec<SerializationFallbackNotice>,
}

impl Encoder {
    fn value(&mut self, path: &str, value: &Value) -> PersistResult<YamlValue> {
        Ok(match value {
            Value::Null => YamlValue::Null,
            Value::Bool(b) => YamlValue::Bool(*b),
            Value::Int(i) => YamlValue::Number(Number::from(*i)),
            Value::Float(f) => YamlValue::Number(Number::from(*f)),
            Value::Str(s) => YamlValue::String(s.clone()),
            Value::List(items) => YamlValue::Sequence(
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.value(&join(path, &index.to_string()), item))
                    .collect::<PersistResult<_>>()?,
            ),
            Value::Map(map) => YamlValue::Mapping(self.mapping(path, map)?),
            Value::Call(call) => YamlValue::Mapping(self.call(path, call)?),
            Value::Opaque(opaque) => YamlValue::Mapping(self.opaque(path, opaque)),
        })
    }

    fn mapping(&mut self, path: &str, map: &ConfigMap) -> PersistResult<Mapping> {
        let mut out = Mapping::with_capacity(map.len());
        for (key, value) in map {
            let child = join(path, key);
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(PersistError::ReservedKey {
                    path: child,
                    key: key.clone(),
                });
            }
            out.insert(YamlValue::String(key.clone()), self.value(&child, value)?);
        }
        Ok(out)
    }

    fn call(&mut self, path: &str, call: &CallNode) -> PersistResult<Mapping> {
        let mut out = Mapping::with_capacity(call.args().len() + 1);
        out.insert(TARGET_KEY.into(), call.target_name().into());
        out.extend(self.mapping(path, call.args())?);
        Ok(out)
    }

    fn opaque(&mut self, path: &str, opaque: &Opaque) -> Mapping {
        let hash = opaque.id();
        self.objects.entry(hash).or_insert_with(|| opaque.clone());
        self.notices.push(SerializationFallbackNotice {
            path: path.to_string(),
            type_name: opaque.type_name().to_string(),
            hash,
        });

        let mut out = Mapping::with_capacity(2);
        out.insert(OPAQUE_KEY.into(), hash.to_string().into());
        out.insert(TYPE_KEY.into(), opaque.type_name().into());
        out
    }
}

fn build_sidecar(objects: &IndexMap<ContentHash, Opaque>) -> io::Result<Vec<u8>> {
    let manifest = Manifest {
        version: MANIFEST_VERSION,
        objects: objects
            .iter()
            .map(|(hash, opaque)| {
                let object = ManifestObject {
                    type_name: opaque.type_name().to_string(),
                    size: opaque.payload().len() as u64,
                };
                (hash.to_string(), object)
            })
            .collect(),
    };
    let manifest = serde_json::to_vec_pretty(&manifest)?;

    let mut builder = Builder::new(Vec::new());
    append(&mut builder, MANIFEST_ENTRY, &manifest)?;
    for (hash, opaque) in objects {
        append(&mut builder, &format!("{OBJECTS_DIR}{hash}"), opaque.payload())?;
    }
    builder.into_inner()
}

/// Append one regular file with a canonical header
fn append(builder: &mut Builder<Vec<u8>>, name: &str, data: &[u8]) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_path(name)?;
    header.set_size(data.len() as u64);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, data)
}

fn read_sidecar(path: &Path) -> PersistResult<HashMap<ContentHash, Opaque>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(PersistError::io(path, e)),
    };

    let mut manifest: Option<Manifest> = None;
    let mut blobs = HashMap::new();
    let mut archive = Archive::new(Cursor::new(bytes));
    let entries = archive.entries().map_err(|e| PersistError::sidecar(path, e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| PersistError::sidecar(path, e.to_string()))?;
        let name = entry
            .path()
            .map_err(|e| PersistError::sidecar(path, e.to_string()))?
            .to_string_lossy()
            .into_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| PersistError::sidecar(path, format!("{name}: {e}")))?;

        if name == MANIFEST_ENTRY {
            let parsed = serde_json::from_slice(&data).map_err(|e| PersistError::sidecar(path, format!("{MANIFEST_ENTRY}: {e}")))?;
            manifest = Some(parsed);
        } else if let Some(hash) = name.strip_prefix(OBJECTS_DIR) {
            blobs.insert(hash.to_string(), data);
        } else {
            return Err(PersistError::sidecar(path, format!("unexpected entry '{name}'")));
        }
    }

    let manifest = manifest.ok_or_else(|| PersistError::sidecar(path, format!("missing {MANIFEST_ENTRY}")))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(PersistError::sidecar(path, format!("unsupported manifest version {}", manifest.version)));
    }

    let mut objects = HashMap::with_capacity(manifest.objects.len());
    for (name, object) in manifest.objects {
        let hash: ContentHash = name
            .parse()
            .map_err(|e| PersistError::sidecar(path, format!("manifest key '{name}': {e}")))?;
        let payload = blobs
            .remove(&name)
            .ok_or_else(|| PersistError::sidecar(path, format!("manifest lists {name} but the archive has no {OBJECTS_DIR}{name}")))?;
        let opaque = Opaque::new(object.type_name, payload);
        if opaque.id() != hash {
            return Err(PersistError::sidecar(path, format!("object {name} does not match its content hash")));
        }
        objects.insert(hash, opaque);
    }
    debug!(sidecar = %path.display(), objects = objects.len(), "read sidecar");
    Ok(objects)
}

struct Decoder<'p> {
    file: &'p Path,
    sidecar: PathBuf,
    /// Read on the first opaque reference
    objects: Option<HashMap<ContentHash, Opaque>>,
}

impl Decoder<'_> {
    fn invalid(&self, message: String) -> PersistError {
        PersistError::InvalidDocument {
            path: self.file.to_path_buf(),
            message,
        }
    }

    fn entries(&self, path: &str, mapping: Mapping) -> PersistResult<Vec<(String, YamlValue)>> {
        mapping
            .into_iter()
            .map(|(key, value)| match key {
                YamlValue::String(key) => Ok((key, value)),
                other => Err(self.invalid(format!("'{path}' has a non-string key of type {}", yaml_kind(&other)))),
            })
            .collect()
    }

    fn decode(&mut self, path: &str, value: YamlValue) -> PersistResult<Value> {
        Ok(match value {
            YamlValue::Null => Value::Null,
            YamlValue::Bool(b) => Value::Bool(b),
            YamlValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if n.is_f64() {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                } else {
                    return Err(self.invalid(format!("'{path}': integer {n} is out of range")));
                }
            }
            YamlValue::String(s) => Value::Str(s),
            YamlValue::Sequence(items) => Value::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| self.decode(&join(path, &index.to_string()), item))
                    .collect::<PersistResult<_>>()?,
            ),
            YamlValue::Mapping(mapping) => self.mapping(path, mapping)?,
            YamlValue::Tagged(tagged) => {
                return Err(self.invalid(format!("'{path}': unsupported tag {}", tagged.tag)));
            }
        })
    }

    fn mapping(&mut self, path: &str, mapping: Mapping) -> PersistResult<Value> {
        let entries = self.entries(path, mapping)?;
        let has = |key: &str| entries.iter().any(|(k, _)| k == key);

        if has(OPAQUE_KEY) {
            return self.opaque(path, entries);
        }
        if has(TYPE_KEY) {
            return Err(invalid_reference(path, format!("'{TYPE_KEY}' without '{OPAQUE_KEY}'")));
        }

        let mut target = None;
        let mut args = ConfigMap::with_capacity(entries.len());
        for (key, value) in entries {
            if key == TARGET_KEY {
                match value {
                    YamlValue::String(name) => target = Some(name),
                    other => {
                        return Err(invalid_reference(
                            path,
                            format!("'{TARGET_KEY}' must be a string, found {}", yaml_kind(&other)),
                        ));
                    }
                }
                continue;
            }
            let value = self.decode(&join(path, &key), value)?;
            args.insert(key, value);
        }
        Ok(match target {
            Some(target) => Value::Call(CallNode::with_args(target, args)),
            None => Value::Map(args),
        })
    }

    fn opaque(&mut self, path: &str, entries: Vec<(String, YamlValue)>) -> PersistResult<Value> {
        let mut hash = None;
        let mut type_name = None;
        for (key, value) in entries {
            let slot = match key.as_str() {
                OPAQUE_KEY => &mut hash,
                TYPE_KEY => &mut type_name,
                _ => return Err(invalid_reference(path, format!("unexpected key '{key}' in opaque reference"))),
            };
            match value {
                YamlValue::String(s) => *slot = Some(s),
                other => return Err(invalid_reference(path, format!("'{key}' must be a string, found {}", yaml_kind(&other)))),
            }
        }
        let hash = hash.ok_or_else(|| invalid_reference(path, format!("missing '{OPAQUE_KEY}'")))?;
        let type_name = type_name.ok_or_else(|| invalid_reference(path, format!("missing '{TYPE_KEY}'")))?;

        let id: ContentHash = hash
            .parse()
            .map_err(|e| invalid_reference(path, format!("'{OPAQUE_KEY}': {e}")))?;

        if self.objects.is_none() {
            self.objects = Some(read_sidecar(&self.sidecar)?);
        }
        let found = self.objects.as_ref().and_then(|objects| objects.get(&id));
        let Some(opaque) = found else {
            return Err(PersistError::MissingSidecarEntry {
                path: path.to_string(),
                hash,
                sidecar: self.sidecar.clone(),
            });
        };
        if opaque.type_name() != type_name {
            return Err(invalid_reference(
                path,
                format!("type '{type_name}' does not match stored type '{}'", opaque.type_name()),
            ));
        }
        Ok(Value::Opaque(opaque.clone()))
    }
}

fn invalid_reference(path: &str, message: String) -> PersistError {
    PersistError::InvalidReference {
        path: path.to_string(),
        message,
    }
}

fn reserved_on_load(path: &str, key: &str) -> PersistError {
    invalid_reference(path, format!("reserved key '{key}' at top level"))
}

const fn yaml_kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "bool",
        YamlValue::Number(_) => "number",
        YamlValue::String(_) => "string",
        YamlValue::Sequence(_) => "sequence",
        YamlValue::Mapping(_) => "mapping",
        YamlValue::Tagged(_) => "tagged value",
    }
}

/// Write to a temporary sibling, then rename over `dest`
fn write_atomic(dest: &Path, bytes: &[u8]) -> PersistResult<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(|e| PersistError::io(dir, e))?;
    file.write_all(bytes).map_err(|e| PersistError::io(file.path(), e))?;
    file.persist(dest).map_err(|e| PersistError::io(dest, e.error))?;
    Ok(())
}

fn remove_stale(sidecar: &Path) -> PersistResult<()> {
    match fs::remove_file(sidecar) {
        Ok(()) => {
            debug!(sidecar = %sidecar.display(), "removed stale sidecar");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PersistError::io(sidecar, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazycfg_test_utils::{dict, model_tree, tree_with_opaque};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("config.yaml");
        (dir, dest)
    }

    #[test]
    fn round_trip_without_sidecar() {
        let (_dir, dest) = scratch();
        let tree = model_tree();
        let report = save(&tree, &dest).unwrap();
        assert_eq!(report.sidecar, None);
        assert!(!report.has_fallbacks());
        assert!(!Persister::default().sidecar_path(&dest).exists());
        assert_eq!(load_saved(&dest).unwrap(), tree);
    }

    #[test]
    fn call_nodes_lead_with_target() {
        let (_dir, dest) = scratch();
        save(&model_tree(), &dest).unwrap();
        let text = fs::read_to_string(&dest).unwrap();
        assert!(text.starts_with("model:\n  _target_: models.Classifier\n  backbone:\n    _target_: models.ResNet\n"));
        assert!(text.contains("- _target_: transforms.Flip\n"));
    }

    #[test]
    fn opaque_leaves_go_to_sidecar() {
        let (_dir, dest) = scratch();
        let tree = tree_with_opaque();
        let report = save(&tree, &dest).unwrap();

        let sidecar = report.sidecar.clone().unwrap();
        assert!(dest.exists());
        assert!(sidecar.exists());
        assert_eq!(sidecar.file_name().unwrap(), "config.yaml.sidecar");
        assert_eq!(report.notices.len(), 1);
        assert_eq!(report.notices[0].path, "train.schedule");
        assert_eq!(report.notices[0].type_name, "function");

        let text = fs::read_to_string(&dest).unwrap();
        assert!(text.contains(&format!("_opaque_: {}", report.notices[0].hash)));
        assert!(text.contains("_type_: function"));

        let loaded = load_saved(&dest).unwrap();
        assert_eq!(loaded, tree);
        let schedule = loaded.get("train.schedule").and_then(Value::as_opaque).unwrap();
        assert_eq!(schedule.payload(), b"<lambda: 3>");
    }

    #[test]
    fn sidecar_layout() {
        let (_dir, dest) = scratch();
        let mut tree = tree_with_opaque();
        let copy = tree.get("train.schedule").cloned().unwrap();
        tree.insert("again", copy);
        let report = save(&tree, &dest).unwrap();
        assert_eq!(report.notices.len(), 2);

        let bytes = fs::read(report.sidecar.unwrap()).unwrap();
        let mut archive = Archive::new(Cursor::new(bytes));
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            assert_eq!(entry.header().mtime().unwrap(), 0);
            assert_eq!(entry.header().mode().unwrap(), 0o644);
            names.push(entry.path().unwrap().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec![MANIFEST_ENTRY.to_string(), format!("objects/{}", report.notices[0].hash)]);
    }

    #[test]
    fn stale_sidecar_is_removed() {
        let (_dir, dest) = scratch();
        let first = save(&tree_with_opaque(), &dest).unwrap();
        let sidecar = first.sidecar.unwrap();
        assert!(sidecar.exists());

        save(&model_tree(), &dest).unwrap();
        assert!(!sidecar.exists());
    }

    #[test]
    fn reserved_keys_are_rejected() {
        let (_dir, dest) = scratch();
        let mut tree = model_tree();
        tree.insert("meta", dict(&[("_type_", Value::from("x"))]));
        let err = save(&tree, &dest).unwrap_err();
        assert!(matches!(err, PersistError::ReservedKey { ref path, ref key } if path == "meta._type_" && key == "_type_"));
        assert!(!dest.exists());
    }

    #[test]
    fn missing_sidecar_entry() {
        let (_dir, dest) = scratch();
        let report = save(&tree_with_opaque(), &dest).unwrap();
        fs::remove_file(report.sidecar.unwrap()).unwrap();

        let err = load_saved(&dest).unwrap_err();
        match err {
            PersistError::MissingSidecarEntry { path, hash, .. } => {
                assert_eq!(path, "train.schedule");
                assert_eq!(hash, report.notices[0].hash.to_string());
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn custom_sidecar_suffix() {
        let (_dir, dest) = scratch();
        let persister = Persister::new(EngineOptions::new().with_sidecar_suffix(".blobs.tar"));
        let report = persister.save(&tree_with_opaque(), &dest).unwrap();
        assert_eq!(report.sidecar.unwrap().file_name().unwrap(), "config.yaml.blobs.tar");
        assert_eq!(persister.load_saved(&dest).unwrap(), tree_with_opaque());
    }

    #[test]
    fn hand_written_documents() {
        let (dir, _) = scratch();
        let write = |name: &str, text: &str| {
            let path = dir.path().join(name);
            fs::write(&path, text).unwrap();
            path
        };

        assert!(load_saved(write("empty.yaml", "")).unwrap().is_empty());

        let tree = load_saved(write("call.yaml", "opt:\n  _target_: optim.SGD\n  lr: 0.5\n  momentum: 9\n")).unwrap();
        let opt = tree.get("opt").and_then(Value::as_call).unwrap();
        assert_eq!(opt.target_name(), "optim.SGD");
        assert_eq!(opt.arg("lr"), Some(&Value::Float(0.5)));
        assert_eq!(opt.arg("momentum"), Some(&Value::Int(9)));

        assert!(matches!(
            load_saved(write("list.yaml", "- 1\n- 2\n")),
            Err(PersistError::InvalidDocument { .. })
        ));
        assert!(matches!(
            load_saved(write("stray.yaml", "a:\n  _type_: x\n")),
            Err(PersistError::InvalidReference { ref path, .. }) if path == "a"
        ));
        assert!(matches!(
            load_saved(write("target.yaml", "a:\n  _target_: [1]\n")),
            Err(PersistError::InvalidReference { .. })
        ));
        assert!(matches!(
            load_saved(write("hash.yaml", "a:\n  _opaque_: nothex\n  _type_: x\n")),
            Err(PersistError::InvalidReference { .. })
        ));
        assert!(matches!(
            load_saved(write("keys.yaml", "a:\n  1: x\n")),
            Err(PersistError::InvalidDocument { .. })
        ));
        assert!(matches!(load_saved(dir.path().join("absent.yaml")), Err(PersistError::Io { .. })));
    }

    #[test]
    fn single_value_yaml() {
        let tree = tree_with_opaque();
        let head = to_yaml_value(tree.get("model.head").unwrap()).unwrap();
        assert_eq!(
            serde_yaml::to_string(&head).unwrap(),
            "_target_: models.Head\nin_features: 2048\nnum_classes: 1000\ndropout: 0.1\n"
        );
        let schedule = to_yaml_value(tree.get("train.schedule").unwrap()).unwrap();
        assert_eq!(schedule.get(TYPE_KEY).and_then(YamlValue::as_str), Some("function"));
    }

    #[test]
    fn notice_display() {
        let notice = SerializationFallbackNotice {
            path: "a.b".into(),
            type_name: "function".into(),
            hash: ContentHash::compute(b"x"),
        };
        assert_eq!(
            notice.to_string(),
            format!("'a.b' (function) stored in sidecar as {}", ContentHash::compute(b"x").short())
        );
    }
}
