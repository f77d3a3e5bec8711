/*!
The archive tree: a recursive, auto-vivifying mapping from string keys to values.

Every accessor that resolves a key goes through a single get-or-create resolver,
so reading a missing key leaves an empty child [`Node`] behind. Empty branches are
removed by [`Node::cull`], which the save pipeline runs before every write.

```rust
use pak_core::{Node, Value};

let mut pak = Node::new();
pak.set_path("a.b.c", 1)?;
pak.set_path("a.b.d", 2)?;
assert_eq!(pak.lookup_path("a.b.c"), Some(&Value::Int(1)));

pak.delete_path("a.b.c")?;
pak.delete_path("a.b.d")?;
assert!(pak.is_empty());
# Ok::<(), pak_core::PakError>(())
```
*/

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, Unexpected, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::{path_key, PakError, Result};

/// Plain nested mapping form of a tree, as handed to the integrity layer
pub type Snapshot = BTreeMap<String, Value>;

/// Deepest container nesting an archive may hold.
///
/// Enforced when values are stored, again before encoding, and while decoding
/// so that a crafted archive cannot exhaust the stack.
pub const MAX_DEPTH: usize = 128;

/// Upper bound on preallocation driven by untrusted length prefixes
const PREALLOCATION_LIMIT: usize = 4096;

/// A value that can be stored in an archive.
///
/// The set of kinds is closed so that every value accepted by [`Node::set`]
/// is guaranteed to survive the binary encoding.
#[derive(Debug, Clone, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// A plain mapping stored as a leaf. It is never auto-vivified or culled.
    Map(BTreeMap<String, Value>),
    Node(Node),
}

impl Value {
    /// Convert any serde-serializable value into an archive value.
    ///
    /// Returns `None` when the data cannot be represented, e.g. maps with
    /// non-string keys or integers outside the `i64` range.
    pub fn from_serde<T: Serialize + ?Sized>(value: &T) -> Option<Self> {
        let json = serde_json::to_value(value).ok()?;
        Self::from_json(json)
    }

    fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(b) => Some(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else if n.is_u64() {
                    None
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            serde_json::Value::String(s) => Some(Value::Text(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Self::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Value::Map),
        }
    }

    /// Check that the value survives encoding unchanged when stored at `path`.
    ///
    /// Non-finite floats are rejected because they do not compare equal to
    /// themselves after a reload. Values nested deeper than [`MAX_DEPTH`],
    /// counting the segments of `path`, are rejected as well.
    pub fn validate(&self, path: &str) -> Result<()> {
        self.validate_at(path, path_key::segments(path).len())
    }

    fn validate_at(&self, path: &str, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(PakError::NotSerializable(path.to_string()));
        }
        match self {
            Value::Float(f) if !f.is_finite() => Err(PakError::NotSerializable(path.to_string())),
            Value::List(items) => items
                .iter()
                .try_for_each(|item| item.validate_at(path, depth + 1)),
            Value::Map(map) => map
                .iter()
                .try_for_each(|(k, v)| v.validate_at(&path_key::child(path, k), depth + 1)),
            Value::Node(node) => node.validate_at(path, depth),
            _ => Ok(()),
        }
    }

    /// Recursively replace every `Node` with a plain `Map`
    pub fn to_plain(&self) -> Value {
        match self {
            Value::Node(node) => Value::Map(node.to_nested_mapping()),
            Value::Map(map) => Value::Map(map.iter().map(|(k, v)| (k.clone(), v.to_plain())).collect()),
            Value::List(items) => Value::List(items.iter().map(Value::to_plain).collect()),
            other => other.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Node(node), Value::Map(map)) | (Value::Map(map), Value::Node(node)) => {
                node == map
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Node(node) => write!(f, "{node:?}"),
            other => write!(f, "{:?}", other.to_plain()),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        Value::Node(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(value: BTreeMap<String, T>) -> Self {
        Value::Map(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ValueSeed { depth: 0 }.deserialize(deserializer)
    }
}

const VARIANTS: &[&str] = &[
    "Null", "Bool", "Int", "Float", "Text", "Bytes", "List", "Map", "Node",
];

#[derive(Clone, Copy)]
enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    List,
    Map,
    Node,
}

const KINDS: [Kind; 9] = [
    Kind::Null,
    Kind::Bool,
    Kind::Int,
    Kind::Float,
    Kind::Text,
    Kind::Bytes,
    Kind::List,
    Kind::Map,
    Kind::Node,
];

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_identifier(KindVisitor)
    }
}

struct KindVisitor;

impl<'de> Visitor<'de> for KindVisitor {
    type Value = Kind;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a value kind")
    }

    fn visit_u64<E: de::Error>(self, index: u64) -> std::result::Result<Kind, E> {
        usize::try_from(index)
            .ok()
            .and_then(|i| KINDS.get(i).copied())
            .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(index), &"a value kind index"))
    }

    fn visit_str<E: de::Error>(self, name: &str) -> std::result::Result<Kind, E> {
        VARIANTS
            .iter()
            .zip(KINDS)
            .find(|(variant, _)| **variant == name)
            .map(|(_, kind)| kind)
            .ok_or_else(|| E::unknown_variant(name, VARIANTS))
    }
}

/// Decodes a [`Value`] while counting container depth.
#[derive(Clone, Copy)]
struct ValueSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        if self.depth > MAX_DEPTH {
            return Err(de::Error::custom(format!(
                "value nesting exceeds {MAX_DEPTH} levels"
            )));
        }
        deserializer.deserialize_enum("Value", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for ValueSeed {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an archive value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> std::result::Result<Value, A::Error> {
        let (kind, variant) = data.variant::<Kind>()?;
        let nested = ValueSeed {
            depth: self.depth + 1,
        };
        match kind {
            Kind::Null => variant.unit_variant().map(|()| Value::Null),
            Kind::Bool => variant.newtype_variant().map(Value::Bool),
            Kind::Int => variant.newtype_variant().map(Value::Int),
            Kind::Float => variant.newtype_variant().map(Value::Float),
            Kind::Text => variant.newtype_variant().map(Value::Text),
            Kind::Bytes => variant.newtype_variant().map(Value::Bytes),
            Kind::List => variant.newtype_variant_seed(ListSeed(nested)).map(Value::List),
            Kind::Map => variant.newtype_variant_seed(MapSeed(nested)).map(Value::Map),
            Kind::Node => variant
                .newtype_variant_seed(MapSeed(nested))
                .map(|entries| Value::Node(Node::from_snapshot(entries))),
        }
    }
}

struct ListSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = Vec<Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Vec<Value>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed {
    type Value = Vec<Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of archive values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Vec<Value>, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(PREALLOCATION_LIMIT));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

struct MapSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<BTreeMap<String, Value>, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed {
    type Value = BTreeMap<String, Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of archive values")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut map: A,
    ) -> std::result::Result<BTreeMap<String, Value>, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(self.0)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }
}

/// A branch of the archive tree.
///
/// A `Node` exclusively owns its children; there is no sharing between
/// branches and no way to build a cycle.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Node {
    entries: BTreeMap<String, Value>,
    /// Creation time of the archive this tree was loaded from
    #[serde(skip)]
    created_at: Option<DateTime<Utc>>,
}

impl Node {
    /// Create an empty node
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tree from a verified snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            entries: snapshot,
            created_at: None,
        }
    }

    /// When the archive backing this tree was first saved, if it has been saved
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub(crate) fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.created_at = Some(created_at);
    }

    /// Check every value in the tree the way [`Node::set`] does.
    ///
    /// Values handed out through [`Node::get`] and [`Node::get_path`] can be
    /// overwritten without validation, so encoding runs this first.
    ///
    /// # Errors
    /// `PakError::NotSerializable` naming the first offending path.
    pub fn validate(&self) -> Result<()> {
        self.validate_at("", 0)
    }

    fn validate_at(&self, prefix: &str, depth: usize) -> Result<()> {
        self.entries
            .iter()
            .try_for_each(|(k, v)| v.validate_at(&path_key::child(prefix, k), depth + 1))
    }

    /// Take a copy of the tree's state for encoding
    pub fn to_snapshot(&self) -> Snapshot {
        self.entries.clone()
    }

    /// Return the value at `key`, creating an empty child node if it is absent.
    pub fn get(&mut self, key: &str) -> &mut Value {
        self.entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Node(Node::new()))
    }

    /// Return the child node at `key`, creating it if it is absent.
    ///
    /// # Errors
    /// `PakError::PathConflict` if a leaf value occupies `key`.
    pub fn child(&mut self, key: &str) -> Result<&mut Node> {
        match self.get(key) {
            Value::Node(node) => Ok(node),
            _ => Err(PakError::PathConflict(key.to_string())),
        }
    }

    /// Resolve a dotted path, creating every missing node along the way.
    ///
    /// An absent path yields a freshly created empty node, just like [`Node::get`].
    ///
    /// # Errors
    /// `PakError::PathConflict` if a branch segment holds a leaf value.
    pub fn get_path(&mut self, path: &str) -> Result<&mut Value> {
        let (branches, leaf) = path_key::split(path);
        let node = self.resolve_branches(&branches)?;
        Ok(node.get(leaf))
    }

    fn resolve_branches(&mut self, branches: &[&str]) -> Result<&mut Node> {
        let mut node = self;
        for (depth, segment) in branches.iter().enumerate() {
            let current = node;
            node = match current.get(segment) {
                Value::Node(child) => child,
                _ => return Err(PakError::PathConflict(path_key::join(&branches[..=depth]))),
            };
        }
        Ok(node)
    }

    /// Read a value without creating anything
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Read the value at a dotted path without creating anything
    pub fn lookup_path(&self, path: &str) -> Option<&Value> {
        let (branches, leaf) = path_key::split(path);
        let mut node = self;
        for segment in branches {
            node = node.entries.get(segment)?.as_node()?;
        }
        node.entries.get(leaf)
    }

    /// Store a value at `key`.
    ///
    /// # Errors
    /// `PakError::NotSerializable` if the value cannot be encoded faithfully.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        value.validate(key)?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    /// Store a value at a dotted path, creating intermediate nodes.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        value.validate(path)?;
        let (branches, leaf) = path_key::split(path);
        let node = self.resolve_branches(&branches)?;
        node.entries.insert(leaf.to_string(), value);
        Ok(())
    }

    /// Store any serde-serializable value at `key`.
    ///
    /// Structs and maps are stored as plain [`Value::Map`] leaves.
    pub fn set_serde<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value =
            Value::from_serde(value).ok_or_else(|| PakError::NotSerializable(key.to_string()))?;
        self.set(key, value)
    }

    /// Return the value at `key`, inserting `default` first if it is absent.
    pub fn set_default(&mut self, key: &str, default: impl Into<Value>) -> Result<&mut Value> {
        let default = default.into();
        default.validate(key)?;
        Ok(self.entries.entry(key.to_string()).or_insert(default))
    }

    /// Remove `key` from this node.
    ///
    /// # Errors
    /// `PakError::KeyNotFound` if the key is absent.
    pub fn delete(&mut self, key: &str) -> Result<Value> {
        self.entries
            .remove(key)
            .ok_or_else(|| PakError::KeyNotFound(key.to_string()))
    }

    /// Remove the value at a dotted path, then cull the whole tree.
    ///
    /// Missing branches are not created.
    pub fn delete_path(&mut self, path: &str) -> Result<Value> {
        let (branches, leaf) = path_key::split(path);
        let removed = {
            let mut node = &mut *self;
            for segment in &branches {
                let current = node;
                node = match current.entries.get_mut(*segment) {
                    Some(Value::Node(child)) => child,
                    _ => return Err(PakError::KeyNotFound(path.to_string())),
                };
            }
            node.entries
                .remove(leaf)
                .ok_or_else(|| PakError::KeyNotFound(path.to_string()))?
        };
        debug!(path, "Deleted path from archive");
        self.cull();
        Ok(removed)
    }

    /// Check for `key` without creating it
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Check for a dotted path without creating any part of it
    pub fn contains_path(&self, path: &str) -> bool {
        self.lookup_path(path).is_some()
    }

    /// Remove every descendant node that is empty once its own children are culled.
    pub fn cull(&mut self) -> &mut Self {
        self.entries.retain(|_, value| match value {
            Value::Node(child) => !child.cull().is_empty(),
            _ => true,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Convert the tree into plain nested mappings, with no node behavior left
    pub fn to_nested_mapping(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_plain()))
            .collect()
    }

    /// Map every non-node leaf to its dotted path.
    ///
    /// Empty branches contribute nothing.
    pub fn flatten(&self) -> BTreeMap<String, Value> {
        let mut flat = BTreeMap::new();
        self.flatten_into("", &mut flat);
        flat
    }

    fn flatten_into(&self, prefix: &str, flat: &mut BTreeMap<String, Value>) {
        for (key, value) in &self.entries {
            let path = path_key::child(prefix, key);
            match value {
                Value::Node(child) => child.flatten_into(&path, flat),
                leaf => {
                    flat.insert(path, leaf.clone());
                }
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match value {
                Value::Node(child) => {
                    write!(f, "{:indent$}{key}:", "")?;
                    if !child.is_empty() {
                        writeln!(f)?;
                        child.fmt_indented(f, indent + 4)?;
                    }
                }
                leaf => write!(f, "{:indent$}{key}: {leaf}", "")?,
            }
        }
        Ok(())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl PartialEq<BTreeMap<String, Value>> for Node {
    fn eq(&self, other: &BTreeMap<String, Value>) -> bool {
        &self.entries == other
    }
}

impl PartialEq<Node> for BTreeMap<String, Value> {
    fn eq(&self, other: &Node) -> bool {
        other == self
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<PAK ")?;
        f.debug_map().entries(self.entries.iter()).finish()?;
        write!(f, ">")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
