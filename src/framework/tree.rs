//! Schema-typed attribute trees.
//!
//! Config, state and plan are all represented as a [`Tree`]: an object of
//! named [`AttrValue`]s. Leaves are tri-state (Null, Unknown or a concrete
//! value). Resource models convert to and from trees through [`TreeModel`],
//! and individual leaves through [`Attr`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::diag::{Diagnostics, REPORT_TO_MAINTAINERS};
use super::path::{AttributePath, PathStep};
use super::value::Value;

static NULL_VALUE: AttrValue = AttrValue::Null;

// ============================================================================
// Types
// ============================================================================

/// The declared type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// UTF-8 string.
    String,
    /// Ordered list of one element type.
    List(Box<AttrType>),
    /// Unordered set of one element type.
    Set(Box<AttrType>),
    /// Object with named, typed attributes.
    Object(BTreeMap<String, AttrType>),
}

impl AttrType {
    /// List of `element`.
    #[must_use]
    pub fn list(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Set of `element`.
    #[must_use]
    pub fn set(element: Self) -> Self {
        Self::Set(Box::new(element))
    }

    /// Object from `(name, type)` pairs.
    #[must_use]
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Object(attributes.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int64 => write!(f, "number"),
            Self::Float64 => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::List(element) => write!(f, "list of {element}"),
            Self::Set(element) => write!(f, "set of {element}"),
            Self::Object(_) => write!(f, "object"),
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// A dynamically typed, tri-state attribute value.
#[derive(Debug, Clone, Default)]
pub enum AttrValue {
    /// Explicitly absent.
    #[default]
    Null,
    /// Known only after the next apply.
    Unknown,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    String(String),
    /// Ordered elements.
    List(Vec<AttrValue>),
    /// Unordered, unique elements.
    Set(Vec<AttrValue>),
    /// Nested object.
    Object(Tree),
}

impl PartialEq for AttrValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Unknown, Self::Unknown) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl AttrValue {
    /// Returns true for Null.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for Unknown.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns true when the value is neither Null nor Unknown.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !self.is_null() && !self.is_unknown()
    }

    /// Returns true when no Unknown appears anywhere inside the value.
    #[must_use]
    pub fn is_fully_known(&self) -> bool {
        match self {
            Self::Unknown => false,
            Self::List(items) | Self::Set(items) => items.iter().all(Self::is_fully_known),
            Self::Object(tree) => tree.is_fully_known(),
            _ => true,
        }
    }

    /// Short human-readable name of the value's kind.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Bool(_) => "bool",
            Self::Int(_) => "number",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Object(_) => "object",
        }
    }

    /// String contents, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer contents, if this is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Nested object, if this is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Tree> {
        match self {
            Self::Object(tree) => Some(tree),
            _ => None,
        }
    }

    /// Elements, if this is a list or set.
    #[must_use]
    pub fn as_elements(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Returns true when the value fits `ty`. Null and Unknown fit any type.
    #[must_use]
    pub fn conforms_to(&self, ty: &AttrType) -> bool {
        match (self, ty) {
            (Self::Null | Self::Unknown, _)
            | (Self::Bool(_), AttrType::Bool)
            | (Self::Int(_), AttrType::Int64 | AttrType::Float64)
            | (Self::Float(_), AttrType::Float64)
            | (Self::String(_), AttrType::String) => true,
            (Self::List(items), AttrType::List(element))
            | (Self::Set(items), AttrType::Set(element)) => {
                items.iter().all(|item| item.conforms_to(element))
            }
            (Self::Object(tree), AttrType::Object(types)) => tree.conforms_to(types),
            _ => false,
        }
    }

    /// Converts to JSON. Returns `None` if any part of the value is Unknown.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        Some(match self {
            Self::Null => serde_json::Value::Null,
            Self::Unknown => return None,
            Self::Bool(v) => serde_json::Value::Bool(*v),
            Self::Int(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(v) => serde_json::Value::String(v.clone()),
            Self::List(items) | Self::Set(items) => serde_json::Value::Array(
                items.iter().map(Self::to_json).collect::<Option<Vec<_>>>()?,
            ),
            Self::Object(tree) => tree.to_json()?,
        })
    }

    /// Decodes a JSON value against `ty`, reporting mismatches at `path`.
    pub fn from_json(
        json: &serde_json::Value,
        ty: &AttrType,
        path: &AttributePath,
        diags: &mut Diagnostics,
    ) -> Self {
        Self::from_json_resolving(json, ty, path, diags, &mut |_, _| None)
    }

    /// Like [`AttrValue::from_json`], but every JSON string is first offered
    /// to `resolve`. A `Some` result replaces the string, which is how
    /// references to other resources are substituted.
    pub fn from_json_resolving(
        json: &serde_json::Value,
        ty: &AttrType,
        path: &AttributePath,
        diags: &mut Diagnostics,
        resolve: &mut dyn FnMut(&str, &AttributePath) -> Option<Self>,
    ) -> Self {
        use serde_json::Value as Json;

        if let Json::String(s) = json {
            if let Some(value) = resolve(s, path) {
                if !value.conforms_to(ty) {
                    type_mismatch(path, ty, diags);
                    return Self::Null;
                }
                return value;
            }
        }

        match (json, ty) {
            (Json::Null, _) => Self::Null,
            (Json::Bool(v), AttrType::Bool) => Self::Bool(*v),
            (Json::Number(n), AttrType::Int64) => n.as_i64().map_or_else(
                || {
                    type_mismatch(path, ty, diags);
                    Self::Null
                },
                Self::Int,
            ),
            (Json::Number(n), AttrType::Float64) => n.as_f64().map_or(Self::Null, Self::Float),
            (Json::String(s), AttrType::String) => Self::String(s.clone()),
            (Json::Array(items), AttrType::List(element)) => Self::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        Self::from_json_resolving(item, element, &path.at_index(i), diags, resolve)
                    })
                    .collect(),
            ),
            (Json::Array(items), AttrType::Set(element)) => {
                let mut elements: Vec<Self> = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let value =
                        Self::from_json_resolving(item, element, &path.at_index(i), diags, resolve);
                    if value.is_known() && elements.contains(&value) {
                        diags.add_attribute_error(
                            &path.at_index(i),
                            "Duplicate Set Element",
                            "This attribute contains duplicate values.",
                        );
                        continue;
                    }
                    elements.push(value);
                }
                Self::Set(elements)
            }
            (Json::Object(_), AttrType::Object(types)) => {
                Self::Object(Tree::from_json_resolving(json, types, path, diags, resolve))
            }
            _ => {
                type_mismatch(path, ty, diags);
                Self::Null
            }
        }
    }
}

fn type_mismatch(path: &AttributePath, ty: &AttrType, diags: &mut Diagnostics) {
    diags.add_attribute_error(
        path,
        "Incorrect attribute value type",
        format!("Inappropriate value for attribute \"{path}\": {ty} required."),
    );
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Tree> for AttrValue {
    fn from(value: Tree) -> Self {
        Self::Object(value)
    }
}

// ============================================================================
// Tree
// ============================================================================

/// An object of named attribute values, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree(BTreeMap<String, AttrValue>);

impl Tree {
    /// Creates an empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Returns the attribute value, Null when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> &AttrValue {
        self.0.get(name).unwrap_or(&NULL_VALUE)
    }

    /// Returns the attribute value when present.
    #[must_use]
    pub fn get_opt(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    /// Removes an attribute.
    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        self.0.remove(name)
    }

    /// Iterates over attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    /// Number of attributes present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no attribute is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true when no Unknown appears anywhere in the tree.
    #[must_use]
    pub fn is_fully_known(&self) -> bool {
        self.0.values().all(AttrValue::is_fully_known)
    }

    /// Returns true when every present attribute is declared and fits its type.
    #[must_use]
    pub fn conforms_to(&self, types: &BTreeMap<String, AttrType>) -> bool {
        self.0.iter().all(|(name, value)| {
            types.get(name).is_some_and(|ty| value.conforms_to(ty))
        })
    }

    /// Reports every attribute that does not fit `types` as a provider bug.
    pub fn check_types(
        &self,
        types: &BTreeMap<String, AttrType>,
        path: &AttributePath,
        diags: &mut Diagnostics,
    ) {
        for (name, value) in &self.0 {
            let attr_path = path.at_name(name.clone());
            match types.get(name) {
                Some(ty) if value.conforms_to(ty) => {}
                Some(ty) => diags.add_attribute_error(
                    &attr_path,
                    "Value Conversion Error",
                    format!(
                        "Expected {ty} but the provider produced {}.  {REPORT_TO_MAINTAINERS}",
                        value.type_name()
                    ),
                ),
                None => diags.add_attribute_error(
                    &attr_path,
                    "Value Conversion Error",
                    format!("The provider produced an undeclared attribute.  {REPORT_TO_MAINTAINERS}"),
                ),
            }
        }
    }

    /// Looks up the value at `path`. Missing values are Null; anything below
    /// an Unknown is Unknown.
    #[must_use]
    pub fn value_at(&self, path: &AttributePath) -> AttrValue {
        let mut steps = path.steps().iter();
        let mut current = match steps.next() {
            Some(PathStep::Name(name)) => self.get(name),
            Some(PathStep::Index(_)) => return AttrValue::Null,
            None => return AttrValue::Object(self.clone()),
        };

        for step in steps {
            current = match (current, step) {
                (AttrValue::Unknown, _) => return AttrValue::Unknown,
                (AttrValue::Object(tree), PathStep::Name(name)) => tree.get(name),
                (AttrValue::List(items) | AttrValue::Set(items), PathStep::Index(index)) => {
                    items.get(*index).unwrap_or(&NULL_VALUE)
                }
                _ => return AttrValue::Null,
            };
        }
        current.clone()
    }

    /// Replaces the value at `path`. Returns false when an intermediate
    /// value is missing or of the wrong shape.
    pub fn set_at(&mut self, path: &AttributePath, value: AttrValue) -> bool {
        let Some((PathStep::Name(first), rest)) = path.steps().split_first() else {
            return false;
        };
        if rest.is_empty() {
            self.0.insert(first.clone(), value);
            return true;
        }
        self.0
            .get_mut(first)
            .is_some_and(|child| set_in(child, rest, value))
    }

    /// Converts to a JSON object. Returns `None` if anything is Unknown.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.0 {
            map.insert(name.clone(), value.to_json()?);
        }
        Some(serde_json::Value::Object(map))
    }

    /// Decodes a JSON object against `types`.
    pub fn from_json(
        json: &serde_json::Value,
        types: &BTreeMap<String, AttrType>,
        path: &AttributePath,
        diags: &mut Diagnostics,
    ) -> Self {
        Self::from_json_resolving(json, types, path, diags, &mut |_, _| None)
    }

    /// Decodes a JSON object against `types`, substituting resolved strings.
    /// Declared attributes missing from the JSON are set to Null.
    pub fn from_json_resolving(
        json: &serde_json::Value,
        types: &BTreeMap<String, AttrType>,
        path: &AttributePath,
        diags: &mut Diagnostics,
        resolve: &mut dyn FnMut(&str, &AttributePath) -> Option<AttrValue>,
    ) -> Self {
        let mut tree = Self::new();
        let Some(object) = json.as_object() else {
            diags.add_attribute_error(
                path,
                "Incorrect attribute value type",
                "An object is required.",
            );
            return tree;
        };

        for key in object.keys() {
            if !types.contains_key(key) {
                diags.add_attribute_error(
                    &path.at_name(key.clone()),
                    "Unsupported argument",
                    format!("An argument named \"{key}\" is not expected here."),
                );
            }
        }

        for (name, ty) in types {
            let value = object.get(name).map_or(AttrValue::Null, |json| {
                AttrValue::from_json_resolving(json, ty, &path.at_name(name.clone()), diags, resolve)
            });
            tree.0.insert(name.clone(), value);
        }
        tree
    }

    // ------------------------------------------------------------------------
    // Typed access
    // ------------------------------------------------------------------------

    /// Reads a leaf attribute as a typed tri-state value.
    pub fn get_value<T: Attr>(
        &self,
        path: &AttributePath,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Value<T> {
        match self.get(name) {
            AttrValue::Null => Value::Null,
            AttrValue::Unknown => Value::Unknown,
            other => T::from_attr(other).map_or_else(
                || {
                    conversion_error(&path.at_name(name), &T::attr_type(), other, diags);
                    Value::Null
                },
                Value::Known,
            ),
        }
    }

    /// Writes a typed tri-state leaf.
    pub fn set_value<T: Attr>(&mut self, name: &str, value: Value<T>) {
        self.0.insert(name.to_string(), value.into_attr_value());
    }

    /// Reads a nested object attribute.
    pub fn get_object<M: TreeModel>(
        &self,
        path: &AttributePath,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Value<M> {
        let attr_path = path.at_name(name);
        match self.get(name) {
            AttrValue::Null => Value::Null,
            AttrValue::Unknown => Value::Unknown,
            AttrValue::Object(tree) => Value::Known(M::from_tree(tree, &attr_path, diags)),
            other => {
                conversion_error(&attr_path, &M::object_type(), other, diags);
                Value::Null
            }
        }
    }

    /// Writes a nested object attribute.
    pub fn set_object<M: TreeModel>(&mut self, name: &str, value: &Value<M>) {
        let attr = match value {
            Value::Null => AttrValue::Null,
            Value::Unknown => AttrValue::Unknown,
            Value::Known(model) => AttrValue::Object(model.to_tree()),
        };
        self.0.insert(name.to_string(), attr);
    }

    /// Reads a set (or list) of nested objects.
    pub fn get_object_set<M: TreeModel>(
        &self,
        path: &AttributePath,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Value<Vec<M>> {
        let attr_path = path.at_name(name);
        match self.get(name) {
            AttrValue::Null => Value::Null,
            AttrValue::Unknown => Value::Unknown,
            AttrValue::Set(items) | AttrValue::List(items) => {
                let mut models = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        AttrValue::Object(tree) => {
                            models.push(M::from_tree(tree, &attr_path.at_index(i), diags));
                        }
                        other => conversion_error(
                            &attr_path.at_index(i),
                            &M::object_type(),
                            other,
                            diags,
                        ),
                    }
                }
                Value::Known(models)
            }
            other => {
                conversion_error(&attr_path, &AttrType::set(M::object_type()), other, diags);
                Value::Null
            }
        }
    }

    /// Writes a set of nested objects.
    pub fn set_object_set<M: TreeModel>(&mut self, name: &str, value: &Value<Vec<M>>) {
        let attr = match value {
            Value::Null => AttrValue::Null,
            Value::Unknown => AttrValue::Unknown,
            Value::Known(models) => {
                AttrValue::Set(models.iter().map(|m| AttrValue::Object(m.to_tree())).collect())
            }
        };
        self.0.insert(name.to_string(), attr);
    }
}

fn set_in(target: &mut AttrValue, steps: &[PathStep], value: AttrValue) -> bool {
    let Some((step, rest)) = steps.split_first() else {
        *target = value;
        return true;
    };
    match (target, step) {
        (AttrValue::Object(tree), PathStep::Name(name)) => {
            if rest.is_empty() {
                tree.0.insert(name.clone(), value);
                true
            } else {
                tree.0
                    .get_mut(name)
                    .is_some_and(|child| set_in(child, rest, value))
            }
        }
        (AttrValue::List(items) | AttrValue::Set(items), PathStep::Index(index)) => items
            .get_mut(*index)
            .is_some_and(|child| set_in(child, rest, value)),
        _ => false,
    }
}

fn conversion_error(path: &AttributePath, ty: &AttrType, found: &AttrValue, diags: &mut Diagnostics) {
    diags.add_attribute_error(
        path,
        "Value Conversion Error",
        format!(
            "Expected {ty} but found {}.  {REPORT_TO_MAINTAINERS}",
            found.type_name()
        ),
    );
}

// ============================================================================
// Typed bridging traits
// ============================================================================

/// A native leaf type that maps onto a single attribute value.
pub trait Attr: Sized {
    /// The declared attribute type.
    fn attr_type() -> AttrType;

    /// Converts a known attribute value. Returns `None` on a type mismatch.
    fn from_attr(value: &AttrValue) -> Option<Self>;

    /// Converts into an attribute value.
    fn into_attr(self) -> AttrValue;
}

impl Attr for String {
    fn attr_type() -> AttrType {
        AttrType::String
    }

    fn from_attr(value: &AttrValue) -> Option<Self> {
        value.as_str().map(ToString::to_string)
    }

    fn into_attr(self) -> AttrValue {
        AttrValue::String(self)
    }
}

impl Attr for i64 {
    fn attr_type() -> AttrType {
        AttrType::Int64
    }

    fn from_attr(value: &AttrValue) -> Option<Self> {
        value.as_i64()
    }

    fn into_attr(self) -> AttrValue {
        AttrValue::Int(self)
    }
}

impl Attr for i32 {
    fn attr_type() -> AttrType {
        AttrType::Int64
    }

    fn from_attr(value: &AttrValue) -> Option<Self> {
        value.as_i64().and_then(|v| Self::try_from(v).ok())
    }

    fn into_attr(self) -> AttrValue {
        AttrValue::Int(i64::from(self))
    }
}

impl Attr for bool {
    fn attr_type() -> AttrType {
        AttrType::Bool
    }

    fn from_attr(value: &AttrValue) -> Option<Self> {
        value.as_bool()
    }

    fn into_attr(self) -> AttrValue {
        AttrValue::Bool(self)
    }
}

impl Attr for f64 {
    fn attr_type() -> AttrType {
        AttrType::Float64
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_attr(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as Self),
            _ => None,
        }
    }

    fn into_attr(self) -> AttrValue {
        AttrValue::Float(self)
    }
}

impl<T: Attr> Attr for Vec<T> {
    fn attr_type() -> AttrType {
        AttrType::list(T::attr_type())
    }

    fn from_attr(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::List(items) => items.iter().map(T::from_attr).collect(),
            _ => None,
        }
    }

    fn into_attr(self) -> AttrValue {
        AttrValue::List(self.into_iter().map(Attr::into_attr).collect())
    }
}

impl<T: Attr + Ord> Attr for BTreeSet<T> {
    fn attr_type() -> AttrType {
        AttrType::set(T::attr_type())
    }

    fn from_attr(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Set(items) => items.iter().map(T::from_attr).collect(),
            _ => None,
        }
    }

    fn into_attr(self) -> AttrValue {
        AttrValue::Set(self.into_iter().map(Attr::into_attr).collect())
    }
}

/// A typed model of an object-shaped tree, implemented by resource models
/// and their nested blocks.
pub trait TreeModel: Sized {
    /// Attribute types of the object.
    fn attr_types() -> BTreeMap<String, AttrType>;

    /// Decodes the model, reporting conversion problems relative to `path`.
    fn from_tree(tree: &Tree, path: &AttributePath, diags: &mut Diagnostics) -> Self;

    /// Encodes the model.
    fn to_tree(&self) -> Tree;

    /// The object type of the model.
    #[must_use]
    fn object_type() -> AttrType {
        AttrType::Object(Self::attr_types())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn types() -> BTreeMap<String, AttrType> {
        let mut types = BTreeMap::new();
        types.insert("name".to_string(), AttrType::String);
        types.insert("weight".to_string(), AttrType::Int64);
        types.insert("tags".to_string(), AttrType::set(AttrType::String));
        types
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let a = AttrValue::Set(vec![AttrValue::from("x"), AttrValue::from("y")]);
        let b = AttrValue::Set(vec![AttrValue::from("y"), AttrValue::from("x")]);
        assert_eq!(a, b);

        let c = AttrValue::List(vec![AttrValue::from("x"), AttrValue::from("y")]);
        let d = AttrValue::List(vec![AttrValue::from("y"), AttrValue::from("x")]);
        assert_ne!(c, d);
    }

    #[test]
    fn test_from_json_fills_missing_with_null() {
        let mut diags = Diagnostics::new();
        let tree = Tree::from_json(
            &json!({"name": "alpha"}),
            &types(),
            &AttributePath::empty(),
            &mut diags,
        );
        assert!(diags.is_empty());
        assert_eq!(tree.get("name"), &AttrValue::from("alpha"));
        assert!(tree.get("weight").is_null());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_from_json_reports_wrong_type_and_extra_keys() {
        let mut diags = Diagnostics::new();
        Tree::from_json(
            &json!({"name": 5, "colour": "blue"}),
            &types(),
            &AttributePath::empty(),
            &mut diags,
        );
        assert_eq!(diags.error_count(), 2);
        let paths: Vec<String> = diags
            .iter()
            .filter_map(|d| d.attribute.as_ref().map(ToString::to_string))
            .collect();
        assert!(paths.contains(&"name".to_string()));
        assert!(paths.contains(&"colour".to_string()));
    }

    #[test]
    fn test_from_json_resolving_substitutes_unknown() {
        let mut diags = Diagnostics::new();
        let tree = Tree::from_json_resolving(
            &json!({"name": "${pingone_risk_predictor.a.name}"}),
            &types(),
            &AttributePath::empty(),
            &mut diags,
            &mut |s, _| s.starts_with("${").then_some(AttrValue::Unknown),
        );
        assert!(diags.is_empty());
        assert!(tree.get("name").is_unknown());
        assert!(!tree.is_fully_known());
        assert!(tree.to_json().is_none());
    }

    #[test]
    fn test_value_at_and_set_at_nested() {
        let mut inner = Tree::new();
        inner.insert("min_score", 40_i64);
        let mut tree = Tree::new();
        tree.insert("threshold", inner);

        let path = AttributePath::root("threshold").at_name("min_score");
        assert_eq!(tree.value_at(&path), AttrValue::Int(40));
        assert!(tree.set_at(&path, AttrValue::Int(50)));
        assert_eq!(tree.value_at(&path), AttrValue::Int(50));
        assert!(tree.value_at(&AttributePath::root("missing").at_name("x")).is_null());
    }

    #[test]
    fn test_value_below_unknown_is_unknown() {
        let mut tree = Tree::new();
        tree.insert("threshold", AttrValue::Unknown);
        let path = AttributePath::root("threshold").at_name("min_score");
        assert!(tree.value_at(&path).is_unknown());
    }

    #[test]
    fn test_get_value_reports_conversion_error() {
        let mut tree = Tree::new();
        tree.insert("weight", "heavy");
        let mut diags = Diagnostics::new();
        let value: Value<i64> = tree.get_value(&AttributePath::empty(), "weight", &mut diags);
        assert!(value.is_null());
        assert!(diags.has_error());
        assert!(diags.iter().any(|d| d.detail.contains(REPORT_TO_MAINTAINERS)));
    }

    #[test]
    fn test_json_round_trip() {
        let mut diags = Diagnostics::new();
        let json = json!({"name": "alpha", "weight": 30, "tags": ["a", "b"]});
        let tree = Tree::from_json(&json, &types(), &AttributePath::empty(), &mut diags);
        assert_eq!(tree.to_json(), Some(json));
    }
}
