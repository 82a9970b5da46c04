use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use std::rc::Rc;

/// An accessor key: a named map entry or a sequence index.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
	Str(Rc<str>),
	Index(usize),
}

impl From<&str> for Key {
	fn from(value: &str) -> Self {
		Key::Str(Rc::from(value))
	}
}

impl From<String> for Key {
	fn from(value: String) -> Self {
		Key::Str(Rc::from(value.as_str()))
	}
}

impl From<usize> for Key {
	fn from(value: usize) -> Self {
		Key::Index(value)
	}
}

impl Display for Key {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Key::Str(s) => write!(f, "{}", s),
			Key::Index(i) => write!(f, "{}", i),
		}
	}
}

impl Debug for Key {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

/// One immutable whole-state value. Clones are cheap: collection
/// variants share their contents through `Rc`, and every "modifying"
/// operation in [`crate::path`] builds a new tree that shares all
/// unchanged subtrees with the old one.
#[derive(Clone)]
pub enum Value {
	Nil,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(Rc<str>),
	Seq(Rc<Vec<Value>>),
	Map(Rc<BTreeMap<Key, Value>>),
}

impl Value {
	pub fn map<K, I>(entries: I) -> Value
	where
		K: Into<Key>,
		I: IntoIterator<Item = (K, Value)>,
	{
		Value::Map(Rc::new(
			entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
		))
	}

	pub fn seq<I>(items: I) -> Value
	where
		I: IntoIterator<Item = Value>,
	{
		Value::Seq(Rc::new(items.into_iter().collect()))
	}

	/// Identity comparison: pointer equality for the shared variants,
	/// value equality for scalars. A `true` result implies value
	/// equality; `false` says nothing.
	pub fn identical(a: &Value, b: &Value) -> bool {
		match (a, b) {
			(Value::Nil, Value::Nil) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
			(Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
			(Value::Seq(a), Value::Seq(b)) => Rc::ptr_eq(a, b),
			(Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	pub fn is_nil(&self) -> bool {
		matches!(self, Value::Nil)
	}

	/// Child value under `key`, for maps and (index-keyed) sequences.
	pub fn entry(&self, key: &Key) -> Option<&Value> {
		match (self, key) {
			(Value::Map(map), key) => map.get(key),
			(Value::Seq(seq), Key::Index(index)) => seq.get(*index),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&BTreeMap<Key, Value>> {
		match self {
			Value::Map(map) => Some(map),
			_ => None,
		}
	}

	pub fn as_seq(&self) -> Option<&[Value]> {
		match self {
			Value::Seq(seq) => Some(seq),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		if Value::identical(self, other) {
			return true;
		}

		match (self, other) {
			(Value::Str(a), Value::Str(b)) => a == b,
			(Value::Seq(a), Value::Seq(b)) => a == b,
			(Value::Map(a), Value::Map(b)) => a == b,
			(Value::Float(a), Value::Float(b)) => a == b,
			_ => false,
		}
	}
}

impl Default for Value {
	fn default() -> Self {
		Value::Nil
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Value::Int(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Float(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Str(Rc::from(value))
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Str(Rc::from(value.as_str()))
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Nil => write!(f, "nil"),
			Value::Bool(b) => write!(f, "{}", b),
			Value::Int(i) => write!(f, "{}", i),
			Value::Float(x) => write!(f, "{}", x),
			Value::Str(s) => write!(f, "{:?}", s),
			Value::Seq(seq) => {
				write!(f, "[")?;
				for (i, item) in seq.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}", item)?;
				}
				write!(f, "]")
			}
			Value::Map(map) => {
				write!(f, "{{")?;
				for (i, (key, value)) in map.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}: {}", key, value)?;
				}
				write!(f, "}}")
			}
		}
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
