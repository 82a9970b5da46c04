//! Pure projection and rebuild helpers over [`Value`] trees.
//!
//! Everything here is stateless: reads never fail (a missing segment
//! projects to [`Value::Nil`]) and writes return a new tree sharing
//! every unchanged subtree with the input.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::value::{Key, Value};

/// Ordered accessor sequence locating a sub-value within a snapshot.
pub type PropertyPath = Rc<[Key]>;

/// Unordered key set narrowing the visible surface of a map.
pub type KeySet = Rc<BTreeSet<Key>>;

/// Walks `path` from `value`, yielding the located sub-value or
/// `Value::Nil` when any segment is absent.
pub fn select(value: &Value, path: &[Key]) -> Value {
	let mut current = value.clone();
	for key in path {
		let next = match current.entry(key) {
			Some(child) => child.clone(),
			None => return Value::Nil,
		};
		current = next;
	}
	current
}

/// Restricts `value` to the entries named by `keys`. Anything that is
/// not a map projects to an empty map.
pub fn project(value: &Value, keys: &BTreeSet<Key>) -> Value {
	let mut restricted = BTreeMap::new();
	if let Some(map) = value.as_map() {
		for key in keys {
			if let Some(child) = map.get(key) {
				restricted.insert(key.clone(), child.clone());
			}
		}
	}
	Value::Map(Rc::new(restricted))
}

/// `project(select(value, path), keys)`, with both the path and the
/// restriction optional.
pub fn lookup(value: &Value, path: Option<&[Key]>, keys: Option<&BTreeSet<Key>>) -> Value {
	let selected = match path {
		Some(path) => select(value, path),
		None => value.clone(),
	};

	match keys {
		Some(keys) => project(&selected, keys),
		None => selected,
	}
}

/// Merges into `target` only those entries of `source` whose key is in
/// `keys`, leaving every other entry of `target` untouched. A non-map
/// `target` is treated as an empty map.
pub fn merge_restricted(target: &Value, keys: &BTreeSet<Key>, source: &Value) -> Value {
	let mut merged = match target.as_map() {
		Some(map) => map.clone(),
		None => BTreeMap::new(),
	};

	if let Some(source) = source.as_map() {
		for key in keys {
			if let Some(child) = source.get(key) {
				merged.insert(key.clone(), child.clone());
			}
		}
	}

	Value::Map(Rc::new(merged))
}

/// Rebuilds `value` with `new` placed at `path`, creating missing
/// intermediates along the way: maps for named keys, Nil-padded
/// sequences for index keys. An empty path yields `new` itself.
pub fn assoc_in(value: &Value, path: &[Key], new: Value) -> Value {
	match path.split_first() {
		None => new,
		Some((key, rest)) => {
			let child = value.entry(key).cloned().unwrap_or(Value::Nil);
			let rebuilt = assoc_in(&child, rest, new);
			assoc_key(value, key, rebuilt)
		}
	}
}

/// Applies `f` to the sub-value at `path` (Nil when absent) and writes
/// the result back.
pub fn update_in(value: &Value, path: &[Key], f: impl FnOnce(Value) -> Value) -> Value {
	let current = select(value, path);
	assoc_in(value, path, f(current))
}

fn assoc_key(value: &Value, key: &Key, child: Value) -> Value {
	match (value, key) {
		(Value::Map(map), key) => {
			let mut map = BTreeMap::clone(map);
			map.insert(key.clone(), child);
			Value::Map(Rc::new(map))
		}
		(Value::Seq(seq), Key::Index(index)) => {
			let mut seq = Vec::clone(seq);
			if *index >= seq.len() {
				seq.resize(*index + 1, Value::Nil);
			}
			seq[*index] = child;
			Value::Seq(Rc::new(seq))
		}
		// The location is absent or holds a scalar: a fresh collection
		// shaped by the key takes its place.
		(_, Key::Index(index)) => {
			let mut seq = vec![Value::Nil; *index + 1];
			seq[*index] = child;
			Value::Seq(Rc::new(seq))
		}
		(_, key) => Value::map([(key.clone(), child)]),
	}
}
