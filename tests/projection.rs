use std::collections::BTreeSet;

use propcell::{assoc_in, lookup, merge_restricted, project, select, update_in};
use propcell::{keys, path, vmap, vseq};
use propcell::{Key, Value};

fn key_set<I>(keys: I) -> BTreeSet<Key>
where
	I: IntoIterator<Item = Key>,
{
	keys.into_iter().collect()
}

#[test]
fn select_walks_nested_paths() {
	let value = vmap! {
		"user" => vmap! { "name" => "A" },
		"tags" => vseq!["x", "y"],
	};

	assert_eq!(select(&value, &path!["user", "name"]), Value::from("A"));
	assert_eq!(select(&value, &path!["tags", 1usize]), Value::from("y"));
	assert_eq!(select(&value, &[]), value);
}

#[test]
fn select_missing_segment_is_nil() {
	let value = vmap! { "user" => vmap! { "name" => "A" } };

	assert!(select(&value, &path!["user", "age"]).is_nil());
	assert!(select(&value, &path!["missing", "deeper", "still"]).is_nil());
	// Walking through a scalar is a miss, not a failure.
	assert!(select(&value, &path!["user", "name", "x"]).is_nil());
}

#[test]
fn project_restricts_to_keys() {
	let value = vmap! { "a" => 1, "b" => 2, "c" => 3 };
	let keys = key_set(keys!["a", "c", "z"]);

	assert_eq!(project(&value, &keys), vmap! { "a" => 1, "c" => 3 });
	assert_eq!(project(&Value::Nil, &keys), vmap! {});
	assert_eq!(project(&Value::from(5), &keys), vmap! {});
}

#[test]
fn lookup_combines_path_and_keys() {
	let value = vmap! { "user" => vmap! { "name" => "A", "age" => 3 } };
	let keys = key_set(keys!["name"]);

	assert_eq!(
		lookup(&value, Some(&path!["user"]), Some(&keys)),
		vmap! { "name" => "A" }
	);
	assert_eq!(lookup(&value, None, None), value);
}

#[test]
fn merge_restricted_ignores_unrelated_keys() {
	let target = vmap! { "a" => 1, "b" => 2 };
	let source = vmap! { "a" => 10, "b" => 20, "c" => 30 };
	let keys = key_set(keys!["a", "c"]);

	assert_eq!(
		merge_restricted(&target, &keys, &source),
		vmap! { "a" => 10, "b" => 2, "c" => 30 }
	);

	// Restricted keys absent from the source stay as they were.
	let sparse = vmap! { "c" => 30 };
	assert_eq!(
		merge_restricted(&target, &keys, &sparse),
		vmap! { "a" => 1, "b" => 2, "c" => 30 }
	);

	// A non-map target is an empty map.
	assert_eq!(
		merge_restricted(&Value::Nil, &keys, &source),
		vmap! { "a" => 10, "c" => 30 }
	);
}

#[test]
fn assoc_in_creates_missing_intermediates() {
	let value = vmap! {};

	let deep = assoc_in(&value, &path!["a", "b", "c"], Value::from(1));
	assert_eq!(
		deep,
		vmap! { "a" => vmap! { "b" => vmap! { "c" => 1 } } }
	);

	// Index keys shape sequences, padded with Nil.
	let padded = assoc_in(&vmap! {}, &path!["xs", 2usize], Value::from("z"));
	assert_eq!(
		padded,
		vmap! { "xs" => Value::seq([Value::Nil, Value::Nil, Value::from("z")]) }
	);
}

#[test]
fn assoc_in_replaces_within_sequences() {
	let value = vmap! { "xs" => vseq![1, 2, 3] };

	assert_eq!(
		assoc_in(&value, &path!["xs", 1usize], Value::from(20)),
		vmap! { "xs" => vseq![1, 20, 3] }
	);
}

#[test]
fn update_in_passes_nil_for_missing_locations() {
	let value = vmap! {};

	let updated = update_in(&value, &path!["n"], |current| {
		assert!(current.is_nil());
		Value::from(1)
	});

	assert_eq!(updated, vmap! { "n" => 1 });
}

#[test]
fn writes_share_unchanged_subtrees() {
	let old = vmap! {
		"a" => vmap! { "x" => 1 },
		"b" => vmap! { "y" => 2 },
	};

	let new = assoc_in(&old, &path!["a", "x"], Value::from(10));

	assert_eq!(select(&new, &path!["a", "x"]), Value::from(10));
	assert!(Value::identical(
		&select(&old, &path!["b"]),
		&select(&new, &path!["b"]),
	));
}
