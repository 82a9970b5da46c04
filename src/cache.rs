use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fxhash::FxHashMap;

use crate::path::{KeySet, PropertyPath};
use crate::property::PropertyBody;

/// Identity of a derived property within one store family. Path and
/// key set compare by value, so equal addresses map to one entry no
/// matter which property requested them.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
	path: Option<PropertyPath>,
	keys: Option<KeySet>,
}

impl CacheKey {
	pub(crate) fn new(path: Option<PropertyPath>, keys: Option<KeySet>) -> Self {
		CacheKey { path, keys }
	}
}

/// The canonical cache of one property family. Holds only weak
/// handles: a property lives exactly as long as external code keeps a
/// strong handle to it. Dead entries are purged lazily, on the next
/// lookup of their key.
#[derive(Default)]
pub(crate) struct PropertyCache {
	map: RefCell<FxHashMap<CacheKey, Weak<PropertyBody>>>,
}

impl PropertyCache {
	pub(crate) fn get(&self, key: &CacheKey) -> Option<Rc<PropertyBody>> {
		let mut map = self.map.borrow_mut();

		match map.get(key) {
			Some(weak) => match weak.upgrade() {
				Some(body) => Some(body),
				None => {
					map.remove(key);
					None
				}
			},
			None => None,
		}
	}

	pub(crate) fn insert(&self, key: CacheKey, body: Weak<PropertyBody>) {
		self.map.borrow_mut().insert(key, body);
	}
}
