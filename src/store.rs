use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::cache::PropertyCache;
use crate::property::Property;
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WatcherId(u64);

type Watcher = (WatcherId, Rc<dyn Fn(&Value, &Value)>);

/// The root cell: a single atomically swapped reference to the
/// current snapshot, with synchronous watch notification.
///
/// `Store` is a cheap cloneable handle; all clones address the same
/// cell. Watchers fire after every swap where the old and new
/// snapshots are not identical, in registration order, on the calling
/// thread, before the triggering operation returns.
pub struct Store {
	body: Rc<StoreBody>,
}

pub(crate) struct StoreBody {
	snapshot: RefCell<Value>,
	// Bumped on every swap; catches reentrant swaps from inside an
	// update closure in debug builds.
	generation: Cell<u64>,
	watchers: RefCell<SmallVec<[Watcher; 4]>>,
	next_watcher: Cell<u64>,
	cache: PropertyCache,
}

impl Clone for Store {
	fn clone(&self) -> Self {
		Store {
			body: self.body.clone(),
		}
	}
}

impl Store {
	pub fn new(initial: Value) -> Self {
		Store {
			body: Rc::new(StoreBody {
				snapshot: RefCell::new(initial),
				generation: Cell::new(0),
				watchers: RefCell::new(SmallVec::new()),
				next_watcher: Cell::new(0),
				cache: PropertyCache::default(),
			}),
		}
	}

	/// Current snapshot. The returned value is immutable; holding it
	/// never observes later swaps.
	pub fn read(&self) -> Value {
		self.body.snapshot.borrow().clone()
	}

	/// Swaps the snapshot to `f(current)` and returns the new value.
	/// `f` must be pure: it may be handed the snapshot at any moment
	/// and must not touch this store. A swap performed from inside `f`
	/// would be lost and is asserted against in debug builds.
	pub fn update(&self, f: impl FnOnce(&Value) -> Value) -> Value {
		let generation = self.body.generation.get();
		let old = self.read();
		let new = f(&old);
		debug_assert_eq!(
			generation,
			self.body.generation.get(),
			"store swapped reentrantly from inside an update closure"
		);
		self.body.generation.set(generation.wrapping_add(1));
		*self.body.snapshot.borrow_mut() = new.clone();
		self.notify(&old, &new);
		new
	}

	/// Swaps the snapshot to `value` unconditionally.
	pub fn replace(&self, value: Value) -> Value {
		self.update(|_| value)
	}

	pub fn watch(&self, f: impl Fn(&Value, &Value) + 'static) -> WatcherId {
		let id = WatcherId(self.body.next_watcher.get());
		self.body.next_watcher.set(id.0 + 1);
		self.body.watchers.borrow_mut().push((id, Rc::new(f)));
		id
	}

	pub fn unwatch(&self, id: WatcherId) {
		self.body
			.watchers
			.borrow_mut()
			.retain(|(watcher, _)| *watcher != id);
	}

	/// The `(no path, no restriction)` property of this store,
	/// canonicalized through the family cache like any derived one.
	pub fn root_property(&self) -> Property {
		Property::resolve(self, None, None, None)
	}

	pub(crate) fn cache(&self) -> &PropertyCache {
		&self.body.cache
	}

	pub(crate) fn id(&self) -> usize {
		Rc::as_ptr(&self.body) as *const () as usize
	}

	pub fn ptr_eq(a: &Store, b: &Store) -> bool {
		Rc::ptr_eq(&a.body, &b.body)
	}

	fn notify(&self, old: &Value, new: &Value) {
		if Value::identical(old, new) {
			return;
		}

		// Snapshot the list: watchers may register or unregister from
		// inside a callback. Anyone unregistered mid-pass is skipped.
		let watchers: SmallVec<[Watcher; 4]> = self.body.watchers.borrow().clone();
		for (id, watcher) in watchers {
			let live = self
				.body
				.watchers
				.borrow()
				.iter()
				.any(|(current, _)| *current == id);
			if live {
				watcher(old, new);
			}
		}
	}
}

impl std::fmt::Debug for Store {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Store {:x} {}", self.id(), self.body.snapshot.borrow())
	}
}
