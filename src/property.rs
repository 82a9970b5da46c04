use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt::{Debug, Display};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::cache::CacheKey;
use crate::error::Error;
use crate::path::{self, KeySet, PropertyPath};
use crate::store::{Store, WatcherId};
use crate::trace::{self, Frame};
use crate::value::{Key, Value};
use crate::{ListenerId, Observable};

/// Which side is driving the in-flight update: a `set_value` on this
/// property, or a snapshot change arriving through the store watcher.
/// Always `Nobody` between operations; reset on every exit path.
#[derive(Clone, Copy, PartialEq, Eq)]
enum UpdateAuthority {
	Nobody,
	Property,
	Cell,
}

type InvalidationListener = Rc<dyn Fn(&Property)>;
type ChangeListener = Rc<dyn Fn(&Property, &Value, &Value)>;

/// An observable, writable window into one store: the sub-value at
/// `path`, optionally restricted to `keys`.
///
/// `Property` is a cheap cloneable handle. Handles compare by
/// identity, and the family cache guarantees that equal
/// `(path, key set)` requests against the same store resolve to the
/// identical underlying object, so every consumer of one address
/// shares one set of listeners.
pub struct Property {
	body: Rc<PropertyBody>,
}

pub(crate) struct PropertyBody {
	store: Store,
	path: Option<PropertyPath>,
	keys: Option<KeySet>,
	parent: Option<Weak<PropertyBody>>,
	authority: Cell<UpdateAuthority>,
	watcher: Cell<Option<WatcherId>>,
	this: Weak<PropertyBody>,
	inner: RefCell<PropertyInner>,
}

struct PropertyInner {
	invalidation: SmallVec<[(ListenerId, InvalidationListener); 2]>,
	change: SmallVec<[(ListenerId, ChangeListener); 2]>,
	bound: Option<Binding>,
	next_listener: u64,
}

struct Binding {
	source: Rc<dyn Observable>,
	subscription: ListenerId,
}

impl Clone for Property {
	fn clone(&self) -> Self {
		Property {
			body: self.body.clone(),
		}
	}
}

impl PartialEq for Property {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}
}

impl Eq for Property {}

impl Property {
	/// Resolves the property at `(path, keys)` through the family
	/// cache of `store`, constructing it only when no live instance
	/// exists.
	pub(crate) fn resolve(
		store: &Store,
		parent: Option<Weak<PropertyBody>>,
		path: Option<PropertyPath>,
		keys: Option<KeySet>,
	) -> Property {
		let key = CacheKey::new(path.clone(), keys.clone());

		if let Some(body) = store.cache().get(&key) {
			return Property { body };
		}

		let body = PropertyBody::new(store.clone(), path, keys, parent);
		store.cache().insert(key, Rc::downgrade(&body));
		Property { body }
	}

	/// The current projected value. Side-effect free.
	pub fn value(&self) -> Value {
		self.body.value()
	}

	/// Writes `value` through this property's window and notifies
	/// listeners.
	///
	/// A reentrant call while this property is already firing (from
	/// its own listener, or from the store watcher pass it triggered)
	/// is silently dropped: that is the loop-breaker, not an error.
	/// Returns [`Error::WriteCycle`] when nested writes exhaust the
	/// per-thread depth budget.
	pub fn set_value(&self, value: Value) -> Result<(), Error> {
		self.body.set_value(value)
	}

	/// Applies `f` to the current restricted view and writes the
	/// result back, all within a single store update. Listener
	/// notification flows through the store watcher. Returns the new
	/// projected value.
	pub fn swap(&self, f: impl FnOnce(Value) -> Value) -> Value {
		let body = &self.body;

		let new_root = match (&body.path, &body.keys) {
			(None, None) => body.store.update(|root| f(root.clone())),
			(None, Some(keys)) => body.store.update(|root| {
				let out = f(path::project(root, keys));
				path::merge_restricted(root, keys, &out)
			}),
			(Some(at), None) => body.store.update(|root| path::update_in(root, at, f)),
			(Some(at), Some(keys)) => body.store.update(|root| {
				path::update_in(root, at, |sub| {
					let out = f(path::project(&sub, keys));
					path::merge_restricted(&sub, keys, &out)
				})
			}),
		};

		path::lookup(&new_root, body.path.as_deref(), body.keys.as_deref())
	}

	pub fn add_invalidation_listener(&self, f: impl Fn(&Property) + 'static) -> ListenerId {
		let mut inner = self.body.inner.borrow_mut();
		let id = ListenerId(inner.next_listener);
		inner.next_listener += 1;
		inner.invalidation.push((id, Rc::new(f)));
		id
	}

	pub fn remove_invalidation_listener(&self, id: ListenerId) {
		self.body
			.inner
			.borrow_mut()
			.invalidation
			.retain(|(current, _)| *current != id);
	}

	pub fn add_change_listener(&self, f: impl Fn(&Property, &Value, &Value) + 'static) -> ListenerId {
		let mut inner = self.body.inner.borrow_mut();
		let id = ListenerId(inner.next_listener);
		inner.next_listener += 1;
		inner.change.push((id, Rc::new(f)));
		id
	}

	pub fn remove_change_listener(&self, id: ListenerId) {
		self.body
			.inner
			.borrow_mut()
			.change
			.retain(|(current, _)| *current != id);
	}

	/// Enslaves this property to `source`: adopts its current value
	/// now and rewrites on every invalidation of `source`. Binding to
	/// the observable this property is already bound to is a no-op.
	pub fn bind(&self, source: Rc<dyn Observable>) -> Result<(), Error> {
		if let Some(bound) = &self.body.inner.borrow().bound {
			if Rc::ptr_eq(&bound.source, &source) {
				return Ok(());
			}
		}

		self.unbind()?;
		self.set_value(source.value())?;

		// The subscription must not keep this property alive.
		let weak = self.body.this.clone();
		let subscription = source.subscribe(Rc::new(move || {
			if let Some(body) = weak.upgrade() {
				body.update_binding();
			}
		}));

		self.body.inner.borrow_mut().bound = Some(Binding {
			source,
			subscription,
		});

		Ok(())
	}

	/// Pushes the bound observable's value once more, then detaches.
	pub fn unbind(&self) -> Result<(), Error> {
		let bound = self.body.inner.borrow_mut().bound.take();

		if let Some(bound) = bound {
			self.set_value(bound.source.value())?;
			bound.source.unsubscribe(bound.subscription);
		}

		Ok(())
	}

	pub fn is_bound(&self) -> bool {
		self.body.inner.borrow().bound.is_some()
	}

	/// The property at this path extended by `sub_path`, with no key
	/// restriction. The current restriction does not carry over: the
	/// new path names a different location.
	pub fn entry_property<P>(&self, sub_path: P) -> Result<Property, Error>
	where
		P: IntoIterator,
		P::Item: Into<Key>,
	{
		self.entry_property_with_keys(sub_path, std::iter::empty::<Key>())
	}

	/// Like [`Property::entry_property`], restricted to `keys` (an
	/// empty iterator means no restriction).
	pub fn entry_property_with_keys<P, K>(&self, sub_path: P, keys: K) -> Result<Property, Error>
	where
		P: IntoIterator,
		P::Item: Into<Key>,
		K: IntoIterator,
		K::Item: Into<Key>,
	{
		let sub: Vec<Key> = sub_path.into_iter().map(Into::into).collect();
		if sub.is_empty() {
			return Err(Error::EmptyPath);
		}

		let mut joined: Vec<Key> = self.body.path.as_deref().unwrap_or(&[]).to_vec();
		joined.extend(sub);

		let keys: BTreeSet<Key> = keys.into_iter().map(Into::into).collect();
		let keys = if keys.is_empty() {
			None
		} else {
			Some(Rc::new(keys))
		};

		Ok(self.new_or_cached(Some(Rc::from(joined)), keys))
	}

	/// The property at the same path whose restriction is `keys`, or
	/// the intersection with the existing restriction when one is
	/// already in place. An empty intersection is unsatisfiable and
	/// fails without creating anything.
	pub fn limit_to_keys<K>(&self, keys: K) -> Result<Property, Error>
	where
		K: IntoIterator,
		K::Item: Into<Key>,
	{
		let requested: BTreeSet<Key> = keys.into_iter().map(Into::into).collect();
		if requested.is_empty() {
			return Err(Error::EmptyKeySet);
		}

		let restricted = match self.body.keys.as_deref() {
			None => requested,
			Some(existing) => {
				let intersection: BTreeSet<Key> =
					existing.intersection(&requested).cloned().collect();
				if intersection.is_empty() {
					return Err(Error::EmptyIntersection {
						existing: render_keys(existing),
						requested: render_keys(&requested),
					});
				}
				intersection
			}
		};

		Ok(self.new_or_cached(self.body.path.clone(), Some(Rc::new(restricted))))
	}

	pub fn property_path(&self) -> Option<PropertyPath> {
		self.body.path.clone()
	}

	pub fn key_set(&self) -> Option<KeySet> {
		self.body.keys.clone()
	}

	pub fn store(&self) -> &Store {
		&self.body.store
	}

	/// The property this one was derived from, if it is still alive.
	/// Diagnostic only: the link is non-owning.
	pub fn parent(&self) -> Option<Property> {
		self.body
			.parent
			.as_ref()
			.and_then(Weak::upgrade)
			.map(|body| Property { body })
	}

	fn new_or_cached(&self, path: Option<PropertyPath>, keys: Option<KeySet>) -> Property {
		Property::resolve(
			&self.body.store,
			Some(self.body.this.clone()),
			path,
			keys,
		)
	}
}

impl PropertyBody {
	fn new(
		store: Store,
		path: Option<PropertyPath>,
		keys: Option<KeySet>,
		parent: Option<Weak<PropertyBody>>,
	) -> Rc<PropertyBody> {
		let body = Rc::new_cyclic(|this| PropertyBody {
			store,
			path,
			keys,
			parent,
			authority: Cell::new(UpdateAuthority::Nobody),
			watcher: Cell::new(None),
			this: this.clone(),
			inner: RefCell::new(PropertyInner {
				invalidation: SmallVec::new(),
				change: SmallVec::new(),
				bound: None,
				next_listener: 0,
			}),
		});

		// The watcher recomputes the projection on every external
		// snapshot change. It holds the body weakly so the store
		// never keeps an unreferenced property alive.
		let weak = Rc::downgrade(&body);
		let watcher = body.store.watch(move |old, new| {
			if let Some(body) = weak.upgrade() {
				body.on_root_change(old, new);
			}
		});
		body.watcher.set(Some(watcher));

		body
	}

	fn value(&self) -> Value {
		let snapshot = self.store.read();
		path::lookup(&snapshot, self.path.as_deref(), self.keys.as_deref())
	}

	fn set_value(&self, value: Value) -> Result<(), Error> {
		if self.authority.get() != UpdateAuthority::Nobody {
			return Ok(());
		}

		if trace::write_depth() >= trace::MAX_WRITE_DEPTH {
			let error = Error::WriteCycle {
				property: self.to_string(),
				value: value.to_string(),
			};
			if trace::is_tracing() {
				tracing::error!(trace = %trace::current_trace(), "{}", error);
			} else {
				tracing::error!("{}", error);
			}
			return Err(error);
		}

		let _guard = WriteGuard::acquire(self);

		let old = self.value();
		self.write(&value);

		// The store watcher stays silent while we hold authority, so
		// this property's listeners are notified explicitly.
		self.fire_value_changed(&old, &value);

		Ok(())
	}

	fn write(&self, value: &Value) {
		match (&self.path, &self.keys) {
			(None, None) => {
				self.store.replace(value.clone());
			}
			(None, Some(keys)) => {
				self.store
					.update(|root| path::merge_restricted(root, keys, value));
			}
			(Some(at), None) => {
				self.store
					.update(|root| path::assoc_in(root, at, value.clone()));
			}
			(Some(at), Some(keys)) => {
				self.store.update(|root| {
					path::update_in(root, at, |sub| path::merge_restricted(&sub, keys, value))
				});
			}
		}
	}

	fn on_root_change(&self, old_root: &Value, new_root: &Value) {
		// Not Nobody: this property itself drove the change and fires
		// explicitly from set_value.
		if self.authority.get() != UpdateAuthority::Nobody {
			return;
		}

		if Value::identical(old_root, new_root) {
			return;
		}

		let old = path::lookup(old_root, self.path.as_deref(), self.keys.as_deref());
		let new = path::lookup(new_root, self.path.as_deref(), self.keys.as_deref());

		if old != new {
			let _guard = AuthorityGuard::acquire(&self.authority, UpdateAuthority::Cell);
			self.fire_value_changed(&old, &new);
		}
	}

	/// Notifies invalidation listeners, then change listeners, in
	/// registration order. Each list is snapshotted at pass start;
	/// listeners removed during the pass are skipped, listeners added
	/// during the pass wait for the next one.
	fn fire_value_changed(&self, old: &Value, new: &Value) {
		if old == new {
			return;
		}

		let Some(body) = self.this.upgrade() else {
			return;
		};
		let property = Property { body };

		let invalidation: SmallVec<[(ListenerId, InvalidationListener); 2]> =
			self.inner.borrow().invalidation.clone();
		for (id, listener) in invalidation {
			let live = self
				.inner
				.borrow()
				.invalidation
				.iter()
				.any(|(current, _)| *current == id);
			if live {
				listener(&property);
			}
		}

		let change: SmallVec<[(ListenerId, ChangeListener); 2]> =
			self.inner.borrow().change.clone();
		for (id, listener) in change {
			let live = self
				.inner
				.borrow()
				.change
				.iter()
				.any(|(current, _)| *current == id);
			if live {
				listener(&property, old, new);
			}
		}
	}

	fn update_binding(&self) {
		let source = self
			.inner
			.borrow()
			.bound
			.as_ref()
			.map(|bound| bound.source.clone());

		if let Some(source) = source {
			if let Err(error) = self.set_value(source.value()) {
				tracing::error!("binding update failed: {}", error);
			}
		}
	}
}

impl Drop for PropertyBody {
	fn drop(&mut self) {
		if let Some(watcher) = self.watcher.get() {
			self.store.unwatch(watcher);
		}
		if let Some(bound) = self.inner.borrow_mut().bound.take() {
			bound.source.unsubscribe(bound.subscription);
		}
	}
}

/// Scoped authority for the store-watcher notification path.
struct AuthorityGuard<'a> {
	authority: &'a Cell<UpdateAuthority>,
}

impl<'a> AuthorityGuard<'a> {
	fn acquire(authority: &'a Cell<UpdateAuthority>, by: UpdateAuthority) -> Self {
		authority.set(by);
		AuthorityGuard { authority }
	}
}

impl Drop for AuthorityGuard<'_> {
	fn drop(&mut self) {
		self.authority.set(UpdateAuthority::Nobody);
	}
}

/// Scoped authority + depth + trace frame for `set_value`. The trace
/// flag is captured once at acquisition so push and pop stay paired
/// across a mid-flight toggle.
struct WriteGuard<'a> {
	body: &'a PropertyBody,
	traced: bool,
}

impl<'a> WriteGuard<'a> {
	fn acquire(body: &'a PropertyBody) -> Self {
		body.authority.set(UpdateAuthority::Property);
		trace::enter_write();

		let traced = trace::is_tracing();
		if traced {
			trace::push(Frame {
				property: body.this.clone(),
				store_id: body.store.id(),
				path: body.path.clone(),
			});
		}

		WriteGuard { body, traced }
	}
}

impl Drop for WriteGuard<'_> {
	fn drop(&mut self) {
		if self.traced {
			trace::pop(&self.body.this);
		}
		trace::exit_write();
		self.body.authority.set(UpdateAuthority::Nobody);
	}
}

impl Observable for Property {
	fn value(&self) -> Value {
		Property::value(self)
	}

	fn subscribe(&self, listener: Rc<dyn Fn()>) -> ListenerId {
		self.add_invalidation_listener(move |_| listener())
	}

	fn unsubscribe(&self, listener: ListenerId) {
		self.remove_invalidation_listener(listener);
	}
}

fn render_keys(keys: &BTreeSet<Key>) -> String {
	let mut out = String::new();
	for (i, key) in keys.iter().enumerate() {
		if i > 0 {
			out.push_str(", ");
		}
		out.push_str(&key.to_string());
	}
	out
}

impl Display for PropertyBody {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Property {:x}", self as *const PropertyBody as usize)?;
		if let Some(path) = &self.path {
			write!(f, " [")?;
			for (i, segment) in path.iter().enumerate() {
				if i > 0 {
					write!(f, ", ")?;
				}
				write!(f, "{}", segment)?;
			}
			write!(f, "]")?;
		}
		if let Some(keys) = &self.keys {
			write!(f, " #{{{}}}", render_keys(keys))?;
		}
		Ok(())
	}
}

impl Display for Property {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(&*self.body, f)
	}
}

impl Debug for Property {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}
