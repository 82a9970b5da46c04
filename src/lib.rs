pub mod macros;

mod cache;
mod error;
mod path;
mod property;
mod store;
mod trace;
mod value;

use std::rc::Rc;

pub use error::Error;
pub use path::{assoc_in, lookup, merge_restricted, project, select, update_in};
pub use path::{KeySet, PropertyPath};
pub use property::Property;
pub use store::{Store, WatcherId};
pub use trace::{current_trace, disable_tracing, enable_tracing, PropertyTrace};
pub use value::{Key, Value};

/// The observable-value seam towards the UI binding layer: anything a
/// [`Property`] can be enslaved to. Properties implement it
/// themselves, so one property can serve as the bind source of
/// another.
pub trait Observable: 'static {
	/// Current value of this observable.
	fn value(&self) -> Value;

	/// Registers `listener` to run on every invalidation.
	fn subscribe(&self, listener: Rc<dyn Fn()>) -> ListenerId;

	fn unsubscribe(&self, listener: ListenerId);
}

/// Removal token for a registered listener. Tokens are per observable
/// and never reused within one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
	/// For external [`Observable`] implementations minting their own
	/// subscription tokens.
	pub fn new(raw: u64) -> ListenerId {
		ListenerId(raw)
	}
}
