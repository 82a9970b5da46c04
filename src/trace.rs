//! Diagnostic trace of in-flight property writes.
//!
//! The trace is a per-thread stack of the `set_value` calls currently
//! on the call stack, recorded only while tracing is enabled. The
//! write-depth counter next to it is always maintained: it backs the
//! cycle limit and must not depend on the tracing flag.

use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::fmt::Write;
use std::rc::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::path::PropertyPath;
use crate::property::PropertyBody;

static TRACING: AtomicBool = AtomicBool::new(false);

/// Nested `set_value` frames one thread may hold before a write is
/// rejected as a cycle.
pub(crate) const MAX_WRITE_DEPTH: usize = 256;

thread_local! {
	static TRACE: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
	static WRITE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

pub fn enable_tracing() {
	TRACING.store(true, Ordering::Relaxed);
}

pub fn disable_tracing() {
	TRACING.store(false, Ordering::Relaxed);
}

pub(crate) fn is_tracing() -> bool {
	TRACING.load(Ordering::Relaxed)
}

pub(crate) fn write_depth() -> usize {
	WRITE_DEPTH.with(|depth| depth.get())
}

pub(crate) fn enter_write() {
	WRITE_DEPTH.with(|depth| depth.set(depth.get() + 1));
}

pub(crate) fn exit_write() {
	WRITE_DEPTH.with(|depth| depth.set(depth.get() - 1));
}

#[derive(Clone)]
pub(crate) struct Frame {
	pub(crate) property: Weak<PropertyBody>,
	pub(crate) store_id: usize,
	pub(crate) path: Option<PropertyPath>,
}

pub(crate) fn push(frame: Frame) {
	TRACE.with(|trace| trace.borrow_mut().push(frame));
}

/// Pops the top frame, which must belong to `property`. A mismatch
/// means push/pop pairing was broken somewhere and is a defect, never
/// a recoverable condition.
pub(crate) fn pop(property: &Weak<PropertyBody>) {
	TRACE.with(|trace| {
		let mut trace = trace.borrow_mut();
		match trace.last() {
			Some(top) if Weak::ptr_eq(&top.property, property) => {
				trace.pop();
			}
			_ => panic!("property trace corrupted: popped a property that is not the top of the trace"),
		}
	})
}

/// Snapshot of the current thread's write stack, innermost frame last.
pub fn current_trace() -> PropertyTrace {
	PropertyTrace {
		frames: TRACE.with(|trace| trace.borrow().clone()),
	}
}

pub struct PropertyTrace {
	frames: Vec<Frame>,
}

impl PropertyTrace {
	pub fn len(&self) -> usize {
		self.frames.len()
	}

	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}

	/// One line per frame: store identity plus path segments.
	pub fn trace_string(&self) -> String {
		let mut out = String::new();
		for frame in &self.frames {
			let _ = write!(out, "{:X} [", frame.store_id);
			if let Some(path) = &frame.path {
				for (i, segment) in path.iter().enumerate() {
					if i > 0 {
						out.push_str(", ");
					}
					let _ = write!(out, "{}", segment);
				}
			}
			out.push_str("]\n");
		}
		out
	}
}

impl Display for PropertyTrace {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.trace_string())
	}
}
