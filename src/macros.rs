pub use enclose::*;

/// Heterogeneous key path: `path!["users", 0, "name"]`.
#[macro_export]
macro_rules! path {
    ($($key:expr),* $(,)?) => {
        vec![$($crate::Key::from($key)),*]
    };
}

/// Key set literal for restrictions: `keys!["name", "age"]`.
#[macro_export]
macro_rules! keys {
    ($($key:expr),* $(,)?) => {
        vec![$($crate::Key::from($key)),*]
    };
}

/// Map value literal: `vmap! { "name" => "A", "age" => 3 }`.
#[macro_export]
macro_rules! vmap {
    () => {
        $crate::Value::Map(::std::rc::Rc::new(::std::collections::BTreeMap::new()))
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::Value::map([$(($crate::Key::from($key), $crate::Value::from($value))),+])
    };
}

/// Sequence value literal: `vseq![1, 2, 3]`.
#[macro_export]
macro_rules! vseq {
    () => {
        $crate::Value::Seq(::std::rc::Rc::new(::std::vec::Vec::new()))
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Value::seq([$($crate::Value::from($value)),+])
    };
}

/// Change listener with capture-clone sugar:
/// `on_change!((log) |prop, old, new| { ... })`.
#[macro_export]
macro_rules! on_change {
    (( $($d_tt:tt)* ) |$p:ident, $old:ident, $new:ident| $($b:tt)*) => {
        $crate::macros::enclose!(($( $d_tt )*) move |$p: &$crate::Property, $old: &$crate::Value, $new: &$crate::Value| { $($b)* })
    };
    (|$p:ident, $old:ident, $new:ident| $($b:tt)*) => {
        move |$p: &$crate::Property, $old: &$crate::Value, $new: &$crate::Value| { $($b)* }
    };
}
