//! Runtime types for the executor

pub mod function;
pub mod object;
pub mod promise;
pub mod values;

pub use function::{
    AsyncFn, BoundFunction, Brand, Closure, Eval, Function, NativeCode, NativeFunction,
    NativeImpl, NativeResult, SyncFn,
};
pub use object::{
    IteratorState, Object, ObjectFlags, ObjectKind, PropertyMap, RegExpData, TypeTag,
};
pub use promise::{PromiseCell, PromiseFuture, PromiseState};
pub use values::{Obj, Value, WeakObj};
