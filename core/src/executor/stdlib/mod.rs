//! Built-in runtime
//!
//! Every built-in type owns a static member table. Inherited property
//! reads resolve through [`lookup_member`], which is what the prototype
//! whitelist gates. Constructors and namespaces (`Math`, `JSON`) are
//! installed into the global object by [`install_globals`].

pub mod array;
pub mod collections;
pub mod console;
pub mod date;
pub mod error;
pub mod function;
pub mod globals;
pub mod json;
pub mod math;
pub mod number;
pub mod object;
pub mod promise;
pub mod regexp;
pub mod string;
pub mod timers;

use std::collections::BTreeSet;

use super::errors::{Exec, ExecError};
use super::ops::display_value;
use super::types::{
    AsyncFn, Brand, Function, NativeFunction, NativeImpl, Obj, ObjectKind, SyncFn, TypeTag, Value,
};

/* ===================== Member Tables ===================== */

/// One entry of a built-in member table
pub struct Member {
    pub name: &'static str,
    pub arity: usize,
    pub code: NativeImpl,
}

pub const fn method(name: &'static str, arity: usize, f: SyncFn) -> Member {
    Member {
        name,
        arity,
        code: NativeImpl::Sync(f),
    }
}

pub const fn async_method(name: &'static str, arity: usize, f: AsyncFn) -> Member {
    Member {
        name,
        arity,
        code: NativeImpl::Async(f),
    }
}

fn table(tag: TypeTag) -> &'static [Member] {
    match tag {
        TypeTag::Object => object::MEMBERS,
        TypeTag::Function => function::MEMBERS,
        TypeTag::Array => array::MEMBERS,
        TypeTag::String => string::MEMBERS,
        TypeTag::Number => number::MEMBERS,
        TypeTag::Boolean => number::BOOLEAN_MEMBERS,
        TypeTag::BigInt => number::BIGINT_MEMBERS,
        TypeTag::RegExp => regexp::MEMBERS,
        TypeTag::Map => collections::MAP_MEMBERS,
        TypeTag::Set => collections::SET_MEMBERS,
        TypeTag::Promise => promise::MEMBERS,
        TypeTag::Date => date::MEMBERS,
        TypeTag::Error => error::MEMBERS,
        TypeTag::Iterator => collections::ITERATOR_MEMBERS,
    }
}

/// Inherited member of `tag`, with the type that declares it
///
/// Every type falls back to the `Object` table, the way every prototype
/// chain ends in `Object.prototype`.
pub fn lookup_member(tag: TypeTag, key: &str) -> Option<(TypeTag, &'static Member)> {
    let find = |tag: TypeTag| table(tag).iter().find(|m| m.name == key).map(|m| (tag, m));
    find(tag).or_else(|| (tag != TypeTag::Object).then(|| find(TypeTag::Object)).flatten())
}

/// Names in the member table of `tag`, for configuration suggestions
pub fn member_names(tag: TypeTag) -> impl Iterator<Item = &'static str> {
    table(tag).iter().map(|m| m.name)
}

/// Function object for a table member
pub fn member_object(member: &'static Member) -> Obj {
    builtin_function(NativeFunction::new(member.name, member.arity, member.code))
}

/* ===================== Builders ===================== */

pub(crate) fn builtin_function(native: NativeFunction) -> Obj {
    let obj = Obj::new(ObjectKind::Function(Function::Native(native)));
    obj.borrow_mut().flags.builtin = true;
    obj
}

pub(crate) fn native(name: &str, arity: usize, f: SyncFn) -> Obj {
    builtin_function(NativeFunction::sync(name, arity, f))
}

pub(crate) fn native_async(name: &str, arity: usize, f: AsyncFn) -> Obj {
    builtin_function(NativeFunction::new(name, arity, NativeImpl::Async(f)))
}

/// Attach static members to a constructor or namespace object
pub(crate) fn with_statics(target: Obj, statics: &'static [Member]) -> Obj {
    {
        let mut o = target.borrow_mut();
        for member in statics {
            o.props.insert(member.name, member_object(member).into());
        }
        o.flags.builtin = true;
    }
    target
}

/// Built-in constructor: `call` handles `Ctor(...)`, `construct` handles `new Ctor(...)`
pub(crate) fn constructor(
    name: &str,
    arity: usize,
    call: NativeImpl,
    construct: NativeImpl,
    brand: Brand,
    statics: &'static [Member],
) -> Obj {
    let native = NativeFunction::new(name, arity, call).constructor(construct, brand);
    with_statics(builtin_function(native), statics)
}

/// Plain namespace object such as `Math`
pub(crate) fn namespace(members: &'static [Member]) -> Obj {
    with_statics(Obj::plain(), members)
}

/* ===================== Argument Helpers ===================== */

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Receiver as an object of the expected built-in kind
pub(crate) fn this_object<'a>(this: &'a Value, expected: TypeTag, method: &str) -> Exec<&'a Obj> {
    match this {
        Value::Object(obj) if obj.borrow().kind.type_tag() == expected => Ok(obj),
        other => Err(ExecError::type_error(format!(
            "{}.prototype.{method} called on incompatible receiver {}",
            expected.name(),
            display_value(other)
        ))),
    }
}

pub(crate) fn callable_arg(args: &[Value], index: usize) -> Exec<Value> {
    let value = arg(args, index);
    if value.is_callable() {
        Ok(value)
    } else {
        Err(ExecError::type_error(format!(
            "{} is not a function",
            display_value(&value)
        )))
    }
}

/* ===================== Globals ===================== */

/// Every safe default global, in installation order
pub fn default_global_names() -> Vec<&'static str> {
    all_globals().into_iter().map(|(name, _)| name).collect()
}

fn all_globals() -> Vec<(&'static str, Value)> {
    let mut list: Vec<(&'static str, Value)> = vec![
        ("Object", object::constructor_object().into()),
        ("Array", array::constructor_object().into()),
        ("String", string::constructor_object().into()),
        ("Number", number::number_constructor().into()),
        ("Boolean", number::boolean_constructor().into()),
        ("BigInt", number::bigint_constructor().into()),
        ("Math", math::namespace_object().into()),
        ("JSON", json::namespace_object().into()),
        ("Date", date::constructor_object().into()),
        ("RegExp", regexp::constructor_object().into()),
        ("Map", collections::map_constructor().into()),
        ("Set", collections::set_constructor().into()),
        ("Promise", promise::constructor_object().into()),
        ("Function", function::constructor_object().into()),
        ("eval", function::eval_object().into()),
        ("console", console::namespace_object().into()),
    ];
    list.extend(error::constructors().into_iter().map(|(name, ctor)| (name, ctor.into())));
    list.extend(globals::functions().into_iter().map(|(name, f)| (name, f.into())));
    list.extend(timers::functions().into_iter().map(|(name, f)| (name, f.into())));
    list
}

/// Populate the global object, keeping only `allowed` names when given
pub fn install_globals(global: &Obj, allowed: Option<&BTreeSet<String>>) {
    let mut o = global.borrow_mut();
    for (name, value) in all_globals() {
        if allowed.map_or(true, |allowed| allowed.contains(name)) {
            o.props.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_falls_back_to_object_table() {
        let (tag, member) = lookup_member(TypeTag::Array, "hasOwnProperty").unwrap();
        assert_eq!(tag, TypeTag::Object);
        assert_eq!(member.name, "hasOwnProperty");

        let (tag, _) = lookup_member(TypeTag::Array, "push").unwrap();
        assert_eq!(tag, TypeTag::Array);
        assert!(lookup_member(TypeTag::Number, "push").is_none());
    }

    #[test]
    fn test_install_globals_honours_allowed_set() {
        let global = Obj::plain();
        let allowed: BTreeSet<String> = ["Math".to_string()].into_iter().collect();
        install_globals(&global, Some(&allowed));
        assert!(global.get_raw("Math").is_some());
        assert!(global.get_raw("Array").is_none());
    }

    #[test]
    fn test_every_table_has_unique_names() {
        for tag in TypeTag::ALL {
            let names: Vec<_> = member_names(tag).collect();
            let unique: BTreeSet<_> = names.iter().collect();
            assert_eq!(names.len(), unique.len(), "duplicate member on {}", tag.name());
        }
    }
}
