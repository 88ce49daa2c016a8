//! `Array` constructor and array members
//!
//! Mutating members check that the receiver is neither built-in nor frozen
//! and report one [`Change::ArrayMutation`] per call that actually changed
//! the array. Callback members iterate over a snapshot taken at call time.

use std::cmp::Ordering;
use std::rc::Rc;

use super::{arg, async_method, callable_arg, constructor, method, this_object, Member};
use crate::executor::call::call;
use crate::executor::context::ExecContext;
use crate::executor::errors::{Exec, ExecError};
use crate::executor::expressions::iterator_object;
use crate::executor::ops::{
    check_string_length, relative_index, same_value_zero, to_integer, to_number_lossy, to_string,
    truthy,
};
use crate::executor::property::{ensure_mutable, get_member, iterate_values, MAX_ARRAY_LENGTH};
use crate::executor::subscriptions::Change;
use crate::executor::types::{Brand, NativeImpl, NativeResult, Obj, ObjectKind, TypeTag, Value};

pub static MEMBERS: &[Member] = &[
    method("push", 1, push),
    method("pop", 0, pop),
    method("shift", 0, shift),
    method("unshift", 1, unshift),
    method("splice", 2, splice),
    method("slice", 2, slice),
    method("concat", 1, concat),
    method("join", 1, join),
    method("reverse", 0, reverse),
    async_method("sort", 1, sort),
    method("indexOf", 1, index_of),
    method("lastIndexOf", 1, last_index_of),
    method("includes", 1, includes),
    async_method("find", 1, find),
    async_method("findIndex", 1, find_index),
    async_method("findLast", 1, find_last),
    async_method("findLastIndex", 1, find_last_index),
    async_method("filter", 1, filter),
    async_method("map", 1, map),
    async_method("forEach", 1, for_each),
    async_method("reduce", 1, reduce),
    async_method("reduceRight", 1, reduce_right),
    async_method("some", 1, some),
    async_method("every", 1, every),
    method("flat", 0, flat),
    async_method("flatMap", 1, flat_map),
    method("fill", 1, fill),
    method("copyWithin", 2, copy_within),
    method("at", 1, at),
    method("keys", 0, keys),
    method("values", 0, values),
    method("entries", 0, entries),
    method("toString", 0, to_string_member),
];

static STATICS: &[Member] = &[
    method("isArray", 1, is_array),
    async_method("from", 1, from),
    method("of", 0, of),
];

pub fn constructor_object() -> Obj {
    constructor(
        "Array",
        1,
        NativeImpl::Sync(construct),
        NativeImpl::Sync(construct),
        Brand::Array,
        STATICS,
    )
}

fn construct(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    if let [Value::Number(n)] = args {
        if *n < 0.0 || n.fract() != 0.0 || *n > MAX_ARRAY_LENGTH as f64 {
            return Err(ExecError::range_error("Invalid array length"));
        }
        return Ok(Obj::array(vec![Value::Undefined; *n as usize]).into());
    }
    Ok(Obj::array(args.to_vec()).into())
}

/* ===================== Helpers ===================== */

fn this_array<'a>(this: &'a Value, name: &str) -> Exec<&'a Obj> {
    this_object(this, TypeTag::Array, name)
}

fn items_of(this: &Value, name: &str) -> Exec<Vec<Value>> {
    Ok(this_array(this, name)?.array_items())
}

/// Run `f` on the elements of a mutable array receiver
fn mutate<R>(
    this: &Value,
    name: &str,
    f: impl FnOnce(&mut Vec<Value>) -> Exec<R>,
) -> Exec<(Obj, R)> {
    let obj = this_array(this, name)?;
    ensure_mutable(obj, name)?;
    let result = {
        let mut o = obj.borrow_mut();
        let ObjectKind::Array(items) = &mut o.kind else {
            return Err(ExecError::type_error("Array expected"));
        };
        f(items)?
    };
    Ok((obj.clone(), result))
}

fn report(
    ctx: &Rc<ExecContext>,
    obj: &Obj,
    method: &'static str,
    index: usize,
    added: Vec<Value>,
    removed: Vec<Value>,
) {
    if added.is_empty() && removed.is_empty() {
        return;
    }
    ctx.notify_change(
        obj,
        &Change::ArrayMutation {
            method,
            index,
            added,
            removed,
        },
    );
}

fn check_growth(current: usize, extra: usize) -> Exec<()> {
    if current + extra > MAX_ARRAY_LENGTH {
        return Err(ExecError::range_error("Invalid array length"));
    }
    Ok(())
}

/* ===================== Mutators ===================== */

fn push(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let (obj, (index, len)) = mutate(this, "push", |items| {
        check_growth(items.len(), args.len())?;
        let index = items.len();
        items.extend_from_slice(args);
        Ok((index, items.len()))
    })?;
    report(ctx, &obj, "push", index, args.to_vec(), Vec::new());
    Ok(len.into())
}

fn pop(ctx: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let (obj, popped) = mutate(this, "pop", |items| Ok(items.pop().map(|v| (items.len(), v))))?;
    let Some((index, value)) = popped else {
        return Ok(Value::Undefined);
    };
    report(ctx, &obj, "pop", index, Vec::new(), vec![value.clone()]);
    Ok(value)
}

fn shift(ctx: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let (obj, shifted) = mutate(this, "shift", |items| {
        Ok((!items.is_empty()).then(|| items.remove(0)))
    })?;
    let Some(value) = shifted else {
        return Ok(Value::Undefined);
    };
    report(ctx, &obj, "shift", 0, Vec::new(), vec![value.clone()]);
    Ok(value)
}

fn unshift(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let (obj, len) = mutate(this, "unshift", |items| {
        check_growth(items.len(), args.len())?;
        items.splice(0..0, args.iter().cloned());
        Ok(items.len())
    })?;
    report(ctx, &obj, "unshift", 0, args.to_vec(), Vec::new());
    Ok(len.into())
}

fn splice(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let inserted = args.get(2..).unwrap_or_default().to_vec();
    let (obj, (start, removed)) = mutate(this, "splice", |items| {
        let len = items.len();
        let start = relative_index(&arg(args, 0), len, 0);
        let count = match args.len() {
            0 => 0,
            1 => len - start,
            _ => (to_integer(&args[1]).max(0.0) as usize).min(len - start),
        };
        check_growth(len - count, inserted.len())?;
        let removed: Vec<Value> = items
            .splice(start..start + count, inserted.iter().cloned())
            .collect();
        Ok((start, removed))
    })?;
    report(ctx, &obj, "splice", start, inserted, removed.clone());
    Ok(Obj::array(removed).into())
}

fn reverse(ctx: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let (obj, (before, after)) = mutate(this, "reverse", |items| {
        let before = items.clone();
        items.reverse();
        Ok((before, items.clone()))
    })?;
    if before.len() > 1 {
        report(ctx, &obj, "reverse", 0, after, before);
    }
    Ok(obj.into())
}

fn fill(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let value = arg(args, 0);
    let (obj, (start, removed, added)) = mutate(this, "fill", |items| {
        let len = items.len();
        let start = relative_index(&arg(args, 1), len, 0);
        let end = relative_index(&arg(args, 2), len, len).max(start);
        let removed = items[start..end].to_vec();
        items[start..end].fill(value.clone());
        Ok((start, removed, items[start..end].to_vec()))
    })?;
    report(ctx, &obj, "fill", start, added, removed);
    Ok(obj.into())
}

fn copy_within(ctx: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let (obj, (target, removed, added)) = mutate(this, "copyWithin", |items| {
        let len = items.len();
        let target = relative_index(&arg(args, 0), len, 0);
        let start = relative_index(&arg(args, 1), len, 0);
        let end = relative_index(&arg(args, 2), len, len).max(start);
        let count = (end - start).min(len - target);
        let window = items[start..start + count].to_vec();
        let removed = items[target..target + count].to_vec();
        items[target..target + count].clone_from_slice(&window);
        Ok((target, removed, window))
    })?;
    report(ctx, &obj, "copyWithin", target, added, removed);
    Ok(obj.into())
}

fn sort(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let compare = match arg(&args, 0) {
            Value::Undefined => None,
            f if f.is_callable() => Some(f),
            _ => {
                return Err(ExecError::type_error(
                    "The comparison function must be either a function or undefined",
                ))
            }
        };
        let obj = this_array(&this, "sort")?.clone();
        ensure_mutable(&obj, "sort")?;
        let before = obj.array_items();
        let sorted = sort_values(&ctx, before.clone(), compare.as_ref()).await?;
        {
            let mut o = obj.borrow_mut();
            if let ObjectKind::Array(items) = &mut o.kind {
                *items = sorted.clone();
            }
        }
        if before.len() > 1 {
            report(&ctx, &obj, "sort", 0, sorted, before);
        }
        Ok(obj.into())
    })
}

/// Stable bottom-up merge sort; `undefined` sorts last
async fn sort_values(
    ctx: &Rc<ExecContext>,
    items: Vec<Value>,
    compare: Option<&Value>,
) -> Exec<Vec<Value>> {
    let (mut run, undefined): (Vec<Value>, Vec<Value>) =
        items.into_iter().partition(|v| !v.is_undefined());
    let n = run.len();
    let mut width = 1;
    while width < n {
        let mut merged = Vec::with_capacity(n);
        let mut start = 0;
        while start < n {
            let mid = (start + width).min(n);
            let end = (start + 2 * width).min(n);
            let (mut i, mut j) = (start, mid);
            while i < mid && j < end {
                if sort_compare(ctx, compare, &run[j], &run[i]).await? == Ordering::Less {
                    merged.push(run[j].clone());
                    j += 1;
                } else {
                    merged.push(run[i].clone());
                    i += 1;
                }
            }
            merged.extend_from_slice(&run[i..mid]);
            merged.extend_from_slice(&run[j..end]);
            start = end;
        }
        run = merged;
        width *= 2;
    }
    run.extend(undefined);
    Ok(run)
}

async fn sort_compare(
    ctx: &Rc<ExecContext>,
    compare: Option<&Value>,
    a: &Value,
    b: &Value,
) -> Exec<Ordering> {
    match compare {
        Some(f) => {
            let result = call(ctx.clone(), f.clone(), Value::Undefined, vec![a.clone(), b.clone()]).await?;
            Ok(to_number_lossy(&result)
                .partial_cmp(&0.0)
                .unwrap_or(Ordering::Equal))
        }
        None => Ok(to_string(a).cmp(&to_string(b))),
    }
}

/* ===================== Accessors ===================== */

fn slice(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let items = items_of(this, "slice")?;
    let len = items.len();
    let start = relative_index(&arg(args, 0), len, 0);
    let end = relative_index(&arg(args, 1), len, len).max(start);
    Ok(Obj::array(items[start..end].to_vec()).into())
}

fn concat(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let mut items = items_of(this, "concat")?;
    for value in args {
        match value {
            Value::Object(obj) if obj.is_array() => items.extend(obj.array_items()),
            other => items.push(other.clone()),
        }
    }
    check_growth(items.len(), 0)?;
    Ok(Obj::array(items).into())
}

fn join_items(items: &[Value], separator: &str) -> Exec<String> {
    let parts: Vec<String> = items
        .iter()
        .map(|v| if v.is_nullish() { String::new() } else { to_string(v) })
        .collect();
    let separators = separator.len().saturating_mul(parts.len().saturating_sub(1));
    check_string_length(parts.iter().map(String::len).sum::<usize>().saturating_add(separators))?;
    Ok(parts.join(separator))
}

fn join(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let separator = match arg(args, 0) {
        Value::Undefined => ",".to_string(),
        other => to_string(&other),
    };
    Ok(join_items(&items_of(this, "join")?, &separator)?.into())
}

fn to_string_member(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(join_items(&items_of(this, "toString")?, ",")?.into())
}

fn index_of(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let items = items_of(this, "indexOf")?;
    let target = arg(args, 0);
    let from = relative_index(&arg(args, 1), items.len(), 0);
    let found = items.iter().skip(from).position(|v| *v == target).map(|i| i + from);
    Ok(found.map_or(-1.0, |i| i as f64).into())
}

fn last_index_of(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let items = items_of(this, "lastIndexOf")?;
    let target = arg(args, 0);
    let found = items.iter().rposition(|v| *v == target);
    Ok(found.map_or(-1.0, |i| i as f64).into())
}

fn includes(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let items = items_of(this, "includes")?;
    let target = arg(args, 0);
    let from = relative_index(&arg(args, 1), items.len(), 0);
    Ok(items.iter().skip(from).any(|v| same_value_zero(v, &target)).into())
}

fn at(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let items = items_of(this, "at")?;
    let n = to_integer(&arg(args, 0));
    let index = if n < 0.0 { items.len() as f64 + n } else { n };
    if index < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(items.get(index as usize).cloned().unwrap_or_default())
}

fn flatten(items: Vec<Value>, depth: f64, out: &mut Vec<Value>) {
    for item in items {
        match &item {
            Value::Object(obj) if depth >= 1.0 && obj.is_array() => {
                flatten(obj.array_items(), depth - 1.0, out)
            }
            _ => out.push(item),
        }
    }
}

fn flat(_: &Rc<ExecContext>, this: &Value, args: &[Value]) -> Exec<Value> {
    let depth = match arg(args, 0) {
        Value::Undefined => 1.0,
        other => to_integer(&other),
    };
    let mut out = Vec::new();
    flatten(items_of(this, "flat")?, depth, &mut out);
    Ok(Obj::array(out).into())
}

fn keys(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let len = items_of(this, "keys")?.len();
    Ok(iterator_object((0..len).map(Value::from).collect()))
}

fn values(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    Ok(iterator_object(items_of(this, "values")?))
}

fn entries(_: &Rc<ExecContext>, this: &Value, _: &[Value]) -> Exec<Value> {
    let pairs = items_of(this, "entries")?
        .into_iter()
        .enumerate()
        .map(|(i, v)| Obj::array(vec![i.into(), v]).into())
        .collect();
    Ok(iterator_object(pairs))
}

/* ===================== Callback Members ===================== */

/// Snapshot, callback and `thisArg` of a callback member
fn callback_args(this: &Value, args: &[Value], name: &str) -> Exec<(Vec<Value>, Value, Value)> {
    let items = items_of(this, name)?;
    let f = callable_arg(args, 0)?;
    Ok((items, f, arg(args, 1)))
}

async fn invoke(
    ctx: &Rc<ExecContext>,
    f: &Value,
    this_arg: &Value,
    item: &Value,
    index: usize,
    array: &Value,
) -> Exec<Value> {
    call(
        ctx.clone(),
        f.clone(),
        this_arg.clone(),
        vec![item.clone(), index.into(), array.clone()],
    )
    .await
}

fn for_each(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let (items, f, this_arg) = callback_args(&this, &args, "forEach")?;
        for (i, item) in items.iter().enumerate() {
            invoke(&ctx, &f, &this_arg, item, i, &this).await?;
        }
        Ok(Value::Undefined)
    })
}

fn map(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let (items, f, this_arg) = callback_args(&this, &args, "map")?;
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(invoke(&ctx, &f, &this_arg, item, i, &this).await?);
        }
        Ok(Obj::array(out).into())
    })
}

fn filter(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let (items, f, this_arg) = callback_args(&this, &args, "filter")?;
        let mut out = Vec::new();
        for (i, item) in items.iter().enumerate() {
            if truthy(&invoke(&ctx, &f, &this_arg, item, i, &this).await?) {
                out.push(item.clone());
            }
        }
        Ok(Obj::array(out).into())
    })
}

fn flat_map(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let (items, f, this_arg) = callback_args(&this, &args, "flatMap")?;
        let mut mapped = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            mapped.push(invoke(&ctx, &f, &this_arg, item, i, &this).await?);
        }
        let mut out = Vec::new();
        flatten(mapped, 1.0, &mut out);
        Ok(Obj::array(out).into())
    })
}

/// First match scanning forward or backward: `(index, item)`
async fn search(
    ctx: &Rc<ExecContext>,
    this: &Value,
    args: &[Value],
    name: &str,
    backward: bool,
) -> Exec<Option<(usize, Value)>> {
    let (items, f, this_arg) = callback_args(this, args, name)?;
    let order: Box<dyn Iterator<Item = usize>> = if backward {
        Box::new((0..items.len()).rev())
    } else {
        Box::new(0..items.len())
    };
    for i in order {
        if truthy(&invoke(ctx, &f, &this_arg, &items[i], i, this).await?) {
            return Ok(Some((i, items[i].clone())));
        }
    }
    Ok(None)
}

fn find(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let found = search(&ctx, &this, &args, "find", false).await?;
        Ok(found.map(|(_, v)| v).unwrap_or_default())
    })
}

fn find_index(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let found = search(&ctx, &this, &args, "findIndex", false).await?;
        Ok(found.map_or(-1.0, |(i, _)| i as f64).into())
    })
}

fn find_last(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let found = search(&ctx, &this, &args, "findLast", true).await?;
        Ok(found.map(|(_, v)| v).unwrap_or_default())
    })
}

fn find_last_index(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let found = search(&ctx, &this, &args, "findLastIndex", true).await?;
        Ok(found.map_or(-1.0, |(i, _)| i as f64).into())
    })
}

fn some(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let found = search(&ctx, &this, &args, "some", false).await?;
        Ok(found.is_some().into())
    })
}

fn every(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let (items, f, this_arg) = callback_args(&this, &args, "every")?;
        for (i, item) in items.iter().enumerate() {
            if !truthy(&invoke(&ctx, &f, &this_arg, item, i, &this).await?) {
                return Ok(false.into());
            }
        }
        Ok(true.into())
    })
}

async fn fold(
    ctx: &Rc<ExecContext>,
    this: &Value,
    args: &[Value],
    name: &str,
    backward: bool,
) -> Exec<Value> {
    let items = items_of(this, name)?;
    let f = callable_arg(args, 0)?;
    let mut order: Vec<usize> = (0..items.len()).collect();
    if backward {
        order.reverse();
    }
    let mut order = order.into_iter();
    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match order.next() {
            Some(i) => items[i].clone(),
            None => {
                return Err(ExecError::type_error(
                    "Reduce of empty array with no initial value",
                ))
            }
        },
    };
    for i in order {
        acc = call(
            ctx.clone(),
            f.clone(),
            Value::Undefined,
            vec![acc, items[i].clone(), i.into(), this.clone()],
        )
        .await?;
    }
    Ok(acc)
}

fn reduce(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move { fold(&ctx, &this, &args, "reduce", false).await })
}

fn reduce_right(ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move { fold(&ctx, &this, &args, "reduceRight", true).await })
}

/* ===================== Statics ===================== */

fn is_array(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(matches!(arg(args, 0), Value::Object(o) if o.is_array()).into())
}

fn of(_: &Rc<ExecContext>, _: &Value, args: &[Value]) -> Exec<Value> {
    Ok(Obj::array(args.to_vec()).into())
}

/// Elements of an iterable, or of an array-like `{ length, 0: .. }`
fn array_like(ctx: &Rc<ExecContext>, source: &Value) -> Exec<Vec<Value>> {
    match source {
        Value::Object(obj) if obj.borrow().props.contains("length") => {
            let len = to_integer(&get_member(ctx, source, "length")?).max(0.0) as usize;
            check_growth(len, 0)?;
            let o = obj.borrow();
            Ok((0..len)
                .map(|i| o.props.get(&i.to_string()).cloned().unwrap_or_default())
                .collect())
        }
        other => iterate_values(other),
    }
}

fn from(ctx: Rc<ExecContext>, _: Value, args: Vec<Value>) -> NativeResult {
    Box::pin(async move {
        let items = array_like(&ctx, &arg(&args, 0))?;
        let map = match arg(&args, 1) {
            Value::Undefined => None,
            _ => Some(callable_arg(&args, 1)?),
        };
        let Some(f) = map else {
            return Ok(Obj::array(items).into());
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            out.push(call(ctx.clone(), f.clone(), Value::Undefined, vec![item, i.into()]).await?);
        }
        Ok(Obj::array(out).into())
    })
}
