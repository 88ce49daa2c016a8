//! Tests for the built-in runtime as seen from sandboxed code

use super::helpers::{numbers, run};
use crate::executor::errors::{ErrorKind, ExecError};
use crate::executor::types::Value;
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_map_and_set_semantics() {
    let source = r#"
        const m = new Map();
        m.set('a', 1).set(NaN, 2).set('a', 3);
        const s = new Set([1, 1, 2, NaN, NaN]);
        s.delete(2);
        const keys = [];
        m.forEach((v, k) => keys.push(k + '=' + v));
        return [m.size, m.get(NaN), keys.join('&'), s.size, s.has(NaN), [...s.values()].length].join(' ')
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("2 2 a=3&NaN=2 2 true 2"));
}

#[test]
fn test_collections_require_new() {
    let err = assert_err!(run("Map()"));
    assert!(matches!(err, ExecError::Runtime { kind: ErrorKind::TypeError, .. }));
}

#[test]
fn test_iterators_step_manually() {
    let source = r#"
        const it = new Map([['k', 'v']]).entries();
        const first = it.next();
        const second = it.next();
        return first.value[0] + first.value[1] + first.done + second.done
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("kvfalsetrue"));
}

#[test]
fn test_json_round_trip() {
    let source = r#"
        const text = JSON.stringify({ a: [1, 'two', null], b: { c: true }, skip: undefined });
        const back = JSON.parse(text);
        return text + '|' + back.a[1] + back.b.c
    "#;
    assert_eq!(
        assert_ok!(run(source)),
        Value::string(r#"{"a":[1,"two",null],"b":{"c":true}}|twotrue"#)
    );
}

#[test]
fn test_json_parse_error_is_syntax_error() {
    let source = r#"
        try { JSON.parse('{bad') } catch (e) { return e.name }
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("SyntaxError"));
}

#[test]
fn test_optional_chaining_and_nullish() {
    let source = r#"
        const o = { inner: { f() { return 'hi' } } };
        const none = null;
        return [
            o?.inner?.f?.(),
            none?.x?.y,
            o.missing?.(),
            none ?? 'fallback'
        ].join(',')
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("hi,,,fallback"));
}

#[test]
fn test_template_literals_and_string_methods() {
    let source = r#"
        const name = 'World';
        const s = `Hello, ${name.toUpperCase()}! ${1 + 1}`;
        return [s, 'a-b-c'.split('-').reverse().join(''), '  x '.trim(), 'ab'.padStart(4, '.')].join('|')
    "#;
    assert_eq!(
        assert_ok!(run(source)),
        Value::string("Hello, WORLD! 2|cba|x|..ab")
    );
}

#[test]
fn test_regex_literals_and_replace_callback() {
    let source = r#"
        const re = /(\d+)-(\d+)/g;
        const swapped = '1-2 and 30-40'.replace(re, (m, a, b) => b + '-' + a);
        const found = /^h.llo$/i.test('HELLO');
        return swapped + ' ' + found
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("2-1 and 40-30 true"));
}

#[test]
fn test_array_higher_order_methods() {
    let source = r#"
        const xs = [5, 1, 4, 2, 3];
        const sorted = [...xs].sort((a, b) => a - b);
        const evens = xs.filter(x => x % 2 === 0).map(x => x * 10);
        const total = xs.reduce((acc, x) => acc + x, 0);
        return sorted.concat(evens, [total], [[7, [8]]].flat(2))
    "#;
    assert_eq!(
        numbers(&assert_ok!(run(source))),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 40.0, 20.0, 15.0, 7.0, 8.0]
    );
}

#[test]
fn test_object_statics_and_spread() {
    let source = r#"
        const base = { a: 1, b: 2 };
        const merged = { ...base, b: 3, c: 4 };
        const frozen = Object.freeze({ x: 1 });
        let blocked = false;
        try { frozen.x = 2 } catch (e) { blocked = e instanceof TypeError }
        return Object.keys(merged).join('') + Object.values(merged).join('') + blocked
    "#;
    assert_eq!(assert_ok!(run(source)), Value::string("abc134true"));
}

#[test]
fn test_numbers_bigint_and_exponent() {
    let source = r#"
        const big = 2n ** 64n;
        return [
            0x1f + 0o17 + 0b101 + 1_000,
            2 ** 3 ** 2,
            (0.1 + 0.2).toFixed(2),
            big.toString(),
            typeof big,
            parseInt('42px'),
            Number.isInteger(5.0)
        ].join(' ')
    "#;
    assert_eq!(
        assert_ok!(run(source)),
        Value::string("1051 512 0.30 18446744073709551616 bigint 42 true")
    );
}

#[test]
fn test_error_constructors_and_instanceof() {
    let source = r#"
        const e = new RangeError('out', { cause: 'why' });
        return [e.name, e.message, e.cause, e instanceof RangeError, e instanceof TypeError, String(e)].join(',')
    "#;
    assert_eq!(
        assert_ok!(run(source)),
        Value::string("RangeError,out,why,true,false,RangeError: out")
    );
}

#[test]
fn test_date_uses_utc() {
    let source = r#"
        const d = new Date(Date.UTC(2024, 0, 31, 12, 30));
        return d.toISOString() + ' ' + d.getMonth() + ' ' + d.getTimezoneOffset()
    "#;
    assert_eq!(
        assert_ok!(run(source)),
        Value::string("2024-01-31T12:30:00.000Z 0 0")
    );
}

#[test]
fn test_function_call_apply_bind() {
    let source = r#"
        function greet(greeting, mark) { return greeting + ' ' + this.name + mark }
        const who = { name: 'Ada' };
        const bound = greet.bind(who, 'Hey');
        return [greet.call(who, 'Hi', '!'), greet.apply(who, ['Yo', '?']), bound('.'), bound.name].join('|')
    "#;
    assert_eq!(
        assert_ok!(run(source)),
        Value::string("Hi Ada!|Yo Ada?|Hey Ada.|bound greet")
    );
}
