//! Tests for expression parsing: precedence, members, calls, literals

use super::helpers::parse_expr;
use crate::parser::ast::{
    AssignOp, BinaryOp, Expr, LogicalOp, MemberKey, PropKey, Property, UnaryOp, UpdateOp,
};

fn ident(expr: &Expr) -> &str {
    match expr {
        Expr::Ident { name } => name,
        other => panic!("expected identifier, got {other:?}"),
    }
}

/* ===================== Precedence ===================== */

#[test]
fn test_multiplication_binds_tighter() {
    let (expr, _) = parse_expr("a + b * c");
    let Expr::Binary { op, left, right } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Add);
    assert_eq!(ident(&left), "a");
    assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
}

#[test]
fn test_subtraction_is_left_associative() {
    let (expr, _) = parse_expr("a - b - c");
    let Expr::Binary { left, right, .. } = expr else {
        panic!("expected binary");
    };
    assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
    assert_eq!(ident(&right), "c");
}

#[test]
fn test_exponent_is_right_associative() {
    let (expr, _) = parse_expr("a ** b ** c");
    let Expr::Binary { op, left, right } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Exp);
    assert_eq!(ident(&left), "a");
    assert!(matches!(*right, Expr::Binary { op: BinaryOp::Exp, .. }));
}

#[test]
fn test_logical_operators() {
    let (expr, _) = parse_expr("a ?? b || c && d");
    let Expr::Logical { op, right, .. } = expr else {
        panic!("expected logical");
    };
    assert_eq!(op, LogicalOp::Nullish);
    let Expr::Logical { op, right, .. } = *right else {
        panic!("expected logical");
    };
    assert_eq!(op, LogicalOp::Or);
    assert!(matches!(*right, Expr::Logical { op: LogicalOp::And, .. }));
}

#[test]
fn test_unary_minus_inside_binary() {
    let (expr, _) = parse_expr("a - -b");
    let Expr::Binary { op, right, .. } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::Sub);
    assert!(matches!(*right, Expr::Unary { op: UnaryOp::Neg, .. }));
}

#[test]
fn test_typeof_and_in() {
    let (expr, _) = parse_expr("typeof a === 'string'");
    let Expr::Binary { op, left, .. } = expr else {
        panic!("expected binary");
    };
    assert_eq!(op, BinaryOp::StrictEq);
    assert!(matches!(*left, Expr::Unary { op: UnaryOp::Typeof, .. }));

    let (expr, _) = parse_expr("'x' in obj");
    assert!(matches!(expr, Expr::Binary { op: BinaryOp::In, .. }));
}

#[test]
fn test_conditional_nesting() {
    let (expr, _) = parse_expr("a ? b ? 1 : 2 : c ? 3 : 4");
    let Expr::Conditional {
        consequent,
        alternate,
        ..
    } = expr
    else {
        panic!("expected conditional");
    };
    assert!(matches!(*consequent, Expr::Conditional { .. }));
    assert!(matches!(*alternate, Expr::Conditional { .. }));
}

#[test]
fn test_assignment_is_right_associative() {
    let (expr, _) = parse_expr("a = b += 2");
    let Expr::Assign { op, value, .. } = expr else {
        panic!("expected assignment");
    };
    assert_eq!(op, AssignOp::Assign);
    assert!(matches!(*value, Expr::Assign { op: AssignOp::Add, .. }));
}

#[test]
fn test_sequence() {
    let (expr, _) = parse_expr("(a = 1, b = 2, a + b)");
    let Expr::Sequence { exprs } = expr else {
        panic!("expected sequence");
    };
    assert_eq!(exprs.len(), 3);
}

/* ===================== Members And Calls ===================== */

#[test]
fn test_member_chain_and_call() {
    let (expr, _) = parse_expr("a.b[c](1, ...rest)");
    let Expr::Call { callee, args, optional } = expr else {
        panic!("expected call");
    };
    assert!(!optional);
    assert_eq!(args.len(), 2);
    assert!(matches!(args[1], Expr::Spread { .. }));
    let Expr::Member { property, object, .. } = *callee else {
        panic!("expected member");
    };
    assert!(matches!(property, MemberKey::Computed { .. }));
    assert!(matches!(*object, Expr::Member { property: MemberKey::Name { .. }, .. }));
}

#[test]
fn test_optional_chaining() {
    let (expr, _) = parse_expr("a?.b?.(1)?.[0]");
    let Expr::Member { optional, object, .. } = expr else {
        panic!("expected member");
    };
    assert!(optional);
    let Expr::Call { optional, .. } = *object else {
        panic!("expected call");
    };
    assert!(optional);
}

#[test]
fn test_new_with_member_callee() {
    let (expr, _) = parse_expr("new a.B(1).c");
    let Expr::Member { object, .. } = expr else {
        panic!("expected member");
    };
    let Expr::New { callee, args } = *object else {
        panic!("expected new");
    };
    assert_eq!(args.len(), 1);
    assert!(matches!(*callee, Expr::Member { .. }));
}

#[test]
fn test_new_without_arguments() {
    let (expr, _) = parse_expr("new Map");
    let Expr::New { callee, args } = expr else {
        panic!("expected new");
    };
    assert!(args.is_empty());
    assert_eq!(ident(&callee), "Map");
}

#[test]
fn test_update_expressions() {
    let (expr, _) = parse_expr("i++");
    assert!(matches!(
        expr,
        Expr::Update {
            op: UpdateOp::Inc,
            prefix: false,
            ..
        }
    ));
    let (expr, _) = parse_expr("--a.b");
    assert!(matches!(
        expr,
        Expr::Update {
            op: UpdateOp::Dec,
            prefix: true,
            ..
        }
    ));
}

/* ===================== Literals ===================== */

#[test]
fn test_string_literal_uses_constants_pool() {
    let (expr, program) = parse_expr(r#""a\tb""#);
    let Expr::Str { idx } = expr else {
        panic!("expected string");
    };
    assert_eq!(program.constants.string(idx), Some("a\tb"));
}

#[test]
fn test_template_literal() {
    let (expr, program) = parse_expr("`x=${x + 1}!`");
    let Expr::Template { idx } = expr else {
        panic!("expected template");
    };
    let template = program.constants.template(idx).unwrap();
    assert_eq!(template.parts, vec!["x=".to_string(), "!".to_string()]);
    assert!(matches!(template.exprs[0], Expr::Binary { op: BinaryOp::Add, .. }));
}

#[test]
fn test_regex_literal() {
    let (expr, program) = parse_expr("/a+b/g.test(s)");
    let Expr::Call { callee, .. } = expr else {
        panic!("expected call");
    };
    let Expr::Member { object, .. } = *callee else {
        panic!("expected member");
    };
    let Expr::Regex { idx } = *object else {
        panic!("expected regex");
    };
    let regex = program.constants.regex(idx).unwrap();
    assert_eq!(regex.pattern, "a+b");
    assert_eq!(regex.flags, "g");
}

#[test]
fn test_array_holes_and_trailing_comma() {
    let (expr, _) = parse_expr("[1, , 3,]");
    let Expr::Array { elements } = expr else {
        panic!("expected array");
    };
    assert_eq!(elements.len(), 3);
    assert!(matches!(elements[1], Expr::Undefined));
}

#[test]
fn test_object_literal_forms() {
    let (expr, _) = parse_expr("({ a: 1, 'b': 2, [c]: 3, d, ...e, f() { return 1 }, 7: 0 })");
    let Expr::Object { props } = expr else {
        panic!("expected object");
    };
    assert_eq!(props.len(), 7);
    let key = |i: usize| match &props[i] {
        Property::KeyValue {
            key: PropKey::Static { name },
            ..
        } => name.clone(),
        _ => String::new(),
    };
    assert_eq!(key(0), "a");
    assert_eq!(key(1), "b");
    assert!(matches!(
        &props[2],
        Property::KeyValue {
            key: PropKey::Computed { .. },
            ..
        }
    ));
    assert_eq!(key(3), "d");
    assert!(matches!(&props[4], Property::Spread { .. }));
    assert!(matches!(
        &props[5],
        Property::KeyValue {
            value: Expr::Function { .. },
            ..
        }
    ));
    assert_eq!(key(6), "7");
}

#[test]
fn test_bigint_literal() {
    let (expr, _) = parse_expr("123n");
    assert!(matches!(expr, Expr::BigInt { digits } if digits == "123"));
}

/* ===================== Functions ===================== */

#[test]
fn test_arrow_functions() {
    let (expr, _) = parse_expr("(a, ...b) => a + b.length");
    let Expr::Function { def } = expr else {
        panic!("expected function");
    };
    assert!(def.is_arrow);
    assert_eq!(def.params, vec!["a".to_string()]);
    assert_eq!(def.rest.as_deref(), Some("b"));
    assert_eq!(def.body.len(), 1);

    let (expr, _) = parse_expr("async x => { await x }");
    let Expr::Function { def } = expr else {
        panic!("expected function");
    };
    assert!(def.is_async && def.is_arrow);
}

#[test]
fn test_named_function_expression_binds_name() {
    let (expr, _) = parse_expr("(function fact(n) { return n < 2 ? 1 : n * fact(n - 1) })");
    let Expr::Function { def } = expr else {
        panic!("expected function");
    };
    assert_eq!(def.name.as_deref(), Some("fact"));
    assert!(def.binds_name);
}
