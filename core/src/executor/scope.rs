//! Lexical environments
//!
//! Scopes form a tree through `parent` links. A scope is one of:
//! - the root, owning the sandbox-wide global object
//! - a seed scope, exposing the properties of a host object as variables
//! - a function frame, the target of `var` and the holder of `this`
//! - a block scope (blocks, loop iterations, `catch`)

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::errors::{Exec, ExecError, SandboxError};
use super::types::{Obj, Value};
use crate::parser::ast::VarKind;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import",
    "in", "instanceof", "let", "new", "null", "return", "super", "switch", "this", "throw", "true",
    "try", "typeof", "var", "void", "while", "with",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
}

impl From<VarKind> for BindingKind {
    fn from(kind: VarKind) -> Self {
        match kind {
            VarKind::Var => BindingKind::Var,
            VarKind::Let => BindingKind::Let,
            VarKind::Const => BindingKind::Const,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub kind: BindingKind,
}

/// Function-call boundary
#[derive(Debug, Clone)]
pub struct Frame {
    /// `None` for arrow functions, which see the enclosing `this`
    pub this: Option<Value>,
    pub is_async: bool,
}

/// Where a name resolved to
#[derive(Debug, Clone)]
pub enum Reference {
    Binding { scope: Rc<Scope>, name: String },
    /// Existing property of a host seed object
    Seed { object: Obj, name: String },
    /// Property of the global object
    Global { object: Obj, name: String },
    Unresolved { name: String },
}

#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<Rc<Scope>>,
    bindings: RefCell<HashMap<String, Binding>>,
    seed: Option<Obj>,
    frame: Option<Frame>,
    global: Option<Obj>,
}

impl Scope {
    pub fn root(global: Obj) -> Rc<Self> {
        Rc::new(Scope {
            frame: Some(Frame {
                this: Some(Value::Undefined),
                is_async: false,
            }),
            global: Some(global),
            ..Scope::default()
        })
    }

    pub fn seeded(parent: &Rc<Scope>, seed: Obj) -> Rc<Self> {
        Rc::new(Scope {
            parent: Some(parent.clone()),
            seed: Some(seed),
            ..Scope::default()
        })
    }

    pub fn function(parent: &Rc<Scope>, this: Option<Value>, is_async: bool) -> Rc<Self> {
        Rc::new(Scope {
            parent: Some(parent.clone()),
            frame: Some(Frame { this, is_async }),
            ..Scope::default()
        })
    }

    pub fn block(parent: &Rc<Scope>) -> Rc<Self> {
        Rc::new(Scope {
            parent: Some(parent.clone()),
            ..Scope::default()
        })
    }

    /// Sibling block scope starting with a copy of this scope's bindings
    ///
    /// Each loop iteration runs in a fork so closures capture that
    /// iteration's `let` values.
    pub fn fork(self: &Rc<Self>) -> Rc<Self> {
        Rc::new(Scope {
            parent: self.parent.clone(),
            bindings: RefCell::new(self.bindings.borrow().clone()),
            ..Scope::default()
        })
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    pub fn is_frame(&self) -> bool {
        self.frame.is_some()
    }

    /* ===================== Resolution ===================== */

    pub fn lookup(self: &Rc<Self>, name: &str) -> Reference {
        let mut scope = self.clone();
        loop {
            if scope.bindings.borrow().contains_key(name) {
                return Reference::Binding {
                    scope,
                    name: name.to_string(),
                };
            }
            if let Some(seed) = &scope.seed {
                if seed.borrow().props.contains(name) {
                    return Reference::Seed {
                        object: seed.clone(),
                        name: name.to_string(),
                    };
                }
            }
            if let Some(global) = &scope.global {
                if global.borrow().props.contains(name) {
                    return Reference::Global {
                        object: global.clone(),
                        name: name.to_string(),
                    };
                }
            }
            match &scope.parent {
                Some(parent) => scope = parent.clone(),
                None => {
                    return Reference::Unresolved {
                        name: name.to_string(),
                    }
                }
            }
        }
    }

    pub fn get_binding(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).map(|b| b.value.clone())
    }

    /// Overwrite an existing binding of this scope
    pub fn assign_binding(&self, name: &str, value: Value) -> Exec<()> {
        let mut bindings = self.bindings.borrow_mut();
        match bindings.get_mut(name) {
            Some(binding) if binding.kind == BindingKind::Const => {
                Err(SandboxError::AssignConst {
                    name: name.to_string(),
                }
                .into())
            }
            Some(binding) => {
                binding.value = value;
                Ok(())
            }
            None => Err(ExecError::reference_error(format!("{name} is not defined"))),
        }
    }

    /// `this` of the nearest non-arrow function
    pub fn this(&self) -> Value {
        let mut scope = self;
        loop {
            if let Some(Frame { this: Some(this), .. }) = &scope.frame {
                return this.clone();
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return Value::Undefined,
            }
        }
    }

    /// Whether `await` is legal here
    pub fn in_async(&self) -> bool {
        let mut scope = self;
        loop {
            if let Some(frame) = &scope.frame {
                return frame.is_async;
            }
            match &scope.parent {
                Some(parent) => scope = parent,
                None => return false,
            }
        }
    }

    fn frame_scope(self: &Rc<Self>) -> Rc<Scope> {
        let mut scope = self.clone();
        while scope.frame.is_none() {
            match &scope.parent {
                Some(parent) => scope = parent.clone(),
                None => break,
            }
        }
        scope
    }

    /* ===================== Declaration ===================== */

    /// Declare a variable; `var` lands in the nearest function frame
    pub fn declare(self: &Rc<Self>, name: &str, kind: VarKind, value: Option<Value>) -> Exec<()> {
        if is_reserved(name) {
            return Err(ExecError::syntax_error(format!("Unexpected reserved word '{name}'")));
        }
        let kind = BindingKind::from(kind);
        let target = if kind == BindingKind::Var {
            self.frame_scope()
        } else {
            self.clone()
        };

        let mut bindings = target.bindings.borrow_mut();
        match bindings.get_mut(name) {
            Some(existing)
                if kind == BindingKind::Var
                    && matches!(existing.kind, BindingKind::Var | BindingKind::Function) =>
            {
                if let Some(value) = value {
                    existing.value = value;
                }
                Ok(())
            }
            Some(_) => Err(already_declared(name)),
            None => {
                bindings.insert(
                    name.to_string(),
                    Binding {
                        value: value.unwrap_or_default(),
                        kind,
                    },
                );
                Ok(())
            }
        }
    }

    /// Bind a function declaration in this scope
    pub fn declare_function(&self, name: &str, value: Value) -> Exec<()> {
        if is_reserved(name) {
            return Err(ExecError::syntax_error(format!("Unexpected reserved word '{name}'")));
        }
        let mut bindings = self.bindings.borrow_mut();
        match bindings.get_mut(name) {
            Some(existing) if matches!(existing.kind, BindingKind::Let | BindingKind::Const) => {
                Err(already_declared(name))
            }
            Some(existing) => {
                existing.value = value;
                existing.kind = BindingKind::Function;
                Ok(())
            }
            None => {
                bindings.insert(
                    name.to_string(),
                    Binding {
                        value,
                        kind: BindingKind::Function,
                    },
                );
                Ok(())
            }
        }
    }

    /// Bind a parameter, `arguments` or a function's own name in a fresh frame
    pub fn bind_param(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(
            name.to_string(),
            Binding {
                value,
                kind: BindingKind::Var,
            },
        );
    }
}

fn already_declared(name: &str) -> ExecError {
    ExecError::syntax_error(format!("Identifier '{name}' has already been declared"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Rc<Scope> {
        let root = Scope::root(Obj::plain());
        Scope::function(&root, Some(Value::Undefined), false)
    }

    #[test]
    fn test_var_lands_in_function_frame() {
        let f = frame();
        let block = Scope::block(&f);
        block.declare("x", VarKind::Var, Some(1.into())).unwrap();
        assert_eq!(f.get_binding("x"), Some(Value::from(1)));
        assert_eq!(block.get_binding("x"), None);
    }

    #[test]
    fn test_redeclaration_rules() {
        let f = frame();
        f.declare("a", VarKind::Var, Some(1.into())).unwrap();
        f.declare("a", VarKind::Var, None).unwrap();
        assert_eq!(f.get_binding("a"), Some(Value::from(1)));
        f.declare("a", VarKind::Var, Some(2.into())).unwrap();
        assert_eq!(f.get_binding("a"), Some(Value::from(2)));

        f.declare("b", VarKind::Let, None).unwrap();
        assert!(f.declare("b", VarKind::Let, None).is_err());
        assert!(f.declare("b", VarKind::Var, None).is_err());
        assert!(f.declare_function("b", Value::Null).is_err());
        assert!(f.declare("while", VarKind::Let, None).is_err());
    }

    #[test]
    fn test_const_assignment_is_sandbox_error() {
        let f = frame();
        f.declare("k", VarKind::Const, Some(1.into())).unwrap();
        let err = f.assign_binding("k", 2.into()).unwrap_err();
        assert!(err.is_sandbox_error());
        assert_eq!(f.get_binding("k"), Some(Value::from(1)));
    }

    #[test]
    fn test_lookup_shadowing_and_globals() {
        let global = Obj::with_props([("Math", Value::Null)]);
        let root = Scope::root(global);
        let outer = Scope::function(&root, None, false);
        outer.declare("x", VarKind::Let, Some(1.into())).unwrap();
        let inner = Scope::block(&outer);
        inner.declare("x", VarKind::Let, Some(2.into())).unwrap();

        match inner.lookup("x") {
            Reference::Binding { scope, name } => {
                assert_eq!(scope.get_binding(&name), Some(Value::from(2)))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(inner.lookup("Math"), Reference::Global { .. }));
        assert!(matches!(inner.lookup("nope"), Reference::Unresolved { .. }));
    }

    #[test]
    fn test_fork_copies_bindings() {
        let f = frame();
        let head = Scope::block(&f);
        head.declare("i", VarKind::Let, Some(0.into())).unwrap();
        let iteration = head.fork();
        iteration.assign_binding("i", 1.into()).unwrap();
        assert_eq!(head.get_binding("i"), Some(Value::from(0)));
        assert_eq!(iteration.get_binding("i"), Some(Value::from(1)));
    }

    #[test]
    fn test_arrow_frames_inherit_this() {
        let root = Scope::root(Obj::plain());
        let f = Scope::function(&root, Some(Value::from("me")), false);
        let arrow = Scope::function(&f, None, true);
        assert_eq!(arrow.this(), Value::from("me"));
        assert!(arrow.in_async());
        assert!(!f.in_async());
    }
}
