//! Callable values: sandbox closures, native built-ins and bound functions

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use super::object::Object;
use super::values::{Obj, Value};
use crate::executor::context::ExecContext;
use crate::executor::errors::{ErrorKind, Exec};
use crate::executor::scope::Scope;
use crate::parser::FunctionDef;

/// Boxed evaluation future; the evaluator is one recursive async walker
pub type Eval<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub type NativeResult = Eval<'static, Exec<Value>>;

/// Native with no suspension points
pub type SyncFn = fn(&Rc<ExecContext>, &Value, &[Value]) -> Exec<Value>;

/// Native that calls back into sandboxed code and may suspend
pub type AsyncFn = fn(Rc<ExecContext>, Value, Vec<Value>) -> NativeResult;

pub type DynamicFn = Rc<dyn Fn(Rc<ExecContext>, Value, Vec<Value>) -> NativeResult>;

/// Native entry point usable from static member tables
#[derive(Clone, Copy)]
pub enum NativeImpl {
    Sync(SyncFn),
    Async(AsyncFn),
}

#[derive(Clone)]
pub enum NativeCode {
    Static(NativeImpl),
    /// Closures created at run time (promise resolvers)
    Dynamic(DynamicFn),
}

impl NativeCode {
    pub fn invoke(&self, ctx: Rc<ExecContext>, this: Value, args: Vec<Value>) -> NativeResult {
        match self {
            NativeCode::Static(NativeImpl::Sync(f)) => {
                let result = f(&ctx, &this, &args);
                Box::pin(std::future::ready(result))
            }
            NativeCode::Static(NativeImpl::Async(f)) => f(ctx, this, args),
            NativeCode::Dynamic(f) => f(ctx, this, args),
        }
    }
}

impl From<NativeImpl> for NativeCode {
    fn from(native: NativeImpl) -> Self {
        NativeCode::Static(native)
    }
}

/// What `instanceof` checks against a built-in constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brand {
    Object,
    Function,
    Array,
    Error(Option<ErrorKind>),
    RegExp,
    Map,
    Set,
    Promise,
    Date,
}

impl Brand {
    pub fn matches(self, object: &Object) -> bool {
        use super::object::ObjectKind as K;
        match (self, &object.kind) {
            (Brand::Object, _) => true,
            (Brand::Function, K::Function(_)) => true,
            (Brand::Array, K::Array(_)) => true,
            (Brand::Error(None), K::Error(_)) => true,
            (Brand::Error(Some(want)), K::Error(kind)) => want == *kind,
            (Brand::RegExp, K::RegExp(_)) => true,
            (Brand::Map, K::Map(_)) => true,
            (Brand::Set, K::Set(_)) => true,
            (Brand::Promise, K::Promise(_)) => true,
            (Brand::Date, K::Date(_)) => true,
            _ => false,
        }
    }
}

pub struct NativeFunction {
    pub name: Rc<str>,
    pub arity: usize,
    pub call: NativeCode,
    /// Behaviour under `new`; `None` means not a constructor
    pub construct: Option<NativeCode>,
    pub brand: Option<Brand>,
}

impl NativeFunction {
    pub fn new(name: &str, arity: usize, call: impl Into<NativeCode>) -> Self {
        NativeFunction {
            name: Rc::from(name),
            arity,
            call: call.into(),
            construct: None,
            brand: None,
        }
    }

    pub fn sync(name: &str, arity: usize, f: SyncFn) -> Self {
        Self::new(name, arity, NativeImpl::Sync(f))
    }

    pub fn dynamic(
        name: &str,
        arity: usize,
        f: impl Fn(Rc<ExecContext>, Value, Vec<Value>) -> NativeResult + 'static,
    ) -> Self {
        Self::new(name, arity, NativeCode::Dynamic(Rc::new(f)))
    }

    pub fn constructor(mut self, construct: impl Into<NativeCode>, brand: Brand) -> Self {
        self.construct = Some(construct.into());
        self.brand = Some(brand);
        self
    }
}

/// A function literal closed over its defining scope
pub struct Closure {
    pub def: Arc<FunctionDef>,
    pub scope: Rc<Scope>,
    pub ctx: Rc<ExecContext>,
    /// Name inferred from a declaration (`const f = () => {}`)
    pub inferred_name: Option<Rc<str>>,
}

impl Closure {
    pub fn name(&self) -> &str {
        self.def
            .name
            .as_deref()
            .or(self.inferred_name.as_deref())
            .unwrap_or("")
    }

    pub fn is_constructor(&self) -> bool {
        !self.def.is_arrow && !self.def.is_async
    }
}

pub struct BoundFunction {
    pub target: Obj,
    pub this: Value,
    pub args: Vec<Value>,
}

pub enum Function {
    Closure(Closure),
    Native(NativeFunction),
    Bound(BoundFunction),
}

impl Function {
    pub fn name(&self) -> String {
        match self {
            Function::Closure(c) => c.name().to_string(),
            Function::Native(n) => n.name.to_string(),
            Function::Bound(b) => match &b.target.borrow().kind {
                super::object::ObjectKind::Function(f) => format!("bound {}", f.name()),
                _ => "bound ".to_string(),
            },
        }
    }

    /// Declared parameter count, the `length` property
    pub fn arity(&self) -> usize {
        match self {
            Function::Closure(c) => c.def.params.len(),
            Function::Native(n) => n.arity,
            Function::Bound(b) => match &b.target.borrow().kind {
                super::object::ObjectKind::Function(f) => f.arity().saturating_sub(b.args.len()),
                _ => 0,
            },
        }
    }
}
