//! Promise state shared between the value and the futures awaiting it

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use super::values::Value;

#[derive(Debug, Clone)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

#[derive(Debug)]
pub struct PromiseCell {
    state: RefCell<PromiseState>,
    wakers: RefCell<Vec<Waker>>,
    /// A reaction was attached, so a rejection is observed
    handled: Cell<bool>,
}

impl Default for PromiseCell {
    fn default() -> Self {
        PromiseCell {
            state: RefCell::new(PromiseState::Pending),
            wakers: RefCell::new(Vec::new()),
            handled: Cell::new(false),
        }
    }
}

impl PromiseCell {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn state(&self) -> PromiseState {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), PromiseState::Pending)
    }

    pub fn fulfill(&self, value: Value) {
        self.settle(PromiseState::Fulfilled(value));
    }

    pub fn reject(&self, reason: Value) {
        self.settle(PromiseState::Rejected(reason));
    }

    /// First settlement wins; later calls are ignored
    fn settle(&self, state: PromiseState) {
        {
            let mut current = self.state.borrow_mut();
            if !matches!(*current, PromiseState::Pending) {
                return;
            }
            *current = state;
        }
        let wakers = std::mem::take(&mut *self.wakers.borrow_mut());
        for waker in wakers {
            waker.wake();
        }
    }

    pub fn mark_handled(&self) {
        self.handled.set(true);
    }

    pub fn is_handled(&self) -> bool {
        self.handled.get()
    }

    /// Future resolving once the promise settles
    pub fn wait(self: &Rc<Self>) -> PromiseFuture {
        self.mark_handled();
        PromiseFuture { cell: self.clone() }
    }
}

pub struct PromiseFuture {
    cell: Rc<PromiseCell>,
}

impl Future for PromiseFuture {
    type Output = Result<Value, Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.cell.state() {
            PromiseState::Fulfilled(v) => Poll::Ready(Ok(v)),
            PromiseState::Rejected(e) => Poll::Ready(Err(e)),
            PromiseState::Pending => {
                let mut wakers = self.cell.wakers.borrow_mut();
                if !wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
