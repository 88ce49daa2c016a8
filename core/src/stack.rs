//! Stack headroom for recursive parsing and evaluation
//!
//! Parsing and evaluation recurse on the shape of their input, so hostile
//! sources could otherwise overflow the host thread. Both measure how far
//! the stack has grown since a mark taken at their entry point and fail with
//! a recoverable error once a budget is spent.

use std::cell::Cell;

/// Nested calls of non-async sandbox functions before a `RangeError`
pub const MAX_CALL_DEPTH: usize = 256;

/// Stack one drain of the job queue may use
pub const EVAL_STACK_BUDGET: usize = 1024 * 1024;

/// Stack one parse may use
pub const PARSE_STACK_BUDGET: usize = 512 * 1024;

#[inline(always)]
fn position() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// A point on the current thread's stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackMark(usize);

impl StackMark {
    pub fn here() -> Self {
        StackMark(position())
    }

    /// Bytes the stack grew since the mark (stacks grow downward on every
    /// supported target)
    pub fn used(self) -> usize {
        self.0.saturating_sub(position())
    }
}

thread_local! {
    static PARSE_MARK: Cell<Option<StackMark>> = const { Cell::new(None) };
}

/// Run `f` as one parse; nested parses share the outermost budget
pub fn parse_scope<T>(f: impl FnOnce() -> T) -> T {
    let outermost = PARSE_MARK.with(|mark| {
        if mark.get().is_some() {
            return false;
        }
        mark.set(Some(StackMark::here()));
        true
    });
    let result = f();
    if outermost {
        PARSE_MARK.with(|mark| mark.set(None));
    }
    result
}

/// Whether the running parse has spent its stack budget
pub fn parse_exhausted() -> bool {
    PARSE_MARK.with(|mark| mark.get().is_some_and(|m| m.used() > PARSE_STACK_BUDGET))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recurse(depth: usize, mark: StackMark) -> usize {
        let pad = std::hint::black_box([0u8; 256]);
        if depth == 0 {
            return mark.used() + pad[0] as usize;
        }
        recurse(depth - 1, mark) + pad[1] as usize
    }

    #[test]
    fn test_usage_grows_with_recursion() {
        let mark = StackMark::here();
        let shallow = recurse(1, mark);
        let deep = recurse(64, mark);
        assert!(deep > shallow);
        assert!(deep >= 64 * 256);
    }

    #[test]
    fn test_parse_scope_is_reentrant() {
        assert!(!parse_exhausted());
        let inner = parse_scope(|| {
            let outer = PARSE_MARK.with(Cell::get);
            parse_scope(|| PARSE_MARK.with(Cell::get) == outer)
        });
        assert!(inner);
        assert!(PARSE_MARK.with(Cell::get).is_none());
    }
}
