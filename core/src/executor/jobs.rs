//! Single-threaded job queue
//!
//! Runs the main evaluation, async function bodies and promise reactions.
//! Each job gets its own waker that re-queues the job and forwards the
//! wakeup to whoever drives the queue (the host task in async mode).

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Wake, Waker};
use tracing::trace;

use crate::stack::StackMark;

pub type Job = Pin<Box<dyn Future<Output = ()>>>;

type ReadyQueue = Arc<Mutex<VecDeque<u64>>>;
type OuterWaker = Arc<Mutex<Option<Waker>>>;

struct JobWaker {
    id: u64,
    ready: ReadyQueue,
    outer: OuterWaker,
}

impl Wake for JobWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(self.id);
        let outer = self.outer.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(waker) = outer {
            waker.wake();
        }
    }
}

#[derive(Default)]
pub struct JobQueue {
    ready: ReadyQueue,
    outer: OuterWaker,
    jobs: RefCell<HashMap<u64, Job>>,
    next_id: Cell<u64>,
    /// Stack position of the outermost drain in progress
    mark: Cell<Option<StackMark>>,
}

impl JobQueue {
    fn waker(&self, id: u64) -> Waker {
        Waker::from(Arc::new(JobWaker {
            id,
            ready: self.ready.clone(),
            outer: self.outer.clone(),
        }))
    }

    fn reserve(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Queue a job to run on the next drain
    pub fn spawn(&self, job: impl Future<Output = ()> + 'static) -> u64 {
        let id = self.reserve();
        trace!(job = id, "job scheduled");
        self.jobs.borrow_mut().insert(id, Box::pin(job));
        self.waker(id).wake();
        id
    }

    /// Run a job up to its first suspension right away, queueing the rest
    pub fn spawn_eager(&self, job: impl Future<Output = ()> + 'static) -> u64 {
        let id = self.reserve();
        let mut job: Job = Box::pin(job);
        let waker = self.waker(id);
        let mut cx = Context::from_waker(&waker);
        if job.as_mut().poll(&mut cx).is_pending() {
            trace!(job = id, "job suspended");
            self.jobs.borrow_mut().insert(id, job);
        }
        id
    }

    /// Poll every ready job until none is left; true if anything ran
    pub fn run_ready(&self, outer: Option<&Waker>) -> bool {
        *self.outer.lock().unwrap_or_else(PoisonError::into_inner) = outer.cloned();
        let outermost = self.mark.get().is_none();
        if outermost {
            self.mark.set(Some(StackMark::here()));
        }
        let mut progressed = false;
        loop {
            let next = self
                .ready
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(id) = next else {
                break;
            };
            let Some(mut job) = self.jobs.borrow_mut().remove(&id) else {
                continue;
            };
            progressed = true;
            let waker = self.waker(id);
            let mut cx = Context::from_waker(&waker);
            if job.as_mut().poll(&mut cx).is_pending() {
                self.jobs.borrow_mut().insert(id, job);
            }
        }
        if outermost {
            self.mark.set(None);
        }
        progressed
    }

    /// Stack used by the drain in progress; zero outside of one
    pub fn stack_used(&self) -> usize {
        self.mark.get().map_or(0, StackMark::used)
    }

    /// Wake whoever drives the queue, without readying any job
    pub fn wake_outer(&self) {
        let outer = self.outer.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(waker) = outer {
            waker.wake();
        }
    }

    pub fn has_ready(&self) -> bool {
        !self
            .ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Jobs alive, ready or suspended
    pub fn pending(&self) -> usize {
        self.jobs.borrow().len()
    }

    /// Drop every job, used when an execution is abandoned
    pub fn clear(&self) {
        self.jobs.borrow_mut().clear();
        self.ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Future that yields to the queue once before completing
#[derive(Default)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

pub fn yield_now() -> YieldNow {
    YieldNow::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_jobs_run_in_fifo_order() {
        let queue = JobQueue::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            queue.spawn(async move { log.borrow_mut().push(i) });
        }
        assert!(queue.run_ready(None));
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_yield_interleaves_jobs() {
        let queue = JobQueue::default();
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = log.clone();
        queue.spawn_eager(async move {
            a.borrow_mut().push("a1");
            yield_now().await;
            a.borrow_mut().push("a2");
        });
        let b = log.clone();
        queue.spawn(async move { b.borrow_mut().push("b") });
        assert_eq!(*log.borrow(), vec!["a1"]);

        queue.run_ready(None);
        assert_eq!(*log.borrow(), vec!["a1", "a2", "b"]);
    }

    #[test]
    fn test_stack_is_measured_only_while_draining() {
        let queue = Rc::new(JobQueue::default());
        let seen = Rc::new(Cell::new(None));
        let (q, s) = (queue.clone(), seen.clone());
        queue.spawn(async move { s.set(Some(q.mark.get().is_some())) });
        assert_eq!(queue.stack_used(), 0);
        queue.run_ready(None);
        assert_eq!(seen.get(), Some(true));
        assert!(queue.mark.get().is_none());
    }
}
