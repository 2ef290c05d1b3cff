//! Flow-scoped context fields.
//!
//! Every flow (a thread, or a future wrapped with [`ContextFutureExt`]) owns
//! a private stack of snapshots. Entering a scope pushes a copy of the
//! current snapshot with the new fields merged over it; dropping the returned
//! [`ContextGuard`] pops it again, on every exit path. Nothing is shared
//! between flows, so no locking is involved.
//!
//! Futures that are not wrapped share the stack of the thread polling them.
//! Two such futures interleaved on one thread, e.g. the branches of a
//! `tokio::join!`, see each other's scopes if they hold a guard across an
//! `.await`. Wrap each branch with [`ContextFutureExt::in_current_context`]
//! to give it a flow of its own.
//!
//! ```
//! use rag_observability::{context, fields};
//!
//! let _request = context::with_context(fields! { "request_id" => "r1" });
//! {
//!     let _stage = context::with_context(fields! { "stage" => "embed" });
//!     assert_eq!(context::current().len(), 2);
//! }
//! assert_eq!(context::current()["request_id"], "r1");
//! assert!(!context::current().contains_key("stage"));
//! ```

use crate::trace::TraceContext;
use crate::value::{self, Fields};
use pin_project::pin_project;
use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context as TaskContext, Poll};

static FRAME_ID: AtomicU64 = AtomicU64::new(1);
static GENERATION: AtomicU64 = AtomicU64::new(1);
// 0 is the thread's own flow
static FLOW_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static STACK: RefCell<ContextStack> = const { RefCell::new(ContextStack::new()) };
}

fn empty_fields() -> Arc<Fields> {
    static EMPTY: OnceLock<Arc<Fields>> = OnceLock::new();
    Arc::clone(EMPTY.get_or_init(|| Arc::new(Fields::new())))
}

#[derive(Debug, Clone)]
struct Frame {
    id: u64,
    flow: u64,
    fields: Arc<Fields>,
    trace: Option<TraceContext>,
}

/// The scope stack of one flow.
#[derive(Debug, Clone, Default)]
pub struct ContextStack {
    frames: Vec<Frame>,
    /// Changes on [`clear`]; guards from an older generation exit silently.
    generation: u64,
    flow: u64,
}

impl ContextStack {
    const fn new() -> Self {
        ContextStack {
            frames: Vec::new(),
            generation: 0,
            flow: 0,
        }
    }

    fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    fn push(&mut self, fields: Arc<Fields>, trace: Option<TraceContext>) -> (u64, u64, u64) {
        let id = FRAME_ID.fetch_add(1, Ordering::Relaxed);
        self.frames.push(Frame {
            id,
            flow: self.flow,
            fields,
            trace,
        });
        (id, self.generation, self.flow)
    }

    fn pop(&mut self, id: u64, generation: u64, flow: u64) {
        if flow != self.flow {
            if std::thread::panicking() {
                return;
            }
            panic!("log context guard exited outside the flow that entered it");
        }
        if generation != self.generation {
            return;
        }
        match self.frames.last() {
            Some(frame) if frame.id == id => {
                self.frames.pop();
            }
            _ if std::thread::panicking() => {
                // Unwinding through a misnested scope; restore what we can.
                if let Some(pos) = self.frames.iter().position(|frame| frame.id == id) {
                    self.frames.truncate(pos);
                }
            }
            _ => panic!("log context scopes must be exited innermost first"),
        }
    }
}

/// Handle for an entered scope. Dropping it restores the snapshot that was
/// current before the scope was entered.
///
/// A guard must not be held across an `.await` unless the future is wrapped
/// with [`in_current_context`](ContextFutureExt::in_current_context) or
/// [`with_log_context`](ContextFutureExt::with_log_context). Unwrapped, the
/// scope sits on the polling thread's stack and is visible to whatever else
/// that thread polls in the meantime. Dropping a guard while a different
/// wrapped flow is installed panics.
#[must_use = "the scope is exited as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    id: u64,
    generation: u64,
    flow: u64,
    // Scopes belong to the flow that entered them.
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    fn enter(fields: Arc<Fields>, trace: Option<TraceContext>) -> Self {
        let (id, generation, flow) = STACK.with(|stack| stack.borrow_mut().push(fields, trace));
        ContextGuard {
            id,
            generation,
            flow,
            _not_send: PhantomData,
        }
    }

    /// Exit the scope now. Equivalent to dropping the guard.
    pub fn exit(self) {}
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = STACK.try_with(|stack| stack.borrow_mut().pop(self.id, self.generation, self.flow));
    }
}

/// Enter a scope whose snapshot is the current one with `fields` merged over
/// it (new keys appended, existing keys overridden).
///
/// **Parameters**
/// - `fields`: context fields for the scope. An empty map enters a scope
///   that shares the current snapshot.
///
/// **Returns**
/// - A [`ContextGuard`]. The scope lasts until it is dropped; see its docs
///   before holding one across an `.await`.
pub fn with_context(fields: Fields) -> ContextGuard {
    let (base, trace) = STACK.with(|stack| {
        let stack = stack.borrow();
        match stack.top() {
            Some(frame) => (Arc::clone(&frame.fields), frame.trace.clone()),
            None => (empty_fields(), None),
        }
    });
    let merged = if fields.is_empty() {
        base
    } else {
        let mut merged = Fields::clone(&base);
        value::merge(&mut merged, &fields);
        Arc::new(merged)
    };
    ContextGuard::enter(merged, trace)
}

/// Enter a scope that keeps the current fields and attaches `trace` as the
/// active trace correlation.
pub fn with_trace(trace: TraceContext) -> ContextGuard {
    let base = STACK.with(|stack| {
        stack
            .borrow()
            .top()
            .map(|frame| Arc::clone(&frame.fields))
            .unwrap_or_else(empty_fields)
    });
    ContextGuard::enter(base, Some(trace))
}

/// Run `f` inside a scope with `fields` merged in.
pub fn scope<R>(fields: Fields, f: impl FnOnce() -> R) -> R {
    let _guard = with_context(fields);
    f()
}

/// The snapshot visible to the calling flow; empty outside any scope.
pub fn current() -> Fields {
    Fields::clone(&snapshot())
}

pub(crate) fn snapshot() -> Arc<Fields> {
    STACK
        .try_with(|stack| stack.borrow().top().map(|frame| Arc::clone(&frame.fields)))
        .ok()
        .flatten()
        .unwrap_or_else(empty_fields)
}

/// The innermost trace entered with [`with_trace`] on the calling flow.
pub fn current_trace() -> Option<TraceContext> {
    STACK
        .try_with(|stack| stack.borrow().top().and_then(|frame| frame.trace.clone()))
        .ok()
        .flatten()
}

/// Discard every active scope of the calling flow, e.g. between requests
/// served by a pooled worker thread. Guards still alive become no-ops.
pub fn clear() {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.frames.clear();
        stack.generation = GENERATION.fetch_add(1, Ordering::Relaxed);
    });
}

/// Copy of the calling flow's whole stack, for handing to another flow.
/// The copy is a new flow: guards entered on it cannot be exited elsewhere.
pub fn capture() -> ContextStack {
    let mut stack = STACK.with(|stack| stack.borrow().clone());
    stack.flow = FLOW_ID.fetch_add(1, Ordering::Relaxed);
    stack
}

/// A future that runs every poll with its own context stack installed.
#[pin_project]
#[derive(Debug)]
pub struct WithContext<F> {
    #[pin]
    inner: F,
    stack: ContextStack,
}

impl<F> WithContext<F> {
    pub fn new(inner: F, stack: ContextStack) -> Self {
        WithContext { inner, stack }
    }
}

/// Swaps a flow's stack in for the duration of a poll, and back out even if
/// the poll panics.
struct Installed<'a> {
    stack: &'a mut ContextStack,
}

impl<'a> Installed<'a> {
    fn new(stack: &'a mut ContextStack) -> Self {
        STACK.with(|current| std::mem::swap(&mut *current.borrow_mut(), stack));
        Installed { stack }
    }
}

impl Drop for Installed<'_> {
    fn drop(&mut self) {
        let _ = STACK.try_with(|current| std::mem::swap(&mut *current.borrow_mut(), self.stack));
    }
}

impl<F: Future> Future for WithContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _installed = Installed::new(this.stack);
        this.inner.poll(cx)
    }
}

/// Carry log context into futures, including ones spawned onto other threads.
pub trait ContextFutureExt: Future + Sized {
    /// Run this future with a copy of the caller's current context.
    fn in_current_context(self) -> WithContext<Self> {
        WithContext::new(self, capture())
    }

    /// Run this future with the caller's context plus `fields`.
    fn with_log_context(self, fields: Fields) -> WithContext<Self> {
        let _guard = with_context(fields);
        WithContext::new(self, capture())
    }
}

impl<F: Future> ContextFutureExt for F {}
