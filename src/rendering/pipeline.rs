//! Progressive, cancellable drawing of a render pass.
//!
//! A pass is split into [`RenderTask`]s, one per layer, in painting order.
//! The first task is drawn right away by the caller so the canvas never
//! stays blank; the others run afterwards, one at a time, either as a
//! self-scheduling [`RenderChain`] or through a [`RenderQueue`] drained by a
//! background dispatcher. Both check for cancellation between tasks only: a
//! task that has started always finishes.
//!
//! Running the pipeline spawns tokio tasks, so it must be started from within
//! a tokio runtime.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Lifecycle of one task: `Pending -> Running -> Done`, or
/// `Pending -> Skipped` once its pass is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    Running,
    Done,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Done | TaskState::Skipped)
    }
}

type DrawFn = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// A deferred drawing step.
pub struct RenderTask {
    label: String,
    draw: DrawFn,
}

impl RenderTask {
    pub fn new(
        label: impl Into<String>,
        draw: impl FnOnce() -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            draw: Box::new(draw),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the task, containing errors and panics. A failed task is logged
    /// and counts as finished.
    fn run(self) {
        let RenderTask { label, draw } = self;
        match catch_unwind(AssertUnwindSafe(draw)) {
            Ok(Ok(())) => log::debug!("render task {} done", label),
            Ok(Err(e)) => log::error!("render task {} failed: {}", label, e),
            Err(panic) => {
                log::error!("render task {} panicked: {}", label, panic_message(&*panic))
            }
        }
    }
}

impl fmt::Debug for RenderTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTask").field("label", &self.label).finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

type Completion = Shared<BoxFuture<'static, ()>>;

fn completion_of(handle: tokio::task::JoinHandle<()>) -> Completion {
    async move {
        if let Err(e) = handle.await {
            log::error!("render dispatcher stopped: {}", e);
        }
    }
    .boxed()
    .shared()
}

/// Task states of one pass, indexed by task position.
#[derive(Debug, Clone, Default)]
struct TaskStates(Arc<Mutex<Vec<TaskState>>>);

impl TaskStates {
    fn with_len(len: usize) -> Self {
        Self(Arc::new(Mutex::new(vec![TaskState::Pending; len])))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TaskState>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn snapshot(&self) -> Vec<TaskState> {
        self.lock().clone()
    }

    /// Moves a task from `from` to `to`; false if it was elsewhere
    fn transition(&self, index: usize, from: TaskState, to: TaskState) -> bool {
        let mut states = self.lock();
        match states.get_mut(index) {
            Some(state) if *state == from => {
                *state = to;
                true
            }
            _ => false,
        }
    }

    fn skip_pending(&self) -> usize {
        let mut skipped = 0;
        for state in self.lock().iter_mut() {
            if *state == TaskState::Pending {
                *state = TaskState::Skipped;
                skipped += 1;
            }
        }
        skipped
    }

    /// Runs a task unless it was skipped before it could start
    fn run(&self, index: usize, task: RenderTask) -> bool {
        if !self.transition(index, TaskState::Pending, TaskState::Running) {
            return false;
        }
        task.run();
        self.transition(index, TaskState::Running, TaskState::Done);
        true
    }
}

/// Sequential chain of render tasks.
///
/// Link *k* always completes before link *k + 1* starts, and control is
/// yielded back to the runtime between links so new input can cancel the
/// rest of the chain.
#[derive(Clone)]
pub struct RenderChain {
    token: CancellationToken,
    states: TaskStates,
    completion: Completion,
}

impl RenderChain {
    /// Draws the first task synchronously, then chains the others.
    pub fn start(tasks: Vec<RenderTask>) -> Self {
        Self::start_with_token(tasks, CancellationToken::new())
    }

    /// Like [`start`](Self::start), cancelled together with `token`.
    pub fn start_with_token(tasks: Vec<RenderTask>, token: CancellationToken) -> Self {
        let states = TaskStates::with_len(tasks.len());
        let mut links = tasks.into_iter().enumerate();

        if let Some((index, first)) = links.next() {
            if token.is_cancelled() {
                states.skip_pending();
            } else {
                states.run(index, first);
            }
        }

        let remaining: Vec<(usize, RenderTask)> = links.collect();
        log::debug!("render chain started, {} links pending", remaining.len());

        let handle = tokio::spawn(run_links(remaining, states.clone(), token.clone()));
        Self {
            token,
            states,
            completion: completion_of(handle),
        }
    }

    /// Stops every link that has not started yet
    pub fn cancel(&self) {
        self.token.cancel();
        let skipped = self.states.skip_pending();
        if skipped > 0 {
            log::debug!("render chain cancelled, {} links skipped", skipped);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn states(&self) -> Vec<TaskState> {
        self.states.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.states.snapshot().iter().all(|s| s.is_terminal())
    }

    /// Resolves once no link is running or will run
    pub async fn wait_for_completion(&self) {
        self.completion.clone().await
    }
}

impl fmt::Debug for RenderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderChain")
            .field("states", &self.states())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

async fn run_links(links: Vec<(usize, RenderTask)>, states: TaskStates, token: CancellationToken) {
    for (index, task) in links {
        if token.is_cancelled() {
            break;
        }
        states.run(index, task);
        tokio::task::yield_now().await;
    }
    if token.is_cancelled() {
        states.skip_pending();
    }
}

struct QueueInner {
    items: VecDeque<(usize, RenderTask)>,
    states: Vec<TaskState>,
    closed: bool,
}

/// FIFO queue of render tasks drained by a background dispatcher, one item
/// at a time.
///
/// Producers may keep pushing while the queue drains; [`close`](Self::close)
/// tells the dispatcher to stop once the queue runs dry. The deque and the
/// task states share one lock.
#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<Mutex<QueueInner>>,
    wake: Arc<Notify>,
    token: CancellationToken,
    completion: Completion,
}

impl RenderQueue {
    /// Creates an open, empty queue and its dispatcher
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    pub fn with_token(token: CancellationToken) -> Self {
        let inner = Arc::new(Mutex::new(QueueInner {
            items: VecDeque::new(),
            states: Vec::new(),
            closed: false,
        }));
        let wake = Arc::new(Notify::new());

        let handle = tokio::spawn(dispatch(inner.clone(), wake.clone(), token.clone()));
        Self {
            inner,
            wake,
            token,
            completion: completion_of(handle),
        }
    }

    /// Draws the first task synchronously, queues the others and closes the
    /// queue.
    pub fn start(tasks: Vec<RenderTask>) -> Self {
        Self::start_with_token(tasks, CancellationToken::new())
    }

    pub fn start_with_token(tasks: Vec<RenderTask>, token: CancellationToken) -> Self {
        let queue = Self::with_token(token);
        let mut tasks = tasks.into_iter();

        if let Some(first) = tasks.next() {
            let index = queue.register(TaskState::Pending);
            if queue.token.is_cancelled() {
                queue.set_state(index, TaskState::Skipped);
            } else {
                queue.set_state(index, TaskState::Running);
                first.run();
                queue.set_state(index, TaskState::Done);
            }
        }
        for task in tasks {
            queue.push(task);
        }
        queue.close();
        queue
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        lock_inner(&self.inner)
    }

    fn register(&self, state: TaskState) -> usize {
        let mut inner = self.lock();
        inner.states.push(state);
        inner.states.len() - 1
    }

    fn set_state(&self, index: usize, state: TaskState) {
        if let Some(slot) = self.lock().states.get_mut(index) {
            *slot = state;
        }
    }

    /// Appends a task. Pushing onto a cancelled or closed queue only records
    /// the task as skipped.
    pub fn push(&self, task: RenderTask) {
        {
            let mut inner = self.lock();
            let index = inner.states.len();
            if self.token.is_cancelled() || inner.closed {
                log::debug!("render task {} dropped, queue no longer accepts work", task.label());
                inner.states.push(TaskState::Skipped);
                return;
            }
            inner.states.push(TaskState::Pending);
            inner.items.push_back((index, task));
        }
        self.wake.notify_one();
    }

    /// No more tasks will be pushed
    pub fn close(&self) {
        self.lock().closed = true;
        self.wake.notify_one();
    }

    /// Drops every queued task; the one being drawn finishes
    pub fn cancel(&self) {
        self.token.cancel();
        let skipped = skip_queued(&mut self.lock());
        if skipped > 0 {
            log::debug!("render queue cancelled, {} items skipped", skipped);
        }
        self.wake.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn states(&self) -> Vec<TaskState> {
        self.lock().states.clone()
    }

    /// Items waiting to be drawn
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves once the dispatcher has stopped, which needs the queue to be
    /// closed or cancelled
    pub async fn wait_for_completion(&self) {
        self.completion.clone().await
    }
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RenderQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderQueue")
            .field("states", &self.states())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

fn lock_inner(inner: &Mutex<QueueInner>) -> MutexGuard<'_, QueueInner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn skip_queued(inner: &mut QueueInner) -> usize {
    let drained: Vec<usize> = inner.items.drain(..).map(|(index, _)| index).collect();
    for index in &drained {
        if let Some(state) = inner.states.get_mut(*index) {
            *state = TaskState::Skipped;
        }
    }
    drained.len()
}

async fn dispatch(inner: Arc<Mutex<QueueInner>>, wake: Arc<Notify>, token: CancellationToken) {
    loop {
        if token.is_cancelled() {
            skip_queued(&mut lock_inner(&inner));
            break;
        }

        let next = {
            let mut guard = lock_inner(&inner);
            match guard.items.pop_front() {
                Some((index, task)) => {
                    if let Some(state) = guard.states.get_mut(index) {
                        *state = TaskState::Running;
                    }
                    Some((index, task))
                }
                None if guard.closed => break,
                None => None,
            }
        };

        match next {
            Some((index, task)) => {
                task.run();
                if let Some(state) = lock_inner(&inner).states.get_mut(index) {
                    *state = TaskState::Done;
                }
                tokio::task::yield_now().await;
            }
            None => {
                tokio::select! {
                    _ = wake.notified() => {}
                    _ = token.cancelled() => {}
                }
            }
        }
    }
    log::debug!("render queue drained");
}
