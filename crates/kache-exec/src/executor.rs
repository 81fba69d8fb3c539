//! The topological executor: renders every node exactly once, respecting
//! dependencies, with bounded parallelism.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use kache_graph::{ConcurrentSet, Node};

use crate::error::ExecError;
use crate::node::ExecNode;
use crate::renderer::{default_command, render, CommandBuilder};
use crate::rewrite::rewrite;

/// How often the deadlock watchdog wakes to check for stalled progress.
const WATCHDOG_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Options forwarded to every node's renderer invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    /// Arguments appended after `kustomize build`, forwarded verbatim.
    pub renderer_args: Vec<String>,
}

/// Renders a dependency graph in topological order.
pub struct TopologicalExecutor {
    nodes: HashMap<PathBuf, ExecNode>,
    options: ExecutorOptions,
    command_builder: Box<CommandBuilder>,
    error_tx: Sender<ExecError>,
}

impl TopologicalExecutor {
    /// Build an executor over `nodes` (as emitted by the dependency
    /// analyzer) that invokes the real `kustomize` binary.
    pub fn new(nodes: Vec<Node>, options: ExecutorOptions) -> (Self, Receiver<ExecError>) {
        Self::with_command_builder(nodes, options, Box::new(default_command))
    }

    /// Like [`Self::new`], but with the renderer invocation parameterized —
    /// tests use this to substitute a stand-in for `kustomize`.
    pub fn with_command_builder(
        nodes: Vec<Node>,
        options: ExecutorOptions,
        command_builder: Box<CommandBuilder>,
    ) -> (Self, Receiver<ExecError>) {
        let (error_tx, error_rx) = bounded(1);

        let mut built = HashMap::with_capacity(nodes.len());
        for node in nodes {
            built.insert(
                node.dir,
                ExecNode {
                    manifest_path: node.manifest_path,
                    dependencies: ConcurrentSet::from_iter(node.dependencies),
                    depended_by: node.depended_by,
                },
            );
        }

        (
            Self {
                nodes: built,
                options,
                command_builder,
                error_tx,
            },
            error_rx,
        )
    }

    /// Run the full render + rewrite + fan-out pipeline using up to
    /// `workers` threads.
    ///
    /// # Errors
    /// Returns an error if the graph contains a cycle, or if any node
    /// failed to render or rewrite.
    pub fn run(self, workers: usize) -> Result<(), ExecError> {
        let total = self.nodes.len();
        if total == 0 {
            return Ok(());
        }

        let initially_ready: Vec<PathBuf> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.dependencies.is_empty())
            .map(|(dir, _)| dir.clone())
            .collect();

        if initially_ready.is_empty() {
            return Err(ExecError::Cycle { remaining: total });
        }

        // Sized to `total`: every node is enqueued at most once over the
        // life of a run, so no send can ever block.
        let (ready_tx, ready_rx) = bounded::<PathBuf>(total);

        let left_count = AtomicUsize::new(total - initially_ready.len());
        let err_count = AtomicUsize::new(0);
        // Net count of nodes currently sitting in the ready channel or being
        // worked on: incremented once per dispatch (initial seed, or
        // fan-out's enqueue), decremented once a worker finishes processing
        // a node (success or failure). Because a node's fan-out increment
        // for its dependents happens, in program order, strictly before its
        // own decrement, `outstanding` never transiently reads zero while a
        // freshly-unblocked dependent is in flight — and being a single
        // atomic, there is no two-read window for the watchdog to race.
        let outstanding = AtomicUsize::new(0);

        for dir in &initially_ready {
            outstanding.fetch_add(1, Ordering::SeqCst);
            let _ = ready_tx.send(dir.clone());
        }

        let ready_slot: Mutex<Option<Sender<PathBuf>>> = Mutex::new(Some(ready_tx));
        // No edges at all: nothing will ever decrement `left_count` past
        // zero, so the channel must close as soon as it is seeded.
        if left_count.load(Ordering::SeqCst) == 0 {
            close_sender(&ready_slot);
        }

        let (abort_tx, abort_rx) = bounded::<()>(0);
        let abort_slot: Mutex<Option<Sender<()>>> = Mutex::new(Some(abort_tx));

        // Plain references, not the values themselves: `&T` is `Copy`, so a
        // copy of each can move into every spawned closure while all of
        // them keep observing the same underlying state.
        let this = &self;
        let ready_slot_ref = &ready_slot;
        let abort_slot_ref = &abort_slot;
        let left_count_ref = &left_count;
        let err_count_ref = &err_count;
        let outstanding_ref = &outstanding;

        let workers = workers.max(1);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let worker_ready_rx = ready_rx.clone();
                let worker_abort_rx = abort_rx.clone();
                scope.spawn(move || {
                    this.worker_loop(
                        &worker_ready_rx,
                        &worker_abort_rx,
                        ready_slot_ref,
                        abort_slot_ref,
                        left_count_ref,
                        err_count_ref,
                        outstanding_ref,
                    );
                });
            }

            let watchdog_abort_rx = abort_rx.clone();
            scope.spawn(move || {
                this.watchdog(
                    &watchdog_abort_rx,
                    ready_slot_ref,
                    abort_slot_ref,
                    left_count_ref,
                    err_count_ref,
                    outstanding_ref,
                    total,
                );
            });
        });

        let failures = err_count.load(Ordering::SeqCst);
        if failures > 0 {
            return Err(ExecError::AggregateFailure { count: failures });
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn worker_loop(
        &self,
        ready_rx: &Receiver<PathBuf>,
        abort_rx: &Receiver<()>,
        ready_slot: &Mutex<Option<Sender<PathBuf>>>,
        abort_slot: &Mutex<Option<Sender<()>>>,
        left_count: &AtomicUsize,
        err_count: &AtomicUsize,
        outstanding: &AtomicUsize,
    ) {
        loop {
            crossbeam_channel::select! {
                recv(abort_rx) -> _ => return,
                recv(ready_rx) -> msg => {
                    let Ok(dir) = msg else { return };
                    let result = self.process_node(&dir, ready_slot, abort_rx, left_count, outstanding);
                    outstanding.fetch_sub(1, Ordering::SeqCst);

                    if let Err(err) = result {
                        err_count.fetch_add(1, Ordering::SeqCst);
                        let _ = self.error_tx.try_send(err);
                        close_sender(abort_slot);
                    }
                },
            }
        }
    }

    fn process_node(
        &self,
        dir: &Path,
        ready_slot: &Mutex<Option<Sender<PathBuf>>>,
        abort_rx: &Receiver<()>,
        left_count: &AtomicUsize,
        outstanding: &AtomicUsize,
    ) -> Result<(), ExecError> {
        let node = self
            .nodes
            .get(dir)
            .ok_or_else(|| ExecError::Cycle { remaining: 0 })?;

        let tempdir = tempfile::Builder::new()
            .prefix("kache-")
            .tempdir()
            .map_err(|source| ExecError::TempDir {
                dir: dir.display().to_string(),
                source,
            })?;

        let artifact = render(
            dir,
            tempdir.path(),
            &self.options.renderer_args,
            self.command_builder.as_ref(),
        )?;
        rewrite(&node.manifest_path, dir, &artifact)?;

        // The rendered artifact belongs to the caller now: don't let the
        // guard delete it on drop.
        let _ = tempdir.into_path();

        self.fan_out(dir, node, ready_slot, abort_rx, left_count, outstanding);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn fan_out(
        &self,
        dir: &Path,
        node: &ExecNode,
        ready_slot: &Mutex<Option<Sender<PathBuf>>>,
        abort_rx: &Receiver<()>,
        left_count: &AtomicUsize,
        outstanding: &AtomicUsize,
    ) {
        for dependent_dir in &node.depended_by {
            if is_aborted(abort_rx) {
                return;
            }

            let Some(dependent) = self.nodes.get(dependent_dir) else {
                continue;
            };

            let remaining = dependent.dependencies.delete_and_len(&dir.to_path_buf());
            if remaining == 0 {
                enqueue(dependent_dir.clone(), ready_slot, outstanding);
                if left_count.fetch_sub(1, Ordering::SeqCst) == 1 {
                    close_sender(ready_slot);
                }
            }
        }
    }

    fn watchdog(
        &self,
        abort_rx: &Receiver<()>,
        ready_slot: &Mutex<Option<Sender<PathBuf>>>,
        abort_slot: &Mutex<Option<Sender<()>>>,
        left_count: &AtomicUsize,
        err_count: &AtomicUsize,
        outstanding: &AtomicUsize,
        total: usize,
    ) {
        loop {
            match abort_rx.recv_timeout(WATCHDOG_POLL_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {
                    if left_count.load(Ordering::SeqCst) == 0 {
                        return;
                    }
                    if outstanding.load(Ordering::SeqCst) == 0 {
                        let remaining = left_count.load(Ordering::SeqCst).min(total);
                        err_count.fetch_add(1, Ordering::SeqCst);
                        let _ = self.error_tx.try_send(ExecError::Cycle { remaining });
                        close_sender(abort_slot);
                        close_sender(ready_slot);
                        return;
                    }
                }
            }
        }
    }
}

fn enqueue(dir: PathBuf, ready_slot: &Mutex<Option<Sender<PathBuf>>>, outstanding: &AtomicUsize) {
    let guard = ready_slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(tx) = guard.as_ref() {
        outstanding.fetch_add(1, Ordering::SeqCst);
        let _ = tx.try_send(dir);
    }
}

fn close_sender<T>(slot: &Mutex<Option<Sender<T>>>) {
    let mut guard = slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    guard.take();
}

fn is_aborted(abort_rx: &Receiver<()>) -> bool {
    matches!(abort_rx.try_recv(), Err(TryRecvError::Disconnected))
}
