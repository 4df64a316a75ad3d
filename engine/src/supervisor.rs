use crate::context::{CancelCause, CancelHandle};
use crate::group::{GroupReceivers, QueryGroup};
use model::{GroupName, QueryError, QueryResult};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Zero means the run is only bounded by completion or an explicit cancel.
    pub max_duration: Duration,
    pub cancel_on_first_error: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn cancel_on_first_error(mut self, cancel_on_first_error: bool) -> Self {
        self.cancel_on_first_error = cancel_on_first_error;
        self
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub elapsed: Duration,
    pub cause: CancelCause,
    pub errors: usize,
    pub results: usize,
    pub groups_completed: usize,
}

#[derive(Debug)]
enum GroupEvent {
    Error(QueryError),
    Result(QueryResult),
    WorkerDone,
}

#[derive(Debug)]
struct SupervisorEvent {
    group: usize,
    event: GroupEvent,
}

/// Counts per-worker completion signals until each group is fully done.
#[derive(Debug, Default)]
struct CompletionTracker {
    names: Vec<GroupName>,
    remaining: Vec<usize>,
    completed: usize,
}

impl CompletionTracker {
    fn register(&mut self, name: GroupName, expected: usize) -> usize {
        self.names.push(name);
        self.remaining.push(expected);
        self.names.len() - 1
    }

    /// Returns the group's name when this signal was its last outstanding one.
    fn record(&mut self, group: usize) -> Option<&str> {
        let remaining = self.remaining.get_mut(group)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        if *remaining > 0 {
            return None;
        }
        self.completed += 1;
        self.names.get(group).map(String::as_str)
    }

    fn completed(&self) -> usize {
        self.completed
    }

    fn all_complete(&self) -> bool {
        self.completed == self.names.len()
    }
}

#[derive(Debug, Default)]
struct Tally {
    errors: usize,
    results: usize,
}

/// Runs a set of query groups under one shared cancellation context and
/// decides when the run is over.
pub struct Supervisor {
    options: RunOptions,
    handle: CancelHandle,
    groups: Vec<QueryGroup>,
}

impl Supervisor {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            handle: CancelHandle::new(),
            groups: Vec::new(),
        }
    }

    pub fn add_group(&mut self, group: QueryGroup) {
        self.groups.push(group);
    }

    /// Handle for cancelling the run from outside, e.g. on Ctrl-C.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    pub async fn run(self) -> RunReport {
        let Supervisor {
            options,
            handle,
            groups,
        } = self;
        let started = Instant::now();

        if groups.is_empty() {
            handle.cancel(CancelCause::AllGroupsComplete);
            info!("No query groups to run");
            return RunReport {
                elapsed: started.elapsed(),
                cause: CancelCause::AllGroupsComplete,
                errors: 0,
                results: 0,
                groups_completed: 0,
            };
        }

        // A duration too large to represent as an instant is as good as none.
        let deadline = match options.max_duration {
            d if d.is_zero() => None,
            d => started.checked_add(d),
        };
        let ctx = handle.context(deadline);
        let (events_tx, events_rx) = flume::unbounded();
        let mut tracker = CompletionTracker::default();
        let mut tasks = JoinSet::new();

        for group in groups {
            let name = group.name().to_owned();
            let index = tracker.register(name.clone(), group.expected_completions());
            let span = info_span!("query_group", group = %name);

            tasks.spawn(
                fan_in(index, group.receivers(), events_tx.clone())
                    .instrument(info_span!(parent: &span, "fan_in")),
            );
            tasks.spawn(group.process(ctx.clone()).instrument(span));
        }
        drop(events_tx);

        let mut outcomes = Outcomes {
            cancel_on_first_error: options.cancel_on_first_error,
            handle: handle.clone(),
            tracker,
            tally: Tally::default(),
        };
        loop {
            let event = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    // Without a recorded cause only the deadline can have fired.
                    handle.cancel(CancelCause::Deadline);
                    break;
                }
                event = events_rx.recv_async() => event,
            };

            let Ok(event) = event else {
                debug!("All fan-in tasks exited");
                handle.cancel(CancelCause::GroupsExited);
                break;
            };
            outcomes.handle(event);
        }

        let cause = handle.cause().unwrap_or(CancelCause::Deadline);
        let elapsed = started.elapsed();
        info!("Stopping: {cause}");
        info!("Completed in {:.3}s", elapsed.as_secs_f64());

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Supervised task failed: {e}");
            }
        }
        // Every fan-in has exited; report what was still buffered at shutdown.
        for event in events_rx.try_iter() {
            outcomes.handle(event);
        }

        RunReport {
            elapsed,
            cause,
            errors: outcomes.tally.errors,
            results: outcomes.tally.results,
            groups_completed: outcomes.tracker.completed(),
        }
    }
}

/// State mutated by the supervisor loop, and only by it.
struct Outcomes {
    cancel_on_first_error: bool,
    handle: CancelHandle,
    tracker: CompletionTracker,
    tally: Tally,
}

impl Outcomes {
    fn handle(&mut self, SupervisorEvent { group, event }: SupervisorEvent) {
        match event {
            GroupEvent::Error(e) => {
                self.tally.errors += 1;
                error!("{e}");
                if self.cancel_on_first_error && !self.handle.is_cancelled() {
                    info!("Exiting on first error");
                    self.handle.cancel(CancelCause::FirstError);
                }
            }
            GroupEvent::Result(result) => {
                self.tally.results += 1;
                info!("{result}");
            }
            GroupEvent::WorkerDone => {
                if let Some(name) = self.tracker.record(group) {
                    info!("Query group {name} done");
                }
                if self.tracker.all_complete() {
                    self.handle.cancel(CancelCause::AllGroupsComplete);
                }
            }
        }
    }
}

/// Runs `groups` to completion, deadline, or first error.
pub async fn run(
    groups: Vec<QueryGroup>,
    max_duration: Duration,
    cancel_on_first_error: bool,
) -> RunReport {
    let mut supervisor = Supervisor::new(
        RunOptions::new()
            .max_duration(max_duration)
            .cancel_on_first_error(cancel_on_first_error),
    );
    for group in groups {
        supervisor.add_group(group);
    }
    supervisor.run().await
}

/// Forwards one group's outcomes to the supervisor until the group has
/// released all of its senders.
async fn fan_in(group: usize, receivers: GroupReceivers, events: flume::Sender<SupervisorEvent>) {
    let GroupReceivers {
        errors,
        results,
        done,
    } = receivers;

    loop {
        // Outcomes before completions, so a worker's results are forwarded
        // ahead of its done signal.
        let event = tokio::select! {
            biased;
            Ok(e) = errors.recv_async() => GroupEvent::Error(e),
            Ok(result) = results.recv_async() => GroupEvent::Result(result),
            Ok(()) = done.recv_async() => GroupEvent::WorkerDone,
            else => break,
        };
        if events.send(SupervisorEvent { group, event }).is_err() {
            return;
        }
    }
    debug!("Group sinks closed");
}
