use crate::context::ExecutionContext;
use crate::work_item::{OutcomeSinks, WorkItem};
use model::{CyclePolicy, GroupName, QueryError, QueryResult};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span};

type Queue = flume::Sender<Arc<dyn WorkItem>>;

/// Receiving ends of a group's three sinks. Cloning yields another handle to
/// the same channels.
#[derive(Clone, Debug)]
pub struct GroupReceivers {
    pub errors: flume::Receiver<QueryError>,
    pub results: flume::Receiver<QueryResult>,
    /// One `()` per worker that ran out of work.
    pub done: flume::Receiver<()>,
}

/// A named set of work items processed by `concurrency` workers.
///
/// Work items can only be added before [`QueryGroup::process`] is called;
/// processing consumes the group.
pub struct QueryGroup {
    name: GroupName,
    concurrency: usize,
    policy: CyclePolicy,
    work_items: Vec<Arc<dyn WorkItem>>,
    sinks: OutcomeSinks,
    done: flume::Sender<()>,
    receivers: GroupReceivers,
}

impl QueryGroup {
    pub fn new(name: impl Into<GroupName>, concurrency: usize, policy: CyclePolicy) -> Self {
        let (error_tx, error_rx) = flume::unbounded();
        let (result_tx, result_rx) = flume::unbounded();
        let (done_tx, done_rx) = flume::unbounded();

        Self {
            name: name.into(),
            concurrency,
            policy,
            work_items: Vec::new(),
            sinks: OutcomeSinks::new(error_tx, result_tx),
            done: done_tx,
            receivers: GroupReceivers {
                errors: error_rx,
                results: result_rx,
                done: done_rx,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn policy(&self) -> CyclePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.work_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.work_items.is_empty()
    }

    pub fn add_work_item(&mut self, item: impl WorkItem + 'static) {
        self.work_items.push(Arc::new(item));
    }

    pub fn receivers(&self) -> GroupReceivers {
        self.receivers.clone()
    }

    /// Number of completion signals a fully drained run of this group emits.
    pub fn expected_completions(&self) -> usize {
        if self.work_items.is_empty() {
            1
        } else {
            self.concurrency
        }
    }

    /// Runs the producer and the workers until the queue drains (single pass)
    /// or `ctx` is cancelled, and returns once all of them have exited.
    pub async fn process(self, ctx: ExecutionContext) {
        let QueryGroup {
            name,
            concurrency,
            policy,
            work_items,
            sinks,
            done,
            receivers: _,
        } = self;

        if work_items.is_empty() {
            sinks.error(QueryError::EmptyGroup { group: name });
            let _ = done.send(());
            return;
        }

        info!(
            "Processing {} work items with {concurrency} workers ({policy})",
            work_items.len()
        );

        // Capacity 1: the producer stays at most one item ahead of the workers.
        let (queue_tx, queue_rx) = flume::bounded(1);
        let name: Arc<str> = name.into();
        let mut tasks = JoinSet::new();

        tasks.spawn(produce(policy, work_items, queue_tx, ctx.clone()).instrument(info_span!("producer")));
        for id in 0..concurrency {
            tasks.spawn(
                work(
                    name.clone(),
                    queue_rx.clone(),
                    sinks.clone(),
                    done.clone(),
                    ctx.clone(),
                )
                .instrument(info_span!("worker", id)),
            );
        }
        drop(queue_rx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Query group task failed: {e}");
            }
        }
        debug!("All workers exited");
    }
}

async fn produce(
    policy: CyclePolicy,
    work_items: Vec<Arc<dyn WorkItem>>,
    queue: Queue,
    ctx: ExecutionContext,
) {
    match policy {
        CyclePolicy::SinglePass => feed(work_items.iter(), &queue, &ctx).await,
        // Round-robin over all items, i.e. index = counter mod item count.
        CyclePolicy::CycleForever => feed(work_items.iter().cycle(), &queue, &ctx).await,
    }
    // Dropping `queue` here closes it for the workers.
    debug!("Producer exiting");
}

async fn feed<'a>(
    work_items: impl Iterator<Item = &'a Arc<dyn WorkItem>>,
    queue: &Queue,
    ctx: &ExecutionContext,
) {
    for item in work_items {
        let sent = tokio::select! {
            biased;
            _ = ctx.cancelled() => false,
            sent = queue.send_async(item.clone()) => sent.is_ok(),
        };
        if !sent {
            return;
        }
    }
}

async fn work(
    group: Arc<str>,
    queue: flume::Receiver<Arc<dyn WorkItem>>,
    sinks: OutcomeSinks,
    done: flume::Sender<()>,
    ctx: ExecutionContext,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancelled() => None,
            next = queue.recv_async() => Some(next),
        };

        match next {
            None => {
                debug!("Worker cancelled");
                return;
            }
            Some(Ok(item)) => {
                let span = info_span!("work_item", db = item.target());
                item.execute(&ctx, &group, &sinks).instrument(span).await
            }
            Some(Err(flume::RecvError::Disconnected)) => break,
        }
    }

    debug!("Work queue drained");
    let _ = done.send(());
}
