#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use serde_json::{json, Value};
    use taskpool_core::{ConfigError, SchedulerConfig, TaskId};

    use crate::scheduler::runner::Scheduler;
    use crate::scheduler::types::{Cancellation, SchedulerError};
    use crate::task::{DispatchError, TaskDescriptor, TaskError, TaskPayload};
    use crate::unit::{Settle, UnitFactory, UnitHandle};

    type Outcome = Result<Value, TaskError>;

    /// Factory whose units only finish when the test says so.
    #[derive(Default)]
    struct MockFactory {
        spawned: Mutex<Vec<TaskId>>,
        units: Mutex<HashMap<TaskId, Settle>>,
        terminations: Arc<Mutex<HashMap<TaskId, usize>>>,
        refuse: HashSet<TaskId>,
        lingering: AtomicUsize,
    }

    impl MockFactory {
        fn refusing(ids: &[u64]) -> Self {
            Self {
                refuse: ids.iter().copied().map(TaskId::new).collect(),
                ..Self::default()
            }
        }

        fn spawned(&self) -> Vec<u64> {
            self.spawned.lock().unwrap().iter().map(|id| id.get()).collect()
        }

        fn terminations(&self, id: TaskId) -> usize {
            self.terminations.lock().unwrap().get(&id).copied().unwrap_or(0)
        }

        /// Settle a running unit from the calling thread.
        fn finish(&self, id: TaskId, outcome: Outcome) {
            let settle = self
                .units
                .lock()
                .unwrap()
                .remove(&id)
                .expect("unit was never spawned");
            settle.send(outcome);
        }
    }

    struct MockHandle {
        id: TaskId,
        terminations: Arc<Mutex<HashMap<TaskId, usize>>>,
    }

    impl UnitHandle for MockHandle {
        fn terminate(&self) {
            *self.terminations.lock().unwrap().entry(self.id).or_default() += 1;
        }
    }

    impl UnitFactory for MockFactory {
        fn spawn(
            &self,
            payload: TaskPayload,
            settle: Settle,
        ) -> Result<Box<dyn UnitHandle>, DispatchError> {
            if self.refuse.contains(&payload.id) {
                return Err(DispatchError::Unavailable("refused".into()));
            }
            self.spawned.lock().unwrap().push(payload.id);
            self.units.lock().unwrap().insert(payload.id, settle);
            Ok(Box::new(MockHandle {
                id: payload.id,
                terminations: Arc::clone(&self.terminations),
            }))
        }

        fn lingering(&self) -> usize {
            self.lingering.load(Ordering::Relaxed)
        }
    }

    fn scheduler(ceiling: usize, factory: &Arc<MockFactory>) -> Scheduler {
        let factory: Arc<dyn UnitFactory> = factory.clone();
        Scheduler::new(&SchedulerConfig::with_max_concurrency(ceiling), factory).unwrap()
    }

    fn noop() -> TaskDescriptor {
        TaskDescriptor::new("noop")
    }

    #[tokio::test]
    async fn ids_are_strictly_increasing() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(1, &factory);

        let ids: Vec<u64> = (0..4).map(|_| scheduler.submit(noop()).id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn fifo_dispatch_with_ceiling_one() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(1, &factory);

        let subs: Vec<_> = (0..5).map(|_| scheduler.submit(noop())).collect();
        assert_eq!(factory.spawned(), vec![1]);
        assert_eq!(scheduler.pending_len(), 4);

        for sub in subs {
            factory.finish(sub.id, Ok(json!(sub.id.get())));
            assert_eq!(sub.result.await.unwrap(), json!(sub.id.get()));
        }

        assert_eq!(factory.spawned(), vec![1, 2, 3, 4, 5]);
        assert!(scheduler.is_idle());
    }

    #[tokio::test]
    async fn ceiling_holds_with_out_of_order_completions() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(2, &factory);

        let mut subs: Vec<_> = (0..5).map(|_| scheduler.submit(noop())).collect();
        assert_eq!(scheduler.in_flight_len(), 2);
        assert_eq!(scheduler.pending_len(), 3);

        // Finish the most recently dispatched task first each time.
        while let Some(idx) = subs
            .iter()
            .rposition(|s| factory.spawned().contains(&s.id.get()))
        {
            let sub = subs.remove(idx);
            factory.finish(sub.id, Ok(Value::Null));
            sub.result.await.unwrap();
            assert!(scheduler.in_flight_len() <= 2);
            if subs.is_empty() {
                break;
            }
        }

        let metrics = scheduler.metrics();
        assert_eq!(metrics.peak_in_flight, 2);
        assert_eq!(metrics.succeeded, 5);
        assert_eq!(metrics.dispatched, 5);
        assert!(scheduler.is_idle());
    }

    #[tokio::test]
    async fn failure_is_delivered_and_does_not_stall_the_queue() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(1, &factory);

        let first = scheduler.submit(noop());
        let second = scheduler.submit(noop());

        factory.finish(first.id, Err(TaskError::failed("bad input")));
        assert_eq!(
            first.result.await,
            Err(TaskError::Failed("bad input".into()))
        );
        assert_eq!(factory.spawned(), vec![1, 2]);

        factory.finish(second.id, Ok(json!(2)));
        assert_eq!(second.result.await.unwrap(), json!(2));
        assert_eq!(scheduler.metrics().failed, 1);
    }

    #[tokio::test]
    async fn cancelled_pending_task_never_reaches_a_unit() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(1, &factory);

        let blocker = scheduler.submit(noop());
        let queued = scheduler.submit(noop());

        assert_eq!(scheduler.cancel(queued.id), Cancellation::Dequeued);
        assert_eq!(scheduler.pending_len(), 0);
        assert_eq!(queued.result.await, Err(TaskError::Cancelled));

        factory.finish(blocker.id, Ok(Value::Null));
        blocker.result.await.unwrap();

        assert_eq!(factory.spawned(), vec![1]);
        assert_eq!(factory.terminations(queued.id), 0);
        assert!(scheduler.is_idle());
    }

    #[tokio::test]
    async fn cancelled_running_task_is_terminated_once_and_frees_its_slot() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(1, &factory);

        let running = scheduler.submit(noop());
        let next = scheduler.submit(noop());

        assert_eq!(scheduler.cancel(running.id), Cancellation::Terminated);
        assert_eq!(factory.terminations(running.id), 1);
        assert_eq!(factory.spawned(), vec![1, 2]);
        assert_eq!(scheduler.in_flight_len(), 1);

        // A late outcome from the terminated unit goes nowhere.
        factory.finish(running.id, Ok(json!("late")));
        assert_eq!(running.result.await, Err(TaskError::Cancelled));

        // Cancelling again is a no-op and does not terminate twice.
        assert_eq!(scheduler.cancel(running.id), Cancellation::NotFound);
        assert_eq!(factory.terminations(running.id), 1);

        factory.finish(next.id, Ok(json!(2)));
        assert_eq!(next.result.await.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn cancel_unknown_or_finished_is_a_noop() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(2, &factory);

        assert_eq!(scheduler.cancel(TaskId::new(99)), Cancellation::NotFound);

        let done = scheduler.submit(noop());
        factory.finish(done.id, Ok(Value::Null));
        done.result.await.unwrap();

        assert_eq!(scheduler.cancel(done.id), Cancellation::NotFound);
        assert_eq!(factory.terminations(done.id), 0);
        assert_eq!(scheduler.metrics().cancelled, 0);
    }

    #[tokio::test]
    async fn cancel_all_clears_queue_and_terminates_running() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(2, &factory);

        let subs: Vec<_> = (0..5).map(|_| scheduler.submit(noop())).collect();
        assert_eq!(scheduler.cancel_all(), 5);

        assert_eq!(factory.spawned(), vec![1, 2]);
        assert_eq!(factory.terminations(TaskId::new(1)), 1);
        assert_eq!(factory.terminations(TaskId::new(2)), 1);
        assert!(scheduler.is_idle());

        for sub in subs {
            assert_eq!(sub.result.await, Err(TaskError::Cancelled));
        }
        assert_eq!(scheduler.metrics().cancelled, 5);
    }

    #[tokio::test]
    async fn unit_start_failure_rejects_task_and_keeps_dispatching() {
        let factory = Arc::new(MockFactory::refusing(&[1]));
        let scheduler = scheduler(1, &factory);

        let refused = scheduler.submit(noop());
        let accepted = scheduler.submit(noop());

        assert_eq!(
            refused.result.await,
            Err(TaskError::Dispatch(DispatchError::Unavailable("refused".into())))
        );
        assert_eq!(factory.spawned(), vec![2]);

        factory.finish(accepted.id, Ok(Value::Null));
        accepted.result.await.unwrap();
        assert_eq!(scheduler.metrics().dispatch_failures, 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_does_not_stall_the_queue() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(1, &factory);

        let dropped = scheduler.submit(noop());
        let next = scheduler.submit(noop());
        let id = dropped.id;
        drop(dropped);

        factory.finish(id, Ok(Value::Null));
        assert_eq!(factory.spawned(), vec![1, 2]);

        factory.finish(next.id, Ok(Value::Null));
        next.result.await.unwrap();
    }

    #[tokio::test]
    async fn metrics_snapshot_reports_gauges() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(2, &factory);
        for _ in 0..3 {
            scheduler.submit(noop());
        }

        let metrics = scheduler.metrics();
        assert_eq!(metrics.ceiling, 2);
        assert_eq!(metrics.submitted, 3);
        assert_eq!(metrics.in_flight, 2);
        assert_eq!(metrics.pending, 1);
        assert_eq!(metrics.utilization(), 1.0);
        assert_eq!(metrics.lingering_units, 0);

        factory.lingering.store(2, Ordering::Relaxed);
        assert_eq!(scheduler.metrics().lingering_units, 2);
    }

    #[tokio::test]
    async fn zero_ceiling_fails_fast() {
        let factory: Arc<dyn UnitFactory> = Arc::new(MockFactory::default());
        let err = Scheduler::new(&SchedulerConfig::with_max_concurrency(0), factory)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SchedulerError::Config(ConfigError::InvalidConcurrency)
        ));
    }

    #[tokio::test]
    async fn default_ceiling_is_host_parallelism() {
        let factory: Arc<dyn UnitFactory> = Arc::new(MockFactory::default());
        let scheduler = Scheduler::new(&SchedulerConfig::default(), factory).unwrap();
        let expected = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(scheduler.ceiling(), expected);
    }

    #[test]
    fn completes_and_drains_without_a_runtime() {
        let factory = Arc::new(MockFactory::default());
        let scheduler = scheduler(1, &factory);

        let first = scheduler.submit(noop());
        let second = scheduler.submit(noop());

        // Units settle from their own threads.
        let unit = Arc::clone(&factory);
        let id = first.id;
        thread::spawn(move || unit.finish(id, Ok(json!("first"))))
            .join()
            .unwrap();

        assert_eq!(factory.spawned(), vec![1, 2]);
        assert_eq!(
            futures::executor::block_on(first.result).unwrap(),
            json!("first")
        );

        factory.finish(second.id, Ok(json!("second")));
        assert_eq!(
            futures::executor::block_on(second.result).unwrap(),
            json!("second")
        );
        assert!(scheduler.is_idle());
    }
}
