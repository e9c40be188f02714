//! CooldownBuilder - アプリケーションの構築とワイヤリング
//!
//! # レジストリは 3 つ
//! - **bodies**: アダプタが包む実際のジョブ（アダプタ自身は含まない）
//! - **owners**: resume タイマーが名前で引く rate-limited キュー
//! - **worker**: bodies + アダプタ + ResumeJob（worker がエンベロープを解決する）
//!
//! アダプタは bodies の Dispatcher を持ち、ResumeScheduler は owners を持つので、
//! どのレジストリも自分自身を参照しない。
//!
//! # Fail-fast 設計
//! - expect_handlers() で期待される handler 名を登録
//! - build() 時に「期待集合 ⊆ 登録済み集合」をチェック

use std::sync::Arc;

use serde_json::Value;

use super::resume_poller::{PollerHandle, ResumePoller};
use crate::apis::{AdapterContext, ApiQueue, RateLimitClassifier, wrap_target};
use crate::config::CooldownConfig;
use crate::domain::JobId;
use crate::error::CooldownError;
use crate::impls::{InMemoryMutex, InMemoryQueueStore, InMemoryScheduler};
use crate::observability::QueueSnapshot;
use crate::ports::{Clock, DistributedMutex, QueueStore, SchedulerBackend, SystemClock};
use crate::rate_limited::{
    OwnerRegistry, RESUME_HANDLER, RateLimitable, RateLimitedQueue, ResumeJob, ResumeScheduler,
};
use crate::runtime::{Dispatcher, HandlerRegistry, JobHandler};
use crate::typed::{Job, Perform, TypedHandler};
use crate::worker::{Worker, WorkerGroup};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing handlers: {0:?}. These handlers were expected but not registered.")]
    MissingHandlers(Vec<String>),

    #[error(transparent)]
    Registry(#[from] CooldownError),
}

type MakeAdapter = Box<dyn FnOnce(Arc<RateLimitedQueue>, AdapterContext) -> Arc<dyn JobHandler>>;

struct PendingAdapter {
    name: String,
    queue: &'static str,
    make: MakeAdapter,
}

/// ```ignore
/// let app = CooldownBuilder::new(config)
///     .store(Arc::new(RedisQueueStore::new(url, config.keys.clone())?))
///     .register("Acme::Jobs::FetchTimeline", Arc::new(FetchTimeline))?
///     .adapter("Acme::Apis::Twitter", TwitterClassifier)
///     .expect_handlers(&["Acme::Jobs::FetchTimeline"])
///     .build()?;
/// ```
pub struct CooldownBuilder {
    config: CooldownConfig,
    store: Option<Arc<dyn QueueStore>>,
    mutex: Option<Arc<dyn DistributedMutex>>,
    scheduler: Option<Arc<dyn SchedulerBackend>>,
    clock: Arc<dyn Clock>,
    bodies: HandlerRegistry,
    adapters: Vec<PendingAdapter>,
    expected: Option<Vec<String>>,
}

impl CooldownBuilder {
    /// Unset collaborators default to the in-memory implementations.
    pub fn new(config: CooldownConfig) -> Self {
        Self {
            config,
            store: None,
            mutex: None,
            scheduler: None,
            clock: Arc::new(SystemClock),
            bodies: HandlerRegistry::new(),
            adapters: Vec::new(),
            expected: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn QueueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn mutex(mut self, mutex: Arc<dyn DistributedMutex>) -> Self {
        self.mutex = Some(mutex);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn SchedulerBackend>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register a job body under `name`.
    pub fn register(mut self, name: &str, handler: Arc<dyn JobHandler>) -> Result<Self, BuildError> {
        self.bodies.register(name, handler)?;
        Ok(self)
    }

    /// Register a typed job body under `J::NAME`.
    pub fn perform<J: Job, P: Perform<J> + 'static>(self, performer: P) -> Result<Self, BuildError> {
        self.register(J::NAME, Arc::new(TypedHandler::<J, P>::new(performer)))
    }

    /// Add a provider adapter named `name` on `C::QUEUE`.
    pub fn adapter<C: RateLimitClassifier>(mut self, name: &str, classifier: C) -> Self {
        let adapter_name = name.to_string();
        self.adapters.push(PendingAdapter {
            name: name.to_string(),
            queue: C::QUEUE,
            make: Box::new(
                move |queue: Arc<RateLimitedQueue>, context: AdapterContext| -> Arc<dyn JobHandler> {
                    Arc::new(ApiQueue::new(adapter_name, classifier, queue, context))
                },
            ),
        });
        self
    }

    pub fn expect_handlers(mut self, names: &[&str]) -> Self {
        self.expected = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Cooldown, BuildError> {
        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.bodies.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingHandlers(missing));
            }
        }

        let config = self.config;
        let store: Arc<dyn QueueStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryQueueStore::new(config.keys.clone())),
        };
        let mutex: Arc<dyn DistributedMutex> = match self.mutex {
            Some(mutex) => mutex,
            None => Arc::new(InMemoryMutex::new(config.lease.poll_interval())),
        };
        let scheduler: Arc<dyn SchedulerBackend> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(InMemoryScheduler::default()),
        };

        let mut owners = OwnerRegistry::new();
        let mut queues = Vec::with_capacity(self.adapters.len());
        for pending in &self.adapters {
            let queue = Arc::new(RateLimitedQueue::new(
                pending.queue,
                &config,
                Arc::clone(&store),
                Arc::clone(&mutex),
            ));
            owners.register(&pending.name, queue.clone())?;
            queues.push(queue);
        }

        let resume = Arc::new(ResumeScheduler::new(
            Arc::clone(&scheduler),
            Arc::new(owners),
            config.resume_queue.clone(),
        ));
        let bodies = Arc::new(self.bodies);
        let context = AdapterContext {
            resume: Arc::clone(&resume),
            bodies: Dispatcher::new(Arc::clone(&bodies)),
            clock: Arc::clone(&self.clock),
            default_cooldown: config.default_cooldown(),
        };

        // worker 側は bodies + アダプタ + resume ジョブ
        let mut handlers = HandlerRegistry::new();
        handlers.merge(&bodies)?;
        for (pending, queue) in self.adapters.into_iter().zip(&queues) {
            let adapter = (pending.make)(Arc::clone(queue), context.clone());
            handlers.register(&pending.name, adapter)?;
        }
        handlers.register(RESUME_HANDLER, Arc::new(ResumeJob::new(Arc::clone(&resume))))?;

        Ok(Cooldown {
            config,
            store,
            scheduler,
            clock: self.clock,
            resume,
            dispatcher: Dispatcher::new(Arc::new(handlers)),
            queues,
        })
    }
}

/// A wired process: adapters, resume scheduling, workers.
pub struct Cooldown {
    config: CooldownConfig,
    store: Arc<dyn QueueStore>,
    scheduler: Arc<dyn SchedulerBackend>,
    clock: Arc<dyn Clock>,
    resume: Arc<ResumeScheduler>,
    dispatcher: Dispatcher,
    queues: Vec<Arc<RateLimitedQueue>>,
}

impl Cooldown {
    pub fn config(&self) -> &CooldownConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn resume(&self) -> &Arc<ResumeScheduler> {
        &self.resume
    }

    /// The rate-limited queue behind adapter `name`.
    pub fn rate_limited(&self, name: &str) -> Result<Arc<dyn RateLimitable>, CooldownError> {
        self.resume.resolve_owner(name)
    }

    /// Submit `handler(args...)` through adapter `adapter`.
    pub async fn enqueue(
        &self,
        adapter: &str,
        handler: &str,
        args: Vec<Value>,
    ) -> Result<JobId, CooldownError> {
        self.rate_limited(adapter)?
            .enqueue(adapter, wrap_target(handler, args))
            .await
    }

    pub async fn enqueue_job<J: Job>(&self, adapter: &str, job: &J) -> Result<JobId, CooldownError> {
        self.enqueue(adapter, J::NAME, job.to_args()?).await
    }

    /// Every queue workers should serve: adapter queues, then the resume queue.
    pub fn worker_queues(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for queue in &self.queues {
            let name = queue.queue().name().to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if let Some(resume_queue) = self.resume.resume_queue() {
            names.push(resume_queue.to_string());
        }
        names
    }

    pub fn worker(&self) -> Worker {
        Worker::new(Arc::clone(&self.store), self.dispatcher.clone())
    }

    pub fn spawn_workers(&self, n: usize) -> WorkerGroup {
        WorkerGroup::spawn(
            n,
            Arc::new(self.worker()),
            self.worker_queues(),
            self.config.worker.interval(),
        )
    }

    pub fn poller(&self) -> ResumePoller {
        ResumePoller::new(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.scheduler.interval(),
        )
    }

    pub fn spawn_poller(&self) -> PollerHandle {
        self.poller().spawn()
    }

    pub async fn snapshots(&self) -> Result<Vec<QueueSnapshot>, CooldownError> {
        let mut out = Vec::with_capacity(self.queues.len());
        for queue in &self.queues {
            out.push(QueueSnapshot::capture(queue, self.store.as_ref()).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::{Classification, TwitterClassifier, TwitterError};
    use crate::domain::QueueState;
    use crate::error::JobError;
    use crate::ports::ManualClock;
    use crate::test_support::{CountingHandler, fast_config};
    use crate::typed::job::fixtures::FetchTimeline;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn build_success() {
        let app = CooldownBuilder::new(CooldownConfig::default())
            .register("Echo", Arc::new(CountingHandler::default()))
            .unwrap()
            .adapter("Acme::Apis::Twitter", TwitterClassifier)
            .expect_handlers(&["Echo"])
            .build()
            .unwrap();

        assert!(app.dispatcher().registry().contains("Acme::Apis::Twitter"));
        assert!(app.dispatcher().registry().contains(RESUME_HANDLER));
        assert!(app.rate_limited("Acme::Apis::Twitter").is_ok());
    }

    #[test]
    fn build_reports_missing_handlers() {
        let result = CooldownBuilder::new(CooldownConfig::default())
            .register("Echo", Arc::new(CountingHandler::default()))
            .unwrap()
            .expect_handlers(&["Echo", "Acme::Jobs::Missing"])
            .build();

        assert!(matches!(
            result,
            Err(BuildError::MissingHandlers(missing)) if missing == vec!["Acme::Jobs::Missing".to_string()]
        ));
    }

    #[test]
    fn duplicate_adapter_names_are_rejected() {
        let result = CooldownBuilder::new(CooldownConfig::default())
            .adapter("Acme::Apis::Twitter", TwitterClassifier)
            .adapter("Acme::Apis::Twitter", TwitterClassifier)
            .build();

        assert!(matches!(
            result,
            Err(BuildError::Registry(CooldownError::DuplicateHandler(_)))
        ));
    }

    #[test]
    fn worker_queues_list_each_queue_once_then_resume_queue() {
        let app = CooldownBuilder::new(fast_config())
            .adapter("Acme::Apis::Twitter", TwitterClassifier)
            .adapter("Acme::Apis::TwitterSearch", TwitterClassifier)
            .build()
            .unwrap();

        assert_eq!(app.worker_queues(), vec!["twitter_api", "unpause"]);
    }

    #[tokio::test]
    async fn typed_jobs_run_through_an_adapter() {
        #[derive(Default)]
        struct Timeline {
            seen: AtomicUsize,
        }

        #[async_trait]
        impl Perform<FetchTimeline> for Arc<Timeline> {
            async fn perform(&self, job: FetchTimeline) -> Result<(), JobError> {
                self.seen.fetch_add(job.user_id as usize, Ordering::SeqCst);
                Ok(())
            }
        }

        let timeline = Arc::new(Timeline::default());
        let app = CooldownBuilder::new(fast_config())
            .perform::<FetchTimeline, _>(Arc::clone(&timeline))
            .unwrap()
            .adapter("Acme::Apis::Twitter", TwitterClassifier)
            .build()
            .unwrap();

        app.enqueue_job(
            "Acme::Apis::Twitter",
            &FetchTimeline {
                user_id: 7,
                since: None,
            },
        )
        .await
        .unwrap();
        app.worker().work_one(&app.worker_queues()).await.unwrap();

        assert_eq!(timeline.seen.load(Ordering::SeqCst), 7);
    }

    /// First call hits the limit, later calls succeed.
    #[derive(Default)]
    struct LimitedOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for LimitedOnce {
        async fn perform(&self, _args: &[Value]) -> Result<(), JobError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(JobError::upstream(TwitterError::TooManyRequests {
                    reset_in: None,
                }));
            }
            Ok(())
        }
    }

    struct AlphaClassifier;

    impl RateLimitClassifier for AlphaClassifier {
        const QUEUE: &'static str = "alpha";

        fn classify(&self, error: &JobError) -> Classification {
            TwitterClassifier.classify(error)
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_job_is_parked_then_released_by_its_timer() {
        let store = Arc::new(InMemoryQueueStore::default());
        let scheduler = Arc::new(InMemoryScheduler::default());
        let clock = Arc::new(ManualClock::new(noon()));
        let body = Arc::new(LimitedOnce::default());
        let app = CooldownBuilder::new(fast_config())
            .store(store.clone())
            .scheduler(scheduler.clone())
            .clock(clock.clone())
            .register("Acme::Jobs::Fetch", body.clone())
            .unwrap()
            .adapter("Acme::Apis::Alpha", AlphaClassifier)
            .build()
            .unwrap();
        let worker = app.worker();
        let queues = app.worker_queues();

        let j1 = app
            .enqueue("Acme::Apis::Alpha", "Acme::Jobs::Fetch", vec![json!("j1")])
            .await
            .unwrap();
        assert!(worker.work_one(&queues).await.unwrap().is_some());

        // parked, with a timer one hour out
        assert!(!store.exists("queue:alpha").await.unwrap());
        let parked = store.jobs_at("queue:alpha_paused").await;
        assert_eq!(parked.len(), 1);
        assert_ne!(parked[0].id(), j1);
        assert_eq!(parked[0].args(), &[json!("Acme::Jobs::Fetch"), json!("j1")]);
        let timers = scheduler.pending().await;
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].fire_at, noon() + chrono::Duration::seconds(3600));

        // nothing runs while paused
        assert!(worker.work_one(&queues).await.unwrap().is_none());

        clock.advance(chrono::Duration::seconds(3600));
        assert_eq!(app.poller().promote_due().await.unwrap(), 1);
        assert!(worker.work_one(&queues).await.unwrap().is_some());

        assert!(!store.exists("queue:alpha_paused").await.unwrap());
        assert_eq!(store.jobs_at("queue:alpha").await, parked);
        let snapshot = &app.snapshots().await.unwrap()[0];
        assert_eq!(snapshot.state, QueueState::Active);

        assert!(worker.work_one(&queues).await.unwrap().is_some());
        assert_eq!(body.calls.load(Ordering::SeqCst), 2);
        assert!(store.existing_keys().await.is_empty());
    }

    #[tokio::test]
    async fn background_loops_release_a_paused_queue() {
        let mut config = fast_config();
        config.default_cooldown_secs = 1;
        config.worker.poll_interval_ms = 5;
        config.scheduler.poll_interval_ms = 5;
        let body = Arc::new(LimitedOnce::default());
        let app = CooldownBuilder::new(config)
            .register("Acme::Jobs::Fetch", body.clone())
            .unwrap()
            .adapter("Acme::Apis::Alpha", AlphaClassifier)
            .build()
            .unwrap();

        app.enqueue("Acme::Apis::Alpha", "Acme::Jobs::Fetch", vec![])
            .await
            .unwrap();
        let workers = app.spawn_workers(2);
        let poller = app.spawn_poller();
        for _ in 0..800 {
            if body.calls.load(Ordering::SeqCst) >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        workers.shutdown_and_join().await;
        poller.shutdown_and_join().await;

        assert_eq!(body.calls.load(Ordering::SeqCst), 2);
    }
}
