use super::*;
use crate::model::{JobIdentity, JobSpec, TriggerState};
use crate::registry::{Executable, ExecutionError};
use crate::store::MemoryJobStore;
use crate::test_support::HOURLY;
use async_trait::async_trait;
use dscheduler_config::{CacheConfig, QueryConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

struct Recorder {
    runs: Arc<AtomicUsize>,
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl Executable for Recorder {
    async fn execute(&self, _ctx: &ExecutionContext) -> Result<(), ExecutionError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ExecutionError::Failed("boom".into()));
        }
        Ok(())
    }
}

struct Fixture {
    service: JobService,
    runner: JobRunner,
    runs: Arc<AtomicUsize>,
    events: broadcast::Receiver<JobEvent>,
}

fn fixture(delay: Duration, fail: bool) -> Fixture {
    let registry = Arc::new(ExecutableRegistry::with_builtin());
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    registry
        .register(
            "Recorder",
            Arc::new(move || {
                Arc::new(Recorder {
                    runs: counter.clone(),
                    delay,
                    fail,
                }) as Arc<dyn Executable>
            }),
        )
        .unwrap();

    let service = JobService::new(
        Arc::new(MemoryJobStore::new()),
        registry,
        &CacheConfig::default(),
        QueryConfig::default(),
    );
    let bus = EventBus::default();
    let events = bus.subscribe();
    let runner = JobRunner::new(&service, bus);
    Fixture {
        service,
        runner,
        runs,
        events,
    }
}

async fn schedule(fixture: &Fixture, name: &str) -> (JobIdentity, DateTime<Utc>) {
    fixture
        .service
        .schedule_job(JobSpec::new(name, "g1", "Recorder", HOURLY))
        .await
        .unwrap();
    let id = JobIdentity::new(name, "g1");
    let next = fixture
        .service
        .get_job(&id)
        .await
        .unwrap()
        .unwrap()
        .next_fire_time
        .unwrap();
    (id, next)
}

fn drain(rx: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn kind(event: &JobEvent) -> &'static str {
    match event {
        JobEvent::TriggerFired { .. } => "fired",
        JobEvent::TriggerMisfired { .. } => "misfired",
        JobEvent::JobToBeExecuted { .. } => "to_be_executed",
        JobEvent::JobExecuted { .. } => "executed",
        JobEvent::TriggerCompleted { .. } => "completed",
    }
}

#[tokio::test]
async fn test_nothing_due() {
    let fixture = fixture(Duration::ZERO, false);
    let (_, next) = schedule(&fixture, "report").await;

    let handles = fixture
        .runner
        .fire_due_at(next - TimeDelta::seconds(1))
        .await
        .unwrap();
    assert!(handles.is_empty());
    assert_eq!(fixture.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fires_due_job() {
    let mut fixture = fixture(Duration::ZERO, false);
    let (id, next) = schedule(&fixture, "report").await;

    let handles = fixture
        .runner
        .fire_due_at(next + TimeDelta::seconds(1))
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(fixture.runs.load(Ordering::SeqCst), 1);

    let events = drain(&mut fixture.events);
    let kinds: Vec<_> = events.iter().map(kind).collect();
    assert_eq!(kinds, vec!["fired", "to_be_executed", "executed", "completed"]);
    assert!(events.iter().all(|e| e.job() == &id));
    assert!(matches!(&events[2], JobEvent::JobExecuted { error: None, .. }));

    let record = fixture.service.get_job(&id).await.unwrap().unwrap();
    assert_eq!(record.trigger_state, TriggerState::Normal);
    assert_eq!(record.previous_fire_time, Some(next));
    assert_eq!(record.next_fire_time, Some(next + TimeDelta::hours(1)));
}

#[tokio::test]
async fn test_running_job_is_blocked() {
    let fixture = fixture(Duration::from_millis(200), false);
    let (id, next) = schedule(&fixture, "slow").await;

    let handles = fixture
        .runner
        .fire_due_at(next + TimeDelta::seconds(1))
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);

    let record = fixture.service.get_job(&id).await.unwrap().unwrap();
    assert_eq!(record.trigger_state, TriggerState::Blocked);

    // the next occurrence is due but the previous run still holds the trigger
    let again = fixture
        .runner
        .fire_due_at(next + TimeDelta::hours(1) + TimeDelta::seconds(1))
        .await
        .unwrap();
    assert!(again.is_empty());

    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(fixture.runs.load(Ordering::SeqCst), 1);
    let record = fixture.service.get_job(&id).await.unwrap().unwrap();
    assert_eq!(record.trigger_state, TriggerState::Normal);
}

#[tokio::test]
async fn test_misfire_fires_once() {
    let mut fixture = fixture(Duration::ZERO, false);
    let (_, next) = schedule(&fixture, "late").await;

    let handles = fixture
        .runner
        .fire_due_at(next + TimeDelta::hours(3))
        .await
        .unwrap();
    assert_eq!(handles.len(), 1);
    for handle in handles {
        handle.await.unwrap();
    }

    let kinds: Vec<_> = drain(&mut fixture.events).iter().map(kind).collect();
    assert_eq!(kinds[0], "misfired");
    assert_eq!(kinds.iter().filter(|k| **k == "executed").count(), 1);
}

#[tokio::test]
async fn test_failed_execution_reports_error() {
    let mut fixture = fixture(Duration::ZERO, true);
    let (id, next) = schedule(&fixture, "flaky").await;

    for handle in fixture
        .runner
        .fire_due_at(next + TimeDelta::seconds(1))
        .await
        .unwrap()
    {
        handle.await.unwrap();
    }

    let events = drain(&mut fixture.events);
    assert!(events.iter().any(|e| matches!(
        e,
        JobEvent::JobExecuted { error: Some(msg), .. } if msg.contains("boom")
    )));
    let record = fixture.service.get_job(&id).await.unwrap().unwrap();
    assert_eq!(record.trigger_state, TriggerState::Normal);
}

#[tokio::test]
async fn test_missing_executable_sets_error_state() {
    let mut fixture = fixture(Duration::ZERO, false);
    let (id, next) = schedule(&fixture, "orphan").await;
    fixture.service.registry().unregister("Recorder").unwrap();

    let handles = fixture
        .runner
        .fire_due_at(next + TimeDelta::seconds(1))
        .await
        .unwrap();
    assert!(handles.is_empty());

    let kinds: Vec<_> = drain(&mut fixture.events).iter().map(kind).collect();
    assert_eq!(kinds, vec!["fired"]);
    let record = fixture.service.get_job(&id).await.unwrap().unwrap();
    assert_eq!(record.trigger_state, TriggerState::Error);
}

#[tokio::test]
async fn test_run_stops_on_cancel() {
    let fixture = fixture(Duration::ZERO, false);
    let runner = Arc::new(fixture.runner.with_check_interval(Duration::from_millis(10)));
    let (cancel_tx, cancel_rx) = watch::channel(false);

    let task = tokio::spawn(runner.run(cancel_rx));
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel_tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("runner should stop")
        .unwrap();
}
