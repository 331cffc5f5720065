/// Startup ordering tests
///
/// Drive the orchestrator with recording tables that record when their
/// validation starts and ends. No backing store is needed.
/// Run with: cargo test --test orchestrator_tests

use async_trait::async_trait;
use modmail_db::schema::EntityDescriptor;
use modmail_db::{DbError, EntityKind, Orchestrator, QueryResult, Result, Session, Statement, Table, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A store where no table exists yet, so every validation takes the
/// create path.
struct EmptyCatalog;

#[async_trait]
impl Session for EmptyCatalog {
    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
        Ok(0)
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn atomic(&self, _statements: &[Statement]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }
}

type EventLog = Arc<Mutex<Vec<String>>>;

struct Recorder {
    kind: EntityKind,
    delay: Duration,
    fails: bool,
    log: EventLog,
}

#[async_trait]
impl Table for Recorder {
    fn descriptor(&self) -> &'static EntityDescriptor {
        self.kind.descriptor()
    }

    async fn init(&self) -> Result<()> {
        self.log.lock().unwrap().push(format!("start:{}", self.kind));
        tokio::time::sleep(self.delay).await;
        self.log.lock().unwrap().push(format!("end:{}", self.kind));

        if self.fails {
            Err(DbError::ExecutionError(format!("{} failed", self.kind)))
        } else {
            Ok(())
        }
    }
}

/// Table with no creation routine.
struct Unfinished(EntityKind);

impl Table for Unfinished {
    fn descriptor(&self) -> &'static EntityDescriptor {
        self.0.descriptor()
    }
}

fn delay_of(kind: EntityKind) -> Duration {
    // Later-declared entities finish first inside a rank.
    Duration::from_millis(10 * (10 - kind as u64))
}

fn orchestrator(log: &EventLog, failing: &[EntityKind]) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(Arc::new(EmptyCatalog));
    for kind in EntityKind::ALL {
        orchestrator.register(Arc::new(Recorder {
            kind,
            delay: delay_of(kind),
            fails: failing.contains(&kind),
            log: log.clone(),
        }));
    }
    orchestrator
}

fn position(log: &[String], event: &str) -> usize {
    log.iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{} never happened: {:?}", event, log))
}

#[tokio::test(start_paused = true)]
async fn test_dependencies_finish_before_dependents_start() {
    let log = EventLog::default();
    let report = orchestrator(&log, &[]).run().await.unwrap();
    let log = log.lock().unwrap().clone();

    assert_eq!(report.outcomes.len(), EntityKind::ALL.len());

    for kind in EntityKind::ALL {
        for dep in kind.descriptor().depends_on {
            assert!(
                position(&log, &format!("end:{}", dep)) < position(&log, &format!("start:{}", kind)),
                "{} started before {} finished",
                kind,
                dep
            );
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_tail_group_runs_concurrently() {
    let log = EventLog::default();
    orchestrator(&log, &[]).run().await.unwrap();
    let log = log.lock().unwrap().clone();

    let tail = [
        EntityKind::Attachments,
        EntityKind::Edits,
        EntityKind::Mutes,
        EntityKind::Permissions,
        EntityKind::StandardReplies,
    ];
    let last_start = tail
        .iter()
        .map(|kind| position(&log, &format!("start:{}", kind)))
        .max()
        .unwrap();
    let first_end = tail
        .iter()
        .map(|kind| position(&log, &format!("end:{}", kind)))
        .min()
        .unwrap();

    assert!(last_start < first_end, "tail group was serialized: {:?}", log);
}

#[tokio::test(start_paused = true)]
async fn test_failure_in_fan_out_lets_siblings_finish() {
    let log = EventLog::default();
    let err = orchestrator(&log, &[EntityKind::StandardReplies])
        .run()
        .await
        .unwrap_err();
    let log = log.lock().unwrap().clone();

    match err {
        DbError::ExecutionError(msg) => assert!(msg.contains("standard_replies")),
        other => panic!("unexpected error: {:?}", other),
    }

    // standard_replies is the fastest of its rank; the slower ones still complete.
    for sibling in ["attachments", "edits", "mutes", "permissions"] {
        assert!(log.contains(&format!("end:{}", sibling)), "{} did not finish", sibling);
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_observed_failure_is_reported() {
    let log = EventLog::default();
    let err = orchestrator(&log, &[EntityKind::Attachments, EntityKind::Permissions])
        .run()
        .await
        .unwrap_err();

    // permissions has the shorter delay.
    match err {
        DbError::ExecutionError(msg) => assert_eq!(msg, "permissions failed"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_chain_failure_stops_later_ranks() {
    let log = EventLog::default();
    let result = orchestrator(&log, &[EntityKind::Threads]).run().await;
    let log = log.lock().unwrap().clone();

    assert!(result.is_err());
    assert!(log.contains(&"end:threads".to_string()));
    for later in ["messages", "attachments", "edits", "mutes", "permissions", "standard_replies"] {
        assert!(
            !log.contains(&format!("start:{}", later)),
            "{} started after threads failed",
            later
        );
    }
}

#[tokio::test]
async fn test_unregistered_entity_fails_before_any_work() {
    let log = EventLog::default();
    let mut orchestrator = Orchestrator::new(Arc::new(EmptyCatalog));
    for kind in EntityKind::ALL.into_iter().filter(|k| *k != EntityKind::Mutes) {
        orchestrator.register(Arc::new(Recorder {
            kind,
            delay: Duration::ZERO,
            fails: false,
            log: log.clone(),
        }));
    }

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, DbError::NotImplemented(ref msg) if msg.contains("modmail.mutes")));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_init_surfaces_not_implemented() {
    let log = EventLog::default();
    let mut orchestrator = orchestrator(&log, &[]);
    orchestrator.register(Arc::new(Unfinished(EntityKind::Edits)));

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, DbError::NotImplemented(ref msg) if msg.contains("modmail.edits")));
}
