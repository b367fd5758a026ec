//! Replaying event scripts from disk.

use std::{io::Write, sync::Arc};

use hibernation_core::{EventKind, EventOutcome};
use hibernation_runtime::{
    ActorContext, RunnerConfig, SocketDispatcher,
    replay::{ReplayEngine, ReplayError, ReplayStep, ReplaySummary, replay_file},
    script::ScriptError,
};
use tempfile::NamedTempFile;

fn dispatcher() -> SocketDispatcher<ReplayEngine> {
    let engine = Arc::new(ReplayEngine::new());
    SocketDispatcher::new(engine, ActorContext::new(3), RunnerConfig::default())
}

fn script(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn replays_script_file() {
    let file = script(
        "# two clients, one misbehaving\n\
         open 1\n\
         open 2\n\
         text 1 hello\n\
         text 2 throw jsg.Error: rejected by app\n\
         binary 2 deadbeef\n\
         close 1 1000 done\n",
    );
    let dispatcher = dispatcher();

    let steps = replay_file(file.path(), &dispatcher, None).await.unwrap();

    let summary = ReplaySummary::from_steps(&steps);
    assert_eq!(summary, ReplaySummary { opened: 2, ok: 3, exceptions: 1 });
    assert_eq!(
        steps[3],
        ReplayStep::Dispatched {
            line: 5,
            connection_id: 2,
            kind: EventKind::Text,
            outcome: EventOutcome::Exception,
        }
    );
    assert_eq!(dispatcher.engine().wakes(), 2);
    assert_eq!(dispatcher.registry().active_count(), 2);
    assert_eq!(dispatcher.wait_until().join_all().await, 4);
}

#[tokio::test]
async fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");

    let err = replay_file(&path, &dispatcher(), None).await.unwrap_err();

    assert!(matches!(err, ReplayError::Io { .. }));
    assert!(err.to_string().contains("absent.txt"));
}

#[tokio::test]
async fn malformed_script_runs_nothing() {
    let file = script("open 1\ntext 1 hi\nclose 1 loud\n");
    let dispatcher = dispatcher();

    let err = replay_file(file.path(), &dispatcher, None).await.unwrap_err();

    assert!(matches!(
        err,
        ReplayError::Script(ScriptError::InvalidNumber { line: 3, argument: "close code", .. })
    ));
    assert!(dispatcher.registry().is_empty());
    assert!(dispatcher.wait_until().is_empty());
}
