//! Job dispatch, timeouts and result persistence.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shoal_core::{FailureKind, ModuleSpec, OutputLimits, StorageLocator, VolumeSpec};
use shoal_engine::{JobExecutor, write_job_results};
use shoal_process::ProcessRunner;
use shoal_test::{StaticStorage, TestJobDir, init_test_tracing, module_job, process_job};
use shoal_wasm::ModuleExecutor;
use shoal_wasm::testing::{ScriptedBehavior, ScriptedEngineFactory, ScriptedModule};
use tokio_util::sync::CancellationToken;

fn executor(storage: &StaticStorage) -> JobExecutor {
    JobExecutor::new(
        ProcessRunner::new(OutputLimits::default()),
        ModuleExecutor::new(
            Arc::new(ScriptedEngineFactory::new()),
            Arc::new(storage.clone()),
        ),
    )
}

fn publish(dir: &TestJobDir, storage: &StaticStorage, module: &ScriptedModule) -> StorageLocator {
    let path = dir.write_input(format!("{}.wasm", module.name), &module.to_bytes());
    let locator = StorageLocator::from_path(&path);
    storage.insert(locator.clone(), path);
    locator
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_job_round_trip() {
    init_test_tracing();
    let dir = TestJobDir::new();
    let job = process_job("echo", &["hello"]);

    let result = executor(&StaticStorage::new())
        .run(&job, &dir.results_dir(), CancellationToken::new())
        .await;
    assert_eq!(result.stdout, "hello\n");
    assert_eq!(result.exit_code, 0);

    write_job_results(&dir.results_dir(), &job, &result)
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.results_dir().join("stdout")).unwrap(),
        "hello\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.results_dir().join("exitCode")).unwrap(),
        "0"
    );
}

#[tokio::test]
async fn test_process_job_with_volumes_is_rejected() {
    let dir = TestJobDir::new();
    let job = process_job("echo", &["x"]).with_output(VolumeSpec::output("out", "/out"));

    let result = executor(&StaticStorage::new())
        .run(&job, &dir.results_dir(), CancellationToken::new())
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::Setup));
    assert!(!dir.results_dir().join("out").exists());
    assert!(!dir.results_dir().join("stdout").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_job_timeout_kills_process() {
    let dir = TestJobDir::new();
    let job = process_job("sleep", &["30"]).with_timeout(Duration::from_millis(200));
    let cancel = CancellationToken::new();

    let started = Instant::now();
    let result = executor(&StaticStorage::new())
        .run(&job, &dir.results_dir(), cancel.clone())
        .await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.failure_kind(), Some(FailureKind::Runtime));
    assert!(!cancel.is_cancelled());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_module_job_round_trip() {
    let dir = TestJobDir::new();
    let storage = StaticStorage::new();
    let echo = publish(
        &dir,
        &storage,
        &ScriptedModule::command("echo").with_behavior(ScriptedBehavior {
            echo_args: true,
            exit: Some(0),
            ..ScriptedBehavior::default()
        }),
    );
    let job = module_job(ModuleSpec::new(echo).with_parameter("hello"));

    let result = executor(&storage)
        .run(&job, &dir.results_dir(), CancellationToken::new())
        .await;
    assert!(result.is_success(), "{:?}", result.failure);

    write_job_results(&dir.results_dir(), &job, &result)
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.results_dir().join("stdout")).unwrap(),
        "hello\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.results_dir().join("stderr")).unwrap(),
        ""
    );
    assert_eq!(
        std::fs::read_to_string(dir.results_dir().join("exitCode")).unwrap(),
        "0"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_default_timeout_stops_module_job() {
    let dir = TestJobDir::new();
    let storage = StaticStorage::new();
    let spin = publish(
        &dir,
        &storage,
        &ScriptedModule::command("spin").with_behavior(ScriptedBehavior {
            hang: true,
            ..ScriptedBehavior::default()
        }),
    );
    let cancel = CancellationToken::new();

    let result = executor(&storage)
        .with_default_timeout(Some(Duration::from_millis(200)))
        .run(
            &module_job(ModuleSpec::new(spin)),
            &dir.results_dir(),
            cancel.clone(),
        )
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::Runtime));
    assert_eq!(result.exit_code, -1);
    assert!(!cancel.is_cancelled());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_caller_cancellation_propagates() {
    let dir = TestJobDir::new();
    let storage = StaticStorage::new();
    let spin = publish(
        &dir,
        &storage,
        &ScriptedModule::command("spin").with_behavior(ScriptedBehavior {
            hang: true,
            ..ScriptedBehavior::default()
        }),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = executor(&storage)
        .run(&module_job(ModuleSpec::new(spin)), &dir.results_dir(), cancel)
        .await;
    assert_eq!(result.failure_kind(), Some(FailureKind::Runtime));
}
