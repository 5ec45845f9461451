//! Installing a file-backed subscriber. Kept in its own test binary because
//! the global subscriber can only be installed once per process.

use shoal_telemetry::{LogConfig, LogTarget, TelemetryError, setup_logging};

#[test]
fn test_file_target_creates_directory_and_installs_once() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    let config = LogConfig::new("info").with_target(LogTarget::File(logs.clone()));

    setup_logging(&config).unwrap();
    tracing::info!(component = "test", "written to file");
    assert!(logs.is_dir());

    let again = setup_logging(&config);
    assert!(matches!(again, Err(TelemetryError::InitError(_))));
}
