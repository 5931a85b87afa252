//! End-to-end integration tests for the scenario runner
//!
//! These tests exercise complete runs by:
//! 1. Driving the coordinator with the in-process mock driver
//! 2. Launching the `mock-server` binary as the shared automation server
//! 3. Running the `scenario-runner` binary against a private config and data directory

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;

use scenario_runner::coordinator::{RunState, ServerSettings, SharedServer, TargetStatus};
use scenario_runner::driver::{DriverCall, MockDriver};
use scenario_runner::runner::RunnerSettings;
use scenario_runner::{CompareResult, Coordinator, DiffEngine, ScenarioCatalog, Target, TargetId};

const BANNER: &str = "Appium REST http interface listener started";

const QUICK: &str = "steps:\n  - action: key_press\n    key_code: 4\n    wait_ms: 0\n    screenshot: back\n  - action: tap\n    target: \"tag:start_button\"\n    wait_ms: 0\n";

const SLOW: &str = "steps:\n  - action: key_press\n    key_code: 1\n    wait_ms: 60000\n  - action: key_press\n    key_code: 2\n    wait_ms: 0\n";

/// Scratch directories for one test
struct TestContext {
    _temp: tempfile::TempDir,
    scenarios: PathBuf,
    screenshots: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let scenarios = temp.path().join("scenarios");
        let screenshots = temp.path().join("screenshots");
        std::fs::create_dir_all(&scenarios).expect("Failed to create scenarios dir");
        std::fs::write(scenarios.join("quick.yaml"), QUICK).unwrap();
        std::fs::write(scenarios.join("slow.yaml"), SLOW).unwrap();
        Self {
            _temp: temp,
            scenarios,
            screenshots,
        }
    }

    fn coordinator(&self, driver: &MockDriver, targets: Vec<Target>, server: Option<SharedServer>) -> Arc<Coordinator> {
        Coordinator::new(
            targets,
            ScenarioCatalog::new(Some(self.scenarios.clone())),
            Arc::new(driver.clone()),
            RunnerSettings {
                settle_delay: Duration::ZERO,
                crop_status_bar: true,
                screenshot_root: self.screenshots.clone(),
            },
            server,
        )
    }
}

fn target(id: u64, scenario: &str) -> Target {
    let mut target = Target::sample();
    target.id = TargetId(id);
    target.name = format!("device-{}", id);
    target.scenario_name = scenario.to_string();
    target
}

fn mock_server(args: &[&str], ready_timeout: Duration) -> SharedServer {
    SharedServer::new(ServerSettings {
        program: PathBuf::from(env!("CARGO_BIN_EXE_mock-server")),
        args: args.iter().map(|a| a.to_string()).collect(),
        ready_banner: BANNER.to_string(),
        ready_timeout,
    })
}

async fn wait_until(coordinator: &Coordinator, id: TargetId, pred: impl Fn(&TargetStatus) -> bool) -> TargetStatus {
    let mut rx = coordinator.subscribe();
    let map = tokio::time::timeout(
        Duration::from_secs(15),
        rx.wait_for(|map| map.get(&id).is_some_and(&pred)),
    )
    .await
    .expect("Timed out waiting for target status")
    .expect("Status channel closed");
    map[&id].clone()
}

fn png_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ============== Coordinator with the mock server ==============

#[tokio::test]
async fn test_server_started_for_run_and_stopped_after() {
    let ctx = TestContext::new();
    let driver = MockDriver::new();
    let coordinator = ctx.coordinator(
        &driver,
        vec![target(1, "quick")],
        Some(mock_server(&[], Duration::from_secs(10))),
    );

    coordinator.run(TargetId(1)).await.unwrap();
    coordinator.wait_all().await;

    let status = coordinator.status(TargetId(1)).unwrap();
    assert_eq!(status.run_state, RunState::Finished { completed: true });
    assert_eq!(status.current_index, Some(1));

    let server = coordinator.server().unwrap();
    assert_eq!(server.ref_count().await, 0);
    assert!(!server.is_running().await);

    // initial screenshot, labelled step, auto-named step
    let runs: Vec<_> = std::fs::read_dir(ctx.screenshots.join("device-1"))
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(runs.len(), 1);
    assert_eq!(
        png_names(&runs[0].path()),
        vec!["NO_NAME_00000.png", "NO_NAME_00001.png", "back.png"]
    );

    let calls = driver.calls();
    assert!(matches!(calls.first(), Some(DriverCall::Open { .. })));
    assert_eq!(calls.last(), Some(&DriverCall::Close));
}

#[tokio::test]
async fn test_concurrent_targets_share_one_server() {
    let ctx = TestContext::new();
    let driver = MockDriver::new();
    let coordinator = ctx.coordinator(
        &driver,
        vec![target(1, "slow"), target(2, "slow")],
        Some(mock_server(&[], Duration::from_secs(10))),
    );

    coordinator.run(TargetId(1)).await.unwrap();
    coordinator.run(TargetId(2)).await.unwrap();
    wait_until(&coordinator, TargetId(1), |s| s.current_index == Some(0)).await;
    wait_until(&coordinator, TargetId(2), |s| s.current_index == Some(0)).await;

    let server = coordinator.server().unwrap();
    assert_eq!(server.ref_count().await, 2);
    assert!(server.is_running().await);
    let pid = server.pid().await;
    assert!(pid.is_some());

    // a second run request while active changes nothing
    coordinator.run(TargetId(1)).await.unwrap();
    assert_eq!(server.ref_count().await, 2);
    assert_eq!(server.pid().await, pid);
    assert_eq!(coordinator.status(TargetId(1)).unwrap().run_state, RunState::Running);

    // cancelling one job keeps the server up for the other
    coordinator.cancel(TargetId(1)).await;
    assert_eq!(
        coordinator.status(TargetId(1)).unwrap().run_state,
        RunState::Finished { completed: false }
    );
    assert_eq!(coordinator.status(TargetId(2)).unwrap().run_state, RunState::Running);
    assert_eq!(server.ref_count().await, 1);
    assert_eq!(server.pid().await, pid);

    coordinator.cancel_all().await;
    assert_eq!(
        coordinator.status(TargetId(2)).unwrap().run_state,
        RunState::Finished { completed: false }
    );
    assert_eq!(server.ref_count().await, 0);
    assert!(!server.is_running().await);
    assert!(!driver.calls().contains(&DriverCall::PressKey(2)));
}

#[tokio::test]
async fn test_missing_banner_times_out_and_continues() {
    let ctx = TestContext::new();
    let driver = MockDriver::new();
    let coordinator = ctx.coordinator(
        &driver,
        vec![target(1, "quick")],
        Some(mock_server(&["--silent"], Duration::from_millis(300))),
    );

    coordinator.run(TargetId(1)).await.unwrap();
    coordinator.wait_all().await;

    assert_eq!(
        coordinator.status(TargetId(1)).unwrap().run_state,
        RunState::Finished { completed: true }
    );
    assert!(!coordinator.server().unwrap().is_running().await);
}

#[tokio::test]
async fn test_server_exiting_early_is_error_state() {
    let ctx = TestContext::new();
    let driver = MockDriver::new();
    let coordinator = ctx.coordinator(
        &driver,
        vec![target(1, "quick")],
        Some(mock_server(&["--exit"], Duration::from_secs(10))),
    );

    coordinator.run(TargetId(1)).await.unwrap();
    let status = wait_until(&coordinator, TargetId(1), |s| !s.run_state.is_active()).await;

    assert!(matches!(
        status.run_state,
        RunState::Error { message } if message.contains("exited before becoming ready")
    ));
    assert!(!coordinator.has_job(TargetId(1)));
    assert_eq!(coordinator.server().unwrap().ref_count().await, 0);
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_unlaunchable_server_is_error_state() {
    let ctx = TestContext::new();
    let driver = MockDriver::new();
    let server = SharedServer::new(ServerSettings {
        program: PathBuf::from("/nonexistent/appium"),
        args: Vec::new(),
        ready_banner: BANNER.to_string(),
        ready_timeout: Duration::from_secs(1),
    });
    let coordinator = ctx.coordinator(&driver, vec![target(1, "quick")], Some(server));

    coordinator.run(TargetId(1)).await.unwrap();
    let status = wait_until(&coordinator, TargetId(1), |s| !s.run_state.is_active()).await;

    assert!(matches!(
        status.run_state,
        RunState::Error { message } if message.contains("Automation server failed to start")
    ));
    assert!(!coordinator.has_job(TargetId(1)));
    assert_eq!(coordinator.server().unwrap().ref_count().await, 0);
}

#[tokio::test]
async fn test_run_returns_before_server_is_ready() {
    let ctx = TestContext::new();
    let driver = MockDriver::new();
    let coordinator = ctx.coordinator(
        &driver,
        vec![target(1, "slow")],
        Some(mock_server(&["--silent"], Duration::from_secs(30))),
    );

    for _ in 0..2 {
        // the caller gives up quickly; the reservation must still be released later
        tokio::time::timeout(Duration::from_millis(200), coordinator.run(TargetId(1)))
            .await
            .expect("run waited for the server launch")
            .unwrap();
        assert!(coordinator.has_job(TargetId(1)));
        assert_eq!(coordinator.status(TargetId(1)).unwrap().run_state, RunState::Running);

        tokio::time::timeout(Duration::from_secs(10), coordinator.cancel(TargetId(1)))
            .await
            .expect("cancel did not interrupt the server launch");
        assert_eq!(
            coordinator.status(TargetId(1)).unwrap().run_state,
            RunState::Finished { completed: false }
        );
        assert!(!coordinator.has_job(TargetId(1)));

        let server = coordinator.server().unwrap();
        assert_eq!(server.ref_count().await, 0);
        assert!(!server.is_running().await);
    }
    assert!(driver.calls().is_empty());
}

// ============== Screenshot comparison ==============

#[test]
fn test_diff_only_drops_identical_files() {
    let left = tempfile::tempdir().unwrap();
    let right = tempfile::tempdir().unwrap();
    let image = image::RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3]));
    image.save(left.path().join("x.png")).unwrap();
    std::fs::copy(left.path().join("x.png"), right.path().join("x.png")).unwrap();
    image.save(left.path().join("y.png")).unwrap();

    let results = DiffEngine::default().compare(left.path(), right.path(), true, true);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].file_name, "y.png");
    assert_eq!(results[0].result, CompareResult::LeftOnly);
}

// ============== CLI ==============

/// Runs the CLI binary with private config and data directories
struct CliContext {
    temp: tempfile::TempDir,
}

impl CliContext {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let app_config = temp.path().join("config").join("scenario-runner");
        std::fs::create_dir_all(app_config.join("scenarios")).unwrap();
        std::fs::write(app_config.join("scenarios").join("quick.yaml"), QUICK).unwrap();
        std::fs::write(
            app_config.join("config.toml"),
            format!(
                "[runner]\nsettle_delay_secs = 0\n\n[paths]\nscreenshot_root = \"{}\"\n",
                temp.path().join("shots").display()
            ),
        )
        .unwrap();
        Self { temp }
    }

    fn shots(&self) -> PathBuf {
        self.temp.path().join("shots")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_scenario-runner"))
            .args(args)
            .env("HOME", self.temp.path())
            .env("XDG_CONFIG_HOME", self.temp.path().join("config"))
            .env("XDG_DATA_HOME", self.temp.path().join("data"))
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to run scenario-runner")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
#[cfg(target_os = "linux")]
fn test_cli_dry_run_then_diff() {
    let ctx = CliContext::new();

    let added = ctx.run(&["targets", "add", "Phone", "--scenario", "quick"]);
    assert!(added.status.success(), "{}", String::from_utf8_lossy(&added.stderr));
    assert!(stdout(&added).contains("Added target 1"));

    let listed = ctx.run(&["targets", "list"]);
    assert!(stdout(&listed).contains("Phone"));

    let run = ctx.run(&["run", "--dry-run", "1"]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    assert!(stdout(&run).contains("finished"));

    let runs = ctx.run(&["runs", "1"]);
    assert!(stdout(&runs).contains("3 screenshots"));

    let run_dir = std::fs::read_dir(ctx.shots().join("Phone"))
        .unwrap()
        .filter_map(|e| e.ok())
        .next()
        .unwrap()
        .path();
    let run_dir = run_dir.to_str().unwrap();

    let diff = ctx.run(&["diff", run_dir, run_dir, "--exclude-auto-named", "--json"]);
    assert!(diff.status.success());
    let json: serde_json::Value = serde_json::from_slice(&diff.stdout).unwrap();
    assert_eq!(json, serde_json::json!([{ "fileName": "back.png", "result": "SAME" }]));
}

#[test]
#[cfg(target_os = "linux")]
fn test_cli_rejects_unknown_target() {
    let ctx = CliContext::new();
    let output = ctx.run(&["run", "--dry-run", "7"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Target 7 not found"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_cli_edit_target_and_describe_scenario() {
    let ctx = CliContext::new();
    std::fs::write(
        ctx.temp.path().join("config/scenario-runner/scenarios/described.yaml"),
        format!("name: Back out\ndescription: Presses back once\n{}", QUICK),
    )
    .unwrap();

    let edited = ctx.run(&["targets", "edit", "0", "--name", "Tablet", "--port", "4725", "--scenario", "described"]);
    assert!(edited.status.success(), "{}", String::from_utf8_lossy(&edited.stderr));
    assert!(stdout(&edited).contains("Updated target 0"));

    let listed = stdout(&ctx.run(&["targets", "list"]));
    assert!(listed.contains("Tablet"));
    assert!(listed.contains("http://127.0.0.1:4725"));
    assert!(listed.contains("scenario: described"));
    assert!(!listed.contains("Sample"));

    let missing = ctx.run(&["targets", "edit", "9", "--name", "Nobody"]);
    assert!(!missing.status.success());
    assert!(String::from_utf8_lossy(&missing.stderr).contains("Target 9 not found"));

    let names = stdout(&ctx.run(&["scenario"]));
    let line = names.lines().find(|l| l.starts_with("described")).unwrap();
    assert!(line.contains("Back out"));
    assert!(line.contains("Presses back once"));

    let detail = stdout(&ctx.run(&["scenario", "described"]));
    assert!(detail.starts_with("described \"Back out\" (2 steps)"));
    assert!(detail.contains("Presses back once"));
}
