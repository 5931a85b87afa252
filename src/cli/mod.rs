//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

use colored::Colorize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::commands::{Commands, TargetCommands};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::coordinator::{Coordinator, RunState, ServerSettings, SharedServer, StatusMap};
use crate::diff::{self, CompareResult, DiffEngine};
use crate::driver::{AppiumDriverFactory, DriverFactory, MockDriver};
use crate::runner::RunnerSettings;
use crate::scenario::{EventAction, ScenarioCatalog};
use crate::store::{list_runs, TargetStore};
use crate::target::{AutomationConfig, DeviceInfo, Target, TargetId};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run { ids, all, dry_run } => run_targets(ids, all, dry_run).await,
        Commands::Targets(cmd) => targets(cmd),
        Commands::Scenario { name } => scenario(name),
        Commands::Runs { id } => runs(TargetId(id)),
        Commands::Diff {
            left,
            right,
            diff_only,
            exclude_auto_named,
            json,
        } => compare(left, right, diff_only, exclude_auto_named, json).await,
        Commands::Visualize { left, right } => {
            let path = tokio::task::spawn_blocking(move || diff::visualize(&left, &right))
                .await
                .map_err(|e| Error::Internal(format!("Visualization task failed: {}", e)))??;
            match path {
                Some(path) => println!("{}", path.display()),
                None => println!("No visualization: a file is missing or the image sizes differ"),
            }
            Ok(())
        }
    }
}

async fn run_targets(ids: Vec<u64>, all: bool, dry_run: bool) -> Result<()> {
    let config = Config::load()?;
    let store = TargetStore::load_default()?;

    let selected: Vec<TargetId> = if all {
        store.targets().iter().map(|t| t.id).collect()
    } else {
        ids.into_iter().map(TargetId).collect()
    };
    if selected.is_empty() {
        return Err(Error::Config(
            "No targets selected. Pass target ids or --all".to_string(),
        ));
    }
    for id in &selected {
        store.get(*id)?;
    }

    let catalog = ScenarioCatalog::from_default_dir();
    let step_counts: HashMap<TargetId, usize> = store
        .targets()
        .iter()
        .filter_map(|t| catalog.resolve(&t.scenario_name).ok().map(|s| (t.id, s.len())))
        .collect();

    let (drivers, server): (Arc<dyn DriverFactory>, Option<SharedServer>) = if dry_run {
        println!("{}", "Dry run: using the mock device driver".yellow());
        (Arc::new(MockDriver::new()), None)
    } else {
        (
            Arc::new(AppiumDriverFactory::new(Duration::from_secs(
                config.driver.request_timeout_secs,
            ))),
            Some(SharedServer::new(ServerSettings::from_config(&config.server))),
        )
    };

    let coordinator = Coordinator::new(
        store.targets().to_vec(),
        catalog,
        drivers,
        RunnerSettings::from_config(&config)?,
        server,
    );
    let mut status_rx = coordinator.subscribe();
    let mut printed: HashMap<TargetId, (Option<usize>, RunState)> = HashMap::new();

    let starts: Vec<_> = selected
        .iter()
        .map(|&id| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.run(id).await })
        })
        .collect();
    for start in starts {
        start
            .await
            .map_err(|e| Error::Internal(format!("Start task failed: {}", e)))??;
    }

    let all_done = coordinator.wait_all();
    tokio::pin!(all_done);
    let mut cancelling = false;

    loop {
        print_changes(&status_rx.borrow_and_update(), &selected, &step_counts, &mut printed);

        tokio::select! {
            _ = &mut all_done => break,
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !cancelling => {
                cancelling = true;
                println!("{}", "Cancelling all runs...".yellow());
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.cancel_all().await });
            }
        }
    }
    print_changes(&coordinator.snapshot(), &selected, &step_counts, &mut printed);

    println!();
    println!("{}", "Summary:".bold());
    let mut incomplete = 0;
    for id in &selected {
        if let Some(status) = coordinator.status(*id) {
            let marker = match &status.run_state {
                RunState::Finished { completed: true } => "✓".green(),
                RunState::Finished { completed: false } => "-".yellow(),
                _ => "✗".red(),
            };
            if status.run_state != (RunState::Finished { completed: true }) {
                incomplete += 1;
            }
            println!("  {} [{}] {}: {}", marker, id, status.target_name, status.run_state);
        }
    }

    if incomplete > 0 {
        return Err(Error::RunsIncomplete(incomplete));
    }
    Ok(())
}

/// Print each selected target whose state or step changed since the last call
fn print_changes(
    map: &StatusMap,
    selected: &[TargetId],
    step_counts: &HashMap<TargetId, usize>,
    printed: &mut HashMap<TargetId, (Option<usize>, RunState)>,
) {
    for id in selected {
        let Some(status) = map.get(id) else {
            continue;
        };
        let current = (status.current_index, status.run_state.clone());
        if printed.get(id) == Some(&current) {
            continue;
        }

        let label = format!("[{}] {}", id, status.target_name).bold();
        match (&status.run_state, status.current_index) {
            (RunState::Running, Some(index)) => {
                let total = step_counts
                    .get(id)
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string());
                println!("{} step {}/{}", label, index + 1, total);
            }
            (RunState::Idle, _) => {}
            (RunState::Running, None) => println!("{} {}", label, "running".cyan()),
            (RunState::Cancelling, _) => println!("{} {}", label, "cancelling".yellow()),
            (RunState::Finished { completed: true }, _) => println!("{} {}", label, "finished".green()),
            (RunState::Finished { completed: false }, _) => println!("{} {}", label, "cancelled".yellow()),
            (RunState::Error { message }, _) => {
                println!("{} {}", label, "error".red());
                for line in message.lines() {
                    println!("    {}", line);
                }
            }
        }
        printed.insert(*id, current);
    }
}

fn targets(cmd: TargetCommands) -> Result<()> {
    match cmd {
        TargetCommands::List => {
            let store = TargetStore::load_default()?;
            if store.targets().is_empty() {
                println!("No targets configured");
                return Ok(());
            }
            for target in store.targets() {
                print_target(target);
            }
            Ok(())
        }

        TargetCommands::Add {
            name,
            scenario,
            device,
            host,
            port,
            udid,
            app,
        } => {
            let device_info = device_preset(&device)?;

            let defaults = AutomationConfig::default();
            let configuration = AutomationConfig {
                host: host.unwrap_or(defaults.host),
                port: port.unwrap_or(defaults.port),
                udid: udid.unwrap_or(defaults.udid),
                app: app.map(app_path).unwrap_or(defaults.app),
            };

            let mut store = TargetStore::load_default()?;
            let id = store.add(Target {
                id: TargetId(0),
                name,
                device_info,
                scenario_name: scenario,
                configuration,
            })?;
            println!("{} Added target {}", "✓".green(), id);
            Ok(())
        }

        TargetCommands::Edit {
            id,
            name,
            scenario,
            device,
            host,
            port,
            udid,
            app,
        } => {
            let mut store = TargetStore::load_default()?;
            let mut target = store.get(TargetId(id))?.clone();
            if let Some(name) = name {
                target.name = name;
            }
            if let Some(scenario) = scenario {
                target.scenario_name = scenario;
            }
            if let Some(device) = device {
                target.device_info = device_preset(&device)?;
            }
            if let Some(host) = host {
                target.configuration.host = host;
            }
            if let Some(port) = port {
                target.configuration.port = port;
            }
            if let Some(udid) = udid {
                target.configuration.udid = udid;
            }
            if let Some(app) = app {
                target.configuration.app = app_path(app);
            }
            store.replace(target.clone())?;
            println!("{} Updated target {}", "✓".green(), id);
            print_target(&target);
            Ok(())
        }

        TargetCommands::Remove { id } => {
            let mut store = TargetStore::load_default()?;
            let removed = store.remove(TargetId(id))?;
            println!("{} Removed target {} ({})", "✓".green(), id, removed.name);
            Ok(())
        }

        TargetCommands::Presets => {
            for preset in DeviceInfo::presets() {
                println!(
                    "{:<36} status bar {:>3}px  navigation bar {:>3}px",
                    preset.device_name, preset.status_bar_height, preset.navigation_bar_height
                );
            }
            Ok(())
        }
    }
}

fn device_preset(device: &str) -> Result<DeviceInfo> {
    DeviceInfo::preset(device).ok_or_else(|| {
        Error::Config(format!(
            "Unknown device preset '{}'. Run 'targets presets' to list them",
            device
        ))
    })
}

fn app_path(path: PathBuf) -> String {
    path.canonicalize().unwrap_or(path).display().to_string()
}

fn print_target(target: &Target) {
    println!("{} {}", format!("[{}]", target.id).cyan(), target.name.bold());
    println!("    scenario: {}", target.scenario_name);
    println!(
        "    device:   {} (status bar {}px)",
        target.device_info.device_name, target.device_info.status_bar_height
    );
    println!(
        "    driver:   {} udid={}",
        target.configuration.base_url(),
        target.configuration.udid
    );
    println!("    app:      {}", target.configuration.app);
}

fn scenario(name: Option<String>) -> Result<()> {
    let catalog = ScenarioCatalog::from_default_dir();
    let Some(name) = name else {
        for name in catalog.names() {
            match catalog.resolve(&name) {
                Ok(scenario) => {
                    let mut line = format!("{:<24} {:>4} steps", name, scenario.len());
                    if let Some(title) = scenario.title().filter(|t| *t != name) {
                        line.push_str(&format!("  {}", title.bold()));
                    }
                    if let Some(description) = scenario.description() {
                        line.push_str(&format!("  {}", description.dimmed()));
                    }
                    println!("{}", line);
                }
                Err(e) => println!("{:<24} {}", name, e.to_string().red()),
            }
        }
        return Ok(());
    };

    let scenario = catalog.resolve(&name)?;
    match scenario.title() {
        Some(title) if title != name => println!("{} \"{}\" ({} steps)", name.bold(), title, scenario.len()),
        _ => println!("{} ({} steps)", name.bold(), scenario.len()),
    }
    if let Some(description) = scenario.description() {
        println!("{}", description.dimmed());
    }
    for (index, action) in scenario.actions().iter().enumerate() {
        print_action(index, action);
    }
    Ok(())
}

fn print_action(index: usize, action: &EventAction) {
    let mut line = format!("{:>4}  {}", index, action.name());
    let target = action.target();
    if !target.is_empty() {
        line.push_str(&format!("  {}", target.dimmed()));
    }
    if let Some(label) = action.screenshot_label() {
        line.push_str(&format!("  -> {}.png", label.as_str().green()));
    }
    println!("{}", line);
}

fn runs(id: TargetId) -> Result<()> {
    let config = Config::load()?;
    let store = TargetStore::load_default()?;
    let target = store.get(id)?;
    let root = config.screenshot_root()?;

    let runs = list_runs(&root, &target.name);
    if runs.is_empty() {
        println!("No runs recorded for {}", target.name);
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:>4} screenshots  {}",
            run.name.bold(),
            run.screenshot_count,
            run.path.display().to_string().dimmed()
        );
    }
    Ok(())
}

async fn compare(left: PathBuf, right: PathBuf, diff_only: bool, exclude_auto_named: bool, json: bool) -> Result<()> {
    let config = Config::load()?;
    let engine = DiffEngine::new(config.diff.tolerance_rate);

    let files = tokio::task::spawn_blocking(move || engine.compare(&left, &right, diff_only, exclude_auto_named))
        .await
        .map_err(|e| Error::Internal(format!("Diff task failed: {}", e)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        println!("No files to compare");
        return Ok(());
    }
    for file in &files {
        let result = match file.result {
            CompareResult::Same => file.result.to_string().green(),
            CompareResult::Difference => file.result.to_string().red(),
            CompareResult::LeftOnly => file.result.to_string().yellow(),
            CompareResult::RightOnly => file.result.to_string().cyan(),
        };
        println!("{:<12} {}", result, file.file_name);
    }
    Ok(())
}
