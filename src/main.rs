use anyhow::{Context, Result};
use chrono::{Local, Utc};
use playbook_runner::{
    branch_guard::{check_base_branch, parse_pull_request_arg, BranchVerdict, PullRequestClient},
    cli::{
        commands::{CheckBaseBranchCommand, HistoryCommand, RunCommand, ValidateCommand},
        output::*,
        Cli, Command,
    },
    core::{
        config::{load_conf_files, RunnerConfig, TestFilter},
        instances::{get_server_numeric_version, load_instances, ServerInstance},
        params::{bind_integration_params, Placeholders},
        results::TestsDataKeeper,
        settings::ExecutionSettings,
    },
    execution::{build_queue, Decision, RunContext, RunEvent, SkipFilter, TestRunner},
    notify::{FailureNotifier, SlackNotifier},
    persistence::{
        create_summary, save_run_or_warn, store_or_in_memory, write_result_files,
        InMemoryPersistence, PersistenceBackend, RunSummary,
    },
    server::{ServerClientConfig, SubprocessServerClient},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let exit_code = match &cli.command {
        Command::Run(cmd) => manage_tests(cmd).await?,
        Command::CheckBaseBranch(cmd) => check_branch(cmd).await?,
        Command::Validate(cmd) => validate_conf(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(
        playbook_runner::persistence::SqliteRunStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(InMemoryPersistence::new()))
}

/// Servers to test: the explicit server of a local run, or the instance
/// file entries named after the requested server version
fn resolve_instances(settings: &ExecutionSettings, config: &RunnerConfig) -> Result<Vec<ServerInstance>> {
    if let Some(server) = &settings.server {
        return Ok(vec![ServerInstance::new(settings.server_version.clone(), server.clone())]);
    }
    Ok(load_instances(&config.instances_file)?
        .into_iter()
        .filter(|instance| instance.name == settings.server_version)
        .collect())
}

async fn manage_tests(cmd: &RunCommand) -> Result<i32> {
    println!("Time is: {}\n", Local::now());

    let settings = cmd.to_settings();
    let config = RunnerConfig::load(cmd.runner_config.as_deref())
        .context("Failed to load runner config")?;
    let (conf, secret) = load_conf_files(&settings.conf_path, settings.secret_conf_path.as_deref())?;
    let filter = TestFilter::from_file(&config.filter_file)?;
    let server_numeric_version = get_server_numeric_version(
        &settings.server_version,
        settings.is_local_run(),
        &config.env_results_file,
    );
    let instances = resolve_instances(&settings, &config)?;

    println!(
        "{} Loaded {} tests, server version {}",
        INFO,
        style(conf.tests.len()).cyan(),
        style(&server_numeric_version).bold()
    );
    if instances.is_empty() {
        println!("{} No instances named {}", WARN, style(&settings.server_version).yellow());
    }

    // Set up persistence
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        store_or_in_memory(open_history().await)
    };

    let client = Arc::new(SubprocessServerClient::new(ServerClientConfig::from(&config)));
    let notifier: Option<Arc<dyn FailureNotifier>> =
        match SlackNotifier::new(settings.slack_token.clone(), config.slack_channel.clone()) {
            Ok(notifier) => Some(Arc::new(notifier)),
            Err(e) => {
                warn!("Failure notifications disabled: {}", e);
                None
            }
        };

    let mut runner = TestRunner::new(client, notifier)
        .with_cooldown(Duration::from_secs(config.round_cooldown_secs));

    let progress = create_progress_bar(build_queue(&settings, &conf).len() * instances.len());
    let bar = progress.clone();
    runner.add_event_handler(move |event| {
        if let Some(line) = format_run_event(&event) {
            bar.suspend(|| println!("{}", line));
        }
        if matches!(
            event,
            RunEvent::TestPassed { .. }
                | RunEvent::TestFailed { .. }
                | RunEvent::TestSkipped { .. }
                | RunEvent::ParamsBindingFailed { .. }
        ) {
            bar.inc(1);
        }
    });

    let started_at = Utc::now();
    let mut keeper = TestsDataKeeper::new();
    let mut fatal = None;

    for (thread_index, instance) in instances.iter().enumerate() {
        let server_url = instance.server_url();
        progress.suspend(|| {
            println!(
                "{}",
                style(format!("Starting private testing for {}", instance.name)).green()
            );
            println!("Starts tests with server url - {}", server_url);
        });

        let ctx = RunContext {
            settings: &settings,
            conf: &conf,
            secret: &secret,
            filter: &filter,
            server_url: &server_url,
            server_numeric_version: &server_numeric_version,
            thread_index,
        };

        if let Err(e) = runner.execute_testing(&ctx, &mut keeper).await {
            fatal = Some(e);
            break;
        }
        if thread_index + 1 < instances.len() {
            tokio::time::sleep(Duration::from_secs(config.instance_pause_secs)).await;
        }
    }
    progress.finish_and_clear();

    println!("\n{}", format_test_summary(&keeper, settings.is_ami));
    write_result_files(&config.results_dir, &keeper.results)?;

    if !cmd.no_history {
        let summary = create_summary(&settings, &keeper, started_at);
        if save_run_or_warn(store.as_ref(), &summary).await {
            println!(
                "\n{} Run saved to history (ID: {})",
                INFO,
                style(&summary.run_id.to_string()[..8]).dim()
            );
        }
    }

    if let Some(e) = fatal {
        error!("Test run aborted: {}", e);
        return Err(e).context("Test run aborted");
    }

    if keeper.has_failures() {
        println!("Some tests have failed. Not destroying instances.");
        return Ok(1);
    }

    println!("\n{} All tests {}", CHECK, style("passed").green());
    Ok(0)
}

async fn check_branch(cmd: &CheckBaseBranchCommand) -> Result<i32> {
    let config = RunnerConfig::load(cmd.runner_config.as_deref())
        .context("Failed to load runner config")?;
    let pr_number = parse_pull_request_arg(&cmd.pull_request)?;
    let api_base = cmd.api_base.clone().unwrap_or(config.pull_request_api);
    let mainline = cmd.mainline.clone().unwrap_or(config.mainline_branch);

    let client = PullRequestClient::new(api_base, cmd.verify_tls || config.verify_tls)?;

    println!(
        "{}",
        style(format!("Starting to fetch the base branch of PR num {}", pr_number)).green()
    );
    let verdict = check_base_branch(&client, pr_number, &mainline).await;
    println!(
        "{}",
        style(format!("Finished to fetch the base branch of PR num {}", pr_number)).green()
    );

    match &verdict {
        BranchVerdict::TargetsMainline => {
            println!(
                "{} {}",
                CROSS,
                style(format!(
                    "You cannot merge into {} when creating an external PR.",
                    mainline
                ))
                .red()
            );
        }
        BranchVerdict::Undetermined(_) | BranchVerdict::Allowed { .. } => {
            if let BranchVerdict::Undetermined(cause) = &verdict {
                println!("{} {}", WARN, format_undetermined(*cause, pr_number));
            }
            println!(
                "{}",
                style(format!(
                    "Base branch of PR num {} is not {} - Great!",
                    pr_number, mainline
                ))
                .green()
            );
        }
    }

    Ok(verdict.exit_code())
}

fn validate_conf(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating conf...", INFO);

    let config = RunnerConfig::load(cmd.runner_config.as_deref())
        .context("Failed to load runner config")?;
    let (conf, secret) = match load_conf_files(&cmd.conf, cmd.secret.as_deref()) {
        Ok(files) => files,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            return Ok(1);
        }
    };
    let filter = TestFilter::from_file(&config.filter_file)?;
    let skip_filter = SkipFilter::from_conf(&conf, &filter, &cmd.server_numeric_version);

    // Only the test list matters for building the queue
    let probe = ExecutionSettings {
        api_key: String::new(),
        server: None,
        conf_path: cmd.conf.clone(),
        secret_conf_path: cmd.secret.clone(),
        nightly: false,
        slack_token: String::new(),
        circleci_token: String::new(),
        build_number: String::new(),
        build_name: String::new(),
        service_account: None,
        is_ami: false,
        mem_check: false,
        server_version: String::new(),
        tests_list: cmd
            .tests_list
            .as_deref()
            .map(ExecutionSettings::parse_tests_list),
    };

    let placeholders = Placeholders::for_server("https://localhost");
    let mut rows = Vec::new();
    let mut invalid = 0;

    for descriptor in build_queue(&probe, &conf) {
        let decision = skip_filter.decide(&descriptor);
        let binding = match decision {
            Decision::Run if cmd.secret.is_some() => bind_integration_params(
                "",
                &descriptor.integrations,
                &secret.integrations,
                &descriptor.instance_names,
                &descriptor.playbook_id,
                &placeholders,
            )
            .err()
            .map(|e| e.to_string()),
            _ => None,
        };
        if binding.is_some() {
            invalid += 1;
        }
        rows.push((descriptor.playbook_id, decision, binding));
    }

    if cmd.json {
        let data: Vec<_> = rows
            .iter()
            .map(|(playbook_id, decision, binding)| {
                let skip_reason = match decision {
                    Decision::Run => None,
                    Decision::Skip(reason) => Some(reason.to_string()),
                };
                serde_json::json!({
                    "playbook_id": playbook_id,
                    "run": decision.is_run(),
                    "skip_reason": skip_reason,
                    "binding_error": binding,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "tests": data }))?);
    } else {
        for (playbook_id, decision, binding) in &rows {
            match (decision, binding) {
                (_, Some(error)) => println!("  {} {}: {}", CROSS, style(playbook_id).red(), error),
                (Decision::Run, None) => println!("  {} {}", CHECK, style(playbook_id).green()),
                (Decision::Skip(reason), None) => {
                    println!("  {} {} - {}", WARN, style(playbook_id).yellow(), reason)
                }
            }
        }
    }

    let runnable = rows.iter().filter(|(_, decision, _)| decision.is_run()).count();
    println!(
        "{} {} tests, {} would run, {} skipped",
        INFO,
        style(rows.len()).cyan(),
        style(runnable).green(),
        style(rows.len() - runnable).yellow()
    );

    if invalid > 0 {
        println!("{} {} tests cannot bind their integrations", CROSS, invalid);
        return Ok(1);
    }
    println!("{} Conf is valid!", CHECK);
    Ok(0)
}

async fn show_history(cmd: &HistoryCommand) -> Result<i32> {
    let store = open_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(0);
    }

    let builds = match &cmd.build {
        Some(build) => vec![build.clone()],
        None => store.list_builds().await?,
    };
    let mut runs = Vec::new();
    for build in &builds {
        runs.extend(store.list_runs(build).await?);
    }
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs.truncate(cmd.limit);

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(0);
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, cmd.limit);
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(0)
}

fn print_run_details(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Build: {} #{}", style(&summary.build_name).bold(), summary.build_number);
    println!("  Server version: {}", summary.server_version);
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    println!("  Completed: {}", style(summary.completed_at.to_rfc3339()).dim());
    if let Ok(duration) = summary
        .completed_at
        .signed_duration_since(summary.started_at)
        .to_std()
    {
        println!("  Duration: {}", style(format_duration(duration)).dim());
    }
    println!(
        "  Tests: {} passed, {} failed, {} skipped",
        style(summary.succeeded).green(),
        style(summary.failed).red(),
        style(summary.skipped).yellow()
    );
    Ok(())
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
