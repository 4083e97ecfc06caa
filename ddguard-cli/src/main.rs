//! ddguard CLI: daily decision step, historical studies and manual override.
//!
//! Commands:
//! - `step`: apply one trading day to the persisted state and publish the directive
//! - `status`: show the persisted state and override flag
//! - `simulate`: fold the rule over the price history and report
//! - `sweep`: run the sensitivity presets or a parameter grid
//! - `periods`: trailing "last N years" windows and calendar blocks
//! - `flags`: GREEN / YELLOW / RED timeline of recent benchmark returns
//! - `history`: the daily paper-trading performance log
//! - `override pause|resume|status`: operator pause flag

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ddguard_runner::export::{
    export_performance_csv, export_periods_csv, export_sweep_csv, save_artifacts,
};
use ddguard_runner::sweep::rank_by_final_equity;
use ddguard_runner::{
    build_notifier, calendar_blocks, load_prices, preset, preset_scenarios, run_windows,
    trailing_windows, AppConfig, EquitySource, FlagReport, HistoricalSimulator, LiveRunOptions,
    LiveRunner, Notification, Notifier, OverrideStore, ParamGrid, ParamSweep, PerformanceLog,
    PreparedSeries, RunMode, SeriesSnapshotProvider, SimulationResult, SweepRow,
};

#[derive(Parser)]
#[command(
    name = "ddguard",
    about = "ddguard: drawdown pause / trend-confirmed resume for a leveraged allocation"
)]
struct Cli {
    /// Path to the TOML config. Defaults apply when omitted.
    #[arg(long, global = true, env = "DDGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Also write logs to a daily-rolling file in this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply one trading day and publish the allocation directive.
    Step {
        /// As-of date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Broker-reported equity; replaces the modeled equity for this step.
        #[arg(long, env = "DDGUARD_EQUITY")]
        equity: Option<f64>,

        /// Re-apply a step for a market date that was already processed.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// live | shadow. Overrides the config file.
        #[arg(long, env = "DDGUARD_MODE")]
        mode: Option<RunMode>,

        /// Price CSV. Overrides the config file.
        #[arg(long)]
        prices: Option<PathBuf>,
    },
    /// Show persisted state and override flag.
    Status,
    /// Simulate the rule over the price history.
    Simulate {
        #[command(flatten)]
        study: StudyArgs,

        /// Named preset: baseline, test_a, test_b, var_c.
        #[arg(long)]
        preset: Option<String>,

        #[arg(long)]
        pause: Option<f64>,

        #[arg(long)]
        wait: Option<u32>,

        #[arg(long)]
        trend: Option<u32>,

        /// Write report.json / equity.csv / events.csv under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Artifact sub-directory name. Defaults to the preset or rule label.
        #[arg(long)]
        label: Option<String>,
    },
    /// Compare rule parameterizations.
    Sweep {
        #[command(flatten)]
        study: StudyArgs,

        /// Sweep a grid instead of the named presets.
        #[arg(long, default_value_t = false)]
        grid: bool,

        #[arg(long, value_delimiter = ',')]
        limits: Vec<f64>,

        #[arg(long, value_delimiter = ',')]
        waits: Vec<u32>,

        #[arg(long, value_delimiter = ',')]
        trends: Vec<u32>,

        /// Run scenarios sequentially.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Write the sweep table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Simulate independent windows with fresh capital.
    Periods {
        #[arg(long)]
        prices: Option<PathBuf>,

        #[arg(long)]
        initial_equity: Option<f64>,

        /// Trailing horizons in years.
        #[arg(long, value_delimiter = ',', default_values_t = [5, 10, 15, 20])]
        trailing: Vec<u32>,

        /// Calendar block length in years (e.g. 5 or 10). Disabled when omitted.
        #[arg(long)]
        block_years: Option<u32>,

        #[arg(long, default_value_t = 2005)]
        first_year: i32,

        /// Exclusive end year for calendar blocks.
        #[arg(long, default_value_t = 2025)]
        end_year: i32,

        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Flag the most recent daily benchmark returns and write the flags document.
    Flags {
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Number of trading days. Overrides the config file.
        #[arg(long)]
        count: Option<usize>,

        /// Output JSON. Overrides the config file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the paper-trading performance log.
    History {
        /// Only the most recent N rows.
        #[arg(long)]
        last: Option<usize>,

        /// Write the selected rows as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Manual override control.
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },
}

#[derive(Args)]
struct StudyArgs {
    /// Price CSV. Overrides the config file.
    #[arg(long)]
    prices: Option<PathBuf>,

    /// First simulated date (YYYY-MM-DD). Earlier data still warms the SMA.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last simulated date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long)]
    initial_equity: Option<f64>,
}

#[derive(Subcommand)]
enum OverrideAction {
    /// Force the strategy into cash until released.
    Pause {
        #[arg(long)]
        note: Option<String>,
    },
    /// Release the manual pause; automatic rules apply again.
    Resume {
        #[arg(long)]
        note: Option<String>,
    },
    /// Print the current flag.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref());
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Step {
            as_of,
            equity,
            force,
            mode,
            prices,
        } => run_step(config, as_of, equity, force, mode, prices),
        Commands::Status => run_status(&config),
        Commands::Simulate {
            study,
            preset,
            pause,
            wait,
            trend,
            output_dir,
            label,
        } => run_simulate(&config, &study, preset, pause, wait, trend, output_dir, label),
        Commands::Sweep {
            study,
            grid,
            limits,
            waits,
            trends,
            sequential,
            csv,
        } => {
            let grid = grid.then(|| grid_from_args(limits, waits, trends));
            run_sweep(&config, &study, grid, sequential, csv)
        }
        Commands::Periods {
            prices,
            initial_equity,
            trailing,
            block_years,
            first_year,
            end_year,
            csv,
        } => run_periods(
            &config,
            prices,
            initial_equity,
            &trailing,
            block_years.map(|step| (first_year, end_year, step)),
            csv,
        ),
        Commands::Flags {
            prices,
            count,
            output,
        } => run_flags(&config, prices, count, output),
        Commands::History { last, csv } => run_history(&config, last, csv),
        Commands::Override { action } => run_override(&config, action),
    }
}

/// Console logs go to stderr; `--log-dir` adds a daily-rolling file.
fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let mut guard = None;
    let file_layer = match log_dir {
        Some(dir) => match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "ddguard.log");
                let (writer, g) = tracing_appender::non_blocking(appender);
                guard = Some(g);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: could not create log directory {} ({e}); file logging disabled",
                    dir.display()
                );
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
    guard
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => AppConfig::from_file(p)
            .with_context(|| format!("failed to load config {}", p.display())),
        None => Ok(AppConfig::default()),
    }
}

fn run_step(
    mut config: AppConfig,
    as_of: Option<NaiveDate>,
    equity: Option<f64>,
    force: bool,
    mode: Option<RunMode>,
    prices: Option<PathBuf>,
) -> Result<()> {
    if let Some(m) = mode {
        config.live.mode = m;
    }
    if let Some(p) = prices {
        config.live.prices_path = p;
    }
    let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());

    let points = load_prices(&config.live.prices_path)?;
    let provider = SeriesSnapshotProvider::new(
        points,
        config.rule.trend_sma_period,
        config.live.max_staleness_days,
    );
    if let Some(latest) = provider.latest_date() {
        info!(observations = provider.len(), %latest, %as_of, "prices loaded");
    }
    let notifier = build_notifier(&config.notifications);
    let runner = LiveRunner::new(&config, provider, notifier)?;

    let opts = LiveRunOptions {
        as_of,
        equity: equity.map_or(EquitySource::Modeled, EquitySource::Observed),
        force,
    };
    let report = runner.run(&opts, Utc::now())?;

    let s = &report.outcome.state;
    let target = report.directive.target_symbol().unwrap_or("-");
    println!(
        "{} | {} | event {} | equity {:.2} | dd {:.2}% | paused {}d | trend {}d | target {} ({})",
        report.snapshot.date,
        s.mode,
        report.outcome.event,
        s.equity,
        s.drawdown * 100.0,
        s.days_paused,
        s.trend_confirmation_days,
        target,
        runner.run_mode(),
    );
    Ok(())
}

fn run_status(config: &AppConfig) -> Result<()> {
    let provider = SeriesSnapshotProvider::new(Vec::new(), config.rule.trend_sma_period, 0);
    let runner = LiveRunner::new(config, provider, ddguard_runner::NullNotifier)?;
    let status = runner.status()?;
    let s = &status.state;

    println!();
    println!("=== Decision State ===");
    if !status.persisted {
        println!("(no persisted state; showing defaults)");
    }
    println!("Mode:           {}", s.mode);
    println!("Equity:         {:.2}", s.equity);
    println!("High-Water:     {:.2}", s.high_water_mark);
    println!("Drawdown:       {:.2}%", s.drawdown * 100.0);
    println!(
        "Paused:         {}d (need {})",
        s.days_paused, config.rule.resume_wait_days
    );
    println!(
        "Trend Streak:   {}d (need {})",
        s.trend_confirmation_days, config.rule.resume_trend_days
    );
    println!("Last Event:     {}", s.last_event);
    if let Some(d) = s.pause_started_on {
        println!("Paused Since:   {d}");
    }
    if let Some(d) = s.last_step_on {
        println!("Last Step:      {d}");
    }
    println!(
        "Override:       {}",
        if status.manual_override.paused { "PAUSED" } else { "off" }
    );
    println!();
    Ok(())
}

/// Load and prepare the price series for a study.
fn prepare_series(config: &AppConfig, prices: Option<&Path>) -> Result<PreparedSeries> {
    let path = prices.unwrap_or(&config.live.prices_path);
    let points = load_prices(path)?;
    Ok(PreparedSeries::new(points, config.rule.trend_sma_period)?)
}

#[allow(clippy::too_many_arguments)]
fn run_simulate(
    config: &AppConfig,
    study: &StudyArgs,
    preset_name: Option<String>,
    pause: Option<f64>,
    wait: Option<u32>,
    trend: Option<u32>,
    output_dir: Option<PathBuf>,
    label: Option<String>,
) -> Result<()> {
    let mut rule = match &preset_name {
        Some(name) => match preset(name, &config.rule) {
            Some(s) => s.rule,
            None => bail!("unknown preset '{name}' (expected baseline, test_a, test_b, var_c)"),
        },
        None => config.rule,
    };
    if let Some(v) = pause {
        rule.pause_drawdown_limit = v;
    }
    if let Some(v) = wait {
        rule.resume_wait_days = v;
    }
    if let Some(v) = trend {
        rule.resume_trend_days = v;
    }

    let series = prepare_series(config, study.prices.as_deref())?;
    let initial = study.initial_equity.unwrap_or(config.portfolio.initial_equity);
    let sim = HistoricalSimulator::new(rule, initial)?;
    let result = sim.run_window(&series, study.start, study.end)?;

    print_summary(&result, &config.portfolio.benchmark_symbol);

    if let Some(dir) = output_dir {
        let label = label
            .or(preset_name)
            .unwrap_or_else(|| rule.label().replace(['%', '/', ' ', '@', '+'], "_"));
        let run_dir = save_artifacts(&result, &dir, &label)?;
        println!("Artifacts:      {}", run_dir.display());
    }
    Ok(())
}

fn grid_from_args(limits: Vec<f64>, waits: Vec<u32>, trends: Vec<u32>) -> ParamGrid {
    let defaults = ParamGrid::default();
    ParamGrid {
        pause_limits: if limits.is_empty() { defaults.pause_limits } else { limits },
        wait_days: if waits.is_empty() { defaults.wait_days } else { waits },
        trend_days: if trends.is_empty() { defaults.trend_days } else { trends },
    }
}

fn run_sweep(
    config: &AppConfig,
    study: &StudyArgs,
    grid: Option<ParamGrid>,
    sequential: bool,
    csv: Option<PathBuf>,
) -> Result<()> {
    let scenarios = match &grid {
        Some(g) => g.scenarios(&config.rule),
        None => preset_scenarios(&config.rule),
    };
    let series = prepare_series(config, study.prices.as_deref())?;
    let initial = study.initial_equity.unwrap_or(config.portfolio.initial_equity);

    info!(scenarios = scenarios.len(), parallel = !sequential, "running sweep");
    let rows = ParamSweep::new(&series, initial)
        .with_window(study.start, study.end)
        .with_parallelism(!sequential)
        .run(&scenarios)?;

    print_sweep_table(&rows);
    if let Some(path) = csv {
        std::fs::write(&path, export_sweep_csv(&rows)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("CSV:            {}", path.display());
    }
    Ok(())
}

fn run_periods(
    config: &AppConfig,
    prices: Option<PathBuf>,
    initial_equity: Option<f64>,
    trailing: &[u32],
    blocks: Option<(i32, i32, u32)>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let series = prepare_series(config, prices.as_deref())?;
    let sim = HistoricalSimulator::new(
        config.rule,
        initial_equity.unwrap_or(config.portfolio.initial_equity),
    )?;

    let mut windows = trailing_windows(series.last_date(), trailing);
    if let Some((first, end, step)) = blocks {
        windows.extend(calendar_blocks(first, end, step));
    }
    let results = run_windows(&sim, &series, &windows)?;

    println!();
    println!(
        "{:<12} {:<10} {:<10} {:>14} {:>8} {:>8} {:>14} {:>8} {:>6}",
        "Window", "Start", "End", "Final", "CAGR", "MaxDD", "Benchmark", "B.CAGR", "Pauses"
    );
    for r in &results {
        let s = &r.result.summary;
        println!(
            "{:<12} {:<10} {:<10} {:>14.2} {:>7.2}% {:>7.2}% {:>14.2} {:>7.2}% {:>6}",
            r.window.label,
            s.start,
            s.end,
            s.strategy.final_value,
            s.strategy.cagr * 100.0,
            s.strategy.max_drawdown * 100.0,
            s.benchmark.final_value,
            s.benchmark.cagr * 100.0,
            s.pauses,
        );
    }
    println!();

    if let Some(path) = csv {
        std::fs::write(&path, export_periods_csv(&results)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

fn run_flags(
    config: &AppConfig,
    prices: Option<PathBuf>,
    count: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let path = prices.unwrap_or_else(|| config.live.prices_path.clone());
    let points = load_prices(&path)?;
    let count = count.unwrap_or(config.flags.count);
    let report = FlagReport::build(&points, count, config.flags.red_below, Utc::now());

    println!();
    for f in &report.flags {
        println!("{}  {:>+8.2}%  {:?}", f.date, f.daily_return * 100.0, f.flag);
    }
    println!();

    let output = output.unwrap_or_else(|| config.flags.path.clone());
    report.save(&output)?;
    println!("Flags:          {} ({} days)", output.display(), report.count);
    Ok(())
}

fn run_history(config: &AppConfig, last: Option<usize>, csv: Option<PathBuf>) -> Result<()> {
    let Some(path) = &config.live.performance_path else {
        bail!("performance log is disabled (set live.performance_path)");
    };
    let history = PerformanceLog::new(path).load()?.history;
    let skip = last.map_or(0, |n| history.len().saturating_sub(n));
    let rows = &history[skip..];

    println!();
    println!(
        "{:<10} {:>14} {:>14} {:<8} {:<16}",
        "Date", "Benchmark", "Strategy", "Mode", "Event"
    );
    for r in rows {
        println!(
            "{:<10} {:>14.2} {:>14.2} {:<8} {:<16}",
            r.date,
            r.benchmark,
            r.strategy,
            r.mode.as_str(),
            r.event.as_str()
        );
    }
    println!();

    if let Some(out) = csv {
        std::fs::write(&out, export_performance_csv(rows)?)
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("CSV:            {}", out.display());
    }
    Ok(())
}

fn run_override(config: &AppConfig, action: OverrideAction) -> Result<()> {
    let store = OverrideStore::new(&config.live.override_path);
    let (paused, note) = match action {
        OverrideAction::Status => {
            let doc = store.load()?;
            println!(
                "Manual override: {}{}",
                if doc.paused { "PAUSED" } else { "off" },
                doc.note.map(|n| format!(" ({n})")).unwrap_or_default()
            );
            if let Some(at) = doc.updated_at {
                println!("Updated:         {at}");
            }
            return Ok(());
        }
        OverrideAction::Pause { note } => (true, note),
        OverrideAction::Resume { note } => (false, note),
    };

    let now = Utc::now();
    let doc = store.set(paused, note, now)?;
    let notification = Notification::override_changed(doc.paused, doc.note.as_deref(), now);
    if let Err(e) = build_notifier(&config.notifications).notify(&notification) {
        tracing::warn!(error = %e, "override notification failed");
    }
    println!(
        "Manual override {} ({})",
        if paused { "engaged" } else { "released" },
        store.path().display()
    );
    Ok(())
}

fn print_summary(result: &SimulationResult, benchmark: &str) {
    let s = &result.summary;
    println!();
    println!("=== Simulation Result ===");
    println!("Rule:           {}", result.rule.label());
    println!("Fingerprint:    {}", &result.fingerprint[..12.min(result.fingerprint.len())]);
    println!("Period:         {} to {} ({:.1} years)", s.start, s.end, s.years);
    println!("Trading Days:   {}", s.trading_days);
    println!();
    println!("--- Strategy ---");
    println!("Final Equity:   {:.2}", s.strategy.final_value);
    println!("Total Return:   {:.2}%", s.strategy.total_return * 100.0);
    println!("CAGR:           {:.2}%", s.strategy.cagr * 100.0);
    println!("Max Drawdown:   {:.2}%", s.strategy.max_drawdown * 100.0);
    println!("Pauses:         {}", s.pauses);
    println!("Resumes:        {}", s.resumes);
    println!("Days Exposed:   {}", s.exposed_days);
    println!("Days Paused:    {}", s.paused_days);
    println!("Final Mode:     {}", s.final_mode);
    println!();
    println!("--- Buy & Hold {benchmark} ---");
    println!("Final Equity:   {:.2}", s.benchmark.final_value);
    println!("Total Return:   {:.2}%", s.benchmark.total_return * 100.0);
    println!("CAGR:           {:.2}%", s.benchmark.cagr * 100.0);
    println!("Max Drawdown:   {:.2}%", s.benchmark.max_drawdown * 100.0);

    if !result.milestones.is_empty() {
        println!();
        println!("--- Milestones ---");
        for m in &result.milestones {
            println!(
                "{:>2}y  {}  strategy {:>14.2}  {benchmark} {:>14.2}  delta {:>+14.2}",
                m.years,
                m.date,
                m.strategy_equity,
                m.benchmark_equity,
                m.delta()
            );
        }
    }

    if !result.events.is_empty() {
        println!();
        println!("--- Events ---");
        for e in &result.events {
            println!(
                "{}  {:<16}  equity {:>14.2}  dd {:>7.2}%",
                e.date,
                e.event.as_str(),
                e.equity,
                e.drawdown * 100.0
            );
        }
    }

    if !result.yearly.is_empty() {
        println!();
        println!("--- Yearly ---");
        println!("{:<6} {:>9} {:>9} {:>9} {:>9}", "Year", "Return", "MaxDD", "B.Return", "B.MaxDD");
        for y in &result.yearly {
            println!(
                "{:<6} {:>8.2}% {:>8.2}% {:>8.2}% {:>8.2}%",
                y.year,
                y.strategy_return * 100.0,
                y.strategy_max_drawdown * 100.0,
                y.benchmark_return * 100.0,
                y.benchmark_max_drawdown * 100.0
            );
        }
    }
    println!();
}

fn print_sweep_table(rows: &[SweepRow]) {
    println!();
    println!(
        "| {:<16} | {:>6} | {:>8} | {:>14} | {:>7} | {:>7} | {:>6} |",
        "Scenario", "Pause", "Resume", "Final Equity", "CAGR", "MaxDD", "Pauses"
    );
    for row in rows {
        let r = &row.scenario.rule;
        let s = &row.result.summary;
        println!(
            "| {:<16} | {:>5.0}% | {:>3}+{:<4} | {:>14.2} | {:>6.2}% | {:>6.2}% | {:>6} |",
            row.scenario.name,
            r.pause_drawdown_limit * 100.0,
            r.resume_wait_days,
            r.resume_trend_days,
            s.strategy.final_value,
            s.strategy.cagr * 100.0,
            s.strategy.max_drawdown * 100.0,
            s.pauses,
        );
    }
    if let Some(best) = rank_by_final_equity(rows).first() {
        println!();
        println!("Best final equity: {}", best.scenario.name);
    }
    println!();
}

