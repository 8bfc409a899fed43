use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;
use tracing::{error, info};

use ms_core::{ModelStatus, RunStateHandle};
use ms_simulation::{
    ModelSchema, RunSummary, SimConfig, SimResult, Simulation, Time, TimePolicy, TraceKind,
    TraceRecord,
};

use crate::models::{self, ModelInfo};

pub struct RunOptions {
    pub model: String,
    pub replicates: u32,
    pub seed: Option<u64>,
    pub horizon: Option<f64>,
    pub jit: bool,
    pub trace: bool,
    pub config: Option<PathBuf>,
    pub json: bool,
}

/// Outcome of one replicate.
#[derive(Debug, Serialize)]
struct Report {
    member: u32,
    status: char,
    events: u64,
    time: Time,
    checksum: f64,
    entities: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    trace: Vec<String>,
}

impl Report {
    fn panicked(member: u32) -> Self {
        Self {
            member,
            status: ModelStatus::Error.code().unwrap_or('e'),
            events: 0,
            time: 0.0,
            checksum: 0.0,
            entities: 0,
            note: None,
            error: Some("replicate thread panicked".to_string()),
            trace: Vec::new(),
        }
    }
}

pub fn run(opts: &RunOptions) -> Result<(), String> {
    let model = models::find(&opts.model)
        .ok_or_else(|| format!("unknown model '{}' (see `ms models`)", opts.model))?;
    if opts.replicates == 0 {
        return Err("at least one replicate is required".to_string());
    }
    let config = load_config(opts)?;
    let horizon = opts.horizon.unwrap_or(model.horizon);
    let schema =
        (model.build)().map_err(|e| format!("model '{}' failed to build: {e}", model.name))?;

    info!(
        model = model.name,
        replicates = opts.replicates,
        seed = config.seed,
        horizon,
        "starting run"
    );

    let reports: Vec<Report> = thread::scope(|scope| {
        let handles: Vec<_> = (0..opts.replicates)
            .map(|member| {
                let schema = Arc::clone(&schema);
                // Only the first replicate keeps a trace.
                let config = config
                    .clone()
                    .with_member(member)
                    .with_event_trace(config.event_trace && member == 0);
                (member, scope.spawn(move || replicate(model, schema, config, horizon)))
            })
            .collect();
        handles
            .into_iter()
            .map(|(member, handle)| {
                handle.join().unwrap_or_else(|_| {
                    error!(member, "replicate thread panicked");
                    Report::panicked(member)
                })
            })
            .collect()
    });

    if opts.json {
        let json = serde_json::to_string_pretty(&reports)
            .map_err(|e| format!("failed to serialize reports: {e}"))?;
        println!("{json}");
    } else {
        print_reports(model, &config, horizon, &reports);
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        return Err(format!("{failed} of {} replicates failed", reports.len()));
    }
    Ok(())
}

fn load_config(opts: &RunOptions) -> Result<SimConfig, String> {
    let mut config = match &opts.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            toml::from_str(&text).map_err(|e| format!("invalid config {}: {e}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(seed) = opts.seed {
        config = config.with_seed(seed);
    }
    if opts.jit {
        config = config.with_time_policy(TimePolicy::JustInTime);
    }
    if opts.trace {
        config = config.with_event_trace(true);
    }
    Ok(config)
}

fn replicate(
    model: &ModelInfo,
    schema: Arc<ModelSchema>,
    config: SimConfig,
    horizon: Time,
) -> Report {
    let member = config.member;
    let state = RunStateHandle::new();
    let mut sim = Simulation::new(schema, config);

    let outcome = simulate(model, &mut sim, &state, horizon);
    if outcome.is_err() {
        state.set_status(ModelStatus::Error);
    }
    let trace = sim.trace_log().records().iter().map(format_record).collect();
    let (summary, note, error) = match outcome {
        Ok((summary, note)) => (summary, Some(note), None),
        Err(e) => {
            error!(member, error = %e, "replicate failed");
            (sim.summary(), None, Some(e.to_string()))
        }
    };

    Report {
        member,
        status: state.status().code().unwrap_or('?'),
        events: summary.events,
        time: summary.time,
        checksum: summary.checksum,
        entities: summary.entities,
        note,
        error,
        trace,
    }
}

fn simulate(
    model: &ModelInfo,
    sim: &mut Simulation,
    state: &RunStateHandle,
    horizon: Time,
) -> SimResult<(RunSummary, String)> {
    sim.initialize_runtime()?;
    (model.populate)(sim)?;
    let summary = sim.run(state, horizon)?;
    let note = (model.describe)(sim)?;
    sim.finalize_runtime()?;
    Ok((summary, note))
}

fn format_record(record: &TraceRecord) -> String {
    let what = match &record.kind {
        TraceKind::EventFired { event, entity, .. } => format!("{event} in entity {entity}"),
        TraceKind::LinkChanged {
            entity,
            link,
            old,
            new,
        } => format!("{link} of entity {entity}: {old} -> {new}"),
        TraceKind::MultilinkChanged {
            entity,
            multilink,
            target,
            inserted,
        } => {
            let sign = if *inserted { '+' } else { '-' };
            format!("{multilink} of entity {entity}: {sign}{target}")
        }
        TraceKind::EntityEntered { entity, kind } => format!("{kind} {entity} entered"),
        TraceKind::EntityExited { entity, kind } => format!("{kind} {entity} exited"),
    };
    format!("{:>12.4} #{:<6} {what}", record.time, record.event_counter)
}

fn print_reports(model: &ModelInfo, config: &SimConfig, horizon: Time, reports: &[Report]) {
    println!(
        "  {} '{}' {}",
        "Model".bold(),
        model.name,
        format!(
            "(horizon {horizon}, seed {}, {:?} aging)",
            config.seed, config.time_policy
        )
        .dimmed()
    );
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Member", "Status", "Events", "Time", "Checksum", "Entities", "Note",
    ]);
    for report in reports {
        let status = match ModelStatus::from_code(report.status) {
            Ok(status) if status.is_error() => status.to_string().red().bold().to_string(),
            Ok(status) => status.to_string().green().to_string(),
            Err(_) => report.status.to_string(),
        };
        table.add_row(vec![
            report.member.to_string(),
            status,
            report.events.to_string(),
            format!("{:.4}", report.time),
            format!("{:.6}", report.checksum),
            report.entities.to_string(),
            report.note.clone().unwrap_or_default(),
        ]);
    }
    println!("{table}");

    for report in reports {
        if let Some(error) = &report.error {
            println!("  {} member {}: {error}", "FAILED".red().bold(), report.member);
        }
    }

    if let Some(first) = reports.first().filter(|r| !r.trace.is_empty()) {
        println!();
        println!("  {}", "Event Trace".bold().underline());
        for line in &first.trace {
            println!("  {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn options(config: Option<PathBuf>) -> RunOptions {
        RunOptions {
            model: "two-clocks".to_string(),
            replicates: 1,
            seed: None,
            horizon: None,
            jit: false,
            trace: false,
            config,
            json: false,
        }
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed = 5\nevent_checksum = false\ntime_policy = \"eager\"").unwrap();

        let mut opts = options(Some(file.path().to_path_buf()));
        let config = load_config(&opts).unwrap();
        assert_eq!(config.seed, 5);
        assert!(!config.event_checksum);

        opts.seed = Some(9);
        opts.jit = true;
        let config = load_config(&opts).unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.time_policy, TimePolicy::JustInTime);
    }

    #[test]
    fn malformed_config_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seed = \"many\"").unwrap();
        let err = load_config(&options(Some(file.path().to_path_buf()))).unwrap_err();
        assert!(err.starts_with("invalid config"));
    }

    #[test]
    fn replicate_reports_done() {
        let model = models::find("two-clocks").unwrap();
        let schema = (model.build)().unwrap();
        let config = SimConfig::default().with_event_trace(true);
        let report = replicate(model, schema, config, model.horizon);
        assert_eq!(report.status, 's');
        assert_eq!(report.events, 2);
        assert_eq!(report.note.as_deref(), Some("fired: Y,X"));
        assert!(report.trace.iter().any(|line| line.contains("Y in entity 1")));
    }
}
