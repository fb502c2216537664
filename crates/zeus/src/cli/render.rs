//! Terminal rendering. The only module that writes to stdout.

use console::style;
use zeusapp::api::StatusReport;
use zeusapp::approval::Proposal;
use zeusapp::doctor::{DoctorReport, RepairAction};
use zeusapp::error::Result;
use zeusapp::logs::ChangeEntry;
use zeusapp::model::{Entity, Kind};
use zeusapp::snapshot::SnapshotInfo;

pub fn success(message: &str) {
    println!("{} {message}", style("✓").green());
}

pub fn warn(message: &str) {
    println!("{} {message}", style("!").yellow());
}

pub fn plural(kind: Kind) -> &'static str {
    match kind {
        Kind::Vision => "Visions",
        Kind::Objective => "Objectives",
        Kind::UseCase => "Use Cases",
        Kind::Activity => "Activities",
        Kind::Actor => "Actors",
        Kind::Subsystem => "Subsystems",
        Kind::Consideration => "Considerations",
        Kind::Decision => "Decisions",
        Kind::Risk => "Risks",
        Kind::Problem => "Problems",
        Kind::Assumption => "Assumptions",
        Kind::Constraint => "Constraints",
        Kind::Quality => "Qualities",
    }
}

pub fn status(report: &StatusReport) {
    println!("Project: {}", style(&report.project).bold());
    println!("Automation: {}", report.automation_level.name());
    let health = match report.health.as_str() {
        "ok" => style(report.health.clone()).green(),
        "warnings" => style(report.health.clone()).yellow(),
        _ => style(report.health.clone()).red(),
    };
    println!("Health: {health}");
    if let Some(last) = report.last_snapshot {
        println!("Last snapshot: {}", last.to_rfc3339());
    }
    println!("Pending proposals: {}", report.pending_proposals);
    for kind in Kind::ALL {
        if kind == Kind::Vision {
            continue;
        }
        let count = report.counts.get(kind.name()).copied().unwrap_or(0);
        println!("Total {}: {count}", plural(kind));
    }
}

pub fn entity_line(entity: &Entity) {
    println!(
        "{}  {}  [{}]",
        style(entity.id().as_str()).cyan(),
        entity.title(),
        entity.status().name()
    );
}

pub fn entity_yaml(entity: &Entity) -> Result<()> {
    print!("{}", serde_yaml::to_string(&entity.to_value()?)?);
    Ok(())
}

pub fn proposal_line(proposal: &Proposal) {
    let target = proposal
        .entity_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "(new)".to_string());
    println!(
        "{}  {:?} {} {}",
        style(&proposal.id).cyan(),
        proposal.operation,
        proposal.kind.name(),
        target
    );
}

pub fn snapshot_line(snapshot: &SnapshotInfo) {
    match &snapshot.label {
        Some(label) => println!("{}  {label}", style(&snapshot.name).cyan()),
        None => println!("{}", style(&snapshot.name).cyan()),
    }
}

pub fn history_line(entry: &ChangeEntry) {
    let subject = entry
        .id
        .as_deref()
        .or(entry.proposal_id.as_deref())
        .unwrap_or("-");
    let title = entry.title.as_deref().or(entry.detail.as_deref()).unwrap_or("");
    println!(
        "{}  {:<18} {subject}  {title}",
        entry.ts.to_rfc3339(),
        entry.op
    );
}

pub fn doctor_report(report: &DoctorReport) {
    for check in &report.checks {
        let mark = if check.ok {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("{mark} {:<10} {}", check.name, check.detail);
        if let Some(repair) = &check.repair {
            println!("    fix: {repair}");
        }
    }
}

pub fn repair_actions(actions: &[RepairAction], dry_run: bool) {
    if actions.is_empty() {
        success("Nothing to repair.");
        return;
    }
    for action in actions {
        if action.applied {
            success(&action.description);
        } else {
            println!("{} {}", style("would").yellow(), action.description);
        }
    }
    if dry_run {
        println!("(dry run: nothing was changed)");
    }
}
