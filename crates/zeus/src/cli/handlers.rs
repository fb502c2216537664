//! Per-command handlers: resolve the project, call the API facade, render.

use zeusapp::api::ZeusApi;
use zeusapp::approval::MutationOutcome;
use zeusapp::ctx::OpCtx;
use zeusapp::error::{Result, ZeusError};
use zeusapp::graph::{self, render as graph_render, GraphFilter};
use zeusapp::model::{EntityId, EntityStatus, Kind};
use zeusapp::store::{FieldMap, ListFilter};

use super::render;
use super::setup::{GraphFormat, SnapshotCommands, UmlCommands, UmlTarget};

fn open_api() -> Result<ZeusApi> {
    ZeusApi::discover(&std::env::current_dir()?)
}

/// Parse repeated `FIELD=VALUE` arguments; values are YAML, so lists and
/// numbers work (`--set 'dependencies=[act-12345678]'`).
fn parse_sets(sets: &[String]) -> Result<FieldMap> {
    let mut fields = FieldMap::new();
    for raw in sets {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| ZeusError::BadShape(format!("expected FIELD=VALUE, got '{raw}'")))?;
        let parsed: serde_yaml::Value = serde_yaml::from_str(value)
            .unwrap_or_else(|_| serde_yaml::Value::String(value.to_string()));
        fields.insert(serde_yaml::Value::String(key.to_string()), parsed);
    }
    Ok(fields)
}

fn parse_kind(raw: &str) -> Result<Kind> {
    Kind::from_name(raw)
        .ok_or_else(|| ZeusError::NotFound(format!("unknown entity kind '{raw}'")))
}

fn parse_status(raw: &str) -> Result<EntityStatus> {
    match raw {
        "draft" => Ok(EntityStatus::Draft),
        "in_progress" => Ok(EntityStatus::InProgress),
        "completed" => Ok(EntityStatus::Completed),
        other => Err(ZeusError::BadShape(format!("unknown status '{other}'"))),
    }
}

fn report_outcome(outcome: MutationOutcome, verb: &str) {
    match outcome {
        MutationOutcome::Executed(entity) => {
            render::success(&format!("{verb}: {} {}", entity.id(), entity.title()));
        }
        MutationOutcome::Deleted(id) => {
            render::success(&format!("{verb}: {id}"));
        }
        MutationOutcome::Pending(proposal_id) => {
            render::warn(&format!(
                "staged for approval as {proposal_id} (run `zeus approve {proposal_id}`)"
            ));
        }
    }
}

pub fn init(name: Option<&str>) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let paths = zeusapp::init::initialize(&cwd, name)?;
    render::success(&format!("Initialized {}", paths.root().display()));
    Ok(())
}

pub fn status() -> Result<()> {
    let api = open_api()?;
    let report = api.status(&OpCtx::background())?;
    render::status(&report);
    Ok(())
}

pub fn add(kind: &str, title: &str, sets: &[String]) -> Result<()> {
    let api = open_api()?;
    let kind = parse_kind(kind)?;
    let mut fields = parse_sets(sets)?;
    fields.insert(
        serde_yaml::Value::String("title".into()),
        serde_yaml::Value::String(title.to_string()),
    );
    let outcome = api.add(&OpCtx::background(), kind, fields)?;
    report_outcome(outcome, "created");
    Ok(())
}

pub fn list(kind: &str, status: Option<&str>) -> Result<()> {
    let api = open_api()?;
    let kind = parse_kind(kind)?;
    let filter = ListFilter {
        status: status.map(parse_status).transpose()?,
    };
    let entities = api.list(&OpCtx::background(), kind, &filter)?;
    if entities.is_empty() {
        println!("(no {} yet)", render::plural(kind).to_lowercase());
        return Ok(());
    }
    for entity in &entities {
        render::entity_line(entity);
    }
    Ok(())
}

pub fn show(id: &str) -> Result<()> {
    let api = open_api()?;
    let id = EntityId::parse(id)?;
    let entity = api.get(&OpCtx::background(), &id)?;
    render::entity_yaml(&entity)
}

pub fn update(id: &str, sets: &[String]) -> Result<()> {
    let api = open_api()?;
    let id = EntityId::parse(id)?;
    let patch = parse_sets(sets)?;
    let outcome = api.update(&OpCtx::background(), &id, patch)?;
    report_outcome(outcome, "updated");
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    let api = open_api()?;
    let id = EntityId::parse(id)?;
    let outcome = api.delete(&OpCtx::background(), &id)?;
    report_outcome(outcome, "deleted");
    Ok(())
}

pub fn pending() -> Result<()> {
    let api = open_api()?;
    let proposals = api.pending(&OpCtx::background())?;
    if proposals.is_empty() {
        println!("(no pending proposals)");
        return Ok(());
    }
    for proposal in &proposals {
        render::proposal_line(proposal);
    }
    Ok(())
}

pub fn approve(proposal_id: &str) -> Result<()> {
    let api = open_api()?;
    let outcome = api.approve(&OpCtx::background(), proposal_id)?;
    report_outcome(outcome, "approved and executed");
    Ok(())
}

pub fn reject(proposal_id: &str, reason: Option<&str>) -> Result<()> {
    let api = open_api()?;
    let proposal = api.reject(&OpCtx::background(), proposal_id, reason)?;
    render::success(&format!("rejected {}", proposal.id));
    Ok(())
}

pub fn snapshot(command: &SnapshotCommands) -> Result<()> {
    let api = open_api()?;
    let ctx = OpCtx::background();
    match command {
        SnapshotCommands::Create { label } => {
            let info = api.snapshot_create(&ctx, label.as_deref())?;
            render::success(&format!("snapshot {} created", info.name));
        }
        SnapshotCommands::List => {
            let snapshots = api.snapshot_list(&ctx)?;
            if snapshots.is_empty() {
                println!("(no snapshots yet)");
            }
            for snapshot in &snapshots {
                render::snapshot_line(snapshot);
            }
        }
        SnapshotCommands::Restore { timestamp } => {
            let info = api.snapshot_restore(&ctx, timestamp)?;
            render::success(&format!("restored snapshot {}", info.name));
        }
    }
    Ok(())
}

pub fn history(limit: usize) -> Result<()> {
    let api = open_api()?;
    let entries = api.history(&OpCtx::background(), limit)?;
    if entries.is_empty() {
        println!("(no history yet)");
    }
    for entry in &entries {
        render::history_line(entry);
    }
    Ok(())
}

pub fn doctor() -> Result<()> {
    let api = open_api()?;
    let report = api.doctor(&OpCtx::background())?;
    render::doctor_report(&report);
    Ok(())
}

pub fn fix(dry_run: bool) -> Result<()> {
    let api = open_api()?;
    let actions = api.fix(&OpCtx::background(), dry_run)?;
    render::repair_actions(&actions, dry_run);
    Ok(())
}

pub fn graph(
    format: GraphFormat,
    unified: bool,
    focus: Option<&str>,
    depth: Option<usize>,
    hide_completed: bool,
    hide_draft: bool,
) -> Result<()> {
    let api = open_api()?;
    let ctx = OpCtx::background();
    let filter = GraphFilter {
        focus: focus.map(EntityId::parse).transpose()?,
        depth: depth.unwrap_or(graph::DEFAULT_FOCUS_DEPTH),
        hide_completed,
        hide_draft,
        ..GraphFilter::default()
    };

    if unified {
        let payload = api.unified_graph(&ctx, &filter)?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let graph = api.graph(&ctx, &filter)?;
    let out = match format {
        GraphFormat::Text => graph_render::text(&graph),
        GraphFormat::Dot => graph_render::dot(&graph),
        GraphFormat::Mermaid => graph_render::mermaid(&graph),
    };
    print!("{out}");
    Ok(())
}

pub fn uml(command: &UmlCommands) -> Result<()> {
    let api = open_api()?;
    let ctx = OpCtx::background();
    let UmlCommands::Show(target) = command;
    match target {
        UmlTarget::Usecase => {
            let diagram = api.uml_usecase(&ctx)?;
            println!("{}", serde_json::to_string_pretty(&diagram)?);
        }
        UmlTarget::Activity { id } => {
            let id = EntityId::parse(id)?;
            let diagram = api.uml_activity(&ctx, &id)?;
            println!("{}", serde_json::to_string_pretty(&diagram)?);
        }
    }
    Ok(())
}

pub fn dashboard(port: u16, no_open: bool, dev: bool) -> Result<()> {
    let api = open_api()?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(crate::server::serve(
        api,
        crate::server::ServeOptions {
            port,
            open_browser: !no_open,
            dev,
        },
    ))
}
