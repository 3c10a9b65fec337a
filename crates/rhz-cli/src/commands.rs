use anyhow::{bail, Context};
use colored::Colorize;
use rhz_cell::{Address, CellError, Entry, EntryView, LinkId, LinkTag, RevisionKind, TagPredicate};
use rhz_links::Path;
use rhz_store::StoreError;
use serde_json::{json, Value};
use tracing::debug;

use crate::cli::*;
use crate::workspace::Workspace;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let out = Output(cli.format);
    match cli.command {
        Command::Init(args) => cmd_init(&cli.state, args, out),
        Command::Create(args) => cmd_create(&open(&cli.state)?, args, out),
        Command::Update(args) => cmd_update(&open(&cli.state)?, args, out),
        Command::Delete(args) => cmd_delete(&open(&cli.state)?, args, out),
        Command::Get(args) => cmd_get(&open(&cli.state)?, args, out),
        Command::History(args) => cmd_history(&open(&cli.state)?, args, out),
        Command::Link(args) => cmd_link(&open(&cli.state)?, args, out),
        Command::Unlink(args) => cmd_unlink(&open(&cli.state)?, args, out),
        Command::List(args) => cmd_list(&open(&cli.state)?, args, out),
        Command::Verify => cmd_verify(&open(&cli.state)?, out),
    }
}

fn open(state: &std::path::Path) -> anyhow::Result<Workspace> {
    debug!(state = %state.display(), "opening state directory");
    Workspace::open(state)
}

#[derive(Clone, Copy)]
struct Output(OutputFormat);

impl Output {
    fn json(self) -> bool {
        self.0 == OutputFormat::Json
    }

    fn emit(self, value: &Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn cmd_init(state: &std::path::Path, args: InitArgs, out: Output) -> anyhow::Result<()> {
    let key = Workspace::init(state, args.force)?;
    let agent = rhz_crypto::AgentSigner::agent(&key);
    if out.json() {
        return out.emit(&json!({ "state": state.display().to_string(), "agent": agent.to_hex() }));
    }
    println!("{} Initialized Rhizome state in {}", "✓".green().bold(), state.display().to_string().bold());
    println!("  Agent: {}", agent.to_string().cyan());
    Ok(())
}

fn cmd_create(ws: &Workspace, args: CreateArgs, out: Output) -> anyhow::Result<()> {
    let entry_type = ws.manifest.entry_type(&args.entry_type)?;
    let view = ws.cell.create(entry_type, parse_entry(&args.json)?)?;
    ws.save()?;
    if out.json() {
        return out.emit(&view_json(&view));
    }
    println!("{} Created {}", "✓".green().bold(), view.entry_type.to_string().yellow());
    println!("  Original: {}", view.original.to_string().cyan());
    Ok(())
}

fn cmd_update(ws: &Workspace, args: UpdateArgs, out: Output) -> anyhow::Result<()> {
    let original = parse_address(&args.original)?;
    let entry = parse_entry(&args.json)?;
    let view = match args.previous {
        Some(previous) => {
            let previous = parse_address(&previous)?;
            let tip = live_tip(ws, &original)?;
            ws.cell.update(original, previous, tip.entry_type, entry)?
        }
        // Re-read the tip on every attempt so a lost race is retried
        // against whatever won it.
        None => ws.manifest.cell.retry.run(|_| {
            let tip = live_tip(ws, &original)?;
            ws.cell.update(original, tip.action, tip.entry_type, entry.clone())
        })?,
    };
    ws.save()?;
    if out.json() {
        return out.emit(&view_json(&view));
    }
    println!("{} Updated {} to revision {}", "✓".green().bold(), original.short_hex().cyan(), view.revision);
    println!("  Action: {}", view.action.to_string().dimmed());
    Ok(())
}

fn cmd_delete(ws: &Workspace, args: DeleteArgs, out: Output) -> anyhow::Result<()> {
    let original = parse_address(&args.original)?;
    let action = ws.cell.delete(original)?;
    ws.save()?;
    if out.json() {
        return out.emit(&json!({ "original": original.to_hex(), "action": action.to_hex() }));
    }
    println!("{} Deleted {}", "✓".green().bold(), original.short_hex().cyan());
    Ok(())
}

fn cmd_get(ws: &Workspace, args: GetArgs, out: Output) -> anyhow::Result<()> {
    let original = resolve_original(ws, &args.address)?;
    let view = ws.cell.get(&original)?;
    if out.json() {
        return out.emit(&view.as_ref().map_or(Value::Null, view_json));
    }
    match view {
        Some(view) => print_view(&view),
        None => println!("{} {} has been deleted", "✗".red(), original.short_hex().cyan()),
    }
    Ok(())
}

fn cmd_history(ws: &Workspace, args: GetArgs, out: Output) -> anyhow::Result<()> {
    let original = resolve_original(ws, &args.address)?;
    let history = ws.cell.get_history(&original)?;
    if out.json() {
        return out.emit(&Value::Array(history.iter().map(view_json).collect()));
    }
    for view in &history {
        print_view(view);
    }
    Ok(())
}

fn cmd_link(ws: &Workspace, args: LinkArgs, out: Output) -> anyhow::Result<()> {
    let base = parse_base(&args.base)?;
    let target = parse_address(&args.target)?;
    let link_type = ws.manifest.link_type(&args.link_type)?;
    let id = ws.cell.link(base, target, link_type, LinkTag::from(args.tag.as_str()))?;
    ws.save()?;
    if out.json() {
        return out.emit(&json!({ "link": id.to_string(), "base": base.to_hex(), "target": target.to_hex() }));
    }
    println!("{} Linked {} -> {}", "✓".green().bold(), args.base.bold(), target.short_hex().cyan());
    println!("  Link: {}", id.to_string().dimmed());
    Ok(())
}

fn cmd_unlink(ws: &Workspace, args: UnlinkArgs, out: Output) -> anyhow::Result<()> {
    let id = LinkId(parse_address(&args.link)?);
    ws.cell.unlink(id)?;
    ws.save()?;
    if out.json() {
        return out.emit(&json!({ "unlinked": id.to_string() }));
    }
    println!("{} Unlinked {}", "✓".green().bold(), id.address().short_hex().cyan());
    Ok(())
}

fn cmd_list(ws: &Workspace, args: ListArgs, out: Output) -> anyhow::Result<()> {
    let path = Path::parse(&args.path)?;
    let link_type = ws.manifest.link_type(&args.link_type)?;
    let filter = args
        .tag_prefix
        .map(|prefix| TagPredicate::Prefix(prefix.into_bytes()));
    let views = ws.cell.list(&path, link_type, filter.as_ref())?;
    if out.json() {
        return out.emit(&Value::Array(views.iter().map(view_json).collect()));
    }
    if views.is_empty() {
        println!("Nothing linked from {}.", path.to_string().bold());
    }
    for view in &views {
        println!(
            "{}  {}  {}",
            view.original.short_hex().cyan(),
            view.entry_type.to_string().yellow(),
            content_text(&view.latest)
        );
    }
    Ok(())
}

fn cmd_verify(ws: &Workspace, out: Output) -> anyhow::Result<()> {
    let reports = ws.cell.dht().audit()?;
    let failed = reports.iter().filter(|r| !r.is_valid()).count();
    if out.json() {
        let reports: Vec<Value> = reports
            .iter()
            .map(|r| {
                json!({
                    "author": r.author.to_hex(),
                    "action_count": r.action_count,
                    "violations": r.violations.iter().map(|v| json!({
                        "seq": v.seq,
                        "kind": format!("{:?}", v.kind),
                        "description": v.description,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        out.emit(&Value::Array(reports))?;
    } else {
        for report in &reports {
            let mark = if report.is_valid() { "✓".green() } else { "✗".red() };
            println!("{} {} ({} actions)", mark, report.author, report.action_count);
            for violation in &report.violations {
                println!("    seq {}: {}", violation.seq, violation.description.red());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} chains failed verification", reports.len());
    }
    Ok(())
}

// ---- Parsing and rendering ----

fn parse_address(s: &str) -> anyhow::Result<Address> {
    Address::from_hex(s).with_context(|| format!("{s:?} is not an address"))
}

fn parse_entry(json: &str) -> anyhow::Result<Entry> {
    let value: Value = serde_json::from_str(json).context("entry content must be JSON")?;
    Ok(Entry::from_json(&value)?)
}

/// A base is either a 64-character hex address or a dotted path.
fn parse_base(s: &str) -> anyhow::Result<Address> {
    if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return parse_address(s);
    }
    Ok(Path::parse(s)?.address())
}

fn resolve_original(ws: &Workspace, s: &str) -> anyhow::Result<Address> {
    let action = parse_address(s)?;
    ws.cell
        .find_original(&action)?
        .with_context(|| format!("no entry has an action at {}", action.short_hex()))
}

fn live_tip(ws: &Workspace, original: &Address) -> Result<EntryView, CellError> {
    match ws.cell.get(original)? {
        Some(view) => Ok(view),
        None if ws.cell.get_history(original)?.is_empty() => {
            Err(StoreError::LineageNotFound(*original).into())
        }
        None => Err(StoreError::LineageDeleted(*original).into()),
    }
}

fn content_json(entry: &Entry) -> Value {
    entry
        .decode::<Value>()
        .unwrap_or_else(|_| Value::String(hex::encode(entry.as_bytes())))
}

fn content_text(entry: &Entry) -> String {
    match entry.decode::<Value>() {
        Ok(value) => value.to_string(),
        Err(_) => format!("<{} bytes>", entry.len()),
    }
}

fn view_json(view: &EntryView) -> Value {
    json!({
        "original": view.original.to_hex(),
        "action": view.action.to_hex(),
        "kind": view.kind,
        "entry_type": view.entry_type.to_string(),
        "content": content_json(&view.latest),
        "entry_address": view.latest_address.to_hex(),
        "author": view.author.to_hex(),
        "original_author": view.original_author.to_hex(),
        "timestamp": view.timestamp,
        "revision": view.revision,
        "deleted": view.deleted,
    })
}

fn print_view(view: &EntryView) {
    let kind = match view.kind {
        RevisionKind::Create => "create".green(),
        RevisionKind::Update => "update".yellow(),
        RevisionKind::Delete => "delete".red(),
    };
    println!(
        "{} {}  {}  by {}",
        format!("#{}", view.revision).bold(),
        kind,
        view.action.short_hex().dimmed(),
        view.author
    );
    println!("  Type: {}", view.entry_type.to_string().yellow());
    if !view.deleted {
        println!("  Content: {}", content_text(&view.latest));
    }
}
