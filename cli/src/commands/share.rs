use anyhow::{Context, Result, bail};
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Modify, Style, object::Columns},
};

use morsel_core::import::ImportOptions;
use morsel_core::merge::{MatchStatus, ResolutionEntry, ResolveAction};
use morsel_core::service::MorselService;

use super::helpers::{kind_label, truncate};
use super::resolve_item;

pub(crate) fn cmd_share_export(
    svc: &MorselService,
    recipe: &str,
    compact: bool,
    link: Option<&str>,
    json: bool,
) -> Result<()> {
    let item = resolve_item(svc, recipe)?;

    if let Some(base_url) = link {
        let url = svc.share_link(base_url, &item.id)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&json!({ "link": url }))?);
        } else {
            println!("{url}");
        }
        return Ok(());
    }

    let text = if compact {
        svc.export_compact(&item.id)?
    } else {
        svc.export_plain(&item.id)?
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&svc.export_bundle(&item.id)?)?);
    } else {
        println!("{text}");
    }
    Ok(())
}

/// Bundle text from an argument, a file, or stdin, in that order.
fn read_source(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read bundle from stdin")?;
    Ok(buf)
}

fn status_label(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::MatchExact => "exact match",
        MatchStatus::MatchName => "name conflict",
        MatchStatus::New => "new",
    }
}

fn action_label(entry: &ResolutionEntry) -> String {
    if let Some(link) = &entry.manual_link {
        return format!("link -> {link}");
    }
    match entry.action {
        ResolveAction::UseLocal => "use local".to_string(),
        ResolveAction::CreateNew => "create new".to_string(),
        ResolveAction::Overwrite => "overwrite".to_string(),
    }
}

fn print_analysis(svc: &MorselService, analysis: &[ResolutionEntry]) {
    #[derive(Tabled)]
    struct AnalysisRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: &'static str,
        #[tabled(rename = "Status")]
        status: &'static str,
        #[tabled(rename = "Action")]
        action: String,
        #[tabled(rename = "Local")]
        local: String,
    }

    let rows: Vec<AnalysisRow> = analysis
        .iter()
        .map(|e| AnalysisRow {
            name: truncate(&e.item.name, 35),
            kind: kind_label(e.item.kind),
            status: status_label(e.status),
            action: action_label(e),
            local: e
                .local_id
                .as_deref()
                .and_then(|id| svc.get_item(id))
                .map_or("-".into(), |i| truncate(&i.name, 25)),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(tabled::settings::Alignment::left()))
        .to_string();
    println!("{table}");
}

fn entry_by_name<'a>(
    analysis: &'a mut [ResolutionEntry],
    name: &str,
) -> Result<&'a mut ResolutionEntry> {
    analysis
        .iter_mut()
        .find(|e| e.item.name.eq_ignore_ascii_case(name))
        .with_context(|| format!("No incoming item named '{name}'"))
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_share_import(
    svc: &mut MorselService,
    text: Option<String>,
    file: Option<&Path>,
    dry_run: bool,
    use_local: &[String],
    create_new: &[String],
    overwrite: &[String],
    links: &[String],
    json: bool,
) -> Result<()> {
    let source = read_source(text, file)?;
    let (bundle, mut analysis) = svc.analyze_bundle(&source)?;

    for name in use_local {
        entry_by_name(&mut analysis, name)?.set_action(ResolveAction::UseLocal)?;
    }
    for name in create_new {
        entry_by_name(&mut analysis, name)?.set_action(ResolveAction::CreateNew)?;
    }
    for name in overwrite {
        entry_by_name(&mut analysis, name)?.set_action(ResolveAction::Overwrite)?;
    }
    for spec in links {
        let Some((incoming, local_name)) = spec.split_once('=') else {
            bail!("Invalid link '{spec}'. Use 'incoming-name=local-name'");
        };
        let local = resolve_item(svc, local_name.trim())?;
        entry_by_name(&mut analysis, incoming.trim())?.link_to(&local.id);
    }

    if dry_run {
        if json {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        } else {
            print_analysis(svc, &analysis);
        }
        return Ok(());
    }

    let report = svc.execute_import(&bundle, &analysis, &ImportOptions::default())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let names = |ids: &[String]| -> Vec<String> {
            ids.iter()
                .map(|id| {
                    svc.get_item(id)
                        .map_or_else(|| id.clone(), |i| i.name.clone())
                })
                .collect()
        };
        if !report.created.is_empty() {
            let list = names(&report.created).join(", ");
            println!("Created: {list}");
        }
        if !report.overwritten.is_empty() {
            let list = names(&report.overwritten).join(", ");
            println!("Overwritten: {list}");
        }
        if !report.reused.is_empty() {
            let list = names(&report.reused).join(", ");
            println!("Reused: {list}");
        }
        for (id, reason) in &report.failed {
            eprintln!("Failed: {id}: {reason}");
        }
    }

    if !report.is_clean() {
        process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_source_prefers_inline_text() {
        let text = read_source(Some("inline".to_string()), None).unwrap();
        assert_eq!(text, "inline");
    }

    #[test]
    fn test_read_source_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "bundle text").unwrap();
        let text = read_source(None, Some(file.path())).unwrap();
        assert_eq!(text, "bundle text");
    }

    #[test]
    fn test_read_source_missing_file() {
        let err = read_source(None, Some(Path::new("/nonexistent/bundle.txt"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
