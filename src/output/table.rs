//! Listing tables
//!
//! `ls` merges the runtime listing with saved-only store entries and renders
//! one row per identity plus indented configuration detail. `config` renders
//! the store alone, without a status column. Rows sort by name, so the
//! printed index matches what the identity resolver accepts.

use std::collections::BTreeMap;

use crate::identity::{TMP_SUFFIX, VM_PREFIX};
use crate::lifecycle::SOCKET_LABEL;
use crate::output::time::{format_created, normalize_created};
use crate::runtime::ContainerInfo;
use crate::store::paths::{HOME_TOKEN, PROJECT_ROOT_TOKEN};
use crate::store::StoredRecord;
use crate::volume::RUNTIME_SOCKET;

const NAME_MIN_WIDTH: usize = 28;
const MAX_FIELD_WIDTH: usize = 80;
const LS_TITLE: &str = "FAST DEV CONTAINERS";
const CONFIG_TITLE: &str = "SAVED CONFIGURATIONS";

struct Row {
    name: String,
    created: String,
    status: String,
    detail: Vec<String>,
}

/// The `ls` table, or `None` when there is nothing to list.
pub fn ls_table(
    containers: &[ContainerInfo],
    records: &BTreeMap<String, StoredRecord>,
    default_runtime: &str,
) -> Option<String> {
    let mut merged: BTreeMap<String, Option<&ContainerInfo>> = BTreeMap::new();
    for info in containers {
        merged.insert(info.name.clone(), Some(info));
    }
    for name in records.keys() {
        merged.entry(name.clone()).or_insert(None);
    }
    if merged.is_empty() {
        return None;
    }

    let rows: Vec<Row> = merged
        .iter()
        .map(|(name, container)| {
            let record = records.get(name);
            let status = match container {
                Some(info) if info.is_running() => "Running \u{25cf}".to_string(),
                Some(_) => "Stopped \u{25cb}".to_string(),
                None => "Saved \u{25cc}".to_string(),
            };
            let created = container
                .map(|info| info.created_at.trim())
                .filter(|raw| !raw.is_empty())
                .map(normalize_created)
                .or_else(|| {
                    record
                        .and_then(|r| r.created_at.as_ref())
                        .map(format_created)
                })
                .unwrap_or_default();
            Row {
                name: name.clone(),
                created,
                status,
                detail: detail_lines(name, record, *container, default_runtime),
            }
        })
        .collect();
    Some(render(LS_TITLE, &rows, true))
}

/// The `config` table over store contents, or `None` when the store is empty.
pub fn config_table(
    records: &BTreeMap<String, StoredRecord>,
    default_runtime: &str,
) -> Option<String> {
    if records.is_empty() {
        return None;
    }
    let rows: Vec<Row> = records
        .iter()
        .map(|(name, record)| Row {
            name: name.clone(),
            created: record
                .created_at
                .as_ref()
                .map(format_created)
                .unwrap_or_default(),
            status: String::new(),
            detail: detail_lines(name, Some(record), None, default_runtime),
        })
        .collect();
    Some(render(CONFIG_TITLE, &rows, false))
}

fn render(title: &str, rows: &[Row], with_status: bool) -> String {
    let idx_width = rows.len().to_string().len().max(1);
    let name_width = rows
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max(NAME_MIN_WIDTH)
        .max(title.len());
    let created_width = rows
        .iter()
        .map(|r| r.created.len())
        .max()
        .unwrap_or(0)
        .max("CREATED".len());
    let status_width = rows
        .iter()
        .map(|r| r.status.chars().count())
        .max()
        .unwrap_or(0)
        .max("STATUS".len());

    let mut out = String::new();
    let mut header = format!(
        "{:<idx$}  {:<name$}  {:>created$}",
        "#",
        title,
        "CREATED",
        idx = idx_width,
        name = name_width,
        created = created_width,
    );
    if with_status {
        header.push_str(&format!("  {:>width$}", "STATUS", width = status_width));
    }
    let table_width = header.chars().count();
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"\u{2500}".repeat(table_width));
    out.push('\n');

    for (idx, row) in rows.iter().enumerate() {
        let mut line = format!(
            "{:<idx_w$}  {:<name$}  {:>created$}",
            idx + 1,
            row.name,
            row.created,
            idx_w = idx_width,
            name = name_width,
            created = created_width,
        );
        if with_status {
            let pad = status_width.saturating_sub(row.status.chars().count());
            line.push_str("  ");
            line.push_str(&" ".repeat(pad));
            line.push_str(&row.status);
        }
        out.push_str(line.trim_end());
        out.push('\n');
        for detail in &row.detail {
            out.push_str("    ");
            out.push_str(detail);
            out.push('\n');
        }
    }
    out
}

/// Indented detail lines for one row, in a fixed order: runtime line, image,
/// project, ports, startup command. Absent fields produce no line.
fn detail_lines(
    name: &str,
    record: Option<&StoredRecord>,
    container: Option<&ContainerInfo>,
    default_runtime: &str,
) -> Vec<String> {
    let mut lines = Vec::new();

    let runtime_cmd = record
        .and_then(|r| r.docker_cmd.as_deref())
        .unwrap_or(default_runtime);
    let socket = if socket_state(record, container) {
        "\u{2713} socket"
    } else {
        "\u{2717} socket"
    };
    lines.push(format!(
        "{} {}{}",
        runtime_cmd,
        socket,
        mode_indicators(name, record.map(|r| r.persist).unwrap_or(false))
    ));

    lines.push(format!(
        "image: {}",
        image_display(record.and_then(|r| r.image.as_deref()))
    ));

    if let Some(project) = record.and_then(|r| r.project_path.as_ref()) {
        if let Some(path) = project {
            lines.push(format!("project: {}", truncate(&home_display(path))));
        }
    }

    if let Some(record) = record {
        if !record.ports.is_empty() {
            lines.push(format!("ports: {}", record.ports.join(" ")));
        }
        if let Some(cmd) = &record.startup_cmd {
            lines.push(format!("run: {}", truncate(cmd)));
        }
    }
    lines
}

/// Display socket state: record value, then create-time label, then whether
/// the socket path shows up in the container's mounts.
fn socket_state(record: Option<&StoredRecord>, container: Option<&ContainerInfo>) -> bool {
    if let Some(explicit) = record.and_then(|r| r.socket) {
        return explicit;
    }
    if let Some(info) = container {
        if let Some(label) = info.labels.get(SOCKET_LABEL) {
            match label.trim() {
                "true" | "1" | "yes" => return true,
                "false" | "0" | "no" => return false,
                _ => {}
            }
        }
        return info.mounts.iter().any(|m| m.contains(RUNTIME_SOCKET));
    }
    false
}

fn mode_indicators(name: &str, persist: bool) -> String {
    let mut out = String::new();
    if name.starts_with(VM_PREFIX) {
        out.push_str(" [vm]");
    }
    if name.ends_with(TMP_SUFFIX) {
        out.push_str(" [tmp]");
    }
    if persist {
        out.push_str(" [persist]");
    }
    out
}

/// Stored images are portable strings; show project-relative recipes as
/// `./path`, home-relative ones under `~`, and the unset default as
/// `default`.
fn image_display(image: Option<&str>) -> String {
    match image {
        None => "default".to_string(),
        Some(img) => {
            if let Some(rest) = strip_token(img, PROJECT_ROOT_TOKEN) {
                format!("./{}", rest)
            } else if let Some(rest) = strip_token(img, HOME_TOKEN) {
                format!("~/{}", rest)
            } else {
                img.to_string()
            }
        }
    }
}

fn home_display(path: &str) -> String {
    match strip_token(path, HOME_TOKEN) {
        Some(rest) => format!("~/{}", rest),
        None => path.to_string(),
    }
}

fn strip_token<'a>(value: &'a str, token: &str) -> Option<&'a str> {
    value
        .strip_prefix(token)
        .and_then(|rest| rest.strip_prefix('/'))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_FIELD_WIDTH {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_FIELD_WIDTH - 3).collect();
    format!("{}...", cut)
}
