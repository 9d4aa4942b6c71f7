//! Readers for `docker ps` / `docker images` output in `--format '{{json .}}'` mode.
//!
//! One JSON object per line. Only the columns used here are required; unknown columns are ignored.
use ngl_model::{DiscoveredImage, ImageRef, Port, RunningWorkload};
use serde::Deserialize;

use crate::error::{ExecError, ExecResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    image: String,
    #[serde(default)]
    ports: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageLine {
    repository: String,
    tag: String,
    #[serde(rename = "ID")]
    id: String,
}

fn json_lines<'a, T: Deserialize<'a>>(out: &'a str) -> ExecResult<Vec<T>> {
    out.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            serde_json::from_str(l).map_err(|e| ExecError::Parse {
                line: i + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Parse `docker ps -a --no-trunc --format '{{json .}}'`.
pub fn containers(out: &str) -> ExecResult<Vec<RunningWorkload>> {
    json_lines::<PsLine>(out)?
        .into_iter()
        .enumerate()
        .map(|(i, line)| -> ExecResult<RunningWorkload> {
            let (host_port, exposed_port) =
                ports(&line.ports).map_err(|reason| ExecError::Parse {
                    line: i + 1,
                    reason,
                })?;
            let (name, tag) = ImageRef::split(&line.image);
            Ok(RunningWorkload {
                id: line.id,
                image_name: name.to_string(),
                image_tag: tag.map(str::to_string),
                host_port,
                exposed_port,
                status: line.status,
            })
        })
        .collect()
}

/// Parse `docker images --format '{{json .}}'`.
pub fn images(out: &str) -> ExecResult<Vec<DiscoveredImage>> {
    Ok(json_lines::<ImageLine>(out)?
        .into_iter()
        .map(|line| DiscoveredImage::new(line.repository, line.tag, line.id))
        .collect())
}

/// Read the `Ports` column: `(first published host port, first container port)`.
///
/// Entries are comma separated, each `[ip:]hostPort->port/proto` or `port/proto`;
/// ranges (`8000-8001`) count by their first port.
pub fn ports(column: &str) -> Result<(Option<Port>, Option<Port>), String> {
    let mut host = None;
    let mut exposed = None;
    for entry in column.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (published, inner) = match entry.split_once("->") {
            Some((left, right)) => (Some(left), right),
            None => (None, entry),
        };
        let inner = inner.split('/').next().unwrap_or_default();
        let inner = port_number(inner).ok_or_else(|| format!("bad port entry '{entry}'"))?;
        exposed.get_or_insert(inner);

        if let Some(left) = published {
            let host_part = left.rsplit_once(':').map_or(left, |(_, p)| p);
            let port = port_number(host_part).ok_or_else(|| format!("bad port entry '{entry}'"))?;
            host.get_or_insert(port);
        }
    }
    Ok((host, exposed))
}

fn port_number(s: &str) -> Option<Port> {
    let first = s.split('-').next()?;
    first.trim().parse().ok()
}
