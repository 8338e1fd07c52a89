//! Render node to primary node mapping
//!
//! Pure path arithmetic: nothing here touches the filesystem, so a derived
//! path may well not exist.

use std::path::{Path, PathBuf};

use crate::config::PrimaryNodePolicy;
use crate::error::{Error, Result};

/// Sibling filename used by [`PrimaryNodePolicy::Card0`]
pub const PRIMARY_NODE_NAME: &str = "card0";

/// Render node minors start here; `renderD<128 + k>` belongs to `card<k>`.
const RENDER_MINOR_BASE: u32 = 128;

/// Derive the primary (master) node next to `render_node`.
pub fn primary_node_path(render_node: &Path, policy: PrimaryNodePolicy) -> Result<PathBuf> {
    if render_node.as_os_str().is_empty() {
        return Err(unresolvable(render_node, "empty path"));
    }
    let Some(parent) = render_node.parent() else {
        return Err(unresolvable(render_node, "no parent directory"));
    };

    match policy {
        PrimaryNodePolicy::Card0 => Ok(parent.join(PRIMARY_NODE_NAME)),
        PrimaryNodePolicy::Numbered => {
            let name = render_node
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| unresolvable(render_node, "no file name"))?;

            if let Some(minor) = parse_suffix(name, "renderD") {
                let index = minor
                    .checked_sub(RENDER_MINOR_BASE)
                    .ok_or_else(|| unresolvable(render_node, "render minor below 128"))?;
                Ok(parent.join(format!("card{index}")))
            } else if parse_suffix(name, "card").is_some() {
                // Older compositors announce the primary node directly.
                Ok(render_node.to_path_buf())
            } else {
                Err(unresolvable(render_node, "not a renderD<N> or card<N> node"))
            }
        }
    }
}

fn parse_suffix(name: &str, prefix: &str) -> Option<u32> {
    let digits = name.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn unresolvable(path: &Path, reason: &'static str) -> Error {
    Error::PathUnresolvable {
        path: path.to_path_buf(),
        reason,
    }
}
