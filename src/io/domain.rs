//! Per-process domain files: exactly one file per save call.

use std::fs;
use std::path::{Path, PathBuf};

use crate::document::Node;
use crate::io::{FileLayout, Protocol};
use crate::mesh_error::CheckpointError;

/// Write `doc` as domain `domain_id` of `cycle`.
///
/// The cycle directory is created first; failing to create it aborts the
/// save before anything is written.
pub fn save_domain(
    layout: &FileLayout,
    cycle: u64,
    domain_id: usize,
    doc: &Node,
    protocol: Protocol,
) -> Result<PathBuf, CheckpointError> {
    let dir = layout.directory(cycle);
    fs::create_dir_all(&dir).map_err(|e| {
        CheckpointError::Io(format!("error creating directory {}: {e}", dir.display()))
    })?;

    // Encode first; the file is only created once the bytes exist.
    let bytes = protocol.encode(doc)?;
    let path = layout.domain_file(cycle, domain_id, protocol);
    fs::write(&path, bytes)
        .map_err(|e| CheckpointError::Io(format!("error writing {}: {e}", path.display())))?;
    log::info!("[domain] wrote {} ({protocol})", path.display());
    Ok(path)
}

/// Read domain `domain_id` of `cycle`, named by the same convention.
pub fn load_domain(
    layout: &FileLayout,
    cycle: u64,
    domain_id: usize,
    protocol: Protocol,
) -> Result<Node, CheckpointError> {
    load_domain_file(&layout.domain_file(cycle, domain_id, protocol), protocol)
}

/// Read and decode one domain file.
pub fn load_domain_file(path: &Path, protocol: Protocol) -> Result<Node, CheckpointError> {
    let bytes = fs::read(path)
        .map_err(|e| CheckpointError::Io(format!("error reading {}: {e}", path.display())))?;
    let doc = protocol.decode(&bytes)?;
    log::info!("[domain] read {} ({protocol})", path.display());
    Ok(doc)
}
