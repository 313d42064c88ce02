//! Root index file: the single authoritative description of a cycle.
//!
//! The coordinator writes `<prefix><name>_<cycle>.root`. On load it reads
//! the file and broadcasts it (as JSON) to every other rank, which then
//! know the protocol and file pattern before touching their domain file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::algs::broadcast::{broadcast_recv, broadcast_send};
use crate::algs::communicator::{CommTag, Communicator};
use crate::blueprint::generate_index;
use crate::document::Node;
use crate::io::{FileLayout, Protocol};
use crate::mesh_error::CheckpointError;

/// Tag family used by the root index broadcast.
const ROOT_INDEX_TAG: CommTag = CommTag::new(0x0f00);

/// Decoded root index.
#[derive(Clone, Debug)]
pub struct RootIndex {
    pub protocol: Protocol,
    pub protocol_version: String,
    pub number_of_files: usize,
    pub number_of_trees: usize,
    pub file_pattern: String,
    pub tree_pattern: String,
    /// Structural summary of one domain (see [`generate_index`]).
    pub mesh_index: Node,
}

impl RootIndex {
    /// Index for `num_domains` domain files of `cycle`, summarized from
    /// `domain`, one rank's mesh document.
    pub fn build(
        layout: &FileLayout,
        cycle: u64,
        protocol: Protocol,
        num_domains: usize,
        domain: &Node,
    ) -> Result<Self, CheckpointError> {
        Ok(Self {
            protocol,
            protocol_version: env!("CARGO_PKG_VERSION").to_string(),
            number_of_files: num_domains,
            number_of_trees: num_domains,
            file_pattern: layout.file_pattern(cycle, protocol),
            tree_pattern: String::new(),
            mesh_index: generate_index(domain, num_domains)?,
        })
    }

    pub fn to_node(&self) -> Node {
        let mut n = Node::object();
        n.set("blueprint_index/mesh", self.mesh_index.clone());
        n.set("protocol/name", self.protocol.name());
        n.set("protocol/version", self.protocol_version.as_str());
        n.set("number_of_files", self.number_of_files as i64);
        n.set("number_of_trees", self.number_of_trees as i64);
        n.set("file_pattern", self.file_pattern.as_str());
        n.set("tree_pattern", self.tree_pattern.as_str());
        n
    }

    /// # Errors
    /// `ProtocolMismatch` for a protocol name this build cannot interpret;
    /// `Schema` for missing entries.
    pub fn from_node(n: &Node) -> Result<Self, CheckpointError> {
        let protocol: Protocol = n.text("protocol/name")?.parse()?;
        let count = |path: &str| -> Result<usize, CheckpointError> {
            let v = n.scalar_i64(path)?;
            usize::try_from(v).map_err(|_| CheckpointError::Schema(format!("{path} is negative: {v}")))
        };
        Ok(Self {
            protocol,
            protocol_version: n.text("protocol/version")?.to_string(),
            number_of_files: count("number_of_files")?,
            number_of_trees: count("number_of_trees")?,
            file_pattern: n.text("file_pattern")?.to_string(),
            tree_pattern: n
                .get("tree_pattern")
                .and_then(Node::as_text)
                .unwrap_or_default()
                .to_string(),
            mesh_index: n.fetch("blueprint_index/mesh")?.to_owned_tree()?,
        })
    }
}

/// Write the root file of `cycle`: JSON unless the domains are binary.
pub fn save_root(
    layout: &FileLayout,
    cycle: u64,
    index: &RootIndex,
) -> Result<PathBuf, CheckpointError> {
    let encoding = index.protocol.root_protocol();
    let bytes = encoding.encode(&index.to_node())?;
    let path = layout.root_file(cycle);
    fs::write(&path, bytes)
        .map_err(|e| CheckpointError::Io(format!("error writing {}: {e}", path.display())))?;
    log::info!(
        "[root] wrote {} ({encoding}, {} domains)",
        path.display(),
        index.number_of_files
    );
    Ok(path)
}

/// Read a root file, detecting its encoding.
pub fn read_root(path: &Path) -> Result<RootIndex, CheckpointError> {
    let bytes = fs::read(path)
        .map_err(|e| CheckpointError::Io(format!("error reading {}: {e}", path.display())))?;
    let encoding = Protocol::detect(&bytes);
    let index = RootIndex::from_node(&encoding.decode(&bytes)?)?;
    log::info!("[root] read {} ({encoding})", path.display());
    Ok(index)
}

/// Root index of `cycle` on every rank.
///
/// The coordinator reads the file and broadcasts it; the others receive
/// it. If the coordinator fails, it broadcasts the failure sentinel so the
/// others return a `Comm` error instead of waiting forever.
pub fn load_root<C: Communicator>(
    layout: &FileLayout,
    cycle: u64,
    comm: &C,
    coordinator: usize,
) -> Result<RootIndex, CheckpointError> {
    if coordinator >= comm.size() {
        return Err(CheckpointError::Comm(format!(
            "coordinator {coordinator} outside a world of {} ranks",
            comm.size()
        )));
    }
    if comm.size() == 1 {
        return read_root(&layout.root_file(cycle));
    }

    if comm.rank() == coordinator {
        let loaded = read_root(&layout.root_file(cycle))
            .and_then(|index| Ok((Protocol::Json.encode(&index.to_node())?, index)));
        match loaded {
            Ok((payload, index)) => {
                broadcast_send(comm, coordinator, ROOT_INDEX_TAG, Some(&payload))?;
                Ok(index)
            }
            Err(e) => {
                log::warn!("[root] coordinator failed to read the root index: {e}");
                broadcast_send(comm, coordinator, ROOT_INDEX_TAG, None)?;
                Err(e)
            }
        }
    } else {
        let payload = broadcast_recv(comm, coordinator, ROOT_INDEX_TAG)?;
        RootIndex::from_node(&Protocol::Json.decode(&payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};
    use std::thread;

    fn sample_domain() -> Node {
        let mut doc = Node::object();
        doc.set("coordsets/coords/type", "explicit");
        doc.set("coordsets/coords/values/x", vec![0.0, 1.0]);
        doc.set("topologies/main/type", "unstructured");
        doc.set("topologies/main/coordset", "coords");
        doc
    }

    fn layout_in(dir: &Path) -> FileLayout {
        FileLayout::new(format!("{}/", dir.display()), "run")
    }

    #[test]
    fn root_encoding_follows_the_domain_encoding() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_in(tmp.path());
        for protocol in [Protocol::Json, Protocol::Binary] {
            let index = RootIndex::build(&layout, 3, protocol, 4, &sample_domain()).unwrap();
            let path = save_root(&layout, 3, &index).unwrap();
            let bytes = fs::read(&path).unwrap();
            assert_eq!(Protocol::detect(&bytes), protocol.root_protocol());

            let back = read_root(&path).unwrap();
            assert_eq!(back.protocol, protocol);
            assert_eq!(back.number_of_files, 4);
            assert_eq!(back.file_pattern, layout.file_pattern(3, protocol));
        }
    }

    #[test]
    fn unknown_protocol_name_is_a_mismatch() {
        let layout = FileLayout::new("", "x");
        let mut n = RootIndex::build(&layout, 0, Protocol::Json, 1, &sample_domain())
            .unwrap()
            .to_node();
        n.set("protocol/name", "hdf5");
        assert!(matches!(
            RootIndex::from_node(&n),
            Err(CheckpointError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn serial_load_reads_directly() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_in(tmp.path());
        let index = RootIndex::build(&layout, 1, Protocol::Json, 1, &sample_domain()).unwrap();
        save_root(&layout, 1, &index).unwrap();
        let back = load_root(&layout, 1, &NoComm, 0).unwrap();
        assert_eq!(back.file_pattern, index.file_pattern);
        assert!(load_root(&layout, 1, &NoComm, 1).is_err());
    }

    #[test]
    fn every_rank_gets_the_coordinator_index() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_in(tmp.path());
        let index = RootIndex::build(&layout, 5, Protocol::Binary, 3, &sample_domain()).unwrap();
        save_root(&layout, 5, &index).unwrap();

        let handles: Vec<_> = LocalComm::world(3)
            .into_iter()
            .map(|comm| {
                let layout = layout.clone();
                thread::spawn(move || load_root(&layout, 5, &comm, 1).unwrap())
            })
            .collect();
        for h in handles {
            let got = h.join().unwrap();
            assert_eq!(got.protocol, Protocol::Binary);
            assert_eq!(got.number_of_files, 3);
        }
    }

    #[test]
    fn coordinator_failure_reaches_every_rank() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_in(tmp.path());
        let handles: Vec<_> = LocalComm::world(3)
            .into_iter()
            .map(|comm| {
                let layout = layout.clone();
                thread::spawn(move || load_root(&layout, 9, &comm, 0).unwrap_err())
            })
            .collect();
        let errors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(matches!(errors[0], CheckpointError::Io(_)));
        assert!(errors[1..].iter().all(|e| matches!(e, CheckpointError::Comm(_))));
    }
}
