//! Two-phase byte broadcast from a root rank.
//!
//! Phase one sends an 8-byte little-endian length, phase two the payload,
//! so receivers size their buffer without knowing the content in advance.
//! A length of zero tells receivers the root failed to produce a payload;
//! they return an error instead of blocking forever.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireLen, cast_slice};
use crate::mesh_error::CheckpointError;

/// Send `payload` from `root` to every other rank. `None` broadcasts the
/// failure sentinel.
///
/// Must only be called on `root`.
pub fn broadcast_send<C: Communicator>(
    comm: &C,
    root: usize,
    tag: CommTag,
    payload: Option<&[u8]>,
) -> Result<(), CheckpointError> {
    if comm.rank() != root {
        return Err(CheckpointError::Comm(format!(
            "rank {} attempted to broadcast as root {root}",
            comm.rank()
        )));
    }
    let len_tag = tag.base();
    let data_tag = tag.offset(1);
    let payload = payload.unwrap_or_default();
    let header = WireLen::new(payload.len());
    let mut pending_sends = Vec::with_capacity(2 * comm.size());
    for peer in (0..comm.size()).filter(|&p| p != root) {
        pending_sends.push(comm.isend(peer, len_tag, cast_slice(std::slice::from_ref(&header))));
        if !payload.is_empty() {
            pending_sends.push(comm.isend(peer, data_tag, payload));
        }
    }
    for send in pending_sends {
        // sends carry no payload back
        send.wait();
    }
    log::debug!(
        "[broadcast] root {root} sent {} bytes to {} peers",
        payload.len(),
        comm.size().saturating_sub(1)
    );
    Ok(())
}

/// Receive the payload broadcast by `root`.
pub fn broadcast_recv<C: Communicator>(
    comm: &C,
    root: usize,
    tag: CommTag,
) -> Result<Vec<u8>, CheckpointError> {
    let len_tag = tag.base();
    let data_tag = tag.offset(1);

    let mut len_buf = [0u8; WireLen::SIZE];
    let raw = comm
        .irecv(root, len_tag, &mut len_buf)
        .wait()
        .ok_or_else(|| CheckpointError::Comm("failed to receive size header".into()))?;
    let len = WireLen::from_bytes(&raw)
        .map_err(CheckpointError::Comm)?
        .get();
    if len == 0 {
        return Err(CheckpointError::Comm(format!(
            "root {root} reported a failure instead of a payload"
        )));
    }
    let len = usize::try_from(len)
        .map_err(|_| CheckpointError::Comm(format!("payload length {len} overflows")))?;

    let mut data_buf = vec![0u8; len];
    let payload = comm
        .irecv(root, data_tag, &mut data_buf)
        .wait()
        .ok_or_else(|| CheckpointError::Comm("failed to receive payload".into()))?;
    if payload.len() != len {
        return Err(CheckpointError::Comm(format!(
            "payload length mismatch: expected {len}, got {}",
            payload.len()
        )));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalComm;
    use std::thread;

    const TAG: CommTag = CommTag::new(0x0a00);

    #[test]
    fn every_rank_receives_the_root_payload() {
        let handles: Vec<_> = LocalComm::world(4)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    if comm.rank() == 0 {
                        broadcast_send(&comm, 0, TAG, Some(b"protocol=json")).unwrap();
                        b"protocol=json".to_vec()
                    } else {
                        broadcast_recv(&comm, 0, TAG).unwrap()
                    }
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), b"protocol=json");
        }
    }

    #[test]
    fn failure_sentinel_surfaces_as_comm_error() {
        let world = LocalComm::world(2);
        broadcast_send(&world[0], 0, TAG, None).unwrap();
        let err = broadcast_recv(&world[1], 0, TAG).unwrap_err();
        assert!(matches!(err, CheckpointError::Comm(_)));
    }

    #[test]
    fn only_root_may_send() {
        let world = LocalComm::world(2);
        assert!(broadcast_send(&world[1], 0, TAG, Some(b"x")).is_err());
    }
}
