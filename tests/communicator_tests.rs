use mesh_checkpoint::algs::communicator::{CommTag, Communicator, LocalComm, NoComm, Wait};

#[test]
fn local_round_trip() {
    let tag = CommTag(0x1000);
    let world = LocalComm::world(2);

    let msg = b"hello";
    let _s = world[0].isend(1, tag.base(), msg);

    let mut buf = [0u8; 5];
    let h = world[1].irecv(0, tag.base(), &mut buf);
    let got = h.wait().unwrap();
    assert_eq!(&got, msg);
}

#[test]
fn local_fifo_order() {
    let tag = CommTag(0x1001);
    let world = LocalComm::world(2);

    for i in 0..10u8 {
        let _ = world[0].isend(1, tag.base(), &[i]);
    }
    let mut out = Vec::new();
    for _ in 0..10 {
        let mut b = [0u8; 1];
        let h = world[1].irecv(0, tag.base(), &mut b);
        out.push(h.wait().unwrap()[0]);
    }
    assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
}

#[test]
fn truncation_is_ok() {
    let tag = CommTag(0x1002);
    let world = LocalComm::world(2);

    let _ = world[0].isend(1, tag.base(), &[1, 2, 3, 4, 5, 6]);
    let mut b = [0u8; 4];
    let h = world[1].irecv(0, tag.base(), &mut b);
    let got = h.wait().unwrap();
    assert_eq!(got, vec![1, 2, 3, 4]);
}

#[test]
fn tags_and_worlds_do_not_mix() {
    let a = LocalComm::world(2);
    let b = LocalComm::world(2);
    let tag = CommTag(0x1003);

    let _ = a[0].isend(1, tag.offset(1), b"second");
    let _ = b[0].isend(1, tag.base(), b"other world");
    let _ = a[0].isend(1, tag.base(), b"first");

    let mut buf = [0u8; 16];
    assert_eq!(a[1].irecv(0, tag.base(), &mut buf).wait().unwrap(), b"first");
    assert_eq!(a[1].irecv(0, tag.offset(1), &mut buf).wait().unwrap(), b"second");
    assert_eq!(b[1].irecv(0, tag.base(), &mut buf).wait().unwrap(), b"other world");
}

#[test]
fn serial_comm_is_a_single_silent_rank() {
    let comm = NoComm;
    assert_eq!((comm.rank(), comm.size()), (0, 1));
    let mut buf = [0u8; 1];
    assert!(comm.irecv(0, 7, &mut buf).wait().is_none());
}
