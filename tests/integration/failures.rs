use anyhow::Result;

use rfdrop_core::wire::Packet;
use rfdrop_services::{
    receive_file, send_file, send_stream, NoopObserver, Receiver, ReceiverState, SendError, Step,
};

use crate::*;

/// Feed every queued frame to `receiver`. Returns the last step.
fn drain(rx: &mut TestLink, receiver: &mut Receiver) -> Result<Option<Step>> {
    let mut last = None;
    while rx.has_pending()? {
        let frame = rx.receive()?;
        last = Some(receiver.handle(&frame, &mut NoopObserver)?);
    }
    Ok(last)
}

#[test]
fn test_stray_frames_before_header_are_ignored() -> Result<()> {
    let source = scratch("stray-src");
    let output = scratch("stray-out");
    let data = content(60);
    std::fs::write(&source, &data)?;
    let (mut tx, mut rx) = link_pair()?;

    rx.driver_mut().inject(Packet::data(0, b"garbage")?.to_wire());
    rx.driver_mut().inject(Packet::fin(9).to_wire());
    rx.driver_mut().inject([0xEE; 32]);

    send_file(&mut tx, &source, &mut NoopObserver)?;
    let report = receive_file(&mut rx, &output, &mut NoopObserver)?;

    assert_eq!(report.fin_count, 3);
    assert_eq!(std::fs::read(&output)?, data);

    std::fs::remove_file(&source).ok();
    std::fs::remove_file(&output).ok();
    Ok(())
}

#[test]
fn test_aborted_send_leaves_receiver_in_session() -> Result<()> {
    let source = scratch("abort-src");
    let output = scratch("abort-out");
    let data = content(100);
    std::fs::write(&source, &data)?;
    let (mut tx, mut rx) = link_pair()?;

    // HEADER and two DATA acknowledged, third DATA lost
    tx.driver_mut().fail_after(3);
    let err = send_file(&mut tx, &source, &mut NoopObserver).unwrap_err();
    assert!(matches!(err, SendError::DataRejected { index: 2 }));

    let mut receiver = Receiver::new(&output);
    assert!(matches!(drain(&mut rx, &mut receiver)?, Some(Step::Continue)));
    assert_eq!(receiver.state(), ReceiverState::InSession);
    assert_eq!(receiver.fragments_received(), 2);

    std::fs::remove_file(&source).ok();
    std::fs::remove_file(&output).ok();
    Ok(())
}

#[test]
fn test_retry_after_abort_restarts_the_session() -> Result<()> {
    let source = scratch("retry-src");
    let output = scratch("retry-out");
    let data = content(100);
    std::fs::write(&source, &data)?;
    let (mut tx, mut rx) = link_pair()?;

    tx.driver_mut().fail_after(3);
    assert!(send_file(&mut tx, &source, &mut NoopObserver).is_err());

    let mut receiver = Receiver::new(&output);
    drain(&mut rx, &mut receiver)?;
    assert_eq!(receiver.fragments_received(), 2);

    tx.driver_mut().heal();
    send_file(&mut tx, &source, &mut NoopObserver)?;
    match drain(&mut rx, &mut receiver)? {
        Some(Step::Complete(report)) => {
            assert!(report.is_consistent());
            assert_eq!(report.bytes, 100);
        }
        other => panic!("expected completed transfer, got {other:?}"),
    }
    assert_eq!(receiver.state(), ReceiverState::Idle);
    assert_eq!(std::fs::read(&output)?, data);

    std::fs::remove_file(&source).ok();
    std::fs::remove_file(&output).ok();
    Ok(())
}

#[test]
fn test_truncated_source_never_completes() -> Result<()> {
    let output = scratch("trunc-out");
    let (mut tx, mut rx) = link_pair()?;

    let short = content(40);
    let err = send_stream(&mut tx, &short[..], 100, &mut NoopObserver).unwrap_err();
    assert!(matches!(err, SendError::SourceTruncated { sent: 40, declared: 100 }));

    let mut receiver = Receiver::new(&output);
    assert!(matches!(drain(&mut rx, &mut receiver)?, Some(Step::Continue)));
    assert_eq!(receiver.state(), ReceiverState::InSession);

    std::fs::remove_file(&output).ok();
    Ok(())
}

#[test]
fn test_out_of_order_fragments_still_reassemble() -> Result<()> {
    let output = scratch("reorder-out");
    let data = content(70);
    let (_tx, mut rx) = link_pair()?;

    rx.driver_mut().inject(Packet::header(70).to_wire());
    for index in [2u32, 0, 1] {
        let start = index as usize * 27;
        let end = (start + 27).min(data.len());
        rx.driver_mut().inject(Packet::data(index, &data[start..end])?.to_wire());
    }
    rx.driver_mut().inject(Packet::fin(3).to_wire());

    let report = receive_file(&mut rx, &output, &mut NoopObserver)?;
    assert!(report.is_consistent());
    assert_eq!(std::fs::read(&output)?, data);

    std::fs::remove_file(&output).ok();
    Ok(())
}

#[test]
fn test_missing_fragment_is_reported() -> Result<()> {
    let output = scratch("gap-out");
    let data = content(81);
    let (_tx, mut rx) = link_pair()?;

    rx.driver_mut().inject(Packet::header(81).to_wire());
    rx.driver_mut().inject(Packet::data(0, &data[..27])?.to_wire());
    rx.driver_mut().inject(Packet::data(2, &data[54..])?.to_wire());
    rx.driver_mut().inject(Packet::fin(3).to_wire());

    let report = receive_file(&mut rx, &output, &mut NoopObserver)?;
    assert_eq!(report.missing, 1);
    assert!(!report.is_consistent());

    let written = std::fs::read(&output)?;
    assert_eq!(written.len(), 81);
    assert_eq!(&written[..27], &data[..27]);
    assert_eq!(&written[54..], &data[54..]);

    std::fs::remove_file(&output).ok();
    Ok(())
}
