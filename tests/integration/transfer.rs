use anyhow::Result;

use rfdrop_core::wire::FrameType;
use rfdrop_services::{receive_file, send_file, NoopObserver, TransferObserver};

use crate::*;

/// Records what the receiving side reported.
#[derive(Default)]
struct Progress {
    declared: Vec<u32>,
    fragments: u32,
}

impl TransferObserver for Progress {
    fn session_started(&mut self, declared_size: u32) {
        self.declared.push(declared_size);
    }

    fn fragment(&mut self, count: u32) {
        self.fragments = count;
    }
}

fn round_trip(size: usize) -> Result<()> {
    let source = scratch(&format!("src-{size}"));
    let output = scratch(&format!("out-{size}"));
    let data = content(size);
    std::fs::write(&source, &data)?;

    let (mut tx, mut rx) = link_pair()?;
    let sent = send_file(&mut tx, &source, &mut NoopObserver)?;

    let mut progress = Progress::default();
    let report = receive_file(&mut rx, &output, &mut progress)?;

    let expected_fragments = size.div_ceil(27) as u32;
    assert_eq!(sent.fragments, expected_fragments, "size {size}");
    assert_eq!(report.bytes as usize, size);
    assert_eq!(report.fragments_received, expected_fragments);
    assert_eq!(report.fin_count, expected_fragments);
    assert!(report.is_consistent());
    assert_eq!(report.digest, sent.digest);
    assert_eq!(std::fs::read(&output)?, data, "size {size}: output differs");

    assert_eq!(progress.declared, vec![size as u32]);
    assert_eq!(progress.fragments, expected_fragments);

    let frames = frames(&mut tx);
    assert_eq!(frames.len(), expected_fragments as usize + 2);
    assert_eq!(frames[0], (FrameType::Header, size as u32));
    for (i, frame) in frames[1..frames.len() - 1].iter().enumerate() {
        assert_eq!(*frame, (FrameType::Data, i as u32));
    }
    assert_eq!(frames[frames.len() - 1], (FrameType::Fin, expected_fragments));

    std::fs::remove_file(&source).ok();
    std::fs::remove_file(&output).ok();
    Ok(())
}

#[test]
fn test_single_byte_file() -> Result<()> {
    round_trip(1)
}

#[test]
fn test_sizes_around_fragment_boundary() -> Result<()> {
    for size in [26, 27, 28, 54, 55, 81] {
        round_trip(size)?;
    }
    Ok(())
}

#[test]
fn test_kilobyte_file() -> Result<()> {
    round_trip(1000)
}

#[test]
fn test_larger_file_with_sequence_past_one_byte() -> Result<()> {
    // 300 fragments, so sequence numbers need more than one byte
    round_trip(27 * 300)
}

#[test]
fn test_second_transfer_replaces_first() -> Result<()> {
    let source = scratch("replace-src");
    let output = scratch("replace-out");
    let (mut tx, mut rx) = link_pair()?;

    std::fs::write(&source, content(200))?;
    send_file(&mut tx, &source, &mut NoopObserver)?;
    receive_file(&mut rx, &output, &mut NoopObserver)?;

    let shorter = content(40);
    std::fs::write(&source, &shorter)?;
    send_file(&mut tx, &source, &mut NoopObserver)?;
    let report = receive_file(&mut rx, &output, &mut NoopObserver)?;

    assert_eq!(report.bytes, 40);
    assert_eq!(std::fs::read(&output)?, shorter);

    std::fs::remove_file(&source).ok();
    std::fs::remove_file(&output).ok();
    Ok(())
}

#[test]
fn test_same_file_twice_gives_same_output() -> Result<()> {
    let source = scratch("twice-src");
    let output = scratch("twice-out");
    let data = content(123);
    std::fs::write(&source, &data)?;
    let (mut tx, mut rx) = link_pair()?;

    for _ in 0..2 {
        send_file(&mut tx, &source, &mut NoopObserver)?;
        receive_file(&mut rx, &output, &mut NoopObserver)?;
        assert_eq!(std::fs::read(&output)?, data);
    }

    std::fs::remove_file(&source).ok();
    std::fs::remove_file(&output).ok();
    Ok(())
}
