//! # Decoder Validation Tests
//!
//! Structural integrity checks over real files produced by the writer:
//! truncation at every byte offset must fail cleanly, generation skew must
//! be detected, and TOC entries must be matched by type rather than by
//! position.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use tempfile::TempDir;

use mmvkit::format::{G1_OFFSET, G2_OFFSET, HEADER_LEN, TOC_LEN};
use mmvkit::{
    dump, Client, CountUnit, InstanceDomain, InstanceMetric, Metric, MetricSemantics, MetricType,
    MmvError, Value,
};

fn mmv_tmp() -> &'static Path {
    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = TempDir::new().expect("failed to create temp directory");
        std::env::set_var("PCP_TMP_DIR", dir.path());
        dir
    })
    .path()
}

/// A file exercising every section type: indoms, instances, metrics,
/// values and strings.
fn full_file(name: &str) -> Vec<u8> {
    let mut client = Client::new(name).unwrap();

    let indom = InstanceDomain::new("cpu", &["user", "sys"], "cpu time split", "").unwrap();
    let cpu = InstanceMetric::new(
        &indom,
        "cpu.time",
        &[("user", Value::Uint64(10)), ("sys", Value::Uint64(20))],
        MetricType::Uint64,
        MetricSemantics::Counter,
        CountUnit::One,
        "time per mode",
        "",
    )
    .unwrap();
    let errors = Metric::new(
        "app.errors",
        0_u32,
        MetricType::Uint32,
        MetricSemantics::Counter,
        CountUnit::One,
        "error count",
        "",
    )
    .unwrap();

    client.register_instance_metric(&cpu).unwrap();
    client.register_metric(&errors).unwrap();
    client.start().unwrap();

    let bytes = fs::read(client.path()).unwrap();
    client.stop().unwrap();
    bytes
}

#[test]
fn every_truncation_fails_without_panicking() {
    mmv_tmp();
    let bytes = full_file("truncate.me");

    dump(&bytes).expect("the untruncated file decodes");

    for len in 0..bytes.len() {
        let err = dump(&bytes[..len]).expect_err("every prefix is structurally incomplete");
        assert!(
            matches!(err, MmvError::Truncated { .. }),
            "prefix of {len} bytes gave {err:?}"
        );
    }
}

#[test]
fn generation_skew_is_rejected() {
    mmv_tmp();
    let mut bytes = full_file("genskew");

    // writer mid-rewrite: g1 moved on, g2 not yet
    let g1 = u64::from_le_bytes(bytes[G1_OFFSET..G1_OFFSET + 8].try_into().unwrap());
    bytes[G2_OFFSET..G2_OFFSET + 8].copy_from_slice(&(g1 + 1).to_le_bytes());

    let err = dump(&bytes).unwrap_err();
    assert!(matches!(err, MmvError::GenerationMismatch { g1: a, g2: b } if b == a + 1));
}

#[test]
fn synthesized_generation_mismatch_is_rejected() {
    // A minimal header with g1 = 1, g2 = 2 and nothing else.
    let mut bytes = vec![0u8; HEADER_LEN];
    bytes[..4].copy_from_slice(b"MMV\0");
    bytes[4..8].copy_from_slice(&1u32.to_le_bytes());
    bytes[G1_OFFSET..G1_OFFSET + 8].copy_from_slice(&1u64.to_le_bytes());
    bytes[G2_OFFSET..G2_OFFSET + 8].copy_from_slice(&2u64.to_le_bytes());

    let err = dump(&bytes).unwrap_err();
    assert!(matches!(err, MmvError::GenerationMismatch { g1: 1, g2: 2 }));
}

#[test]
fn toc_entries_match_by_type_not_position() {
    mmv_tmp();
    let bytes = full_file("toc.order");
    let baseline = dump(&bytes).unwrap();

    // swap the first two TOC entries in place; the sections do not move
    let mut swapped = bytes.clone();
    let (a, b) = (HEADER_LEN, HEADER_LEN + TOC_LEN);
    let first: Vec<u8> = swapped[a..a + TOC_LEN].to_vec();
    let second: Vec<u8> = swapped[b..b + TOC_LEN].to_vec();
    swapped[a..a + TOC_LEN].copy_from_slice(&second);
    swapped[b..b + TOC_LEN].copy_from_slice(&first);

    let reordered = dump(&swapped).unwrap();
    assert_eq!(reordered.indoms.len(), baseline.indoms.len());
    assert_eq!(reordered.instances.len(), baseline.instances.len());
    assert_eq!(reordered.metrics.len(), baseline.metrics.len());
    assert_eq!(reordered.values.len(), baseline.values.len());
    assert_eq!(reordered.strings.len(), baseline.strings.len());
}

#[test]
fn files_without_indoms_decode_with_empty_sections() {
    mmv_tmp();
    let mut client = Client::new("no.indoms").unwrap();
    let m = Metric::new(
        "solo",
        0_i32,
        MetricType::Int32,
        MetricSemantics::Instant,
        CountUnit::One,
        "",
        "",
    )
    .unwrap();
    client.register_metric(&m).unwrap();
    client.start().unwrap();

    let d = dump(&fs::read(client.path()).unwrap()).unwrap();
    assert!(d.indoms.is_empty());
    assert!(d.instances.is_empty());
    assert!(d.strings.is_empty());
    assert_eq!(d.header.toc_count(), 2);
    assert_eq!(d.metrics.len(), 1);
    assert_eq!(d.values.len(), 1);

    client.stop().unwrap();
}
