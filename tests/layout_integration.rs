//! Buffer layout and configuration tests
//!
//! Run with:
//! ```bash
//! cargo test -p soundfeat --test layout_integration
//! ```

mod helpers;

use helpers::*;
use soundfeat::core::Error as CoreError;
use soundfeat::prelude::*;
use soundfeat::{BuffersAllocator, Error};

fn spectral_builder() -> FeatureExtractorBuilder {
    FeatureExtractor::builder()
        .sampling_rate(TEST_SAMPLING_RATE)
        .buffer_size(TEST_BUFFER_SIZE)
        .feature(
            "energy",
            [
                ("Int16ToFloat", params! {}),
                ("Window", params! { "length" => 256, "step" => 256 }),
                ("RDFT", params! {}),
                ("Energy", params! {}),
            ],
        )
        .feature("intensity", [("Int16ToFloat", params! {}), ("Intensity", params! {})])
}

/// Test that the solved layout is valid and shares memory.
#[test]
fn test_layout_is_valid_and_shared() {
    init_tracing();
    let extractor = spectral_builder().build().unwrap();
    let pipeline = extractor.pipeline();
    let layout = extractor.layout();

    // Root plus five stages
    assert_eq!(BuffersAllocator::nodes_count(pipeline.tree()), 6);
    assert!(BuffersAllocator::validate(pipeline.tree()));
    assert_eq!(layout.strategy, "first-fit");

    // Retained feature buffers are live together at the end of the run
    let energy_bytes = 4 * 129 * 4;
    let intensity_bytes = 4;
    assert!(layout.footprint >= energy_bytes + intensity_bytes);
    assert!(layout.footprint <= layout.unshared);
    // The converted signal is dead by the time the spectrum is computed
    assert!(layout.saved() > 0);

    let stages = extractor.stages();
    assert!(stages.iter().all(|s| s.address.is_some()));
    assert_eq!(
        layout.unshared,
        stages.iter().map(|s| s.size).sum::<usize>()
    );
}

/// Test that an exceeded memory limit fails the build.
#[test]
fn test_memory_limit_exhausted() {
    let config = PipelineConfig {
        memory_limit: Some(1024),
        ..Default::default()
    };
    let result = spectral_builder().config(config).build();
    assert!(matches!(
        result,
        Err(Error::Core(CoreError::AllocationExhausted { limit: 1024, .. }))
    ));
}

/// Test that a generous memory limit is accepted.
#[test]
fn test_memory_limit_met() {
    let unlimited = spectral_builder().build().unwrap();
    let footprint = unlimited.layout().footprint;

    let config = PipelineConfig {
        memory_limit: Some(footprint),
        ..Default::default()
    };
    let limited = spectral_builder().config(config).build().unwrap();
    assert_eq!(limited.layout().footprint, footprint);
}

/// Test writing the buffer tree as Graphviz DOT.
#[test]
fn test_dump_graph() {
    let dir = tempfile::tempdir().unwrap();

    let path = dir.path().join("buffers.dot");
    let config = PipelineConfig {
        dump_graph: Some(path.clone()),
        ..Default::default()
    };
    let extractor = spectral_builder().config(config).build().unwrap();
    let dot = std::fs::read_to_string(&path).unwrap();
    assert!(dot.starts_with("digraph buffers {"));
    assert!(dot.contains("RDFT"));
    assert!(dot.trim_end().ends_with('}'));

    let again = dir.path().join("again.dot");
    extractor.dump_graph(&again).unwrap();
    assert_eq!(std::fs::read_to_string(&again).unwrap(), dot);
}

/// Test that dumping into a missing directory reports an I/O error.
#[test]
fn test_dump_graph_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = spectral_builder().build().unwrap();
    let result = extractor.dump_graph(dir.path().join("missing").join("buffers.dot"));
    assert!(matches!(result, Err(Error::Core(CoreError::Io(_)))));
}

/// Test loading the configuration from JSON.
#[test]
fn test_config_from_json() {
    let config: PipelineConfig =
        serde_json::from_str(r#"{ "threads": 2, "validate_outputs": true }"#).unwrap();
    assert_eq!(config.threads, Some(2));
    assert!(config.validate_outputs);
    assert_eq!(config.memory_limit, None);
    assert_eq!(config.workers(), 2);

    let extractor = spectral_builder().config(config).build().unwrap();
    assert_eq!(extractor.pipeline().workers(), 2);

    let features = extractor
        .extract(&[generate_noise(TEST_BUFFER_SIZE, 3)])
        .unwrap();
    assert_eq!(features.len(), 2);
}

/// Test that an invalid configuration is rejected at build time.
#[test]
fn test_invalid_config() {
    let config: PipelineConfig = serde_json::from_str(r#"{ "threads": 0 }"#).unwrap();
    let result = spectral_builder().config(config).build();
    assert!(matches!(result, Err(Error::Core(CoreError::InvalidConfig(_)))));
}
