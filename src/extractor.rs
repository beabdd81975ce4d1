//! FeatureExtractor that runs a solved pipeline over 16-bit signals

use crate::{FeatureExtractorBuilder, Result};
use soundfeat_core::{
    ArrayFormat, BufferFormat, Buffers, BuffersAllocator, Features, MemoryLayout, Pipeline,
    StageInfo,
};
use std::path::Path;
use std::sync::Arc;

/// Extracts a fixed set of named features from batches of 16-bit signals.
///
/// Built once with [`FeatureExtractor::builder`], then reused for any number
/// of [`extract`](Self::extract) calls. Every call takes exactly the
/// configured number of signals, each exactly `buffer_size` samples long.
///
/// # Example
///
/// ```ignore
/// let extractor = FeatureExtractor::builder()
///     .buffer_size(4096)
///     .feature("intensity", [("Int16ToFloat", params! {}), ("Intensity", params! {})])
///     .build()?;
///
/// let features = extractor.extract(&[signal])?;
/// let intensity = features.get::<SingleFormat<f32>>("intensity").unwrap();
/// ```
pub struct FeatureExtractor {
    source: Arc<ArrayFormat<i16>>,
    pipeline: Pipeline,
}

impl FeatureExtractor {
    pub fn builder() -> FeatureExtractorBuilder {
        FeatureExtractorBuilder::default()
    }

    pub(crate) fn from_parts(source: Arc<ArrayFormat<i16>>, pipeline: Pipeline) -> Self {
        Self { source, pipeline }
    }

    /// Run every declared feature chain over `signals`.
    pub fn extract<S: AsRef<[i16]>>(&self, signals: &[S]) -> Result<Features> {
        let elements = signals.iter().map(|s| s.as_ref().to_vec()).collect();
        let buffers = Buffers::from_elements(Arc::clone(&self.source), elements);
        self.source.validate(&buffers)?;
        Ok(self.pipeline.run(&buffers)?)
    }

    pub fn sampling_rate(&self) -> u32 {
        self.source.sampling_rate().unwrap_or_default()
    }

    pub fn buffer_size(&self) -> usize {
        self.source.size()
    }

    pub fn buffers_count(&self) -> usize {
        self.pipeline.source_count()
    }

    /// Feature names, sorted.
    pub fn feature_names(&self) -> Vec<&str> {
        self.pipeline.feature_names()
    }

    /// Stages in execution order, with their solved buffer placement.
    pub fn stages(&self) -> Vec<StageInfo> {
        self.pipeline.stages()
    }

    pub fn layout(&self) -> &MemoryLayout {
        self.pipeline.layout()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Write the buffer lifetime tree as a Graphviz graph.
    pub fn dump_graph(&self, path: impl AsRef<Path>) -> Result<()> {
        BuffersAllocator::dump(self.pipeline.tree(), path)?;
        Ok(())
    }
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("source", &self.source.describe())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
