//! Builder for configuring and constructing a `FeatureExtractor`.

use crate::{FeatureExtractor, Result};
use soundfeat_core::{
    ArrayFormat, Error as CoreError, PipelineBuilder, PipelineConfig, TransformParams,
    TransformRegistry,
};
use std::sync::Arc;

/// One declared feature: a name and the transform chain computing it.
type FeatureChain = (String, Vec<(String, TransformParams)>);

/// Features are declared as chains of registry transforms applied to the raw
/// 16-bit signal. Chains that start with the same transforms and parameters
/// share those stages.
///
/// # Example
///
/// ```ignore
/// use soundfeat::prelude::*;
///
/// let extractor = FeatureExtractor::builder()
///     .sampling_rate(16000)
///     .buffer_size(4096)
///     .feature("energy", [
///         ("Int16ToFloat", params! {}),
///         ("Window", params! { "length" => 512 }),
///         ("RDFT", params! {}),
///         ("Energy", params! {}),
///     ])
///     .build()?;
///
/// let features = extractor.extract(&[signal])?;
/// ```
pub struct FeatureExtractorBuilder {
    sampling_rate: u32,
    buffer_size: usize,
    buffers_count: usize,
    features: Vec<FeatureChain>,
    config: PipelineConfig,
    registry: Option<TransformRegistry>,
}

impl Default for FeatureExtractorBuilder {
    fn default() -> Self {
        Self {
            sampling_rate: 16000,
            buffer_size: 0,
            buffers_count: 1,
            features: Vec::new(),
            config: PipelineConfig::default(),
            registry: None,
        }
    }
}

impl FeatureExtractorBuilder {
    /// Default: 16000
    pub fn sampling_rate(mut self, rate: u32) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Samples in each input signal. Required.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Signals passed to every `extract` call.
    ///
    /// Default: 1
    pub fn buffers_count(mut self, count: usize) -> Self {
        self.buffers_count = count;
        self
    }

    /// Declare the feature `name`, computed by `chain` from the raw signal.
    pub fn feature<S, I>(mut self, name: impl Into<String>, chain: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, TransformParams)>,
    {
        let chain = chain
            .into_iter()
            .map(|(transform, params)| (transform.into(), params))
            .collect();
        self.features.push((name.into(), chain));
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Worker threads of the pipeline. Default: rayon's thread count
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads);
        self
    }

    /// Use `registry` instead of the built-in transforms.
    pub fn registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<FeatureExtractor> {
        if self.buffer_size == 0 {
            return Err(CoreError::InvalidConfig("buffer size must be set".to_string()).into());
        }
        if self.buffers_count == 0 {
            return Err(
                CoreError::InvalidConfig("at least one buffer is required".to_string()).into(),
            );
        }
        if self.features.is_empty() {
            return Err(CoreError::InvalidConfig("no features declared".to_string()).into());
        }

        let registry = self.registry.unwrap_or_else(soundfeat_transforms::registry);
        let source = ArrayFormat::<i16>::with_rate(self.buffer_size, self.sampling_rate)?;

        let mut builder = PipelineBuilder::new(&registry, source.clone(), self.buffers_count);
        for (name, chain) in &self.features {
            builder.add_feature(name, chain)?;
        }
        let pipeline = builder.build(&self.config)?;

        tracing::info!(
            features = self.features.len(),
            stages = pipeline.stages().len(),
            footprint = pipeline.layout().footprint,
            "Feature extractor ready"
        );
        Ok(FeatureExtractor::from_parts(Arc::new(source), pipeline))
    }
}
