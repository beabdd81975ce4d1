//! Pipeline assembly and execution.
//!
//! A [`PipelineBuilder`] turns transform names into a tree of stages rooted at
//! the source signal, checks formats along every edge, and on
//! [`build`](PipelineBuilder::build) derives the lifetime tree, solves the
//! buffer layout and initializes the transforms. The resulting [`Pipeline`]
//! runs the stages in breadth-first order on its own thread pool.

mod builder;
mod executor;
mod features;

pub use builder::PipelineBuilder;
pub use features::Features;

use crate::allocator::{LifetimeTree, MemoryLayout};
use crate::buffers::AnyBuffers;
use crate::format::BufferFormat;
use crate::{Error, Result};
use executor::Step;
use std::fmt;

/// Handle to a stage of a [`PipelineBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub(crate) usize);

impl StageId {
    /// The caller-provided source buffers.
    pub const SOURCE: StageId = StageId(0);

    pub(crate) fn index(self) -> Option<usize> {
        self.0.checked_sub(1)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::SOURCE {
            f.write_str("source")
        } else {
            write!(f, "stage {}", self.0)
        }
    }
}

/// Summary of one scheduled stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    pub name: String,
    pub output: String,
    pub count: usize,
    pub size: usize,
    pub address: Option<usize>,
    pub features: Vec<String>,
}

/// A runnable pipeline.
pub struct Pipeline {
    source: Box<dyn BufferFormat>,
    source_count: usize,
    steps: Vec<Step>,
    tree: LifetimeTree,
    layout: MemoryLayout,
    pool: rayon::ThreadPool,
    workers: usize,
    validate_outputs: bool,
}

impl Pipeline {
    pub fn source_format(&self) -> &dyn BufferFormat {
        self.source.as_ref()
    }

    pub fn source_count(&self) -> usize {
        self.source_count
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Lifetime tree with the solved addresses.
    pub fn tree(&self) -> &LifetimeTree {
        &self.tree
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Stages in execution order.
    pub fn stages(&self) -> Vec<StageInfo> {
        self.steps
            .iter()
            .map(|step| {
                let node = self.tree.get(step.node);
                StageInfo {
                    name: step.name.clone(),
                    output: step.transform.output_format().describe(),
                    count: step.transform.output_count(),
                    size: node.map_or(0, |n| n.size),
                    address: node.and_then(|n| n.address),
                    features: step.features.clone(),
                }
            })
            .collect()
    }

    /// Feature names, sorted.
    pub fn feature_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .steps
            .iter()
            .flat_map(|step| step.features.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names
    }

    /// Run every stage over `source`.
    ///
    /// `source` must match the format, element size and count the pipeline
    /// was built for, and hold valid values.
    pub fn run(&self, source: &dyn AnyBuffers) -> Result<Features> {
        if self.source.id() != source.format().id() {
            return Err(Error::mismatch(self.source.id(), source.format().id()));
        }
        if source.format().unaligned_size_in_bytes() != self.source.unaligned_size_in_bytes() {
            return Err(Error::InvalidFormat {
                format: source.format().describe(),
                reason: format!("pipeline was built for {}", self.source.describe()),
            });
        }
        if source.count() != self.source_count {
            return Err(Error::BufferCountMismatch {
                expected: self.source_count,
                found: source.count(),
            });
        }
        self.source.validate(source)?;

        let span = tracing::debug_span!("pipeline_run", stages = self.steps.len());
        let _enter = span.enter();
        self.pool
            .install(|| executor::execute(&self.steps, source, self.validate_outputs))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.describe())
            .field("source_count", &self.source_count)
            .field(
                "stages",
                &self.steps.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .field("layout", &self.layout)
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::Buffers;
    use crate::config::PipelineConfig;
    use crate::formats::{ArrayFormat, SingleFormat};
    use crate::parameter::{parse_value, ParameterError, ParameterSpec, TransformParams};
    use crate::params;
    use crate::registry::TransformRegistry;
    use crate::transform::{propagate_uniform, BatchKernel, ElementKernel, Kernel};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[derive(Default)]
    struct ToFloat;

    impl Kernel for ToFloat {
        type Input = ArrayFormat<i16>;
        type Output = ArrayFormat<f32>;
        const NAME: &'static str = "ToFloat";
        const DESCRIPTION: &'static str = "i16 to f32";
        const PARALLEL: bool = true;

        fn on_input_format_changed(
            &mut self,
            input: &Self::Input,
            output: &mut Self::Output,
            buffers_count: usize,
        ) -> Result<usize> {
            output.set_size(input.size());
            Ok(buffers_count)
        }
    }

    impl ElementKernel for ToFloat {
        fn process_element(&self, input: &Vec<i16>, output: &mut Vec<f32>) {
            for (o, i) in output.iter_mut().zip(input) {
                *o = f32::from(*i);
            }
        }
    }

    #[derive(Default)]
    struct Offset {
        value: f32,
    }

    const OFFSET_PARAMETERS: &[ParameterSpec] = &[ParameterSpec::new("value", "Added to every sample", "0")];

    impl Kernel for Offset {
        type Input = ArrayFormat<f32>;
        type Output = ArrayFormat<f32>;
        const NAME: &'static str = "Offset";
        const DESCRIPTION: &'static str = "Adds a constant";

        fn parameters() -> &'static [ParameterSpec] {
            OFFSET_PARAMETERS
        }

        fn set_parameter(
            &mut self,
            name: &str,
            value: &str,
        ) -> std::result::Result<(), ParameterError> {
            match name {
                "value" => self.value = parse_value(value)?,
                _ => return Err(ParameterError::Unknown),
            }
            Ok(())
        }

        fn on_input_format_changed(
            &mut self,
            input: &Self::Input,
            output: &mut Self::Output,
            buffers_count: usize,
        ) -> Result<usize> {
            propagate_uniform(input, output);
            Ok(buffers_count)
        }
    }

    impl ElementKernel for Offset {
        fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
            for (o, i) in output.iter_mut().zip(input) {
                *o = i + self.value;
            }
        }
    }

    #[derive(Default)]
    struct Total;

    impl Kernel for Total {
        type Input = ArrayFormat<f32>;
        type Output = SingleFormat<f32>;
        const NAME: &'static str = "Total";
        const DESCRIPTION: &'static str = "Sum of every buffer";

        fn on_input_format_changed(
            &mut self,
            _input: &Self::Input,
            _output: &mut Self::Output,
            _buffers_count: usize,
        ) -> Result<usize> {
            Ok(1)
        }
    }

    impl BatchKernel for Total {
        fn process_batch(
            &self,
            inputs: &Buffers<Self::Input>,
            outputs: &mut Buffers<Self::Output>,
        ) {
            outputs[0] = inputs.iter().flatten().sum();
        }
    }

    fn registry() -> TransformRegistry {
        let mut registry = TransformRegistry::new();
        registry.register_element::<ToFloat>();
        registry.register_element::<Offset>();
        registry.register_batch::<Total>();
        registry
    }

    fn source() -> Buffers<ArrayFormat<i16>> {
        let format = Arc::new(ArrayFormat::<i16>::with_rate(4, 16000).unwrap());
        Buffers::from_elements(format, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]])
    }

    fn format() -> ArrayFormat<i16> {
        ArrayFormat::<i16>::with_rate(4, 16000).unwrap()
    }

    fn chain(links: &[(&str, TransformParams)]) -> Vec<(String, TransformParams)> {
        links
            .iter()
            .map(|(name, params)| (name.to_string(), params.clone()))
            .collect()
    }

    #[test]
    fn test_shared_prefix_is_merged() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 2);

        let a = builder
            .add_feature("plus_one", &chain(&[("ToFloat", params! {}), ("Offset", params! { "value" => 1 })]))
            .unwrap();
        let b = builder
            .add_feature("plus_two", &chain(&[("ToFloat", params! {}), ("Offset", params! { "value" => 2 })]))
            .unwrap();
        let c = builder
            .add_feature("total", &chain(&[("ToFloat", params! {}), ("Total", params! {})]))
            .unwrap();

        assert_eq!(builder.len(), 4);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(builder.children(StageId::SOURCE).unwrap().len(), 1);
    }

    #[test]
    fn test_run() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 2);
        builder
            .add_feature("plus_one", &chain(&[("ToFloat", params! {}), ("Offset", params! { "value" => 1 })]))
            .unwrap();
        builder
            .add_feature("total", &chain(&[("ToFloat", params! {}), ("Total", params! {})]))
            .unwrap();

        let config = PipelineConfig {
            threads: Some(2),
            validate_outputs: true,
            ..Default::default()
        };
        let pipeline = builder.build(&config).unwrap();
        assert_eq!(pipeline.workers(), 2);
        assert_eq!(pipeline.feature_names(), vec!["plus_one", "total"]);

        let features = pipeline.run(&source()).unwrap();
        let plus_one = features.get::<ArrayFormat<f32>>("plus_one").unwrap();
        assert_eq!(plus_one.count(), 2);
        assert_eq!(plus_one[1], vec![6.0, 7.0, 8.0, 9.0]);

        let total = features.get::<SingleFormat<f32>>("total").unwrap();
        assert_relative_eq!(total[0], 36.0);

        // Runs are repeatable.
        let again = pipeline.run(&source()).unwrap();
        assert_eq!(again.get::<ArrayFormat<f32>>("plus_one").unwrap()[0], plus_one[0]);
    }

    #[test]
    fn test_layout_and_stages() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 2);
        builder
            .add_feature("total", &chain(&[("ToFloat", params! {}), ("Offset", params! {}), ("Total", params! {})]))
            .unwrap();
        let pipeline = builder.build(&PipelineConfig::default()).unwrap();

        // Source + three stages.
        assert_eq!(pipeline.tree().len(), 4);
        let stages = pipeline.stages();
        assert_eq!(
            stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["ToFloat", "Offset", "Total"]
        );
        assert_eq!(stages[0].size, 2 * 64);
        assert_eq!(stages[2].features, vec!["total".to_string()]);
        assert!(stages.iter().all(|s| s.address.is_some()));
        // ToFloat is released once Offset has run, so Total reuses its range.
        assert_eq!(stages[2].address, stages[0].address);
        assert_eq!(pipeline.layout().footprint, 4 * 64);
    }

    #[test]
    fn test_format_mismatch_at_assembly() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 1);
        assert!(matches!(
            builder.add(StageId::SOURCE, "Offset", &params! {}),
            Err(Error::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_unset_source_rate_fails_at_assembly() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, ArrayFormat::<i16>::new(4), 1);
        assert!(matches!(
            builder.add(StageId::SOURCE, "ToFloat", &params! {}),
            Err(Error::SamplingRateNotSet(_))
        ));
    }

    #[test]
    fn test_unknown_names() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 1);
        assert!(matches!(
            builder.add(StageId::SOURCE, "Missing", &params! {}),
            Err(Error::UnknownTransform(_))
        ));
        assert!(matches!(
            builder.add(StageId(42), "ToFloat", &params! {}),
            Err(Error::UnknownStage(42))
        ));
        assert!(matches!(
            builder.add(StageId::SOURCE, "ToFloat", &params! { "gain" => 1 }),
            Err(Error::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_empty_features() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 1);
        builder
            .add_feature("f", &chain(&[("ToFloat", params! {})]))
            .unwrap();
        assert!(matches!(
            builder.add_feature("f", &chain(&[("ToFloat", params! {}), ("Total", params! {})])),
            Err(Error::DuplicateFeature(_))
        ));
        let empty: Vec<(String, TransformParams)> = Vec::new();
        assert!(matches!(
            builder.add_feature("g", &empty),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_memory_limit() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 2);
        builder
            .add_feature("f", &chain(&[("ToFloat", params! {})]))
            .unwrap();
        let config = PipelineConfig {
            memory_limit: Some(64),
            ..Default::default()
        };
        assert!(matches!(
            builder.build(&config),
            Err(Error::AllocationExhausted { required: 128, limit: 64 })
        ));
    }

    #[test]
    fn test_run_rejects_wrong_source() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 3);
        builder
            .add_feature("f", &chain(&[("ToFloat", params! {})]))
            .unwrap();
        let pipeline = builder.build(&PipelineConfig::default()).unwrap();

        assert!(matches!(
            pipeline.run(&source()),
            Err(Error::BufferCountMismatch { expected: 3, found: 2 })
        ));

        let floats = Buffers::from_elements(Arc::new(ArrayFormat::<f32>::new(4)), vec![vec![0.0; 4]; 3]);
        assert!(matches!(
            pipeline.run(&floats),
            Err(Error::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_run_rejects_wrong_source_size() {
        let registry = registry();
        let mut builder = PipelineBuilder::new(&registry, format(), 1);
        builder
            .add_feature("f", &chain(&[("ToFloat", params! {}), ("Total", params! {})]))
            .unwrap();
        let pipeline = builder.build(&PipelineConfig::default()).unwrap();

        let narrow = Arc::new(ArrayFormat::<i16>::with_rate(2, 16000).unwrap());
        let short = Buffers::from_elements(narrow, vec![vec![1, 2]]);
        assert!(matches!(pipeline.run(&short), Err(Error::InvalidFormat { .. })));

        // Right format, ragged element
        let ragged = Buffers::from_elements(Arc::new(format()), vec![vec![1, 2]]);
        assert!(matches!(
            pipeline.run(&ragged),
            Err(Error::InvalidBuffer { index: 0, .. })
        ));
    }

    #[derive(Default)]
    struct Poison;

    impl Kernel for Poison {
        type Input = ArrayFormat<f32>;
        type Output = ArrayFormat<f32>;
        const NAME: &'static str = "Poison";
        const DESCRIPTION: &'static str = "Replaces the first sample with NaN";

        fn on_input_format_changed(
            &mut self,
            input: &Self::Input,
            output: &mut Self::Output,
            buffers_count: usize,
        ) -> Result<usize> {
            propagate_uniform(input, output);
            Ok(buffers_count)
        }
    }

    impl ElementKernel for Poison {
        fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
            output.copy_from_slice(input);
            output[0] = f32::NAN;
        }
    }

    #[test]
    fn test_invalid_output_is_advisory() {
        let mut registry = registry();
        registry.register_element::<Poison>();
        let mut builder = PipelineBuilder::new(&registry, format(), 2);
        builder
            .add_feature("poisoned", &chain(&[("ToFloat", params! {}), ("Poison", params! {})]))
            .unwrap();
        builder
            .add_feature(
                "total",
                &chain(&[("ToFloat", params! {}), ("Poison", params! {}), ("Total", params! {})]),
            )
            .unwrap();
        let config = PipelineConfig {
            validate_outputs: true,
            ..Default::default()
        };
        let pipeline = builder.build(&config).unwrap();

        let features = pipeline.run(&source()).unwrap();
        let poisoned = features.get::<ArrayFormat<f32>>("poisoned").unwrap();
        assert!(poisoned[0][0].is_nan());
        assert_eq!(&poisoned[1][1..], &[6.0f32, 7.0, 8.0]);
        assert!(features.get::<SingleFormat<f32>>("total").unwrap()[0].is_nan());
    }

    #[test]
    fn test_dump_graph() {
        let registry = registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.dot");

        let mut builder = PipelineBuilder::new(&registry, format(), 1);
        builder
            .add_feature("f", &chain(&[("ToFloat", params! {})]))
            .unwrap();
        let config = PipelineConfig {
            dump_graph: Some(path.clone()),
            ..Default::default()
        };
        builder.build(&config).unwrap();

        let dot = std::fs::read_to_string(path).unwrap();
        assert!(dot.contains("ToFloat"));
    }
}
