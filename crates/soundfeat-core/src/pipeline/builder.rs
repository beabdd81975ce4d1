//! Pipeline assembly.

use super::executor::Step;
use super::{Pipeline, StageId};
use crate::allocator::{BuffersAllocator, LifetimeTree, NodeId};
use crate::config::PipelineConfig;
use crate::format::BufferFormat;
use crate::parameter::TransformParams;
use crate::registry::TransformRegistry;
use crate::transform::Transform;
use crate::{Error, Result};
use std::collections::VecDeque;

struct StageSlot {
    name: String,
    params: TransformParams,
    transform: Box<dyn Transform>,
    parent: StageId,
    children: Vec<StageId>,
    features: Vec<String>,
}

/// Wires registry transforms into a tree rooted at the source signal.
///
/// Every edge is checked as it is added: the child must accept the parent's
/// output format, and the sampling rate flows down from the source. All
/// failures therefore surface here rather than during a run.
///
/// # Example
///
/// ```ignore
/// let mut builder = PipelineBuilder::new(&registry, ArrayFormat::<i16>::with_rate(4096, 16000)?, 1);
/// builder.add_feature("energy", &[
///     ("Int16ToFloat", params! {}),
///     ("Window", params! { "length" => 512, "type" => "hamming" }),
///     ("RDFT", params! {}),
///     ("Energy", params! {}),
/// ])?;
/// let pipeline = builder.build(&PipelineConfig::default())?;
/// ```
pub struct PipelineBuilder<'r> {
    registry: &'r TransformRegistry,
    source: Box<dyn BufferFormat>,
    source_count: usize,
    stages: Vec<StageSlot>,
    source_children: Vec<StageId>,
}

impl<'r> PipelineBuilder<'r> {
    /// `source` must carry the sampling rate of the signal.
    pub fn new(
        registry: &'r TransformRegistry,
        source: impl BufferFormat,
        source_count: usize,
    ) -> Self {
        Self {
            registry,
            source: Box::new(source),
            source_count,
            stages: Vec::new(),
            source_children: Vec::new(),
        }
    }

    pub fn source_format(&self) -> &dyn BufferFormat {
        self.source.as_ref()
    }

    /// Number of stages added so far.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn slot(&self, id: StageId) -> Result<&StageSlot> {
        id.index()
            .and_then(|index| self.stages.get(index))
            .ok_or(Error::UnknownStage(id.0))
    }

    fn slot_mut(&mut self, id: StageId) -> Result<&mut StageSlot> {
        id.index()
            .and_then(|index| self.stages.get_mut(index))
            .ok_or(Error::UnknownStage(id.0))
    }

    /// Output format and buffer count of `id`.
    pub fn output_of(&self, id: StageId) -> Result<(&dyn BufferFormat, usize)> {
        if id == StageId::SOURCE {
            return Ok((self.source.as_ref(), self.source_count));
        }
        let slot = self.slot(id)?;
        Ok((slot.transform.output_format(), slot.transform.output_count()))
    }

    pub fn children(&self, id: StageId) -> Result<&[StageId]> {
        if id == StageId::SOURCE {
            return Ok(&self.source_children);
        }
        Ok(&self.slot(id)?.children)
    }

    /// Create `name` from the registry and feed it the output of `parent`.
    pub fn add(&mut self, parent: StageId, name: &str, params: &TransformParams) -> Result<StageId> {
        let mut transform = self.registry.create(name, params)?;
        let (format, count) = self.output_of(parent)?;
        let format = dyn_clone::clone_box(format);
        transform.set_input_format(format.as_ref(), count)?;

        let id = StageId(self.stages.len() + 1);
        tracing::debug!(
            stage = id.0,
            parent = parent.0,
            transform = name,
            output = %transform.output_format().describe(),
            count = transform.output_count(),
            "Added stage"
        );

        self.stages.push(StageSlot {
            name: name.to_string(),
            params: params.clone(),
            transform,
            parent,
            children: Vec::new(),
            features: Vec::new(),
        });
        if parent == StageId::SOURCE {
            self.source_children.push(id);
        } else {
            self.slot_mut(parent)?.children.push(id);
        }
        Ok(id)
    }

    /// Child of `parent` created from the same transform and parameters, if any.
    fn find_child(&self, parent: StageId, name: &str, params: &TransformParams) -> Option<StageId> {
        let children = self.children(parent).ok()?;
        children.iter().copied().find(|&child| {
            self.slot(child)
                .map(|slot| slot.name == name && &slot.params == params)
                .unwrap_or(false)
        })
    }

    /// Add a chain of transforms starting at the source, reusing any
    /// identical prefix already present. Returns the last stage.
    pub fn add_chain<S: AsRef<str>>(&mut self, chain: &[(S, TransformParams)]) -> Result<StageId> {
        let mut current = StageId::SOURCE;
        for (name, params) in chain {
            let name = name.as_ref();
            current = match self.find_child(current, name, params) {
                Some(existing) => existing,
                None => self.add(current, name, params)?,
            };
        }
        Ok(current)
    }

    /// Declare a named feature computed by `chain`.
    pub fn add_feature<S: AsRef<str>>(
        &mut self,
        name: &str,
        chain: &[(S, TransformParams)],
    ) -> Result<StageId> {
        if chain.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "feature '{name}' has an empty transform chain"
            )));
        }
        self.check_feature_name(name)?;
        let stage = self.add_chain(chain)?;
        self.expose(name, stage)?;
        Ok(stage)
    }

    /// Keep the output of `stage` as the feature `name`.
    pub fn expose(&mut self, name: &str, stage: StageId) -> Result<()> {
        self.check_feature_name(name)?;
        self.slot_mut(stage)?.features.push(name.to_string());
        Ok(())
    }

    fn check_feature_name(&self, name: &str) -> Result<()> {
        if self.stages.iter().any(|slot| slot.features.iter().any(|f| f == name)) {
            return Err(Error::DuplicateFeature(name.to_string()));
        }
        Ok(())
    }

    /// Lay out the buffers, initialize every transform and produce a runnable
    /// pipeline.
    pub fn build(self, config: &PipelineConfig) -> Result<Pipeline> {
        config.validate()?;
        let workers = config.workers();

        // Step 1: breadth-first execution order, which is also the tree's
        // insertion order.
        let mut tree = LifetimeTree::new(0, 0);
        let mut order: Vec<(StageId, NodeId)> = Vec::with_capacity(self.stages.len());
        let mut queue: VecDeque<(StageId, NodeId)> = self
            .source_children
            .iter()
            .map(|&child| (child, tree.root()))
            .collect();
        while let Some((id, parent_node)) = queue.pop_front() {
            let slot = self.slot(id)?;
            let transform = &slot.transform;
            let size = transform.output_format().size_in_bytes() * transform.output_count();
            let node = tree.add_child(parent_node, size, id.0)?;
            {
                let node = tree.node_mut(node)?;
                node.retained = !slot.features.is_empty();
                node.label = Some(slot.name.clone());
            }
            order.push((id, node));
            queue.extend(slot.children.iter().map(|&child| (child, node)));
        }

        // Step 2: solve and check the layout.
        let allocator = BuffersAllocator::new().with_limit(config.memory_limit);
        let layout = allocator.solve(&mut tree)?;
        if let Some(path) = &config.dump_graph {
            BuffersAllocator::dump(&tree, path)?;
        }

        // Step 3: per-stage precomputation.
        let mut slots: Vec<Option<StageSlot>> = self.stages.into_iter().map(Some).collect();
        let position_of = |id: StageId| order.iter().position(|&(stage, _)| stage == id);

        let mut steps = Vec::with_capacity(order.len());
        for (position, &(id, node)) in order.iter().enumerate() {
            let mut slot = id
                .index()
                .and_then(|index| slots.get_mut(index))
                .and_then(Option::take)
                .ok_or(Error::UnknownStage(id.0))?;
            slot.transform.initialize(workers)?;

            let input = if slot.parent == StageId::SOURCE {
                None
            } else {
                Some(position_of(slot.parent).ok_or(Error::UnknownStage(slot.parent.0))?)
            };
            tracing::debug!(position, stage = id.0, transform = %slot.name, "Scheduled stage");

            steps.push(Step {
                name: slot.name,
                transform: slot.transform,
                node,
                input,
                features: slot.features,
                release: Vec::new(),
            });
        }
        schedule_releases(&mut steps);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("soundfeat-worker-{i}"))
            .build()?;

        Ok(Pipeline {
            source: self.source,
            source_count: self.source_count,
            steps,
            tree,
            layout,
            pool,
            workers,
            validate_outputs: config.validate_outputs,
        })
    }
}

/// After the last consumer of a non-retained buffer runs, release it.
fn schedule_releases(steps: &mut [Step]) {
    let mut last_consumer = vec![None; steps.len()];
    for (position, step) in steps.iter().enumerate() {
        if let Some(input) = step.input {
            last_consumer[input] = Some(position);
        }
    }
    for (producer, consumer) in last_consumer.into_iter().enumerate() {
        if let Some(consumer) = consumer {
            if steps[producer].features.is_empty() {
                steps[consumer].release.push(producer);
            }
        }
    }
}

impl std::fmt::Debug for PipelineBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("source", &self.source.describe())
            .field("source_count", &self.source_count)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
