//! Stage execution.

use super::features::Features;
use crate::allocator::NodeId;
use crate::buffers::AnyBuffers;
use crate::transform::Transform;
use crate::{Error, Result};

/// One scheduled stage.
pub(crate) struct Step {
    pub(crate) name: String,
    pub(crate) transform: Box<dyn Transform>,
    pub(crate) node: NodeId,
    /// Position of the producing step; `None` reads the source.
    pub(crate) input: Option<usize>,
    /// Feature names this step's output is kept under.
    pub(crate) features: Vec<String>,
    /// Steps whose buffers are dropped once this one has run.
    pub(crate) release: Vec<usize>,
}

/// Run `steps` in order over `source`.
///
/// Must be called inside the pipeline's thread pool so data-parallel kernels
/// use its workers.
pub(crate) fn execute(
    steps: &[Step],
    source: &dyn AnyBuffers,
    validate_outputs: bool,
) -> Result<Features> {
    let mut outputs: Vec<Option<Box<dyn AnyBuffers>>> = Vec::with_capacity(steps.len());
    outputs.resize_with(steps.len(), || None);

    for (position, step) in steps.iter().enumerate() {
        let mut output = step.transform.create_output_buffers()?;
        {
            let input: &dyn AnyBuffers = match step.input {
                None => source,
                Some(producer) => outputs
                    .get(producer)
                    .and_then(|o| o.as_deref())
                    .ok_or(Error::UnknownStage(producer))?,
            };
            step.transform.execute(input, output.as_mut())?;
        }

        if validate_outputs {
            if let Err(e) = step.transform.output_format().validate(output.as_ref()) {
                tracing::warn!(stage = %step.name, position, error = %e, "Stage produced invalid values");
            }
        }

        outputs[position] = Some(output);
        for &released in &step.release {
            outputs[released] = None;
            tracing::trace!(stage = %steps[released].name, "Released buffers");
        }
    }

    let mut features = Features::new();
    for (position, step) in steps.iter().enumerate() {
        if step.features.is_empty() {
            continue;
        }
        if let Some(buffers) = outputs[position].take() {
            features.insert(&step.features, buffers);
        }
    }
    Ok(features)
}
