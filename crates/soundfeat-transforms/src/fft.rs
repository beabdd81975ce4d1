//! Shared FFT plumbing.

use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{Fft, FftNum, FftPlanner, Length};
use soundfeat_core::ScratchPool;
use std::sync::Arc;

/// Working memory for one in-place transform.
pub(crate) struct Workspace<T> {
    pub(crate) buffer: Vec<Complex<T>>,
    scratch: Vec<Complex<T>>,
}

/// A planned FFT together with one workspace per worker.
pub(crate) struct Plan<T: FftNum> {
    fft: Arc<dyn Fft<T>>,
    workspaces: ScratchPool<Workspace<T>>,
}

impl<T: FftNum> Plan<T> {
    pub(crate) fn forward(length: usize, workers: usize) -> Self {
        Self::new(FftPlanner::new().plan_fft_forward(length), workers)
    }

    pub(crate) fn inverse(length: usize, workers: usize) -> Self {
        Self::new(FftPlanner::new().plan_fft_inverse(length), workers)
    }

    fn new(fft: Arc<dyn Fft<T>>, workers: usize) -> Self {
        let length = fft.len();
        let scratch = fft.get_inplace_scratch_len();
        let workspaces = ScratchPool::new(workers, || Workspace {
            buffer: vec![Complex::zero(); length],
            scratch: vec![Complex::zero(); scratch],
        });
        Self { fft, workspaces }
    }

    /// Exclusive access to a free workspace.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Workspace<T>) -> R) -> R {
        self.workspaces.with(f)
    }

    /// Transform the workspace buffer in place.
    pub(crate) fn process(&self, workspace: &mut Workspace<T>) {
        self.fft
            .process_with_scratch(&mut workspace.buffer, &mut workspace.scratch);
    }

    /// Fill a free workspace with `fill`, transform it and hand the result
    /// to `read`.
    pub(crate) fn run<R>(
        &self,
        fill: impl FnOnce(&mut [Complex<T>]),
        read: impl FnOnce(&[Complex<T>]) -> R,
    ) -> R {
        self.with(|workspace| {
            fill(&mut workspace.buffer);
            self.process(workspace);
            read(&workspace.buffer)
        })
    }
}

impl<T: FftNum> std::fmt::Debug for Plan<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("len", &self.fft.len())
            .field("workspaces", &self.workspaces.len())
            .finish()
    }
}
