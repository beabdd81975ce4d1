//! Format-tagged buffer collections.

use crate::format::{BufferFormat, Format};
use crate::{Error, Result};
use std::any::Any;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// Format-erased view of a [`Buffers`] collection.
pub trait AnyBuffers: Send + Sync + 'static {
    fn count(&self) -> usize;

    fn format(&self) -> &dyn BufferFormat;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn AnyBuffers {
    pub fn downcast_ref<F: Format>(&self) -> Option<&Buffers<F>> {
        self.as_any().downcast_ref::<Buffers<F>>()
    }

    pub fn downcast_mut<F: Format>(&mut self) -> Option<&mut Buffers<F>> {
        self.as_any_mut().downcast_mut::<Buffers<F>>()
    }
}

impl fmt::Debug for dyn AnyBuffers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyBuffers")
            .field("format", &self.format().describe())
            .field("count", &self.count())
            .finish()
    }
}

/// Ordered collection of independently owned elements, all of one format.
///
/// The collection starts empty and is sized exactly once by
/// [`initialize`](Self::initialize).
pub struct Buffers<F: Format> {
    format: Arc<F>,
    elements: Vec<F::Element>,
    initialized: bool,
}

impl<F: Format> Buffers<F> {
    pub fn new(format: Arc<F>) -> Self {
        Self {
            format,
            elements: Vec::new(),
            initialized: false,
        }
    }

    /// Build an already-initialized collection from existing elements.
    pub fn from_elements(format: Arc<F>, elements: Vec<F::Element>) -> Self {
        Self {
            format,
            elements,
            initialized: true,
        }
    }

    /// Allocate `count` elements using the format's element constructor.
    pub fn initialize(&mut self, count: usize) -> Result<()> {
        let format = Arc::clone(&self.format);
        self.initialize_with(count, |_| format.new_element())
    }

    /// Allocate `count` elements produced by `make`.
    pub fn initialize_with(
        &mut self,
        count: usize,
        make: impl FnMut(usize) -> F::Element,
    ) -> Result<()> {
        if self.initialized {
            return Err(Error::AlreadyInitialized);
        }
        self.elements = (0..count).map(make).collect();
        self.initialized = true;
        Ok(())
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn format(&self) -> &Arc<F> {
        &self.format
    }

    pub fn iter(&self) -> std::slice::Iter<'_, F::Element> {
        self.elements.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, F::Element> {
        self.elements.iter_mut()
    }

    pub fn as_slice(&self) -> &[F::Element] {
        &self.elements
    }

    pub fn as_mut_slice(&mut self) -> &mut [F::Element] {
        &mut self.elements
    }

    pub fn into_elements(self) -> Vec<F::Element> {
        self.elements
    }

    /// Validate against `format`, which must match the buffers' own format.
    pub fn validate(&self, format: &dyn BufferFormat) -> Result<()> {
        self.check_format(format)?;
        format.validate(self)
    }

    /// Dump using `format`, which must match the buffers' own format.
    pub fn dump(&self, format: &dyn BufferFormat) -> Result<String> {
        self.check_format(format)?;
        format.dump(self)
    }

    fn check_format(&self, format: &dyn BufferFormat) -> Result<()> {
        let own = self.format.id();
        let other = format.id();
        if own != other {
            return Err(Error::mismatch(other, own));
        }
        Ok(())
    }
}

impl<F: Format> AnyBuffers for Buffers<F> {
    fn count(&self) -> usize {
        self.elements.len()
    }

    fn format(&self) -> &dyn BufferFormat {
        self.format.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<F: Format> Index<usize> for Buffers<F> {
    type Output = F::Element;

    fn index(&self, index: usize) -> &Self::Output {
        &self.elements[index]
    }
}

impl<F: Format> IndexMut<usize> for Buffers<F> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.elements[index]
    }
}

impl<'a, F: Format> IntoIterator for &'a Buffers<F> {
    type Item = &'a F::Element;
    type IntoIter = std::slice::Iter<'a, F::Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<F: Format> fmt::Debug for Buffers<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffers")
            .field("format", &self.format.describe())
            .field("count", &self.elements.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}
