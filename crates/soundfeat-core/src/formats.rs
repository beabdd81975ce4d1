//! Concrete buffer formats.

use crate::buffers::AnyBuffers;
use crate::format::{
    dump_buffers, validate_buffers, BufferFormat, Format, FormatId, Sample, SamplingRate,
};
use crate::Result;
use std::any::Any;
use std::marker::PhantomData;

/// The parts of [`BufferFormat`] every typed format implements the same way.
macro_rules! typed_buffer_format {
    ($ty:ident, { $($items:tt)* }) => {
        impl<T: Sample> BufferFormat for $ty<T> {
            fn rate(&self) -> &SamplingRate {
                &self.rate
            }

            fn rate_mut(&mut self) -> &mut SamplingRate {
                &mut self.rate
            }

            fn validate(&self, buffers: &dyn AnyBuffers) -> Result<()> {
                validate_buffers(self, buffers)
            }

            fn dump(&self, buffers: &dyn AnyBuffers) -> Result<String> {
                dump_buffers(self, buffers)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            $($items)*
        }
    };
}

/// Fixed-length arrays of samples, one array per buffer.
#[derive(Debug, Clone)]
pub struct ArrayFormat<T: Sample> {
    size: usize,
    rate: SamplingRate,
    _sample: PhantomData<fn() -> T>,
}

impl<T: Sample> ArrayFormat<T> {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            rate: SamplingRate::unset(),
            _sample: PhantomData,
        }
    }

    pub fn with_rate(size: usize, sampling_rate: u32) -> Result<Self> {
        Ok(Self {
            size,
            rate: SamplingRate::new(sampling_rate)?,
            _sample: PhantomData,
        })
    }

    /// Number of samples in each array.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    /// Duration of one array in seconds, if the rate is known.
    pub fn duration(&self) -> Option<f64> {
        self.rate.get().map(|rate| self.size as f64 / rate as f64)
    }
}

impl<T: Sample> Default for ArrayFormat<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

typed_buffer_format!(ArrayFormat, {
    fn id(&self) -> FormatId {
        FormatId::Concrete(format!("ArrayFormat<{}>", T::type_name()))
    }

    fn unaligned_size_in_bytes(&self) -> usize {
        self.size * std::mem::size_of::<T>()
    }

    fn describe(&self) -> String {
        match self.rate.get() {
            Some(rate) => format!("{} [{}] @ {} Hz", self.id(), self.size, rate),
            None => format!("{} [{}]", self.id(), self.size),
        }
    }
});

impl<T: Sample> Format for ArrayFormat<T> {
    type Element = Vec<T>;

    fn new_element(&self) -> Vec<T> {
        vec![T::zero(); self.size]
    }

    fn check_element(&self, element: &Vec<T>) -> std::result::Result<(), String> {
        if element.len() != self.size {
            return Err(format!(
                "length {} does not match format size {}",
                element.len(),
                self.size
            ));
        }
        match element.iter().position(|v| !v.is_valid()) {
            Some(index) => Err(format!("[{}] = {:?}", index, element[index])),
            None => Ok(()),
        }
    }

    fn dump_element(&self, element: &Vec<T>) -> String {
        element
            .iter()
            .map(|v| format!("{v:?}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One sample per buffer.
#[derive(Debug, Clone)]
pub struct SingleFormat<T: Sample> {
    rate: SamplingRate,
    _sample: PhantomData<fn() -> T>,
}

impl<T: Sample> SingleFormat<T> {
    pub fn new() -> Self {
        Self {
            rate: SamplingRate::unset(),
            _sample: PhantomData,
        }
    }

    pub fn with_rate(sampling_rate: u32) -> Result<Self> {
        Ok(Self {
            rate: SamplingRate::new(sampling_rate)?,
            _sample: PhantomData,
        })
    }
}

impl<T: Sample> Default for SingleFormat<T> {
    fn default() -> Self {
        Self::new()
    }
}

typed_buffer_format!(SingleFormat, {
    fn id(&self) -> FormatId {
        FormatId::Concrete(format!("SingleFormat<{}>", T::type_name()))
    }

    fn unaligned_size_in_bytes(&self) -> usize {
        std::mem::size_of::<T>()
    }

    fn describe(&self) -> String {
        self.id().to_string()
    }
});

impl<T: Sample> Format for SingleFormat<T> {
    type Element = T;

    fn new_element(&self) -> T {
        T::zero()
    }

    fn check_element(&self, element: &T) -> std::result::Result<(), String> {
        if element.is_valid() {
            Ok(())
        } else {
            Err(format!("{element:?}"))
        }
    }

    fn dump_element(&self, element: &T) -> String {
        format!("{element:?}")
    }
}

/// Wildcard format: accepts any producer, occupies no memory.
#[derive(Debug, Clone, Default)]
pub struct IdentityFormat {
    rate: SamplingRate,
}

impl IdentityFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(sampling_rate: u32) -> Result<Self> {
        Ok(Self {
            rate: SamplingRate::new(sampling_rate)?,
        })
    }
}

impl BufferFormat for IdentityFormat {
    fn id(&self) -> FormatId {
        FormatId::Identity
    }

    fn rate(&self) -> &SamplingRate {
        &self.rate
    }

    fn rate_mut(&mut self) -> &mut SamplingRate {
        &mut self.rate
    }

    fn unaligned_size_in_bytes(&self) -> usize {
        0
    }

    fn validate(&self, _buffers: &dyn AnyBuffers) -> Result<()> {
        Ok(())
    }

    fn dump(&self, _buffers: &dyn AnyBuffers) -> Result<String> {
        Ok("<empty>".to_string())
    }

    fn describe(&self) -> String {
        self.id().to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Format for IdentityFormat {
    type Element = ();

    fn new_element(&self) {}

    fn check_element(&self, _element: &()) -> std::result::Result<(), String> {
        Ok(())
    }

    fn dump_element(&self, _element: &()) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ALIGNMENT;
    use crate::{Buffers, Error};
    use std::sync::Arc;

    #[test]
    fn test_array_format_id_and_size() {
        let format = ArrayFormat::<f32>::new(100);
        assert_eq!(format.id().name(), "ArrayFormat<f32>");
        assert_eq!(format.unaligned_size_in_bytes(), 400);
        assert_eq!(format.size_in_bytes(), 448);
        assert_eq!(format.size_in_bytes() % ALIGNMENT, 0);

        let ints = ArrayFormat::<i16>::new(100);
        assert_ne!(format.id(), ints.id());
    }

    #[test]
    fn test_unset_rate_fails_on_read() {
        let format = ArrayFormat::<f32>::new(16);
        assert!(matches!(
            format.sampling_rate(),
            Err(Error::SamplingRateNotSet(_))
        ));
        assert!(format.duration().is_none());
    }

    #[test]
    fn test_copy_source_details_keeps_id() {
        let source = ArrayFormat::<i16>::with_rate(512, 16000).unwrap();
        let mut single = SingleFormat::<f32>::new();
        single.copy_source_details_from(&source).unwrap();

        assert_eq!(single.sampling_rate().unwrap(), 16000);
        assert_eq!(single.id().name(), "SingleFormat<f32>");
    }

    #[test]
    fn test_copy_source_details_from_unset_rate_fails() {
        let source = ArrayFormat::<i16>::new(512);
        let mut target = ArrayFormat::<f32>::new(512);
        assert!(target.copy_source_details_from(&source).is_err());
    }

    #[test]
    fn test_identity_format_is_wildcard() {
        let identity: Box<dyn BufferFormat> = Box::new(IdentityFormat::new());
        let array: Box<dyn BufferFormat> = Box::new(ArrayFormat::<f32>::new(4));
        assert!(*identity == *array);
        assert!(*array == *identity);
        assert_eq!(identity.size_in_bytes(), 0);
    }

    #[test]
    fn test_validate_reports_non_finite_values() {
        let format = Arc::new(ArrayFormat::<f32>::with_rate(4, 16000).unwrap());
        let mut buffers = Buffers::new(format.clone());
        buffers.initialize(2).unwrap();
        assert!(format.validate(&buffers).is_ok());

        buffers[1][2] = f32::NAN;
        match format.validate(&buffers) {
            Err(Error::InvalidBuffer { index, .. }) => assert_eq!(index, 1),
            other => panic!("Expected InvalidBuffer, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_foreign_buffers() {
        let floats = Arc::new(ArrayFormat::<f32>::new(4));
        let ints = ArrayFormat::<i16>::new(4);
        let mut buffers = Buffers::new(floats);
        buffers.initialize(1).unwrap();

        assert!(matches!(
            ints.validate(&buffers),
            Err(Error::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_dump() {
        let format = Arc::new(SingleFormat::<f32>::new());
        let mut buffers = Buffers::new(format.clone());
        buffers.initialize(2).unwrap();
        buffers[0] = 1.5;

        let dump = format.dump(&buffers).unwrap();
        assert!(dump.starts_with("Buffers count: 2\n"));
        assert!(dump.contains("[0] 1.5"));
    }
}
