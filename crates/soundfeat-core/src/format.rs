//! Buffer format contract.
//!
//! A format describes the element layout of the buffers flowing between two
//! pipeline stages, plus the sampling rate of the signal they were derived
//! from. Formats are compared with wildcard semantics: [`FormatId::Identity`]
//! matches any other format, in either operand position.
//!
//! Two layers:
//! - [`BufferFormat`]: object-safe, used wherever stages are wired together
//!   without knowing concrete types (registry, assembler, executor).
//! - [`Format`]: the typed layer, which fixes the element type stored in
//!   [`Buffers`].

use crate::buffers::{AnyBuffers, Buffers};
use crate::{Error, Result};
use dyn_clone::DynClone;
use std::any::Any;
use std::fmt::{self, Write as _};

/// Lowest accepted sampling rate in Hz.
pub const MIN_SAMPLING_RATE: u32 = 2000;

/// Highest accepted sampling rate in Hz.
pub const MAX_SAMPLING_RATE: u32 = 48000;

/// Buffer footprints are padded to this many bytes.
pub const ALIGNMENT: usize = 64;

/// Round `size` up to the next multiple of [`ALIGNMENT`].
#[inline]
pub const fn aligned(size: usize) -> usize {
    size.div_ceil(ALIGNMENT) * ALIGNMENT
}

/// Format identity.
///
/// `PartialEq` implements the wildcard rule and is therefore not transitive,
/// which is why `Eq` and `Hash` are deliberately absent.
#[derive(Debug, Clone)]
pub enum FormatId {
    /// A concrete layout, e.g. `ArrayFormat<f32>`.
    Concrete(String),
    /// Wildcard; compares equal to every format.
    Identity,
}

impl FormatId {
    pub fn concrete(name: impl Into<String>) -> Self {
        Self::Concrete(name.into())
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Concrete(name) => name,
            Self::Identity => "identity",
        }
    }
}

impl PartialEq for FormatId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Identity, _) | (_, Self::Identity) => true,
            (Self::Concrete(a), Self::Concrete(b)) => a == b,
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sampling rate slot of a format: unset until assigned, range-checked on
/// every assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingRate(Option<u32>);

impl SamplingRate {
    pub const fn unset() -> Self {
        Self(None)
    }

    pub fn new(value: u32) -> Result<Self> {
        Self::validate(value)?;
        Ok(Self(Some(value)))
    }

    pub fn validate(value: u32) -> Result<()> {
        if !(MIN_SAMPLING_RATE..=MAX_SAMPLING_RATE).contains(&value) {
            return Err(Error::InvalidSamplingRate(value));
        }
        Ok(())
    }

    #[inline]
    pub fn get(&self) -> Option<u32> {
        self.0
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn set(&mut self, value: u32) -> Result<()> {
        Self::validate(value)?;
        self.0 = Some(value);
        Ok(())
    }
}

/// Object-safe format interface.
pub trait BufferFormat: DynClone + fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> FormatId;

    fn rate(&self) -> &SamplingRate;

    fn rate_mut(&mut self) -> &mut SamplingRate;

    /// Sampling rate of the signal these buffers were derived from.
    fn sampling_rate(&self) -> Result<u32> {
        self.rate()
            .get()
            .ok_or_else(|| Error::SamplingRateNotSet(self.id().to_string()))
    }

    fn set_sampling_rate(&mut self, value: u32) -> Result<()> {
        self.rate_mut().set(value)
    }

    /// Copy what describes the source signal (the sampling rate) from the
    /// format upstream of this one. The id is never copied.
    fn copy_source_details_from(&mut self, other: &dyn BufferFormat) -> Result<()> {
        let rate = other.sampling_rate()?;
        self.set_sampling_rate(rate)
    }

    /// Footprint of a single element in bytes, without padding.
    fn unaligned_size_in_bytes(&self) -> usize;

    /// Footprint of a single element in bytes, padded to [`ALIGNMENT`].
    fn size_in_bytes(&self) -> usize {
        aligned(self.unaligned_size_in_bytes())
    }

    /// Check every element of `buffers` against this format.
    fn validate(&self, buffers: &dyn AnyBuffers) -> Result<()>;

    /// Human-readable dump of `buffers`.
    fn dump(&self, buffers: &dyn AnyBuffers) -> Result<String>;

    /// One-line description of the format itself.
    fn describe(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}

dyn_clone::clone_trait_object!(BufferFormat);

impl PartialEq for dyn BufferFormat {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

/// Typed format layer: fixes the element type of [`Buffers`].
pub trait Format: BufferFormat + Clone {
    type Element: Send + Sync + 'static;

    /// Construct one element sized for this format.
    fn new_element(&self) -> Self::Element;

    /// `Err` carries a description of the offending value.
    fn check_element(&self, element: &Self::Element) -> std::result::Result<(), String>;

    fn dump_element(&self, element: &Self::Element) -> String;
}

/// Scalar (or small fixed-size) value stored in buffers.
pub trait Sample: Copy + fmt::Debug + PartialEq + Send + Sync + 'static {
    fn type_name() -> String;

    fn zero() -> Self;

    /// Value-validity policy; advisory, never aborts a run.
    fn is_valid(&self) -> bool {
        true
    }
}

impl Sample for i16 {
    fn type_name() -> String {
        "i16".to_string()
    }

    fn zero() -> Self {
        0
    }
}

impl Sample for i32 {
    fn type_name() -> String {
        "i32".to_string()
    }

    fn zero() -> Self {
        0
    }
}

impl Sample for f32 {
    fn type_name() -> String {
        "f32".to_string()
    }

    fn zero() -> Self {
        0.0
    }

    fn is_valid(&self) -> bool {
        self.is_finite()
    }
}

impl<const N: usize> Sample for [f32; N] {
    fn type_name() -> String {
        format!("[f32; {N}]")
    }

    fn zero() -> Self {
        [0.0; N]
    }

    fn is_valid(&self) -> bool {
        self.iter().all(|v| v.is_finite())
    }
}

/// Resolve format-erased buffers to the concrete buffers of `format`.
///
/// Fails with [`Error::FormatMismatch`] if the buffers were produced under a
/// different format.
pub fn downcast_buffers<'a, F: Format>(
    format: &F,
    buffers: &'a dyn AnyBuffers,
) -> Result<&'a Buffers<F>> {
    if format.id() != buffers.format().id() {
        return Err(Error::mismatch(format.id(), buffers.format().id()));
    }
    buffers
        .as_any()
        .downcast_ref::<Buffers<F>>()
        .ok_or_else(|| Error::mismatch(format.id(), buffers.format().id()))
}

/// Shared [`BufferFormat::validate`] body for typed formats.
pub fn validate_buffers<F: Format>(format: &F, buffers: &dyn AnyBuffers) -> Result<()> {
    let typed = downcast_buffers(format, buffers)?;
    for (index, element) in typed.iter().enumerate() {
        format
            .check_element(element)
            .map_err(|value| Error::InvalidBuffer {
                format: format.describe(),
                index,
                value,
            })?;
    }
    Ok(())
}

/// Shared [`BufferFormat::dump`] body for typed formats.
pub fn dump_buffers<F: Format>(format: &F, buffers: &dyn AnyBuffers) -> Result<String> {
    let typed = downcast_buffers(format, buffers)?;
    let mut out = format!("Buffers count: {}\n", typed.count());
    for (index, element) in typed.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "[{index}] {}", format.dump_element(element));
    }
    Ok(out)
}
