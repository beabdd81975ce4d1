//! Built-in transforms for soundfeat pipelines.
//!
//! Every transform here is a [`Kernel`](soundfeat_core::Kernel) registered
//! under its `NAME` by [`register_builtin`]:
//!
//! | name | input → output |
//! |---|---|
//! | `Int16ToFloat` | `ArrayFormat<i16>` → `ArrayFormat<f32>` |
//! | `Window` | `ArrayFormat<f32>`, splits signals into frames |
//! | `ZeroPadding` | `ArrayFormat<f32>`, size → next power of two |
//! | `RDFT` / `RDFTInverse` | `ArrayFormat<f32>`, real ↔ interleaved complex |
//! | `Energy` / `Magnitude` | `ArrayFormat<f32>`, complex → real |
//! | `Intensity` | `ArrayFormat<f32>` → `SingleFormat<f32>` |
//! | `Mean` | `ArrayFormat<f32>` → `SingleFormat<[f32; 2]>` |
//! | `Diff` | `ArrayFormat<f32>` |
//! | `FilterBank` | `ArrayFormat<f32>`, spectrum → band energies |
//! | `SubbandEnergy` | `ArrayFormat<f32>`, wavelet subbands → energies |
//! | `Autocorrelation` | `ArrayFormat<f32>` |
//! | `Beat` | `ArrayFormat<f32>` → `ArrayFormat<[f32; 2]>` |

pub mod autocorrelation;
pub mod beat;
pub mod convert;
pub mod diff;
pub mod filter_bank;
mod fft;
pub mod padding;
pub mod rdft;
pub mod spectrum;
pub mod statistics;
pub mod subband;
pub mod window;

pub use autocorrelation::Autocorrelation;
pub use beat::Beat;
pub use convert::Int16ToFloat;
pub use diff::Diff;
pub use filter_bank::{FilterBank, FrequencyScale};
pub use padding::ZeroPadding;
pub use rdft::{Rdft, RdftInverse};
pub use spectrum::{Energy, Magnitude};
pub use statistics::{Intensity, Mean};
pub use subband::SubbandEnergy;
pub use window::{Window, WindowType};

use soundfeat_core::TransformRegistry;

/// Register every built-in transform.
pub fn register_builtin(registry: &mut TransformRegistry) {
    registry.register_element::<Int16ToFloat>();
    registry.register_batch::<Window>();
    registry.register_element::<ZeroPadding>();
    registry.register_element::<Rdft>();
    registry.register_element::<RdftInverse>();
    registry.register_element::<Energy>();
    registry.register_element::<Magnitude>();
    registry.register_element::<Intensity>();
    registry.register_element::<Mean>();
    registry.register_element::<Diff>();
    registry.register_element::<FilterBank>();
    registry.register_element::<SubbandEnergy>();
    registry.register_element::<Autocorrelation>();
    registry.register_batch::<Beat>();
}

/// A registry holding the built-in transforms.
pub fn registry() -> TransformRegistry {
    let mut registry = TransformRegistry::new();
    register_builtin(&mut registry);
    registry
}
