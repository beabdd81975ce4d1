//! Registry and custom transform tests
//!
//! Run with:
//! ```bash
//! cargo test -p soundfeat --test registry_integration
//! ```

mod helpers;

use soundfeat::core::{ElementKernel, Error as CoreError, Kernel};
use soundfeat::prelude::*;
use soundfeat::Error;

const BUILTIN: [&str; 14] = [
    "Autocorrelation",
    "Beat",
    "Diff",
    "Energy",
    "FilterBank",
    "Int16ToFloat",
    "Intensity",
    "Magnitude",
    "Mean",
    "RDFT",
    "RDFTInverse",
    "SubbandEnergy",
    "Window",
    "ZeroPadding",
];

/// Test that every built-in transform is registered and described.
#[test]
fn test_builtin_transforms() {
    let registry = soundfeat::transforms::registry();
    assert_eq!(registry.len(), BUILTIN.len());
    assert_eq!(registry.list_types(), BUILTIN.to_vec());

    for name in BUILTIN {
        let info = registry.describe(name).unwrap();
        assert_eq!(info.name, name);
        assert!(!info.description.is_empty());
        let text = info.to_string();
        assert!(text.starts_with(name));
        for parameter in info.parameters {
            assert!(text.contains(parameter.name));
        }
    }

    assert!(!registry.describe("Window").unwrap().parallel);
    assert!(registry.describe("RDFT").unwrap().parallel);
    assert!(matches!(
        registry.describe("Cepstrum"),
        Err(CoreError::UnknownTransform(_))
    ));
}

/// Test that parameters are checked when a transform is created.
#[test]
fn test_create_rejects_bad_parameters() {
    let registry = soundfeat::transforms::registry();

    assert!(registry.create("Window", &params! { "length" => 400 }).is_ok());
    assert!(matches!(
        registry.create("Window", &params! { "size" => 400 }),
        Err(CoreError::UnknownParameter { .. })
    ));
    assert!(matches!(
        registry.create("Window", &params! { "type" => "kaiser" }),
        Err(CoreError::InvalidParameter { .. })
    ));
    assert!(matches!(
        registry.create("FilterBank", &params! { "number" => 0 }),
        Err(CoreError::InvalidParameter { .. })
    ));
}

/// Halves every sample.
#[derive(Debug, Clone, Default)]
struct Halve;

impl Kernel for Halve {
    type Input = ArrayFormat<f32>;
    type Output = ArrayFormat<f32>;

    const NAME: &'static str = "Halve";
    const DESCRIPTION: &'static str = "Multiplies every sample by 0.5.";

    fn on_input_format_changed(
        &mut self,
        input: &ArrayFormat<f32>,
        output: &mut ArrayFormat<f32>,
        count: usize,
    ) -> soundfeat::core::Result<usize> {
        output.set_size(input.size());
        Ok(count)
    }
}

impl ElementKernel for Halve {
    fn process_element(&self, input: &Vec<f32>, output: &mut Vec<f32>) {
        for (o, i) in output.iter_mut().zip(input) {
            *o = i * 0.5;
        }
    }
}

/// Test that a user transform runs next to the built-in ones.
#[test]
fn test_custom_transform() {
    let mut registry = soundfeat::transforms::registry();
    registry.register_element::<Halve>();
    assert!(registry.has_type("Halve"));

    let extractor = FeatureExtractor::builder()
        .buffer_size(8)
        .feature("half", [("Int16ToFloat", params! {}), ("Halve", params! {})])
        .registry(registry)
        .build()
        .unwrap();

    let features = extractor.extract(&[[2i16, 4, 6, 8, -2, -4, -6, -8]]).unwrap();
    let half = features.get::<ArrayFormat<f32>>("half").unwrap();
    assert_eq!(half[0], vec![1.0, 2.0, 3.0, 4.0, -1.0, -2.0, -3.0, -4.0]);
}

/// Test that a custom registry without the transform reports it.
#[test]
fn test_empty_registry() {
    let result = FeatureExtractor::builder()
        .buffer_size(8)
        .feature("signal", [("Int16ToFloat", params! {})])
        .registry(TransformRegistry::new())
        .build();
    assert!(matches!(result, Err(Error::Core(CoreError::UnknownTransform(_)))));
}
