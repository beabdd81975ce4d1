//! Results of a pipeline run.

use crate::buffers::{AnyBuffers, Buffers};
use crate::format::Format;
use std::collections::BTreeMap;
use std::fmt;

/// Named result buffers.
///
/// Several names may point at the same buffers when their feature chains end
/// at the same stage.
#[derive(Default)]
pub struct Features {
    buffers: Vec<Box<dyn AnyBuffers>>,
    names: BTreeMap<String, usize>,
}

impl Features {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store `buffers` under every name in `names`.
    pub(crate) fn insert(&mut self, names: &[String], buffers: Box<dyn AnyBuffers>) {
        let index = self.buffers.len();
        self.buffers.push(buffers);
        for name in names {
            self.names.insert(name.clone(), index);
        }
    }

    /// Typed access; `None` if the name is unknown or `F` is not its format.
    pub fn get<F: Format>(&self, name: &str) -> Option<&Buffers<F>> {
        self.get_any(name)?.downcast_ref::<F>()
    }

    pub fn get_any(&self, name: &str) -> Option<&dyn AnyBuffers> {
        self.names
            .get(name)
            .map(|&index| self.buffers[index].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Feature names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn AnyBuffers)> + '_ {
        self.names
            .iter()
            .map(|(name, &index)| (name.as_str(), self.buffers[index].as_ref()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Debug for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{ArrayFormat, SingleFormat};
    use std::sync::Arc;

    #[test]
    fn test_typed_access() {
        let format = Arc::new(SingleFormat::<f32>::new());
        let buffers = Buffers::from_elements(format, vec![0.25, 0.5]);

        let mut features = Features::new();
        features.insert(&["intensity".to_string(), "loudness".to_string()], Box::new(buffers));

        assert_eq!(features.len(), 2);
        assert_eq!(features.names().collect::<Vec<_>>(), vec!["intensity", "loudness"]);

        let intensity = features.get::<SingleFormat<f32>>("intensity").unwrap();
        assert_eq!(intensity[1], 0.5);
        assert!(features.get::<ArrayFormat<f32>>("intensity").is_none());
        assert!(features.get::<SingleFormat<f32>>("missing").is_none());
        assert_eq!(features.get_any("loudness").unwrap().count(), 2);
    }
}
