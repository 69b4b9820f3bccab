//! Named per-pixel parameter maps.

use burn::tensor::backend::Backend;
use mdreg_core::Image;

/// One image per model parameter, in the model's parameter order.
#[derive(Debug, Clone)]
pub struct ParameterMap<B: Backend, const D: usize> {
    names: Vec<String>,
    maps: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> ParameterMap<B, D> {
    pub fn new(names: Vec<String>, maps: Vec<Image<B, D>>) -> Self {
        Self { names, maps }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn maps(&self) -> &[Image<B, D>] {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Map of the parameter called `name`.
    pub fn get(&self, name: &str) -> Option<&Image<B, D>> {
        self.names.iter().position(|n| n == name).map(|i| &self.maps[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Image<B, D>)> {
        self.names.iter().map(String::as_str).zip(self.maps.iter())
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Image<B, D>>) {
        (self.names, self.maps)
    }
}
