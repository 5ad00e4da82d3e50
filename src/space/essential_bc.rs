use crate::mesh::Marker;
use nalgebra::{Point2, Scalar};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A prescribed value of the solution on part of the boundary.
#[derive(Clone)]
pub enum EssentialBoundaryCondition<T> {
    Constant(T),
    Function(Arc<dyn Fn(&Point2<f64>) -> T + Send + Sync>),
}

impl<T: Scalar> EssentialBoundaryCondition<T> {
    pub fn constant(value: T) -> Self {
        Self::Constant(value)
    }

    pub fn function(f: impl Fn(&Point2<f64>) -> T + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }

    pub fn value(&self, x: &Point2<f64>) -> T {
        match self {
            Self::Constant(value) => value.clone(),
            Self::Function(f) => f(x),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }
}

impl<T: fmt::Debug> fmt::Debug for EssentialBoundaryCondition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Essential boundary conditions keyed by boundary marker.
///
/// Markers without a condition are natural boundaries.
#[derive(Debug, Clone)]
pub struct EssentialBcs<T> {
    conditions: Vec<EssentialBoundaryCondition<T>>,
    by_marker: FxHashMap<Marker, usize>,
}

impl<T> Default for EssentialBcs<T> {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
            by_marker: FxHashMap::default(),
        }
    }
}

impl<T: Scalar> EssentialBcs<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a single condition on the given markers.
    pub fn single(markers: &[Marker], condition: EssentialBoundaryCondition<T>) -> Self {
        let mut bcs = Self::new();
        bcs.add(markers, condition);
        bcs
    }

    /// Adds a condition applying to all given markers.
    ///
    /// # Panics
    ///
    /// Panics if a marker already has a condition.
    pub fn add(&mut self, markers: &[Marker], condition: EssentialBoundaryCondition<T>) -> &mut Self {
        let index = self.conditions.len();
        self.conditions.push(condition);
        for &marker in markers {
            let previous = self.by_marker.insert(marker, index);
            assert!(
                previous.is_none(),
                "boundary marker {marker} already has an essential condition"
            );
        }
        self
    }

    pub fn get_boundary_condition(&self, marker: Marker) -> Option<&EssentialBoundaryCondition<T>> {
        self.by_marker
            .get(&marker)
            .map(|&index| &self.conditions[index])
    }

    pub fn is_essential(&self, marker: Marker) -> bool {
        self.by_marker.contains_key(&marker)
    }

    /// All markers with a condition, sorted.
    pub fn markers(&self) -> Vec<Marker> {
        let mut markers: Vec<_> = self.by_marker.keys().copied().collect();
        markers.sort_unstable();
        markers
    }

    pub fn is_empty(&self) -> bool {
        self.by_marker.is_empty()
    }
}
