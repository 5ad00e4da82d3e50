use crate::mesh::Marker;
use serde::{Deserialize, Serialize};

/// Where a form is integrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormKind {
    Volume,
    /// Boundary edges only.
    Surface,
    /// Interior edges, coupling the two elements adjacent to the edge.
    Dg,
}

/// The part of the domain a form is restricted to: element markers for volume forms and
/// boundary markers for surface forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Areas {
    Any,
    Markers(Vec<Marker>),
}

impl Areas {
    pub fn contains(&self, marker: Marker) -> bool {
        match self {
            Areas::Any => true,
            Areas::Markers(markers) => markers.contains(&marker),
        }
    }

    pub fn is_everywhere(&self) -> bool {
        matches!(self, Areas::Any)
    }
}

impl Default for Areas {
    fn default() -> Self {
        Areas::Any
    }
}

/// Declaration of a bilinear form contributing to block `(i, j)` of the system matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixForm {
    pub i: usize,
    pub j: usize,
    pub kind: FormKind,
    pub areas: Areas,
    /// Also contributes to block `(j, i)`.
    pub symmetric: bool,
    pub scaling_factor: f64,
}

impl MatrixForm {
    pub fn new(i: usize, j: usize, kind: FormKind) -> Self {
        Self {
            i,
            j,
            kind,
            areas: Areas::Any,
            symmetric: false,
            scaling_factor: 1.0,
        }
    }

    pub fn volume(i: usize, j: usize) -> Self {
        Self::new(i, j, FormKind::Volume)
    }

    pub fn surface(i: usize, j: usize) -> Self {
        Self::new(i, j, FormKind::Surface)
    }

    pub fn dg(i: usize, j: usize) -> Self {
        Self::new(i, j, FormKind::Dg)
    }

    pub fn with_areas(mut self, areas: Areas) -> Self {
        self.areas = areas;
        self
    }

    pub fn with_scaling_factor(mut self, scaling_factor: f64) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }

    pub fn symmetric(mut self) -> Self {
        self.symmetric = true;
        self
    }
}

/// Declaration of a linear form contributing to block `i` of the right-hand side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorForm {
    pub i: usize,
    pub kind: FormKind,
    pub areas: Areas,
    pub scaling_factor: f64,
}

impl VectorForm {
    pub fn new(i: usize, kind: FormKind) -> Self {
        Self {
            i,
            kind,
            areas: Areas::Any,
            scaling_factor: 1.0,
        }
    }

    pub fn volume(i: usize) -> Self {
        Self::new(i, FormKind::Volume)
    }

    pub fn surface(i: usize) -> Self {
        Self::new(i, FormKind::Surface)
    }

    pub fn dg(i: usize) -> Self {
        Self::new(i, FormKind::Dg)
    }

    pub fn with_areas(mut self, areas: Areas) -> Self {
        self.areas = areas;
        self
    }

    pub fn with_scaling_factor(mut self, scaling_factor: f64) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }
}

/// Scaling factors below this magnitude disable a form.
pub(crate) const NEGLIGIBLE_SCALING: f64 = 1e-12;

/// The structure of a weak formulation with `neq` equations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeakForm {
    neq: usize,
    matrix_forms: Vec<MatrixForm>,
    vector_forms: Vec<VectorForm>,
}

impl WeakForm {
    pub fn new(neq: usize) -> Self {
        Self {
            neq,
            matrix_forms: Vec::new(),
            vector_forms: Vec::new(),
        }
    }

    /// # Panics
    ///
    /// Panics if the form refers to an equation that does not exist.
    pub fn add_matrix_form(&mut self, form: MatrixForm) -> &mut Self {
        assert!(
            form.i < self.neq && form.j < self.neq,
            "matrix form ({}, {}) is out of range for {} equations",
            form.i,
            form.j,
            self.neq
        );
        self.matrix_forms.push(form);
        self
    }

    /// # Panics
    ///
    /// Panics if the form refers to an equation that does not exist.
    pub fn add_vector_form(&mut self, form: VectorForm) -> &mut Self {
        assert!(
            form.i < self.neq,
            "vector form {} is out of range for {} equations",
            form.i,
            self.neq
        );
        self.vector_forms.push(form);
        self
    }

    pub fn neq(&self) -> usize {
        self.neq
    }

    pub fn matrix_forms(&self) -> &[MatrixForm] {
        &self.matrix_forms
    }

    pub fn vector_forms(&self) -> &[VectorForm] {
        &self.vector_forms
    }

    /// Whether any form couples neighboring elements.
    pub fn is_dg(&self) -> bool {
        self.matrix_forms.iter().any(|form| form.kind == FormKind::Dg)
            || self.vector_forms.iter().any(|form| form.kind == FormKind::Dg)
    }

    /// Row-major `neq x neq` table of the matrix blocks with at least one non-vanishing form.
    ///
    /// With `force_diagonal`, all diagonal blocks are included regardless.
    pub fn blocks(&self, force_diagonal: bool) -> Vec<bool> {
        let n = self.neq;
        let mut blocks = vec![false; n * n];
        for form in &self.matrix_forms {
            if form.scaling_factor.abs() < NEGLIGIBLE_SCALING {
                continue;
            }
            blocks[form.i * n + form.j] = true;
            if form.symmetric {
                blocks[form.j * n + form.i] = true;
            }
        }
        if force_diagonal {
            for i in 0..n {
                blocks[i * n + i] = true;
            }
        }
        blocks
    }
}
