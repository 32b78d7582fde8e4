use nalgebra::DVector;

/// State of the evaluation point currently being assembled.
///
/// Owned and written by the assembly loop only. Functionals read it through the point views in
/// [`crate::functional`], which cannot outlive a single `evaluate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyContext {
    pub time: f64,
    /// Coefficient of the time derivative in the Jacobian of an implicit scheme.
    pub time_shift: f64,
    pub element: usize,
    pub qp: usize,
    pub xyz: DVector<f64>,
    /// Outward unit normal. Only meaningful while assembling boundary terms.
    pub normal: DVector<f64>,
}

impl AssemblyContext {
    pub fn new(dim: usize) -> Self {
        Self {
            time: 0.0,
            time_shift: 0.0,
            element: 0,
            qp: 0,
            xyz: DVector::zeros(dim),
            normal: DVector::zeros(dim),
        }
    }

    pub fn spatial_dimension(&self) -> usize {
        self.xyz.len()
    }
}
