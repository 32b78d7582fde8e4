use nalgebra::DMatrix;

/// Basis values and physical gradients of one finite element at the current point.
#[derive(Debug, Clone)]
pub struct BasisFunctionBuffer {
    pub values: Vec<f64>,
    /// `dim x num_nodes`
    pub gradients: DMatrix<f64>,
}

impl BasisFunctionBuffer {
    pub fn new(dim: usize, num_nodes: usize) -> Self {
        Self {
            values: vec![0.0; num_nodes],
            gradients: DMatrix::zeros(dim, num_nodes),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.values.len()
    }
}

/// Pointwise outputs of the functionals in one weak-form slot, summed over the functionals.
#[derive(Debug, Clone, Default)]
pub struct SlotBuffer {
    /// Sum over all functionals in the slot.
    pub total: Vec<f64>,
    /// Output of a single functional, zeroed before each call.
    pub scratch: Vec<f64>,
}

impl SlotBuffer {
    pub fn reset(&mut self, len: usize) {
        self.total.clear();
        self.total.resize(len, 0.0);
        self.scratch.resize(len, 0.0);
    }

    /// Zeroes the scratch buffer and hands it out for one functional evaluation.
    pub fn scratch(&mut self) -> &mut [f64] {
        self.scratch.fill(0.0);
        &mut self.scratch
    }

    pub fn accumulate_scratch(&mut self, scale: f64) {
        for (total, value) in self.total.iter_mut().zip(&self.scratch) {
            *total += scale * value;
        }
    }
}
