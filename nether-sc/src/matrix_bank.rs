//! Indexed storage of transforms referenced by movie clip frames

use crate::error::{Result, ScError};
use crate::math::{ColorTransform, Matrix2x3};

/// Largest number of matrices or color transforms one bank can address
pub const MAX_BANK_CAPACITY: usize = 0xFFFF;

/// Matrices plus color transforms, pre-sized when a bank is declared
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatrixBank {
    matrices: Vec<Matrix2x3>,
    color_transforms: Vec<ColorTransform>,
}

impl MatrixBank {
    /// Create a bank filled with identity matrices and no-op color transforms
    pub fn new(matrix_count: usize, color_transform_count: usize) -> Result<Self> {
        if matrix_count > MAX_BANK_CAPACITY {
            return Err(ScError::TooManyObjects { kind: "matrices" });
        }
        if color_transform_count > MAX_BANK_CAPACITY {
            return Err(ScError::TooManyObjects {
                kind: "color transforms",
            });
        }
        Ok(Self {
            matrices: vec![Matrix2x3::default(); matrix_count],
            color_transforms: vec![ColorTransform::default(); color_transform_count],
        })
    }

    pub fn matrix_count(&self) -> usize {
        self.matrices.len()
    }

    pub fn color_transform_count(&self) -> usize {
        self.color_transforms.len()
    }

    pub fn matrices(&self) -> &[Matrix2x3] {
        &self.matrices
    }

    pub fn color_transforms(&self) -> &[ColorTransform] {
        &self.color_transforms
    }

    pub fn matrix(&self, index: usize) -> Option<&Matrix2x3> {
        self.matrices.get(index)
    }

    pub fn color_transform(&self, index: usize) -> Option<&ColorTransform> {
        self.color_transforms.get(index)
    }

    pub fn set_matrix(&mut self, index: usize, matrix: Matrix2x3) -> Result<()> {
        let count = self.matrices.len();
        let slot = self
            .matrices
            .get_mut(index)
            .ok_or(ScError::MatrixIndexOutOfRange { index, count })?;
        *slot = matrix;
        Ok(())
    }

    pub fn set_color_transform(&mut self, index: usize, transform: ColorTransform) -> Result<()> {
        let count = self.color_transforms.len();
        let slot = self
            .color_transforms
            .get_mut(index)
            .ok_or(ScError::MatrixIndexOutOfRange { index, count })?;
        *slot = transform;
        Ok(())
    }

    /// Append a matrix, returning its index
    pub fn push_matrix(&mut self, matrix: Matrix2x3) -> Result<usize> {
        if self.matrices.len() >= MAX_BANK_CAPACITY {
            return Err(ScError::TooManyObjects { kind: "matrices" });
        }
        self.matrices.push(matrix);
        Ok(self.matrices.len() - 1)
    }

    /// Append a color transform, returning its index
    pub fn push_color_transform(&mut self, transform: ColorTransform) -> Result<usize> {
        if self.color_transforms.len() >= MAX_BANK_CAPACITY {
            return Err(ScError::TooManyObjects {
                kind: "color transforms",
            });
        }
        self.color_transforms.push(transform);
        Ok(self.color_transforms.len() - 1)
    }
}
