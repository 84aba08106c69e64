//! Shape of the per-pixel tensor (vector or matrix) an image stores.

/// Layout of the tensor elements of one pixel.
///
/// Matrix variants with redundant elements (diagonal, symmetric, triangular)
/// store only the distinct ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TensorShape {
    #[default]
    Scalar,
    ColumnVector(usize),
    RowVector(usize),
    ColumnMajorMatrix { rows: usize, columns: usize },
    RowMajorMatrix { rows: usize, columns: usize },
    DiagonalMatrix(usize),
    SymmetricMatrix(usize),
    UpperTriangular(usize),
    LowerTriangular(usize),
}

impl TensorShape {
    /// Column vector for `n > 1`, scalar otherwise.
    pub fn vector(n: usize) -> Self {
        if n <= 1 {
            TensorShape::Scalar
        } else {
            TensorShape::ColumnVector(n)
        }
    }

    /// Number of stored elements per pixel.
    pub fn elements(&self) -> usize {
        match *self {
            TensorShape::Scalar => 1,
            TensorShape::ColumnVector(n) | TensorShape::RowVector(n) => n,
            TensorShape::ColumnMajorMatrix { rows, columns }
            | TensorShape::RowMajorMatrix { rows, columns } => rows * columns,
            TensorShape::DiagonalMatrix(n) => n,
            TensorShape::SymmetricMatrix(n)
            | TensorShape::UpperTriangular(n)
            | TensorShape::LowerTriangular(n) => n * (n + 1) / 2,
        }
    }

    pub fn rows(&self) -> usize {
        match *self {
            TensorShape::Scalar | TensorShape::RowVector(_) => 1,
            TensorShape::ColumnVector(n) => n,
            TensorShape::ColumnMajorMatrix { rows, .. } | TensorShape::RowMajorMatrix { rows, .. } => {
                rows
            }
            TensorShape::DiagonalMatrix(n)
            | TensorShape::SymmetricMatrix(n)
            | TensorShape::UpperTriangular(n)
            | TensorShape::LowerTriangular(n) => n,
        }
    }

    pub fn columns(&self) -> usize {
        match *self {
            TensorShape::Scalar | TensorShape::ColumnVector(_) => 1,
            TensorShape::RowVector(n) => n,
            TensorShape::ColumnMajorMatrix { columns, .. }
            | TensorShape::RowMajorMatrix { columns, .. } => columns,
            TensorShape::DiagonalMatrix(n)
            | TensorShape::SymmetricMatrix(n)
            | TensorShape::UpperTriangular(n)
            | TensorShape::LowerTriangular(n) => n,
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.elements() == 1
    }
}
