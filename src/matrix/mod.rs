// Matrix data structures and operations

pub mod config;
pub mod csr;
pub mod distributed;
pub mod partition;
pub mod transform;
pub mod validation;

use std::fmt::Debug;
use std::ops::{AddAssign, DivAssign, MulAssign, SubAssign};

use num_traits::Float;

pub use config::{EngineConfig, MiniWarpThresholds, SystemParameters};
pub use csr::SparseMatrixCSR;
pub use distributed::{DistributedCSR, PrintPart};
pub use partition::{gather_matrix, split, split_with, RowPartition};
pub use transform::{
    absolute_row_sum, diag, dismember, ilu0, ilu0_transposed, matrix_vector_scaling, merge_diagonal,
    shift_cols, to_dense, Dismembered,
};
pub use validation::{check_columns_order, check_matching, check_matrix};

/// Value type of every matrix and vector in the engine
pub trait Scalar:
    Float + AddAssign + SubAssign + MulAssign + DivAssign + Default + Send + Sync + Debug + 'static
{
}

impl<T> Scalar for T where
    T: Float + AddAssign + SubAssign + MulAssign + DivAssign + Default + Send + Sync + Debug + 'static
{
}
