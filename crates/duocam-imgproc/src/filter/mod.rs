mod kernels;
pub use kernels::*;

mod ops;
pub use ops::*;
