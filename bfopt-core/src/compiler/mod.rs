pub mod analysis;
pub mod cfg;
pub mod dump;
pub mod error;
pub mod ir;
pub mod linearize;
pub mod optimizer;
pub mod syntax;

pub use cfg::compile;
pub use error::CompileError;
