pub mod local;

pub use local::LocalVectorIndex;
