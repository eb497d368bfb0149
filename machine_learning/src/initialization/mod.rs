mod random;
mod unk_cache;

pub use random::ParamInit;
pub use unk_cache::UnkVecCache;
