// Pipeline processing: normalization, projection, and ranking

pub mod normalize;
pub mod project;
pub mod rank;
