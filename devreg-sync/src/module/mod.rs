pub mod openfda;
pub mod store;
pub mod export;
pub mod pipeline;
