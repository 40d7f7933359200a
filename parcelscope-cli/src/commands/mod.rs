pub mod batch;
pub mod common;
pub mod compile;
pub mod decode;
pub mod info;
