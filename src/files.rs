pub mod prefetch;
pub mod source;
