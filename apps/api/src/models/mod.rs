pub mod call;
pub mod candidate;
