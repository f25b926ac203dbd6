pub mod filter;
pub mod trip;
