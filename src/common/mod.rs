pub mod dyn_tracing;
