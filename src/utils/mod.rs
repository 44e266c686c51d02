pub mod command;
pub mod fallback;
pub mod fastx;
pub mod file;
pub mod metadata;
pub mod sequence;
pub mod task;
