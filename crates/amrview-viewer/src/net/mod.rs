pub mod reader;

pub use reader::{spawn_reader, LinkPlan};
