pub mod extract;
pub mod render;
pub mod run;
pub mod stats;
