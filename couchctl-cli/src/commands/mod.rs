//! CLI Commands

pub mod bucket;
pub mod nodes;
pub mod quota;
pub mod remove;
pub mod wait;
