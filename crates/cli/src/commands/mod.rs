//! CLI Commands

pub mod lint;
pub mod report;
pub mod runs;
pub mod scripts;
pub mod srs;
pub mod testcases;
