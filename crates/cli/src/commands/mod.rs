//! CLI subcommands

pub mod budgets;
pub mod run;
