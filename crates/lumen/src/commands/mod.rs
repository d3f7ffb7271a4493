//! CLI command implementations.

pub(crate) mod run;

pub(crate) use run::RunArgs;
