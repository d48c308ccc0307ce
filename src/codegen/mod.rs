//! Code generation
//!
//! This module turns a [`GenerationUnit`] into source text and drives the
//! read → map → emit pipeline.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::dao::{CommitPolicy, Context};
use crate::introspect::Introspector;
use crate::prelude::{ForgeError, GenerationUnit, UnmappedPolicy};

pub mod rust;

pub use rust::{RustGenerator, RUSTFMT_ENV};

/// What to emit for a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Emit {
    /// Record struct only
    Struct,
    /// Record struct and the DAO layer
    #[default]
    Dao,
}

/// Configuration for code generation
#[derive(Debug, Clone)]
pub struct CodeGenConfig {
    /// Output file; stdout when `None`
    pub output_path: Option<PathBuf>,
    pub emit: Emit,
    /// Path of this crate as seen from the generated code
    pub runtime_path: String,
    /// Commit policy baked into the generated upsert
    pub commit_policy: CommitPolicy,
    pub unmapped_policy: UnmappedPolicy,
    /// Pipe the result through rustfmt
    pub rustfmt: bool,
}

impl Default for CodeGenConfig {
    fn default() -> Self {
        Self {
            output_path: None,
            emit: Emit::default(),
            runtime_path: "daoforge".to_string(),
            commit_policy: CommitPolicy::default(),
            unmapped_policy: UnmappedPolicy::default(),
            rustfmt: false,
        }
    }
}

impl CodeGenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_path(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    pub fn with_emit(mut self, emit: Emit) -> Self {
        self.emit = emit;
        self
    }

    pub fn with_runtime_path(mut self, path: &str) -> Self {
        self.runtime_path = path.to_string();
        self
    }

    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    pub fn with_unmapped_policy(mut self, policy: UnmappedPolicy) -> Self {
        self.unmapped_policy = policy;
        self
    }

    pub fn with_rustfmt(mut self, rustfmt: bool) -> Self {
        self.rustfmt = rustfmt;
        self
    }
}

/// Trait for language-specific code generators
pub trait CodeGenerator {
    /// Render the record type for `unit`
    fn render_struct(&self, unit: &GenerationUnit, config: &CodeGenConfig)
        -> Result<String, ForgeError>;

    /// Render the DAO operations for `unit`
    fn render_dao(&self, unit: &GenerationUnit, config: &CodeGenConfig)
        -> Result<String, ForgeError>;

    /// Render one complete source unit as selected by `config.emit`
    fn render(&self, unit: &GenerationUnit, config: &CodeGenConfig) -> Result<String, ForgeError>;
}

/// Read `schema_name.table_name`, map it and render it
pub fn generate<I, G>(
    introspector: &mut I,
    generator: &G,
    ctx: &Context,
    schema_name: &str,
    table_name: &str,
    config: &CodeGenConfig,
) -> Result<String, ForgeError>
where
    I: Introspector + ?Sized,
    G: CodeGenerator + ?Sized,
{
    let columns = introspector.read_columns(ctx, schema_name, table_name)?;
    let unit = GenerationUnit::build(table_name, &columns, config.unmapped_policy)?;

    if !unit.skipped.is_empty() {
        warn!(
            table = ?table_name,
            skipped = ?unit.skipped.iter().map(|c| &c.name).collect::<Vec<_>>(),
            "Columns with unknown types were left out"
        );
    }
    debug!(
        table = ?table_name,
        struct_name = ?unit.struct_name,
        fields = ?unit.fields.len(),
        "Generation unit ready"
    );

    let code = generator.render(&unit, config)?;
    info!(table = ?table_name, emit = ?config.emit, "Code generation complete");
    Ok(code)
}
