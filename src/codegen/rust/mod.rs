//! Rust code generator
//!
//! Generates a serde record struct and typed DAO functions that call into
//! the `dao` runtime.

use std::collections::HashSet;
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};

use heck::{ToSnakeCase, ToUpperCamelCase};
use minijinja::Environment;
use tracing::{debug, trace};

use crate::codegen::{CodeGenConfig, CodeGenerator, Emit};
use crate::dao::CommitPolicy;
use crate::error::ForgeError;
use crate::schema::{DataType, GenerationUnit};

/// Environment variable overriding the rustfmt binary
pub const RUSTFMT_ENV: &str = "DAOFORGE_RUSTFMT";

/// Rust code generator
pub struct RustGenerator {
    env: Environment<'static>,
}

impl RustGenerator {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.add_filter("rust_str", rust_str);

        // Register templates
        env.add_template("header", include_str!("templates/header.rs.jinja"))
            .expect("Failed to load header template");
        env.add_template("struct", include_str!("templates/struct.rs.jinja"))
            .expect("Failed to load struct template");
        env.add_template("dao", include_str!("templates/dao.rs.jinja"))
            .expect("Failed to load dao template");

        Self { env }
    }
}

impl Default for RustGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator for RustGenerator {
    fn render_struct(
        &self,
        unit: &GenerationUnit,
        config: &CodeGenConfig,
    ) -> Result<String, ForgeError> {
        let code = self.render_template("struct", unit, config)?;
        validate(unit, &code)?;
        Ok(code)
    }

    fn render_dao(
        &self,
        unit: &GenerationUnit,
        config: &CodeGenConfig,
    ) -> Result<String, ForgeError> {
        let code = self.render_template("dao", unit, config)?;
        validate(unit, &code)?;
        Ok(code)
    }

    fn render(&self, unit: &GenerationUnit, config: &CodeGenConfig) -> Result<String, ForgeError> {
        let mut code = self.render_template("header", unit, config)?;
        code.push_str(&self.render_struct(unit, config)?);
        if config.emit == Emit::Dao {
            code.push_str(&self.render_dao(unit, config)?);
        }
        validate(unit, &code)?;

        if config.rustfmt {
            code = rustfmt(unit, &code)?;
        }

        debug!(table = ?unit.table_name, bytes = code.len(), "Rendered Rust source");
        Ok(code)
    }
}

impl RustGenerator {
    fn render_template(
        &self,
        name: &str,
        unit: &GenerationUnit,
        config: &CodeGenConfig,
    ) -> Result<String, ForgeError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| ForgeError::CodeGen {
                table: unit.table_name.clone(),
                message: format!("Template error: {}", e),
            })?;

        template
            .render(build_unit_context(unit, config))
            .map_err(|e| ForgeError::CodeGen {
                table: unit.table_name.clone(),
                message: format!("Render error: {}", e),
            })
    }
}

/// Build template context for a unit
fn build_unit_context(unit: &GenerationUnit, config: &CodeGenConfig) -> minijinja::Value {
    let mut taken = HashSet::new();
    let names: Vec<String> = unit
        .fields
        .iter()
        .map(|field| unique_ident(field_ident(&field.identifier), &mut taken))
        .collect();

    let fields: Vec<_> = unit
        .fields
        .iter()
        .zip(&names)
        .map(|(field, name)| {
            trace!(column = ?field.serialization_tag, field = ?name, "Field name");
            minijinja::context! {
                name => name,
                ty => field_type(&field.language_type, field.nullable),
                tag => &field.serialization_tag,
                comment => doc_line(&field.comment),
            }
        })
        .collect();

    let identity = unit
        .identity_field()
        .and_then(|id| unit.fields.iter().position(|f| std::ptr::eq(f, id)))
        .map(|index| {
            let field = &unit.fields[index];
            identity_expr(&field.language_type, &names[index], field.nullable)
        })
        .unwrap_or_else(|| "None".to_string());

    let op = |verb: &str| {
        let label = unit.operation_name(verb);
        minijinja::context! {
            name => fn_ident(&label),
            label => label,
        }
    };

    minijinja::context! {
        table_name => &unit.table_name,
        struct_name => &unit.struct_name,
        type_name => type_ident(&unit.struct_name),
        runtime => &config.runtime_path,
        with_dao => config.emit == Emit::Dao,
        fields => fields,
        identity => identity,
        commit_policy => match config.commit_policy {
            CommitPolicy::Lenient => "Lenient",
            CommitPolicy::Strict => "Strict",
        },
        ops => minijinja::context! {
            get_one => op("GetOne"),
            get_multi => op("GetMulti"),
            insert => op("Insert"),
            update => op("Update"),
            delete => op("Delete"),
            upsert => op("Upsert"),
        },
    }
}

/// Convert DataType to Rust type string
fn rust_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::TinyInt { unsigned: false } => "i8",
        DataType::TinyInt { unsigned: true } => "u8",
        DataType::SmallInt { unsigned: false } => "i16",
        DataType::SmallInt { unsigned: true } => "u16",
        DataType::Integer { unsigned: false } => "i32",
        DataType::Integer { unsigned: true } => "u32",
        DataType::BigInt { unsigned: false } => "i64",
        DataType::BigInt { unsigned: true } => "u64",
        DataType::Float => "f32",
        DataType::Double | DataType::Decimal => "f64",
        DataType::Text => "String",
        DataType::Boolean => "bool",
        DataType::Date => "chrono::NaiveDate",
        DataType::DateTime => "chrono::NaiveDateTime",
        DataType::Time => "chrono::NaiveTime",
        DataType::Year => "u16",
    }
}

/// Field type; NULL-able columns become `Option`
fn field_type(data_type: &DataType, nullable: bool) -> String {
    let ty = rust_type(data_type);
    if nullable {
        format!("Option<{}>", ty)
    } else {
        ty.to_string()
    }
}

/// Expression converting an integer identity field to `Option<i64>`
fn identity_expr(data_type: &DataType, field: &str, nullable: bool) -> String {
    match (data_type, nullable) {
        (DataType::BigInt { unsigned: false }, false) => format!("Some(self.{})", field),
        (DataType::BigInt { unsigned: false }, true) => format!("self.{}", field),
        (DataType::BigInt { unsigned: true }, false) => {
            format!("i64::try_from(self.{}).ok()", field)
        }
        (DataType::BigInt { unsigned: true }, true) => {
            format!("self.{}.and_then(|v| i64::try_from(v).ok())", field)
        }
        (_, false) => format!("Some(i64::from(self.{}))", field),
        (_, true) => format!("self.{}.map(i64::from)", field),
    }
}

fn field_ident(identifier: &str) -> String {
    rust_ident(identifier.to_snake_case(), "field")
}

fn fn_ident(label: &str) -> String {
    rust_ident(label.to_snake_case(), "op")
}

/// Struct identifier; the normalized name is used as is when it is valid Rust
fn type_ident(struct_name: &str) -> String {
    if is_plain_ident(struct_name) {
        struct_name.to_string()
    } else {
        rust_ident(struct_name.to_upper_camel_case(), "Table")
    }
}

/// Turn `candidate` into a usable identifier
///
/// Keywords become raw identifiers; names that cannot be raw get a
/// trailing underscore; a leading digit gets `prefix` in front.
fn rust_ident(candidate: String, prefix: &str) -> String {
    let mut name: String = candidate
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() {
        return prefix.to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name = format!("{}_{}", prefix, name);
    }
    if is_plain_ident(&name) {
        return name;
    }
    if matches!(name.as_str(), "_" | "self" | "Self" | "super" | "crate") {
        return format!("{}_", name);
    }

    let raw = format!("r#{}", name);
    if syn::parse_str::<syn::Ident>(&raw).is_ok() {
        raw
    } else {
        format!("{}_", name)
    }
}

fn is_plain_ident(name: &str) -> bool {
    syn::parse_str::<syn::Ident>(name).is_ok()
}

fn unique_ident(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", name.trim_start_matches("r#"), n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Single-line doc text
fn doc_line(comment: &str) -> String {
    comment.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Render a value as a Rust string literal
fn rust_str(value: String) -> String {
    format!("{:?}", value)
}

/// Fail unless `code` parses as a Rust source file
fn validate(unit: &GenerationUnit, code: &str) -> Result<(), ForgeError> {
    syn::parse_file(code).map_err(|e| ForgeError::CodeGen {
        table: unit.table_name.clone(),
        message: format!("Generated code does not parse: {}", e),
    })?;
    Ok(())
}

/// Format `code` with rustfmt over stdin/stdout
fn rustfmt(unit: &GenerationUnit, code: &str) -> Result<String, ForgeError> {
    let bin = env::var(RUSTFMT_ENV).unwrap_or_else(|_| "rustfmt".to_string());
    let codegen_error = |message: String| ForgeError::CodeGen {
        table: unit.table_name.clone(),
        message,
    };

    let mut child = Command::new(&bin)
        .args(["--edition", "2021"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| codegen_error(format!("Failed to run {}: {}", bin, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(code.as_bytes())
            .map_err(|e| codegen_error(format!("Failed to feed {}: {}", bin, e)))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| codegen_error(format!("Failed to run {}: {}", bin, e)))?;
    if !output.status.success() {
        return Err(codegen_error(format!(
            "{} failed: {}",
            bin,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| codegen_error(format!("{} produced invalid UTF-8: {}", bin, e)))
}
