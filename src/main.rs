use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

use daoforge::codegen::{CodeGenConfig, Emit};
use daoforge::config::DbConfig;
use daoforge::dao::{CommitPolicy, Context};
use daoforge::schema::UnmappedPolicy;

#[derive(Parser, Debug)]
#[command(name = "daoforge")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the record struct for a table
    Table(GenerateArgs),
    /// Generate the record struct and its DAO functions
    Dao(GenerateArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Table to generate code for
    #[arg(short, long)]
    table: String,

    /// Database (schema) holding the table; defaults to DB_NAME
    #[arg(short, long)]
    database: Option<String>,

    /// Path to .env file for connection config
    #[arg(long, default_value = "./.env")]
    env_file: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path of the daoforge crate as seen from the generated code
    #[arg(long, default_value = "daoforge")]
    runtime_path: String,

    /// Fail on columns whose type has no mapping instead of skipping them
    #[arg(long)]
    strict_types: bool,

    /// Make the generated upsert report commit failures
    #[arg(long)]
    strict_commit: bool,

    /// Format the output with rustfmt
    #[arg(long)]
    rustfmt: bool,

    /// Deadline in seconds for connecting and reading the table metadata
    ///
    /// Bounds the connect, every socket read and write, and each catalog
    /// query on the server.
    #[arg(long)]
    timeout: Option<u64>,
}

impl GenerateArgs {
    fn codegen_config(&self, emit: Emit) -> CodeGenConfig {
        CodeGenConfig::new()
            .with_output_path(self.output.clone())
            .with_emit(emit)
            .with_runtime_path(&self.runtime_path)
            .with_unmapped_policy(if self.strict_types {
                UnmappedPolicy::Fail
            } else {
                UnmappedPolicy::Skip
            })
            .with_commit_policy(if self.strict_commit {
                CommitPolicy::Strict
            } else {
                CommitPolicy::Lenient
            })
            .with_rustfmt(self.rustfmt)
    }
}

fn main() {
    if let Err(e) = run() {
        error!(error = ?e, "Fatal error");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("daoforge v{}", env!("CARGO_PKG_VERSION"));

    let (args, emit) = match &cli.command {
        Command::Table(args) => (args, Emit::Struct),
        Command::Dao(args) => (args, Emit::Dao),
    };
    info!(
        table = ?args.table,
        database = ?args.database,
        emit = ?emit,
        output = ?args.output,
        "Starting code generation"
    );

    let config = DbConfig::load(&args.env_file).context("Failed to load database configuration")?;
    debug!(connection = ?config.redacted_url(), "Loaded configuration");

    let schema_name = config.schema_name(args.database.as_deref())?;
    let codegen_config = args.codegen_config(emit);
    debug!(codegen_config = ?codegen_config, "Code generation config");

    let ctx = match args.timeout {
        Some(secs) => Context::with_timeout(Duration::from_secs(secs)),
        None => Context::new(),
    };

    let code = generate_mysql(&config, &ctx, &schema_name, &args.table, &codegen_config)?;

    match &codegen_config.output_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, &code)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = ?path, bytes = ?code.len(), "Wrote generated code");
        }
        None => print!("{code}"),
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // stdout carries the generated code
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[cfg(feature = "mysql")]
fn generate_mysql(
    config: &DbConfig,
    ctx: &Context,
    schema_name: &str,
    table_name: &str,
    codegen_config: &CodeGenConfig,
) -> Result<String> {
    use daoforge::codegen::{self, RustGenerator};
    use daoforge::error::ForgeError;
    use daoforge::introspect::CatalogIntrospector;
    use daoforge::MysqlStore;

    info!(connection = ?config.redacted_url(), "Connecting to MySQL");

    ctx.check()?;
    let mut store = MysqlStore::connect(config.mysql_opts(ctx.remaining()))
        .map_err(|e| ForgeError::Connection(format!("{}: {}", config.redacted_url(), e)))?;

    info!("Connected to database");

    let mut introspector = CatalogIntrospector::new(&mut store);
    let generator = RustGenerator::new();
    let code = codegen::generate(
        &mut introspector,
        &generator,
        ctx,
        schema_name,
        table_name,
        codegen_config,
    )
    .with_context(|| format!("Failed to generate code for {schema_name}.{table_name}"))?;

    Ok(code)
}

#[cfg(not(feature = "mysql"))]
fn generate_mysql(
    _config: &DbConfig,
    _ctx: &Context,
    _schema_name: &str,
    _table_name: &str,
    _codegen_config: &CodeGenConfig,
) -> Result<String> {
    bail!("MySQL support not enabled. Rebuild with --features mysql")
}
