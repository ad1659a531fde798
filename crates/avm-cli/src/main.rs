//! AVM compiler CLI.
//!
//! Provides the `avmc` binary, driving the full pipeline -- AWST lowering,
//! optimization, SSA destruction, MIR construction, and TEAL/bytecode
//! assembly -- from a single `compile` subcommand.

mod error;
mod templates;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use avm_codegen::arc4::{ContractMetadata, MethodSpec, StateSchema};
use avm_codegen::assembler::{assemble, AssemblerConfig};
use avm_codegen::destructure::destructure_program;
use avm_codegen::mir::build_mir_program;
use avm_codegen::teal::print_teal;
use avm_ir::awst::AwstFunction;
use avm_ir::lower::lower_program;
use avm_optimize::{optimize_program, Diagnostics, OptimizerConfig, Severity};

use error::DriverError;

#[derive(Parser)]
#[command(name = "avmc", about = "AVM compiler: AWST to TEAL/bytecode")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an AWST program to TEAL and/or bytecode.
    Compile {
        /// Path to a JSON file holding a list of AWST functions.
        input: PathBuf,

        /// Directory to write output files into (created if missing).
        #[arg(short = 'o', long, default_value = "./build")]
        output_dir: PathBuf,

        /// Optimization level: 0 (skip the optimizer), 1 (default fixed-point
        /// budget), 2 (a larger convergence budget for stubborn programs).
        #[arg(short = 'O', long, default_value_t = 1)]
        optimization_level: u8,

        /// Program version pragma emitted into the TEAL output.
        #[arg(long, default_value_t = 10)]
        program_version: u32,

        /// Logging verbosity.
        #[arg(long, value_enum, default_value = "warn")]
        debug_level: DebugLevel,

        /// Template-variable definitions file (see `avm_codegen::template`).
        #[arg(long)]
        template_vars: Option<PathBuf>,

        /// A single `NAME=VALUE` template override; may be repeated. Wins
        /// over a same-named entry from `--template-vars`.
        #[arg(long = "template-var")]
        template_var: Vec<String>,

        /// Combine adjacent non-pooled pushes (`pushints`/`pushbytess`)
        /// only when this is off; set it to hold the assembler to the
        /// more conservative one-push-per-instruction shape.
        #[arg(long)]
        match_algod_bytecode: bool,

        /// Write the assembled TEAL text to `<output_dir>/<name>.teal`.
        #[arg(long, default_value_t = true)]
        output_teal: bool,

        /// Write the assembled bytecode to `<output_dir>/<name>.bin`.
        #[arg(long)]
        output_bytecode: bool,

        /// Dump an intermediate representation to `<output_dir>/<name>.<stage>.json`.
        /// May be repeated.
        #[arg(long = "output-ir", value_enum)]
        output_ir: Vec<IrStage>,

        /// Write ARC4 contract metadata to `<output_dir>/<name>.arc4.json`.
        /// Method signatures are read from `--method`.
        #[arg(long = "method")]
        methods: Vec<String>,

        /// Name the compiled contract in ARC4 metadata (default: derived
        /// from the input file's stem).
        #[arg(long)]
        contract_name: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DebugLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl DebugLevel {
    fn filter(self) -> &'static str {
        match self {
            DebugLevel::Error => "error",
            DebugLevel::Warn => "warn",
            DebugLevel::Info => "info",
            DebugLevel::Debug => "debug",
            DebugLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum IrStage {
    Awst,
    Ssa,
    Destructured,
    Mir,
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            input,
            output_dir,
            optimization_level,
            program_version,
            debug_level,
            template_vars,
            template_var,
            match_algod_bytecode,
            output_teal,
            output_bytecode,
            output_ir,
            methods,
            contract_name,
        } => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(debug_level.filter())),
                )
                .init();

            let exit_code = run_compile(CompileArgs {
                input,
                output_dir,
                optimization_level,
                program_version,
                template_vars,
                template_var,
                match_algod_bytecode,
                output_teal,
                output_bytecode,
                output_ir,
                methods,
                contract_name,
            });
            process::exit(exit_code);
        }
    }
}

struct CompileArgs {
    input: PathBuf,
    output_dir: PathBuf,
    optimization_level: u8,
    program_version: u32,
    template_vars: Option<PathBuf>,
    template_var: Vec<String>,
    match_algod_bytecode: bool,
    output_teal: bool,
    output_bytecode: bool,
    output_ir: Vec<IrStage>,
    methods: Vec<String>,
    contract_name: Option<String>,
}

/// Runs the full pipeline and returns a process exit code: 0 success,
/// 1 compilation error (lowering, optimizing, or codegen), 2 a pass
/// reported at least one error-severity diagnostic, 3 I/O error,
/// 4 malformed CLI configuration.
fn run_compile(args: CompileArgs) -> i32 {
    match try_compile(args) {
        Ok(()) => 0,
        Err(err @ (DriverError::ReadFile { .. } | DriverError::WriteFile { .. })) => {
            eprintln!("Error: {}", err);
            3
        }
        Err(err @ (DriverError::InvalidOptimizationLevel(_)
        | DriverError::MalformedTemplateFile { .. }
        | DriverError::MalformedTemplateArg(_)
        | DriverError::MalformedAwst { .. }
        | DriverError::NoMain)) => {
            eprintln!("Error: {}", err);
            4
        }
        Err(err @ DriverError::DiagnosticsFailed(_)) => {
            eprintln!("Compilation error: {}", err);
            2
        }
        Err(err) => {
            eprintln!("Compilation error: {}", err);
            1
        }
    }
}

fn try_compile(args: CompileArgs) -> Result<(), DriverError> {
    let text = std::fs::read_to_string(&args.input).map_err(|source| DriverError::ReadFile {
        path: args.input.display().to_string(),
        source,
    })?;
    let functions: Vec<AwstFunction> =
        serde_json::from_str(&text).map_err(|source| DriverError::MalformedAwst {
            path: args.input.display().to_string(),
            source,
        })?;
    if !functions.iter().any(|f| f.name == "main") {
        return Err(DriverError::NoMain);
    }

    let stem = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "program".to_string());
    let name = args.contract_name.clone().unwrap_or_else(|| stem.clone());

    std::fs::create_dir_all(&args.output_dir).map_err(|source| DriverError::WriteFile {
        path: args.output_dir.display().to_string(),
        source,
    })?;

    if args.output_ir.contains(&IrStage::Awst) {
        write_json(&args.output_dir, &stem, "awst", &functions)?;
    }

    let ssa = lower_program(stem.clone(), &functions)?;
    if args.output_ir.contains(&IrStage::Ssa) {
        write_json(&args.output_dir, &stem, "ssa", &ssa)?;
    }

    let config = match args.optimization_level {
        0 => None,
        1 => Some(OptimizerConfig::default()),
        2 => Some(OptimizerConfig { max_iterations: 256 }),
        other => return Err(DriverError::InvalidOptimizationLevel(other)),
    };
    let optimized = match config {
        Some(config) => {
            let mut diagnostics = Diagnostics::new();
            let optimized = optimize_program(&ssa, &mut diagnostics, config);
            report_diagnostics(&diagnostics);
            if diagnostics.has_errors() {
                return Err(DriverError::DiagnosticsFailed(
                    "optimizer reported at least one error-severity diagnostic".to_string(),
                ));
            }
            optimized
        }
        None => ssa,
    };

    let destructured = destructure_program(&optimized);
    if args.output_ir.contains(&IrStage::Destructured) {
        write_json(&args.output_dir, &stem, "destructured", &destructured)?;
    }

    let mir = build_mir_program(&destructured, args.program_version)?;
    if args.output_ir.contains(&IrStage::Mir) {
        write_text(&args.output_dir, &stem, "mir.txt", &format!("{:#?}", mir))?;
    }

    if args.output_teal {
        let teal = print_teal(&mir);
        write_text(&args.output_dir, &stem, "teal", &teal)?;
    }

    if args.output_bytecode {
        let template_vars = templates::resolve(args.template_vars.as_deref(), &args.template_var)?;
        let assembled = assemble(
            &mir,
            &template_vars,
            &HashMap::new(),
            AssemblerConfig { match_algod_bytecode: args.match_algod_bytecode },
        )?;
        write_bytes(&args.output_dir, &stem, "bin", &assembled.bytecode)?;
    }

    if !args.methods.is_empty() {
        let metadata = ContractMetadata {
            name,
            methods: args.methods.iter().cloned().map(MethodSpec::new).collect(),
            state_schema: StateSchema::default(),
        };
        write_json(&args.output_dir, &stem, "arc4", &metadata)?;
    }

    Ok(())
}

fn report_diagnostics(diagnostics: &Diagnostics) {
    for item in diagnostics.items() {
        match item.severity {
            Severity::Error => tracing::error!(%item.message, "diagnostic"),
            Severity::Warning => tracing::warn!(%item.message, "diagnostic"),
            Severity::Info => tracing::info!(%item.message, "diagnostic"),
        }
    }
}

fn write_json<T: serde::Serialize>(dir: &std::path::Path, stem: &str, stage: &str, value: &T) -> Result<(), DriverError> {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\":{:?}}}", e.to_string()));
    write_text(dir, stem, &format!("{}.json", stage), &json)
}

fn write_text(dir: &std::path::Path, stem: &str, ext: &str, content: &str) -> Result<(), DriverError> {
    let path = dir.join(format!("{}.{}", stem, ext));
    std::fs::write(&path, content).map_err(|source| DriverError::WriteFile {
        path: path.display().to_string(),
        source,
    })
}

fn write_bytes(dir: &std::path::Path, stem: &str, ext: &str, content: &[u8]) -> Result<(), DriverError> {
    let path = dir.join(format!("{}.{}", stem, ext));
    std::fs::write(&path, content).map_err(|source| DriverError::WriteFile {
        path: path.display().to_string(),
        source,
    })
}
