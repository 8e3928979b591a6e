mod logging;
mod program;
mod query;
mod type_expr;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tessel_types::{EntityId, EntityKind, MutabilityMode, TypeContext};

use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::program::{load, Program};
use crate::query::run_query;

/// Tessel - type checking queries over declared programs
#[derive(Parser)]
#[command(name = "tessel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level, unless overridden by RUST_LOG
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a program, print its diagnostics and answer its queries
    Check {
        /// Path to the JSON program
        file: PathBuf,

        /// Only nominal inheritance satisfies protocols
        #[arg(long)]
        no_duck_typing: bool,

        /// Allow value types to be substituted by their subtypes
        #[arg(long)]
        slicing: bool,

        #[arg(long, value_enum)]
        mutability_mode: Option<ModeArg>,
    },

    /// List the declarations of a program
    Dump {
        /// Path to the JSON program
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Combined,
    MutabilityOnly,
    AssignabilityOnly,
}

impl From<ModeArg> for MutabilityMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Combined => MutabilityMode::Combined,
            ModeArg::MutabilityOnly => MutabilityMode::MutabilityOnly,
            ModeArg::AssignabilityOnly => MutabilityMode::AssignabilityOnly,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_format);

    match cli.command {
        Commands::Check {
            file,
            no_duck_typing,
            slicing,
            mutability_mode,
        } => check_file(&file, no_duck_typing, slicing, mutability_mode),
        Commands::Dump { file } => dump_file(&file),
    }
}

fn read_program(path: &Path) -> Option<Program> {
    match Program::from_path(path) {
        Ok(program) => Some(program),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

/// Evaluate a program and answer its queries
fn check_file(path: &Path, no_duck_typing: bool, slicing: bool, mode: Option<ModeArg>) -> ExitCode {
    let Some(mut program) = read_program(path) else {
        return ExitCode::FAILURE;
    };
    if no_duck_typing {
        program.config.duck_typing = false;
    }
    if slicing {
        program.config.slicing = true;
    }
    if let Some(mode) = mode {
        program.config.mutability_mode = mode.into();
    }
    tracing::debug!(config = ?program.config, file = %path.display(), "loading program");

    let mut ctx = match load(&program) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let clean = ctx.evaluate_all();
    print_diagnostics(&mut ctx);

    let mut failed_queries = false;
    for query in &program.queries {
        match run_query(&mut ctx, query) {
            Ok(line) => println!("{}", line),
            Err(e) => {
                eprintln!("Error in query: {}", e);
                failed_queries = true;
            }
        }
        // Diagnostics raised while answering belong to that query
        print_diagnostics(&mut ctx);
    }

    if !clean || failed_queries {
        return ExitCode::FAILURE;
    }
    if program.queries.is_empty() {
        println!("No errors found in '{}'", path.display());
    }
    ExitCode::SUCCESS
}

fn print_diagnostics(ctx: &mut TypeContext) {
    for diagnostic in ctx.take_diagnostics() {
        eprintln!("{}", diagnostic);
    }
}

/// List the declarations of a program
fn dump_file(path: &Path) -> ExitCode {
    let Some(program) = read_program(path) else {
        return ExitCode::FAILURE;
    };
    let ctx = match load(&program) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    for entity in ctx.top_level() {
        dump_entity(&ctx, entity, 0);
    }
    ExitCode::SUCCESS
}

fn dump_entity(ctx: &TypeContext, entity: EntityId, depth: usize) {
    let indent = "  ".repeat(depth);
    let name = ctx.name(entity).to_string();
    let params: Vec<String> = ctx
        .entity(entity)
        .template_params
        .iter()
        .map(|&p| ctx.name(p).to_string())
        .collect();
    let generics = if params.is_empty() {
        String::new()
    } else {
        format!("<{}>", params.join(", "))
    };

    match &ctx.entity(entity).kind {
        EntityKind::Type(decl) => {
            let parents: Vec<String> = decl.parents.iter().map(|p| ctx.display(p.ty)).collect();
            let inherits = if parents.is_empty() {
                String::new()
            } else {
                format!(": {}", parents.join(", "))
            };
            println!("{indent}{:?} {name}{generics}{inherits}", decl.category);
        }
        EntityKind::Function(decl) => {
            let args: Vec<String> = decl
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, ctx.display(p.ty)))
                .collect();
            println!(
                "{indent}fn {name}{generics}({}) -> {}",
                args.join(", "),
                ctx.display(decl.result)
            );
        }
        EntityKind::Field(field) => println!("{indent}{name}: {}", ctx.display(field.ty)),
        _ => println!("{indent}{name}"),
    }

    for &member in &ctx.entity(entity).members {
        dump_entity(ctx, member, depth + 1);
    }
}
