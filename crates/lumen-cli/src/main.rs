//! `lumen` — CLI principal de Lumen
//!
//! Ici on fait uniquement : parsing d'arguments, initialisation (logger,
//! couleur), et délégation à `lumen_cli` (lib).

#![forbid(unsafe_code)]

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use lumen_cli as cli;

// ──────────────────────────── CLI (clap) ────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "lumen", version, about = "Lumen CLI — compiler, exécuter, désassembler des expressions", long_about = None)]
struct Opt {
    /// Augmente la verbosité (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Mode silencieux (casse la verbosité)
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,

    /// Force la couleur (si la feature `color` est compilée)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Sous-commandes
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compiler et exécuter une expression (ou exécuter un chunk .lbc)
    Run {
        /// Fichier source ou .lbc (ou - pour stdin)
        input: Option<PathBuf>,
        /// Expression en ligne
        #[arg(short = 'e', long = "expr", conflicts_with = "input")]
        expr: Option<String>,
        /// Trace pas à pas de la VM
        #[arg(long)]
        trace: bool,
        /// Afficher le désassemblage après compilation
        #[arg(long = "print-code")]
        print_code: bool,
        /// Afficher les timings
        #[arg(long)]
        time: bool,
    },

    /// Compiler une source vers un chunk binaire (.lbc)
    Compile {
        /// Fichier source (ou - pour stdin)
        input: Option<PathBuf>,
        /// Expression en ligne
        #[arg(short = 'e', long = "expr", conflicts_with = "input")]
        expr: Option<String>,
        /// Fichier de sortie (défaut : même nom + .lbc)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Écraser le fichier de sortie
        #[arg(long)]
        overwrite: bool,
        /// Créer les dossiers parents si nécessaire
        #[arg(long = "mkdir")]
        auto_mkdir: bool,
        /// Afficher le temps de compilation
        #[arg(long)]
        time: bool,
    },

    /// Désassembler une source ou un chunk .lbc
    Disasm {
        /// Fichier source ou .lbc (ou - pour stdin)
        input: Option<PathBuf>,
        /// Expression en ligne
        #[arg(short = 'e', long = "expr", conflicts_with = "input")]
        expr: Option<String>,
        /// Sortie JSON du chunk
        #[arg(long)]
        json: bool,
    },

    /// Assembler un chunk texte (CONSTANT 1.5, ADD, RETURN, ...)
    Asm {
        /// Fichier d'assemblage
        input: PathBuf,
        /// Exécuter après assemblage
        #[arg(long)]
        run: bool,
    },

    /// Lancer un REPL
    Repl {
        /// Prompt du REPL
        #[arg(long, default_value = "lumen> ")]
        prompt: String,
    },
}

impl Command {
    /// Verbosité minimale pour que les drapeaux de debug produisent quelque chose.
    const fn min_verbosity(&self) -> u8 {
        match self {
            Self::Run { trace: true, .. } => 3,
            Self::Run { print_code: true, .. } => 2,
            _ => 0,
        }
    }
}

// ──────────────────────────── Entrée ────────────────────────────

fn input_from_opt(path: Option<PathBuf>, expr: Option<String>) -> cli::Input {
    match (path, expr) {
        (_, Some(src)) => cli::Input::Expr(src),
        (Some(path), None) if path.as_os_str() == "-" => cli::Input::Stdin,
        (Some(path), None) => cli::Input::Path(path),
        (None, None) => cli::Input::Stdin,
    }
}

// ──────────────────────────── Logger / Verbosité ────────────────────────────

fn init_telemetry(verbose: u8, quiet: bool) {
    #[cfg(feature = "trace")]
    {
        let level = if quiet {
            "error"
        } else {
            match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        };
        std::env::set_var("RUST_LOG", std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()));
        cli::init_logger();
    }
    #[cfg(not(feature = "trace"))]
    let _ = (verbose, quiet);
}

fn init_color(choice: ColorChoice) {
    // `owo-colors` détecte le TTY ; on force seulement via les variables d'env.
    match choice {
        ColorChoice::Auto => {},
        ColorChoice::Always => {
            std::env::set_var("CLICOLOR_FORCE", "1");
            std::env::remove_var("NO_COLOR");
        },
        ColorChoice::Never => {
            std::env::set_var("NO_COLOR", "1");
            std::env::remove_var("CLICOLOR_FORCE");
        },
    }
}

// ──────────────────────────── main ────────────────────────────

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        },
    }
}

fn real_main() -> Result<i32> {
    let opt = Opt::parse();

    init_color(opt.color);
    init_telemetry(opt.verbose.max(opt.cmd.min_verbosity()), opt.quiet);

    use cli::{AsmTask, Command as C, CompileTask, DisasmTask, ReplTask, RunTask};

    let command = match opt.cmd {
        Command::Run { input, expr, trace, print_code, time } => {
            C::Run(RunTask { input: input_from_opt(input, expr), trace, print_code, time })
        },
        Command::Compile { input, expr, output, overwrite, auto_mkdir, time } => C::Compile(CompileTask {
            input: input_from_opt(input, expr),
            output,
            overwrite,
            auto_mkdir,
            time,
        }),
        Command::Disasm { input, expr, json } => C::Disasm(DisasmTask { input: input_from_opt(input, expr), json }),
        Command::Asm { input, run } => C::Asm(AsmTask { input, run }),
        Command::Repl { prompt } => C::Repl(ReplTask { prompt }),
    };

    cli::execute(command).context("échec d'exécution de la commande")
}
