//! lumen-cli — bibliothèque interne du binaire `lumen`
//!
//! But : garder la logique des commandes **testable** et séparée du parsing
//! d'arguments (laissé à `main.rs`).
//!
//! Points clés :
//! - Pipeline **source → chunk → exécution**, ou **`.lbc` → chunk validé → exécution**
//! - Codes de sortie : 65 (erreur de compilation), 70 (erreur d'exécution), 1 (le reste)
//! - Utilitaires d'E/S (stdin, écriture atomique, création dossiers, chrono)
//! - Traces (`feature = "trace"`) et couleurs (`feature = "color"`) optionnelles

#![deny(unused_must_use)]
#![forbid(unsafe_code)]

use std::{
    fs,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use lumen_compiler::{render_diagnostics, CompileError, Compiler, CompilerOptions};
use lumen_core::{
    asm::assemble,
    bytecode::Chunk,
    disasm::disassemble_chunk,
    helpers::validate_chunk,
    runtime::eval::{eval_chunk, EvalOptions, RuntimeError},
    Value,
};
use thiserror::Error;

#[cfg(feature = "color")]
use owo_colors::OwoColorize;

/// Code de sortie d'une erreur de compilation (`EX_DATAERR`).
pub const EXIT_COMPILE_ERROR: i32 = 65;
/// Code de sortie d'une erreur d'exécution (`EX_SOFTWARE`).
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Extension des chunks sérialisés.
pub const BYTECODE_EXT: &str = "lbc";

// ───────────────────────────── Types publics ─────────────────────────────

/// Représente une commande haut-niveau (sans parsing CLI — réservé à main.rs).
#[derive(Clone, Debug)]
pub enum Command {
    /// Compile puis exécute (ou charge un `.lbc` puis exécute).
    Run(RunTask),
    /// Compile une source vers un chunk binaire.
    Compile(CompileTask),
    /// Désassemble (texte ou JSON).
    Disasm(DisasmTask),
    /// Assemble un chunk texte.
    Asm(AsmTask),
    /// Boucle interactive.
    Repl(ReplTask),
}

/// Paramètres de `lumen run`.
#[derive(Clone, Debug, Default)]
pub struct RunTask {
    /// Source, expression ou `.lbc`
    pub input: Input,
    /// Trace pas à pas de la VM (niveau `trace`)
    pub trace: bool,
    /// Désassemblage après compilation (niveau `debug`)
    pub print_code: bool,
    /// Afficher les timings
    pub time: bool,
}

/// Paramètres de `lumen compile`.
#[derive(Clone, Debug, Default)]
pub struct CompileTask {
    /// Source ou expression
    pub input: Input,
    /// Sortie (défaut : même nom + `.lbc`)
    pub output: Option<PathBuf>,
    /// Autorise l'écrasement
    pub overwrite: bool,
    /// Crée les dossiers parents si besoin
    pub auto_mkdir: bool,
    /// Afficher le timing
    pub time: bool,
}

/// Paramètres de `lumen disasm`.
#[derive(Clone, Debug, Default)]
pub struct DisasmTask {
    /// Source, expression ou `.lbc`
    pub input: Input,
    /// Chunk en JSON plutôt que le listing
    pub json: bool,
}

/// Paramètres de `lumen asm`.
#[derive(Clone, Debug, Default)]
pub struct AsmTask {
    /// Fichier texte d'assemblage
    pub input: PathBuf,
    /// Exécuter le chunk assemblé
    pub run: bool,
}

/// Paramètres de `lumen repl`.
#[derive(Clone, Debug, Default)]
pub struct ReplTask {
    /// Invite affichée avant chaque ligne
    pub prompt: String,
}

/// Entrée : fichier, stdin, ou expression en ligne (`-e`).
#[derive(Clone, Debug, Default)]
pub enum Input {
    /// Fichier (source, ou chunk si extension `.lbc`)
    Path(PathBuf),
    /// Entrée standard
    #[default]
    Stdin,
    /// Expression passée sur la ligne de commande
    Expr(String),
}

impl Input {
    fn bytecode_path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) if p.extension().and_then(|e| e.to_str()) == Some(BYTECODE_EXT) => Some(p),
            _ => None,
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Path(p) => display(p),
            Self::Stdin => "<stdin>".into(),
            Self::Expr(_) => "<expr>".into(),
        }
    }
}

/// Échecs qui ont leur propre code de sortie.
#[derive(Debug, Error)]
pub enum Failure {
    /// Diagnostics du compilateur
    #[error("{0}")]
    Compile(#[from] CompileError),
    /// Erreur de la VM
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl Failure {
    /// Code de sortie associé.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Compile(_) => EXIT_COMPILE_ERROR,
            Self::Runtime(_) => EXIT_RUNTIME_ERROR,
        }
    }
}

// ───────────────────────────── Initialisation ─────────────────────────────

/// Initialise le logger selon la feature `trace`.
pub fn init_logger() {
    #[cfg(feature = "trace")]
    {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .try_init();
    }
}

// ───────────────────────────── Exécution ─────────────────────────────

/// Exécute une commande. Retourne un code de sortie ; les erreurs d'E/S et
/// d'usage remontent en `Err`.
pub fn execute(cmd: Command) -> Result<i32> {
    let res = match cmd {
        Command::Run(t) => run_entry(t),
        Command::Compile(t) => compile_entry(t),
        Command::Disasm(t) => disasm_entry(t),
        Command::Asm(t) => asm_entry(t),
        Command::Repl(t) => {
            let stdin = io::stdin();
            repl_loop(&t.prompt, stdin.lock(), io::stdout().lock(), io::stderr().lock())
        },
    };

    match res {
        Ok(()) => Ok(0),
        Err(e) => match e.downcast::<Failure>() {
            Ok(failure) => {
                report(&failure);
                Ok(failure.exit_code())
            },
            Err(e) => Err(e),
        },
    }
}

/// Compile puis évalue `source`.
pub fn evaluate(compiler: &Compiler, source: &str, opts: &EvalOptions) -> Result<Option<Value>, Failure> {
    let chunk = compiler.compile(source).into_result()?;
    Ok(eval_chunk(&chunk, opts)?.value)
}

/// REPL : une expression par ligne ; ligne vide ou EOF pour sortir.
pub fn repl_loop<R: BufRead, W: Write, E: Write>(prompt: &str, input: R, mut out: W, mut err: E) -> Result<()> {
    let compiler = Compiler::default();
    let opts = EvalOptions::default();
    let mut lines = input.lines();
    loop {
        write!(out, "{prompt}")?;
        out.flush()?;
        let Some(line) = lines.next() else {
            writeln!(out)?;
            return Ok(());
        };
        let line = line.context("lecture de la ligne")?;
        if line.trim().is_empty() {
            return Ok(());
        }
        match evaluate(&compiler, &line, &opts) {
            Ok(Some(value)) => writeln!(out, "{value}")?,
            Ok(None) => {},
            Err(failure) => writeln!(err, "{failure}")?,
        }
    }
}

fn run_entry(task: RunTask) -> Result<()> {
    let options = CompilerOptions { print_code: task.print_code, ..CompilerOptions::default() };
    let chunk = load_chunk(&task.input, &options, task.time)?;

    let start = Instant::now();
    let out = eval_chunk(&chunk, &EvalOptions { trace: task.trace, ..EvalOptions::default() })
        .map_err(Failure::from)?;
    let elapsed = start.elapsed();

    if let Some(value) = out.value {
        let mut w = BufWriter::new(io::stdout().lock());
        writeln!(w, "{value}")?;
        w.flush()?;
    }
    if task.time {
        status_info("TIME", &format!("run: {} µs", elapsed.as_micros()));
    }
    Ok(())
}

fn compile_entry(task: CompileTask) -> Result<()> {
    let CompileTask { input, output, overwrite, auto_mkdir, time } = task;
    if input.bytecode_path().is_some() {
        anyhow::bail!("'compile' attend une source, pas un chunk : {}", input.label());
    }

    let chunk = load_chunk(&input, &CompilerOptions::default(), time)?;
    let out_path = output.unwrap_or_else(|| default_bytecode_path(&input));

    if auto_mkdir {
        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("création de {}", display(parent)))?;
        }
    }
    if out_path.exists() && !overwrite {
        return Err(anyhow!("fichier de sortie existe déjà: {}", display(&out_path)));
    }
    write_bytes_atomic(&out_path, &chunk.to_bytes()).with_context(|| format!("écriture de {}", display(&out_path)))?;
    status_ok("COMPILE", &display(&out_path));
    Ok(())
}

fn disasm_entry(task: DisasmTask) -> Result<()> {
    let chunk = load_chunk(&task.input, &CompilerOptions::default(), false)?;
    let text = if task.json {
        let mut s = serde_json::to_string_pretty(&chunk)?;
        s.push('\n');
        s
    } else {
        disassemble_chunk(&chunk, &task.input.label())
    };
    let mut w = BufWriter::new(io::stdout().lock());
    w.write_all(text.as_bytes())?;
    w.flush()?;
    Ok(())
}

fn asm_entry(task: AsmTask) -> Result<()> {
    let text = read_source(&Input::Path(task.input.clone()))?;
    let chunk = assemble(&text).with_context(|| format!("assemblage de {}", display(&task.input)))?;

    let mut w = BufWriter::new(io::stdout().lock());
    w.write_all(disassemble_chunk(&chunk, &display(&task.input)).as_bytes())?;

    if task.run {
        validate_chunk(&chunk).context("chunk invalide")?;
        let out = eval_chunk(&chunk, &EvalOptions::default()).map_err(Failure::from)?;
        if let Some(value) = out.value {
            writeln!(w, "{value}")?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Source compilée, ou `.lbc` décodé (CRC + validation structurelle).
fn load_chunk(input: &Input, options: &CompilerOptions, time: bool) -> Result<Chunk> {
    if let Some(path) = input.bytecode_path() {
        let bytes = fs::read(path).with_context(|| format!("lecture chunk: {}", display(path)))?;
        let chunk = Chunk::from_bytes(&bytes).with_context(|| format!("chunk invalide: {}", display(path)))?;
        log::debug!("loaded {} ({} bytes of code)", display(path), chunk.len());
        return Ok(chunk);
    }

    let src = read_source(input).context("lecture de la source")?;
    let start = Instant::now();
    let compilation = Compiler::new(options.clone()).compile(&src);
    if time {
        status_info("TIME", &format!("compile: {} µs", start.elapsed().as_micros()));
    }
    Ok(compilation.into_result().map_err(Failure::from)?)
}

fn report(failure: &Failure) {
    match failure {
        Failure::Compile(e) => eprintln!("{}", render_diagnostics(&e.diagnostics)),
        Failure::Runtime(e) => status_err("RUNTIME", &e.to_string()),
    }
}

// ───────────────────────────── Utilitaires E/S ─────────────────────────────

fn read_source(input: &Input) -> Result<String> {
    match input {
        Input::Expr(src) => Ok(src.clone()),
        Input::Stdin => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            Ok(s)
        },
        Input::Path(p) => {
            let f = File::open(p).with_context(|| format!("ouverture: {}", display(p)))?;
            let mut r = BufReader::new(f);
            let mut s = String::new();
            r.read_to_string(&mut s)?;
            Ok(s)
        },
    }
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let base = path
        .file_name()
        .ok_or_else(|| anyhow!("chemin de sortie sans nom de fichier: {}", display(path)))?;
    let tmp = unique_tmp_path(parent, base);
    let written = write_tmp(&tmp, bytes).and_then(|()| replace_with(&tmp, path));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written?;
    Ok(())
}

fn write_tmp(tmp: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(tmp)?);
    w.write_all(bytes)?;
    w.flush()
}

// `rename` remplace la cible existante ; l'ancienne sortie reste intacte s'il échoue.
// La copie ne sert qu'entre deux systèmes de fichiers.
fn replace_with(tmp: &Path, path: &Path) -> io::Result<()> {
    fs::rename(tmp, path).or_else(|_| fs::copy(tmp, path).and_then(|_| fs::remove_file(tmp)))
}

fn unique_tmp_path(dir: &Path, base: &std::ffi::OsStr) -> PathBuf {
    let mut i = 0u32;
    loop {
        let candidate = dir.join(format!("{}.tmp{}", base.to_string_lossy(), i));
        if !candidate.exists() {
            return candidate;
        }
        i = i.wrapping_add(1);
    }
}

fn default_bytecode_path(input: &Input) -> PathBuf {
    match input {
        Input::Path(src) => src.with_extension(BYTECODE_EXT),
        Input::Stdin | Input::Expr(_) => PathBuf::from("out").with_extension(BYTECODE_EXT),
    }
}

fn display(p: &Path) -> String { p.to_string_lossy().to_string() }

// ───────────────────────────── Sorties jolies ─────────────────────────────

fn status_ok(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {}", tag.green().bold(), msg);
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

fn status_info(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {}", tag.blue().bold(), msg);
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

fn status_err(tag: &str, msg: &str) {
    #[cfg(feature = "color")]
    eprintln!("{} {}", tag.red().bold(), msg);
    #[cfg(not(feature = "color"))]
    eprintln!("{tag} {msg}");
}

// ───────────────────────────── Tests ─────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn expr(src: &str) -> Input { Input::Expr(src.into()) }

    #[test]
    fn default_paths() {
        let out = default_bytecode_path(&Input::Path(PathBuf::from("src/main.lm")));
        assert_eq!(out, PathBuf::from("src/main.lbc"));
        assert_eq!(default_bytecode_path(&expr("1")), PathBuf::from("out.lbc"));
        assert!(Input::Path(PathBuf::from("a/b.lbc")).bytecode_path().is_some());
        assert!(Input::Path(PathBuf::from("a/b.lm")).bytecode_path().is_none());
    }

    #[test]
    fn compile_then_run_bytecode() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/calc.lbc");
        let task = CompileTask {
            input: expr("(1 + 2) * 3"),
            output: Some(out.clone()),
            overwrite: false,
            auto_mkdir: true,
            time: false,
        };
        assert_eq!(execute(Command::Compile(task.clone())).unwrap(), 0);

        let chunk = Chunk::from_bytes(&fs::read(&out).unwrap()).unwrap();
        assert_eq!(eval_chunk(&chunk, &EvalOptions::default()).unwrap().value, Some(Value::number(9.0)));

        // deuxième écriture refusée sans --overwrite
        assert!(execute(Command::Compile(task.clone())).is_err());
        assert_eq!(execute(Command::Compile(CompileTask { overwrite: true, ..task })).unwrap(), 0);

        let run = RunTask { input: Input::Path(out), ..RunTask::default() };
        assert_eq!(execute(Command::Run(run)).unwrap(), 0);
    }

    #[test]
    fn exit_codes_follow_failure_kind() {
        let run = RunTask { input: expr("1 +"), ..RunTask::default() };
        assert_eq!(execute(Command::Run(run)).unwrap(), EXIT_COMPILE_ERROR);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("underflow.asm");
        fs::write(&path, "ADD\nRETURN\n").unwrap();
        let asm = AsmTask { input: path, run: true };
        assert_eq!(execute(Command::Asm(asm)).unwrap(), EXIT_RUNTIME_ERROR);

        let missing = RunTask { input: Input::Path(dir.path().join("absent.lm")), ..RunTask::default() };
        assert!(execute(Command::Run(missing)).is_err());
    }

    #[test]
    fn deeply_nested_source_exits_as_compile_error() {
        let run = RunTask { input: expr(&format!("{}1", "-".repeat(300_000))), ..RunTask::default() };
        assert_eq!(execute(Command::Run(run)).unwrap(), EXIT_COMPILE_ERROR);
    }

    fn leftover_tmp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp"))
            .collect()
    }

    #[test]
    fn atomic_write_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("calc.lbc");
        fs::write(&out, b"old").unwrap();
        write_bytes_atomic(&out, b"new").unwrap();
        assert_eq!(fs::read(&out).unwrap(), b"new");
        assert!(leftover_tmp_files(dir.path()).is_empty());
    }

    #[test]
    fn failed_atomic_write_leaves_no_temporary() {
        let dir = tempfile::tempdir().unwrap();
        // une cible qui est un dossier non vide : ni rename ni copie ne passent
        let out = dir.path().join("calc.lbc");
        fs::create_dir(&out).unwrap();
        fs::write(out.join("keep"), b"x").unwrap();

        assert!(write_bytes_atomic(&out, b"new").is_err());
        assert!(out.join("keep").exists());
        assert!(leftover_tmp_files(dir.path()).is_empty());
    }

    #[test]
    fn corrupted_bytecode_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.lbc");
        fs::write(&path, b"LMNC garbage").unwrap();
        let err = execute(Command::Disasm(DisasmTask { input: Input::Path(path), json: false })).unwrap_err();
        assert!(format!("{err:#}").contains("chunk invalide"), "{err:#}");
    }

    #[test]
    fn disasm_accepts_json() {
        assert_eq!(execute(Command::Disasm(DisasmTask { input: expr("-4"), json: true })).unwrap(), 0);
    }

    #[test]
    fn repl_prints_values_and_diagnostics() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        repl_loop("> ", Cursor::new("1 + 2\n(1\n4 / 8\n\nignored\n"), &mut out, &mut err).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "> 3\n> > 0.5\n> ");
        assert_eq!(String::from_utf8(err).unwrap(), "[line 1] Error at end: Expect ')' after expression.\n");
    }

    #[test]
    fn repl_exits_on_eof() {
        let mut out = Vec::new();
        repl_loop("? ", Cursor::new("7"), &mut out, io::sink()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "? 7\n? \n");
    }

    #[test]
    fn evaluate_reports_both_failure_kinds() {
        let compiler = Compiler::default();
        let tiny = EvalOptions { stack_max: 1, ..EvalOptions::default() };
        assert!(matches!(evaluate(&compiler, "1 +", &tiny), Err(Failure::Compile(_))));
        assert!(matches!(evaluate(&compiler, "1 + 2", &tiny), Err(Failure::Runtime(_))));
        assert_eq!(evaluate(&compiler, "2", &tiny).unwrap(), Some(Value::number(2.0)));
    }
}
