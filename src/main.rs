//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{self, bail, Context};
use bitflags::bitflags;
use clap::{self, crate_version, Arg, Command};
use kiln::{
    ast::{Ast, NodeId},
    emit::emit,
    error::Diagnostics,
    ir, lex,
    lower::lower_module,
    notice::NoticeStack,
    parse::parse_module,
};

use std::{
    env::{self, VarError},
    fs::{self, File},
    io::{self, Read, Write},
};

use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt};

bitflags! {
    /// Fases cuyos resultados intermedios se vuelcan a stderr.
    struct Stages: u32 {
        const TOKENS = 0x01;
        const AST = 0x02;
        const IR = 0x04;
    }
}

struct LoggerConfig {
    filter: Result<String, VarError>,
}

impl LoggerConfig {
    fn from_env() -> Self {
        const ENV: &str = "KILN_LOG";
        LoggerConfig {
            filter: env::var(ENV),
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;

    // Parsing de CLI
    let args = Command::new("kiln")
        .version(crate_version!())
        .about("Front end for the kiln language")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .default_value("-")
                .help("Source file ('-' for stdin)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Listing output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("dump")
                .long("dump")
                .takes_value(true)
                .value_name("STAGE")
                .multiple_occurrences(true)
                .possible_values(["tokens", "ast", "ir"])
                .help("Dump an intermediate stage to stderr"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Stop after parsing, without lowering"),
        )
        .get_matches();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").unwrap_or("-");
    let output = args.value_of("output").unwrap_or("-");
    let check = args.is_present("check");

    let mut stages = Stages::empty();
    for stage in args.values_of("dump").into_iter().flatten() {
        stages |= match stage {
            "tokens" => Stages::TOKENS,
            "ast" => Stages::AST,
            "ir" => Stages::IR,
            _ => unreachable!("clap allowed a bad stage"),
        };
    }

    let (name, text) = read_input(input)?;

    let tokens = match lex::tokenize(&text, &name) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let diagnostics = Diagnostics::from(errors).kind("Lexical error");
            eprint!("{}", diagnostics);
            bail!("Lexical analysis failed");
        }
    };

    if stages.contains(Stages::TOKENS) {
        for token in &tokens {
            eprintln!("{:?}\t{}", token.location(), token.as_ref());
        }
    }

    let mut ast = Ast::new();
    let mut notices = NoticeStack::new();
    let module = parse_module(&tokens, &mut ast, &mut notices);

    if stages.contains(Stages::AST) {
        if let Ok(module) = module {
            dump_tree(&ast, module, 0);
        }
    }

    let failed = module.is_err() || notices.has_errors();
    if !notices.is_empty() {
        let diagnostics = Diagnostics::from(notices).kind("Syntax error");
        eprint!("{}", diagnostics);
    }

    let module = match module {
        Ok(module) if !failed => module,
        _ => bail!("Syntax analysis failed"),
    };

    if check {
        return Ok(());
    }

    let mut program = ir::Module::default();
    if let Err(error) = lower_module(&ast, module, &mut program) {
        let diagnostics = Diagnostics::from(error).kind("Semantic error");
        eprint!("{}", diagnostics);
        bail!("Lowering failed");
    }

    if stages.contains(Stages::IR) {
        emit(&program, &mut io::stderr()).context("Failed to dump IR to stderr")?;
    }

    match output {
        "-" => {
            let mut stdout = io::stdout();
            emit(&program, &mut stdout).context("Failed to emit to stdout")?;
            stdout.flush().context("Failed to flush stdout")?;
        }

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            emit(&program, &mut file).with_context(|| format!("Failed to emit to file: {}", path))?;
        }
    }

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = match LoggerConfig::from_env().filter {
        Ok(filter) => EnvFilter::try_new(filter).context("Bad filter in KILN_LOG")?,
        Err(_) => return Ok(()),
    };

    let layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    let subscriber = tracing_subscriber::Registry::default().with(filter).with(layer);

    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

/// Lee el archivo de entrada completo, o stdin si es `-`.
fn read_input(path: &str) -> anyhow::Result<(String, String)> {
    if path == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;

        return Ok((String::from("<stdin>"), text));
    }

    let text = fs::read_to_string(path).with_context(|| format!("Failed to read: {}", path))?;
    Ok((path.to_owned(), text))
}

fn dump_tree(ast: &Ast, id: NodeId, depth: usize) {
    let name = match ast.item_name(id) {
        Some(name) => format!(" `{}`", name),
        None => String::new(),
    };

    eprintln!("{:indent$}{}{} {:?}", "", ast.kind(id), name, id, indent = depth * 2);
    for child in ast.children(id) {
        dump_tree(ast, child, depth + 1);
    }
}
