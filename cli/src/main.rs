mod convert;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use convert::{Session, run_batch};

const SUBCOMMANDS: &[&str] = &["convert", "batch", "test", "help"];

#[derive(Parser)]
#[command(name = "zwom", version, about = "Compile .zwom workouts into Zwift .zwo files")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (repeat for more detail); RUST_LOG overrides the default
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert one .zwom file
    Convert(ConvertArgs),

    /// Convert every .zwom file under a directory
    Batch(BatchArgs),

    /// Run .test.zwom fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Workout source file
    file: PathBuf,

    /// Output path (defaults to the input with a .zwo extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Validate only, don't write anything (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump the validated document
    #[arg(long)]
    ast: bool,

    /// List the normalized blocks and the elements they become
    #[arg(long)]
    list_blocks: bool,
}

#[derive(clap::Args)]
struct BatchArgs {
    /// Directory to search recursively
    dir: PathBuf,

    /// Validate only, don't write anything
    #[arg(long)]
    check: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.zwom file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // If the first positional arg is not a known subcommand, inject "convert"
    // so `zwom ride.zwom` works like `zwom convert ride.zwom`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(pos) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|p| p + 1)
    {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "convert".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_tracing(cli.verbose);

    match cli.command {
        Command::Convert(convert_args) => do_convert(convert_args, cli.no_color),
        Command::Batch(batch_args) => do_batch(batch_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn do_convert(args: ConvertArgs, no_color: bool) {
    let mut session = Session::new(no_color);

    if args.check || args.ast || args.list_blocks {
        let document = match session.check(&args.file) {
            Ok(document) => document,
            Err(err) => {
                session.report(&err);
                process::exit(1);
            }
        };
        if args.ast {
            println!("{:#?}", document);
        } else if args.list_blocks {
            for line in convert::block_listing(&document) {
                println!("{}", line);
            }
        } else {
            eprintln!("ok: {} is a valid workout", args.file.display());
        }
        return;
    }

    match session.convert(&args.file, args.output.as_deref()) {
        Ok(target) => eprintln!("ok: {} -> {}", args.file.display(), target.display()),
        Err(err) => {
            session.report(&err);
            process::exit(1);
        }
    }
}

fn do_batch(args: BatchArgs, no_color: bool) {
    let mut session = Session::new(no_color);
    let summary = run_batch(&mut session, &args.dir, args.check);
    let total = summary.succeeded + summary.failed;

    if total == 0 {
        eprintln!("no .{} files found in {}", convert::SOURCE_EXTENSION, args.dir.display());
        process::exit(1);
    }
    eprintln!();
    eprintln!(
        "{} of {} files ok, {} failed",
        summary.succeeded, total, summary.failed
    );
    if summary.failed > 0 {
        process::exit(1);
    }
}
