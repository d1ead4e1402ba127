use clap::Parser;

use shdc::{CompileError, ErrorFormat, Options, SlangSet};

/// Annotated-GLSL shader cross-compiler.
///
/// Compiles the @vs/@fs snippets of one annotated GLSL file to SPIR-V,
/// translates them to the requested shading languages and writes a C
/// header with sources, optional bytecode and reflection constants.
#[derive(Parser, Debug)]
#[command(name = "shdc", version)]
struct Args {
    /// Input annotated GLSL file
    #[arg(short, long)]
    input: String,

    /// Output C header path
    #[arg(short, long)]
    output: String,

    /// Colon-separated target languages:
    /// glsl330:glsl100:glsl300es:hlsl5:metal_macos:metal_ios
    #[arg(short = 'l', long, default_value = "glsl330")]
    slang: String,

    /// Compile HLSL/Metal sources to native bytecode when a toolchain
    /// is available
    #[arg(short, long)]
    bytecode: bool,

    /// Print each stage's output in human readable form
    #[arg(short, long)]
    debug_dump: bool,

    /// Omit the per-backend #ifdef guards in the generated header
    #[arg(long)]
    no_ifdef: bool,

    /// Generator version stamp embedded in the header
    #[arg(long, default_value_t = 1)]
    gen_version: u32,

    /// Error message format: gcc or msvc
    #[arg(long, default_value = "gcc")]
    error_format: String,
}

const EXIT_ARGS: i32 = 10;

fn main() {
    env_logger::init();
    std::process::exit(run());
}

fn run() -> i32 {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // clap renders its own message (including --help/--version)
            let _ = err.print();
            return if err.use_stderr() { EXIT_ARGS } else { 0 };
        }
    };

    let error_format = match ErrorFormat::parse(&args.error_format) {
        Some(format) => format,
        None => {
            eprintln!(
                "unknown error format '{}' (expected 'gcc' or 'msvc')",
                args.error_format
            );
            return EXIT_ARGS;
        }
    };

    let slang = match SlangSet::parse(&args.slang) {
        Ok(set) if !set.is_empty() => set,
        Ok(_) => {
            eprintln!("no target language selected");
            return EXIT_ARGS;
        }
        Err(message) => {
            eprintln!("{}", message);
            return EXIT_ARGS;
        }
    };

    let opts = Options {
        input: args.input,
        output: args.output,
        slang,
        byte_code: args.bytecode,
        debug_dump: args.debug_dump,
        no_ifdef: args.no_ifdef,
        gen_version: args.gen_version,
        error_format,
    };

    match shdc::run(&opts) {
        Ok(()) => 0,
        Err(failure) => {
            print_failure(&failure, error_format);
            failure.exit_code()
        }
    }
}

fn print_failure(failure: &CompileError, format: ErrorFormat) {
    for report in failure.reports() {
        eprintln!("{}", report.format(format));
    }
}
