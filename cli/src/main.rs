mod disassembler;
mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{LevelFilter, debug};
use lowbyte_core::error::{IoError, boxed};
use lowbyte_core::ir::IrProgram;
use lowbyte_core::ir::textual::default_output_path;
use lowbyte_core::{
    LowbyteErrorExt, VirtualMachine, VmConfig, VmRunner, optimize_program, read_program_file, write_program,
    write_program_file,
};

use crate::output::Printer;

type CliResult = Result<(), Box<dyn LowbyteErrorExt>>;

fn main() -> ExitCode {
    let cli = Command::new("lowbyte")
        .version("0.1.0")
        .about("Inspect, optimize and run textual IR programs")
        .arg(
            Arg::new("verbose")
                .help("Log debug output (RUST_LOG overrides)")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true),
        );

    let cli = setup_cli(cli);
    let matches = cli.get_matches();
    init_logging(matches.get_flag("verbose"));

    let printer = Printer::default();
    match dispatch_commands(&matches, &printer) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            printer.error(e.as_ref());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if verbose { LevelFilter::Debug } else { LevelFilter::Warn });
    builder.parse_env("RUST_LOG");
    builder.init();
}

fn file_arg(help: &'static str) -> Arg {
    Arg::new("file")
        .help(help)
        .required(true)
        .index(1)
        .value_parser(clap::value_parser!(PathBuf))
}

/// Sets up the CLI with subcommands and arguments.
fn setup_cli(cli: Command) -> Command {
    cli.subcommand(
        Command::new("check")
            .about("Parse and validate an IR file and summarize its contents")
            .arg(file_arg("The .p8ir file to check")),
    )
    .subcommand(
        Command::new("run")
            .about("Run an IR file on the virtual machine")
            .arg(file_arg("The .p8ir file to run"))
            .arg(
                Arg::new("config")
                    .help("JSON file with the machine configuration")
                    .short('c')
                    .long("config")
                    .value_parser(clap::value_parser!(PathBuf))
                    .value_name("FILE"),
            )
            .arg(
                Arg::new("max-steps")
                    .help("Abort after this many executed instructions")
                    .long("max-steps")
                    .value_parser(clap::value_parser!(u64))
                    .value_name("N"),
            )
            .arg(
                Arg::new("no-optimize")
                    .help("Run the program exactly as written")
                    .long("no-optimize")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("show")
                    .help("Print the word stored at a variable after the run")
                    .short('s')
                    .long("show")
                    .action(ArgAction::Append)
                    .value_name("SYMBOL"),
            )
            .arg(
                Arg::new("json")
                    .help("Print the final machine state as JSON")
                    .long("json")
                    .action(ArgAction::SetTrue),
            ),
    )
    .subcommand(
        Command::new("optimize")
            .about("Run the peephole optimizer and write the result")
            .arg(file_arg("The .p8ir file to optimize"))
            .arg(
                Arg::new("output")
                    .help("Output file; '-' prints to stdout")
                    .short('o')
                    .long("output")
                    .value_parser(clap::value_parser!(String))
                    .value_name("FILE"),
            ),
    )
    .subcommand(
        Command::new("disasm")
            .about("List the flattened instruction stream with label positions")
            .arg(file_arg("The .p8ir file to list"))
            .arg(
                Arg::new("plain")
                    .help("Plain text instead of a table")
                    .long("plain")
                    .action(ArgAction::SetTrue),
            ),
    )
}

/// Dispatches the command based on the parsed arguments.
fn dispatch_commands(matches: &ArgMatches, printer: &Printer) -> CliResult {
    match matches.subcommand() {
        Some(("check", sub_m)) => check(required_file(sub_m), printer),
        Some(("run", sub_m)) => run(sub_m, printer),
        Some(("optimize", sub_m)) => optimize(required_file(sub_m), sub_m.get_one::<String>("output"), printer),
        Some(("disasm", sub_m)) => disasm(required_file(sub_m), sub_m.get_flag("plain"), printer),
        _ => {
            printer.warning("No valid subcommand was used. Use --help for more information.");
            Ok(())
        }
    }
}

fn required_file(sub_m: &ArgMatches) -> &Path {
    sub_m
        .get_one::<PathBuf>("file")
        .map(PathBuf::as_path)
        .unwrap_or_else(|| Path::new(""))
}

fn check(file: &Path, printer: &Printer) -> CliResult {
    let program = read_program_file(file)?;
    printer.title(&format!("program '{}'", program.name));
    printer.table(&["item", "count"], summary(&program));
    printer.success("ok");
    Ok(())
}

fn summary(program: &IrProgram) -> Vec<Vec<String>> {
    let symbols = &program.symbols;
    let chunks = program.chunks();
    [
        ("blocks", program.blocks.len()),
        ("subroutines", program.subroutines().count()),
        ("chunks", chunks.len()),
        ("instructions", program.instruction_count()),
        ("variables", symbols.variables().count()),
        ("memory-mapped", symbols.memory_mapped().count()),
        ("slabs", symbols.slabs().count()),
        ("asm symbols", symbols.asm_symbols().count()),
    ]
    .into_iter()
    .map(|(name, count)| vec![name.to_string(), count.to_string()])
    .collect()
}

fn load_config(sub_m: &ArgMatches) -> Result<VmConfig, Box<dyn LowbyteErrorExt>> {
    let mut config = match sub_m.get_one::<PathBuf>("config") {
        Some(path) => {
            let io_error = |message: String| boxed(IoError::new(path.display().to_string(), message));
            let text = std::fs::read_to_string(path).map_err(|e| io_error(e.to_string()))?;
            serde_json::from_str(&text).map_err(|e| io_error(e.to_string()))?
        }
        None => VmConfig::default(),
    };
    if let Some(limit) = sub_m.get_one::<u64>("max-steps") {
        config.max_steps = Some(*limit);
    }
    debug!("machine configuration: {:?}", config);
    Ok(config)
}

fn run(sub_m: &ArgMatches, printer: &Printer) -> CliResult {
    let file = required_file(sub_m);
    let runner = VmRunner::new(load_config(sub_m)?).optimized(!sub_m.get_flag("no-optimize"));
    let vm = runner.run_file(file)?;

    if sub_m.get_flag("json") {
        let json = vm
            .snapshot()
            .to_json()
            .map_err(|e| boxed(IoError::new("<stdout>", e.to_string())))?;
        println!("{}", json);
        return Ok(());
    }

    printer.success(&format!("halted after {} steps at pc {}", vm.steps(), vm.pc()));
    if let Some(symbols) = sub_m.get_many::<String>("show") {
        for symbol in symbols {
            show_symbol(&vm, symbol, printer);
        }
    }
    Ok(())
}

fn show_symbol(vm: &VirtualMachine, symbol: &str, printer: &Printer) {
    let Some(address) = vm.address_of(symbol) else {
        printer.warning(&format!("unknown symbol '{}'", symbol));
        return;
    };
    match vm.memory().read_word(address) {
        Ok(value) => printer.info(&format!("{} = {} (${:04x})", symbol, value, value)),
        Err(e) => printer.error(&e),
    }
}

fn optimize(file: &Path, output: Option<&String>, printer: &Printer) -> CliResult {
    let mut program = read_program_file(file)?;
    let changes = optimize_program(&mut program);
    match output.map(String::as_str) {
        Some("-") => print!("{}", write_program(&program)),
        Some(path) => {
            write_program_file(&program, Path::new(path))?;
            printer.success(&format!("{} changes, written to {}", changes, path));
        }
        None => {
            let path = default_output_path(&program);
            write_program_file(&program, &path)?;
            printer.success(&format!("{} changes, written to {}", changes, path.display()));
        }
    }
    Ok(())
}

fn disasm(file: &Path, plain: bool, printer: &Printer) -> CliResult {
    let program = read_program_file(file)?;
    let vm = VirtualMachine::load(&program, VmConfig::default())?;
    if plain {
        print!("{}", disassembler::disassemble_text(&vm));
    } else {
        printer.title(&format!("program '{}': {} instructions", program.name, vm.instruction_count()));
        printer.table(&["index", "labels", "instruction"], disassembler::disassemble(&vm));
    }
    Ok(())
}
