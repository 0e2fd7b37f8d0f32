use std::env;
use std::io;
use std::process::ExitCode;

use route_cli::{parse_command, run};

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run_cli() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        print_usage();
        return Ok(());
    }

    let kind = parse_command(&args).map_err(|message| format!("{message}\n\n{}", usage_text()))?;
    run(kind, &mut io::stdout())
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "route_cli - offline canal map route queries",
        "",
        "Usage:",
        "  route_cli route --map <file> --from <lat,lng> --to <lat,lng> [--mode real|all]",
        "  route_cli request --map <file> --request <file.json>",
        "  route_cli check --map <file>",
        "",
        "Defaults:",
        "  --mode real",
    ]
    .join("\n")
}
