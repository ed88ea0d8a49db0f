use std::env;
use std::io::{self, Write};

use btreedb::engine::Engine;

const DEFAULT_DB_PATH: &str = "btreedb.db";

fn main() {
    env_logger::init();

    let mut db_path = DEFAULT_DB_PATH.to_string();
    let mut in_memory = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mem" => in_memory = true,
            "--db" => match args.next() {
                Some(path) => db_path = path,
                None => {
                    eprintln!("--db requires a path argument");
                    std::process::exit(1);
                }
            },
            other => {
                eprintln!("unrecognized argument: {other}");
                std::process::exit(1);
            }
        }
    }

    let opened = if in_memory {
        btreedb::open_in_memory()
    } else {
        btreedb::open_file(&db_path)
    };
    let mut engine = match opened {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to open database: {e}");
            std::process::exit(1);
        }
    };

    // Check if running in non-interactive mode (input is piped)
    if atty::is(atty::Stream::Stdin) {
        run_interactive(&mut engine);
    } else {
        run_piped(&mut engine);
    }
}

fn run_interactive(engine: &mut Engine) {
    println!("btreedb - embedded relational storage engine");
    println!("Type 'exit' to quit\n");

    loop {
        print!("btreedb> ");
        io::stdout().flush().unwrap();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        }

        let query = input.trim();
        if query.eq_ignore_ascii_case("exit") {
            println!("Goodbye!");
            break;
        }
        if query.is_empty() {
            continue;
        }

        match btreedb::process_query(engine, query) {
            Ok(result) => println!("{result}"),
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

fn run_piped(engine: &mut Engine) {
    // Non-interactive mode - process a single query from stdin.
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return;
    }
    let query = input.trim();
    if query.is_empty() {
        return;
    }
    match btreedb::process_query(engine, query) {
        Ok(result) => println!("{result}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}
