//! Matching driver: compile a pattern, match an input, and report the
//! verdict.  `-v` additionally dumps the automaton.

use std::env;
use std::process;

use regex_thompson::Regex;

fn usage(program: &str) -> ! {
    eprintln!("usage: {} <pattern> <input> [-v]", program);
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
    }

    let pattern = &args[1];
    let input = &args[2];
    let verbose = match args.get(3).map(String::as_str) {
        None => false,
        Some("-v") => true,
        Some(_) => usage(&args[0]),
    };
    if args.len() > 4 {
        usage(&args[0]);
    }

    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(1);
        }
    };

    println!("Pattern: {}", regex.pattern());
    if verbose {
        println!("NFA:");
        regex.render(std::io::stdout().lock());
    }

    let verdict = if regex.is_match(input.as_bytes()) {
        "yes"
    } else {
        "no"
    };
    println!("Does `{}` match: {}", input, verdict);
}
