//! Demo driver: compile a pattern, dump the automaton, and optionally
//! report whether an input matches.

use std::env;
use std::process;

use regex_thompson::Regex;

fn main() {
    let args: Vec<String> = env::args().collect();

    let pattern = match args.get(1) {
        Some(pattern) => pattern,
        None => {
            eprintln!("usage: {} <pattern> [<input>]", args[0]);
            process::exit(1);
        }
    };

    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(1);
        }
    };

    println!("Pattern: {}", regex.pattern());
    println!("NFA:");
    regex.render(std::io::stdout().lock());

    if let Some(input) = args.get(2) {
        let verdict = if regex.is_match(input.as_bytes()) {
            "yes"
        } else {
            "no"
        };
        println!("Does `{}` match: {}", input, verdict);
    }
}
