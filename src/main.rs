#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;
extern crate strum;
#[macro_use] extern crate strum_macros;

mod bytecode;
mod loader;
mod machine;
mod symboltable;

use std::env;
use std::fs;
use std::process;

use crate::machine::{ExecutionState, Machine};

fn usage(program: &str) -> ! {
  eprintln!("Usage: {} <program.bin>", program);
  eprintln!("       {} --assemble <program.asm> <output.bin>", program);
  process::exit(1);
}

/// Loads a binary image and runs it to a terminal state.
fn run(path: &str) -> i32 {
  let image = match loader::read_program(path) {
    Ok(image) => image,
    Err(error) => {
      eprintln!("Error: {}", error);
      return 1;
    }
  };

  let mut machine = Machine::new();
  if let Err(error) = machine.load(&image) {
    eprintln!("Error: {}", error);
    return 1;
  }

  match machine.run() {
    ExecutionState::Halted => 0,
    ExecutionState::Faulted(fault) => {
      eprintln!("Error: {}", fault);
      1
    }
    ExecutionState::Running => unreachable!("run() returned while still running"),
  }
}

/// Assembles a source file into a binary the loader can run.
fn assemble(source_path: &str, output_path: &str) -> i32 {
  let text = match fs::read_to_string(source_path) {
    Ok(text) => text,
    Err(error) => {
      eprintln!("Error: could not read {}: {}", source_path, error);
      return 1;
    }
  };

  let words = match bytecode::assemble(&text) {
    Ok(words) => words,
    Err(error) => {
      eprintln!("{}", error);
      return 1;
    }
  };

  match loader::write_program(output_path, &words) {
    Ok(()) => {
      println!("Assembled {} words to {}", words.len(), output_path);
      0
    }
    Err(error) => {
      eprintln!("Error: {}", error);
      1
    }
  }
}

fn main() {
  let args: Vec<String> = env::args().collect();

  let exit_code = match args.len() {
    2 if args[1] != "--assemble" => run(&args[1]),
    4 if args[1] == "--assemble" => assemble(&args[2], &args[3]),
    _ => usage(args.get(0).map(String::as_str).unwrap_or("riscward")),
  };

  process::exit(exit_code);
}
