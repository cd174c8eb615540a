//! The machine itself: register file, word-addressed memory, program
//! counter, and the fetch-decode-execute engine that drives them.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::io::{self, Write as IoWrite};

use prettytable::{format as TableFormat, Table};

use crate::bytecode::{opcode_field, Instruction, Operation, Word};
use crate::loader::LoadError;

/// Memory holds this many 32-bit words.
pub const MEMORY_WORDS: usize = 2048;
/// The register file holds this many signed 32-bit registers.
pub const REGISTER_COUNT: usize = 32;
/// The register syscalls read from and write to, by convention.
pub const IO_REGISTER: usize = 20;

/**
  A terminal, unrecoverable error raised during a single execution step.
  Every fault ends the run; there are no retries anywhere in this machine.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Fault {
  /// The fetched word's opcode field has no assigned operation.
  InvalidOpcode(u8),
  /// A fetch, load, store, or jump named a word outside memory.
  OutOfBounds { address: i64 },
  /// The policy for `div`/`divi` with a zero divisor.
  DivisionByZero,
  /// The console read behind syscall selector 0 failed outright.
  Input(String),
}

impl Display for Fault {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Fault::InvalidOpcode(code) => {
        write!(f, "invalid opcode {}", code)
      }
      Fault::OutOfBounds { address } => {
        write!(f, "memory address {} out of bounds", address)
      }
      Fault::DivisionByZero => {
        write!(f, "division by zero")
      }
      Fault::Input(cause) => {
        write!(f, "console read failed: {}", cause)
      }
    }
  }
}

/// The result of one fetch-decode-execute cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepOutcome {
  Continue,
  Halt,
  Fault(Fault),
}

/// `Halted` and `Faulted` are terminal; `step` refuses to run past them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExecutionState {
  Running,
  Halted,
  Faulted(Fault),
}

impl Display for ExecutionState {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ExecutionState::Running => write!(f, "running"),
      ExecutionState::Halted => write!(f, "halted"),
      ExecutionState::Faulted(fault) => write!(f, "fault: {}", fault),
    }
  }
}

/**
  The console a running program talks to through syscalls. The stdin/stdout
  implementation below is the only one the binary uses; tests substitute a
  scripted console to capture output events.
*/
pub trait Console {
  /// Blocks until a signed integer is available. No timeout exists.
  fn read_integer(&mut self, prompt: &str) -> io::Result<i32>;
  fn write(&mut self, text: &str);
}

pub struct StdConsole;

impl Console for StdConsole {
  fn read_integer(&mut self, prompt: &str) -> io::Result<i32> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    line
      .trim()
      .parse::<i32>()
      .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
  }

  fn write(&mut self, text: &str) {
    print!("{}", text);
    let _ = io::stdout().flush();
  }
}

pub struct Machine {
  registers: [i32; REGISTER_COUNT], // r0 is ordinary storage; writes persist
  memory: Vec<Word>,
  pc: usize,
  state: ExecutionState,
  console: Box<dyn Console>,
}

impl Machine {

  // region Construction and loading

  pub fn new() -> Machine {
    Machine::with_console(Box::new(StdConsole))
  }

  pub fn with_console(console: Box<dyn Console>) -> Machine {
    Machine {
      registers: [0; REGISTER_COUNT],
      memory: vec![0; MEMORY_WORDS],
      pc: 0,
      state: ExecutionState::Running,
      console,
    }
  }

  /// Copies a program image into memory starting at word 0.
  pub fn load(&mut self, image: &[Word]) -> Result<(), LoadError> {
    if image.len() > MEMORY_WORDS {
      return Err(LoadError::TooLarge { words: image.len() });
    }
    self.memory[..image.len()].copy_from_slice(image);
    Ok(())
  }

  pub fn state(&self) -> &ExecutionState {
    &self.state
  }

  pub fn register(&self, index: usize) -> i32 {
    self.registers[index]
  }

  pub fn pc(&self) -> usize {
    self.pc
  }

  // endregion

  // region The fetch-decode-execute engine

  /**
    Performs exactly one fetch-decode-execute cycle. The program counter is
    advanced past the fetched word *before* the instruction runs, so a
    control transfer overwrites the pre-incremented value and a linking jump
    records the address of the following instruction.
  */
  pub fn step(&mut self) -> StepOutcome {
    if self.state != ExecutionState::Running {
      return StepOutcome::Halt;
    }
    let outcome = match self.cycle() {
      Ok(true) => StepOutcome::Continue,
      Ok(false) => StepOutcome::Halt,
      Err(fault) => StepOutcome::Fault(fault),
    };
    match &outcome {
      StepOutcome::Continue => {}
      StepOutcome::Halt => self.state = ExecutionState::Halted,
      StepOutcome::Fault(fault) => self.state = ExecutionState::Faulted(fault.clone()),
    }
    outcome
  }

  /// Drives `step` until the machine reaches a terminal state.
  pub fn run(&mut self) -> &ExecutionState {
    while let ExecutionState::Running = self.state {
      self.step();
    }
    #[cfg(feature = "trace_execution")] println!("{}", self);
    &self.state
  }

  /// `Ok(true)` to keep running, `Ok(false)` on a halt instruction.
  fn cycle(&mut self) -> Result<bool, Fault> {
    if self.pc >= MEMORY_WORDS {
      return Err(Fault::OutOfBounds { address: self.pc as i64 });
    }
    let word = self.memory[self.pc];
    self.pc += 1;

    let raw_opcode = opcode_field(word);
    let opcode = Operation::try_from(raw_opcode)
      .map_err(|_| Fault::InvalidOpcode(raw_opcode))?;
    let instruction = Instruction::decode(opcode, word);

    #[cfg(feature = "trace_execution")]
    println!("{:>4}: {}", self.pc - 1, instruction);

    self.execute(instruction)
  }

  fn execute(&mut self, instruction: Instruction) -> Result<bool, Fault> {
    match instruction {

      Instruction::Register { op, rd, rs1, rs2 } => {
        let value = self.alu(op, self.registers[rs1], self.registers[rs2])?;
        self.write_register(rd, value);
      }

      Instruction::Immediate { op: Operation::Load, rd, rs, imm } => {
        let address = self.effective_address(rs, imm)?;
        self.write_register(rd, self.memory[address] as i32);
      }

      Instruction::Immediate { op: Operation::Store, rd, rs, imm } => {
        let address = self.effective_address(rs, imm)?;
        self.memory[address] = self.registers[rd] as Word;
      }

      Instruction::Immediate { op, rd, rs, imm } => {
        let value = self.alu(op, self.registers[rs], imm)?;
        self.write_register(rd, value);
      }

      Instruction::JumpRegister { rd, ra } => {
        let target = self.registers[ra];
        if target < 0 {
          return Err(Fault::OutOfBounds { address: target as i64 });
        }
        self.write_register(rd, self.pc as i32);
        self.pc = target as usize;
      }

      Instruction::JumpImmediate { rd, addr } => {
        self.write_register(rd, self.pc as i32);
        self.pc = addr as usize;
      }

      Instruction::Branch { op, rs, addr } => {
        let taken = match op {
          Operation::Braz => self.registers[rs] == 0,
          _ => self.registers[rs] != 0,
        };
        if taken {
          self.pc = addr as usize;
        }
      }

      Instruction::Syscall { selector } => {
        self.syscall(selector)?;
      }

      Instruction::Stop => {
        return Ok(false);
      }

    }
    Ok(true)
  }

  /**
    Register arithmetic. All of it is two's-complement 32-bit with wrapping;
    nothing here traps on overflow. A zero divisor is the machine's one
    arithmetic fault, and shift amounts are masked to their low five bits,
    so every operand combination has a defined result.
  */
  fn alu(&self, op: Operation, a: i32, b: i32) -> Result<i32, Fault> {
    use Operation::*;
    let value = match op {
      Add | Addi => a.wrapping_add(b),
      Sub | Subi => a.wrapping_sub(b),
      Mul | Muli => a.wrapping_mul(b),
      Div | Divi => {
        if b == 0 {
          return Err(Fault::DivisionByZero);
        }
        // i32::MIN / -1 wraps like the other operations.
        a.wrapping_div(b)
      }
      And | Andi => a & b,
      Or  | Ori  => a | b,
      Xor | Xori => a ^ b,
      Shl | Shli => ((a as u32) << (b as u32 & 0x1F)) as i32,
      Shr | Shri => ((a as u32) >> (b as u32 & 0x1F)) as i32,
      Slt | Slti => (a < b) as i32,
      Sle | Slei => (a <= b) as i32,
      Seq | Seqi => (a == b) as i32,
      _ => unreachable!("non-arithmetic opcode {} reached the ALU", op),
    };
    Ok(value)
  }

  /**
    The effective address of a load or store: the *value* of the base
    register plus the sign-extended immediate. Both bounds are checked;
    a negative or overflowing address is a fault, never a silent access.
  */
  fn effective_address(&self, rs: usize, imm: i32) -> Result<usize, Fault> {
    let address = self.registers[rs] as i64 + imm as i64;
    if address < 0 || address >= MEMORY_WORDS as i64 {
      return Err(Fault::OutOfBounds { address });
    }
    Ok(address as usize)
  }

  fn write_register(&mut self, index: usize, value: i32) {
    self.registers[index] = value;
  }

  // endregion

  // region Syscalls

  /**
    Console I/O on the dedicated I/O register. Selector 0 blocks the whole
    machine until input arrives. Unrecognized selectors do nothing, by
    specification rather than omission.
  */
  fn syscall(&mut self, selector: Word) -> Result<(), Fault> {
    match selector {

      0 => {
        let value = self
          .console
          .read_integer("? ")
          .map_err(|e| Fault::Input(e.to_string()))?;
        self.write_register(IO_REGISTER, value);
      }

      1 => {
        let value = self.registers[IO_REGISTER];
        self.console.write(&format!("out: {}\n", value));
      }

      2 => {
        let value = self.registers[IO_REGISTER];
        self.console.write(&value.to_string());
      }

      3 => {
        let value = self.registers[IO_REGISTER];
        let character = ((value & 0x7F) as u8) as char;
        self.console.write(&character.to_string());
      }

      _ => {}

    }
    Ok(())
  }

  // endregion

  // region Display methods

  fn make_register_table<T>(name: char, values: &[T], highlight: usize) -> Table
    where T: Display
  {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);

    for (i, value) in values.iter().enumerate() {
      match i == highlight {

        true => {
          table.add_row(
            row![r->format!("* --> {}{} =", name, i), format!("{}", value)]
          );
        }

        false => {
          table.add_row(
            row![r->format!("{}{} =", name, i), format!("{}", value)]
          );
        }

      } // end match on highlight
    } // end for
    table
  }

  fn make_memory_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Word"]);

    for (address, word) in self.memory.iter().enumerate().filter(|(_, w)| **w != 0) {
      table.add_row(
        row![r->format!("mem[{}] =", address), format!("{:#010x}", word)]
      );
    }
    table
  }

  // endregion

}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Machine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let register_table = Machine::make_register_table('r', &self.registers, IO_REGISTER);
    let memory_table = self.make_memory_table();

    let mut combined_table = table!([register_table, memory_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Memory (nonzero words)"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "pc = {}\t{}\n{}", self.pc, self.state, combined_table)
  }
}
