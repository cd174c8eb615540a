/*!
  The human readable textual form of programs is called assembly. This module
  parses assembly source and assembles it into binary instruction words in
  two passes: the first pass records the word address of every label, the
  second resolves label operands and encodes each statement.

  The surface syntax, inherited from the machine's original toolchain:

  ```text
  ; comments run to end of line
  start:  addi r1,r0,5
          braz r1,done      ; labels name word addresses
          jmp  done,r2      ; immediate jump, links pc into r2
          jmp  r2,r0        ; register jump when the target is a register
  done:   stop
  ```

  Mnemonics are the lowercase `Operation` names via `strum`, plus the
  polymorphic `jmp`, which assembles to `jmpr` or `jmpi` depending on
  whether its target operand is a register.
*/
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use string_cache::DefaultAtom;
use nom::{
  branch::alt,
  bytes::complete::take_while1,
  character::complete::{char as one_char, digit1, space0, space1},
  combinator::{all_consuming, map, map_res, opt, recognize},
  multi::separated_list,
  sequence::{delimited, pair, preceded, terminated},
  IResult,
};

use crate::symboltable::SymbolTable;
use super::{Instruction, InstructionType, Operation, Word};

/// One operand as written in the source, before label resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Operand {
  Register(usize),
  Immediate(i32),
  Label(DefaultAtom),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AssemblyError {
  Syntax { line: u32 },
  UnknownMnemonic { line: u32, name: String },
  WrongOperands { line: u32, mnemonic: String, expected: &'static str },
  OutOfRange { line: u32, field: &'static str, value: i64 },
  BadRegister { line: u32, index: usize },
  UnknownLabel { line: u32, name: String },
  DuplicateLabel { name: String },
}

impl Display for AssemblyError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      AssemblyError::Syntax { line } => {
        write!(f, "Error on line {}: unparsable statement.", line)
      }
      AssemblyError::UnknownMnemonic { line, name } => {
        write!(f, "Error on line {}: {} is not an operation.", line, name)
      }
      AssemblyError::WrongOperands { line, mnemonic, expected } => {
        write!(f, "Error on line {}: {} requires operands {}.", line, mnemonic, expected)
      }
      AssemblyError::OutOfRange { line, field, value } => {
        write!(f, "Error on line {}: {} {} does not fit its field.", line, field, value)
      }
      AssemblyError::BadRegister { line, index } => {
        write!(f, "Error on line {}: there is no register r{}.", line, index)
      }
      AssemblyError::UnknownLabel { line, name } => {
        write!(f, "Error on line {}: label {} is never defined.", line, name)
      }
      AssemblyError::DuplicateLabel { name } => {
        write!(f, "Error: label {} is defined more than once.", name)
      }
    }
  }
}

// region Line parsers

fn register(input: &str) -> IResult<&str, Operand> {
  map_res(
    preceded(one_char('r'), digit1),
    |digits: &str| digits.parse::<usize>().map(Operand::Register),
  )(input)
}

fn immediate(input: &str) -> IResult<&str, Operand> {
  map_res(
    recognize(pair(opt(one_char('-')), digit1)),
    |digits: &str| digits.parse::<i32>().map(Operand::Immediate),
  )(input)
}

fn label_name(input: &str) -> IResult<&str, &str> {
  take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
  alt((
    register,
    immediate,
    map(label_name, |name| Operand::Label(DefaultAtom::from(name))),
  ))(input)
}

fn statement(input: &str) -> IResult<&str, (&str, Vec<Operand>)> {
  pair(
    take_while1(|c: char| c.is_ascii_alphabetic()),
    map(
      opt(preceded(
        space1,
        separated_list(delimited(space0, one_char(','), space0), operand),
      )),
      Option::unwrap_or_default,
    ),
  )(input)
}

/**
  Parses one comment-stripped source line into an optional label definition
  and an optional statement. Blank lines yield `(None, None)`.
*/
#[allow(clippy::type_complexity)]
fn source_line(input: &str)
  -> IResult<&str, (Option<&str>, Option<(&str, Vec<Operand>)>)>
{
  all_consuming(delimited(
    space0,
    pair(
      opt(terminated(label_name, pair(one_char(':'), space0))),
      opt(statement),
    ),
    space0,
  ))(input)
}

// endregion

// region Statement assembly

/// Resolves a jump or branch target to a word address.
fn resolve_target(
  target: &Operand,
  line: u32,
  mnemonic: &str,
  expected: &'static str,
  symbols: &SymbolTable,
) -> Result<i64, AssemblyError> {
  match target {
    Operand::Immediate(value) => Ok(*value as i64),
    Operand::Label(name) => {
      match symbols.get_address(name) {
        Some(address) => Ok(address as i64),
        None => Err(AssemblyError::UnknownLabel {
          line,
          name: name.to_string(),
        }),
      }
    }
    Operand::Register(_) => Err(AssemblyError::WrongOperands {
      line,
      mnemonic: mnemonic.to_string(),
      expected,
    }),
  }
}

fn require_register(operand: &Operand, line: u32, mnemonic: &str, expected: &'static str)
  -> Result<usize, AssemblyError>
{
  match operand {
    Operand::Register(index) if *index < crate::machine::REGISTER_COUNT => Ok(*index),
    Operand::Register(index) => Err(AssemblyError::BadRegister { line, index: *index }),
    _ => Err(AssemblyError::WrongOperands {
      line,
      mnemonic: mnemonic.to_string(),
      expected,
    }),
  }
}

fn check_range(value: i64, bits: u32, field: &'static str, line: u32)
  -> Result<Word, AssemblyError>
{
  match (0..(1i64 << bits)).contains(&value) {
    true  => Ok(value as Word),
    false => Err(AssemblyError::OutOfRange { line, field, value }),
  }
}

/**
  Turns one parsed statement into an `Instruction`, resolving labels against
  the symbol table built by the first pass.
*/
fn build_instruction(
  line: u32,
  mnemonic: &str,
  operands: &[Operand],
  symbols: &SymbolTable,
) -> Result<Instruction, AssemblyError> {

  // `jmp` picks its real opcode from the kind of its target operand.
  if mnemonic == "jmp" {
    const EXPECTED: &str = "target,rd";
    if operands.len() != 2 {
      return Err(AssemblyError::WrongOperands {
        line, mnemonic: mnemonic.to_string(), expected: EXPECTED,
      });
    }
    let rd = require_register(&operands[1], line, mnemonic, EXPECTED)?;
    return match &operands[0] {
      Operand::Register(_) => {
        let ra = require_register(&operands[0], line, mnemonic, EXPECTED)?;
        Ok(Instruction::JumpRegister { rd, ra })
      }
      target => {
        let addr = resolve_target(target, line, mnemonic, EXPECTED, symbols)?;
        Ok(Instruction::JumpImmediate {
          rd,
          addr: check_range(addr, 21, "jump address", line)?,
        })
      }
    };
  }

  let op = Operation::from_str(mnemonic).map_err(|_| {
    AssemblyError::UnknownMnemonic { line, name: mnemonic.to_string() }
  })?;

  match op.instruction_type() {

    Some(InstructionType::R) => {
      const EXPECTED: &str = "rd,rs1,rs2";
      if operands.len() != 3 {
        return Err(AssemblyError::WrongOperands {
          line, mnemonic: mnemonic.to_string(), expected: EXPECTED,
        });
      }
      Ok(Instruction::Register {
        op,
        rd:  require_register(&operands[0], line, mnemonic, EXPECTED)?,
        rs1: require_register(&operands[1], line, mnemonic, EXPECTED)?,
        rs2: require_register(&operands[2], line, mnemonic, EXPECTED)?,
      })
    }

    Some(InstructionType::I) => {
      const EXPECTED: &str = "rd,rs,imm";
      if operands.len() != 3 {
        return Err(AssemblyError::WrongOperands {
          line, mnemonic: mnemonic.to_string(), expected: EXPECTED,
        });
      }
      let imm = match &operands[2] {
        Operand::Immediate(value) => *value,
        _ => {
          return Err(AssemblyError::WrongOperands {
            line, mnemonic: mnemonic.to_string(), expected: EXPECTED,
          });
        }
      };
      if imm < i16::min_value() as i32 || imm > i16::max_value() as i32 {
        return Err(AssemblyError::OutOfRange {
          line, field: "immediate", value: imm as i64,
        });
      }
      Ok(Instruction::Immediate {
        op,
        rd: require_register(&operands[0], line, mnemonic, EXPECTED)?,
        rs: require_register(&operands[1], line, mnemonic, EXPECTED)?,
        imm,
      })
    }

    Some(InstructionType::Jr) => {
      const EXPECTED: &str = "ra,rd";
      if operands.len() != 2 {
        return Err(AssemblyError::WrongOperands {
          line, mnemonic: mnemonic.to_string(), expected: EXPECTED,
        });
      }
      Ok(Instruction::JumpRegister {
        ra: require_register(&operands[0], line, mnemonic, EXPECTED)?,
        rd: require_register(&operands[1], line, mnemonic, EXPECTED)?,
      })
    }

    Some(InstructionType::Ji) => {
      const EXPECTED: &str = "target,rd";
      if operands.len() != 2 {
        return Err(AssemblyError::WrongOperands {
          line, mnemonic: mnemonic.to_string(), expected: EXPECTED,
        });
      }
      let addr = resolve_target(&operands[0], line, mnemonic, EXPECTED, symbols)?;
      Ok(Instruction::JumpImmediate {
        rd:   require_register(&operands[1], line, mnemonic, EXPECTED)?,
        addr: check_range(addr, 21, "jump address", line)?,
      })
    }

    Some(InstructionType::B) => {
      const EXPECTED: &str = "rs,target";
      if operands.len() != 2 {
        return Err(AssemblyError::WrongOperands {
          line, mnemonic: mnemonic.to_string(), expected: EXPECTED,
        });
      }
      let addr = resolve_target(&operands[1], line, mnemonic, EXPECTED, symbols)?;
      Ok(Instruction::Branch {
        op,
        rs:   require_register(&operands[0], line, mnemonic, EXPECTED)?,
        addr: check_range(addr, 17, "branch address", line)?,
      })
    }

    Some(InstructionType::S) => {
      const EXPECTED: &str = "selector";
      match operands {
        [Operand::Immediate(selector)] => Ok(Instruction::Syscall {
          selector: check_range(*selector as i64, 26, "syscall selector", line)?,
        }),
        _ => Err(AssemblyError::WrongOperands {
          line, mnemonic: mnemonic.to_string(), expected: EXPECTED,
        }),
      }
    }

    None => {
      match operands.is_empty() {
        true  => Ok(Instruction::Stop),
        false => Err(AssemblyError::WrongOperands {
          line, mnemonic: mnemonic.to_string(), expected: "no operands",
        }),
      }
    }

  }
}

// endregion

/**
  Assembles a complete source text into binary instruction words. Each
  statement becomes exactly one word, so a label's address is the count of
  statements preceding it.
*/
pub fn assemble(text: &str) -> Result<Vec<Word>, AssemblyError> {
  let mut symbols = SymbolTable::new();
  let mut statements: Vec<(u32, &str, Vec<Operand>)> = Vec::new();

  // First pass: parse every line, recording label addresses as we go.
  for (index, raw_line) in text.lines().enumerate() {
    let number = index as u32 + 1;
    let stripped = raw_line.split(';').next().unwrap_or("");

    let (_rest, (label, parsed)) = source_line(stripped)
      .map_err(|_| AssemblyError::Syntax { line: number })?;

    if let Some(name) = label {
      symbols
        .insert(DefaultAtom::from(name), statements.len() as Word)
        .map_err(|(name, _)| AssemblyError::DuplicateLabel { name: name.to_string() })?;
    }
    if let Some((mnemonic, operands)) = parsed {
      statements.push((number, mnemonic, operands));
    }
  }

  // Second pass: resolve labels and encode.
  let mut words = Vec::with_capacity(statements.len());
  for (number, mnemonic, operands) in &statements {
    let instruction = build_instruction(*number, mnemonic, operands, &symbols)?;
    words.push(instruction.encode());
  }
  Ok(words)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn straight_line_program() {
    let words = assemble(
      "addi r1,r0,5\n\
       addi r2,r0,7\n\
       add r3,r1,r2\n\
       scall 2\n\
       stop\n",
    ).unwrap();

    assert_eq!(words.len(), 5);
    assert_eq!(
      words[0],
      Instruction::Immediate { op: Operation::Addi, rd: 1, rs: 0, imm: 5 }.encode()
    );
    assert_eq!(
      words[2],
      Instruction::Register { op: Operation::Add, rd: 3, rs1: 1, rs2: 2 }.encode()
    );
    assert_eq!(words[3], Instruction::Syscall { selector: 2 }.encode());
    assert_eq!(words[4], Instruction::Stop.encode());
  }

  #[test]
  fn labels_comments_and_blank_lines() {
    let words = assemble(
      "; countdown from r1\n\
       \n\
       start:  addi r1,r0,3\n\
       loop:   subi r1,r1,1   ; decrement\n\
               branz r1,loop\n\
       done:   stop\n",
    ).unwrap();

    assert_eq!(words.len(), 4);
    // `loop` names word 1; the branch must carry that address.
    assert_eq!(
      words[2],
      Instruction::Branch { op: Operation::Branz, rs: 1, addr: 1 }.encode()
    );
  }

  #[test]
  fn a_label_on_its_own_line_names_the_next_statement() {
    let words = assemble(
      "addi r1,r0,1\n\
       end:\n\
       stop\n\
       jmp end,r0\n",
    ).unwrap();

    assert_eq!(
      words[2],
      Instruction::JumpImmediate { rd: 0, addr: 1 }.encode()
    );
  }

  #[test]
  fn jmp_resolves_to_register_or_immediate_form() {
    let words = assemble("jmp r5,r1\njmp 3,r1\nstop\n").unwrap();
    assert_eq!(words[0], Instruction::JumpRegister { rd: 1, ra: 5 }.encode());
    assert_eq!(words[1], Instruction::JumpImmediate { rd: 1, addr: 3 }.encode());
  }

  #[test]
  fn forward_references_resolve() {
    let words = assemble("braz r0,skip\naddi r1,r0,1\nskip: stop\n").unwrap();
    assert_eq!(
      words[0],
      Instruction::Branch { op: Operation::Braz, rs: 0, addr: 2 }.encode()
    );
  }

  #[test]
  fn negative_immediates() {
    let words = assemble("addi r1,r0,-32768\nstop\n").unwrap();
    assert_eq!(
      words[0],
      Instruction::Immediate { op: Operation::Addi, rd: 1, rs: 0, imm: -32768 }.encode()
    );
  }

  #[test]
  fn unknown_mnemonic_reports_its_line() {
    let error = assemble("addi r1,r0,1\nfrobnicate r1\n").unwrap_err();
    assert_eq!(
      error,
      AssemblyError::UnknownMnemonic { line: 2, name: "frobnicate".to_string() }
    );
  }

  #[test]
  fn wrong_operand_count_is_rejected() {
    let error = assemble("add r1,r2\n").unwrap_err();
    assert_eq!(
      error,
      AssemblyError::WrongOperands {
        line: 1,
        mnemonic: "add".to_string(),
        expected: "rd,rs1,rs2",
      }
    );
  }

  #[test]
  fn oversized_immediate_is_rejected() {
    let error = assemble("addi r1,r0,40000\n").unwrap_err();
    assert_eq!(
      error,
      AssemblyError::OutOfRange { line: 1, field: "immediate", value: 40000 }
    );
  }

  #[test]
  fn register_index_out_of_range() {
    let error = assemble("add r1,r2,r32\n").unwrap_err();
    assert_eq!(error, AssemblyError::BadRegister { line: 1, index: 32 });
  }

  #[test]
  fn undefined_and_duplicate_labels() {
    let error = assemble("braz r0,nowhere\n").unwrap_err();
    assert_eq!(
      error,
      AssemblyError::UnknownLabel { line: 1, name: "nowhere".to_string() }
    );

    let error = assemble("a: stop\na: stop\n").unwrap_err();
    assert_eq!(error, AssemblyError::DuplicateLabel { name: "a".to_string() });
  }

  #[test]
  fn halt_is_an_accepted_spelling() {
    let words = assemble("halt\n").unwrap();
    assert_eq!(words, vec![Instruction::Stop.encode()]);
  }
}
