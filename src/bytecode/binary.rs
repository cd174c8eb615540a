/*!
  Encoding and decoding of binary instruction words.

  Every instruction occupies exactly one 32-bit word. The opcode lives in the
  top six bits; the meaning of the remaining 26 bits is fixed by the opcode's
  `InstructionType`. Decoding a word cannot fail: any bit pattern yields some
  field values, and it is the executor's job to reject opcodes with no
  assigned meaning before the field decode ever runs.
*/
use std::fmt::{Display, Formatter};

use super::{Operation, InstructionType};

// If you change this you must also change `Instruction::encode` and
// `Instruction::decode`.
pub type Word = u32;

/// Number of bits the opcode field is shifted left within a word.
pub const OPCODE_SHIFT: u32 = 26;

/// Extracts the raw 6-bit opcode field from an instruction word.
pub fn opcode_field(word: Word) -> u8 {
  ((word >> OPCODE_SHIFT) & 0x3F) as u8
}

/// Sign-extends the 16-bit immediate field to a full `i32`.
fn sign_extend_16(raw: Word) -> i32 {
  (raw & 0xFFFF) as u16 as i16 as i32
}

fn register_field(word: Word, low_bit: u32) -> usize {
  ((word >> low_bit) & 0x1F) as usize
}

/**
  An instruction with its fields decoded, one variant per instruction type.

  Returning this by value from the decoder, and consuming it immediately in
  the executor, is what keeps decode a pure function: there is no scratch
  state shared between a decode and the execution that follows it.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  /// [op:6][rd:5][rs1:5][rs2:5][unused:11]
  Register { op: Operation, rd: usize, rs1: usize, rs2: usize },
  /// [op:6][rd:5][rs:5][imm:16]
  Immediate { op: Operation, rd: usize, rs: usize, imm: i32 },
  /// [op:6][rd:5][ra:5][unused:16]
  JumpRegister { rd: usize, ra: usize },
  /// [op:6][rd:5][addr:21]
  JumpImmediate { rd: usize, addr: Word },
  /// [op:6][rs:5][unused:4][addr:17]
  Branch { op: Operation, rs: usize, addr: Word },
  /// [op:6][selector:26]
  Syscall { selector: Word },
  /// [op:6][unused:26]
  Stop,
}

impl Instruction {

  /**
    Decodes the operand fields of `word` according to the instruction type of
    `op`. Pure function of its two inputs; never reads outside the word and
    never fails.
  */
  pub fn decode(op: Operation, word: Word) -> Instruction {
    match op.instruction_type() {

      Some(InstructionType::R) => Instruction::Register {
        op,
        rd:  register_field(word, 21),
        rs1: register_field(word, 16),
        rs2: register_field(word, 11),
      },

      Some(InstructionType::I) => Instruction::Immediate {
        op,
        rd:  register_field(word, 21),
        rs:  register_field(word, 16),
        imm: sign_extend_16(word),
      },

      Some(InstructionType::Jr) => Instruction::JumpRegister {
        rd: register_field(word, 21),
        ra: register_field(word, 16),
      },

      Some(InstructionType::Ji) => Instruction::JumpImmediate {
        rd:   register_field(word, 21),
        addr: word & 0x001F_FFFF,
      },

      Some(InstructionType::B) => Instruction::Branch {
        op,
        rs:   register_field(word, 21),
        addr: word & 0x0001_FFFF,
      },

      Some(InstructionType::S) => Instruction::Syscall {
        selector: word & 0x03FF_FFFF,
      },

      None => Instruction::Stop,
    }
  }

  /**
    Encodes the instruction into a word. Inverse of `decode` for operand
    values within their field widths; the assembler range-checks operands
    before calling this, so out-of-range values are masked rather than
    rejected here.
  */
  pub fn encode(&self) -> Word {
    match *self {

      Instruction::Register { op, rd, rs1, rs2 } => {
        ((op.code() as Word) << OPCODE_SHIFT)
          | (((rd  as Word) & 0x1F) << 21)
          | (((rs1 as Word) & 0x1F) << 16)
          | (((rs2 as Word) & 0x1F) << 11)
      }

      Instruction::Immediate { op, rd, rs, imm } => {
        ((op.code() as Word) << OPCODE_SHIFT)
          | (((rd as Word) & 0x1F) << 21)
          | (((rs as Word) & 0x1F) << 16)
          | ((imm as Word) & 0xFFFF)
      }

      Instruction::JumpRegister { rd, ra } => {
        ((Operation::Jmpr.code() as Word) << OPCODE_SHIFT)
          | (((rd as Word) & 0x1F) << 21)
          | (((ra as Word) & 0x1F) << 16)
      }

      Instruction::JumpImmediate { rd, addr } => {
        ((Operation::Jmpi.code() as Word) << OPCODE_SHIFT)
          | (((rd as Word) & 0x1F) << 21)
          | (addr & 0x001F_FFFF)
      }

      Instruction::Branch { op, rs, addr } => {
        ((op.code() as Word) << OPCODE_SHIFT)
          | (((rs as Word) & 0x1F) << 21)
          | (addr & 0x0001_FFFF)
      }

      Instruction::Syscall { selector } => {
        ((Operation::Scall.code() as Word) << OPCODE_SHIFT)
          | (selector & 0x03FF_FFFF)
      }

      Instruction::Stop => {
        (Operation::Stop.code() as Word) << OPCODE_SHIFT
      }

    }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::Register { op, rd, rs1, rs2 } => {
        write!(f, "{} r{},r{},r{}", op, rd, rs1, rs2)
      }

      Instruction::Immediate { op, rd, rs, imm } => {
        write!(f, "{} r{},r{},{}", op, rd, rs, imm)
      }

      Instruction::JumpRegister { rd, ra } => {
        write!(f, "jmp r{},r{}", ra, rd)
      }

      Instruction::JumpImmediate { rd, addr } => {
        write!(f, "jmp {},r{}", addr, rd)
      }

      Instruction::Branch { op, rs, addr } => {
        write!(f, "{} r{},{}", op, rs, addr)
      }

      Instruction::Syscall { selector } => {
        write!(f, "scall {}", selector)
      }

      Instruction::Stop => {
        write!(f, "stop")
      }

    }
  }
}
