
use strum_macros::{Display as StrumDisplay, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

/**
  Opcodes of the virtual machine.

  The discriminants are the 6-bit values that appear in bits 31:26 of an
  encoded instruction word. The numbering has gaps (1, 26, 28); a word whose
  opcode field holds a gap value or anything above `Stop` has no meaning, and
  executing one is a fault. Opcode 0 (`Halt`) stops the machine exactly as
  `Stop` does, so a zero-filled memory word acts as a halt rather than
  running off into uninitialized memory.

  Mnemonics are the lowercase variant names, via `strum`, so the assembler
  and the disassembly trace stay in sync with this single enum.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq, PartialEq,  Debug,        Hash
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Operation {
  Halt  =  0,
  Add   =  2,
  Addi  =  3,
  Sub   =  4,
  Subi  =  5,
  Mul   =  6,
  Muli  =  7,
  Div   =  8,
  Divi  =  9,
  And   = 10,
  Andi  = 11,
  Or    = 12,
  Ori   = 13,
  Xor   = 14,
  Xori  = 15,
  Shl   = 16,
  Shli  = 17,
  Shr   = 18,
  Shri  = 19,
  Slt   = 20,
  Slti  = 21,
  Sle   = 22,
  Slei  = 23,
  Seq   = 24,
  Seqi  = 25,
  Load  = 27,
  Store = 29,
  Jmpr  = 30,
  Jmpi  = 31,
  Braz  = 32,
  Branz = 33,
  Scall = 34,
  Stop  = 35,
}

/// How the low 26 bits of an instruction word are partitioned into fields.
#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum InstructionType {
  /// rd = bits 25:21, rs1 = bits 20:16, rs2 = bits 15:11
  R,
  /// rd = bits 25:21, rs = bits 20:16, imm = bits 15:0 sign-extended
  I,
  /// rd = bits 25:21, ra = bits 20:16
  Jr,
  /// rd = bits 25:21, addr = bits 20:0
  Ji,
  /// rs = bits 25:21, addr = bits 16:0
  B,
  /// selector = bits 25:0
  S,
}

impl Operation {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  /**
    The instruction type is a pure function of the opcode. `Halt` and `Stop`
    carry no operand fields at all, hence `None`.

    This match is the single authority for the opcode→type mapping; the
    compiler checks it exhaustively, so adding an opcode without declaring
    its field layout is a build error rather than a silent misdecode.
  */
  pub fn instruction_type(&self) -> Option<InstructionType> {
    use Operation::*;
    match self {
      | Add | Sub | Mul | Div | And | Or | Xor | Shl | Shr
      | Slt | Sle | Seq
        => Some(InstructionType::R),

      | Addi | Subi | Muli | Divi | Andi | Ori | Xori | Shli | Shri
      | Slti | Slei | Seqi | Load | Store
        => Some(InstructionType::I),

      Jmpr  => Some(InstructionType::Jr),
      Jmpi  => Some(InstructionType::Ji),

      | Braz | Branz
        => Some(InstructionType::B),

      Scall => Some(InstructionType::S),

      | Halt | Stop
        => None,
    }
  }
}


#[cfg(test)]
mod tests {
  use std::convert::TryFrom;
  use std::str::FromStr;

  use super::*;

  #[test]
  fn opcode_numbering_matches_the_binary_format() {
    assert_eq!(Operation::Add.code(),   2);
    assert_eq!(Operation::Seqi.code(), 25);
    assert_eq!(Operation::Load.code(), 27);
    assert_eq!(Operation::Store.code(), 29);
    assert_eq!(Operation::Stop.code(), 35);
  }

  #[test]
  fn unassigned_opcodes_do_not_decode() {
    assert!(Operation::try_from(1u8).is_err());
    assert!(Operation::try_from(26u8).is_err());
    assert!(Operation::try_from(28u8).is_err());
    assert!(Operation::try_from(36u8).is_err());
    assert!(Operation::try_from(63u8).is_err());
  }

  #[test]
  fn mnemonics_round_trip() {
    assert_eq!(Operation::Addi.to_string(), "addi");
    assert_eq!(Operation::from_str("branz"), Ok(Operation::Branz));
    assert_eq!(Operation::from_str("scall"), Ok(Operation::Scall));
    assert!(Operation::from_str("frobnicate").is_err());
  }

  #[test]
  fn every_operation_declares_its_type() {
    assert_eq!(Operation::Add.instruction_type(),   Some(InstructionType::R));
    assert_eq!(Operation::Store.instruction_type(), Some(InstructionType::I));
    assert_eq!(Operation::Jmpr.instruction_type(),  Some(InstructionType::Jr));
    assert_eq!(Operation::Jmpi.instruction_type(),  Some(InstructionType::Ji));
    assert_eq!(Operation::Braz.instruction_type(),  Some(InstructionType::B));
    assert_eq!(Operation::Scall.instruction_type(), Some(InstructionType::S));
    assert_eq!(Operation::Stop.instruction_type(),  None);
    assert_eq!(Operation::Halt.instruction_type(),  None);
  }
}
