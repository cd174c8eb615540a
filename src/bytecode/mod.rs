/*!

  The VM uses a fixed-width 32-bit instruction word. The opcode occupies the
  top six bits; the low 26 bits are partitioned into operand fields according
  to the opcode's instruction type, one of R (register-register),
  I (register-immediate), JR (jump register), JI (jump immediate),
  B (branch), and S (syscall). Memory addresses name words, not bytes.
  The field widths are:

    Opcode:            6 bits
    Register index:    5 bits
    Immediate:        16 bits, sign-extended
    Jump address:     21 bits
    Branch address:   17 bits
    Syscall selector: 26 bits

  One design decision that needed to be made is how to represent a decoded
  instruction. The source machine this reimplements decoded fields into
  shared scratch variables that the executor read back by convention, which
  couples correctness to the order of calls. Here decoding instead returns a
  tagged `Instruction` value, one variant per instruction type, consumed
  immediately by the executor. The cost is a few bytes per decoded value;
  the gain is that a decode cannot be observed half-applied.

*/

mod assembly;
mod binary;
mod opcode;

pub use assembly::{assemble, AssemblyError};
pub use binary::{opcode_field, Instruction, Word, OPCODE_SHIFT};
pub use opcode::{InstructionType, Operation};
