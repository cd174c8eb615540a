use bimap::BiMap;
use string_cache::DefaultAtom;

use crate::bytecode::Word;

/**
  A symbol table for the assembler: a mapping between label names and the
  word address of the instruction they precede. The reverse direction is
  used when disassembling, to recover a label for a jump target. A symbol
  table is really just a convenience wrapper around a BiMap.
*/
pub struct SymbolTable {
  table: BiMap<DefaultAtom, Word>,
}

impl SymbolTable {

  pub fn new() -> SymbolTable {
    SymbolTable {
      table: BiMap::new(),
    }
  }

  pub fn get_label(&self, address: Word) -> Option<DefaultAtom> {
    self.table.get_by_right(&address).cloned()
  }

  pub fn get_address(&self, label: &DefaultAtom) -> Option<Word> {
    self.table.get_by_left(label).cloned()
  }

  /// Fails if the label was already defined, returning the rejected pair.
  pub fn insert(&mut self, label: DefaultAtom, address: Word)
    -> Result<(), (DefaultAtom, Word)> {
    self.table.insert_no_overwrite(label, address)
  }
}
