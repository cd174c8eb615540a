/*!
  Reading and writing program binaries. A binary is a bare sequence of
  32-bit words in native byte order: no header, no magic number, no length
  field. Four bytes make a word; a trailing partial word is silently
  dropped, matching what the machine's original loader did with short tails.
*/
use std::fmt::{Display, Formatter};
use std::fs;

use crate::bytecode::Word;
use crate::machine::MEMORY_WORDS;

#[derive(Debug)]
pub enum LoadError {
  Io { path: String, cause: std::io::Error },
  TooLarge { words: usize },
}

impl Display for LoadError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      LoadError::Io { path, cause } => {
        write!(f, "could not read {}: {}", path, cause)
      }
      LoadError::TooLarge { words } => {
        write!(
          f,
          "program is {} words but memory holds only {}",
          words, MEMORY_WORDS
        )
      }
    }
  }
}

/// Packs raw bytes into words, four at a time, dropping a partial tail.
pub fn words_from_bytes(bytes: &[u8]) -> Vec<Word> {
  bytes
    .chunks_exact(4)
    .map(|chunk| {
      let mut raw = [0u8; 4];
      raw.copy_from_slice(chunk);
      Word::from_ne_bytes(raw)
    })
    .collect()
}

/// Reads the file fully or fails fast; no format validation is performed.
pub fn read_program(path: &str) -> Result<Vec<Word>, LoadError> {
  let bytes = fs::read(path).map_err(|cause| LoadError::Io {
    path: path.to_string(),
    cause,
  })?;
  Ok(words_from_bytes(&bytes))
}

/// Writes assembled words back out in the same bare format.
pub fn write_program(path: &str, words: &[Word]) -> Result<(), LoadError> {
  let mut bytes = Vec::with_capacity(words.len() * 4);
  for word in words {
    bytes.extend_from_slice(&word.to_ne_bytes());
  }
  fs::write(path, bytes).map_err(|cause| LoadError::Io {
    path: path.to_string(),
    cause,
  })
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bytes_pack_into_words_in_source_order() {
    let first: Word = 0x1234_5678;
    let second: Word = 0xDEAD_BEEF;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&first.to_ne_bytes());
    bytes.extend_from_slice(&second.to_ne_bytes());

    assert_eq!(words_from_bytes(&bytes), vec![first, second]);
  }

  #[test]
  fn a_trailing_partial_word_is_dropped() {
    let word: Word = 7;
    let mut bytes = word.to_ne_bytes().to_vec();
    bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]); // three stray bytes

    assert_eq!(words_from_bytes(&bytes), vec![7]);
  }

  #[test]
  fn fewer_than_four_bytes_is_an_empty_program() {
    assert_eq!(words_from_bytes(&[1, 2, 3]), Vec::<Word>::new());
    assert_eq!(words_from_bytes(&[]), Vec::<Word>::new());
  }

  #[test]
  fn a_missing_file_reports_its_path() {
    let error = read_program("no/such/file.bin").unwrap_err();
    assert!(error.to_string().contains("no/such/file.bin"));
  }
}
