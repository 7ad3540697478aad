//! Line Readers
//!
//! The lexer pulls one physical line at a time. Readers register every line
//! they hand out with the arena.

use std::io::{self, BufRead};
use std::rc::Rc;

use thiserror::Error;

use crate::parser::arena::{Arena, SourceLine};

/// Source bytes that aren't UTF-8. Carried inside an `io::Error` of kind
/// `InvalidData`.
#[derive(Debug, Error)]
#[error("invalid UTF-8 in source at line {line}, column {column}")]
pub struct InvalidEncoding {
    pub line: usize,
    /// 1-based byte column of the first bad byte.
    pub column: usize,
}

/// A whole source file as text, or where its first bad byte is.
pub fn source_text(bytes: Vec<u8>) -> Result<String, InvalidEncoding> {
    String::from_utf8(bytes).map_err(|e| {
        let good = &e.as_bytes()[..e.utf8_error().valid_up_to()];
        let line_start = good.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        InvalidEncoding {
            line: good.iter().filter(|&&b| b == b'\n').count() + 1,
            column: good.len() - line_start + 1,
        }
    })
}

pub trait LineReader {
    /// Next line including its `\n`, or `None` at end of input.
    fn get_line(&mut self) -> io::Result<Option<Rc<SourceLine>>>;
}

/// Reads from an in-memory string: `-c`, `eval`, backticks.
pub struct StringLineReader {
    arena: Rc<Arena>,
    lines: Vec<String>,
    pos: usize,
    line_num: usize,
}

impl StringLineReader {
    pub fn new(src: &str, arena: Rc<Arena>) -> Self {
        Self::starting_at(src, arena, 1)
    }

    pub fn starting_at(src: &str, arena: Rc<Arena>, first_line: usize) -> Self {
        Self {
            arena,
            lines: src.split_inclusive('\n').map(str::to_string).collect(),
            pos: 0,
            line_num: first_line,
        }
    }
}

impl LineReader for StringLineReader {
    fn get_line(&mut self) -> io::Result<Option<Rc<SourceLine>>> {
        let Some(text) = self.lines.get(self.pos) else {
            return Ok(None);
        };
        let line = self.arena.add_line(text.clone(), self.line_num);
        self.pos += 1;
        self.line_num += 1;
        Ok(Some(line))
    }
}

/// Reads lazily from a file or pipe.
pub struct FileLineReader {
    arena: Rc<Arena>,
    input: Box<dyn BufRead>,
    line_num: usize,
}

impl FileLineReader {
    pub fn new(input: Box<dyn BufRead>, arena: Rc<Arena>) -> Self {
        Self {
            arena,
            input,
            line_num: 1,
        }
    }
}

impl LineReader for FileLineReader {
    fn get_line(&mut self) -> io::Result<Option<Rc<SourceLine>>> {
        let mut buf = Vec::new();
        loop {
            match self.input.read_until(b'\n', &mut buf) {
                Ok(0) if buf.is_empty() => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let text = String::from_utf8(buf).map_err(|e| {
            let err = InvalidEncoding {
                line: self.line_num,
                column: e.utf8_error().valid_up_to() + 1,
            };
            io::Error::new(io::ErrorKind::InvalidData, err)
        })?;
        let line = self.arena.add_line(text, self.line_num);
        self.line_num += 1;
        Ok(Some(line))
    }
}

/// Replays lines that were already read, e.g. the body of a here-doc that is
/// parsed a second time for substitutions.
pub struct VirtualLineReader {
    lines: Vec<Rc<SourceLine>>,
    pos: usize,
}

impl VirtualLineReader {
    pub fn new(lines: Vec<Rc<SourceLine>>) -> Self {
        Self { lines, pos: 0 }
    }
}

impl LineReader for VirtualLineReader {
    fn get_line(&mut self) -> io::Result<Option<Rc<SourceLine>>> {
        let line = self.lines.get(self.pos).cloned();
        if line.is_some() {
            self.pos += 1;
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_reader_keeps_newlines() {
        let arena = Arena::new("-c");
        let mut r = StringLineReader::new("a\nb", Rc::clone(&arena));
        let l1 = r.get_line().unwrap().unwrap();
        let l2 = r.get_line().unwrap().unwrap();
        assert_eq!(l1.content, "a\n");
        assert_eq!(l2.content, "b");
        assert_eq!(l2.line_num, 2);
        assert!(r.get_line().unwrap().is_none());
        assert_eq!(arena.num_lines(), 2);
    }

    #[test]
    fn test_file_reader() {
        let arena = Arena::new("script");
        let data: &[u8] = b"x=1\necho $x\n";
        let mut r = FileLineReader::new(Box::new(data), arena);
        assert_eq!(r.get_line().unwrap().unwrap().content, "x=1\n");
        assert_eq!(r.get_line().unwrap().unwrap().content, "echo $x\n");
        assert!(r.get_line().unwrap().is_none());
    }

    #[test]
    fn test_file_reader_rejects_bad_bytes() {
        let arena = Arena::new("script");
        let data: &[u8] = b"true\necho a\xffb\n";
        let mut r = FileLineReader::new(Box::new(data), arena);
        assert_eq!(r.get_line().unwrap().unwrap().content, "true\n");
        let err = r.get_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let bad = err.get_ref().and_then(|e| e.downcast_ref::<InvalidEncoding>()).unwrap();
        assert_eq!((bad.line, bad.column), (2, 7));
    }

    #[test]
    fn test_source_text_locates_bad_byte() {
        assert_eq!(source_text(b"ok\n".to_vec()).unwrap(), "ok\n");
        let bad = source_text(b"a\nbc\n\x80\n".to_vec()).unwrap_err();
        assert_eq!((bad.line, bad.column), (3, 1));
    }
}
