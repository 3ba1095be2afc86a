// Named input units handed to the lexer

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use crate::pipeline::errors::PipelineError;

/// One named source of text: a file, or one line typed at a prompt.
///
/// The lexer reads the source line by line, so large files are never held in
/// memory as a whole.
pub struct InputUnit {
    pub name: String,
    pub source: Box<dyn BufRead + Send>,
}

impl InputUnit {
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl BufRead + Send + 'static,
    ) -> Self {
        InputUnit {
            name: name.into(),
            source: Box::new(reader),
        }
    }

    pub fn from_source(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_reader(name, Cursor::new(text.into().into_bytes()))
    }

    /// Open a file; the unit is named after the path as given.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PipelineError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(
            path.display().to_string(),
            BufReader::new(file),
        ))
    }
}

impl fmt::Debug for InputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputUnit").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_from_source() {
        let mut unit = InputUnit::from_source("repl", "1 + 2\n");
        let mut text = String::new();
        unit.source.read_to_string(&mut text).unwrap();
        assert_eq!(unit.name, "repl");
        assert_eq!(text, "1 + 2\n");
    }

    #[test]
    fn test_open_missing_file() {
        let err = InputUnit::open("definitely/not/here.k").unwrap_err();
        assert!(matches!(err, PipelineError::Open { .. }));
    }
}
