//! Level description reader
//!
//! Level files are exported from Blender as plain text. Each placed object is a
//! `MESH` record:
//!
//! ```text
//! MESH
//! Ball.001
//! <Matrix 4x4 (1.0000, 0.0000, 0.0000, 0.0000)
//!             (0.0000, 1.0000, 0.0000, 0.0000)
//!             (0.0000, 0.0000, 1.0000, 0.0000)
//!             (4.0000, 0.5000, -2.0000, 1.0000)>
//! ```
//!
//! Lines outside a record are ignored and the first empty line ends the file.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use cgmath::Matrix4;

use crate::error::LevelError;

const RECORD_TAG: &str = "MESH";
const ASSET_EXTENSION: &str = "h2b";
/// Width of the `<Matrix 4x4 (` label and of the indentation on the rows below it.
const ROW_LABEL_WIDTH: usize = 13;

/// One placed object read from a level file.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelEntry {
    /// Object name as written in the file, e.g. `Ball.001`.
    pub name: String,
    /// Mesh asset file name, e.g. `Ball.h2b`.
    pub asset_file: String,
    /// `rows[r][c]` is the `c`-th value on transform line `r`.
    pub rows: [[f32; 4]; 4],
}

impl LevelEntry {
    /// World placement of the object.
    ///
    /// Rows are written for row vectors, so each file row becomes one column of
    /// the column-vector `Matrix4` and the translation lands in `w`.
    pub fn transform(&self) -> Matrix4<f32> {
        Matrix4::from(self.rows)
    }
}

/// Maps an object name to the mesh asset it instances.
///
/// Blender suffixes duplicates with `.NNN`, so everything from the last `.`
/// is dropped. Names without a `.` are used whole. Names containing a path
/// separator are rejected so the asset stays inside the models folder.
pub fn asset_file_name(object_name: &str) -> Result<String, LevelError> {
    if object_name.contains(['/', '\\', ':']) {
        return Err(LevelError::InvalidName(object_name.to_owned()));
    }
    let stem = match object_name.rfind('.') {
        Some(dot) => &object_name[..dot],
        None => object_name,
    };
    if stem.trim().is_empty() {
        return Err(LevelError::InvalidName(object_name.to_owned()));
    }
    Ok(format!("{stem}.{ASSET_EXTENSION}"))
}

fn parse_row(line: &str) -> Option<[f32; 4]> {
    let values = line.get(ROW_LABEL_WIDTH..)?;
    let values = values.trim_end_matches(|c: char| c == ')' || c == '>' || c.is_whitespace());

    let mut row = [0.0; 4];
    let mut parts = values.split(',');
    for slot in row.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(row)
}

/// Iterator over the `MESH` records of a level file.
///
/// Malformed records produce an error item and reading resumes after them.
/// Input ending inside a record produces [`LevelError::Truncated`] and ends
/// the iteration.
pub struct LevelReader<R> {
    input: R,
    line_number: usize,
    raw: Vec<u8>,
    buffer: String,
    finished: bool,
}

impl LevelReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LevelError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LevelReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line_number: 0,
            raw: Vec::new(),
            buffer: String::new(),
            finished: false,
        }
    }

    /// Reads the next line without its terminator. `None` at end of input or
    /// at the blank line that ends a level. Bytes that are not UTF-8 are
    /// replaced with U+FFFD.
    fn next_line(&mut self) -> Result<Option<&str>, LevelError> {
        self.raw.clear();
        if self.input.read_until(b'\n', &mut self.raw)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        self.buffer = String::from_utf8_lossy(&self.raw).into_owned();
        let line = self.buffer.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn read_record(&mut self) -> Result<LevelEntry, LevelError> {
        let name = match self.next_line()? {
            Some(name) => name.to_owned(),
            None => {
                return Err(LevelError::Truncated {
                    name: RECORD_TAG.to_owned(),
                })
            }
        };

        let mut rows = [[0.0; 4]; 4];
        let mut malformed = None;
        for row in rows.iter_mut() {
            let line_number = self.line_number + 1;
            let Some(line) = self.next_line()? else {
                return Err(LevelError::Truncated { name });
            };
            match parse_row(line) {
                Some(values) => *row = values,
                None if malformed.is_none() => {
                    malformed = Some(LevelError::MalformedTransform {
                        line: line_number,
                        text: line.to_owned(),
                    })
                }
                None => {}
            }
        }
        if let Some(err) = malformed {
            return Err(err);
        }

        let asset_file = asset_file_name(&name)?;
        Ok(LevelEntry {
            name,
            asset_file,
            rows,
        })
    }
}

impl<R: BufRead> Iterator for LevelReader<R> {
    type Item = Result<LevelEntry, LevelError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            match self.next_line() {
                Ok(Some(RECORD_TAG)) => break,
                Ok(Some(_)) => continue,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }

        let record = self.read_record();
        if matches!(record, Err(LevelError::Truncated { .. } | LevelError::Io(_))) {
            self.finished = true;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Vector4, Zero};

    const LEVEL: &str = "\
# exported level
MESH
Ball.001
<Matrix 4x4 (1.0000, 0.0000, 0.0000, 0.0000)
            (0.0000, 1.0000, 0.0000, 0.0000)
            (0.0000, 0.0000, 1.0000, 0.0000)
            (4.0000, 0.5000, -2.0000, 1.0000)>
CAMERA
MESH
Rock.Large.002
<Matrix 4x4 (2.0000, 0.0000, 0.0000, 0.0000)
            (0.0000, 2.0000, 0.0000, 0.0000)
            (0.0000, 0.0000, 2.0000, 0.0000)
            (-1.0000, 0.0000, 3.5000, 1.0000)>
";

    fn read_all(text: &str) -> Vec<Result<LevelEntry, LevelError>> {
        LevelReader::new(text.as_bytes()).collect()
    }

    #[test]
    fn test_reads_records_in_file_order() {
        let entries: Vec<LevelEntry> = read_all(LEVEL).into_iter().map(Result::unwrap).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Ball.001");
        assert_eq!(entries[0].asset_file, "Ball.h2b");
        assert_eq!(entries[1].name, "Rock.Large.002");
        assert_eq!(entries[1].asset_file, "Rock.Large.h2b");
    }

    #[test]
    fn test_rows_match_file_values() {
        let entry = read_all(LEVEL).remove(0).unwrap();

        assert_eq!(entry.rows[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(entry.rows[3], [4.0, 0.5, -2.0, 1.0]);
        assert_eq!(entry.transform().w, Vector4::new(4.0, 0.5, -2.0, 1.0));
        assert_eq!(entry.transform()[3][1], entry.rows[3][1]);
    }

    #[test]
    fn test_asset_names() {
        assert_eq!(asset_file_name("Ball.001").unwrap(), "Ball.h2b");
        assert_eq!(asset_file_name("Rock.Large.002").unwrap(), "Rock.Large.h2b");
        assert_eq!(asset_file_name("Tree").unwrap(), "Tree.h2b");
        assert!(matches!(
            asset_file_name(".001"),
            Err(LevelError::InvalidName(name)) if name == ".001"
        ));
    }

    #[test]
    fn test_asset_names_cannot_leave_models_folder() {
        for name in ["../secret.001", "/etc/passwd", "Props\\Ball.001", "C:Ball.001"] {
            assert!(
                matches!(asset_file_name(name), Err(LevelError::InvalidName(_))),
                "{name} was accepted"
            );
        }
        assert_eq!(asset_file_name("...001").unwrap(), "...h2b");
    }

    #[test]
    fn test_non_utf8_line_does_not_end_level() {
        let mut bytes = b"# caf\xe9 export\n".to_vec();
        bytes.extend_from_slice(LEVEL.as_bytes());

        let entries: Vec<LevelEntry> = LevelReader::new(bytes.as_slice())
            .map(Result::unwrap)
            .collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Ball.001");
        assert_eq!(entries[1].name, "Rock.Large.002");
    }

    #[test]
    fn test_crlf_input() {
        let entries = read_all(&LEVEL.replace('\n', "\r\n"));
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(Result::is_ok));
    }

    #[test]
    fn test_blank_line_ends_level() {
        let text = LEVEL.replacen("CAMERA\n", "\n", 1);
        let entries = read_all(&text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_ref().unwrap().name, "Ball.001");
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let text = LEVEL.replacen("(0.0000, 1.0000, 0.0000, 0.0000)", "(0.0000, oops, 0.0000)", 1);
        let entries = read_all(&text);

        assert_eq!(entries.len(), 2);
        assert!(matches!(
            &entries[0],
            Err(LevelError::MalformedTransform { line: 5, .. })
        ));
        assert_eq!(entries[1].as_ref().unwrap().name, "Rock.Large.002");
    }

    #[test]
    fn test_truncated_record_ends_iteration() {
        let text = "MESH\nBall.001\n<Matrix 4x4 (1.0000, 0.0000, 0.0000, 0.0000)\n";
        let mut reader = LevelReader::new(text.as_bytes());

        assert!(matches!(
            reader.next(),
            Some(Err(LevelError::Truncated { name })) if name == "Ball.001"
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_empty_input() {
        assert!(read_all("").is_empty());
        assert!(read_all("\nMESH\nBall\n").is_empty());
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("level-renderer-no-such-level.txt");
        assert!(matches!(
            LevelReader::open(&path),
            Err(LevelError::NotFound { .. })
        ));
    }

    #[test]
    fn test_identity_transform_has_zero_translation() {
        let text = "MESH\nTree\n<Matrix 4x4 (1, 0, 0, 0)\n            (0, 1, 0, 0)\n            (0, 0, 1, 0)\n            (0, 0, 0, 1)>\n";
        let entry = read_all(text).remove(0).unwrap();
        assert_eq!(entry.asset_file, "Tree.h2b");
        assert!(entry.transform().w.truncate().is_zero());
    }
}
