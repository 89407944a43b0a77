//! Matrix Market coordinate-format reader: parses the banner and size line, then streams
//! `(row, col, value)` tuples one entry at a time. An out-of-range index is a non-fatal,
//! sink-reported warning (the row is skipped) rather than a fatal error; a malformed
//! banner, size line, or entry is fatal.

use crate::error::MtxError;
use qmm_core::error::{InputWarning, WarningSink};
use qmm_core::geometry::{Index, Shape};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::iter::Enumerate;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MmField {
    Integer,
    Real,
}

/// One-shot load: parses the whole file and materializes every in-range entry. Out-of-range
/// entries are dropped silently (use [`MtxTupleStream`] directly to observe warnings).
pub fn read_coordinate_f64(path: impl AsRef<Path>) -> Result<(Shape, Vec<(Index, Index, f64)>), MtxError> {
    let mut sink = qmm_core::error::IgnoreWarnings;
    read_coordinate_f64_with_sink(path, &mut sink)
}

/// Same as [`read_coordinate_f64`] but routes non-fatal warnings to a caller-supplied sink.
pub fn read_coordinate_f64_with_sink(
    path: impl AsRef<Path>,
    sink: &mut dyn WarningSink,
) -> Result<(Shape, Vec<(Index, Index, f64)>), MtxError> {
    let f = File::open(path.as_ref())?;
    let reader = BufReader::new(f);
    let mut stream = MtxTupleStream::new(reader, sink)?;
    let shape = stream.shape();
    let entries: Vec<(Index, Index, f64)> = (&mut stream).collect();
    if let Some(e) = stream.into_error() {
        return Err(e);
    }
    Ok((shape, entries))
}

/// A single pass over a coordinate-format `.mtx` body, yielding `(row, col, value)` without
/// materializing the whole file. Implements [`qmm_core::TupleStream`].
///
/// Fatal parse errors (malformed banner/size line/entry, short file) cannot be represented
/// as an `Iterator::Item` without breaking the `TupleStream` contract, so they are instead
/// recorded internally and end iteration early; call [`MtxTupleStream::into_error`] (or
/// [`MtxTupleStream::error`]) after exhausting the stream to check for one.
pub struct MtxTupleStream<'a, R: BufRead> {
    lines: Enumerate<Lines<R>>,
    field: MmField,
    shape: Shape,
    nnz: usize,
    read_entries: usize,
    sink: &'a mut dyn WarningSink,
    error: Option<MtxError>,
}

impl<'a, R: BufRead> MtxTupleStream<'a, R> {
    pub fn new(reader: R, sink: &'a mut dyn WarningSink) -> Result<Self, MtxError> {
        let mut lines = reader.lines().enumerate();

        let (header_line_no, header) = next_non_empty(&mut lines, false)?
            .ok_or_else(|| MtxError::InvalidBanner("empty input".to_string()))?;

        let tokens: Vec<&str> = header.split_whitespace().collect();
        if tokens.len() != 5 {
            return Err(MtxError::InvalidBanner(format!(
                "expected 5 tokens, got {} at line {}: {:?}",
                tokens.len(),
                header_line_no,
                header
            )));
        }

        let mm = tokens[0];
        let object = tokens[1].to_ascii_lowercase();
        let format = tokens[2].to_ascii_lowercase();
        let field_tok = tokens[3].to_ascii_lowercase();
        let symmetry = tokens[4].to_ascii_lowercase();

        if mm != "%%MatrixMarket" {
            return Err(MtxError::InvalidBanner(format!(
                "missing %%MatrixMarket at line {header_line_no}: {header}"
            )));
        }
        if object != "matrix" || format != "coordinate" {
            return Err(MtxError::UnsupportedType(format!(
                "only 'matrix coordinate' is supported, got '{}' '{}' (line {}): {}",
                tokens[1], tokens[2], header_line_no, header
            )));
        }
        if symmetry != "general" {
            return Err(MtxError::UnsupportedType(format!(
                "only 'general' symmetry is supported, got '{}' (line {}): {}",
                tokens[4], header_line_no, header
            )));
        }
        let field = match field_tok.as_str() {
            "integer" => MmField::Integer,
            "real" => MmField::Real,
            other => {
                return Err(MtxError::UnsupportedType(format!(
                    "only 'integer' and 'real' fields are supported, got '{other}' (line {header_line_no}): {header}"
                )))
            }
        };

        let (size_line_no, size_line) = next_non_empty(&mut lines, true)?
            .ok_or_else(|| MtxError::InvalidSizeLine("missing size line".to_string()))?;
        let parts: Vec<&str> = size_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(MtxError::InvalidSizeLine(format!(
                "expected 3 integers at line {size_line_no}: {size_line}"
            )));
        }
        let nrows: Index = parts[0].parse().map_err(|e| {
            MtxError::InvalidSizeLine(format!(
                "bad nrows '{}' at line {}: {} ({})",
                parts[0], size_line_no, size_line, e
            ))
        })?;
        let ncols: Index = parts[1].parse().map_err(|e| {
            MtxError::InvalidSizeLine(format!(
                "bad ncols '{}' at line {}: {} ({})",
                parts[1], size_line_no, size_line, e
            ))
        })?;
        let nnz: usize = parts[2].parse().map_err(|e| {
            MtxError::InvalidSizeLine(format!(
                "bad nnz '{}' at line {}: {} ({})",
                parts[2], size_line_no, size_line, e
            ))
        })?;

        Ok(Self {
            lines,
            field,
            shape: Shape::new(nrows, ncols),
            nnz,
            read_entries: 0,
            sink,
            error: None,
        })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// The fatal error encountered, if iteration stopped early because of one.
    pub fn error(&self) -> Option<&MtxError> {
        self.error.as_ref()
    }

    pub fn into_error(self) -> Option<MtxError> {
        self.error
    }
}

fn next_non_empty<R: BufRead>(
    lines: &mut Enumerate<Lines<R>>,
    skip_comments: bool,
) -> Result<Option<(usize, String)>, MtxError> {
    loop {
        match lines.next() {
            None => return Ok(None),
            Some((i, line)) => {
                let line = line?;
                let t = line.trim().trim_start_matches('\u{feff}');
                if t.is_empty() || (skip_comments && t.starts_with('%')) {
                    continue;
                }
                return Ok(Some((i + 1, t.to_string())));
            }
        }
    }
}

impl<'a, R: BufRead> Iterator for MtxTupleStream<'a, R> {
    type Item = (Index, Index, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.error.is_some() {
            return None;
        }
        loop {
            if self.read_entries >= self.nnz {
                return None;
            }
            let (line_no, line) = match self.lines.next() {
                None => {
                    self.error = Some(MtxError::EntryCountMismatch {
                        expected: self.nnz,
                        actual: self.read_entries,
                    });
                    return None;
                }
                Some((i, line)) => match line {
                    Ok(l) => (i + 1, l),
                    Err(e) => {
                        self.error = Some(e.into());
                        return None;
                    }
                },
            };
            let t = line.trim();
            if t.is_empty() || t.starts_with('%') {
                continue;
            }

            let parts: Vec<&str> = t.split_whitespace().collect();
            if parts.len() != 3 {
                self.error = Some(MtxError::InvalidEntry {
                    line: line_no,
                    msg: format!("expected 3 tokens 'row col val', got: {t}"),
                });
                return None;
            }

            let row_1: Index = match parts[0].parse() {
                Ok(v) => v,
                Err(e) => {
                    self.error = Some(MtxError::InvalidEntry {
                        line: line_no,
                        msg: format!("bad row index '{}': {}", parts[0], e),
                    });
                    return None;
                }
            };
            let col_1: Index = match parts[1].parse() {
                Ok(v) => v,
                Err(e) => {
                    self.error = Some(MtxError::InvalidEntry {
                        line: line_no,
                        msg: format!("bad col index '{}': {}", parts[1], e),
                    });
                    return None;
                }
            };
            if row_1 <= 0 || col_1 <= 0 {
                self.error = Some(MtxError::InvalidEntry {
                    line: line_no,
                    msg: "MatrixMarket indices are 1-based; found a non-positive index".to_string(),
                });
                return None;
            }

            let val = match self.field {
                MmField::Integer => match parts[2].parse::<i64>() {
                    Ok(v) => v as f64,
                    Err(e) => {
                        self.error = Some(MtxError::InvalidEntry {
                            line: line_no,
                            msg: format!("bad integer value '{}': {}", parts[2], e),
                        });
                        return None;
                    }
                },
                MmField::Real => match parts[2].parse::<f64>() {
                    Ok(v) => v,
                    Err(e) => {
                        self.error = Some(MtxError::InvalidEntry {
                            line: line_no,
                            msg: format!("bad real value '{}': {}", parts[2], e),
                        });
                        return None;
                    }
                },
            };

            self.read_entries += 1;
            let row = row_1 - 1;
            let col = col_1 - 1;
            if row >= self.shape.nrows || col >= self.shape.ncols {
                self.sink.warn(InputWarning::new(format!(
                    "line {line_no}: index ({row}, {col}) out of range for shape {:?}; entry skipped",
                    self.shape
                )));
                continue;
            }
            return Some((row, col, val));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qmm_core::error::CollectWarnings;
    use rstest::rstest;
    use std::io::Cursor;

    #[rstest]
    fn loads_every_fixture_without_a_fatal_error(#[files("tests/fixtures/*.mtx")] input: std::path::PathBuf) {
        let mut warnings = CollectWarnings::default();
        let (shape, entries) = read_coordinate_f64_with_sink(&input, &mut warnings).unwrap();
        assert!(shape.nrows > 0 && shape.ncols > 0);
        for (row, col, _) in &entries {
            assert!(*row < shape.nrows && *col < shape.ncols);
        }
    }

    #[test]
    fn parses_small_integer_coordinate_general() {
        let mtx = r#"
%%MatrixMarket matrix coordinate integer general
% a comment
3 3 4
1 1 2
1 1 3
3 1 4
2 3 5
"#;
        let mut sink = CollectWarnings::default();
        let mut stream = MtxTupleStream::new(Cursor::new(mtx), &mut sink).unwrap();
        assert_eq!(stream.shape(), Shape::new(3, 3));
        let entries: Vec<_> = (&mut stream).collect();
        assert!(stream.into_error().is_none());
        assert_eq!(
            entries,
            vec![(0, 0, 2.0), (0, 0, 3.0), (2, 0, 4.0), (1, 2, 5.0)]
        );
    }

    #[test]
    fn rejects_non_general_symmetry() {
        let mtx = "%%MatrixMarket matrix coordinate integer symmetric\n2 2 1\n1 1 1\n";
        let mut sink = qmm_core::error::IgnoreWarnings;
        let err = MtxTupleStream::new(Cursor::new(mtx), &mut sink).unwrap_err();
        let s = format!("{err}");
        assert!(s.contains("only 'general' symmetry is supported"));
    }

    #[test]
    fn out_of_range_index_is_a_warning_not_fatal() {
        let mtx = "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n5 1 2.0\n";
        let mut sink = CollectWarnings::default();
        let mut stream = MtxTupleStream::new(Cursor::new(mtx), &mut sink).unwrap();
        let entries: Vec<_> = (&mut stream).collect();
        assert!(stream.into_error().is_none());
        assert_eq!(entries, vec![(0, 0, 1.0)]);
        assert_eq!(sink.warnings.len(), 1);
    }

    #[test]
    fn short_file_is_entry_count_mismatch() {
        let mtx = "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n";
        let mut sink = qmm_core::error::IgnoreWarnings;
        let mut stream = MtxTupleStream::new(Cursor::new(mtx), &mut sink).unwrap();
        let entries: Vec<_> = (&mut stream).collect();
        assert_eq!(entries, vec![(0, 0, 1.0)]);
        assert!(matches!(
            stream.into_error(),
            Some(MtxError::EntryCountMismatch { expected: 2, actual: 1 })
        ));
    }
}
