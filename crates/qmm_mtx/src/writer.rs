//! Matrix Market coordinate-format writer. Streams tuples straight to the output file as
//! the caller's traversal produces them, rather than materializing the whole matrix first,
//! mirroring the reader's single-pass design.

use crate::error::MtxError;
use qmm_core::geometry::{Index, Shape};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes a `real general` coordinate-format file. `nnz` must be known up front (Matrix
/// Market's size line precedes the data); `visit` is handed an `emit` callback and is
/// expected to call it once per nonzero, in any order, driving the core's own tree
/// traversal (e.g. `Matrix::dump_tuples`, or a hand-rolled leaf walk) rather than this
/// crate collecting the tuples itself.
pub fn write_coordinate(
    path: impl AsRef<Path>,
    shape: Shape,
    nnz: usize,
    visit: impl FnOnce(&mut dyn FnMut(Index, Index, f64)),
) -> Result<(), MtxError> {
    let file = File::create(path.as_ref())?;
    let mut w = BufWriter::new(file);
    writeln!(w, "%%MatrixMarket matrix coordinate real general")?;
    writeln!(w, "{} {} {}", shape.nrows, shape.ncols, nnz)?;

    let mut count = 0usize;
    let mut write_err: Option<std::io::Error> = None;
    {
        let mut emit = |row: Index, col: Index, val: f64| {
            if write_err.is_some() {
                return;
            }
            if let Err(e) = writeln!(w, "{} {} {}", row + 1, col + 1, val) {
                write_err = Some(e);
                return;
            }
            count += 1;
        };
        visit(&mut emit);
    }
    if let Some(e) = write_err {
        return Err(e.into());
    }
    w.flush()?;

    if count != nnz {
        return Err(MtxError::EntryCountMismatch {
            expected: nnz,
            actual: count,
        });
    }
    Ok(())
}

/// Convenience wrapper over [`write_coordinate`] for callers that already have every tuple
/// in hand (e.g. `Matrix::dump_tuples`) rather than a streaming traversal.
pub fn write_coordinate_from_tuples(
    path: impl AsRef<Path>,
    shape: Shape,
    tuples: &[(Index, Index, f64)],
) -> Result<(), MtxError> {
    write_coordinate(path, shape, tuples.len(), |emit| {
        for &(row, col, val) in tuples {
            emit(row, col, val);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::MtxTupleStream;
    use std::io::Cursor;

    #[test]
    fn round_trips_through_a_tempfile() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("qmm_mtx_writer_test_{}.mtx", std::process::id()));
        let shape = Shape::new(3, 3);
        let tuples = vec![(0i64, 0i64, 2.0), (2, 0, 4.0), (1, 2, 5.0)];
        write_coordinate_from_tuples(&path, shape, &tuples).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let mut sink = qmm_core::error::IgnoreWarnings;
        let mut stream = MtxTupleStream::new(Cursor::new(contents), &mut sink).unwrap();
        assert_eq!(stream.shape(), shape);
        let mut read_back: Vec<_> = (&mut stream).collect();
        assert!(stream.into_error().is_none());
        read_back.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mut expected = tuples;
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(read_back, expected);
    }

    #[test]
    fn mismatched_count_is_rejected() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("qmm_mtx_writer_test_bad_{}.mtx", std::process::id()));
        let shape = Shape::new(2, 2);
        let err = write_coordinate(&path, shape, 3, |emit| {
            emit(0, 0, 1.0);
        })
        .unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            err,
            MtxError::EntryCountMismatch { expected: 3, actual: 1 }
        ));
    }
}
