//! Reading joined pixel tables (`chrom1 start1 end1 chrom2 start2 end2
//! count`, tab-separated, no header) with polars.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use polars::prelude::*;

use crate::fuzzer_structs::PixelRow;

pub const PIXEL_COLUMNS: [&str; 7] = ["chrom1", "start1", "end1", "chrom2", "start2", "end2", "count"];

fn pixel_schema() -> Schema {
    let fields = PIXEL_COLUMNS.iter().map(|&name| {
        let dtype = if name.starts_with("chrom") {
            DataType::String
        } else {
            DataType::Int64
        };
        Field::new(name.into(), dtype)
    });
    Schema::from_iter(fields)
}

fn pixel_read_options() -> CsvReadOptions {
    let parse_options = CsvParseOptions::default().with_separator(b'\t');
    CsvReadOptions::default()
        .with_has_header(false)
        .with_schema(Some(Arc::new(pixel_schema())))
        .with_rechunk(true)
        .with_parse_options(parse_options)
}

/// Parse pixels from an in-memory buffer such as captured process output.
///
/// Blank lines are skipped. Rows with missing or extra fields are errors.
pub fn read_pixels_from_bytes(bytes: Vec<u8>) -> PolarsResult<Vec<PixelRow>> {
    let bytes = skip_blank_lines(&bytes);
    // polars refuses empty input, but no output is a valid empty selection
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let df = pixel_read_options()
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;
    pixels_from_frame(&df)
}

fn skip_blank_lines(bytes: &[u8]) -> Vec<u8> {
    let mut kept = Vec::with_capacity(bytes.len());
    for line in bytes
        .split(|&b| b == b'\n')
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
    {
        kept.extend_from_slice(line);
        kept.push(b'\n');
    }
    kept
}

pub fn read_pixels_from_file(path: &Path) -> PolarsResult<Vec<PixelRow>> {
    let df = pixel_read_options()
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    pixels_from_frame(&df)
}

/// Convert a frame with the pixel schema into rows, rejecting any null.
pub fn pixels_from_frame(df: &DataFrame) -> PolarsResult<Vec<PixelRow>> {
    let chrom1 = df.column("chrom1")?.str()?;
    let start1 = df.column("start1")?.i64()?;
    let end1 = df.column("end1")?.i64()?;
    let chrom2 = df.column("chrom2")?.str()?;
    let start2 = df.column("start2")?.i64()?;
    let end2 = df.column("end2")?.i64()?;
    let count = df.column("count")?.i64()?;

    let mut pixels = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = (
            chrom1.get(i),
            start1.get(i),
            end1.get(i),
            chrom2.get(i),
            start2.get(i),
            end2.get(i),
            count.get(i),
        );
        match row {
            (Some(c1), Some(s1), Some(e1), Some(c2), Some(s2), Some(e2), Some(n)) => {
                pixels.push(PixelRow {
                    chrom1: c1.to_string(),
                    start1: s1,
                    end1: e1,
                    chrom2: c2.to_string(),
                    start2: s2,
                    end2: e2,
                    count: n,
                })
            }
            _ => {
                return Err(PolarsError::ComputeError(
                    format!("line {}: expected {} tab-separated fields", i + 1, PIXEL_COLUMNS.len())
                        .into(),
                ))
            }
        }
    }

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rows_in_order() {
        let out = b"chr1\t0\t10\tchr1\t10\t20\t5\nchr1\t0\t10\tchr2\t0\t10\t1\n".to_vec();
        let pixels = read_pixels_from_bytes(out).unwrap();
        assert_eq!(pixels.len(), 2);
        assert_eq!(pixels[0].to_string(), "chr1\t0\t10\tchr1\t10\t20\t5");
        assert_eq!(pixels[1].chrom2, "chr2");
        assert_eq!(pixels[1].count, 1);
    }

    #[test]
    fn empty_output_is_an_empty_table() {
        assert!(read_pixels_from_bytes(Vec::new()).unwrap().is_empty());
        assert!(read_pixels_from_bytes(b"\n".to_vec()).unwrap().is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let row = "chr1\t0\t10\tchr1\t10\t20\t5";

        let trailing = format!("{}\n\n", row).into_bytes();
        let pixels = read_pixels_from_bytes(trailing).unwrap();
        assert_eq!(pixels.len(), 1);
        assert_eq!(pixels[0].to_string(), row);

        let between = format!("{0}\n\n  \n{0}\n", row).into_bytes();
        assert_eq!(read_pixels_from_bytes(between).unwrap().len(), 2);
    }

    #[test]
    fn extra_fields_are_rejected() {
        let out = b"chr1\t0\t10\tchr1\t10\t20\t5\t9\n".to_vec();
        assert!(read_pixels_from_bytes(out).is_err());
    }

    #[test]
    fn non_integer_fields_are_rejected() {
        let out = b"chr1\t0\t10\tchr1\t10\t20\tfive\n".to_vec();
        assert!(read_pixels_from_bytes(out).is_err());
    }

    #[test]
    fn truncated_rows_are_rejected() {
        let out = b"chr1\t0\t10\tchr1\t10\t20\t5\nchr1\t0\t10\n".to_vec();
        assert!(read_pixels_from_bytes(out).is_err());
    }

    #[test]
    fn read_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chr2\t0\t10\tchr2\t0\t10\t3").unwrap();
        file.flush().unwrap();
        let pixels = read_pixels_from_file(file.path()).unwrap();
        assert_eq!(pixels.len(), 1);
        assert_eq!(pixels[0].count, 3);
    }
}
