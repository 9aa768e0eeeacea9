//! Fixed binary layout, little-endian, no padding:
//!
//! ```text
//! u8   angular (0 | 1)
//! u32  dim, k, testCount, trainCount
//! u32  neighbors[testCount * k]
//! f32  test[testCount * dim]
//! f32  train[trainCount * dim]
//! ```

use std::fs;
use std::path::Path;

use tracing::info;

use super::{as_le_bytes, ensure_generated, from_le_bytes};
use crate::{
    dataset::Dataset,
    errors::{BenchError, Result},
};

/// Bytes before the neighbour matrix.
pub const HEADER_LEN: usize = 1 + 4 * 4;

pub fn encode(dataset: &Dataset) -> Result<Vec<u8>> {
    ensure_generated(dataset)?;
    let payload = 4 * (dataset.neighbors().len() + dataset.test().len() + dataset.train().len());
    let mut out = Vec::with_capacity(HEADER_LEN + payload);

    out.push(u8::from(dataset.is_angular()));
    for v in [dataset.dim(), dataset.k(), dataset.test_count(), dataset.train_count()] {
        let v = u32::try_from(v).map_err(|_| BenchError::invalid(format!("{} does not fit in u32", v)))?;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(as_le_bytes(dataset.neighbors()));
    out.extend_from_slice(as_le_bytes(dataset.test()));
    out.extend_from_slice(as_le_bytes(dataset.train()));
    Ok(out)
}

/// Decode a whole file image. Trailing bytes are an error.
pub fn decode(bytes: &[u8]) -> Result<Dataset> {
    let mut r = Reader { bytes, pos: 0 };

    let angular = match r.take(1, "angular flag")?[0] {
        0 => false,
        1 => true,
        other => return Err(BenchError::format(format!("invalid angular flag {}", other))),
    };
    let dim = r.u32("dim")? as usize;
    let k = r.u32("k")? as usize;
    let test_count = r.u32("testCount")? as usize;
    let train_count = r.u32("trainCount")? as usize;

    let neighbors = from_le_bytes::<u32>(r.take(words(test_count, k, "neighbors")?, "neighbors")?);
    let test = from_le_bytes::<f32>(r.take(words(test_count, dim, "test")?, "test")?);
    let train = from_le_bytes::<f32>(r.take(words(train_count, dim, "train")?, "train")?);

    if r.pos != bytes.len() {
        return Err(BenchError::format(format!(
            "{} trailing bytes after train matrix",
            bytes.len() - r.pos
        )));
    }
    // dim/k are carried explicitly; row counts must agree with the header.
    let d = Dataset::from_parts(angular, dim, k, neighbors, test, train)?;
    if d.test_count() != test_count || d.train_count() != train_count {
        return Err(BenchError::format("row counts disagree with header"));
    }
    Ok(d)
}

pub fn write(dataset: &Dataset, path: &Path) -> Result<()> {
    fs::write(path, encode(dataset)?)?;
    info!(path = %path.display(), "wrote binary dataset");
    Ok(())
}

pub fn read(path: &Path) -> Result<Dataset> {
    decode(&fs::read(path)?)
}

/// Byte length of a `rows × cols` matrix of 4-byte elements.
fn words(rows: usize, cols: usize, what: &str) -> Result<usize> {
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| BenchError::format(format!("{} size overflows", what)))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len()).ok_or_else(|| {
            BenchError::format(format!(
                "truncated: {} needs {} bytes at offset {}, only {} left",
                what,
                n,
                self.pos,
                self.bytes.len() - self.pos
            ))
        })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetParams;

    fn scenario_a() -> Dataset {
        let mut d = Dataset::new(DatasetParams {
            angular: false, dim: 4, k: 3, test_count: 2, train_count: 10, seed: 1,
        })
        .unwrap();
        d.generate();
        d
    }

    #[test]
    fn round_trip_is_exact() {
        let d = scenario_a();
        let back = decode(&encode(&d).unwrap()).unwrap();
        assert_eq!(back.is_angular(), d.is_angular());
        assert_eq!((back.dim(), back.k(), back.test_count(), back.train_count()), (4, 3, 2, 10));
        assert_eq!(back.neighbors(), d.neighbors());
        assert_eq!(back.test().len(), d.test().len());
        for (a, b) in back.test().iter().zip(d.test()).chain(back.train().iter().zip(d.train())) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn layout_is_packed_little_endian() {
        let d = scenario_a();
        let bytes = encode(&d).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 4 * (2 * 3 + 2 * 4 + 10 * 4));
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..5], &4u32.to_le_bytes());
        assert_eq!(&bytes[5..9], &3u32.to_le_bytes());
        assert_eq!(&bytes[9..13], &2u32.to_le_bytes());
        assert_eq!(&bytes[13..17], &10u32.to_le_bytes());
        assert_eq!(&bytes[17..21], &d.neighbors()[0].to_le_bytes());
        let train_at = HEADER_LEN + 4 * (6 + 8);
        assert_eq!(&bytes[train_at..train_at + 4], &d.train()[0].to_le_bytes());
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = encode(&scenario_a()).unwrap();
        for cut in [0, 1, 10, HEADER_LEN, bytes.len() - 1] {
            assert!(matches!(decode(&bytes[..cut]), Err(BenchError::Format(_))), "cut at {}", cut);
        }
    }

    #[test]
    fn trailing_and_bad_flag_rejected() {
        let mut bytes = encode(&scenario_a()).unwrap();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(BenchError::Format(_))));
        bytes.pop();
        bytes[0] = 7;
        assert!(matches!(decode(&bytes), Err(BenchError::Format(_))));
    }

    #[test]
    fn out_of_range_neighbor_rejected() {
        let mut bytes = encode(&scenario_a()).unwrap();
        bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&10u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(BenchError::Format(_))));
    }

    #[test]
    fn ungenerated_dataset_cannot_be_encoded() {
        let d = Dataset::new(DatasetParams {
            angular: false, dim: 2, k: 1, test_count: 1, train_count: 1, seed: 0,
        })
        .unwrap();
        assert!(matches!(encode(&d), Err(BenchError::InvalidParameter(_))));
    }
}
