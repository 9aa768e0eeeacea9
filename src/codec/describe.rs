//! Deterministic text dump of a dataset, used as a diff-friendly fixture.

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::info;

use super::ensure_generated;
use crate::{dataset::Dataset, errors::Result};

/// Header lines followed by every array, one value per line.
pub fn describe(dataset: &Dataset) -> Result<String> {
    ensure_generated(dataset)?;
    Ok(Description(dataset).to_string())
}

struct Description<'a>(&'a Dataset);

impl fmt::Display for Description<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        writeln!(f, "angular: {}", if d.is_angular() { "True" } else { "False" })?;
        writeln!(f, "dim: {}", d.dim())?;
        writeln!(f, "k: {}", d.k())?;
        writeln!(f, "testCount: {}", d.test_count())?;
        writeln!(f, "trainCount: {}", d.train_count())?;

        writeln!(f, "neighbors[length {}]", d.neighbors().len())?;
        for id in d.neighbors() {
            writeln!(f, "{}", id)?;
        }
        for (name, values) in [("test", d.test()), ("train", d.train())] {
            writeln!(f, "{}[length {}]", name, values.len())?;
            for v in values {
                writeln!(f, "{:.6}", v)?;
            }
        }
        Ok(())
    }
}

pub fn write_description(dataset: &Dataset, path: &Path) -> Result<()> {
    fs::write(path, describe(dataset)?)?;
    info!(path = %path.display(), "wrote dataset description");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_fixture() {
        let d = Dataset::from_parts(true, 2, 1, vec![1, 0], vec![0.5, 0.25, 0.125, 1.0], vec![0.0, 1.0, 0.333_333_34, 0.75])
            .unwrap();
        let expected = "\
angular: True
dim: 2
k: 1
testCount: 2
trainCount: 2
neighbors[length 2]
1
0
test[length 4]
0.500000
0.250000
0.125000
1.000000
train[length 4]
0.000000
1.000000
0.333333
0.750000
";
        assert_eq!(describe(&d).unwrap(), expected);
    }

    #[test]
    fn generated_dump_is_pinned() {
        let mut d = Dataset::new(crate::dataset::DatasetParams {
            angular: false, dim: 4, k: 3, test_count: 2, train_count: 10, seed: 1,
        })
        .unwrap();
        d.generate();
        let text = describe(&d).unwrap();
        let head = "\
angular: False
dim: 4
k: 3
testCount: 2
trainCount: 10
neighbors[length 6]
4
8
1
4
8
1
test[length 8]
0.193514
0.881341
0.522284
0.548431
";
        assert!(text.starts_with(head), "{}", text);
        assert!(text.contains("train[length 40]\n0.549378\n0.402486\n"));
        assert!(text.ends_with("0.133244\n"));
    }

    #[test]
    fn euclidean_flag_and_file_output() {
        let d = Dataset::from_parts(false, 1, 1, vec![0], vec![0.0], vec![0.0]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.txt");
        write_description(&d, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("angular: False\ndim: 1\n"));
    }
}
