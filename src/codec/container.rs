//! HDF5 container (`.hdf5`): the datasets `neighbors` (`[testCount, k]`,
//! u32), `test` and `train` (`[rows, dim]`, f32) plus the root string
//! attributes `distance` and `point_type`.
//!
//! This is the layout ANN tooling reads, so files open without knowing the
//! binary layout.

use std::io;
use std::path::Path;

use hdf5::types::{VarLenAscii, VarLenUnicode};
use hdf5::H5Type;
use tracing::info;

use super::ensure_generated;
use crate::{
    dataset::Dataset,
    errors::{BenchError, Result},
    math::Space,
};

pub const DISTANCE_ATTR: &str = "distance";
pub const POINT_TYPE_ATTR: &str = "point_type";
pub const POINT_TYPE: &str = "float";

pub fn write(dataset: &Dataset, path: &Path) -> Result<()> {
    ensure_generated(dataset)?;
    let file = hdf5::File::create(path).map_err(write_error(path))?;
    let (dim, k) = (dataset.dim(), dataset.k());

    put_matrix(&file, "neighbors", dataset.test_count(), k, dataset.neighbors())?;
    put_matrix(&file, "test", dataset.test_count(), dim, dataset.test())?;
    put_matrix(&file, "train", dataset.train_count(), dim, dataset.train())?;
    put_attr(&file, DISTANCE_ATTR, dataset.space().as_str())?;
    put_attr(&file, POINT_TYPE_ATTR, POINT_TYPE)?;
    file.close().map_err(write_error(path))?;

    info!(path = %path.display(), "wrote HDF5 dataset");
    Ok(())
}

pub fn read(path: &Path) -> Result<Dataset> {
    let file = hdf5::File::open(path)
        .map_err(|e| BenchError::format(format!("cannot open {} as HDF5: {}", path.display(), e)))?;

    let angular = match attribute(&file, DISTANCE_ATTR)?.as_str() {
        d if d == Space::Angular.as_str() => true,
        d if d == Space::Euclidean.as_str() => false,
        other => return Err(BenchError::format(format!("unsupported distance '{}'", other))),
    };
    let point_type = attribute(&file, POINT_TYPE_ATTR)?;
    if point_type != POINT_TYPE {
        return Err(BenchError::format(format!("unsupported point_type '{}'", point_type)));
    }

    let (nn_rows, k, neighbors) = matrix::<u32>(&file, "neighbors")?;
    let (test_rows, dim, test) = matrix::<f32>(&file, "test")?;
    let (_, train_dim, train) = matrix::<f32>(&file, "train")?;

    if train_dim != dim {
        return Err(BenchError::format(format!("train has {} columns, test has {}", train_dim, dim)));
    }
    if nn_rows != test_rows {
        return Err(BenchError::format(format!(
            "neighbors has {} rows, test has {}",
            nn_rows, test_rows
        )));
    }
    Dataset::from_parts(angular, dim, k, neighbors, test, train)
}

fn write_error(path: &Path) -> impl Fn(hdf5::Error) -> BenchError + '_ {
    move |e| BenchError::Io(io::Error::other(format!("{}: {}", path.display(), e)))
}

fn put_matrix<T: H5Type>(file: &hdf5::File, name: &str, rows: usize, cols: usize, data: &[T]) -> Result<()> {
    file.new_dataset::<T>()
        .shape((rows, cols))
        .create(name)
        .and_then(|ds| ds.write_raw(data))
        .map_err(|e| BenchError::Io(io::Error::other(format!("writing '{}': {}", name, e))))
}

fn put_attr(file: &hdf5::File, name: &str, value: &str) -> Result<()> {
    let value: VarLenUnicode = value
        .parse()
        .map_err(|e| BenchError::format(format!("attribute '{}' is not storable: {}", name, e)))?;
    file.new_attr::<VarLenUnicode>()
        .shape(())
        .create(name)
        .and_then(|attr| attr.write_scalar(&value))
        .map_err(|e| BenchError::Io(io::Error::other(format!("writing attribute '{}': {}", name, e))))
}

/// Root string attribute, stored either as UTF-8 or ASCII.
fn attribute(file: &hdf5::File, name: &str) -> Result<String> {
    let attr = file
        .attr(name)
        .map_err(|_| BenchError::format(format!("missing attribute '{}'", name)))?;
    attr.read_scalar::<VarLenUnicode>()
        .map(|s| s.as_str().to_owned())
        .or_else(|_| attr.read_scalar::<VarLenAscii>().map(|s| s.as_str().to_owned()))
        .map_err(|e| BenchError::format(format!("attribute '{}' is not a string: {}", name, e)))
}

/// `(rows, cols, values)` of a 2-D dataset, converted to `T` on read.
fn matrix<T: H5Type>(file: &hdf5::File, name: &str) -> Result<(usize, usize, Vec<T>)> {
    let ds = file
        .dataset(name)
        .map_err(|_| BenchError::format(format!("missing array '{}'", name)))?;
    let (rows, cols) = match *ds.shape() {
        [rows, cols] => (rows, cols),
        ref other => {
            return Err(BenchError::format(format!("array '{}' has shape {:?}, expected 2-D", name, other)))
        }
    };
    let values = ds
        .read_raw::<T>()
        .map_err(|e| BenchError::format(format!("unreadable array '{}': {}", name, e)))?;
    Ok((rows, cols, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetParams;

    fn generated(angular: bool) -> Dataset {
        let mut d = Dataset::new(DatasetParams {
            angular, dim: 4, k: 3, test_count: 2, train_count: 10, seed: 1,
        })
        .unwrap();
        d.generate();
        d
    }

    #[test]
    fn round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        for angular in [false, true] {
            let d = generated(angular);
            let path = dir.path().join(format!("rt-{}.hdf5", angular));
            write(&d, &path).unwrap();
            let back = read(&path).unwrap();
            assert_eq!(back.is_angular(), angular);
            assert_eq!((back.dim(), back.k(), back.test_count(), back.train_count()), (4, 3, 2, 10));
            assert_eq!(back.neighbors(), d.neighbors());
            assert_eq!(back.test(), d.test());
            assert_eq!(back.train(), d.train());
        }
    }

    #[test]
    fn layout_uses_named_datasets_and_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.hdf5");
        write(&generated(true), &path).unwrap();

        let file = hdf5::File::open(&path).unwrap();
        assert_eq!(file.dataset("neighbors").unwrap().shape(), vec![2, 3]);
        assert_eq!(file.dataset("test").unwrap().shape(), vec![2, 4]);
        assert_eq!(file.dataset("train").unwrap().shape(), vec![10, 4]);
        assert_eq!(attribute(&file, DISTANCE_ATTR).unwrap(), "angular");
        assert_eq!(attribute(&file, POINT_TYPE_ATTR).unwrap(), "float");
    }

    #[test]
    fn missing_array_is_a_format_error() {
        let d = generated(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-neighbors.hdf5");
        {
            let file = hdf5::File::create(&path).unwrap();
            put_matrix(&file, "test", 2, 4, d.test()).unwrap();
            put_matrix(&file, "train", 10, 4, d.train()).unwrap();
            put_attr(&file, DISTANCE_ATTR, "euclidean").unwrap();
            put_attr(&file, POINT_TYPE_ATTR, POINT_TYPE).unwrap();
        }
        let err = read(&path).unwrap_err();
        assert!(matches!(err, BenchError::Format(ref m) if m.contains("neighbors")), "{}", err);
    }

    #[test]
    fn missing_attribute_is_a_format_error() {
        let d = generated(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-distance.hdf5");
        {
            let file = hdf5::File::create(&path).unwrap();
            put_matrix(&file, "neighbors", 2, 3, d.neighbors()).unwrap();
            put_matrix(&file, "test", 2, 4, d.test()).unwrap();
            put_matrix(&file, "train", 10, 4, d.train()).unwrap();
            put_attr(&file, POINT_TYPE_ATTR, POINT_TYPE).unwrap();
        }
        let err = read(&path).unwrap_err();
        assert!(matches!(err, BenchError::Format(ref m) if m.contains("distance")));
    }

    #[test]
    fn unknown_distance_is_rejected() {
        let d = generated(false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cosine.hdf5");
        {
            let file = hdf5::File::create(&path).unwrap();
            put_matrix(&file, "neighbors", 2, 3, d.neighbors()).unwrap();
            put_matrix(&file, "test", 2, 4, d.test()).unwrap();
            put_matrix(&file, "train", 10, 4, d.train()).unwrap();
            put_attr(&file, DISTANCE_ATTR, "cosine").unwrap();
            put_attr(&file, POINT_TYPE_ATTR, POINT_TYPE).unwrap();
        }
        assert!(matches!(read(&path), Err(BenchError::Format(ref m)) if m.contains("cosine")));
    }

    #[test]
    fn garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.hdf5");
        std::fs::write(&path, b"not a container").unwrap();
        assert!(matches!(read(&path), Err(BenchError::Format(_))));
    }
}
