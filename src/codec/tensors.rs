//! Safetensors copy of the container layout (`.safetensors`): the same
//! `neighbors` (U32), `test` and `train` (F32) arrays, with `distance` and
//! `point_type` kept in the header metadata.
//!
//! For tensor tooling that has no HDF5 reader.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use safetensors::tensor::{Dtype, SafeTensors, TensorView};
use tracing::info;

use super::{
    as_le_bytes,
    container::{DISTANCE_ATTR, POINT_TYPE, POINT_TYPE_ATTR},
    ensure_generated, from_le_bytes,
};
use crate::{
    dataset::Dataset,
    errors::{BenchError, Result},
    math::Space,
};

pub fn encode(dataset: &Dataset) -> Result<Vec<u8>> {
    ensure_generated(dataset)?;
    let (dim, k) = (dataset.dim(), dataset.k());
    let tensors = vec![
        ("neighbors", view(Dtype::U32, dataset.test_count(), k, as_le_bytes(dataset.neighbors()))?),
        ("test", view(Dtype::F32, dataset.test_count(), dim, as_le_bytes(dataset.test()))?),
        ("train", view(Dtype::F32, dataset.train_count(), dim, as_le_bytes(dataset.train()))?),
    ];

    let mut attrs = HashMap::new();
    attrs.insert(DISTANCE_ATTR.to_string(), dataset.space().as_str().to_string());
    attrs.insert(POINT_TYPE_ATTR.to_string(), POINT_TYPE.to_string());

    safetensors::serialize(tensors, &Some(attrs))
        .map_err(|e| BenchError::format(format!("could not serialize safetensors: {}", e)))
}

pub fn decode(bytes: &[u8]) -> Result<Dataset> {
    let (_, meta) = SafeTensors::read_metadata(bytes)
        .map_err(|e| BenchError::format(format!("unreadable safetensors header: {}", e)))?;
    let attrs = meta
        .metadata()
        .as_ref()
        .ok_or_else(|| BenchError::format("safetensors header has no attributes"))?;

    let angular = match attribute(attrs, DISTANCE_ATTR)? {
        d if d == Space::Angular.as_str() => true,
        d if d == Space::Euclidean.as_str() => false,
        other => return Err(BenchError::format(format!("unsupported distance '{}'", other))),
    };
    let point_type = attribute(attrs, POINT_TYPE_ATTR)?;
    if point_type != POINT_TYPE {
        return Err(BenchError::format(format!("unsupported point_type '{}'", point_type)));
    }

    let st = SafeTensors::deserialize(bytes)
        .map_err(|e| BenchError::format(format!("unreadable safetensors: {}", e)))?;
    let (nn_rows, k, neighbors) = matrix(&st, "neighbors", Dtype::U32)?;
    let (test_rows, dim, test) = matrix(&st, "test", Dtype::F32)?;
    let (_, train_dim, train) = matrix(&st, "train", Dtype::F32)?;

    if train_dim != dim {
        return Err(BenchError::format(format!("train has {} columns, test has {}", train_dim, dim)));
    }
    if nn_rows != test_rows {
        return Err(BenchError::format(format!(
            "neighbors has {} rows, test has {}",
            nn_rows, test_rows
        )));
    }
    Dataset::from_parts(
        angular,
        dim,
        k,
        from_le_bytes::<u32>(neighbors),
        from_le_bytes::<f32>(test),
        from_le_bytes::<f32>(train),
    )
}

pub fn write(dataset: &Dataset, path: &Path) -> Result<()> {
    fs::write(path, encode(dataset)?)?;
    info!(path = %path.display(), "wrote safetensors dataset");
    Ok(())
}

pub fn read(path: &Path) -> Result<Dataset> {
    decode(&fs::read(path)?)
}

fn view<'a>(dtype: Dtype, rows: usize, cols: usize, data: &'a [u8]) -> Result<TensorView<'a>> {
    TensorView::new(dtype, vec![rows, cols], data)
        .map_err(|e| BenchError::format(format!("bad tensor shape {}×{}: {}", rows, cols, e)))
}

fn attribute<'a>(attrs: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    attrs
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| BenchError::format(format!("missing attribute '{}'", name)))
}

/// `(rows, cols, raw bytes)` of a 2-D tensor with the expected dtype.
fn matrix<'a>(st: &SafeTensors<'a>, name: &str, dtype: Dtype) -> Result<(usize, usize, &'a [u8])> {
    let t = st
        .tensor(name)
        .map_err(|_| BenchError::format(format!("missing array '{}'", name)))?;
    if t.dtype() != dtype {
        return Err(BenchError::format(format!(
            "array '{}' has dtype {:?}, expected {:?}",
            name,
            t.dtype(),
            dtype
        )));
    }
    match *t.shape() {
        [rows, cols] => Ok((rows, cols, t.data())),
        ref other => Err(BenchError::format(format!("array '{}' has shape {:?}, expected 2-D", name, other))),
    }
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
        for angular in [false, true] {
            let d = generated(angular);
            let back = decode(&encode(&d).unwrap()).unwrap();
            assert_eq!(back.is_angular(), angular);
            assert_eq!((back.dim(), back.k(), back.test_count(), back.train_count()), (4, 3, 2, 10));
            assert_eq!(back.neighbors(), d.neighbors());
            assert_eq!(back.test(), d.test());
            assert_eq!(back.train(), d.train());
        }
    }

    #[test]
    fn attributes_are_written() {
        let bytes = encode(&generated(true)).unwrap();
        let (_, meta) = SafeTensors::read_metadata(&bytes).unwrap();
        let attrs = meta.metadata().as_ref().unwrap();
        assert_eq!(attrs[DISTANCE_ATTR], "angular");
        assert_eq!(attrs[POINT_TYPE_ATTR], "float");
    }

    #[test]
    fn missing_array_is_a_format_error() {
        let d = generated(false);
        let mut attrs = HashMap::new();
        attrs.insert(DISTANCE_ATTR.to_string(), "euclidean".to_string());
        attrs.insert(POINT_TYPE_ATTR.to_string(), POINT_TYPE.to_string());
        let only_test = vec![("test", view(Dtype::F32, 2, 4, as_le_bytes(d.test())).unwrap())];
        let bytes = safetensors::serialize(only_test, &Some(attrs)).unwrap();
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("neighbors"), "{}", err);
    }

    #[test]
    fn missing_attribute_is_a_format_error() {
        let d = generated(false);
        let tensors = vec![
            ("neighbors", view(Dtype::U32, 2, 3, as_le_bytes(d.neighbors())).unwrap()),
            ("test", view(Dtype::F32, 2, 4, as_le_bytes(d.test())).unwrap()),
            ("train", view(Dtype::F32, 10, 4, as_le_bytes(d.train())).unwrap()),
        ];
        let mut attrs = HashMap::new();
        attrs.insert(POINT_TYPE_ATTR.to_string(), POINT_TYPE.to_string());
        let bytes = safetensors::serialize(tensors, &Some(attrs)).unwrap();
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, BenchError::Format(ref m) if m.contains("distance")));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode(b"not a tensor file"), Err(BenchError::Format(_))));
    }
}
