//! Record batch files.
//!
//! The python distribution of CIFAR-10 stores every batch as a pickled dict
//! with `labels`, `data` and `filenames` entries. The binary distribution
//! stores one label byte followed by the 3072 pixel bytes of each record.
//! Either way a batch ends up as a [`RecordBatch`] of parallel arrays.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use serde_pickle::{DeOptions, HashableValue, Value};

use super::cifar10::{RawRecord, RECORD_SIZE};
use crate::error::{DataError, Result};

pub const TRAIN_BATCH_PREFIX: &str = "data_batch_";
pub const TEST_BATCH_NAME: &str = "test_batch";

#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    pub path: PathBuf,
    pub labels: Vec<usize>,
    pub data: Vec<Vec<u8>>,
    pub filenames: Vec<String>,
}

impl RecordBatch {
    pub fn new(
        path: impl Into<PathBuf>,
        labels: Vec<usize>,
        data: Vec<Vec<u8>>,
        filenames: Vec<String>,
    ) -> Result<Self> {
        let path = path.into();
        if labels.len() != filenames.len() || data.len() != filenames.len() {
            return Err(DataError::malformed(
                path,
                format!(
                    "{} labels, {} images and {} filenames",
                    labels.len(),
                    data.len(),
                    filenames.len()
                ),
            ));
        }

        Ok(Self {
            path,
            labels,
            data,
            filenames,
        })
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = RawRecord<'_>> {
        self.labels
            .iter()
            .zip(&self.data)
            .zip(&self.filenames)
            .map(|((label, pixels), filename)| RawRecord {
                label: *label,
                pixels,
                filename,
            })
    }
}

pub trait RecordBatchReader {
    /// Extension of the batch files this reader understands. `None` matches
    /// files without an extension.
    fn extension(&self) -> Option<&str>;

    fn read(&self, path: &Path) -> Result<RecordBatch>;
}

/// Reads batches from the python version of the dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct PickleBatchReader;

impl RecordBatchReader for PickleBatchReader {
    fn extension(&self) -> Option<&str> {
        None
    }

    fn read(&self, path: &Path) -> Result<RecordBatch> {
        let file = File::open(path).map_err(|source| DataError::Io {
            path: path.to_owned(),
            source,
        })?;
        let value = serde_pickle::value_from_reader(BufReader::new(file), DeOptions::new())
            .map_err(|source| DataError::Pickle {
                path: path.to_owned(),
                source,
            })?;
        batch_from_value(path, value)
    }
}

/// Builds a batch from an unpickled dict. Keys may be byte strings (python 2
/// pickles) or unicode strings.
pub fn batch_from_value(path: &Path, value: Value) -> Result<RecordBatch> {
    let Value::Dict(mut dict) = value else {
        return Err(DataError::malformed(path, "top level value is not a dict"));
    };

    let mut take = |key: &str| {
        dict.remove(&HashableValue::Bytes(key.as_bytes().to_vec()))
            .or_else(|| dict.remove(&HashableValue::String(key.to_owned())))
    };

    let labels = take("labels")
        .or_else(|| take("fine_labels"))
        .ok_or_else(|| DataError::malformed(path, "missing `labels`"))?;
    let data = take("data").ok_or_else(|| DataError::malformed(path, "missing `data`"))?;
    let filenames = take("filenames");

    let labels = sequence(path, "labels", labels)?
        .into_iter()
        .map(|label| match label {
            Value::I64(l) if l >= 0 => Ok(l as usize),
            other => Err(DataError::malformed(
                path,
                format!("label `{other:?}` is not a class id"),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    let data = match data {
        Value::Bytes(flat) => split_records(path, &flat, None)?,
        Value::Tuple(state) => match ndarray_state(&state) {
            Some((rows, raw)) => split_records(path, raw, Some(rows))?,
            None => pixel_rows(path, state)?,
        },
        other => pixel_rows(path, sequence(path, "data", other)?)?,
    };

    let filenames = match filenames {
        Some(filenames) => sequence(path, "filenames", filenames)?
            .into_iter()
            .map(|name| match name {
                Value::Bytes(b) => Ok(String::from_utf8_lossy(&b).into_owned()),
                Value::String(s) => Ok(s),
                other => Err(DataError::malformed(
                    path,
                    format!("filename `{other:?}` is not a string"),
                )),
            })
            .collect::<Result<Vec<_>>>()?,
        None => synthetic_filenames(path, labels.len()),
    };

    RecordBatch::new(path, labels, data, filenames)
}

fn sequence(path: &Path, key: &str, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items),
        other => Err(DataError::malformed(
            path,
            format!("`{key}` is not a sequence: {}", type_name(&other)),
        )),
    }
}

/// Unpickled numpy arrays arrive as their `__setstate__` tuple
/// `(version, shape, dtype, is_fortran, raw)`. Returns the row count and raw
/// bytes of a C ordered `N x 3072` array.
fn ndarray_state(state: &[Value]) -> Option<(usize, &[u8])> {
    match state {
        [_, Value::Tuple(shape), _, Value::Bool(false), Value::Bytes(raw)] => {
            match shape.as_slice() {
                [Value::I64(rows), Value::I64(cols)]
                    if *rows >= 0 && *cols == RECORD_SIZE as i64 =>
                {
                    Some((*rows as usize, raw.as_slice()))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn split_records(path: &Path, flat: &[u8], rows: Option<usize>) -> Result<Vec<Vec<u8>>> {
    let rows = rows.unwrap_or(flat.len() / RECORD_SIZE);
    if rows.checked_mul(RECORD_SIZE) != Some(flat.len()) {
        return Err(DataError::malformed(
            path,
            format!("{} data bytes do not hold {rows} records of {RECORD_SIZE}", flat.len()),
        ));
    }
    Ok(flat.chunks_exact(RECORD_SIZE).map(<[u8]>::to_vec).collect_vec())
}

fn pixel_rows(path: &Path, rows: Vec<Value>) -> Result<Vec<Vec<u8>>> {
    rows.into_iter().map(|row| pixel_row(path, row)).collect()
}

fn pixel_row(path: &Path, row: Value) -> Result<Vec<u8>> {
    match row {
        Value::Bytes(b) => Ok(b),
        Value::List(items) | Value::Tuple(items) => items
            .into_iter()
            .map(|x| match x {
                Value::I64(x) => u8::try_from(x)
                    .map_err(|_| DataError::malformed(path, format!("pixel {x} out of range"))),
                other => Err(DataError::malformed(
                    path,
                    format!("pixel `{other:?}` is not an integer"),
                )),
            })
            .collect(),
        other => Err(DataError::malformed(
            path,
            format!("image row is not a byte string: {}", type_name(&other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::None => "None",
        Value::Bool(_) => "bool",
        Value::I64(_) | Value::Int(_) => "int",
        Value::F64(_) => "float",
        Value::Bytes(_) => "bytes",
        Value::String(_) => "str",
        Value::List(_) => "list",
        Value::Tuple(_) => "tuple",
        Value::Dict(_) => "dict",
        _ => "set",
    }
}

fn synthetic_filenames(path: &Path, n: usize) -> Vec<String> {
    let stem = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    (0..n).map(|i| format!("{stem}#{i}")).collect()
}

/// Reads batches from the binary version of the dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryBatchReader;

impl BinaryBatchReader {
    pub const BYTES_PER_RECORD: usize = RECORD_SIZE + 1;
}

impl RecordBatchReader for BinaryBatchReader {
    fn extension(&self) -> Option<&str> {
        Some("bin")
    }

    fn read(&self, path: &Path) -> Result<RecordBatch> {
        let bytes = std::fs::read(path).map_err(|source| DataError::Io {
            path: path.to_owned(),
            source,
        })?;
        if bytes.len() % Self::BYTES_PER_RECORD != 0 {
            return Err(DataError::malformed(
                path,
                format!(
                    "{} bytes is not a multiple of the {} byte record",
                    bytes.len(),
                    Self::BYTES_PER_RECORD
                ),
            ));
        }

        let (labels, data): (Vec<_>, Vec<_>) = bytes
            .chunks_exact(Self::BYTES_PER_RECORD)
            .map(|record| (record[0] as usize, record[1..].to_vec()))
            .unzip();
        let filenames = synthetic_filenames(path, labels.len());

        RecordBatch::new(path, labels, data, filenames)
    }
}

/// Batch files of one dataset directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFiles {
    /// Sorted by file name.
    pub train: Vec<PathBuf>,
    pub test: PathBuf,
}

impl BatchFiles {
    pub fn discover(dir: impl AsRef<Path>, extension: Option<&str>) -> Result<Self> {
        let dir = dir.as_ref();
        let io_err = |source| DataError::Io {
            path: dir.to_owned(),
            source,
        };

        let matches_extension =
            |path: &Path| path.extension().and_then(|e| e.to_str()) == extension;

        let mut train = std::fs::read_dir(dir)
            .map_err(io_err)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(io_err)?
            .into_iter()
            .filter(|path| path.is_file() && matches_extension(path))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(TRAIN_BATCH_PREFIX))
            })
            .collect_vec();
        train.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let pattern = match extension {
            Some(ext) => format!("{TRAIN_BATCH_PREFIX}*.{ext}"),
            None => format!("{TRAIN_BATCH_PREFIX}*"),
        };
        if train.is_empty() {
            return Err(DataError::NoTrainingBatches {
                dir: dir.to_owned(),
                pattern,
            });
        }

        let test = match extension {
            Some(ext) => dir.join(format!("{TEST_BATCH_NAME}.{ext}")),
            None => dir.join(TEST_BATCH_NAME),
        };
        if !test.is_file() {
            return Err(DataError::MissingTestBatch(test));
        }

        log::info!(
            "found {} training batches ({pattern}) in {}",
            train.len(),
            dir.display()
        );
        Ok(Self { train, test })
    }
}
