//! Train/test splits for fully supervised and semi supervised training.

use std::{collections::BTreeMap, path::Path};

use burn::config::Config;
use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use super::{
    cifar10::{Image, LabeledExample, NUM_CLASSES},
    reader::{BatchFiles, PickleBatchReader, RecordBatch, RecordBatchReader},
};
use crate::error::{self, DataError};

/// Image augmentation hook accepted by [`get_dataset`]. It is currently not
/// applied to any split.
pub type Augment = fn(&Image) -> Image;

#[derive(Config)]
pub struct SplitConfig {
    /// Total number of labeled training images, spread evenly over classes.
    pub n_label: usize,
    #[config(default = 10)]
    pub classes: usize,
    /// Seeds the per class shuffle. Unseeded splits differ between runs.
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SupervisedSplit {
    pub train: Vec<LabeledExample>,
    pub test: Vec<LabeledExample>,
}

#[derive(Debug, Clone)]
pub struct SemiSupervisedSplit {
    pub labeled: Vec<LabeledExample>,
    pub unlabeled: Vec<Image>,
    pub test: Vec<LabeledExample>,
}

fn in_batch_order(batches: &[RecordBatch]) -> impl Iterator<Item = &RecordBatch> {
    batches.iter().sorted_by(|a, b| a.path.cmp(&b.path))
}

fn decode_labeled<'a>(
    batches: impl Iterator<Item = &'a RecordBatch>,
    classes: usize,
) -> error::Result<Vec<LabeledExample>> {
    batches
        .flat_map(|batch| batch.records())
        .map(|record| record.decode_labeled(classes))
        .collect()
}

/// Decodes every training record, then the test batch, keeping record order.
pub fn assemble_supervised(
    batches: &[RecordBatch],
    test_batch: &RecordBatch,
    classes: usize,
) -> error::Result<SupervisedSplit> {
    let train = decode_labeled(in_batch_order(batches), classes)?;
    let test = decode_labeled(std::iter::once(test_batch), classes)?;

    log::info!("supervised split: {} train, {} test", train.len(), test.len());
    Ok(SupervisedSplit { train, test })
}

/// Splits every class into `n_label / classes` labeled images and unlabeled
/// rest. Output is ordered by class id, images of a class in shuffled order.
pub fn assemble_semi_supervised<R: Rng + ?Sized>(
    batches: &[RecordBatch],
    test_batch: &RecordBatch,
    n_label: usize,
    classes: usize,
    rng: &mut R,
) -> error::Result<SemiSupervisedSplit> {
    let mut by_class: BTreeMap<usize, Vec<Image>> = BTreeMap::new();
    for record in in_batch_order(batches).flat_map(|batch| batch.records()) {
        if record.label >= classes {
            return Err(dl_utils::LabelError::OutOfRange {
                label: record.label,
                classes,
            }
            .into());
        }
        by_class.entry(record.label).or_default().push(record.decode()?);
    }

    let per_class = n_label.checked_div(classes).unwrap_or_default();
    if per_class * classes != n_label {
        log::warn!(
            "{n_label} labels do not divide into {classes} classes, using {per_class} per class"
        );
    }

    let mut labeled = Vec::new();
    let mut unlabeled = Vec::new();
    for class in 0..classes {
        let mut images = by_class
            .remove(&class)
            .ok_or(DataError::MissingClass { class })?;
        if images.len() < per_class {
            return Err(DataError::InsufficientClass {
                class,
                available: images.len(),
                requested: per_class,
            });
        }

        images.shuffle(rng);
        let rest = images.split_off(per_class);

        let label = dl_utils::one_hot(class, classes)?;
        labeled.extend(images.into_iter().map(|img| LabeledExample {
            img,
            label: label.clone(),
        }));
        unlabeled.extend(rest);
    }

    let test = decode_labeled(std::iter::once(test_batch), classes)?;

    log::info!(
        "semi supervised split: {} labeled, {} unlabeled, {} test",
        labeled.len(),
        unlabeled.len(),
        test.len()
    );
    Ok(SemiSupervisedSplit {
        labeled,
        unlabeled,
        test,
    })
}

pub fn load_batches(
    dataset_dir: impl AsRef<Path>,
    reader: &impl RecordBatchReader,
) -> error::Result<(Vec<RecordBatch>, RecordBatch)> {
    let files = BatchFiles::discover(dataset_dir, reader.extension())?;

    let train = files
        .train
        .iter()
        .map(|path| {
            let batch = reader.read(path)?;
            log::debug!("read {} records from {}", batch.len(), path.display());
            Ok(batch)
        })
        .collect::<error::Result<Vec<_>>>()?;
    let test = reader.read(&files.test)?;

    Ok((train, test))
}

/// Semi supervised split of the python CIFAR-10 batches in `dataset_dir`.
pub fn get_dataset(
    dataset_dir: impl AsRef<Path>,
    n_label: usize,
    augment: Option<Augment>,
) -> error::Result<SemiSupervisedSplit> {
    if augment.is_some() {
        log::debug!("augment hook given, unlabeled images are returned unaugmented");
    }
    get_dataset_with_reader(dataset_dir, &SplitConfig::new(n_label), &PickleBatchReader)
}

pub fn get_dataset_with_reader(
    dataset_dir: impl AsRef<Path>,
    config: &SplitConfig,
    reader: &impl RecordBatchReader,
) -> error::Result<SemiSupervisedSplit> {
    let (train, test) = load_batches(dataset_dir, reader)?;
    match config.seed {
        Some(seed) => assemble_semi_supervised(
            &train,
            &test,
            config.n_label,
            config.classes,
            &mut StdRng::seed_from_u64(seed),
        ),
        None => assemble_semi_supervised(
            &train,
            &test,
            config.n_label,
            config.classes,
            &mut rand::thread_rng(),
        ),
    }
}

pub fn get_dataset_fully_supervised(dataset_dir: impl AsRef<Path>) -> error::Result<SupervisedSplit> {
    get_dataset_fully_supervised_with_reader(dataset_dir, &PickleBatchReader)
}

pub fn get_dataset_fully_supervised_with_reader(
    dataset_dir: impl AsRef<Path>,
    reader: &impl RecordBatchReader,
) -> error::Result<SupervisedSplit> {
    let (train, test) = load_batches(dataset_dir, reader)?;
    assemble_supervised(&train, &test, NUM_CLASSES as _)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cifar10::{decode_image, RECORD_SIZE};

    /// Every image is filled with its id, so `img[0][0][0]` identifies it.
    fn batch(path: &str, records: &[(usize, u8)]) -> RecordBatch {
        RecordBatch::new(
            path,
            records.iter().map(|(label, _)| *label).collect(),
            records.iter().map(|(_, id)| vec![*id; RECORD_SIZE]).collect(),
            records.iter().map(|(_, id)| format!("{id}.png")).collect(),
        )
        .unwrap()
    }

    fn id(img: &Image) -> u8 {
        img[0][0][0]
    }

    #[test]
    fn two_classes_end_to_end() {
        let train = [batch(
            "data_batch_1",
            &[(0, 1), (1, 2), (0, 3), (1, 4), (0, 5), (1, 6), (0, 7), (1, 8)],
        )];
        let test = batch("test_batch", &[(1, 100), (0, 101), (1, 102)]);

        let split =
            assemble_semi_supervised(&train, &test, 2, 2, &mut StdRng::seed_from_u64(0)).unwrap();

        assert_eq!(split.labeled.len(), 2);
        assert_eq!(split.labeled[0].class(), Some(0));
        assert_eq!(split.labeled[1].class(), Some(1));
        assert_eq!(split.unlabeled.len(), 6);

        let expected = decode_labeled(std::iter::once(&test), 2).unwrap();
        assert_eq!(split.test, expected);
        assert_eq!(split.test.iter().map(|e| id(&e.img)).collect_vec(), [100, 101, 102]);
        assert_eq!(split.test.iter().filter_map(|e| e.class()).collect_vec(), [1, 0, 1]);
    }

    #[test]
    fn partition_is_complete_and_disjoint() {
        let records = (0..60u8).map(|i| ((i % 3) as usize, i)).collect_vec();
        let train = [
            batch("data_batch_2", &records[30..]),
            batch("data_batch_1", &records[..30]),
        ];
        let test = batch("test_batch", &[(2, 200)]);

        let split =
            assemble_semi_supervised(&train, &test, 9, 3, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(split.labeled.len(), 9);
        assert_eq!(split.unlabeled.len(), 51);

        // labeled images come in class order, three per class
        for (i, example) in split.labeled.iter().enumerate() {
            assert_eq!(example.class(), Some(i / 3));
            assert_eq!(id(&example.img) as usize % 3, i / 3);
        }

        let mut seen = split
            .labeled
            .iter()
            .map(|e| id(&e.img))
            .chain(split.unlabeled.iter().map(id))
            .collect_vec();
        seen.sort();
        assert_eq!(seen, (0..60).collect_vec());

        // unlabeled images are grouped by ascending class
        let classes = split.unlabeled.iter().map(|img| id(img) % 3).collect_vec();
        assert!(classes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn remainder_is_dropped() {
        let records = (0..20u8).map(|i| ((i % 2) as usize, i)).collect_vec();
        let train = [batch("data_batch_1", &records)];
        let test = batch("test_batch", &[]);

        let split =
            assemble_semi_supervised(&train, &test, 5, 2, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(split.labeled.len(), 4);
        assert_eq!(split.unlabeled.len(), 16);
        assert!(split.test.is_empty());
    }

    #[test]
    fn seeded_split_is_reproducible() {
        let records = (0..40u8).map(|i| ((i % 4) as usize, i)).collect_vec();
        let train = [batch("data_batch_1", &records)];
        let test = batch("test_batch", &[]);

        let run = |seed| {
            let split = assemble_semi_supervised(
                &train,
                &test,
                8,
                4,
                &mut StdRng::seed_from_u64(seed),
            )
            .unwrap();
            split.unlabeled.iter().map(id).collect_vec()
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn missing_class() {
        let train = [batch("data_batch_1", &[(0, 1), (2, 2)])];
        let test = batch("test_batch", &[]);
        let err = assemble_semi_supervised(&train, &test, 3, 3, &mut rand::thread_rng())
            .unwrap_err();
        assert!(matches!(err, DataError::MissingClass { class: 1 }));
    }

    #[test]
    fn too_few_images_in_class() {
        let train = [batch("data_batch_1", &[(0, 1), (1, 2), (1, 3)])];
        let test = batch("test_batch", &[]);
        let err = assemble_semi_supervised(&train, &test, 4, 2, &mut rand::thread_rng())
            .unwrap_err();
        assert!(matches!(
            err,
            DataError::InsufficientClass {
                class: 0,
                available: 1,
                requested: 2
            }
        ));
    }

    #[test]
    fn huge_label_budget() {
        let train = [batch("data_batch_1", &[(0, 1)])];
        let test = batch("test_batch", &[]);
        let err = assemble_semi_supervised(&train, &test, usize::MAX / 2, 1, &mut rand::thread_rng())
            .unwrap_err();
        assert!(matches!(
            err,
            DataError::InsufficientClass {
                class: 0,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_labels() {
        let train = [batch("data_batch_1", &[(0, 1), (5, 2)])];
        let test = batch("test_batch", &[]);
        assert!(matches!(
            assemble_semi_supervised(&train, &test, 2, 2, &mut rand::thread_rng()),
            Err(DataError::Label(_))
        ));
        assert!(matches!(
            assemble_supervised(&train, &test, 2),
            Err(DataError::Label(_))
        ));
    }

    #[test]
    fn supervised_keeps_batch_then_record_order() {
        let train = [
            batch("data_batch_2", &[(3, 30), (4, 40)]),
            batch("data_batch_1", &[(1, 10), (2, 20)]),
        ];
        let test = batch("test_batch", &[(9, 90)]);

        let split = assemble_supervised(&train, &test, 10).unwrap();
        assert_eq!(split.train.iter().map(|e| id(&e.img)).collect_vec(), [10, 20, 30, 40]);
        assert_eq!(split.train.iter().filter_map(|e| e.class()).collect_vec(), [1, 2, 3, 4]);
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.test[0].img, decode_image(&[90; RECORD_SIZE]).unwrap());
        assert_eq!(split.test[0].label[9], 1.0);
    }

    #[test]
    fn shape_errors_abort() {
        let train = [RecordBatch::new(
            "data_batch_1",
            vec![0],
            vec![vec![0; 10]],
            vec!["broken.png".into()],
        )
        .unwrap()];
        let test = batch("test_batch", &[]);
        assert!(matches!(
            assemble_supervised(&train, &test, 10),
            Err(DataError::Shape { actual: 10, .. })
        ));
    }
}
