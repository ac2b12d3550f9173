pub mod data;
pub mod error;
pub mod utils;

pub use data::split::{
    get_dataset, get_dataset_fully_supervised, SemiSupervisedSplit, SplitConfig, SupervisedSplit,
};
pub use dl_utils::cosine_learning_schedule;
pub use error::DataError;
