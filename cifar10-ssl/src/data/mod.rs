use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    tensor::{backend::Backend, Data, Int, Shape, Tensor},
};
use derive_new::new;
use itertools::Itertools;

use self::cifar10::{Image, LabeledExample, IMG_CHANNELS, IMG_HEIGHT, IMG_WIDTH};

pub mod cifar10;
pub mod reader;
pub mod split;

#[derive(Debug, Clone, new)]
pub struct LabeledDataset {
    items: Vec<LabeledExample>,
}

impl Dataset<LabeledExample> for LabeledDataset {
    fn get(&self, index: usize) -> Option<LabeledExample> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, new)]
pub struct UnlabeledDataset {
    items: Vec<Image>,
}

impl Dataset<Image> for UnlabeledDataset {
    fn get(&self, index: usize) -> Option<Image> {
        self.items.get(index).copied()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// H x W x C bytes -> normalized C x H x W floats. Channel order is kept.
fn image_tensor<B: Backend>(img: &Image, device: &B::Device) -> Tensor<B, 3> {
    let values = img
        .iter()
        .flatten()
        .flatten()
        .map(|x| *x as f32 / 255.0)
        .collect_vec();
    let shape = Shape::new([
        IMG_HEIGHT as usize,
        IMG_WIDTH as usize,
        IMG_CHANNELS as usize,
    ]);
    let data = Data::new(values, shape).convert::<B::FloatElem>();
    let tensor = Tensor::<B, 3>::from_data(data, device);

    // H x W x C -> C x W x H -> C x H x W
    let tensor = tensor.swap_dims(0, 2).transpose();
    // normalize
    (tensor - 0.5) / 0.2
}

#[derive(new)]
pub struct LabeledBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Debug, Clone)]
pub struct LabeledBatch<B: Backend> {
    pub img: Tensor<B, 4>,
    /// One-hot targets, `N x classes`.
    pub target: Tensor<B, 2>,
    pub label: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<LabeledExample, LabeledBatch<B>> for LabeledBatcher<B> {
    fn batch(&self, items: Vec<LabeledExample>) -> LabeledBatch<B> {
        let img = items
            .iter()
            .map(|item| image_tensor::<B>(&item.img, &self.device))
            .collect();

        let target = items
            .iter()
            .map(|item| Data::new(item.label.clone(), Shape::new([item.label.len()])))
            .map(|data| data.convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 1>::from_data(data, &self.device))
            .collect();

        let img = Tensor::stack(img, 0);
        let target: Tensor<B, 2> = Tensor::stack(target, 0);
        let label = target.clone().argmax(1).squeeze(1);

        LabeledBatch { img, target, label }
    }
}

#[derive(new)]
pub struct UnlabeledBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Debug, Clone)]
pub struct UnlabeledBatch<B: Backend> {
    pub img: Tensor<B, 4>,
}

impl<B: Backend> Batcher<Image, UnlabeledBatch<B>> for UnlabeledBatcher<B> {
    fn batch(&self, items: Vec<Image>) -> UnlabeledBatch<B> {
        let img = items
            .iter()
            .map(|img| image_tensor::<B>(img, &self.device))
            .collect();

        UnlabeledBatch {
            img: Tensor::stack(img, 0),
        }
    }
}
