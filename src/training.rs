use crate::{
    data::{ColorizationBatch, ColorizationBatcher},
    dataset::ColorizationDataset,
    logger::RunLogger,
    model::{UNet, UNetConfig},
};
use burn::{
    config::Config,
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::{AutodiffModule, Module},
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{ElementConversion, Tensor, backend::AutodiffBackend},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::{path::Path, sync::Arc};

/// Loader of colorization batches, shared between the training loop and the
/// embedding pass.
pub type ColorizationLoader<B> = Arc<dyn DataLoader<B, ColorizationBatch<B>>>;

/// Samples of the last batch visualized per epoch.
const GRID_SAMPLES: usize = 16;
/// Batches of encoder features collected for the embedding projection.
const EMBEDDING_BATCHES: usize = 7;

#[derive(Config)]
pub struct TrainingConfig {
    pub model: UNetConfig,
    pub optimizer: AdamConfig,
    #[config(default = 5)]
    pub num_epochs: usize,
    #[config(default = 128)]
    pub batch_size: usize,
    #[config(default = 1)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 3e-4)]
    pub learning_rate: f64,
}

/// Runs the supervised loop: for every epoch, for every batch, predict,
/// measure the mean-squared pixel error, backpropagate and apply one
/// optimizer step. Gradients never accumulate across batches; every
/// backward pass produces a fresh set that the step consumes.
///
/// The running mean loss is displayed live on a progress bar. When a logger
/// is given, the epoch mean and a sample of the last batch (input,
/// prediction, ground truth) are recorded once per epoch.
///
/// Returns the updated model and the final epoch's mean loss (0.0 when the
/// loader yields no batches).
pub fn train<B: AutodiffBackend>(
    mut model: UNet<B>,
    mut optim: impl Optimizer<UNet<B>, B>,
    dataloader: ColorizationLoader<B>,
    num_epochs: usize,
    learning_rate: f64,
    mut logger: Option<&mut RunLogger>,
) -> (UNet<B>, f64) {
    let mut mean_loss = 0.0;

    for epoch in 1..=num_epochs {
        let mut running_loss = 0.0;
        let mut batches = 0;
        let mut last_batch = None;

        let progress = ProgressBar::new(dataloader.num_items() as u64);
        progress.set_style(
            ProgressStyle::with_template("{msg} [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
                .expect("Progress template should be valid")
                .progress_chars("#>-"),
        );

        for batch in dataloader.iter() {
            let batch_size = batch.inputs.dims()[0];
            let prediction = model.forward(batch.inputs.clone());
            let loss = MseLoss::new().forward(
                prediction.clone(),
                batch.targets.clone(),
                Reduction::Mean,
            );
            running_loss += loss.clone().into_scalar().elem::<f64>();
            batches += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(learning_rate, model, grads);

            if logger.is_some() {
                last_batch = Some((batch.inputs, prediction.detach(), batch.targets));
            }

            progress.inc(batch_size as u64);
            progress.set_message(format!(
                "training loss: {:.6}",
                running_loss / batches as f64
            ));
        }
        progress.finish();

        mean_loss = if batches == 0 {
            0.0
        } else {
            running_loss / batches as f64
        };
        log::info!("epoch {epoch}/{num_epochs} - training loss: {mean_loss:.6}");

        if let Some(writer) = logger.as_mut() {
            writer
                .log_scalar("training loss", epoch, mean_loss)
                .expect("Metrics should be written to the run directory");

            if let Some((inputs, prediction, targets)) = last_batch {
                let count = inputs.dims()[0].min(GRID_SAMPLES);
                for (name, images) in [
                    ("input", inputs),
                    ("predicted", prediction),
                    ("ground truth", targets),
                ] {
                    writer
                        .log_image_grid(name, epoch, images.slice([0..count]))
                        .expect("Image grids should be written to the run directory");
                }
            }
        }
    }

    (model, mean_loss)
}

/// Full training entry point: dataset, dataloader, model and optimizer
/// assembly, the training loop, then the post-training embedding
/// projection, model summary and weight export.
pub fn run<B: AutodiffBackend>(
    run_dir: &Path,
    data_path: &Path,
    config: TrainingConfig,
    device: B::Device,
) {
    config
        .save(run_dir.join("config.json"))
        .expect("Config should be saved successfully");
    B::seed(config.seed);

    let dataset = ColorizationDataset::new(data_path)
        .unwrap_or_else(|err| panic!("Dataset should load from {}: {err}", data_path.display()));
    log::info!(
        "training on {} images from {}",
        dataset.len(),
        data_path.display()
    );

    let dataloader = DataLoaderBuilder::new(ColorizationBatcher::new())
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset);

    let model = config.model.init::<B>(&device);
    let optim = config.optimizer.init();
    let mut logger = RunLogger::new(run_dir).expect("Run directory should be writable");

    let (model, mean_loss) = train(
        model,
        optim,
        dataloader.clone(),
        config.num_epochs,
        config.learning_rate,
        Some(&mut logger),
    );
    log::info!("final training loss: {mean_loss:.6}");

    log_embeddings(&model, dataloader, &mut logger);
    logger
        .log_model_summary(&model)
        .expect("Model summary should be written to the run directory");

    model
        .save_file(run_dir.join("unet"), &CompactRecorder::new())
        .expect("Trained model should be saved successfully");
}

/// Collects encoder features over a fixed number of batches on the
/// autodiff-free model and hands them to the logger, each sample flattened
/// and labelled with its color target.
fn log_embeddings<B: AutodiffBackend>(
    model: &UNet<B>,
    dataloader: ColorizationLoader<B>,
    logger: &mut RunLogger,
) {
    let model = model.valid();
    let mut features = Vec::new();
    let mut labels = Vec::new();

    for batch in dataloader.iter().take(EMBEDDING_BATCHES) {
        let encoded = model.features(batch.inputs.inner());
        let [count, channels, height, width] = encoded.dims();
        features.push(encoded.reshape([count, channels * height * width]));
        labels.push(batch.targets.inner());
    }

    if features.is_empty() {
        return;
    }

    logger
        .log_embeddings(Tensor::cat(features, 0), Tensor::cat(labels, 0), 1)
        .expect("Embeddings should be written to the run directory");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColorizationItem;
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataset::InMemDataset,
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    const SIZE: usize = 16;

    fn synthetic_items(count: usize) -> Vec<ColorizationItem> {
        (0..count)
            .map(|index| ColorizationItem {
                rgb: (0..SIZE * SIZE * 3)
                    .map(|pixel| ((pixel + index * 37) % 256) as u8)
                    .collect(),
                width: SIZE,
                height: SIZE,
            })
            .collect()
    }

    fn dataloader(items: Vec<ColorizationItem>) -> ColorizationLoader<TestBackend> {
        DataLoaderBuilder::new(ColorizationBatcher::new())
            .batch_size(2)
            .shuffle(42)
            .num_workers(1)
            .build(InMemDataset::new(items))
    }

    #[test]
    fn zero_batches_leave_the_model_unchanged() {
        let device = Default::default();
        let model = UNetConfig::new().init::<TestBackend>(&device);
        let probe = Tensor::<TestBackend, 4>::ones([1, 1, SIZE, SIZE], &device);
        let before = model
            .forward(probe.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        let (model, mean_loss) = train(
            model,
            AdamConfig::new().init(),
            dataloader(vec![]),
            3,
            1e-3,
            None,
        );

        let after = model.forward(probe).into_data().to_vec::<f32>().unwrap();
        assert_eq!(before, after);
        assert_eq!(mean_loss, 0.0);
    }

    #[test]
    fn identical_runs_reach_identical_losses() {
        let device = Default::default();
        let model = UNetConfig::new().init::<TestBackend>(&device);
        let twin = model.clone();

        let (_, first) = train(
            model,
            AdamConfig::new().init(),
            dataloader(synthetic_items(4)),
            2,
            1e-3,
            None,
        );
        let (_, second) = train(
            twin,
            AdamConfig::new().init(),
            dataloader(synthetic_items(4)),
            2,
            1e-3,
            None,
        );

        assert_eq!(first, second);
    }

    #[test]
    fn mean_squared_error_is_zero_only_for_identical_images() {
        let device = Default::default();
        let prediction = Tensor::<TestBackend, 4>::full([1, 3, 4, 4], 0.25, &device);

        let identical = MseLoss::new()
            .forward(prediction.clone(), prediction.clone(), Reduction::Mean)
            .into_scalar()
            .elem::<f64>();
        assert_eq!(identical, 0.0);

        let target = Tensor::<TestBackend, 4>::full([1, 3, 4, 4], 0.75, &device);
        let different = MseLoss::new()
            .forward(prediction, target, Reduction::Mean)
            .into_scalar()
            .elem::<f64>();
        assert!(different > 0.0);
        assert!((different - 0.25).abs() < 1e-6);
    }

    #[test]
    fn per_epoch_artifacts_land_in_the_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = RunLogger::new(dir.path()).unwrap();
        let device = Default::default();
        let model = UNetConfig::new().init::<TestBackend>(&device);

        train(
            model,
            AdamConfig::new().init(),
            dataloader(synthetic_items(2)),
            1,
            1e-3,
            Some(&mut logger),
        );

        assert!(dir.path().join("training_loss.log").is_file());
        assert!(dir.path().join("images/input-1.png").is_file());
        assert!(dir.path().join("images/predicted-1.png").is_file());
        assert!(dir.path().join("images/ground_truth-1.png").is_file());
    }
}
