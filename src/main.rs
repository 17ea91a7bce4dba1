use burn::{backend::Autodiff, optim::AdamConfig};
use clap::Parser;
use colorize::{
    logger,
    model::UNetConfig,
    training::{self, TrainingConfig},
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "colorize", about = "U-Net grayscale-to-color training")]
struct Args {
    /// Experiment name; artifacts are written under `runs/<exp_name>`.
    #[arg(long, default_value = "colorize")]
    exp_name: String,
    /// Root directory of the color-image dataset.
    #[arg(long)]
    data_path: PathBuf,
    /// Batch size for the training.
    #[arg(long, default_value_t = 128)]
    batch_size: usize,
    /// Learning rate for the training.
    #[arg(long, default_value_t = 3e-4)]
    lr: f64,
    /// Number of epochs for the training.
    #[arg(long, default_value_t = 5)]
    epochs: usize,
}

#[cfg(feature = "wgpu")]
mod selected {
    use burn::backend::wgpu::{Wgpu, WgpuDevice};

    pub type Backend = Wgpu<f32>;

    pub fn device() -> WgpuDevice {
        WgpuDevice::default()
    }
}

#[cfg(all(feature = "cuda", not(feature = "wgpu")))]
mod selected {
    use burn::backend::cuda::{Cuda, CudaDevice};

    pub type Backend = Cuda<f32>;

    pub fn device() -> CudaDevice {
        CudaDevice::default()
    }
}

#[cfg(all(feature = "tch-gpu", not(any(feature = "wgpu", feature = "cuda"))))]
mod selected {
    use burn::backend::libtorch::{LibTorch, LibTorchDevice};

    pub type Backend = LibTorch<f32>;

    #[cfg(not(target_os = "macos"))]
    pub fn device() -> LibTorchDevice {
        LibTorchDevice::Cuda(0)
    }

    #[cfg(target_os = "macos")]
    pub fn device() -> LibTorchDevice {
        LibTorchDevice::Mps
    }
}

#[cfg(all(
    feature = "tch-cpu",
    not(any(feature = "wgpu", feature = "cuda", feature = "tch-gpu"))
))]
mod selected {
    use burn::backend::libtorch::{LibTorch, LibTorchDevice};

    pub type Backend = LibTorch<f32>;

    pub fn device() -> LibTorchDevice {
        LibTorchDevice::Cpu
    }
}

#[cfg(not(any(
    feature = "wgpu",
    feature = "cuda",
    feature = "tch-gpu",
    feature = "tch-cpu"
)))]
mod selected {
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    pub type Backend = NdArray<f32>;

    pub fn device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

fn main() {
    let args = Args::parse();

    let run_dir = PathBuf::from("runs").join(&args.exp_name);
    std::fs::create_dir_all(&run_dir).expect("Run directory should be created");
    logger::install_file_logger(&run_dir.join("experiment.log"));

    let config = TrainingConfig::new(UNetConfig::new(), AdamConfig::new())
        .with_num_epochs(args.epochs)
        .with_batch_size(args.batch_size)
        .with_learning_rate(args.lr);

    training::run::<Autodiff<selected::Backend>>(
        &run_dir,
        &args.data_path,
        config,
        selected::device(),
    );
}
