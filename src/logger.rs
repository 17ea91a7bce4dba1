use crate::show;
use burn::tensor::{
    Tensor,
    backend::Backend,
    module::interpolate,
    ops::{InterpolateMode, InterpolateOptions},
};
use std::{
    collections::{HashMap, hash_map::Entry},
    fmt::Display,
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing_core::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// Cells per row in logged image grids.
const CELLS_PER_ROW: usize = 8;
/// Spatial size of the sprite thumbnails labelling embeddings.
const SPRITE_SIZE: usize = 32;

/// File-backed sink for one training run: named scalars keyed by step,
/// named image grids keyed by step, embedding batches with label sprites,
/// and a model summary snapshot.
///
/// Layout under the run directory:
/// - `<metric>.log` — `step value` lines, appended;
/// - `images/<name>-<step>.png` — image grids;
/// - `embeddings/embeddings-<step>.tsv` and `embeddings/sprite-<step>.png`;
/// - `model.txt` — module summary.
pub struct RunLogger {
    directory: PathBuf,
    scalars: HashMap<String, BufWriter<File>>,
}

impl RunLogger {
    /// Create the run directory layout and a logger rooted in it.
    pub fn new(directory: impl AsRef<Path>) -> io::Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(directory.join("images"))?;
        fs::create_dir_all(directory.join("embeddings"))?;

        Ok(Self {
            directory,
            scalars: HashMap::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Append a named scalar for the given step, one file per metric name.
    pub fn log_scalar(&mut self, name: &str, step: usize, value: f64) -> io::Result<()> {
        let file_name = format!("{}.log", name.replace(' ', "_"));
        let writer = match self.scalars.entry(file_name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.directory.join(entry.key()))?;
                entry.insert(BufWriter::new(file))
            }
        };

        writeln!(writer, "{step} {value}")?;
        writer.flush()
    }

    /// Save a named grid of `[batch_size, channels, height, width]` images
    /// for the given step.
    pub fn log_image_grid<B: Backend>(
        &mut self,
        name: &str,
        step: usize,
        images: Tensor<B, 4>,
    ) -> io::Result<()> {
        let path = self
            .directory
            .join("images")
            .join(format!("{}-{step}.png", name.replace(' ', "_")));

        show::image_grid(images, CELLS_PER_ROW)
            .save(&path)
            .map_err(io::Error::other)
    }

    /// Write an embedding batch as one TSV row per sample, along with a
    /// square sprite grid of the label images in row order.
    pub fn log_embeddings<B: Backend>(
        &mut self,
        embeddings: Tensor<B, 2>,
        label_images: Tensor<B, 4>,
        step: usize,
    ) -> io::Result<()> {
        let [count, dimensions] = embeddings.dims();
        let values = embeddings
            .into_data()
            .to_vec::<f32>()
            .expect("Embedding data should convert to f32");

        let path = self
            .directory
            .join("embeddings")
            .join(format!("embeddings-{step}.tsv"));
        let mut writer = BufWriter::new(File::create(path)?);
        for row in values.chunks(dimensions) {
            let line = row
                .iter()
                .map(f32::to_string)
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;

        let thumbnails = interpolate(
            label_images,
            [SPRITE_SIZE, SPRITE_SIZE],
            InterpolateOptions::new(InterpolateMode::Nearest),
        );
        let sprite_path = self
            .directory
            .join("embeddings")
            .join(format!("sprite-{step}.png"));

        show::image_grid(thumbnails, (count as f64).sqrt().ceil() as usize)
            .save(&sprite_path)
            .map_err(io::Error::other)
    }

    /// Snapshot the module summary rendering to `model.txt`.
    pub fn log_model_summary<M: Display>(&mut self, module: &M) -> io::Result<()> {
        fs::write(self.directory.join("model.txt"), format!("{module}\n"))
    }
}

/// If a global tracing subscriber is not already configured, send `log` and
/// `tracing` records to the given file and mirror panics into it.
pub fn install_file_logger(file_path: &Path) {
    let directory = file_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = file_path
        .file_name()
        .unwrap_or_else(|| panic!("The path '{}' should point to a file.", file_path.display()));
    let writer = tracing_appender::rolling::never(directory, file_name);

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(LevelFilter::INFO);

    if registry().with(layer).try_init().is_ok() {
        update_panic_hook(file_path);
    }
}

fn update_panic_hook(file_path: &Path) {
    let hook = std::panic::take_hook();
    let file_path = file_path.display().to_string();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC => {info}");
        eprintln!(
            "=== PANIC ===\nA fatal error happened, you can check the experiment logs here => \
             '{file_path}'\n============="
        );
        hook(info);
    }));
}
