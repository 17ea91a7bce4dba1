use burn::{
    config::Config,
    module::Module,
    nn::{
        PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig},
        interpolate::{Interpolate2d, Interpolate2dConfig, InterpolateMode},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    tensor::{Tensor, backend::Backend},
};

/// Two 3x3 convolutions with unit padding, each followed by a ReLU.
#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    activation: Relu,
}

/// Configuration to create a [DoubleConv] block.
#[derive(Config, Debug)]
pub struct DoubleConvConfig {
    /// Input and output channel counts.
    pub channels: [usize; 2],
}

impl DoubleConvConfig {
    /// Initialize a new [DoubleConv] block.
    pub fn init<B: Backend>(&self, device: &B::Device) -> DoubleConv<B> {
        let [channels_in, channels_out] = self.channels;
        let conv1 = Conv2dConfig::new([channels_in, channels_out], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([channels_out, channels_out], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        DoubleConv {
            conv1,
            conv2,
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> DoubleConv<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.activation.forward(self.conv1.forward(input));
        self.activation.forward(self.conv2.forward(x))
    }
}

/// Encoder stage: convolution block, then 2x max-pooling.
#[derive(Module, Debug)]
pub struct DownBlock<B: Backend> {
    convs: DoubleConv<B>,
    pool: MaxPool2d,
}

/// Configuration to create a [DownBlock].
#[derive(Config, Debug)]
pub struct DownBlockConfig {
    /// Input and output channel counts.
    pub channels: [usize; 2],
}

impl DownBlockConfig {
    /// Initialize a new [DownBlock].
    pub fn init<B: Backend>(&self, device: &B::Device) -> DownBlock<B> {
        DownBlock {
            convs: DoubleConvConfig::new(self.channels).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }
}

impl<B: Backend> DownBlock<B> {
    /// Returns the pooled activation and the pre-pool activation. The
    /// latter is forwarded to the matching decoder stage as a skip tensor.
    pub fn forward(&self, input: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let skip = self.convs.forward(input);
        let pooled = self.pool.forward(skip.clone());

        (pooled, skip)
    }
}

/// Decoder stage: 2x nearest-neighbour upsample, concatenation with the
/// matching skip tensor, then a convolution block.
#[derive(Module, Debug)]
pub struct UpBlock<B: Backend> {
    upsample: Interpolate2d,
    convs: DoubleConv<B>,
}

/// Configuration to create an [UpBlock].
#[derive(Config, Debug)]
pub struct UpBlockConfig {
    /// Concatenated input and output channel counts.
    pub channels: [usize; 2],
}

impl UpBlockConfig {
    /// Initialize a new [UpBlock].
    pub fn init<B: Backend>(&self, device: &B::Device) -> UpBlock<B> {
        UpBlock {
            upsample: Interpolate2dConfig::new()
                .with_scale_factor(Some([2.0, 2.0]))
                .with_mode(InterpolateMode::Nearest)
                .init(),
            convs: DoubleConvConfig::new(self.channels).init(device),
        }
    }
}

impl<B: Backend> UpBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let upsampled = self.upsample.forward(input);
        let x = Tensor::cat(vec![upsampled, skip], 1);

        self.convs.forward(x)
    }
}

/// U-Net colorizer: a three-stage encoder/decoder with skip connections
/// and a 1x1 output convolution.
///
/// The model is a pure feed-forward function of its parameters and input;
/// skip tensors live only for the duration of one [forward](UNet::forward)
/// call.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    down1: DownBlock<B>,
    down2: DownBlock<B>,
    down3: DownBlock<B>,
    bottleneck: DoubleConv<B>,
    up3: UpBlock<B>,
    up2: UpBlock<B>,
    up1: UpBlock<B>,
    output: Conv2d<B>,
}

/// Configuration to create a [UNet] using the [init function](UNetConfig::init).
#[derive(Config, Debug)]
pub struct UNetConfig {
    /// Channel count of the grayscale input.
    #[config(default = 1)]
    pub input_channels: usize,
    /// Channel count of the colorized output.
    #[config(default = 3)]
    pub output_channels: usize,
    /// Channel width of the first encoder stage; doubles at every stage down.
    #[config(default = 32)]
    pub base_channels: usize,
}

impl UNetConfig {
    /// Initialize a new [UNet] module.
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        let [c1, c2, c3] = [
            self.base_channels,
            self.base_channels * 2,
            self.base_channels * 4,
        ];
        let bottleneck = self.base_channels * 8;

        UNet {
            down1: DownBlockConfig::new([self.input_channels, c1]).init(device),
            down2: DownBlockConfig::new([c1, c2]).init(device),
            down3: DownBlockConfig::new([c2, c3]).init(device),
            bottleneck: DoubleConvConfig::new([c3, bottleneck]).init(device),
            up3: UpBlockConfig::new([bottleneck + c3, c3]).init(device),
            up2: UpBlockConfig::new([c3 + c2, c2]).init(device),
            up1: UpBlockConfig::new([c2 + c1, c1]).init(device),
            output: Conv2dConfig::new([c1, self.output_channels], [1, 1]).init(device),
        }
    }
}

impl<B: Backend> UNet<B> {
    /// Colorizes a batch of grayscale images.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, 1, height, width]`, height and width divisible by 8
    /// - output: `[batch_size, 3, height, width]`
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let (x, skip1) = self.down1.forward(input);
        let (x, skip2) = self.down2.forward(x);
        let (x, skip3) = self.down3.forward(x);

        let x = self.bottleneck.forward(x);

        let x = self.up3.forward(x, skip3);
        let x = self.up2.forward(x, skip2);
        let x = self.up1.forward(x, skip1);

        self.output.forward(x)
    }

    /// Returns the encoder's final downsampled representation, intended for
    /// embedding visualization rather than gradient-based training.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, 1, height, width]`
    /// - output: `[batch_size, base_channels * 4, height / 8, width / 8]`
    pub fn features(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let (x, _) = self.down1.forward(input);
        let (x, _) = self.down2.forward(x);
        let (x, _) = self.down3.forward(x);

        x
    }
}
