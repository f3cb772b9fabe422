// color-line-det: color line steering node

use anyhow::{Context, Result};
use clap::Parser;
use colorline_eye::camera::{CameraSettings, CameraSource};
use colorline_eye::preview::{HeadlessPreview, HighGuiPreview, PreviewSurface};
use colorline_eye::transport::{
    write_poses, ImageMessage, ImageSource, MessageBus, PoseMessage, PosePublisher,
};
use colorline_eye::{CameraParams, ColorLineNode, DetectorConfig, NodeConfig};
use std::any::Any;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "color-line-det")]
#[command(about = "Detects a colored floor line and publishes a steering angle", long_about = None)]
#[command(version)]
struct Cli {
    /// Parameter file (JSON, TOML or YAML); flags override its values
    #[arg(long)]
    params: Option<PathBuf>,

    /// Input image topic
    #[arg(long)]
    subscriber: Option<String>,

    /// Output steering topic
    #[arg(long)]
    publisher: Option<String>,

    /// Camera descriptor file name
    #[arg(long)]
    config: Option<String>,

    /// Directory the camera descriptor is resolved against
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Band offset from the bottom edge, as a fraction of the frame height
    #[arg(long, allow_hyphen_values = true)]
    line_location: Option<f64>,

    /// Line color (black, red, yellow, green, blue)
    #[arg(long)]
    line_color: Option<String>,

    /// Outgoing queue depth
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Capture frames from a local camera at this index
    #[arg(long)]
    camera: Option<i32>,

    /// Capture width
    #[arg(long, default_value = "640")]
    camera_width: u32,

    /// Capture height
    #[arg(long, default_value = "480")]
    camera_height: u32,

    /// Capture frame rate
    #[arg(long, default_value = "30")]
    camera_fps: u32,

    /// Disable the preview window
    #[arg(long)]
    no_preview: bool,

    /// Also show the band mask
    #[arg(long)]
    show_mask: bool,

    /// Use ROS 2 topics instead of the in-process bus
    #[cfg(feature = "ros2")]
    #[arg(long)]
    ros: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Node parameters from the optional file with flag overrides applied.
    fn node_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.params {
            Some(path) => NodeConfig::from_file(path)
                .with_context(|| format!("Failed to read parameters from {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(subscriber) = &self.subscriber {
            config.subscriber = subscriber.clone();
        }
        if let Some(publisher) = &self.publisher {
            config.publisher = publisher.clone();
        }
        if let Some(descriptor) = &self.config {
            config.config = descriptor.clone();
        }
        if let Some(config_dir) = &self.config_dir {
            config.config_dir = config_dir.clone();
        }
        if let Some(line_location) = self.line_location {
            config.line_location = line_location;
        }
        if let Some(line_color) = &self.line_color {
            config.line_color = line_color.clone();
        }
        if let Some(queue_depth) = self.queue_depth {
            config.queue_depth = queue_depth;
        }
        if self.no_preview {
            config.preview = false;
        }
        if self.show_mask {
            config.show_mask = true;
        }

        config.validate().context("Invalid node parameters")?;
        Ok(config)
    }

    fn camera_settings(&self) -> Option<CameraSettings> {
        self.camera.map(|index| CameraSettings {
            index,
            resolution: (self.camera_width, self.camera_height),
            frame_rate: self.camera_fps,
            ..CameraSettings::default()
        })
    }

    /// The in-process bus only sees images when a local camera feeds it.
    fn has_image_input(&self) -> bool {
        self.camera.is_some() || self.use_ros()
    }

    #[cfg(feature = "ros2")]
    fn use_ros(&self) -> bool {
        self.ros
    }

    #[cfg(not(feature = "ros2"))]
    fn use_ros(&self) -> bool {
        false
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let config = cli.node_config()?;
    let descriptor = config.descriptor_path();
    let params = CameraParams::from_file(&descriptor)
        .with_context(|| format!("Failed to load camera descriptor {}", descriptor.display()))?;
    let detector = DetectorConfig::from_node(&config, &params);

    let preview: Box<dyn PreviewSurface> = if config.preview {
        Box::new(HighGuiPreview::new(config.show_mask))
    } else {
        Box::new(HeadlessPreview)
    };

    if !cli.has_image_input() {
        anyhow::bail!("No image input: pass --camera <index> to capture from a local device");
    }

    let bus = MessageBus::new(config.queue_depth);
    let mut camera = None;

    let (publisher, mut source, _transport) = if cli.use_ros() {
        ros_transport(&config)?
    } else {
        let publisher = bus.publisher::<PoseMessage>(&config.publisher)?;
        let source = bus.subscribe::<ImageMessage>(&config.subscriber)?;
        let poses = bus.subscribe::<PoseMessage>(&config.publisher)?;
        tokio::spawn(async move {
            if let Err(e) = write_poses(poses, std::io::stdout()).await {
                error!("Steering echo stopped: {}", e);
            }
        });
        let endpoints: Endpoints = (Box::new(publisher), Box::new(source), Box::new(()));
        endpoints
    };

    if let Some(settings) = cli.camera_settings() {
        let source = CameraSource::new(settings);
        source
            .start(bus.publisher::<ImageMessage>(&config.subscriber)?)
            .context("Failed to start camera")?;
        camera = Some(source);
    }

    info!("Subscribed to {}, publishing on {}", config.subscriber, config.publisher);

    let mut node = ColorLineNode::new(detector, publisher, preview)?;
    node.spin(source.as_mut(), wait_for_shutdown()).await;

    if let Some(camera) = camera {
        camera.stop();
    }
    Ok(())
}

/// Pose publisher, image source and whatever has to stay alive behind them.
type Endpoints = (Box<dyn PosePublisher>, Box<dyn ImageSource>, Box<dyn Any>);

#[cfg(feature = "ros2")]
fn ros_transport(config: &NodeConfig) -> Result<Endpoints> {
    use colorline_eye::transport::ros::RosBridge;

    let bridge = RosBridge::new("color_line_det").context("Failed to start ROS node")?;
    let publisher = bridge.pose_publisher(&config.publisher, config.queue_depth)?;
    let source = bridge.image_source(&config.subscriber, config.queue_depth)?;
    let endpoints: Endpoints = (Box::new(publisher), Box::new(source), Box::new(bridge));
    Ok(endpoints)
}

#[cfg(not(feature = "ros2"))]
fn ros_transport(_config: &NodeConfig) -> Result<Endpoints> {
    anyhow::bail!("Built without the ros2 feature")
}

/// Wait for Ctrl+C or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
