//! Command line arguments.
//!
//! Uses clap for parsing, with help text (`--help`) and clear errors for
//! invalid values.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

/// Parsed application arguments.
///
/// # Examples
///
/// ```bash
/// # Run on a connected headset with the compiled shaders in ./shaders
/// ./vireo
///
/// # Render 100 frames without a GPU or headset, then exit
/// ./vireo --dummy --max-frames 100
///
/// # More logging from the XR layer only
/// ./vireo --log-level info,vireo_xr=debug
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppArgs {
    pub shader_dir: PathBuf,
    pub max_frames: Option<u64>,
    pub validation: bool,
    pub log_level: Option<String>,
    pub dummy: bool,
    pub frames_in_flight: usize,
}

impl Default for AppArgs {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("shaders"),
            max_frames: None,
            validation: cfg!(debug_assertions),
            log_level: None,
            dummy: false,
            frames_in_flight: 2,
        }
    }
}

impl AppArgs {
    /// Parse the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        ClapArgs::parse().into()
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        ClapArgs::try_parse_from(args).map(Into::into)
    }

    pub fn with_shader_dir(mut self, shader_dir: impl Into<PathBuf>) -> Self {
        self.shader_dir = shader_dir.into();
        self
    }

    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn with_dummy(mut self, dummy: bool) -> Self {
        self.dummy = dummy;
        self
    }

    /// Log filter for env_logger: `--log-level`, else `RUST_LOG`, else `info`.
    pub fn log_filter(&self) -> String {
        self.log_level
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string())
    }
}

/// Vireo stereo VR renderer.
#[derive(Parser, Debug)]
#[command(
    name = "vireo",
    about = "Stereo VR renderer on Vulkan and OpenXR",
    long_about = "Renders a demo scene into an OpenXR headset using Vulkan multiview.\n\n\
        Shaders are loaded as SPIR-V from --shader-dir; compile the GLSL sources\n\
        in shaders/ with glslc first.\n\n\
        EXAMPLES:\n\
          # Run on a connected headset\n\
          ./vireo\n\
        \n\
          # Run headless for 10 frames\n\
          ./vireo --dummy --max-frames 10",
    version
)]
struct ClapArgs {
    /// Directory containing the compiled SPIR-V shaders.
    #[arg(long, default_value = "shaders")]
    shader_dir: PathBuf,

    /// Exit after N frame loop iterations (useful for testing).
    #[arg(long)]
    max_frames: Option<u64>,

    /// Enable the Vulkan validation layer.
    #[arg(long, conflicts_with = "no_validation")]
    validation: bool,

    /// Disable the Vulkan validation layer.
    #[arg(long, conflicts_with = "validation")]
    no_validation: bool,

    /// Log filter, e.g. `debug` or `info,vireo_xr=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,

    /// Run against the Dummy GPU and a scripted XR runtime.
    #[arg(long)]
    dummy: bool,

    /// Frames the CPU may record ahead of the GPU.
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u64).range(1..=8))]
    frames_in_flight: u64,
}

impl From<ClapArgs> for AppArgs {
    fn from(args: ClapArgs) -> Self {
        // --validation forces on, --no-validation forces off, otherwise debug default
        let validation = args.validation || (!args.no_validation && cfg!(debug_assertions));

        Self {
            shader_dir: args.shader_dir,
            max_frames: args.max_frames,
            validation,
            log_level: args.log_level,
            dummy: args.dummy,
            frames_in_flight: args.frames_in_flight as usize,
        }
    }
}
