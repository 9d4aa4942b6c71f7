mod build_mode;
pub use build_mode::BuildMode;

mod env_vars;
pub use env_vars::EnvVars;

mod volume;
pub use volume::VolumeMount;

mod image;
pub use image::{DiscoveredImage, FLAT_TAG, ImageRef, TMP_TAG};

mod stamp;
pub use stamp::{NIGHTLY_STAMP_LEN, nightly_stamp, parse_nightly_stamp};

mod workload;
pub use workload::RunningWorkload;

mod attempt;
pub use attempt::BuildAttemptResult;

/// Unique application name; join key between images and containers.
pub type AppName = String;

/// Host-side TCP port.
pub type Port = u16;
