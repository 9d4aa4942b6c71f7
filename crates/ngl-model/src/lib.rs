mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

mod descriptor;
pub use descriptor::WorkloadDescriptor;

mod config;
pub use config::{DEFAULT_LOG_ROOT, DEFAULT_VERSION, DeployConfig, MailConfig, MailSecurity};
