pub mod config_service;
pub mod csv_ingestor;
pub mod paths;
pub mod secret_service;

pub use crate::config_service::ConfigService;
pub use crate::csv_ingestor::CsvIngestorImpl;
pub use crate::paths::ParleyPaths;
pub use crate::secret_service::SecretServiceImpl;
