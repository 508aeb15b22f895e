//! Application configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Config file name inside the data directory
const CONFIG_FILE: &str = "waypoint.json";

/// Default data directory under the platform data dir
pub fn default_data_dir() -> Result<PathBuf> {
	dirs::data_dir()
		.map(|dir| dir.join("waypoint"))
		.ok_or_else(|| anyhow!("Could not determine platform data directory"))
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
	/// Config schema version
	pub version: u32,

	/// Data directory path
	pub data_dir: PathBuf,

	/// Edit log database file name, relative to the data directory
	pub database_file: String,

	/// Attribute field that carries a record's object id
	pub object_id_field: String,

	/// Byte budget for the queued edit log; 0 disables the cap
	pub max_queue_bytes: u64,
}

impl EditorConfig {
	/// Load configuration from a data directory, creating defaults if absent
	pub fn load_or_create(data_dir: &PathBuf) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE);

		if config_path.exists() {
			info!("Loading config from {:?}", config_path);
			let json = fs::read_to_string(&config_path)?;
			let config: EditorConfig = serde_json::from_str(&json)?;

			if config.version != Self::schema_version() {
				return Err(anyhow!(
					"Unsupported config version {} (expected {})",
					config.version,
					Self::schema_version()
				));
			}

			Ok(config)
		} else {
			warn!("No config found, creating default at {:?}", config_path);
			let config = Self::default_with_dir(data_dir.clone());
			config.save()?;
			Ok(config)
		}
	}

	/// Create default configuration with a specific data directory
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::schema_version(),
			data_dir,
			database_file: "edits.db".to_string(),
			object_id_field: crate::domain::DEFAULT_OBJECT_ID_FIELD.to_string(),
			max_queue_bytes: 0,
		}
	}

	/// Save configuration to disk
	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE);
		let json = serde_json::to_string_pretty(self)?;
		fs::write(&config_path, json)?;
		info!("Saved config to {:?}", config_path);
		Ok(())
	}

	/// Full path of the edit log database
	pub fn database_path(&self) -> PathBuf {
		self.data_dir.join(&self.database_file)
	}

	/// Ensure required directories exist
	pub fn ensure_directories(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;
		Ok(())
	}

	fn schema_version() -> u32 {
		1
	}
}

impl Default for EditorConfig {
	fn default() -> Self {
		let data_dir = default_data_dir().unwrap_or_else(|_| PathBuf::from("."));
		Self::default_with_dir(data_dir)
	}
}
