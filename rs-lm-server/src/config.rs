use std::net::SocketAddr;
use std::path::PathBuf;

use rs_lm_core::io::normalize_folder;

pub const ENV_BIND: &str = "RS_LM_BIND";
pub const ENV_DATA_DIR: &str = "RS_LM_DATA_DIR";

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Server settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
	/// Address the HTTP server listens on.
	pub bind: SocketAddr,
	/// Folder holding the `.arpa` models (and their `.bin` snapshots).
	pub data_dir: PathBuf,
}

impl ServerConfig {
	/// Builds the configuration from the process environment.
	///
	/// # Errors
	/// - `RS_LM_BIND` is set but is not a socket address.
	pub fn from_env() -> Result<Self, String> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Builds the configuration from any key lookup, unset keys use the defaults.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
	where
		F: Fn(&str) -> Option<String>,
	{
		let bind = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_owned());
		let bind = bind
			.parse()
			.map_err(|e| format!("{ENV_BIND}={bind:?} is not a socket address: {e}"))?;

		let data_dir = lookup(ENV_DATA_DIR).unwrap_or_else(|| DEFAULT_DATA_DIR.to_owned());
		let data_dir = normalize_folder(data_dir.trim());

		Ok(Self { bind, data_dir })
	}

	/// Path of the ARPA file of a model, `None` for names that would leave the data folder.
	pub fn model_path(&self, name: &str) -> Option<PathBuf> {
		let valid = !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != "..";
		valid.then(|| self.data_dir.join(format!("{name}.arpa")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn falls_back_to_defaults() {
		let config = ServerConfig::from_lookup(|_| None).unwrap();
		assert_eq!(config.bind, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
		assert_eq!(config.data_dir, PathBuf::from("./data"));
	}

	#[test]
	fn reads_overrides() {
		let config = ServerConfig::from_lookup(|key| match key {
			ENV_BIND => Some("0.0.0.0:8080".to_owned()),
			ENV_DATA_DIR => Some("/srv/models".to_owned()),
			_ => None,
		})
		.unwrap();
		assert_eq!(config.bind.port(), 8080);
		assert_eq!(config.data_dir, PathBuf::from("/srv/models"));
	}

	#[test]
	fn rejects_invalid_bind() {
		let err = ServerConfig::from_lookup(|key| (key == ENV_BIND).then(|| "localhost".to_owned())).unwrap_err();
		assert!(err.contains(ENV_BIND));
	}

	#[test]
	fn model_names_stay_in_data_dir() {
		let config = ServerConfig::from_lookup(|_| None).unwrap();
		assert_eq!(config.model_path("wiki"), Some(PathBuf::from("./data/wiki.arpa")));
		assert_eq!(config.model_path("../etc/passwd"), None);
		assert_eq!(config.model_path(".."), None);
		assert_eq!(config.model_path(""), None);
	}
}
