use serde::{ Serialize, Deserialize };

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RegistrationConfig {
	#[serde(default = "default_true")]
	pub allowed: bool,
	/// Rediscovery of ESIs after a successful registration.
	#[serde(default)]
	pub discovery_period_ms: Option<u32>,
	#[serde(default = "default_error_limit")]
	pub error_limit: u8
}

impl Default for RegistrationConfig {
	fn default() -> Self {
		Self {
			allowed: true,
			discovery_period_ms: None,
			error_limit: default_error_limit()
		}
	}
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct KeepaliveConfig {
	#[serde(default = "default_keepalive_interval")]
	pub interval_ms: u32,
	#[serde(default = "default_failure_limit")]
	pub failure_limit: u8
}

impl Default for KeepaliveConfig {
	fn default() -> Self {
		Self {
			interval_ms: default_keepalive_interval(),
			failure_limit: default_failure_limit()
		}
	}
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SmartEnergyConfig {
	#[serde(default = "default_device_class")]
	pub device_class: u16,
	#[serde(default)]
	pub registration: RegistrationConfig,
	#[serde(default)]
	pub keepalive: KeepaliveConfig
}

impl Default for SmartEnergyConfig {
	fn default() -> Self {
		Self {
			device_class: default_device_class(),
			registration: RegistrationConfig::default(),
			keepalive: KeepaliveConfig::default()
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_error_limit() -> u8 {
	3
}

fn default_keepalive_interval() -> u32 {
	20 * 60 * 1000
}

fn default_failure_limit() -> u8 {
	3
}

fn default_device_class() -> u16 {
	crate::drlc::DEFAULT_DEVICE_CLASS
}
