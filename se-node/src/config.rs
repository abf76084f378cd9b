use std::time::Duration;
use serde::{ Deserialize };
use zigbee::{ NodeId, Eui64, zcl::AttributeValue };
use smart_energy::{ config::SmartEnergyConfig, host::ClusterSide };

pub const DEFAULT_TICK_MS: u64 = 250;

#[derive(Deserialize, Debug)]
pub struct Config {
	pub debug: Option<u8>,
	/// Resolution of the scheduler.
	pub tick_ms: Option<u64>,
	pub node: NodeConfig,
	#[serde(default)]
	pub attributes: Vec<AttributeSeed>,
	#[serde(default)]
	pub address_table: Vec<AddressEntry>,
	/// Simulated remote nodes answering discovery and attribute reads.
	#[serde(default)]
	pub peers: Vec<PeerConfig>,
	#[serde(default)]
	pub smart_energy: SmartEnergyConfig
}

impl Config {
	pub fn log_level(&self) -> &'static str {
		match self.debug {
			None | Some(0) => "info",
			Some(1) => "debug",
			_ => "trace"
		}
	}

	pub fn tick(&self) -> Duration {
		Duration::from_millis(self.tick_ms.unwrap_or(DEFAULT_TICK_MS))
	}
}

#[derive(Deserialize, Debug, Clone)]
pub struct EndpointConfig {
	pub endpoint: u8,
	#[serde(default)]
	pub network_index: u8,
	#[serde(default)]
	pub client_clusters: Vec<u16>,
	#[serde(default)]
	pub server_clusters: Vec<u16>
}

impl EndpointConfig {
	pub fn clusters(&self, side: ClusterSide) -> &[u16] {
		match side {
			ClusterSide::Client => &self.client_clusters,
			ClusterSide::Server => &self.server_clusters
		}
	}
}

#[derive(Deserialize, Debug, Clone)]
pub struct NodeConfig {
	pub node_id: NodeId,
	#[serde(with = "hex::serde")]
	pub eui64: Eui64,
	#[serde(default = "default_true")]
	pub smart_energy_security: bool,
	#[serde(default = "default_true")]
	pub full_smart_energy_security: bool,
	#[serde(default)]
	pub link_key_authorized: bool,
	pub endpoints: Vec<EndpointConfig>
}

#[derive(Deserialize, Debug, Clone)]
pub struct AttributeSeed {
	pub endpoint: u8,
	pub cluster: u16,
	pub attribute: u16,
	pub side: ClusterSide,
	pub value: AttributeValue
}

#[derive(Deserialize, Debug, Clone)]
pub struct AddressEntry {
	pub node_id: NodeId,
	#[serde(with = "hex::serde")]
	pub eui64: Eui64
}

#[derive(Deserialize, Debug, Clone)]
pub struct PeerConfig {
	pub node_id: NodeId,
	#[serde(with = "hex::serde")]
	pub eui64: Eui64,
	pub endpoints: Vec<EndpointConfig>,
	/// Time status bits reported by the peer's time server, none if it has no clock.
	pub time_status: Option<u8>
}

fn default_true() -> bool {
	true
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_sample_config() {
		let c: Config = serde_json::from_str(include_str!("../config.json")).unwrap();

		assert_eq!(c.node.eui64.len(), 8);
		assert!(!c.node.endpoints.is_empty());
		assert!(c.peers.iter().any(|p| p.node_id == 0));
		assert_eq!(c.tick(), Duration::from_millis(250));
	}

	#[test]
	fn attribute_seed_value_is_tagged() {
		let s: AttributeSeed = serde_json::from_str(r#"{
			"endpoint": 1, "cluster": 1793, "attribute": 3, "side": "client",
			"value": { "type": "uint16", "val": 15 }
		}"#).unwrap();

		assert_eq!(s.side, ClusterSide::Client);
		assert_eq!(s.value, AttributeValue::Uint16 { val: 15 });
	}
}
