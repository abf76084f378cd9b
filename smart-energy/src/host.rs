//services consumed from the surrounding stack

use serde::{ Serialize, Deserialize };
use thiserror::Error;
use zigbee::{ NodeId, Eui64, zcl::{ AttributeValue, ZclFrame }, zdp::ZdoBindReq, drlc::EventStatus };
use crate::drlc::event::LoadControlEvent;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClusterSide {
	Client,
	Server
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApsFrame {
	pub profile_id: u16,
	pub cluster_id: u16,
	pub source_endpoint: u8,
	pub destination_endpoint: u8
}

impl ApsFrame {
	pub fn smart_energy(cluster_id: u16, source_endpoint: u8, destination_endpoint: u8) -> Self {
		Self {
			profile_id: zigbee::SE_PROFILE_ID,
			cluster_id,
			source_endpoint,
			destination_endpoint
		}
	}

	/// Header for an answer to a frame received with `self`.
	pub fn reply(&self) -> Self {
		Self {
			profile_id: self.profile_id,
			cluster_id: self.cluster_id,
			source_endpoint: self.destination_endpoint,
			destination_endpoint: self.source_endpoint
		}
	}
}

/// Addressing of a received zcl command, what replies are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingCommand {
	pub source: NodeId,
	pub aps: ApsFrame,
	pub sequence: u8,
	pub command_id: u8,
	pub direction: u8
}

impl IncomingCommand {
	pub fn from_frame(source: NodeId, aps: ApsFrame, frame: &ZclFrame) -> Self {
		Self {
			source,
			aps,
			sequence: frame.transaction_sequence_number,
			command_id: frame.command_id,
			direction: frame.control.direction
		}
	}
}

/// Resumable work the host scheduler calls back into.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ScheduledEvent {
	ClusterTick {
		endpoint: u8,
		cluster: u16,
		side: ClusterSide
	},
	Registration,
	Keepalive
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StackStatus {
	#[error("invalid call")]
	InvalidCall,
	#[error("security configuration invalid")]
	SecurityConfigurationInvalid,
	#[error("fatal error")]
	Fatal,
	#[error("network busy")]
	NetworkBusy,
	#[error("no buffers")]
	NoBuffers,
	#[error("delivery failed")]
	DeliveryFailed,
	#[error("not found")]
	NotFound
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkKey {
	pub authorized: bool
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
	pub endpoint: u8,
	pub network_index: u8
}

/// Framework primitives the DRLC and ESI code runs on.
pub trait Host {
	/// Seconds since 2000-01-01 00:00 UTC.
	fn current_time(&self) -> u32;

	fn random(&mut self) -> u16;

	fn read_attribute(&self, endpoint: u8, cluster: u16, attribute: u16, side: ClusterSide) -> Option<AttributeValue>;

	fn write_attribute(&mut self, endpoint: u8, cluster: u16, attribute: u16, side: ClusterSide, value: AttributeValue) -> Result<(), StackStatus>;

	fn next_sequence(&mut self) -> u8;

	/// Sends an already encoded zcl frame.
	fn send_unicast(&mut self, destination: NodeId, aps: &ApsFrame, payload: &[u8]) -> Result<(), StackStatus>;

	/// Arms `event` to fire after `delay_ms`, replacing a pending one.
	fn schedule(&mut self, event: ScheduledEvent, delay_ms: u32);

	fn cancel(&mut self, event: ScheduledEvent);

	fn find_endpoint_index(&self, endpoint: u8, cluster: u16, side: ClusterSide) -> Option<usize>;

	fn current_network(&self) -> u8 {
		0
	}

	fn lookup_eui64(&self, node_id: NodeId) -> Option<Eui64>;

	fn lookup_node_id(&self, eui64: &Eui64) -> Option<NodeId>;

	/// Application hook run before a report event status is sent, `false` keeps it local.
	fn drlc_event_action(&mut self, _event: &LoadControlEvent, _status: EventStatus, _sequence: u8) -> bool {
		true
	}
}

/// Network and security services used by registration and the trust center keepalive.
pub trait StackHost: Host {
	fn node_id(&self) -> NodeId;

	fn eui64(&self) -> Eui64;

	fn is_smart_energy_security(&self) -> bool;

	/// Certificate and crypto libraries are present.
	fn full_smart_energy_security(&self) -> bool;

	fn trust_center_link_key(&self) -> Result<LinkKey, StackStatus>;

	fn primary_endpoint(&self) -> Option<u8>;

	fn endpoint_count(&self) -> usize;

	fn endpoint_info(&self, index: usize) -> Option<EndpointInfo>;

	fn contains_client(&self, endpoint: u8, cluster: u16) -> bool;

	/// Server cluster match descriptor request, results come back through service discovery.
	fn find_devices(&mut self, target: NodeId, profile: u16, cluster: u16) -> Result<(), StackStatus>;

	fn find_ieee_address(&mut self, node_id: NodeId) -> Result<(), StackStatus>;

	fn initiate_key_establishment(&mut self, node_id: NodeId, endpoint: u8) -> Result<(), StackStatus>;

	fn initiate_partner_link_key_exchange(&mut self, node_id: NodeId, endpoint: u8) -> Result<(), StackStatus>;

	/// `false` when the address table is full.
	fn add_address_table_entry(&mut self, eui64: &Eui64, node_id: NodeId) -> bool;

	fn bind_request(&mut self, target: NodeId, request: &ZdoBindReq) -> Result<(), StackStatus>;

	fn set_time(&mut self, time: u32);

	fn stop_writing_stack_tokens(&mut self) -> Result<(), StackStatus>;

	fn start_writing_stack_tokens(&mut self);

	fn find_and_rejoin_network(&mut self) -> Result<(), StackStatus>;

	fn reboot(&mut self);

	fn registration_complete(&mut self, _success: bool) {}
}
