#![allow(dead_code)]

use std::collections::HashMap;
use smart_energy::{
	host::{ Host, StackHost, ApsFrame, ClusterSide, ScheduledEvent, StackStatus, LinkKey, EndpointInfo, IncomingCommand },
	drlc::event::LoadControlEvent
};
use zigbee::{
	NodeId, Eui64,
	cluster,
	zcl::{ ZclFrame, Command, AttributeValue, attribute, DIRECTION_SERVER_TO_CLIENT },
	zdp::ZdoBindReq,
	drlc::{ DrlcServerCommand, LoadControlEventPayload, EventStatus, CMD_LOAD_CONTROL_EVENT }
};

pub const ESI_NODE: NodeId = 0x1234;
pub const ESI_EUI64: Eui64 = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
pub const ESI_ENDPOINT: u8 = 1;
pub const LOCAL_ENDPOINT: u8 = 1;

#[derive(Debug, Clone)]
pub struct Sent {
	pub destination: NodeId,
	pub aps: ApsFrame,
	pub payload: Vec<u8>
}

impl Sent {
	pub fn frame(&self) -> ZclFrame {
		ZclFrame::from_buf(&self.payload, self.aps.cluster_id).unwrap()
	}
}

/// Records everything the library asks of the stack.
pub struct MockHost {
	pub time: u32,
	pub random: u16,
	pub sequence: u8,
	pub attributes: HashMap<(u8, u16, u16, ClusterSide), AttributeValue>,
	pub client_endpoints: Vec<u8>,
	pub server_endpoints: Vec<u8>,
	pub addresses: Vec<(NodeId, Eui64)>,
	pub sent: Vec<Sent>,
	pub scheduled: HashMap<ScheduledEvent, u32>,
	pub event_actions: Vec<(u32, EventStatus)>,
	pub allow_event_action: bool,
	pub fail_send: bool,

	pub node_id: NodeId,
	pub eui64: Eui64,
	pub se_security: bool,
	pub full_security: bool,
	pub link_key: Result<LinkKey, StackStatus>,
	pub primary_endpoint: Option<u8>,
	pub endpoints: Vec<EndpointInfo>,
	pub clients: Vec<(u8, u16)>,
	pub find_devices: Vec<(NodeId, u16, u16)>,
	pub ieee_requests: Vec<NodeId>,
	pub key_establishments: Vec<(NodeId, u8)>,
	pub partner_link_keys: Vec<(NodeId, u8)>,
	pub binds: Vec<(NodeId, ZdoBindReq)>,
	pub fail_bind: bool,
	pub time_set: Option<u32>,
	pub writing_tokens: bool,
	pub fail_rejoin: bool,
	pub rejoins: usize,
	pub reboots: usize,
	pub completions: Vec<bool>
}

impl MockHost {
	pub fn new() -> Self {
		let mut h = Self {
			time: 1_000_000,
			random: 0,
			sequence: 0x40,
			attributes: HashMap::new(),
			client_endpoints: vec![LOCAL_ENDPOINT],
			server_endpoints: vec![LOCAL_ENDPOINT],
			addresses: vec![(ESI_NODE, ESI_EUI64)],
			sent: vec![],
			scheduled: HashMap::new(),
			event_actions: vec![],
			allow_event_action: true,
			fail_send: false,

			node_id: 0x4321,
			eui64: [0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7],
			se_security: true,
			full_security: true,
			link_key: Ok(LinkKey { authorized: false }),
			primary_endpoint: Some(LOCAL_ENDPOINT),
			endpoints: vec![EndpointInfo { endpoint: LOCAL_ENDPOINT, network_index: 0 }],
			clients: vec![(LOCAL_ENDPOINT, cluster::DEMAND_RESPONSE_LOAD_CONTROL), (LOCAL_ENDPOINT, cluster::PRICE)],
			find_devices: vec![],
			ieee_requests: vec![],
			key_establishments: vec![],
			partner_link_keys: vec![],
			binds: vec![],
			fail_bind: false,
			time_set: None,
			writing_tokens: true,
			fail_rejoin: false,
			rejoins: 0,
			reboots: 0,
			completions: vec![]
		};

		h.set_drlc(attribute::UTILITY_ENROLLMENT_GROUP, AttributeValue::Uint8 { val: 0 });
		h.set_drlc(attribute::START_RANDOMIZE_MINUTES, AttributeValue::Uint8 { val: 0 });
		h.set_drlc(attribute::DURATION_RANDOMIZE_MINUTES, AttributeValue::Uint8 { val: 0 });
		h.set_drlc(attribute::DEVICE_CLASS_VALUE, AttributeValue::Uint16 { val: 0x0fff });
		h
	}

	pub fn set_drlc(&mut self, id: u16, value: AttributeValue) {
		self.attributes.insert((LOCAL_ENDPOINT, cluster::DEMAND_RESPONSE_LOAD_CONTROL, id, ClusterSide::Client), value);
	}

	pub fn take_sent(&mut self) -> Vec<Sent> {
		std::mem::take(&mut self.sent)
	}

	pub fn delay_of(&self, event: ScheduledEvent) -> Option<u32> {
		self.scheduled.get(&event).copied()
	}
}

impl Host for MockHost {
	fn current_time(&self) -> u32 {
		self.time
	}

	fn random(&mut self) -> u16 {
		self.random
	}

	fn read_attribute(&self, endpoint: u8, cluster: u16, attribute: u16, side: ClusterSide) -> Option<AttributeValue> {
		self.attributes.get(&(endpoint, cluster, attribute, side)).cloned()
	}

	fn write_attribute(&mut self, endpoint: u8, cluster: u16, attribute: u16, side: ClusterSide, value: AttributeValue) -> Result<(), StackStatus> {
		self.attributes.insert((endpoint, cluster, attribute, side), value);
		Ok(())
	}

	fn next_sequence(&mut self) -> u8 {
		self.sequence = self.sequence.wrapping_add(1);
		self.sequence
	}

	fn send_unicast(&mut self, destination: NodeId, aps: &ApsFrame, payload: &[u8]) -> Result<(), StackStatus> {
		if self.fail_send {
			return Err(StackStatus::NoBuffers);
		}

		self.sent.push(Sent { destination, aps: *aps, payload: payload.to_vec() });
		Ok(())
	}

	fn schedule(&mut self, event: ScheduledEvent, delay_ms: u32) {
		self.scheduled.insert(event, delay_ms);
	}

	fn cancel(&mut self, event: ScheduledEvent) {
		self.scheduled.remove(&event);
	}

	fn find_endpoint_index(&self, endpoint: u8, cluster: u16, side: ClusterSide) -> Option<usize> {
		if cluster != cluster::DEMAND_RESPONSE_LOAD_CONTROL {
			return None;
		}

		match side {
			ClusterSide::Client => self.client_endpoints.iter().position(|e| *e == endpoint),
			ClusterSide::Server => self.server_endpoints.iter().position(|e| *e == endpoint)
		}
	}

	fn lookup_eui64(&self, node_id: NodeId) -> Option<Eui64> {
		self.addresses.iter().find(|(n, _)| *n == node_id).map(|(_, e)| *e)
	}

	fn lookup_node_id(&self, eui64: &Eui64) -> Option<NodeId> {
		self.addresses.iter().find(|(_, e)| e == eui64).map(|(n, _)| *n)
	}

	fn drlc_event_action(&mut self, event: &LoadControlEvent, status: EventStatus, _sequence: u8) -> bool {
		self.event_actions.push((event.event_id, status));
		self.allow_event_action
	}
}

impl StackHost for MockHost {
	fn node_id(&self) -> NodeId {
		self.node_id
	}

	fn eui64(&self) -> Eui64 {
		self.eui64
	}

	fn is_smart_energy_security(&self) -> bool {
		self.se_security
	}

	fn full_smart_energy_security(&self) -> bool {
		self.full_security
	}

	fn trust_center_link_key(&self) -> Result<LinkKey, StackStatus> {
		self.link_key
	}

	fn primary_endpoint(&self) -> Option<u8> {
		self.primary_endpoint
	}

	fn endpoint_count(&self) -> usize {
		self.endpoints.len()
	}

	fn endpoint_info(&self, index: usize) -> Option<EndpointInfo> {
		self.endpoints.get(index).copied()
	}

	fn contains_client(&self, endpoint: u8, cluster: u16) -> bool {
		self.clients.contains(&(endpoint, cluster))
	}

	fn find_devices(&mut self, target: NodeId, profile: u16, cluster: u16) -> Result<(), StackStatus> {
		self.find_devices.push((target, profile, cluster));
		Ok(())
	}

	fn find_ieee_address(&mut self, node_id: NodeId) -> Result<(), StackStatus> {
		self.ieee_requests.push(node_id);
		Ok(())
	}

	fn initiate_key_establishment(&mut self, node_id: NodeId, endpoint: u8) -> Result<(), StackStatus> {
		self.key_establishments.push((node_id, endpoint));
		Ok(())
	}

	fn initiate_partner_link_key_exchange(&mut self, node_id: NodeId, endpoint: u8) -> Result<(), StackStatus> {
		self.partner_link_keys.push((node_id, endpoint));
		Ok(())
	}

	fn add_address_table_entry(&mut self, eui64: &Eui64, node_id: NodeId) -> bool {
		self.addresses.retain(|(n, _)| *n != node_id);
		self.addresses.push((node_id, *eui64));
		true
	}

	fn bind_request(&mut self, target: NodeId, request: &ZdoBindReq) -> Result<(), StackStatus> {
		if self.fail_bind {
			return Err(StackStatus::NetworkBusy);
		}

		self.binds.push((target, request.clone()));
		Ok(())
	}

	fn set_time(&mut self, time: u32) {
		self.time_set = Some(time);
	}

	fn stop_writing_stack_tokens(&mut self) -> Result<(), StackStatus> {
		self.writing_tokens = false;
		Ok(())
	}

	fn start_writing_stack_tokens(&mut self) {
		self.writing_tokens = true;
	}

	fn find_and_rejoin_network(&mut self) -> Result<(), StackStatus> {
		if self.fail_rejoin {
			return Err(StackStatus::InvalidCall);
		}

		self.rejoins += 1;
		Ok(())
	}

	fn reboot(&mut self) {
		self.reboots += 1;
	}

	fn registration_complete(&mut self, success: bool) {
		self.completions.push(success);
	}
}

pub fn payload(event_id: u32, start_time: u32, duration: u16) -> LoadControlEventPayload {
	LoadControlEventPayload {
		issuer_event_id: event_id,
		device_class: 0x0001,
		utility_enrollment_group: 0,
		start_time,
		duration_in_minutes: duration,
		criticality_level: 1,
		..Default::default()
	}
}

pub fn incoming(sequence: u8, command_id: u8) -> IncomingCommand {
	IncomingCommand {
		source: ESI_NODE,
		aps: ApsFrame::smart_energy(cluster::DEMAND_RESPONSE_LOAD_CONTROL, ESI_ENDPOINT, LOCAL_ENDPOINT),
		sequence,
		command_id,
		direction: DIRECTION_SERVER_TO_CLIENT
	}
}

/// Encoded load control event as an ESI would send it.
pub fn load_control_event_frame(sequence: u8, p: LoadControlEventPayload) -> Vec<u8> {
	ZclFrame::cluster_specific(DIRECTION_SERVER_TO_CLIENT, sequence, CMD_LOAD_CONTROL_EVENT,
		Command::DrlcServer(DrlcServerCommand::LoadControlEvent(p))).to_bytes().unwrap()
}

pub fn drlc_aps() -> ApsFrame {
	ApsFrame::smart_energy(cluster::DEMAND_RESPONSE_LOAD_CONTROL, ESI_ENDPOINT, LOCAL_ENDPOINT)
}
