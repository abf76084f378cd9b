//simulated zigbee stack behind the smart energy host traits

use std::{ collections::{ HashMap, VecDeque }, time::{ Duration, Instant } };
use chrono::Utc;
use log::{ info, debug, warn, error };
use rand::Rng;
use zigbee::{
	NodeId, Eui64,
	cluster,
	TRUST_CENTER_NODE_ID,
	zcl::{ ZclFrame, Command, GenericCommand, ReadAttributeRecord, AttributeValue, attribute, status, DIRECTION_SERVER_TO_CLIENT },
	zdp::ZdoBindReq,
	drlc::EventStatus
};
use smart_energy::{
	drlc::event::LoadControlEvent,
	host::{ Host, StackHost, ApsFrame, ClusterSide, ScheduledEvent, StackStatus, LinkKey, EndpointInfo },
	registration::{ DiscoveryResult, DiscoveryStatus, DiscoveryPayload, KeyEstablishmentNotify }
};
use crate::config::{ Config, NodeConfig, PeerConfig };

/// 2000-01-01 00:00 UTC as a unix timestamp.
pub const ZIGBEE_EPOCH: i64 = 946_684_800;

const KEY_ESTABLISHMENT_SUITE_CBKE: u16 = 0x0001;

/// Stack callbacks waiting to be delivered to the device.
#[derive(Debug)]
pub enum Pending {
	Discovery(DiscoveryResult),
	KeyEstablishment(KeyEstablishmentNotify),
	PartnerLinkKey(bool),
	Zcl {
		source: NodeId,
		aps: ApsFrame,
		payload: Vec<u8>
	}
}

pub struct SimHost {
	node: NodeConfig,
	peers: Vec<PeerConfig>,
	time_offset: i64,
	attributes: HashMap<(u8, u16, u16, ClusterSide), AttributeValue>,
	addresses: Vec<(NodeId, Eui64)>,
	sequence: u8,
	deadlines: HashMap<ScheduledEvent, Instant>,
	pending: VecDeque<Pending>,
	link_key_authorized: bool,
	writing_tokens: bool
}

impl SimHost {
	pub fn new(config: &Config) -> Self {
		let attributes = config.attributes.iter()
			.map(|a| ((a.endpoint, a.cluster, a.attribute, a.side), a.value.clone()))
			.collect();

		Self {
			node: config.node.clone(),
			peers: config.peers.clone(),
			time_offset: 0,
			attributes,
			addresses: config.address_table.iter().map(|a| (a.node_id, a.eui64)).collect(),
			sequence: rand::thread_rng().gen(),
			deadlines: HashMap::new(),
			pending: VecDeque::new(),
			link_key_authorized: config.node.link_key_authorized,
			writing_tokens: true
		}
	}

	fn unix_now() -> i64 {
		Utc::now().timestamp()
	}

	/// Removes and returns every event whose delay has run out.
	pub fn take_due(&mut self) -> Vec<ScheduledEvent> {
		let now = Instant::now();
		let due: Vec<ScheduledEvent> = self.deadlines.iter()
			.filter(|(_, at)| **at <= now)
			.map(|(e, _)| *e)
			.collect();

		for e in &due {
			self.deadlines.remove(e);
		}

		due
	}

	pub fn take_pending(&mut self) -> Option<Pending> {
		self.pending.pop_front()
	}

	/// Queues a frame as if `source` had sent it to this node.
	pub fn inject(&mut self, source: NodeId, aps: ApsFrame, payload: Vec<u8>) {
		self.pending.push_back(Pending::Zcl { source, aps, payload });
	}

	pub fn addresses(&self) -> &[(NodeId, Eui64)] {
		&self.addresses
	}

	fn peer(&self, node_id: NodeId) -> Option<&PeerConfig> {
		self.peers.iter().find(|p| p.node_id == node_id)
	}

	fn serving_endpoints(peer: &PeerConfig, cluster: u16) -> Vec<u8> {
		peer.endpoints.iter()
			.filter(|e| e.server_clusters.contains(&cluster))
			.map(|e| e.endpoint)
			.collect()
	}

	//read attributes answered by a simulated peer
	fn answer_read(&self, peer: &PeerConfig, cluster_id: u16, identifiers: &[u16]) -> Option<Vec<ReadAttributeRecord>> {
		let value = |identifier: u16| -> Option<AttributeValue> {
			match (cluster_id, identifier) {
				(cluster::TIME, attribute::TIME) => peer.time_status.map(|_| AttributeValue::UTC { val: self.current_time() }),
				(cluster::TIME, attribute::TIME_STATUS) => peer.time_status.map(|s| AttributeValue::Map8 { val: s }),
				(cluster::KEY_ESTABLISHMENT, attribute::KEY_ESTABLISHMENT_SUITE) => Some(AttributeValue::Map16 { val: KEY_ESTABLISHMENT_SUITE_CBKE }),
				_ => None
			}
		};

		if cluster_id != cluster::TIME && cluster_id != cluster::KEY_ESTABLISHMENT {
			return None;
		}

		Some(identifiers.iter().map(|identifier| match value(*identifier) {
			Some(v) => ReadAttributeRecord { identifier: *identifier, status: status::SUCCESS, data: Some(v) },
			None => ReadAttributeRecord { identifier: *identifier, status: status::UNSUPPORTED_ATTRIBUTE, data: None }
		}).collect())
	}

	fn simulate_peer(&mut self, destination: NodeId, aps: &ApsFrame, frame: &ZclFrame) {
		let identifiers = match &frame.command {
			Command::Generic(GenericCommand::ReadAttributes { identifiers }) => identifiers,
			_ => return
		};

		let values = match self.peer(destination).and_then(|p| self.answer_read(p, aps.cluster_id, identifiers)) {
			Some(v) => v,
			None => return
		};

		let response = ZclFrame::global(DIRECTION_SERVER_TO_CLIENT, frame.transaction_sequence_number, GenericCommand::ReadAttributesResponse { values });

		match response.to_bytes() {
			Ok(payload) => self.inject(destination, aps.reply(), payload),
			Err(e) => error!("could not encode simulated response: {}", e)
		}
	}
}

impl Host for SimHost {
	fn current_time(&self) -> u32 {
		(Self::unix_now() - ZIGBEE_EPOCH + self.time_offset) as u32
	}

	fn random(&mut self) -> u16 {
		rand::thread_rng().gen()
	}

	fn read_attribute(&self, endpoint: u8, cluster: u16, attribute: u16, side: ClusterSide) -> Option<AttributeValue> {
		self.attributes.get(&(endpoint, cluster, attribute, side)).cloned()
	}

	fn write_attribute(&mut self, endpoint: u8, cluster: u16, attribute: u16, side: ClusterSide, value: AttributeValue) -> Result<(), StackStatus> {
		if self.find_endpoint_index(endpoint, cluster, side).is_none() {
			return Err(StackStatus::InvalidCall);
		}

		debug!("attribute ep {} cluster 0x{:04x} {:?} 0x{:04x} = {:?}", endpoint, cluster, side, attribute, value);
		self.attributes.insert((endpoint, cluster, attribute, side), value);
		Ok(())
	}

	fn next_sequence(&mut self) -> u8 {
		self.sequence = self.sequence.wrapping_add(1);
		self.sequence
	}

	fn send_unicast(&mut self, destination: NodeId, aps: &ApsFrame, payload: &[u8]) -> Result<(), StackStatus> {
		if destination != TRUST_CENTER_NODE_ID && self.peer(destination).is_none() {
			warn!("no route to node 0x{:04x}", destination);
			return Err(StackStatus::DeliveryFailed);
		}

		info!("tx 0x{:04x} ep {}->{} cluster 0x{:04x}: {}", destination, aps.source_endpoint, aps.destination_endpoint,
			aps.cluster_id, hex::encode(payload));

		match ZclFrame::from_buf(payload, aps.cluster_id) {
			Ok(frame) => {
				if let Ok(json) = frame.command.to_json() {
					info!("tx 0x{:04x} seq {}: {}", destination, frame.transaction_sequence_number, json);
				}

				self.simulate_peer(destination, aps, &frame);
			},
			Err(e) => warn!("sent undecodable frame: {}", e)
		}

		Ok(())
	}

	fn schedule(&mut self, event: ScheduledEvent, delay_ms: u32) {
		debug!("schedule {:?} in {} ms", event, delay_ms);
		self.deadlines.insert(event, Instant::now() + Duration::from_millis(delay_ms as u64));
	}

	fn cancel(&mut self, event: ScheduledEvent) {
		self.deadlines.remove(&event);
	}

	fn find_endpoint_index(&self, endpoint: u8, cluster: u16, side: ClusterSide) -> Option<usize> {
		self.node.endpoints.iter()
			.filter(|e| e.clusters(side).contains(&cluster))
			.position(|e| e.endpoint == endpoint)
	}

	fn lookup_eui64(&self, node_id: NodeId) -> Option<Eui64> {
		self.addresses.iter().find(|(n, _)| *n == node_id).map(|(_, e)| *e)
	}

	fn lookup_node_id(&self, eui64: &Eui64) -> Option<NodeId> {
		self.addresses.iter().find(|(_, e)| e == eui64).map(|(n, _)| *n)
	}

	fn drlc_event_action(&mut self, event: &LoadControlEvent, status: EventStatus, sequence: u8) -> bool {
		info!("drlc event 0x{:08x} on endpoint {}: {:?} (seq {})", event.event_id, event.destination_endpoint, status, sequence);
		true
	}
}

impl StackHost for SimHost {
	fn node_id(&self) -> NodeId {
		self.node.node_id
	}

	fn eui64(&self) -> Eui64 {
		self.node.eui64
	}

	fn is_smart_energy_security(&self) -> bool {
		self.node.smart_energy_security
	}

	fn full_smart_energy_security(&self) -> bool {
		self.node.full_smart_energy_security
	}

	fn trust_center_link_key(&self) -> Result<LinkKey, StackStatus> {
		Ok(LinkKey { authorized: self.link_key_authorized })
	}

	fn primary_endpoint(&self) -> Option<u8> {
		self.node.endpoints.first().map(|e| e.endpoint)
	}

	fn endpoint_count(&self) -> usize {
		self.node.endpoints.len()
	}

	fn endpoint_info(&self, index: usize) -> Option<EndpointInfo> {
		self.node.endpoints.get(index).map(|e| EndpointInfo { endpoint: e.endpoint, network_index: e.network_index })
	}

	fn contains_client(&self, endpoint: u8, cluster: u16) -> bool {
		self.node.endpoints.iter().any(|e| e.endpoint == endpoint && e.client_clusters.contains(&cluster))
	}

	fn find_devices(&mut self, target: NodeId, profile: u16, cluster: u16) -> Result<(), StackStatus> {
		info!("match descriptor request to 0x{:04x} profile 0x{:04x} cluster 0x{:04x}", target, profile, cluster);

		let broadcast = target >= 0xfff8;
		let mut answered = false;

		for peer in self.peers.iter().filter(|p| broadcast || p.node_id == target) {
			let endpoints = Self::serving_endpoints(peer, cluster);

			if endpoints.is_empty() {
				continue;
			}

			answered = true;
			self.pending.push_back(Pending::Discovery(DiscoveryResult {
				status: if broadcast { DiscoveryStatus::BroadcastResponse } else { DiscoveryStatus::UnicastResponse },
				match_address: peer.node_id,
				payload: DiscoveryPayload::Endpoints(endpoints)
			}));
		}

		if broadcast {
			self.pending.push_back(Pending::Discovery(DiscoveryResult {
				status: DiscoveryStatus::BroadcastComplete,
				match_address: target,
				payload: DiscoveryPayload::None
			}));
		} else if !answered {
			self.pending.push_back(Pending::Discovery(DiscoveryResult {
				status: DiscoveryStatus::UnicastTimeout,
				match_address: target,
				payload: DiscoveryPayload::None
			}));
		}

		Ok(())
	}

	fn find_ieee_address(&mut self, node_id: NodeId) -> Result<(), StackStatus> {
		let result = match self.peer(node_id) {
			Some(p) => DiscoveryResult {
				status: DiscoveryStatus::UnicastResponse,
				match_address: node_id,
				payload: DiscoveryPayload::IeeeAddress(p.eui64)
			},
			None => DiscoveryResult {
				status: DiscoveryStatus::UnicastTimeout,
				match_address: node_id,
				payload: DiscoveryPayload::None
			}
		};

		self.pending.push_back(Pending::Discovery(result));
		Ok(())
	}

	fn initiate_key_establishment(&mut self, node_id: NodeId, endpoint: u8) -> Result<(), StackStatus> {
		info!("key establishment with node 0x{:04x} endpoint {}", node_id, endpoint);

		self.link_key_authorized = true;
		self.pending.push_back(Pending::KeyEstablishment(KeyEstablishmentNotify::InProgress));
		self.pending.push_back(Pending::KeyEstablishment(KeyEstablishmentNotify::LinkKeyEstablished));
		Ok(())
	}

	fn initiate_partner_link_key_exchange(&mut self, node_id: NodeId, endpoint: u8) -> Result<(), StackStatus> {
		info!("partner link key request to node 0x{:04x} endpoint {}", node_id, endpoint);

		let known = self.peer(node_id).is_some();
		self.pending.push_back(Pending::PartnerLinkKey(known));
		Ok(())
	}

	fn add_address_table_entry(&mut self, eui64: &Eui64, node_id: NodeId) -> bool {
		self.addresses.retain(|(n, e)| *n != node_id && e != eui64);
		self.addresses.push((node_id, *eui64));
		true
	}

	fn bind_request(&mut self, target: NodeId, request: &ZdoBindReq) -> Result<(), StackStatus> {
		match serde_json::to_string(request) {
			Ok(json) => info!("bind request to 0x{:04x}: {}", target, json),
			Err(_) => info!("bind request to 0x{:04x} for cluster 0x{:04x}", target, request.cluster_id)
		}

		Ok(())
	}

	fn set_time(&mut self, time: u32) {
		self.time_offset = time as i64 - (Self::unix_now() - ZIGBEE_EPOCH);
		info!("clock set to 0x{:08x}, offset {} s", time, self.time_offset);
	}

	fn stop_writing_stack_tokens(&mut self) -> Result<(), StackStatus> {
		self.writing_tokens = false;
		debug!("stack token writing suspended");
		Ok(())
	}

	fn start_writing_stack_tokens(&mut self) {
		self.writing_tokens = true;
		debug!("stack token writing resumed");
	}

	fn find_and_rejoin_network(&mut self) -> Result<(), StackStatus> {
		info!("searching for the trust center and rejoining");
		Ok(())
	}

	fn reboot(&mut self) {
		warn!("reboot requested, forgetting link key");
		self.link_key_authorized = false;
	}

	fn registration_complete(&mut self, success: bool) {
		info!("registration {}", if success { "succeeded" } else { "failed" });
	}
}
