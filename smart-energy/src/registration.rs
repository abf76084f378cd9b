//smart energy registration

use log::{ info, debug, warn, error };
use serde::{ Serialize };
use zigbee::{
	NodeId, Eui64,
	cluster,
	SE_PROFILE_ID, TRUST_CENTER_NODE_ID, BROADCAST_RX_ON_WHEN_IDLE,
	zcl::{ ZclFrame, GenericCommand, ReadAttributeRecord, attribute, status, DIRECTION_CLIENT_TO_SERVER },
	zdp::{ ZdoBindReq, BindReqAddr }
};
use crate::{
	error::Error,
	esi::{ EsiTable, EsiEntry },
	config::RegistrationConfig,
	host::{ StackHost, ApsFrame, ScheduledEvent, StackStatus },
	outgoing::send_zcl
};

pub const DELAY_INITIAL_MS: u32 = 4000;
pub const DELAY_RETRY_MS: u32 = 32000;
pub const DELAY_BRIEF_MS: u32 = 8000;
pub const DELAY_RESUME_MS: u32 = 500;
pub const DELAY_TRANSITION_MS: u32 = 250;

pub const UNDEFINED_ENDPOINT: u8 = 0xff;

/// Client clusters bound to every discovered ESI.
pub const BINDING_CLUSTERS: [u16; 3] = [
	cluster::DEMAND_RESPONSE_LOAD_CONTROL,
	cluster::MESSAGING,
	cluster::PRICE
];

//time status bits
pub const TIME_MASTER: u8 = 0x01;
pub const TIME_SYNCHRONIZED: u8 = 0x02;
pub const TIME_SUPERSEDING: u8 = 0x08;

pub const TIME_INVALID: u32 = 0xffffffff;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
	Initial,
	DiscoverKeyEstablishmentCluster,
	PerformKeyEstablishment,
	DiscoverEnergyServiceInterfaces,
	DiscoverIeeeAddresses,
	PerformPartnerLinkKeyExchange,
	PerformBinding,
	DetermineAuthoritativeTimeSource,
	Complete,
	Failed
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSource {
	pub valid: bool,
	pub node_id: NodeId,
	pub time: u32,
	pub time_status: u8,
	pub last_set_time: u32,
	pub valid_until_time: u32
}

impl TimeSource {
	/// Whether a candidate reporting `time_status` from `node_id` replaces this source.
	pub fn is_superseded_by(&self, node_id: NodeId, time_status: u8) -> bool {
		let bit = |s: u8, b: u8| s & b != 0;

		if !self.valid {
			return bit(time_status, TIME_MASTER) || bit(time_status, TIME_SYNCHRONIZED);
		}

		let same_superseding = bit(time_status, TIME_SUPERSEDING) == bit(self.time_status, TIME_SUPERSEDING);
		let same_master = bit(time_status, TIME_MASTER) == bit(self.time_status, TIME_MASTER);

		(bit(time_status, TIME_MASTER) && bit(time_status, TIME_SUPERSEDING)
			&& bit(self.time_status, TIME_MASTER) && !bit(self.time_status, TIME_SUPERSEDING))
		|| (same_superseding && bit(time_status, TIME_MASTER) && !bit(self.time_status, TIME_MASTER))
		|| (same_superseding && same_master && node_id < self.node_id)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEstablishmentNotify {
	LinkKeyEstablished,
	InProgress,
	/// The partner asks to wait `delay_secs` before retrying.
	Error { delay_secs: u8 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
	UnicastResponse,
	UnicastTimeout,
	BroadcastResponse,
	BroadcastComplete
}

impl DiscoveryStatus {
	pub fn has_response(&self) -> bool {
		matches!(self, Self::UnicastResponse | Self::BroadcastResponse)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryPayload {
	Endpoints(Vec<u8>),
	IeeeAddress(Eui64),
	None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResult {
	pub status: DiscoveryStatus,
	pub match_address: NodeId,
	pub payload: DiscoveryPayload
}

/// Joins a device to the smart energy network: key establishment with the
/// trust center, ESI discovery, binding and time synchronization. Every step
/// is resumed from the host scheduler.
pub struct Registration {
	state: RegistrationState,
	errors: u8,
	trust_center_key_establishment_endpoint: u8,
	esi: Option<u8>,
	endpoint_index: usize,
	cluster_index: usize,
	resuming: bool,
	source: TimeSource,
	outcome: Option<bool>,
	config: RegistrationConfig
}

impl Registration {
	pub fn new(config: RegistrationConfig) -> Self {
		Self {
			state: RegistrationState::Initial,
			errors: 0,
			trust_center_key_establishment_endpoint: UNDEFINED_ENDPOINT,
			esi: None,
			endpoint_index: 0,
			cluster_index: 0,
			resuming: false,
			source: TimeSource::default(),
			outcome: None,
			config
		}
	}

	pub fn state(&self) -> RegistrationState {
		self.state
	}

	pub fn errors(&self) -> u8 {
		self.errors
	}

	pub fn time_source(&self) -> &TimeSource {
		&self.source
	}

	pub fn trust_center_key_establishment_endpoint(&self) -> u8 {
		self.trust_center_key_establishment_endpoint
	}

	/// Result of the last finished run, consumed by the keepalive.
	pub fn take_outcome(&mut self) -> Option<bool> {
		self.outcome.take()
	}

	pub fn start<H: StackHost>(&mut self, host: &mut H) -> Result<(), StackStatus> {
		if !host.is_smart_energy_security() {
			return Err(StackStatus::InvalidCall);
		}

		if self.state == RegistrationState::Complete {
			self.outcome = Some(true);
			return Ok(());
		}

		if self.state != RegistrationState::Initial {
			return Err(StackStatus::InvalidCall);
		}

		if !self.config.allowed {
			return Err(StackStatus::SecurityConfigurationInvalid);
		}

		info!("starting registration");

		if host.node_id() == TRUST_CENTER_NODE_ID {
			self.transition(host, RegistrationState::Complete);
		} else {
			self.transition_after_delay(host, RegistrationState::DiscoverKeyEstablishmentCluster, DELAY_INITIAL_MS);
		}

		Ok(())
	}

	pub fn abort<H: StackHost>(&mut self, host: &mut H) {
		if host.is_smart_energy_security() {
			self.state = RegistrationState::Failed;
			self.stop(host, false);
		}
	}

	pub fn on_tick<H: StackHost, C, const M: usize>(&mut self, host: &mut H, esi: &mut EsiTable<C, M>) {
		debug!("registration tick in {:?}", self.state);

		match self.state {
			RegistrationState::Initial => {
				if let Err(e) = self.start(host) {
					warn!("registration not started: {}", e);
				}
			},
			RegistrationState::DiscoverKeyEstablishmentCluster
				| RegistrationState::DiscoverEnergyServiceInterfaces
				| RegistrationState::DiscoverIeeeAddresses => self.perform_discovery(host, esi),
			RegistrationState::PerformKeyEstablishment => self.perform_key_establishment(host),
			RegistrationState::PerformPartnerLinkKeyExchange => self.perform_partner_link_key_exchange(host, esi),
			RegistrationState::PerformBinding => self.perform_binding(host, esi),
			RegistrationState::DetermineAuthoritativeTimeSource => self.determine_authoritative_time_source(host, esi),
			RegistrationState::Complete => self.stop(host, true),
			RegistrationState::Failed => self.stop(host, false)
		}
	}

	fn check_error_count<H: StackHost>(&mut self, host: &mut H, delay_ms: u32, failed: bool) -> bool {
		if failed {
			self.errors = self.errors.saturating_add(1);
			warn!("registration error count {} of {}", self.errors, self.config.error_limit);
		} else {
			self.errors = 0;
		}

		if self.errors >= self.config.error_limit {
			error!("aborting registration because error limit reached ({})", self.config.error_limit);
			self.abort(host);
			return false;
		}

		host.schedule(ScheduledEvent::Registration, delay_ms);
		true
	}

	fn resume_after_delay<H: StackHost>(&mut self, host: &mut H, success: bool, delay_ms: u32) -> bool {
		let delay_ms = if success { DELAY_RESUME_MS } else { delay_ms };

		self.check_error_count(host, delay_ms, !success)
	}

	fn resume_after_fixed_delay<H: StackHost>(&mut self, host: &mut H, success: bool) -> bool {
		self.resume_after_delay(host, success, DELAY_RETRY_MS)
	}

	fn transition_after_delay<H: StackHost>(&mut self, host: &mut H, next: RegistrationState, delay_ms: u32) -> bool {
		debug!("registration {:?} -> {:?}", self.state, next);
		self.state = next;
		self.check_error_count(host, delay_ms, false)
	}

	fn transition<H: StackHost>(&mut self, host: &mut H, next: RegistrationState) -> bool {
		self.transition_after_delay(host, next, DELAY_TRANSITION_MS)
	}

	fn stop<H: StackHost>(&mut self, host: &mut H, success: bool) {
		info!("registration {}", if success { "complete" } else { "failed" });

		host.registration_complete(success);
		self.outcome = Some(success);

		if success {
			if let Some(period) = self.config.discovery_period_ms {
				self.transition_after_delay(host, RegistrationState::DiscoverEnergyServiceInterfaces, period);
				return;
			}
		}

		self.state = RegistrationState::Initial;
	}

	/// Entry under the cursor, aborting when the cursor lost its slot.
	fn current_esi<H: StackHost, C, const M: usize>(&mut self, host: &mut H, esi: &EsiTable<C, M>) -> Option<(u8, EsiEntry)> {
		let index = self.esi?;

		match esi.lookup_by_index(index) {
			Some(e) => Some((index, *e)),
			None => {
				error!("esi slot {} vanished during registration", index);
				self.abort(host);
				None
			}
		}
	}

	fn next_esi<C, const M: usize>(esi: &EsiTable<C, M>, prev: Option<u8>, network: u8) -> Option<u8> {
		esi.get_next_entry(prev, 0, network)
	}

	fn perform_discovery<H: StackHost, C, const M: usize>(&mut self, host: &mut H, esi: &mut EsiTable<C, M>) {
		let result = match self.state {
			RegistrationState::DiscoverKeyEstablishmentCluster => {
				info!("discovering key establishment cluster");
				self.trust_center_key_establishment_endpoint = UNDEFINED_ENDPOINT;
				host.find_devices(TRUST_CENTER_NODE_ID, SE_PROFILE_ID, cluster::KEY_ESTABLISHMENT)
			},
			RegistrationState::DiscoverEnergyServiceInterfaces => {
				info!("discovering energy service interfaces");
				esi.age_all_entries(host.current_network());
				host.find_devices(BROADCAST_RX_ON_WHEN_IDLE, SE_PROFILE_ID, cluster::DEMAND_RESPONSE_LOAD_CONTROL)
			},
			RegistrationState::DiscoverIeeeAddresses => {
				let (_, entry) = match self.current_esi(host, esi) {
					Some(e) => e,
					None => return
				};

				info!("discovering ieee address for node 0x{:04x}", entry.node_id);
				host.find_ieee_address(entry.node_id)
			},
			s => {
				error!("invalid state for discovery {:?}", s);
				self.abort(host);
				return;
			}
		};

		if let Err(e) = result {
			warn!("failed to start discovery: {}", e);
			self.resume_after_fixed_delay(host, false);
		}
	}

	pub fn on_service_discovery<H: StackHost, C, const M: usize>(&mut self, host: &mut H, esi: &mut EsiTable<C, M>, ctx: &mut C, result: &DiscoveryResult) {
		let network = host.current_network();

		if result.status.has_response() {
			if let DiscoveryPayload::Endpoints(endpoints) = &result.payload {
				for endpoint in endpoints.iter().copied() {
					match self.state {
						RegistrationState::DiscoverKeyEstablishmentCluster => {
							if self.trust_center_key_establishment_endpoint == UNDEFINED_ENDPOINT {
								info!("discovered key establishment cluster on endpoint 0x{:02x}", endpoint);
								self.trust_center_key_establishment_endpoint = endpoint;
							} else {
								debug!("ignored key establishment cluster on endpoint 0x{:02x}", endpoint);
							}
						},
						RegistrationState::DiscoverEnergyServiceInterfaces => {
							info!("discovered esi on node 0x{:04x} endpoint 0x{:02x}", result.match_address, endpoint);

							let index = esi.lookup_by_short_id(result.match_address, endpoint, network)
								.or_else(|| esi.get_free_entry(network, ctx));

							match index.and_then(|i| esi.entry_mut(i)) {
								Some(e) => {
									e.node_id = result.match_address;
									e.network_index = network;
									e.endpoint = endpoint;
									e.age = 0;
								},
								None => info!("ignored esi on node 0x{:04x} endpoint 0x{:02x} because table is full", result.match_address, endpoint)
							}
						},
						_ => {}
					}
				}
			}
		}

		match self.state {
			RegistrationState::DiscoverKeyEstablishmentCluster => {
				if self.trust_center_key_establishment_endpoint == UNDEFINED_ENDPOINT {
					warn!("failed to find key establishment cluster");
					self.resume_after_fixed_delay(host, false);
					return;
				}

				let key = match host.trust_center_link_key() {
					Ok(k) => k,
					Err(e) => {
						error!("failed to get trust center link key: {}", e);
						self.abort(host);
						return;
					}
				};

				if !host.full_smart_energy_security() {
					warn!("skipping key establishment due to missing libraries or certificate");
					self.transition(host, RegistrationState::DiscoverEnergyServiceInterfaces);
				} else if key.authorized {
					info!("skipping key establishment because key is already authorized");
					self.transition(host, RegistrationState::DiscoverEnergyServiceInterfaces);
				} else {
					self.transition(host, RegistrationState::PerformKeyEstablishment);
				}
			},
			RegistrationState::DiscoverEnergyServiceInterfaces => {
				if result.status == DiscoveryStatus::BroadcastComplete {
					self.esi = Self::next_esi(esi, None, network);

					if self.esi.is_none() {
						warn!("failed to find energy service interfaces");
						self.resume_after_fixed_delay(host, false);
					} else {
						self.transition(host, RegistrationState::DiscoverIeeeAddresses);
					}
				}
			},
			RegistrationState::DiscoverIeeeAddresses => {
				let (index, entry) = match self.current_esi(host, esi) {
					Some(e) => e,
					None => return
				};

				match (&result.status, &result.payload) {
					(DiscoveryStatus::UnicastResponse, DiscoveryPayload::IeeeAddress(eui64)) => {
						info!("discovered ieee address for node 0x{:04x}", entry.node_id);

						if let Some(e) = esi.entry_mut(index) {
							e.eui64 = *eui64;
						}

						if !host.add_address_table_entry(eui64, entry.node_id) {
							warn!("could not add address table entry for node 0x{:04x}", entry.node_id);
						}

						self.esi = Self::next_esi(esi, Some(index), network);

						if self.esi.is_none() {
							self.esi = Self::next_esi(esi, None, network);
							self.transition(host, RegistrationState::PerformPartnerLinkKeyExchange);
						} else {
							self.resume_after_fixed_delay(host, true);
						}
					},
					_ => {
						warn!("failed to discover ieee address for node 0x{:04x}", entry.node_id);
						self.resume_after_fixed_delay(host, false);
					}
				}
			},
			_ => {}
		}
	}

	fn perform_key_establishment<H: StackHost>(&mut self, host: &mut H) {
		info!("performing key establishment");

		if let Err(e) = host.initiate_key_establishment(TRUST_CENTER_NODE_ID, self.trust_center_key_establishment_endpoint) {
			warn!("failed to start key establishment: {}", e);
			self.resume_after_fixed_delay(host, false);
		}
	}

	pub fn on_key_establishment<H: StackHost>(&mut self, host: &mut H, notify: KeyEstablishmentNotify) {
		if self.state != RegistrationState::PerformKeyEstablishment {
			return;
		}

		match notify {
			KeyEstablishmentNotify::LinkKeyEstablished => {
				self.transition(host, RegistrationState::DiscoverEnergyServiceInterfaces);
			},
			KeyEstablishmentNotify::Error { delay_secs } => {
				warn!("key establishment failed, retry in {} s", delay_secs);
				self.resume_after_delay(host, false, (delay_secs as u32) << 10);
			},
			KeyEstablishmentNotify::InProgress => {}
		}
	}

	fn perform_partner_link_key_exchange<H: StackHost, C, const M: usize>(&mut self, host: &mut H, esi: &EsiTable<C, M>) {
		let network = host.current_network();

		while self.esi.is_some() {
			let (index, entry) = match self.current_esi(host, esi) {
				Some(e) => e,
				None => return
			};

			if entry.node_id != TRUST_CENTER_NODE_ID {
				info!("performing partner link key exchange with node 0x{:04x} endpoint 0x{:02x}", entry.node_id, entry.endpoint);

				if let Err(e) = host.initiate_partner_link_key_exchange(entry.node_id, entry.endpoint) {
					warn!("failed to initiate partner link key request with node 0x{:04x}: {}", entry.node_id, e);
					self.resume_after_fixed_delay(host, false);
				}

				return;
			}

			self.esi = Self::next_esi(esi, Some(index), network);
		}

		self.esi = Self::next_esi(esi, None, network);
		self.transition(host, RegistrationState::PerformBinding);
	}

	pub fn on_partner_link_key<H: StackHost, C, const M: usize>(&mut self, host: &mut H, esi: &EsiTable<C, M>, success: bool) {
		if self.state != RegistrationState::PerformPartnerLinkKeyExchange {
			return;
		}

		let (index, entry) = match self.current_esi(host, esi) {
			Some(e) => e,
			None => return
		};

		if success {
			info!("performed partner link key exchange with node 0x{:04x}", entry.node_id);
			self.esi = Self::next_esi(esi, Some(index), host.current_network());
		} else {
			warn!("failed to perform partner link key exchange with node 0x{:04x}", entry.node_id);
		}

		self.resume_after_fixed_delay(host, success);
	}

	fn perform_binding<H: StackHost, C, const M: usize>(&mut self, host: &mut H, esi: &EsiTable<C, M>) {
		let network = host.current_network();
		let local = host.eui64();

		while self.esi.is_some() {
			let (index, entry) = match self.current_esi(host, esi) {
				Some(e) => e,
				None => return
			};

			while self.endpoint_index < host.endpoint_count() {
				let endpoint = match host.endpoint_info(self.endpoint_index) {
					Some(info) if info.network_index == network => info.endpoint,
					_ => {
						self.endpoint_index += 1;
						continue;
					}
				};

				while let Some(cluster_id) = BINDING_CLUSTERS.get(self.cluster_index).copied() {
					if !host.contains_client(endpoint, cluster_id) {
						self.cluster_index += 1;
						continue;
					}

					info!("binding to node 0x{:04x} endpoint 0x{:02x} from endpoint 0x{:02x} for cluster 0x{:04x}",
						entry.node_id, entry.endpoint, endpoint, cluster_id);

					let request = ZdoBindReq {
						src_address: entry.eui64,
						src_endp: entry.endpoint,
						cluster_id,
						dst_addr: BindReqAddr::Long {
							dst_addr: local,
							dst_endp: endpoint
						}
					};

					let result = host.bind_request(entry.node_id, &request);

					match result {
						Ok(()) => self.cluster_index += 1,
						Err(e) => warn!("failed to send bind request to node 0x{:04x}: {}", entry.node_id, e)
					}

					if !self.resume_after_fixed_delay(host, result.is_ok()) {
						self.endpoint_index = 0;
						self.cluster_index = 0;
					}

					return;
				}

				self.cluster_index = 0;
				self.endpoint_index += 1;
			}

			self.endpoint_index = 0;
			self.esi = Self::next_esi(esi, Some(index), network);
		}

		self.esi = Self::next_esi(esi, None, network);
		self.transition(host, RegistrationState::DetermineAuthoritativeTimeSource);
	}

	fn read_time_attributes<H: StackHost>(host: &mut H, source_endpoint: u8, entry: &EsiEntry) -> Result<(), Error> {
		let sequence = host.next_sequence();
		let frame = ZclFrame::global(DIRECTION_CLIENT_TO_SERVER, sequence, GenericCommand::ReadAttributes {
			identifiers: vec![attribute::TIME, attribute::TIME_STATUS, attribute::LAST_SET_TIME, attribute::VALID_UNTIL_TIME]
		});
		let aps = ApsFrame::smart_energy(cluster::TIME, source_endpoint, entry.endpoint);

		send_zcl(host, entry.node_id, &aps, &frame)
	}

	fn determine_authoritative_time_source<H: StackHost, C, const M: usize>(&mut self, host: &mut H, esi: &EsiTable<C, M>) {
		let network = host.current_network();

		let source_endpoint = match host.primary_endpoint() {
			Some(e) => e,
			None => {
				error!("no primary endpoint to request time from");
				self.abort(host);
				return;
			}
		};

		if !self.resuming {
			info!("determining authoritative time source");
			self.source.valid = false;
		}

		if self.esi.is_some() {
			let (index, entry) = match self.current_esi(host, esi) {
				Some(e) => e,
				None => return
			};

			info!("requesting time attributes from node 0x{:04x} endpoint 0x{:02x}", entry.node_id, entry.endpoint);

			let result = Self::read_time_attributes(host, source_endpoint, &entry);

			match &result {
				Ok(()) => {
					self.esi = Self::next_esi(esi, Some(index), network);

					if self.esi.is_none() {
						self.resuming = self.transition_after_delay(host, RegistrationState::DetermineAuthoritativeTimeSource, DELAY_BRIEF_MS);
						return;
					}
				},
				Err(e) => warn!("failed to request time attributes from node 0x{:04x}: {}", entry.node_id, e)
			}

			self.resuming = self.resume_after_fixed_delay(host, result.is_ok());
			return;
		}

		if !self.source.valid {
			warn!("failed to determine authoritative time source");
			self.resuming = self.resume_after_fixed_delay(host, false);
		} else {
			info!("determined authoritative time source, node 0x{:04x}", self.source.node_id);
			self.resuming = false;
			self.esi = Self::next_esi(esi, None, network);
			self.transition(host, RegistrationState::Complete);
		}
	}

	/// Time cluster attributes read from an ESI.
	pub fn on_time_attributes<H: StackHost>(&mut self, host: &mut H, source: NodeId, records: &[ReadAttributeRecord]) {
		if self.state != RegistrationState::DetermineAuthoritativeTimeSource {
			return;
		}

		let mut time = 0;
		let mut time_status = 0;
		let mut last_set_time = 0;
		let mut valid_until_time = TIME_INVALID;

		for r in records.iter().filter(|r| r.status == status::SUCCESS) {
			let value = match r.data.as_ref().and_then(|d| d.as_u32()) {
				Some(v) => v,
				None => continue
			};

			match r.identifier {
				attribute::TIME => time = value,
				attribute::TIME_STATUS => time_status = value as u8,
				attribute::LAST_SET_TIME => last_set_time = value,
				attribute::VALID_UNTIL_TIME => valid_until_time = value,
				_ => {}
			}
		}

		info!("received time attributes from node 0x{:04x}: time 0x{:08x} status 0x{:02x}", source, time, time_status);

		if time == TIME_INVALID {
			if self.source.valid && self.source.node_id == source {
				self.source.valid = false;
			}

			return;
		}

		if self.source.is_superseded_by(source, time_status) {
			self.source = TimeSource {
				valid: true,
				node_id: source,
				time,
				time_status,
				last_set_time,
				valid_until_time
			};

			host.set_time(time);
			info!("node 0x{:04x} chosen as authoritative time source", source);
		}
	}
}
