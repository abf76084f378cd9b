use log::{ debug, info };
use zigbee::{
	NodeId,
	cluster,
	zcl::{ ZclFrame, Command, GenericCommand }
};
use crate::{
	error::Error,
	esi::EsiTable,
	config::SmartEnergyConfig,
	drlc::DrlcClient,
	drlc_server::DrlcServer,
	registration::{ Registration, DiscoveryResult, KeyEstablishmentNotify },
	keepalive::Keepalive,
	host::{ StackHost, ApsFrame, ClusterSide, ScheduledEvent, IncomingCommand, StackStatus }
};

/// Everything a smart energy end device runs, wired to one host.
pub struct SeDevice {
	pub esi: EsiTable<DrlcClient>,
	pub drlc: DrlcClient,
	pub drlc_server: DrlcServer,
	pub registration: Registration,
	pub keepalive: Keepalive
}

impl SeDevice {
	pub fn new(config: &SmartEnergyConfig) -> Self {
		Self {
			esi: EsiTable::new(),
			drlc: DrlcClient::new(config.device_class),
			drlc_server: DrlcServer::new(),
			registration: Registration::new(config.registration.clone()),
			keepalive: Keepalive::new(config.keepalive.clone())
		}
	}

	/// Initializes the DRLC client on every endpoint that carries it.
	pub fn init<H: StackHost>(&mut self, host: &mut H) {
		for i in 0..host.endpoint_count() {
			let endpoint = match host.endpoint_info(i) {
				Some(info) => info.endpoint,
				None => continue
			};

			if host.find_endpoint_index(endpoint, cluster::DEMAND_RESPONSE_LOAD_CONTROL, ClusterSide::Client).is_some() {
				info!("drlc client on endpoint {}", endpoint);
				self.drlc.init(host, &mut self.esi, endpoint);
			}
		}
	}

	pub fn start_registration<H: StackHost>(&mut self, host: &mut H) -> Result<(), StackStatus> {
		let result = self.registration.start(host);

		self.sync_keepalive(host);
		result
	}

	fn sync_keepalive<H: StackHost>(&mut self, host: &mut H) {
		if let Some(complete) = self.registration.take_outcome() {
			self.keepalive.update(host, complete, self.registration.trust_center_key_establishment_endpoint());
		}
	}

	/// Decodes and dispatches a zcl frame received from `source`.
	pub fn handle_zcl<H: StackHost>(&mut self, host: &mut H, source: NodeId, aps: ApsFrame, payload: &[u8]) -> Result<(), Error> {
		let frame = ZclFrame::from_buf(payload, aps.cluster_id)?;
		let incoming = IncomingCommand::from_frame(source, aps, &frame);

		debug!("rx 0x{:04x} ep {}->{} cluster 0x{:04x}: {}", source, aps.source_endpoint, aps.destination_endpoint, aps.cluster_id,
			frame.command.to_json().map(|j| j.to_string()).unwrap_or_default());

		match &frame.command {
			Command::DrlcServer(c) => self.drlc.handle_command(host, &mut self.esi, &incoming, c),
			Command::DrlcClient(c) => self.drlc_server.handle_command(host, &incoming, c),
			Command::Generic(GenericCommand::ReadAttributesResponse { values }) => {
				match aps.cluster_id {
					cluster::TIME => {
						self.registration.on_time_attributes(host, source, values);
						Ok(())
					},
					cluster::KEY_ESTABLISHMENT => {
						self.keepalive.on_read_attributes_response(host, source);
						Ok(())
					},
					_ => Err(Error::UnexpectedCommand("read attributes response"))
				}
			},
			Command::Generic(GenericCommand::DefaultResponse { command_id, status }) => {
				debug!("default response from 0x{:04x} for 0x{:02x}: 0x{:02x}", source, command_id, status);
				Ok(())
			},
			Command::Generic(_) => Err(Error::UnexpectedCommand("global command")),
			Command::Raw(_) => Err(Error::UnexpectedCommand("cluster command"))
		}
	}

	/// Runs the work behind a fired timer.
	pub fn on_scheduled<H: StackHost>(&mut self, host: &mut H, event: ScheduledEvent) {
		match event {
			ScheduledEvent::ClusterTick { endpoint, cluster: cluster::DEMAND_RESPONSE_LOAD_CONTROL, side: ClusterSide::Client } => {
				self.drlc.tick(host, &self.esi, endpoint);
			},
			ScheduledEvent::ClusterTick { endpoint, cluster, side } => {
				debug!("no tick handler for cluster 0x{:04x} {:?} on endpoint {}", cluster, side, endpoint);
			},
			ScheduledEvent::Registration => self.registration.on_tick(host, &mut self.esi),
			ScheduledEvent::Keepalive => {
				self.keepalive.on_tick(host, self.registration.trust_center_key_establishment_endpoint());
			}
		}

		self.sync_keepalive(host);
	}

	pub fn on_service_discovery<H: StackHost>(&mut self, host: &mut H, result: &DiscoveryResult) {
		self.registration.on_service_discovery(host, &mut self.esi, &mut self.drlc, result);
		self.sync_keepalive(host);
	}

	pub fn on_key_establishment<H: StackHost>(&mut self, host: &mut H, notify: KeyEstablishmentNotify) {
		self.registration.on_key_establishment(host, notify);
		self.sync_keepalive(host);
	}

	pub fn on_partner_link_key<H: StackHost>(&mut self, host: &mut H, success: bool) {
		self.registration.on_partner_link_key(host, &self.esi, success);
		self.sync_keepalive(host);
	}

	pub fn opt_in_or_out<H: StackHost>(&mut self, host: &mut H, endpoint: u8, event_id: u32, opt_in: bool) -> bool {
		self.drlc.opt_in_or_out(host, &self.esi, endpoint, event_id, opt_in)
	}
}
