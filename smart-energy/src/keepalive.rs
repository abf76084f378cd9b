//trust center keepalive

use log::{ info, debug, warn, error };
use serde::{ Serialize };
use zigbee::{
	NodeId,
	cluster,
	TRUST_CENTER_NODE_ID,
	zcl::{ ZclFrame, GenericCommand, attribute, DIRECTION_CLIENT_TO_SERVER }
};
use crate::{
	config::KeepaliveConfig,
	host::{ StackHost, ApsFrame, ScheduledEvent, StackStatus },
	outgoing::send_zcl
};

pub const WAIT_TIME_MS: u32 = 5000;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeepaliveState {
	Initial,
	SendKeepaliveSignal,
	InitiateTrustCenterSearch
}

/// Periodically reads an attribute of the trust center and searches for it
/// again once too many reads went unanswered.
pub struct Keepalive {
	state: KeepaliveState,
	failures: u8,
	waiting_for_response: bool,
	config: KeepaliveConfig
}

impl Keepalive {
	pub fn new(config: KeepaliveConfig) -> Self {
		Self {
			state: KeepaliveState::Initial,
			failures: 0,
			waiting_for_response: false,
			config
		}
	}

	pub fn state(&self) -> KeepaliveState {
		self.state
	}

	pub fn failures(&self) -> u8 {
		self.failures
	}

	pub fn abort<H: StackHost>(&mut self, host: &mut H) {
		info!("setting trust center keepalive inactive");
		self.state = KeepaliveState::Initial;
		host.cancel(ScheduledEvent::Keepalive);
	}

	/// Called when registration finishes, `tc_endpoint` is where the trust
	/// center's key establishment cluster was found.
	pub fn update<H: StackHost>(&mut self, host: &mut H, registration_complete: bool, tc_endpoint: u8) {
		if !registration_complete {
			return;
		}

		match self.state {
			KeepaliveState::Initial => {
				self.start(host, tc_endpoint);
				return;
			},
			KeepaliveState::InitiateTrustCenterSearch => {
				if let Ok(key) = host.trust_center_link_key() {
					if !key.authorized {
						error!("registration failed after trust center change, rebooting to forget old network");
						host.reboot();
					}
				}

				self.state = KeepaliveState::SendKeepaliveSignal;
				self.delay_until_next_keepalive(host);
			},
			KeepaliveState::SendKeepaliveSignal => {}
		}

		host.start_writing_stack_tokens();
	}

	fn start<H: StackHost>(&mut self, host: &mut H, tc_endpoint: u8) {
		if host.node_id() == TRUST_CENTER_NODE_ID {
			return;
		}

		self.failures = 0;
		self.send_keepalive_signal(host, tc_endpoint);
	}

	fn delay_until_next_keepalive<H: StackHost>(&self, host: &mut H) {
		host.schedule(ScheduledEvent::Keepalive, self.config.interval_ms);
	}

	pub fn send_keepalive_signal<H: StackHost>(&mut self, host: &mut H, tc_endpoint: u8) {
		debug!("sending keepalive signal to trust center endpoint 0x{:02x}", tc_endpoint);

		let sequence = host.next_sequence();
		let frame = ZclFrame::global(DIRECTION_CLIENT_TO_SERVER, sequence, GenericCommand::ReadAttributes {
			identifiers: vec![attribute::KEY_ESTABLISHMENT_SUITE]
		});

		let result = match host.primary_endpoint() {
			Some(source_endpoint) => {
				let aps = ApsFrame::smart_energy(cluster::KEY_ESTABLISHMENT, source_endpoint, tc_endpoint);
				send_zcl(host, TRUST_CENTER_NODE_ID, &aps, &frame)
			},
			None => Err(StackStatus::InvalidCall.into())
		};

		if let Err(e) = &result {
			warn!("failed to send keepalive signal to trust center endpoint 0x{:02x}: {}", tc_endpoint, e);
		}

		self.state = KeepaliveState::SendKeepaliveSignal;
		self.waiting_for_response = result.is_ok();

		host.schedule(ScheduledEvent::Keepalive, if result.is_ok() { WAIT_TIME_MS } else { self.config.interval_ms });
	}

	pub fn on_tick<H: StackHost>(&mut self, host: &mut H, tc_endpoint: u8) {
		host.cancel(ScheduledEvent::Keepalive);

		if self.waiting_for_response {
			self.message_timeout(host);
			return;
		}

		if self.state == KeepaliveState::SendKeepaliveSignal {
			self.send_keepalive_signal(host, tc_endpoint);
		}
	}

	fn message_timeout<H: StackHost>(&mut self, host: &mut H) {
		self.waiting_for_response = false;
		self.failures = self.failures.saturating_add(1);

		warn!("trust center did not acknowledge keepalive signal ({} of {})", self.failures, self.config.failure_limit);

		if self.failures >= self.config.failure_limit {
			error!("keepalive failure limit reached ({})", self.config.failure_limit);
			self.initiate_trust_center_search(host);
		} else {
			self.delay_until_next_keepalive(host);
		}
	}

	/// Read attributes response on the key establishment cluster.
	pub fn on_read_attributes_response<H: StackHost>(&mut self, host: &mut H, source: NodeId) {
		if source == TRUST_CENTER_NODE_ID && self.state == KeepaliveState::SendKeepaliveSignal {
			info!("trust center acknowledged keepalive signal");
			self.waiting_for_response = false;
			self.failures = 0;
			self.delay_until_next_keepalive(host);
		}
	}

	fn initiate_trust_center_search<H: StackHost>(&mut self, host: &mut H) {
		info!("initiating trust center search");

		let result = host.stop_writing_stack_tokens()
			.map_err(|e| {
				warn!("failed to suspend token writing");
				e
			})
			.and_then(|()| host.find_and_rejoin_network());

		match result {
			Ok(()) => self.state = KeepaliveState::InitiateTrustCenterSearch,
			Err(e) => {
				error!("could not initiate trust center search: {}", e);
				host.start_writing_stack_tokens();
			}
		}
	}
}
