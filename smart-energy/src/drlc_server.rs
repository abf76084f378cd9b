//demand response and load control server

use log::{ info, debug };
use serde::{ Serialize };
use zigbee::{
	NodeId,
	cluster,
	zcl::{ ZclFrame, Command, status, DIRECTION_SERVER_TO_CLIENT },
	drlc::{ DrlcClientCommand, DrlcServerCommand, CMD_LOAD_CONTROL_EVENT }
};
use crate::{
	error::{ Error, DrlcError },
	host::{ Host, ApsFrame, ClusterSide, IncomingCommand },
	outgoing::{ send_zcl, send_default_response },
	drlc::event::LoadControlEvent
};

pub const DEFAULT_TABLE_SIZE: usize = 2;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct MirrorEntry {
	pub event: LoadControlEvent,
	pub active: bool,
	/// Stored with start time 0, reported as "now" until it ends.
	pub start_now: bool
}

/// Events the local server hands out to clients, kept per endpoint.
pub struct DrlcServer<const EP: usize = 1, const N: usize = DEFAULT_TABLE_SIZE> {
	tables: [[MirrorEntry; N]; EP]
}

impl<const EP: usize, const N: usize> DrlcServer<EP, N> {
	pub fn new() -> Self {
		Self {
			tables: [[MirrorEntry::default(); N]; EP]
		}
	}

	fn table<H: Host>(&self, host: &H, endpoint: u8) -> Result<&[MirrorEntry; N], DrlcError> {
		host.find_endpoint_index(endpoint, cluster::DEMAND_RESPONSE_LOAD_CONTROL, ClusterSide::Server)
			.and_then(|i| self.tables.get(i))
			.ok_or(DrlcError::InvalidEndpoint(endpoint))
	}

	fn table_mut<H: Host>(&mut self, host: &H, endpoint: u8) -> Result<&mut [MirrorEntry; N], DrlcError> {
		host.find_endpoint_index(endpoint, cluster::DEMAND_RESPONSE_LOAD_CONTROL, ClusterSide::Server)
			.and_then(move |i| self.tables.get_mut(i))
			.ok_or(DrlcError::InvalidEndpoint(endpoint))
	}

	pub fn entries<H: Host>(&self, host: &H, endpoint: u8) -> Result<&[MirrorEntry], DrlcError> {
		self.table(host, endpoint).map(|t| &t[..])
	}

	/// Copy of the stored event. A start-now event that is still running is
	/// reported with start time 0 and the minutes it has left.
	pub fn get<H: Host>(&self, host: &H, endpoint: u8, index: usize) -> Result<LoadControlEvent, DrlcError> {
		let entry = self.table(host, endpoint)?
			.get(index)
			.ok_or(DrlcError::IndexOutOfRange(index))?;

		let mut event = entry.event;

		if entry.start_now {
			let now = host.current_time() as u64;

			if now < event.end_time() {
				let elapsed = (now.saturating_sub(event.start_time as u64) / 60) as u16;

				event.duration = event.duration.saturating_sub(elapsed);
				event.start_time = 0;
			}
		}

		Ok(event)
	}

	pub fn set<H: Host>(&mut self, host: &H, endpoint: u8, index: usize, mut event: LoadControlEvent) -> Result<(), DrlcError> {
		let now = host.current_time();
		let entry = self.table_mut(host, endpoint)?
			.get_mut(index)
			.ok_or(DrlcError::IndexOutOfRange(index))?;

		entry.start_now = event.start_time == 0;

		if entry.start_now {
			event.start_time = now;
		}

		entry.event = event;
		entry.active = true;

		Ok(())
	}

	pub fn clear_all<H: Host>(&mut self, host: &H, endpoint: u8) -> Result<(), DrlcError> {
		for entry in self.table_mut(host, endpoint)?.iter_mut() {
			entry.active = false;
		}

		Ok(())
	}

	fn send_event<H: Host>(host: &mut H, node: NodeId, aps: &ApsFrame, event: &LoadControlEvent) -> Result<(), Error> {
		let sequence = host.next_sequence();
		let frame = ZclFrame::cluster_specific(DIRECTION_SERVER_TO_CLIENT, sequence, CMD_LOAD_CONTROL_EVENT,
			Command::DrlcServer(DrlcServerCommand::LoadControlEvent(event.to_payload())));

		info!("tx load control event eid 0x{:08x} st {} dur {} to 0x{:04x}", event.event_id, event.start_time, event.duration, node);

		send_zcl(host, node, aps, &frame)
	}

	/// Sends the event stored at `index` of `source_endpoint`.
	pub fn send_load_control_event<H: Host>(&self, host: &mut H, node: NodeId, source_endpoint: u8, destination_endpoint: u8, index: usize) -> Result<(), Error> {
		let event = self.get(host, source_endpoint, index)?;
		let aps = ApsFrame::smart_energy(cluster::DEMAND_RESPONSE_LOAD_CONTROL, source_endpoint, destination_endpoint);

		Self::send_event(host, node, &aps, &event)
	}

	fn get_scheduled_events<H: Host>(&self, host: &mut H, incoming: &IncomingCommand, start_time: u32, number_of_events: u8) -> Result<(), Error> {
		let endpoint = incoming.aps.destination_endpoint;
		let start_time = match start_time {
			0 => host.current_time(),
			t => t
		};

		debug!("get scheduled events from {} count {}", start_time, number_of_events);

		let mut sent: usize = 0;

		for index in 0..N {
			if number_of_events != 0 && sent >= number_of_events as usize {
				break;
			}

			let entry = self.table(host, endpoint)?[index];

			if !entry.active || entry.event.start_time < start_time {
				continue;
			}

			Self::send_event(host, incoming.source, &incoming.aps.reply(), &entry.event)?;
			sent += 1;
		}

		if sent == 0 {
			send_default_response(host, incoming, status::NOT_FOUND)?;
		}

		Ok(())
	}

	/// Handles a command sent by a DRLC client.
	pub fn handle_command<H: Host>(&self, host: &mut H, incoming: &IncomingCommand, command: &DrlcClientCommand) -> Result<(), Error> {
		match command {
			DrlcClientCommand::GetScheduledEvents { start_time, number_of_events } => {
				self.get_scheduled_events(host, incoming, *start_time, *number_of_events)
			},
			DrlcClientCommand::ReportEventStatus(r) => {
				info!("rx report event status from 0x{:04x}: eid 0x{:08x} es 0x{:02x} est {} cla {} ctsa {} htsa {} alapa {} dca {} ec 0x{:02x}",
					incoming.source, r.issuer_event_id, r.event_status, r.event_status_time, r.criticality_level_applied,
					r.cooling_temperature_set_point_applied, r.heating_temperature_set_point_applied,
					r.average_load_adjustment_percentage_applied, r.duty_cycle_applied, r.event_control);

				send_default_response(host, incoming, status::SUCCESS)
			}
		}
	}
}

impl<const EP: usize, const N: usize> Default for DrlcServer<EP, N> {
	fn default() -> Self {
		Self::new()
	}
}
