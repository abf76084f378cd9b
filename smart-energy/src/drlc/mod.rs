//demand response and load control client

use log::{ info, debug, warn, error };
use zigbee::{
	cluster,
	zcl::{ attribute, status, AttributeValue },
	drlc::{ DrlcServerCommand, LoadControlEventPayload, criticality, RANDOMIZE_START_TIME, RANDOMIZE_END_TIME }
};
use crate::{
	error::Error,
	esi::EsiTable,
	event_action::event_action,
	host::{ Host, ClusterSide, ScheduledEvent, IncomingCommand },
	outgoing::send_default_response
};

pub mod event;
pub mod table;

use event::{ LoadControlEvent, OPT_IN };
use table::{ LoadControlTable, CommandOrigin, DEFAULT_TABLE_SIZE };

pub const TICK_INTERVAL_MS: u32 = 1000;
pub const DEFAULT_DEVICE_CLASS: u16 = 0x0fff;

/// Load control event tables of every endpoint implementing the DRLC client.
pub struct DrlcClient<const EP: usize = 1, const N: usize = DEFAULT_TABLE_SIZE> {
	tables: [LoadControlTable<N>; EP],
	device_class: u16,
	subscribed: bool
}

impl<const EP: usize, const N: usize> DrlcClient<EP, N> {
	pub fn new(device_class: u16) -> Self {
		Self {
			tables: core::array::from_fn(|_| LoadControlTable::new()),
			device_class,
			subscribed: false
		}
	}

	fn index<H: Host>(host: &H, endpoint: u8) -> Option<usize> {
		host.find_endpoint_index(endpoint, cluster::DEMAND_RESPONSE_LOAD_CONTROL, ClusterSide::Client)
			.filter(|i| *i < EP)
	}

	pub fn table<H: Host>(&self, host: &H, endpoint: u8) -> Option<&LoadControlTable<N>> {
		Self::index(host, endpoint).map(|i| &self.tables[i])
	}

	fn table_mut<H: Host>(&mut self, host: &H, endpoint: u8) -> Option<&mut LoadControlTable<N>> {
		Self::index(host, endpoint).map(move |i| &mut self.tables[i])
	}

	/// Deletion announcement from the ESI table.
	pub fn esi_deleted(&mut self, index: u8) {
		for t in self.tables.iter_mut() {
			t.esi_deleted(index);
		}
	}

	pub fn init<H: Host, const M: usize>(&mut self, host: &mut H, esi: &mut EsiTable<Self, M>, endpoint: u8) {
		if !self.subscribed {
			self.subscribed = esi.subscribe(Self::esi_deleted);

			if !self.subscribed {
				error!("esi deletion subscription failed, stale esi bits will not be cleared");
			}
		}

		if let Err(e) = host.write_attribute(endpoint, cluster::DEMAND_RESPONSE_LOAD_CONTROL, attribute::DEVICE_CLASS_VALUE,
			ClusterSide::Client, AttributeValue::Uint16 { val: self.device_class }) {
			warn!("failed to write device class on endpoint {}: {}", endpoint, e);
		}

		self.clear(host, endpoint);

		host.schedule(Self::tick_event(endpoint), TICK_INTERVAL_MS);
	}

	fn tick_event(endpoint: u8) -> ScheduledEvent {
		ScheduledEvent::ClusterTick {
			endpoint,
			cluster: cluster::DEMAND_RESPONSE_LOAD_CONTROL,
			side: ClusterSide::Client
		}
	}

	pub fn clear<H: Host>(&mut self, host: &H, endpoint: u8) {
		if let Some(t) = self.table_mut(host, endpoint) {
			t.clear();
		}
	}

	pub fn tick<H: Host, const M: usize>(&mut self, host: &mut H, esi: &EsiTable<Self, M>, endpoint: u8) {
		let now = host.current_time();

		if let Some(i) = Self::index(host, endpoint) {
			self.tables[i].tick(now, &mut |n| { event_action(host, esi, n); });
		}

		host.schedule(Self::tick_event(endpoint), TICK_INTERVAL_MS);
	}

	pub fn opt_in_or_out<H: Host, const M: usize>(&mut self, host: &mut H, esi: &EsiTable<Self, M>, endpoint: u8, event_id: u32, opt_in: bool) -> bool {
		match Self::index(host, endpoint) {
			Some(i) => self.tables[i].opt_in_or_out(event_id, opt_in, &mut |n| { event_action(host, esi, n); }),
			None => false
		}
	}

	/// Device class has to match, the enrollment group matches when either side is 0.
	fn matches_ueg_or_device_class<H: Host>(host: &H, endpoint: u8, utility_enrollment_group: u8, device_class: u16) -> bool {
		let read = |id| host.read_attribute(endpoint, cluster::DEMAND_RESPONSE_LOAD_CONTROL, id, ClusterSide::Client)
			.and_then(|v| v.as_u32());

		let ueg = match read(attribute::UTILITY_ENROLLMENT_GROUP) {
			Some(v) => v as u8,
			None => return false
		};

		let dc = match read(attribute::DEVICE_CLASS_VALUE) {
			Some(v) => v as u16,
			None => return false
		};

		debug!("device class 0x{:04x}, ueg 0x{:02x}", dc, ueg);

		if dc & device_class == 0 {
			return false;
		}

		ueg == 0 || utility_enrollment_group == 0 || utility_enrollment_group == ueg
	}

	/// Seconds of randomization, drawn from the configured window in minutes.
	fn randomization_time<H: Host>(host: &mut H, endpoint: u8, attribute_id: u16) -> u16 {
		let minutes = host.read_attribute(endpoint, cluster::DEMAND_RESPONSE_LOAD_CONTROL, attribute_id, ClusterSide::Client)
			.and_then(|v| v.as_u32())
			.unwrap_or(0) & 0xff;

		if minutes == 0 {
			return 0;
		}

		(host.random() as u32 % (minutes * 60)) as u16
	}

	fn origin<H: Host, const M: usize>(&mut self, host: &H, esi: &mut EsiTable<Self, M>, incoming: &IncomingCommand) -> CommandOrigin {
		CommandOrigin {
			esi: esi.update_esi_and_get_index(host, incoming.source, incoming.aps.source_endpoint, self),
			sequence: incoming.sequence,
			endpoint: incoming.aps.destination_endpoint
		}
	}

	fn load_control_event<H: Host, const M: usize>(&mut self, host: &mut H, esi: &mut EsiTable<Self, M>, incoming: &IncomingCommand, p: &LoadControlEventPayload) {
		let endpoint = incoming.aps.destination_endpoint;

		info!("rx load control event eid 0x{:08x} dc 0x{:04x} ueg 0x{:02x} st {} dur {} cla {} ec 0x{:02x}",
			p.issuer_event_id, p.device_class, p.utility_enrollment_group, p.start_time, p.duration_in_minutes, p.criticality_level, p.event_control);

		if !Self::matches_ueg_or_device_class(host, endpoint, p.utility_enrollment_group, p.device_class) {
			info!("neither ueg nor device class matched, ignoring");
			return;
		}

		if !criticality::is_valid(p.criticality_level) {
			info!("reserved criticality level, ignoring");
			return;
		}

		let mut e = LoadControlEvent::from_payload(p);

		e.destination_endpoint = endpoint;
		e.source_endpoint = incoming.aps.source_endpoint;
		e.option_control = OPT_IN;

		if e.start_time == 0 {
			e.start_time = host.current_time();
		}

		if e.event_control & RANDOMIZE_START_TIME != 0 {
			e.start_rand = Self::randomization_time(host, endpoint, attribute::START_RANDOMIZE_MINUTES);
		}

		if e.event_control & RANDOMIZE_END_TIME != 0 {
			e.end_rand = Self::randomization_time(host, endpoint, attribute::DURATION_RANDOMIZE_MINUTES);
		}

		debug!("schedule start {} start rand {} end rand {}", e.start_time, e.start_rand, e.end_rand);

		let origin = self.origin(host, esi, incoming);
		let now = host.current_time();
		let esi: &EsiTable<Self, M> = esi;

		if let Some(t) = self.table_mut(host, endpoint) {
			t.schedule_event(now, e, &origin, &mut |n| { event_action(host, esi, n); });
		}
	}

	/// Handles a command sent by a DRLC server.
	pub fn handle_command<H: Host, const M: usize>(&mut self, host: &mut H, esi: &mut EsiTable<Self, M>, incoming: &IncomingCommand, command: &DrlcServerCommand) -> Result<(), Error> {
		let endpoint = incoming.aps.destination_endpoint;

		match command {
			DrlcServerCommand::LoadControlEvent(p) => {
				self.load_control_event(host, esi, incoming, p);
			},
			DrlcServerCommand::CancelLoadControlEvent { issuer_event_id, device_class, utility_enrollment_group, cancel_control, effective_time } => {
				info!("rx cancel load control event eid 0x{:08x} cc 0x{:02x} et {}", issuer_event_id, cancel_control, effective_time);

				if !Self::matches_ueg_or_device_class(host, endpoint, *utility_enrollment_group, *device_class) {
					info!("neither ueg nor device class matched, ignoring");
					return Ok(());
				}

				let origin = self.origin(host, esi, incoming);
				let now = host.current_time();
				let esi: &EsiTable<Self, M> = esi;

				if let Some(t) = self.table_mut(host, endpoint) {
					t.cancel_event(now, *issuer_event_id, *cancel_control, *effective_time, &origin, &mut |n| { event_action(host, esi, n); });
				}
			},
			DrlcServerCommand::CancelAllLoadControlEvents { cancel_control } => {
				info!("rx cancel all load control events cc 0x{:02x}", cancel_control);

				let origin = self.origin(host, esi, incoming);
				let now = host.current_time();
				let mut cancelled = false;

				if let Some(i) = Self::index(host, endpoint) {
					let esi: &EsiTable<Self, M> = esi;
					cancelled = self.tables[i].cancel_all_events(now, *cancel_control, &origin, &mut |n| { event_action(host, esi, n); });
				}

				//nothing to cancel is still a success
				if !cancelled {
					send_default_response(host, incoming, status::SUCCESS)?;
				}
			}
		}

		Ok(())
	}
}
