//load control event table of one endpoint

use serde::{ Serialize };
use zigbee::drlc::{ EventStatus, START_TIME_INVALID, EFFECTIVE_TIME_INVALID, MAX_DURATION_IN_MINUTES, CANCEL_WITH_RANDOMIZATION };
use crate::drlc::event::{ LoadControlEvent, OPT_IN, PARTIAL };

pub const DEFAULT_TABLE_SIZE: usize = 5;

//indexed by the (partial, opt in) bits of the option control
const COMPLETION_STATUS: [EventStatus; 4] = [
	EventStatus::EventCompletedNoUserParticipationPreviousOptOut,
	EventStatus::EventCompleted,
	EventStatus::EventPartiallyCompletedWithUserOptOut,
	EventStatus::EventPartiallyCompletedDueToUserOptIn
];

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
	#[default]
	Void,
	Scheduled,
	Started,
	Superseded,
	Cancelled
}

impl EntryStatus {
	pub fn is_scheduled_or_started(&self) -> bool {
		matches!(self, Self::Scheduled | Self::Started)
	}
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableEntry {
	pub event: LoadControlEvent,
	pub status: EntryStatus
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
	/// Answer to a command, reuses its transaction sequence number.
	Reply(u8),
	/// Unsolicited, takes the next sequence number of the host.
	Next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
	Esi(u8),
	/// Every ESI recorded in the event's bitmask.
	Bitmask
}

/// A report event status to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
	pub event: LoadControlEvent,
	pub status: EventStatus,
	pub sequence: Sequence,
	pub recipient: Recipient
}

/// Where a DRLC command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOrigin {
	/// ESI table slot of the sender, `None` if it could not be recorded.
	pub esi: Option<u8>,
	pub sequence: u8,
	/// Local endpoint the command was addressed to.
	pub endpoint: u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
	Scheduled(usize),
	/// Known event, sender added to its bitmask.
	Merged(usize),
	/// Known event from a known sender, nothing done.
	Duplicate,
	Rejected(EventStatus)
}

fn esi_bit(index: u8) -> u32 {
	1u32.checked_shl(index as u32).unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct LoadControlTable<const N: usize = DEFAULT_TABLE_SIZE> {
	entries: [TableEntry; N]
}

impl<const N: usize> LoadControlTable<N> {
	pub fn new() -> Self {
		Self {
			entries: [TableEntry::default(); N]
		}
	}

	pub fn entries(&self) -> &[TableEntry] {
		&self.entries
	}

	pub fn clear(&mut self) {
		self.entries = [TableEntry::default(); N];
	}

	fn reply(origin: &CommandOrigin, event: LoadControlEvent, status: EventStatus, notify: &mut dyn FnMut(Notification)) {
		//a reply to a sender missing from the esi table goes nowhere
		if let Some(esi) = origin.esi {
			notify(Notification {
				event,
				status,
				sequence: Sequence::Reply(origin.sequence),
				recipient: Recipient::Esi(esi)
			});
		}
	}

	fn report(event: LoadControlEvent, status: EventStatus, notify: &mut dyn FnMut(Notification)) {
		notify(Notification {
			event,
			status,
			sequence: Sequence::Next,
			recipient: Recipient::Bitmask
		});
	}

	fn void_all_with_id(&mut self, event_id: u32) {
		for e in self.entries.iter_mut().filter(|e| e.event.event_id == event_id) {
			e.status = EntryStatus::Void;
		}
	}

	/// Advances at most one entry, the first one that is due.
	pub fn tick(&mut self, now: u32, notify: &mut dyn FnMut(Notification)) {
		let now = now as u64;

		for i in 0..N {
			let e = self.entries[i];

			match e.status {
				EntryStatus::Scheduled if e.event.start_time as u64 + e.event.start_rand as u64 <= now => {
					let status = if e.event.is_opted_in() {
						EventStatus::EventStarted
					}
					else {
						EventStatus::UserHasChooseToOptOut
					};

					Self::report(e.event, status, notify);
					self.entries[i].status = EntryStatus::Started;
					return;
				},
				EntryStatus::Started if e.event.end_time() + e.event.end_rand as u64 <= now => {
					let status = COMPLETION_STATUS[(e.event.option_control & (OPT_IN | PARTIAL)) as usize];

					Self::report(e.event, status, notify);
					self.void_all_with_id(e.event.event_id);
					return;
				},
				EntryStatus::Superseded if e.event.start_time as u64 <= now => {
					Self::report(e.event, EventStatus::EventHasBeenSuperseded, notify);
					self.void_all_with_id(e.event.event_id);
					return;
				},
				EntryStatus::Cancelled if e.event.start_time as u64 <= now => {
					Self::report(e.event, EventStatus::EventHasBeenCanceled, notify);
					self.void_all_with_id(e.event.event_id);
					return;
				},
				_ => {}
			}
		}
	}

	/// Admits an event whose start time and randomization are already resolved.
	pub fn schedule_event(&mut self, now: u32, mut event: LoadControlEvent, origin: &CommandOrigin, notify: &mut dyn FnMut(Notification)) -> Admission {
		if event.start_time == START_TIME_INVALID || event.duration > MAX_DURATION_IN_MINUTES {
			Self::reply(origin, event, EventStatus::LoadControlEventCommandRejected, notify);
			return Admission::Rejected(EventStatus::LoadControlEventCommandRejected);
		}

		if now as u64 > event.end_time() {
			Self::reply(origin, event, EventStatus::RejectedEventExpired, notify);
			return Admission::Rejected(EventStatus::RejectedEventExpired);
		}

		let bit = origin.esi.map(esi_bit).unwrap_or(0);

		//the same event heard from another esi
		if let Some(i) = self.entries.iter().position(|e| e.status.is_scheduled_or_started() && e.event.event_id == event.event_id) {
			let e = &mut self.entries[i];

			if bit != 0 && e.event.esi_bitmask & bit == 0 {
				e.event.esi_bitmask |= bit;
				Self::reply(origin, e.event, EventStatus::LoadControlEventCommandRx, notify);
				return Admission::Merged(i);
			}

			return Admission::Duplicate;
		}

		let slot = match self.entries.iter().position(|e| e.status == EntryStatus::Void) {
			Some(slot) => slot,
			None => {
				Self::reply(origin, event, EventStatus::LoadControlEventCommandRejected, notify);
				return Admission::Rejected(EventStatus::LoadControlEventCommandRejected);
			}
		};

		for e in self.entries.iter_mut() {
			if e.status.is_scheduled_or_started() && event.overlaps(&e.event) {
				//a running event keeps going until just before the new one takes over
				e.event.start_time = match e.status {
					EntryStatus::Started => event.start_time.wrapping_add(event.start_rand as u32).wrapping_sub(1),
					_ => now
				};
				e.status = EntryStatus::Superseded;
			}
		}

		event.esi_bitmask = bit;
		self.entries[slot] = TableEntry {
			event,
			status: EntryStatus::Scheduled
		};

		Self::reply(origin, event, EventStatus::LoadControlEventCommandRx, notify);

		Admission::Scheduled(slot)
	}

	pub fn opt_in_or_out(&mut self, event_id: u32, opt_in: bool, notify: &mut dyn FnMut(Notification)) -> bool {
		let e = match self.entries.iter_mut().find(|e| e.status.is_scheduled_or_started() && e.event.event_id == event_id) {
			Some(e) => e,
			None => return false
		};

		let previous = e.event.is_opted_in();

		if opt_in {
			e.event.option_control |= OPT_IN;
		}
		else {
			e.event.option_control &= !OPT_IN;
		}

		if previous != opt_in && e.status == EntryStatus::Started {
			e.event.option_control |= PARTIAL;
		}

		//opting out of an event that has not started changes nothing visible yet
		if !opt_in && e.status == EntryStatus::Scheduled {
			return true;
		}

		let status = if opt_in {
			EventStatus::UserHasChooseToOptIn
		}
		else {
			EventStatus::UserHasChooseToOptOut
		};

		Self::report(e.event, status, notify);

		true
	}

	/// Marks the event cancelled, the notification goes out from the tick once the
	/// cancel time is reached.
	pub fn cancel_event(&mut self, now: u32, event_id: u32, cancel_control: u8, effective_time: u32, origin: &CommandOrigin, notify: &mut dyn FnMut(Notification)) {
		if let Some(e) = self.entries.iter_mut().find(|e| e.status != EntryStatus::Void && e.event.event_id == event_id) {
			if effective_time == EFFECTIVE_TIME_INVALID || effective_time as u64 > e.event.end_time() {
				Self::reply(origin, e.event, EventStatus::RejectedInvalidCancelCommandInvalidEffectiveTime, notify);
				return;
			}

			let cancel_time = if cancel_control & CANCEL_WITH_RANDOMIZATION != 0 {
				let base = if effective_time == 0 { now } else { effective_time };

				base.saturating_add(e.event.end_rand as u32)
			}
			else {
				effective_time
			};

			e.status = EntryStatus::Cancelled;
			e.event.start_time = cancel_time;
			return;
		}

		let undefined = LoadControlEvent {
			event_id,
			destination_endpoint: origin.endpoint,
			..Default::default()
		};

		Self::reply(origin, undefined, EventStatus::RejectedInvalidCancelUndefinedEvent, notify);
	}

	/// Returns whether anything was cancelled.
	pub fn cancel_all_events(&mut self, now: u32, cancel_control: u8, origin: &CommandOrigin, notify: &mut dyn FnMut(Notification)) -> bool {
		let mut cancelled = false;

		for i in 0..N {
			let e = self.entries[i];

			if e.status != EntryStatus::Void {
				self.cancel_event(now, e.event.event_id, cancel_control, 0, origin, notify);
				cancelled = true;
			}
		}

		cancelled
	}

	/// Forgets an ESI slot that is about to be reused.
	pub fn esi_deleted(&mut self, index: u8) {
		let bit = esi_bit(index);

		for e in self.entries.iter_mut() {
			e.event.esi_bitmask &= !bit;
		}
	}
}

impl<const N: usize> Default for LoadControlTable<N> {
	fn default() -> Self {
		Self::new()
	}
}
