//demand response and load control cluster (0x0701)

use deku::{ self, prelude::* };
use serde::{ Serialize, Deserialize };

pub const CMD_LOAD_CONTROL_EVENT: u8 = 0x00;
pub const CMD_CANCEL_LOAD_CONTROL_EVENT: u8 = 0x01;
pub const CMD_CANCEL_ALL_LOAD_CONTROL_EVENTS: u8 = 0x02;

pub const CMD_REPORT_EVENT_STATUS: u8 = 0x00;
pub const CMD_GET_SCHEDULED_EVENTS: u8 = 0x01;

//event control
pub const RANDOMIZE_START_TIME: u8 = 0x01;
pub const RANDOMIZE_END_TIME: u8 = 0x02;

//cancel control
pub const CANCEL_WITH_RANDOMIZATION: u8 = 0x01;

pub const MAX_DURATION_IN_MINUTES: u16 = 0x05a0;
pub const START_TIME_INVALID: u32 = 0xffffffff;
pub const EFFECTIVE_TIME_INVALID: u32 = 0xffffffff;

pub const SIGNATURE_TYPE_RESERVED: u8 = 0xff;
pub const SIGNATURE_SIZE: usize = 16;

/// Amendment 1 criticality levels. 0 and everything above 14 is reserved.
pub mod criticality {
	pub const GREEN: u8 = 0x01;
	pub const LEVEL_1: u8 = 0x02;
	pub const EMERGENCY: u8 = 0x06;
	pub const PLANNED_OUTAGE: u8 = 0x07;
	pub const SERVICE_DISCONNECT: u8 = 0x08;
	pub const UTILITY_DEFINED_1: u8 = 0x09;
	pub const UTILITY_DEFINED_6: u8 = 0x0e;

	pub fn is_valid(level: u8) -> bool {
		level >= GREEN && level <= UTILITY_DEFINED_6
	}
}

#[repr(u8)]
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
	LoadControlEventCommandRx = 0x01,
	EventStarted = 0x02,
	EventCompleted = 0x03,
	UserHasChooseToOptOut = 0x04,
	UserHasChooseToOptIn = 0x05,
	EventHasBeenCanceled = 0x06,
	EventHasBeenSuperseded = 0x07,
	EventPartiallyCompletedWithUserOptOut = 0x08,
	EventPartiallyCompletedDueToUserOptIn = 0x09,
	EventCompletedNoUserParticipationPreviousOptOut = 0x0a,
	RejectedInvalidCancelCommandDefault = 0xf8,
	RejectedInvalidCancelCommandInvalidEffectiveTime = 0xf9,
	RejectedEventExpired = 0xfb,
	RejectedInvalidCancelUndefinedEvent = 0xfd,
	LoadControlEventCommandRejected = 0xfe,
}

impl From<EventStatus> for u8 {
	fn from(s: EventStatus) -> Self {
		s as u8
	}
}

/// Body of the Load Control Event command, 23 bytes on the air.
#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, Copy, PartialEq, Eq, Default)]
#[deku(endian = "little")]
pub struct LoadControlEventPayload {
	pub issuer_event_id: u32,
	pub device_class: u16,
	pub utility_enrollment_group: u8,
	pub start_time: u32,
	pub duration_in_minutes: u16,
	pub criticality_level: u8,
	pub cooling_temperature_offset: u8,
	pub heating_temperature_offset: u8,
	pub cooling_temperature_set_point: i16,
	pub heating_temperature_set_point: i16,
	pub average_load_adjustment_percentage: i8,
	pub duty_cycle: u8,
	pub event_control: u8,
}

impl LoadControlEventPayload {
	pub const SIZE: usize = 23;
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, Copy, PartialEq, Eq)]
#[deku(endian = "little")]
pub struct ReportEventStatus {
	pub issuer_event_id: u32,
	pub event_status: u8,
	pub event_status_time: u32,
	pub criticality_level_applied: u8,
	pub cooling_temperature_set_point_applied: i16,
	pub heating_temperature_set_point_applied: i16,
	pub average_load_adjustment_percentage_applied: i8,
	pub duty_cycle_applied: u8,
	pub event_control: u8,
	pub signature_type: u8,
	pub signature: [u8; SIGNATURE_SIZE],
}

/// Commands generated by the DRLC server, received by the client.
#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[deku(id_type = "u8")]
pub enum DrlcServerCommand {
	#[deku(id = "0x00")]
	LoadControlEvent(LoadControlEventPayload),
	#[deku(id = "0x01")]
	CancelLoadControlEvent {
		#[deku(endian = "little")]
		issuer_event_id: u32,
		#[deku(endian = "little")]
		device_class: u16,
		utility_enrollment_group: u8,
		cancel_control: u8,
		#[deku(endian = "little")]
		effective_time: u32
	},
	#[deku(id = "0x02")]
	CancelAllLoadControlEvents {
		cancel_control: u8
	},
}

/// Commands generated by the DRLC client, received by the server.
#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[deku(id_type = "u8")]
pub enum DrlcClientCommand {
	#[deku(id = "0x00")]
	ReportEventStatus(ReportEventStatus),
	#[deku(id = "0x01")]
	GetScheduledEvents {
		#[deku(endian = "little")]
		start_time: u32,
		number_of_events: u8
	},
}
