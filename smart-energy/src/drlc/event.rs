use serde::{ Serialize };
use zigbee::drlc::{ LoadControlEventPayload, ReportEventStatus, EventStatus, SIGNATURE_TYPE_RESERVED, SIGNATURE_SIZE };

//option control
pub const OPT_IN: u8 = 0x01;
pub const PARTIAL: u8 = 0x02;

/// A load control event as kept by the client, the wire payload plus the
/// state decided when it was admitted.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadControlEvent {
	pub event_id: u32,
	pub device_class: u16,
	pub utility_enrollment_group: u8,
	pub start_time: u32,
	pub duration: u16,
	pub criticality_level: u8,
	pub cooling_temp_offset: u8,
	pub heating_temp_offset: u8,
	pub cooling_temp_set_point: i16,
	pub heating_temp_set_point: i16,
	pub avg_load_percentage: i8,
	pub duty_cycle: u8,
	pub event_control: u8,
	pub start_rand: u16,
	pub end_rand: u16,
	pub option_control: u8,
	pub esi_bitmask: u32,
	pub destination_endpoint: u8,
	pub source_endpoint: u8
}

impl LoadControlEvent {
	pub fn from_payload(p: &LoadControlEventPayload) -> Self {
		Self {
			event_id: p.issuer_event_id,
			device_class: p.device_class,
			utility_enrollment_group: p.utility_enrollment_group,
			start_time: p.start_time,
			duration: p.duration_in_minutes,
			criticality_level: p.criticality_level,
			cooling_temp_offset: p.cooling_temperature_offset,
			heating_temp_offset: p.heating_temperature_offset,
			cooling_temp_set_point: p.cooling_temperature_set_point,
			heating_temp_set_point: p.heating_temperature_set_point,
			avg_load_percentage: p.average_load_adjustment_percentage,
			duty_cycle: p.duty_cycle,
			event_control: p.event_control,
			..Default::default()
		}
	}

	pub fn to_payload(&self) -> LoadControlEventPayload {
		LoadControlEventPayload {
			issuer_event_id: self.event_id,
			device_class: self.device_class,
			utility_enrollment_group: self.utility_enrollment_group,
			start_time: self.start_time,
			duration_in_minutes: self.duration,
			criticality_level: self.criticality_level,
			cooling_temperature_offset: self.cooling_temp_offset,
			heating_temperature_offset: self.heating_temp_offset,
			cooling_temperature_set_point: self.cooling_temp_set_point,
			heating_temperature_set_point: self.heating_temp_set_point,
			average_load_adjustment_percentage: self.avg_load_percentage,
			duty_cycle: self.duty_cycle,
			event_control: self.event_control
		}
	}

	/// Start plus duration, widened so events near the end of the epoch do not wrap.
	pub fn end_time(&self) -> u64 {
		self.start_time as u64 + self.duration as u64 * 60
	}

	/// Whether `[start, start + duration)` of both events intersect.
	pub fn overlaps(&self, other: &LoadControlEvent) -> bool {
		(self.start_time as u64) < other.end_time() && (other.start_time as u64) < self.end_time()
	}

	pub fn is_opted_in(&self) -> bool {
		self.option_control & OPT_IN != 0
	}

	pub fn report(&self, status: EventStatus, status_time: u32) -> ReportEventStatus {
		ReportEventStatus {
			issuer_event_id: self.event_id,
			event_status: status.into(),
			event_status_time: status_time,
			criticality_level_applied: self.criticality_level,
			cooling_temperature_set_point_applied: self.cooling_temp_set_point,
			heating_temperature_set_point_applied: self.heating_temp_set_point,
			average_load_adjustment_percentage_applied: self.avg_load_percentage,
			duty_cycle_applied: self.duty_cycle,
			event_control: self.event_control,
			signature_type: SIGNATURE_TYPE_RESERVED,
			signature: [0xff; SIGNATURE_SIZE]
		}
	}
}
