//zigbee cluster library

use deku::{ self, prelude::* };
use std::{ convert::{ TryFrom } };
use serde::{ Serialize, Deserialize };
use crate::{ Error, cluster, drlc::{ DrlcServerCommand, DrlcClientCommand } };

pub const FRAME_TYPE_GLOBAL: u8 = 0;
pub const FRAME_TYPE_CLUSTER: u8 = 1;

pub const DIRECTION_CLIENT_TO_SERVER: u8 = 0;
pub const DIRECTION_SERVER_TO_CLIENT: u8 = 1;

pub mod status {
	pub const SUCCESS: u8 = 0x00;
	pub const FAILURE: u8 = 0x01;
	pub const MALFORMED_COMMAND: u8 = 0x80;
	pub const UNSUP_CLUSTER_COMMAND: u8 = 0x81;
	pub const UNSUPPORTED_ATTRIBUTE: u8 = 0x86;
	pub const INVALID_VALUE: u8 = 0x87;
	pub const INSUFFICIENT_SPACE: u8 = 0x89;
	pub const NOT_FOUND: u8 = 0x8b;
}

pub mod attribute {
	//demand response client
	pub const UTILITY_ENROLLMENT_GROUP: u16 = 0x0000;
	pub const START_RANDOMIZE_MINUTES: u16 = 0x0001;
	pub const DURATION_RANDOMIZE_MINUTES: u16 = 0x0002;
	pub const DEVICE_CLASS_VALUE: u16 = 0x0003;

	//time server
	pub const TIME: u16 = 0x0000;
	pub const TIME_STATUS: u16 = 0x0001;
	pub const LAST_SET_TIME: u16 = 0x0008;
	pub const VALID_UNTIL_TIME: u16 = 0x0009;

	//key establishment server
	pub const KEY_ESTABLISHMENT_SUITE: u16 = 0x0000;
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[deku(id_type = "u8", endian = "little")]
pub enum AttributeValue {
	#[deku(id = "0xff")]
	Unk,
	#[deku(id = "0x00")]
	Nodata,
	#[deku(id = "0x08")]
	Data8 {
		val: u8
	},
	#[deku(id = "0x09")]
	Data16 {
		val: u16
	},
	#[deku(id = "0x0b")]
	Data32 {
		val: u32
	},
	#[deku(id = "0x10")]
	Bool {
		val: bool
	},
	#[deku(id = "0x18")]
	Map8 {
		val: u8
	},
	#[deku(id = "0x19")]
	Map16 {
		val: u16
	},
	#[deku(id = "0x1b")]
	Map32 {
		val: u32
	},
	#[deku(id = "0x20")]
	Uint8 {
		val: u8
	},
	#[deku(id = "0x21")]
	Uint16 {
		val: u16
	},
	#[deku(id = "0x22")]
	Uint24 {
		#[deku(bits = 24)]
		val: u32
	},
	#[deku(id = "0x23")]
	Uint32 {
		val: u32
	},
	#[deku(id = "0x25")]
	Uint48 {
		#[deku(bits = 48)]
		val: u64
	},
	#[deku(id = "0x28")]
	Int8 {
		val: i8
	},
	#[deku(id = "0x29")]
	Int16 {
		val: i16
	},
	#[deku(id = "0x2b")]
	Int32 {
		val: i32
	},
	#[deku(id = "0x30")]
	Enum8 {
		val: u8
	},
	#[deku(id = "0x31")]
	Enum16 {
		val: u16
	},
	#[deku(id = "0x41")]
	Octstr {
		count: u8,
		#[deku(count = "count")]
		val: Vec<u8>
	},
	#[deku(id = "0x42")]
	String {
		count: u8,
		#[deku(count = "count")]
		val: Vec<u8>
	},
	#[deku(id = "0xe2")]
	UTC {
		val: u32
	},
	#[deku(id = "0xe8")]
	ClusterId {
		val: u16
	},
	#[deku(id = "0xe9")]
	AttribId {
		val: u16
	},
	#[deku(id = "0xf0")]
	Eui64 {
		val: [u8; 8]
	},
	#[deku(id = "0xf1")]
	Key128 {
		val: [u8; 16]
	},
}

impl AttributeValue {
	/// Numeric view of the scalar types, `None` for strings, keys and empty values.
	pub fn as_u32(&self) -> Option<u32> {
		match self {
			Self::Data8 { val } | Self::Map8 { val } | Self::Uint8 { val } | Self::Enum8 { val } => Some(*val as u32),
			Self::Data16 { val } | Self::Map16 { val } | Self::Uint16 { val } | Self::Enum16 { val }
				| Self::ClusterId { val } | Self::AttribId { val } => Some(*val as u32),
			Self::Data32 { val } | Self::Map32 { val } | Self::Uint24 { val } | Self::Uint32 { val }
				| Self::UTC { val } => Some(*val),
			Self::Bool { val } => Some(*val as u32),
			Self::Int8 { val } => Some(*val as u32),
			Self::Int16 { val } => Some(*val as u32),
			Self::Int32 { val } => Some(*val as u32),
			_ => None
		}
	}
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct ReadAttributeRecord {
	#[deku(endian = "little")]
	pub identifier: u16,
	pub status: u8,
	#[deku(cond = "*status == 0")]
	pub data: Option<AttributeValue>
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct AttributeRecord {
	#[deku(endian = "little")]
	pub identifier: u16,
	pub data: AttributeValue
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct WriteAttributeStatus {
	pub status: u8,
	#[deku(endian = "little")]
	pub identifier: u16
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
#[deku(id_type = "u8")]
pub enum GenericCommand {
	#[deku(id = "0x00")]
	ReadAttributes {
		#[deku(read_all, endian = "little")]
		identifiers: Vec<u16>
	},
	#[deku(id = "0x01")]
	ReadAttributesResponse {
		#[deku(read_all)]
		values: Vec<ReadAttributeRecord>
	},
	#[deku(id = "0x02")]
	WriteAttributes {
		#[deku(read_all)]
		values: Vec<AttributeRecord>
	},
	#[deku(id = "0x04")]
	WriteAttributesResponse {
		#[deku(read_all)]
		values: Vec<WriteAttributeStatus>
	},
	#[deku(id = "0x0b")]
	DefaultResponse {
		command_id: u8,
		status: u8
	},
}

impl GenericCommand {
	pub fn command_id(&self) -> u8 {
		match self {
			Self::ReadAttributes { .. } => 0x00,
			Self::ReadAttributesResponse { .. } => 0x01,
			Self::WriteAttributes { .. } => 0x02,
			Self::WriteAttributesResponse { .. } => 0x04,
			Self::DefaultResponse { .. } => 0x0b
		}
	}
}

#[derive(Debug, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct ZclFrameControl {
	#[deku(bits = 1, pad_bits_before = "3")]
	pub disable_default_response: bool,
	#[deku(bits = 1)]
	pub direction: u8,
	#[deku(bits = 1)]
	pub manufacturer_specific: u8,
	#[deku(bits = 2)]
	pub frame_type: u8,
}

//Frame Type Description
//00 Command is global for all clusters, including manufacturer specific clusters
//01 Command is specific or local to a cluster

#[derive(Debug, DekuWrite, Clone, PartialEq)]
#[deku(id_type = "u16", bytes = "0")]
pub enum Command {
	#[deku(id = "0x0001")]
	Generic(GenericCommand),
	#[deku(id = "0x0003")]
	Raw(Vec<u8>),
	#[deku(id = "0x0701")]
	DrlcServer(DrlcServerCommand),
	#[deku(id = "0x8701")]
	DrlcClient(DrlcClientCommand),
}

impl Command {
	pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}

	pub fn to_json(&self) -> Result<serde_json::Value, Error> {
		Ok(match self {
			Self::Generic(g) => serde_json::to_value(g)?,
			Self::DrlcServer(c) => serde_json::to_value(c)?,
			Self::DrlcClient(c) => serde_json::to_value(c)?,
			Self::Raw(r) => serde_json::to_value(r)?
		})
	}

	pub fn from_buf(buf: &[u8], frame_type: u8, direction: u8, cluster_id: u16) -> Result<Self, Error> {
		Ok(match frame_type {
			FRAME_TYPE_CLUSTER => {
				match (cluster_id, direction) {
					(cluster::DEMAND_RESPONSE_LOAD_CONTROL, DIRECTION_SERVER_TO_CLIENT) => Command::DrlcServer(DrlcServerCommand::try_from(buf)?),
					(cluster::DEMAND_RESPONSE_LOAD_CONTROL, _) => Command::DrlcClient(DrlcClientCommand::try_from(buf)?),
					_ => Command::Raw(buf.to_vec())
				}
			},
			_ => Command::Generic(GenericCommand::try_from(buf)?)
		})
	}
}

#[derive(Debug, DekuWrite, Clone, PartialEq)]
pub struct ZclFrame {
	pub control: ZclFrameControl,
	#[deku(endian = "little")]
	pub manufacturer_code: Option<u16>,
	pub transaction_sequence_number: u8,
	#[deku(skip)]
	pub command_id: u8,
	pub command: Command,
}

impl ZclFrame {
	pub fn from_command(command: Command) -> Self {
		Self {
			control: ZclFrameControl {
				disable_default_response: false,
				direction: DIRECTION_CLIENT_TO_SERVER,
				manufacturer_specific: 0,
				frame_type: FRAME_TYPE_GLOBAL
			},
			manufacturer_code: None,
			transaction_sequence_number: 0,
			command_id: 0,
			command
		}
	}

	/// Cluster specific frame, default response left enabled.
	pub fn cluster_specific(direction: u8, transaction_sequence_number: u8, command_id: u8, command: Command) -> Self {
		let mut f = Self::from_command(command);

		f.control.frame_type = FRAME_TYPE_CLUSTER;
		f.control.direction = direction;
		f.transaction_sequence_number = transaction_sequence_number;
		f.command_id = command_id;
		f
	}

	pub fn global(direction: u8, transaction_sequence_number: u8, command: GenericCommand) -> Self {
		let command_id = command.command_id();
		let mut f = Self::from_command(Command::Generic(command));

		f.control.direction = direction;
		f.transaction_sequence_number = transaction_sequence_number;
		f.command_id = command_id;
		f
	}

	pub fn from_buf(buf: &[u8], cluster_id: u16) -> Result<Self, Error> {
		if buf.len() < 1 {
			return Err(Error::BufferTooSmall("Empty buffer"));
		}

		//read frameControl
		let control = ZclFrameControl::try_from(&buf[0..1])?;

		let mut pos = 1;
		let manufacturer_code = match control.manufacturer_specific {
			1 => {
				if buf.len() < 3 {
					return Err(Error::BufferTooSmall("Buffer length < 3"));
				}

				let c = u16::from_le_bytes([buf[1], buf[2]]);
				pos += 2;

				Some(c)
			},
			_ => None
		};

		if buf.len() <= pos {
			return Err(Error::BufferTooSmall("No seq number"));
		}

		let transaction_sequence_number = buf[pos];

		pos += 1;

		if buf.len() <= pos {
			return Err(Error::BufferTooSmall("No command"));
		}

		let command_id = buf[pos];
		let command = Command::from_buf(&buf[pos..], control.frame_type, control.direction, cluster_id)?;

		Ok(ZclFrame {
			control,
			manufacturer_code,
			transaction_sequence_number,
			command_id,
			command
		})
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}
