//zigbee wire formats used by the smart energy profile

use deku::{ self };

pub mod zcl;
pub mod zdp;
pub mod drlc;

pub type NodeId = u16;
pub type Eui64 = [u8; 8];

pub const SE_PROFILE_ID: u16 = 0x0109;
pub const ZDO_PROFILE_ID: u16 = 0x0000;
pub const TRUST_CENTER_NODE_ID: NodeId = 0x0000;
pub const NULL_NODE_ID: NodeId = 0xffff;
pub const BROADCAST_RX_ON_WHEN_IDLE: NodeId = 0xfffd;

pub mod cluster {
	pub const TIME: u16 = 0x000a;
	pub const PRICE: u16 = 0x0700;
	pub const DEMAND_RESPONSE_LOAD_CONTROL: u16 = 0x0701;
	pub const MESSAGING: u16 = 0x0703;
	pub const KEY_ESTABLISHMENT: u16 = 0x0800;
}

#[derive(Debug)]
pub enum Error {
	Deku(deku::DekuError),
	Json(serde_json::Error),
	BufferTooSmall(&'static str),
	NotImplemented
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Deku(e) => e.fmt(f),
			Self::Json(e) => e.fmt(f),
			Self::BufferTooSmall(s) => write!(f, "Buffer too small: {}", s),
			Self::NotImplemented => write!(f, "Not implemented")
		}
	}
}

impl std::error::Error for Error {}

impl From<deku::DekuError> for Error {
	fn from(e: deku::DekuError) -> Self {
		Error::Deku(e)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::Json(e)
	}
}
