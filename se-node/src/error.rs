use std::{ num::ParseIntError, fmt::{ Display, Formatter } };
use smart_energy::DrlcError;
use crate::{ node::NodeMessage, compat::channel::{ SendError, RecvError } };

#[derive(Debug)]
pub enum Error {
	String(String),
	Str(&'static str),
	IoError(std::io::Error),
	SendError(SendError<NodeMessage>),
	RecvError(RecvError),
	ParseIntError(ParseIntError),
	SerdeJson(serde_json::Error),
	Hex(hex::FromHexError),
	Zigbee(zigbee::Error),
	SmartEnergy(smart_energy::Error),
	Drlc(DrlcError)
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::String(s) => write!(f, "{}", s),
			Self::Str(s) => write!(f, "{}", s),
			Self::IoError(e) => e.fmt(f),
			Self::SendError(e) => e.fmt(f),
			Self::RecvError(e) => e.fmt(f),
			Self::ParseIntError(e) => e.fmt(f),
			Self::SerdeJson(e) => e.fmt(f),
			Self::Hex(e) => e.fmt(f),
			Self::Zigbee(e) => e.fmt(f),
			Self::SmartEnergy(e) => e.fmt(f),
			Self::Drlc(e) => e.fmt(f)
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Self {
		Error::IoError(e)
	}
}

impl From<SendError<NodeMessage>> for Error {
	fn from(e: SendError<NodeMessage>) -> Self {
		Error::SendError(e)
	}
}

impl From<RecvError> for Error {
	fn from(e: RecvError) -> Self {
		Error::RecvError(e)
	}
}

impl From<ParseIntError> for Error {
	fn from(e: ParseIntError) -> Self {
		Error::ParseIntError(e)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::SerdeJson(e)
	}
}

impl From<hex::FromHexError> for Error {
	fn from(e: hex::FromHexError) -> Self {
		Error::Hex(e)
	}
}

impl From<zigbee::Error> for Error {
	fn from(e: zigbee::Error) -> Self {
		Error::Zigbee(e)
	}
}

impl From<smart_energy::Error> for Error {
	fn from(e: smart_energy::Error) -> Self {
		Error::SmartEnergy(e)
	}
}

impl From<DrlcError> for Error {
	fn from(e: DrlcError) -> Self {
		Error::Drlc(e)
	}
}
