use thiserror::Error;
use crate::host::StackStatus;

/// Failures of the server side mirror table.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DrlcError {
	#[error("invalid endpoint 0x{0:02x}")]
	InvalidEndpoint(u8),
	#[error("index {0} out of range")]
	IndexOutOfRange(usize)
}

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Codec(#[from] zigbee::Error),
	#[error(transparent)]
	Stack(#[from] StackStatus),
	#[error(transparent)]
	Drlc(#[from] DrlcError),
	#[error("unexpected command {0}")]
	UnexpectedCommand(&'static str)
}
