//zigbee device profile

use deku::{ self, prelude::* };
use serde::{ Serialize, Deserialize };
use crate::{ Error, Eui64 };

//zdo commands are in profile = 0, command set as cluster id

pub const IEEE_ADDR_REQ: u16 = 0x0001;
pub const MATCH_DESC_REQ: u16 = 0x0006;
pub const BIND_REQ: u16 = 0x0021;
pub const IEEE_ADDR_RSP: u16 = 0x8001;
pub const MATCH_DESC_RSP: u16 = 0x8006;
pub const BIND_RSP: u16 = 0x8021;

pub const STATUS_SUCCESS: u8 = 0x00;

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
#[deku(endian = "little")]
pub struct ZdoIeeeAddrReq {
	pub nwk_addr_of_interest: u16,
	pub request_type: u8,
	pub start_index: u8
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
#[deku(endian = "little")]
pub struct ZdoMatchDescReq {
	pub nwk_addr_of_interest: u16,
	pub profile_id: u16,
	pub num_in_clusters: u8,
	#[deku(count = "num_in_clusters")]
	pub in_cluster_list: Vec<u16>,
	pub num_out_clusters: u8,
	#[deku(count = "num_out_clusters")]
	pub out_cluster_list: Vec<u16>,
}

impl ZdoMatchDescReq {
	/// Searches for devices implementing `cluster_id` on the server side.
	pub fn server_cluster(nwk_addr_of_interest: u16, profile_id: u16, cluster_id: u16) -> Self {
		Self {
			nwk_addr_of_interest,
			profile_id,
			num_in_clusters: 1,
			in_cluster_list: vec![cluster_id],
			num_out_clusters: 0,
			out_cluster_list: Vec::new()
		}
	}
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
#[deku(id_type = "u8", bytes = "1")]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum BindReqAddr {
	#[deku(id = "0x01")]
	Short {
		#[deku(endian = "little")]
		dst_addr: u16
	},
	#[deku(id = "0x03")]
	Long {
		dst_addr: Eui64,
		dst_endp: u8
	},
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct ZdoBindReq {
	pub src_address: Eui64,
	pub src_endp: u8,
	#[deku(endian = "little")]
	pub cluster_id: u16,
	pub dst_addr: BindReqAddr
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct ZdoIeeeAddrRsp {
	pub status: u8,
	#[deku(cond = "*status == 0", default = "[0u8; 8]")]
	pub ieee_addr: Eui64,
	#[deku(cond = "*status == 0", default = "0xffff", endian = "little")]
	pub nwk_addr: u16,
	//associated device list of extended responses
	#[deku(read_all)]
	pub rest: Vec<u8>
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct ZdoMatchDescRsp {
	pub status: u8,
	#[deku(endian = "little")]
	pub nwk_addr_of_interest: u16,
	pub match_length: u8,
	#[deku(count = "match_length")]
	pub match_list: Vec<u8>
}

#[derive(Debug, Serialize, Deserialize, DekuRead, DekuWrite, Clone, PartialEq)]
pub struct ZdoStatusRsp {
	pub status: u8
}

#[derive(Debug, Serialize, Deserialize, DekuWrite, Clone, PartialEq)]
pub struct ZdoRaw {
	#[deku(read_all)]
	data: Vec<u8>
}

#[derive(Debug, Serialize, Deserialize, DekuWrite, Clone, PartialEq)]
#[serde(tag = "type")]
#[deku(id_type = "u16", bytes = "0")]
pub enum ZdoCommand
{
	#[serde(rename = "iar")]
	#[deku(id = "0x0001")]
	IeeeAddrReq(ZdoIeeeAddrReq),
	#[serde(rename = "mdr")]
	#[deku(id = "0x0006")]
	MatchDescReq(ZdoMatchDescReq),
	#[serde(rename = "bind")]
	#[deku(id = "0x0021")]
	BindReq(ZdoBindReq),
	#[serde(rename = "iar_rsp")]
	#[deku(id = "0x8001")]
	IeeeAddrRsp(ZdoIeeeAddrRsp),
	#[serde(rename = "mdr_rsp")]
	#[deku(id = "0x8006")]
	MatchDescRsp(ZdoMatchDescRsp),
	#[serde(rename = "bind_rsp")]
	#[deku(id = "0x8021")]
	BindRsp(ZdoStatusRsp),
	#[serde(rename = "raw")]
	#[deku(id = "0x0000")]
	Raw(ZdoRaw)
}

impl ZdoCommand {
	pub fn raw(value: Vec<u8>) -> Self {
		Self::Raw(ZdoRaw{data: value})
	}

	pub fn from_buf(buf: &[u8], cluster_id: u16) -> Result<Self, Error> {
		match cluster_id {
			IEEE_ADDR_REQ => Ok(Self::IeeeAddrReq(ZdoIeeeAddrReq::try_from(buf)?)),
			MATCH_DESC_REQ => Ok(Self::MatchDescReq(ZdoMatchDescReq::try_from(buf)?)),
			BIND_REQ => Ok(Self::BindReq(ZdoBindReq::try_from(buf)?)),
			IEEE_ADDR_RSP => Ok(Self::IeeeAddrRsp(ZdoIeeeAddrRsp::try_from(buf)?)),
			MATCH_DESC_RSP => Ok(Self::MatchDescRsp(ZdoMatchDescRsp::try_from(buf)?)),
			BIND_RSP => Ok(Self::BindRsp(ZdoStatusRsp::try_from(buf)?)),
			_ => Ok(Self::Raw(ZdoRaw{data: buf.to_vec()}))
		}
	}

	pub fn get_cluster_id(&self) -> u16 {
		match self {
			Self::IeeeAddrReq(_) => IEEE_ADDR_REQ,
			Self::MatchDescReq(_) => MATCH_DESC_REQ,
			Self::BindReq(_) => BIND_REQ,
			Self::IeeeAddrRsp(_) => IEEE_ADDR_RSP,
			Self::MatchDescRsp(_) => MATCH_DESC_RSP,
			Self::BindRsp(_) => BIND_RSP,
			Self::Raw(_) => 0x0000
		}
	}
}

#[derive(Debug, DekuWrite, Clone, PartialEq)]
pub struct ZdpFrame {
	#[deku(skip)]
	pub command_no: u16,
	pub sequence_number: u8,
	pub command: ZdoCommand
}

impl ZdpFrame {
	pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}

	pub fn from_buf(buf: &[u8], cluster_id: u16) -> Result<Self, Error> {
		if buf.len() == 0 {
			return Err(Error::BufferTooSmall("Empty zdp frame"));
		}

		Ok(ZdpFrame {
			command_no: cluster_id,
			sequence_number: buf[0],
			command: ZdoCommand::from_buf(&buf[1..], cluster_id)?
		})
	}

	pub fn from_command(sequence_number: u8, command: ZdoCommand) -> Self {
		ZdpFrame{
			command_no: command.get_cluster_id(),
			sequence_number,
			command
		}
	}
}
