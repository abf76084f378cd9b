//encoding and sending of zcl frames

use log::{ debug };
use zigbee::{ NodeId, zcl::{ ZclFrame, GenericCommand, DIRECTION_CLIENT_TO_SERVER, DIRECTION_SERVER_TO_CLIENT } };
use crate::{ error::Error, host::{ Host, ApsFrame, IncomingCommand } };

pub fn send_zcl<H: Host>(host: &mut H, destination: NodeId, aps: &ApsFrame, frame: &ZclFrame) -> Result<(), Error> {
	let payload = frame.to_bytes()?;

	debug!("tx 0x{:04x} ep {}->{} cluster 0x{:04x}: {}", destination, aps.source_endpoint, aps.destination_endpoint, aps.cluster_id,
		payload.iter().map(|b| format!("{:02x}", b)).collect::<String>());

	host.send_unicast(destination, aps, &payload)?;

	Ok(())
}

pub fn send_default_response<H: Host>(host: &mut H, incoming: &IncomingCommand, status: u8) -> Result<(), Error> {
	let direction = match incoming.direction {
		DIRECTION_CLIENT_TO_SERVER => DIRECTION_SERVER_TO_CLIENT,
		_ => DIRECTION_CLIENT_TO_SERVER
	};

	let mut frame = ZclFrame::global(direction, incoming.sequence, GenericCommand::DefaultResponse {
		command_id: incoming.command_id,
		status
	});
	frame.control.disable_default_response = true;

	send_zcl(host, incoming.source, &incoming.aps.reply(), &frame)
}
