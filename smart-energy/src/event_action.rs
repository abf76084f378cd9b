//report event status fan-out

use log::{ info, warn, error };
use zigbee::{
	cluster,
	zcl::{ ZclFrame, Command, DIRECTION_CLIENT_TO_SERVER },
	drlc::{ DrlcClientCommand, CMD_REPORT_EVENT_STATUS }
};
use crate::{
	esi::EsiTable,
	host::{ Host, ApsFrame },
	outgoing::send_zcl,
	drlc::table::{ Notification, Recipient, Sequence }
};

/// Sends a report event status for `n` to one ESI or to every ESI in the event's
/// bitmask. Returns how many reports went out.
pub fn event_action<H: Host, C, const M: usize>(host: &mut H, esi: &EsiTable<C, M>, n: Notification) -> usize {
	let sequence = match n.sequence {
		Sequence::Reply(s) => s,
		Sequence::Next => host.next_sequence()
	};

	if !host.drlc_event_action(&n.event, n.status, sequence) {
		return 0;
	}

	let recipients = (0..M as u8).filter(|i| match n.recipient {
		Recipient::Esi(index) => *i == index,
		Recipient::Bitmask => n.event.esi_bitmask & (1 << i) != 0
	});

	let mut sent = 0;

	for index in recipients {
		let entry = match esi.lookup_by_index(index) {
			Some(e) => *e,
			None => {
				warn!("event 0x{:08x} references empty esi slot {}", n.event.event_id, index);
				continue;
			}
		};

		if host.lookup_node_id(&entry.eui64) != Some(entry.node_id) {
			error!("esi slot {} node 0x{:04x} does not match the address table", index, entry.node_id);
			continue;
		}

		let report = n.event.report(n.status, host.current_time());

		info!("tx report event status eid 0x{:08x} status 0x{:02x} to 0x{:04x}", report.issuer_event_id, report.event_status, entry.node_id);

		let frame = ZclFrame::cluster_specific(DIRECTION_CLIENT_TO_SERVER, sequence, CMD_REPORT_EVENT_STATUS,
			Command::DrlcClient(DrlcClientCommand::ReportEventStatus(report)));
		let aps = ApsFrame::smart_energy(cluster::DEMAND_RESPONSE_LOAD_CONTROL, n.event.destination_endpoint, entry.endpoint);

		match send_zcl(host, entry.node_id, &aps, &frame) {
			Ok(()) => sent += 1,
			Err(e) => warn!("failed to send report event status to 0x{:04x}: {}", entry.node_id, e)
		}
	}

	sent
}
