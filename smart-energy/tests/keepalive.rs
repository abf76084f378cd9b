mod common;

use common::*;
use smart_energy::{
	SeDevice,
	config::{ SmartEnergyConfig, KeepaliveConfig },
	host::{ ApsFrame, ScheduledEvent, LinkKey },
	keepalive::{ Keepalive, KeepaliveState, WAIT_TIME_MS }
};
use zigbee::{
	cluster,
	TRUST_CENTER_NODE_ID,
	zcl::{ ZclFrame, Command, GenericCommand, ReadAttributeRecord, AttributeValue, attribute, DIRECTION_SERVER_TO_CLIENT }
};

const TC_ENDPOINT: u8 = 2;
const INTERVAL: u32 = 1_200_000;

fn started(host: &mut MockHost) -> Keepalive {
	let mut k = Keepalive::new(KeepaliveConfig::default());

	k.update(host, true, TC_ENDPOINT);
	k
}

fn timeout(host: &mut MockHost, k: &mut Keepalive) {
	assert_eq!(host.delay_of(ScheduledEvent::Keepalive), Some(WAIT_TIME_MS));
	k.on_tick(host, TC_ENDPOINT);
}

fn resend(host: &mut MockHost, k: &mut Keepalive) {
	assert_eq!(host.delay_of(ScheduledEvent::Keepalive), Some(INTERVAL));
	k.on_tick(host, TC_ENDPOINT);
}

#[test]
fn start_reads_key_establishment_suite() {
	let mut host = MockHost::new();
	let k = started(&mut host);

	assert_eq!(k.state(), KeepaliveState::SendKeepaliveSignal);
	assert_eq!(host.delay_of(ScheduledEvent::Keepalive), Some(WAIT_TIME_MS));

	let sent = host.take_sent();
	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].destination, TRUST_CENTER_NODE_ID);
	assert_eq!(sent[0].aps.source_endpoint, LOCAL_ENDPOINT);
	assert_eq!(sent[0].aps.destination_endpoint, TC_ENDPOINT);
	assert_eq!(sent[0].frame().command, Command::Generic(GenericCommand::ReadAttributes {
		identifiers: vec![attribute::KEY_ESTABLISHMENT_SUITE]
	}));
}

#[test]
fn acknowledgement_resets_failures() {
	let mut host = MockHost::new();
	let mut device = SeDevice::new(&SmartEnergyConfig::default());

	device.keepalive.update(&mut host, true, TC_ENDPOINT);
	device.on_scheduled(&mut host, ScheduledEvent::Keepalive);
	assert_eq!(device.keepalive.failures(), 1);

	device.on_scheduled(&mut host, ScheduledEvent::Keepalive);
	host.take_sent();

	let response = ZclFrame::global(DIRECTION_SERVER_TO_CLIENT, 3, GenericCommand::ReadAttributesResponse {
		values: vec![ReadAttributeRecord {
			identifier: attribute::KEY_ESTABLISHMENT_SUITE,
			status: 0,
			data: Some(AttributeValue::Map16 { val: 0x0001 })
		}]
	}).to_bytes().unwrap();

	//only the trust center counts
	device.handle_zcl(&mut host, ESI_NODE, ApsFrame::smart_energy(cluster::KEY_ESTABLISHMENT, TC_ENDPOINT, LOCAL_ENDPOINT), &response).unwrap();
	assert_eq!(device.keepalive.failures(), 1);
	assert_eq!(host.delay_of(ScheduledEvent::Keepalive), Some(WAIT_TIME_MS));

	device.handle_zcl(&mut host, TRUST_CENTER_NODE_ID, ApsFrame::smart_energy(cluster::KEY_ESTABLISHMENT, TC_ENDPOINT, LOCAL_ENDPOINT), &response).unwrap();
	assert_eq!(device.keepalive.failures(), 0);
	assert_eq!(host.delay_of(ScheduledEvent::Keepalive), Some(INTERVAL));

	//answered, so the next tick sends instead of timing out
	device.on_scheduled(&mut host, ScheduledEvent::Keepalive);
	assert_eq!(device.keepalive.failures(), 0);
	assert_eq!(host.take_sent().len(), 1);
}

#[test]
fn failure_limit_starts_trust_center_search() {
	let mut host = MockHost::new();
	let mut k = started(&mut host);

	timeout(&mut host, &mut k);
	resend(&mut host, &mut k);
	timeout(&mut host, &mut k);
	resend(&mut host, &mut k);
	assert_eq!(k.failures(), 2);
	assert_eq!(host.rejoins, 0);

	timeout(&mut host, &mut k);

	assert_eq!(k.state(), KeepaliveState::InitiateTrustCenterSearch);
	assert_eq!(host.rejoins, 1);
	assert!(!host.writing_tokens);
	assert!(host.delay_of(ScheduledEvent::Keepalive).is_none());
	assert_eq!(host.take_sent().len(), 3);
}

#[test]
fn failed_rejoin_resumes_token_writing() {
	let mut host = MockHost::new();
	let mut k = Keepalive::new(KeepaliveConfig { failure_limit: 1, ..Default::default() });

	host.fail_rejoin = true;
	k.update(&mut host, true, TC_ENDPOINT);
	timeout(&mut host, &mut k);

	assert_eq!(k.state(), KeepaliveState::SendKeepaliveSignal);
	assert!(host.writing_tokens);
	assert_eq!(host.rejoins, 0);
}

#[test]
fn registration_after_search_with_unauthorized_key_reboots() {
	let mut host = MockHost::new();
	let mut k = Keepalive::new(KeepaliveConfig { failure_limit: 1, ..Default::default() });

	k.update(&mut host, true, TC_ENDPOINT);
	timeout(&mut host, &mut k);
	assert_eq!(k.state(), KeepaliveState::InitiateTrustCenterSearch);

	k.update(&mut host, true, TC_ENDPOINT);

	assert_eq!(host.reboots, 1);
	assert_eq!(k.state(), KeepaliveState::SendKeepaliveSignal);
	assert_eq!(host.delay_of(ScheduledEvent::Keepalive), Some(INTERVAL));
	assert!(host.writing_tokens);
}

#[test]
fn registration_after_search_with_authorized_key_resumes() {
	let mut host = MockHost::new();
	let mut k = Keepalive::new(KeepaliveConfig { failure_limit: 1, ..Default::default() });

	k.update(&mut host, true, TC_ENDPOINT);
	timeout(&mut host, &mut k);

	host.link_key = Ok(LinkKey { authorized: true });
	k.update(&mut host, true, TC_ENDPOINT);

	assert_eq!(host.reboots, 0);
	assert_eq!(k.state(), KeepaliveState::SendKeepaliveSignal);
	assert!(host.writing_tokens);
}

#[test]
fn failed_registration_is_ignored() {
	let mut host = MockHost::new();
	let mut k = Keepalive::new(KeepaliveConfig::default());

	k.update(&mut host, false, TC_ENDPOINT);

	assert_eq!(k.state(), KeepaliveState::Initial);
	assert!(host.sent.is_empty());
	assert!(host.delay_of(ScheduledEvent::Keepalive).is_none());
}

#[test]
fn trust_center_does_not_keep_itself_alive() {
	let mut host = MockHost::new();

	host.node_id = TRUST_CENTER_NODE_ID;
	let k = started(&mut host);

	assert_eq!(k.state(), KeepaliveState::Initial);
	assert!(host.sent.is_empty());
}

#[test]
fn failed_send_waits_full_interval() {
	let mut host = MockHost::new();

	host.fail_send = true;
	let mut k = started(&mut host);

	assert_eq!(host.delay_of(ScheduledEvent::Keepalive), Some(INTERVAL));

	host.fail_send = false;
	k.on_tick(&mut host, TC_ENDPOINT);

	assert_eq!(k.failures(), 0);
	assert_eq!(host.take_sent().len(), 1);
	assert_eq!(host.delay_of(ScheduledEvent::Keepalive), Some(WAIT_TIME_MS));
}

#[test]
fn abort_cancels_pending_signal() {
	let mut host = MockHost::new();
	let mut k = started(&mut host);

	k.abort(&mut host);

	assert_eq!(k.state(), KeepaliveState::Initial);
	assert!(host.delay_of(ScheduledEvent::Keepalive).is_none());
}
