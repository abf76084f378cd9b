mod common;

use common::*;
use smart_energy::{
	DrlcError,
	drlc::event::LoadControlEvent,
	drlc_server::DrlcServer,
	host::{ ApsFrame, IncomingCommand }
};
use zigbee::{
	cluster,
	zcl::{ Command, GenericCommand, status, DIRECTION_CLIENT_TO_SERVER, DIRECTION_SERVER_TO_CLIENT },
	drlc::{ DrlcClientCommand, DrlcServerCommand, EventStatus, CMD_GET_SCHEDULED_EVENTS, CMD_REPORT_EVENT_STATUS }
};

fn event(event_id: u32, start_time: u32, duration: u16) -> LoadControlEvent {
	LoadControlEvent { event_id, start_time, duration, criticality_level: 1, device_class: 0x0fff, ..Default::default() }
}

fn from_client(command_id: u8) -> IncomingCommand {
	IncomingCommand {
		source: ESI_NODE,
		aps: ApsFrame::smart_energy(cluster::DEMAND_RESPONSE_LOAD_CONTROL, 5, LOCAL_ENDPOINT),
		sequence: 0x21,
		command_id,
		direction: DIRECTION_CLIENT_TO_SERVER
	}
}

fn sent_events(host: &mut MockHost) -> Vec<u32> {
	host.take_sent().iter().map(|s| match s.frame().command {
		Command::DrlcServer(DrlcServerCommand::LoadControlEvent(p)) => p.issuer_event_id,
		c => panic!("expected load control event, got {:?}", c)
	}).collect()
}

#[test]
fn start_now_is_projected_on_read() {
	let mut host = MockHost::new();
	let mut server = DrlcServer::<1, 2>::new();
	let now = host.time;

	server.set(&host, LOCAL_ENDPOINT, 0, event(1, 0, 60)).unwrap();

	let stored = server.entries(&host, LOCAL_ENDPOINT).unwrap()[0];
	assert!(stored.active);
	assert!(stored.start_now);
	assert_eq!(stored.event.start_time, now);

	host.time = now + 600;
	let e = server.get(&host, LOCAL_ENDPOINT, 0).unwrap();
	assert_eq!(e.start_time, 0);
	assert_eq!(e.duration, 50);

	//stored copy is untouched
	assert_eq!(server.entries(&host, LOCAL_ENDPOINT).unwrap()[0].event.duration, 60);

	host.time = now + 3600;
	let e = server.get(&host, LOCAL_ENDPOINT, 0).unwrap();
	assert_eq!(e.start_time, now);
	assert_eq!(e.duration, 60);
}

#[test]
fn explicit_start_is_kept() {
	let mut host = MockHost::new();
	let mut server = DrlcServer::<1, 2>::new();

	server.set(&host, LOCAL_ENDPOINT, 1, event(2, host.time - 60, 30)).unwrap();
	host.time += 120;

	let e = server.get(&host, LOCAL_ENDPOINT, 1).unwrap();
	assert_eq!(e.start_time, host.time - 180);
	assert_eq!(e.duration, 30);
	assert!(!server.entries(&host, LOCAL_ENDPOINT).unwrap()[1].start_now);
}

#[test]
fn bad_endpoint_and_index() {
	let mut host = MockHost::new();
	let mut server = DrlcServer::<1, 2>::new();

	assert_eq!(server.get(&host, 9, 0), Err(DrlcError::InvalidEndpoint(9)));
	assert_eq!(server.set(&host, LOCAL_ENDPOINT, 2, event(1, 0, 1)), Err(DrlcError::IndexOutOfRange(2)));

	//endpoint known to the host but beyond the table
	host.server_endpoints = vec![3, LOCAL_ENDPOINT];
	assert_eq!(server.clear_all(&host, LOCAL_ENDPOINT), Err(DrlcError::InvalidEndpoint(LOCAL_ENDPOINT)));
}

#[test]
fn get_scheduled_events_filters_and_limits() {
	let mut host = MockHost::new();
	let mut server = DrlcServer::<1, 2>::new();
	let now = host.time;

	server.set(&host, LOCAL_ENDPOINT, 0, event(10, now + 100, 30)).unwrap();
	server.set(&host, LOCAL_ENDPOINT, 1, event(11, now + 5000, 30)).unwrap();

	let get = |start_time, number_of_events| DrlcClientCommand::GetScheduledEvents { start_time, number_of_events };

	server.handle_command(&mut host, &from_client(CMD_GET_SCHEDULED_EVENTS), &get(0, 0)).unwrap();
	assert_eq!(sent_events(&mut host), vec![10, 11]);

	server.handle_command(&mut host, &from_client(CMD_GET_SCHEDULED_EVENTS), &get(0, 1)).unwrap();
	assert_eq!(sent_events(&mut host), vec![10]);

	server.handle_command(&mut host, &from_client(CMD_GET_SCHEDULED_EVENTS), &get(now + 1000, 0)).unwrap();

	let sent = host.take_sent();
	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].destination, ESI_NODE);
	assert_eq!(sent[0].aps.source_endpoint, LOCAL_ENDPOINT);
	assert_eq!(sent[0].aps.destination_endpoint, 5);

	let f = sent[0].frame();
	assert_eq!(f.control.direction, DIRECTION_SERVER_TO_CLIENT);
	match f.command {
		Command::DrlcServer(DrlcServerCommand::LoadControlEvent(p)) => assert_eq!(p.issuer_event_id, 11),
		c => panic!("unexpected {:?}", c)
	}
}

#[test]
fn get_scheduled_events_without_match_is_not_found() {
	let mut host = MockHost::new();
	let mut server = DrlcServer::<1, 2>::new();

	server.set(&host, LOCAL_ENDPOINT, 0, event(10, host.time + 100, 30)).unwrap();
	server.clear_all(&host, LOCAL_ENDPOINT).unwrap();

	server.handle_command(&mut host, &from_client(CMD_GET_SCHEDULED_EVENTS),
		&DrlcClientCommand::GetScheduledEvents { start_time: 0, number_of_events: 0 }).unwrap();

	let sent = host.take_sent();
	assert_eq!(sent.len(), 1);

	let f = sent[0].frame();
	assert_eq!(f.transaction_sequence_number, 0x21);
	assert_eq!(f.command, Command::Generic(GenericCommand::DefaultResponse {
		command_id: CMD_GET_SCHEDULED_EVENTS,
		status: status::NOT_FOUND
	}));
}

#[test]
fn report_event_status_is_acknowledged() {
	let mut host = MockHost::new();
	let server = DrlcServer::<1, 2>::new();
	let report = event(10, 0, 30).report(EventStatus::EventStarted, host.time);

	server.handle_command(&mut host, &from_client(CMD_REPORT_EVENT_STATUS), &DrlcClientCommand::ReportEventStatus(report)).unwrap();

	let sent = host.take_sent();
	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].frame().command, Command::Generic(GenericCommand::DefaultResponse {
		command_id: CMD_REPORT_EVENT_STATUS,
		status: status::SUCCESS
	}));
}

#[test]
fn send_load_control_event_uses_projection() {
	let mut host = MockHost::new();
	let mut server = DrlcServer::<1, 2>::new();

	server.set(&host, LOCAL_ENDPOINT, 0, event(12, 0, 10)).unwrap();
	host.time += 120;

	server.send_load_control_event(&mut host, ESI_NODE, LOCAL_ENDPOINT, 4, 0).unwrap();

	let sent = host.take_sent();
	assert_eq!(sent[0].aps.destination_endpoint, 4);

	match sent[0].frame().command {
		Command::DrlcServer(DrlcServerCommand::LoadControlEvent(p)) => {
			assert_eq!(p.start_time, 0);
			assert_eq!(p.duration_in_minutes, 8);
		},
		c => panic!("unexpected {:?}", c)
	}
}

#[test]
fn get_scheduled_events_sends_stored_event() {
	let mut host = MockHost::new();
	let mut server = DrlcServer::<1, 2>::new();
	let now = host.time;

	server.set(&host, LOCAL_ENDPOINT, 0, event(13, 0, 10)).unwrap();
	host.time += 120;

	server.handle_command(&mut host, &from_client(CMD_GET_SCHEDULED_EVENTS),
		&DrlcClientCommand::GetScheduledEvents { start_time: now, number_of_events: 0 }).unwrap();

	let sent = host.take_sent();
	assert_eq!(sent.len(), 1);

	match sent[0].frame().command {
		Command::DrlcServer(DrlcServerCommand::LoadControlEvent(p)) => {
			assert_eq!(p.start_time, now);
			assert_eq!(p.duration_in_minutes, 10);
		},
		c => panic!("unexpected {:?}", c)
	}
}
