//diagnostic commands read from stdin

use log::{ info };
use zigbee::{ NodeId, drlc::LoadControlEventPayload };
use smart_energy::{ SeDevice, drlc::event::LoadControlEvent, host::ApsFrame };
use crate::{ error::Error, sim_host::SimHost };

pub const HELP: &str = "\
drlc opt <in|out> <endpoint> <event id>
drlc print <endpoint>
drlc clear <endpoint>
drlc-server slce <endpoint> <index> <23 event bytes as hex>
drlc-server sslce <node id> <src endpoint> <dst endpoint> <index>
drlc-server cslce <endpoint>
drlc-server print <endpoint>
esi print
reg start
reg print
rx <node id> <src endpoint> <dst endpoint> <cluster> <zcl frame as hex>
quit";

/// Accepts decimal or 0x prefixed hex.
fn number<T: TryFrom<u64>>(args: &[&str], i: usize) -> Result<T, Error> {
	let s = args.get(i).ok_or(Error::Str("missing argument"))?;

	let n = match s.strip_prefix("0x") {
		Some(h) => u64::from_str_radix(h, 16)?,
		None => s.parse::<u64>()?
	};

	T::try_from(n).map_err(|_| Error::String(format!("argument {} out of range", s)))
}

fn print_json<T: serde::Serialize>(label: &str, value: &T) -> Result<(), Error> {
	println!("{}: {}", label, serde_json::to_string_pretty(value)?);
	Ok(())
}

fn drlc(host: &mut SimHost, device: &mut SeDevice, args: &[&str]) -> Result<(), Error> {
	match args.first().copied() {
		Some("opt") => {
			let opt_in = match args.get(1).copied() {
				Some("in") => true,
				Some("out") => false,
				_ => return Err(Error::Str("expected in or out"))
			};
			let endpoint: u8 = number(args, 2)?;
			let event_id: u32 = number(args, 3)?;

			if !device.opt_in_or_out(host, endpoint, event_id, opt_in) {
				println!("no event 0x{:08x} on endpoint {}", event_id, endpoint);
			}
		},
		Some("print") => {
			let endpoint: u8 = number(args, 1)?;

			match device.drlc.table(host, endpoint) {
				Some(t) => print_json(&format!("drlc table on endpoint {}", endpoint), &t.entries())?,
				None => println!("no drlc client on endpoint {}", endpoint)
			}
		},
		Some("clear") => {
			let endpoint: u8 = number(args, 1)?;

			device.drlc.clear(host, endpoint);
			info!("drlc table on endpoint {} cleared", endpoint);
		},
		_ => return Err(Error::Str("unknown drlc command"))
	}

	Ok(())
}

fn drlc_server(host: &mut SimHost, device: &mut SeDevice, args: &[&str]) -> Result<(), Error> {
	match args.first().copied() {
		Some("slce") => {
			let endpoint: u8 = number(args, 1)?;
			let index: usize = number(args, 2)?;
			let bytes = hex::decode(args.get(3).ok_or(Error::Str("missing event bytes"))?)?;

			if bytes.len() != LoadControlEventPayload::SIZE {
				return Err(Error::String(format!("event is {} bytes, expected {}", bytes.len(), LoadControlEventPayload::SIZE)));
			}

			let payload = LoadControlEventPayload::try_from(&bytes[..]).map_err(zigbee::Error::from)?;

			device.drlc_server.set(host, endpoint, index, LoadControlEvent::from_payload(&payload))?;
			info!("drlc event 0x{:08x} stored on server endpoint {} index {}", payload.issuer_event_id, endpoint, index);
		},
		Some("sslce") => {
			let node: NodeId = number(args, 1)?;
			let source_endpoint: u8 = number(args, 2)?;
			let destination_endpoint: u8 = number(args, 3)?;
			let index: usize = number(args, 4)?;

			device.drlc_server.send_load_control_event(host, node, source_endpoint, destination_endpoint, index)?;
		},
		Some("cslce") => {
			let endpoint: u8 = number(args, 1)?;

			device.drlc_server.clear_all(host, endpoint)?;
		},
		Some("print") => {
			let endpoint: u8 = number(args, 1)?;

			print_json(&format!("drlc server table on endpoint {}", endpoint), &device.drlc_server.entries(host, endpoint)?)?;
		},
		_ => return Err(Error::Str("unknown drlc-server command"))
	}

	Ok(())
}

/// Runs one command line. Returns `false` when the node should stop.
pub fn execute(host: &mut SimHost, device: &mut SeDevice, line: &str) -> Result<bool, Error> {
	let words: Vec<&str> = line.split_whitespace().collect();

	let (command, args) = match words.split_first() {
		Some((c, a)) => (*c, a),
		None => return Ok(true)
	};

	match command {
		"drlc" => drlc(host, device, args)?,
		"drlc-server" => drlc_server(host, device, args)?,
		"esi" => print_json("esi table", &device.esi.entries())?,
		"reg" => match args.first().copied() {
			Some("start") => {
				if let Err(e) = device.start_registration(host) {
					println!("registration not started: {}", e);
				}
			},
			Some("print") => {
				println!("registration {:?}, {} errors", device.registration.state(), device.registration.errors());
				print_json("time source", device.registration.time_source())?;
				println!("keepalive {:?}, {} failures", device.keepalive.state(), device.keepalive.failures());
			},
			_ => return Err(Error::Str("unknown reg command"))
		},
		"rx" => {
			let source: NodeId = number(args, 0)?;
			let source_endpoint: u8 = number(args, 1)?;
			let destination_endpoint: u8 = number(args, 2)?;
			let cluster: u16 = number(args, 3)?;
			let payload = hex::decode(args.get(4).ok_or(Error::Str("missing frame"))?)?;

			host.inject(source, ApsFrame::smart_energy(cluster, source_endpoint, destination_endpoint), payload);
		},
		"help" => println!("{}", HELP),
		"quit" => return Ok(false),
		c => println!("unknown command {}, try help", c)
	}

	Ok(true)
}

#[cfg(test)]
mod tests {
	use super::*;
	use smart_energy::host::Host;
	use crate::config::Config;

	fn setup() -> (SimHost, SeDevice) {
		let c: Config = serde_json::from_str(include_str!("../config.json")).unwrap();
		let mut host = SimHost::new(&c);
		let mut device = SeDevice::new(&c.smart_energy);

		device.init(&mut host);
		(host, device)
	}

	#[test]
	fn numbers_in_both_radixes() {
		assert_eq!(number::<u16>(&["0x1a2b"], 0).unwrap(), 0x1a2b);
		assert_eq!(number::<u8>(&["17"], 0).unwrap(), 17);
		assert!(number::<u8>(&["300"], 0).is_err());
		assert!(number::<u8>(&[], 0).is_err());
	}

	#[test]
	fn slce_stores_event_on_server() {
		let (mut host, mut device) = setup();

		//one byte short
		assert!(execute(&mut host, &mut device, "drlc-server slce 1 0 ab000000ff0f00000000000a00010000000000000000").is_err());
		assert!(execute(&mut host, &mut device, "drlc-server slce 1 2 ab000000ff0f00000000000a0001000000000000000000").is_err());

		execute(&mut host, &mut device, "drlc-server slce 1 1 ab000000ff0f00000000000a0001000000000000000000").unwrap();

		let e = device.drlc_server.get(&host, 1, 1).unwrap();
		assert_eq!(e.event_id, 0xab);
		assert_eq!(e.device_class, 0x0fff);
		assert_eq!(e.duration, 10);
		assert_eq!(e.start_time, 0);

		execute(&mut host, &mut device, "drlc-server cslce 1").unwrap();
		assert!(!device.drlc_server.entries(&host, 1).unwrap()[1].active);
	}

	#[test]
	fn rx_injects_frame() {
		let (mut host, mut device) = setup();
		let now = host.current_time();

		assert!(execute(&mut host, &mut device, "rx 0x1234 1 1 0x0701 09050078563412ffff00000000000a0001000000000000000000").unwrap());

		match host.take_pending() {
			Some(crate::sim_host::Pending::Zcl { source, aps, payload }) => {
				assert_eq!(source, 0x1234);
				assert_eq!(aps.cluster_id, 0x0701);
				device.handle_zcl(&mut host, source, aps, &payload).unwrap();
			},
			p => panic!("unexpected {:?}", p)
		}

		let table = device.drlc.table(&host, 1).unwrap();
		assert_eq!(table.entries()[0].event.event_id, 0x12345678);
		assert!(table.entries()[0].event.start_time >= now);
	}

	#[test]
	fn quit_stops_and_blank_is_ignored() {
		let (mut host, mut device) = setup();

		assert!(execute(&mut host, &mut device, "   ").unwrap());
		assert!(!execute(&mut host, &mut device, "quit").unwrap());
		assert!(execute(&mut host, &mut device, "drlc bogus").is_err());
	}
}
