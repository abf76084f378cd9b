use std::time::Duration;
use log::{ info, warn, error };
use smart_energy::SeDevice;
use crate::{
	cli,
	config::Config,
	error::Error,
	sim_host::{ SimHost, Pending },
	compat::{ channel::unbounded, task, io::stdin }
};

#[derive(Debug)]
pub enum NodeMessage {
	Tick, //scheduler resolution elapsed
	Line(String), //command line from stdin
	InputClosed
}

pub struct Node {
	host: SimHost,
	device: SeDevice,
	tick: Duration
}

impl Node {
	pub fn new(c: Config) -> Self {
		Self {
			host: SimHost::new(&c),
			device: SeDevice::new(&c.smart_energy),
			tick: c.tick()
		}
	}

	//delivers stack callbacks queued by the simulated stack
	fn process_pending(&mut self) {
		while let Some(p) = self.host.take_pending() {
			match p {
				Pending::Discovery(r) => self.device.on_service_discovery(&mut self.host, &r),
				Pending::KeyEstablishment(n) => self.device.on_key_establishment(&mut self.host, n),
				Pending::PartnerLinkKey(success) => self.device.on_partner_link_key(&mut self.host, success),
				Pending::Zcl { source, aps, payload } => {
					if let Err(e) = self.device.handle_zcl(&mut self.host, source, aps, &payload) {
						warn!("frame from 0x{:04x} dropped: {}", source, e);
					}
				}
			}
		}
	}

	fn run_due(&mut self) {
		for event in self.host.take_due() {
			self.device.on_scheduled(&mut self.host, event);
		}

		self.process_pending();
	}

	//main node's message loop

	pub async fn run(&mut self) -> Result<(), Error> {
		let (tx, rx) = unbounded();

		self.device.init(&mut self.host);

		if let Err(e) = self.device.start_registration(&mut self.host) {
			warn!("registration not started: {}", e);
		}

		self.process_pending();

		let txc = tx.clone();
		let tick = self.tick;

		task::spawn(async move {
			loop {
				task::sleep(tick).await;

				if txc.send(NodeMessage::Tick).await.is_err() {
					break;
				}
			}
		});

		task::spawn(async move {
			let input = stdin();
			let mut line = String::new();

			loop {
				line.clear();

				match input.read_line(&mut line).await {
					Ok(0) | Err(_) => {
						_ = tx.send(NodeMessage::InputClosed).await;
						break;
					},
					Ok(_) => {
						if tx.send(NodeMessage::Line(line.trim().to_string())).await.is_err() {
							break;
						}
					}
				}
			}
		});

		info!("node running, type help for commands");

		loop {
			let received = rx.recv().await?;

			match received {
				NodeMessage::Tick => self.run_due(),
				NodeMessage::Line(line) => {
					match cli::execute(&mut self.host, &mut self.device, &line) {
						Ok(true) => {},
						Ok(false) => break,
						Err(e) => error!("{}: {}", line, e)
					}

					self.process_pending();
				},
				NodeMessage::InputClosed => info!("stdin closed, commands disabled")
			}
		}

		Ok(())
	}
}
