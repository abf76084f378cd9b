use std::env::args;

pub mod compat;
pub mod config;
pub mod error;
pub mod sim_host;
pub mod cli;
pub mod node;

use crate::{ config::Config, error::Error, node::Node };
use std::fs;

#[cfg_attr(feature = "async-std", async_std::main)]
async fn main() -> Result<(), Error> {

	let config = match args().nth(1) {
		None => "./config.json".to_string(),
		Some(s) => s
	};

	let data = fs::read_to_string(&config)?;

	match serde_json::from_str::<Config>(&data) {
		Ok(c) => {
			env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(c.log_level())).init();

			let mut node = Node::new(c);

			//main loop
			node.run().await?;
		},
		Err(e) => {
			eprintln!("Bad config file {}: {}", config, e);
		}
	}

	Ok(())
}
