pub mod io {
	#[cfg(feature="async-std")]
	pub use async_std::{ io::{ stdin, Stdin } };
}

#[cfg(feature="async-std")]
pub mod channel {
	pub use async_std::{ channel::{ Sender, Receiver, unbounded, SendError, RecvError } };
}

#[cfg(feature="async-std")]
pub mod task {
	pub use async_std::{ task::{ self, spawn, sleep } };
}
