//energy service interface table

use log::{ debug, warn };
use serde::{ Serialize };
use zigbee::{ NodeId, Eui64, NULL_NODE_ID };
use crate::host::Host;

/// Entries at least this old may be evicted when the table is full.
pub const MIN_ERASING_AGE: u8 = 3;
pub const SUBSCRIBER_CAPACITY: usize = 5;
pub const DEFAULT_TABLE_SIZE: usize = 3;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct EsiEntry {
	pub eui64: Eui64,
	pub node_id: NodeId,
	pub network_index: u8,
	pub endpoint: u8,
	pub age: u8
}

impl EsiEntry {
	pub const EMPTY: Self = Self {
		eui64: [0; 8],
		node_id: NULL_NODE_ID,
		network_index: 0,
		endpoint: 0,
		age: 0
	};

	pub fn is_active(&self) -> bool {
		self.node_id != NULL_NODE_ID
	}
}

impl Default for EsiEntry {
	fn default() -> Self {
		Self::EMPTY
	}
}

/// Called with the slot index before a slot is handed out again.
pub type DeletionCallback<C> = fn(&mut C, u8);

/// Fixed table of known ESIs. Slot indexes are used as bit positions in
/// event bitmasks elsewhere, so `N` cannot exceed 32.
pub struct EsiTable<C, const N: usize = DEFAULT_TABLE_SIZE> {
	entries: [EsiEntry; N],
	subscribers: [Option<DeletionCallback<C>>; SUBSCRIBER_CAPACITY]
}

impl<C, const N: usize> EsiTable<C, N> {
	const FITS_BITMASK: () = assert!(N <= 32, "esi table larger than the event bitmask");

	pub fn new() -> Self {
		let () = Self::FITS_BITMASK;

		Self {
			entries: [EsiEntry::EMPTY; N],
			subscribers: [None; SUBSCRIBER_CAPACITY]
		}
	}

	pub fn capacity(&self) -> usize {
		N
	}

	pub fn entries(&self) -> &[EsiEntry] {
		&self.entries
	}

	/// Raw slot access, active or not.
	pub fn entry(&self, index: u8) -> Option<&EsiEntry> {
		self.entries.get(index as usize)
	}

	pub fn entry_mut(&mut self, index: u8) -> Option<&mut EsiEntry> {
		self.entries.get_mut(index as usize)
	}

	/// Returns false once every subscriber slot is taken.
	pub fn subscribe(&mut self, callback: DeletionCallback<C>) -> bool {
		match self.subscribers.iter_mut().find(|s| s.is_none()) {
			Some(slot) => {
				*slot = Some(callback);
				true
			},
			None => false
		}
	}

	fn announce_deletion(&self, ctx: &mut C, index: u8) {
		for callback in self.subscribers.iter().flatten() {
			callback(ctx, index);
		}
	}

	/// Picks an empty slot, or evicts the oldest entry of `network` that reached
	/// `MIN_ERASING_AGE`. The slot is announced as deleted but left for the caller to fill.
	pub fn get_free_entry(&mut self, network: u8, ctx: &mut C) -> Option<u8> {
		if let Some(i) = self.entries.iter().position(|e| !e.is_active()) {
			return Some(i as u8);
		}

		let mut oldest: Option<usize> = None;

		for (i, e) in self.entries.iter().enumerate() {
			if e.network_index == network && e.age >= MIN_ERASING_AGE {
				match oldest {
					Some(o) if self.entries[o].age >= e.age => {},
					_ => oldest = Some(i)
				}
			}
		}

		let index = oldest? as u8;

		debug!("evicting esi slot {} (node 0x{:04x}, age {})", index, self.entries[index as usize].node_id, self.entries[index as usize].age);
		self.announce_deletion(ctx, index);

		Some(index)
	}

	pub fn lookup_by_short_id(&self, node_id: NodeId, endpoint: u8, network: u8) -> Option<u8> {
		self.entries.iter()
			.position(|e| e.network_index == network && e.node_id == node_id && e.endpoint == endpoint)
			.map(|i| i as u8)
	}

	pub fn lookup_by_long_id(&self, eui64: &Eui64, endpoint: u8) -> Option<u8> {
		self.entries.iter()
			.position(|e| e.eui64 == *eui64 && e.endpoint == endpoint)
			.map(|i| i as u8)
	}

	pub fn lookup_by_index(&self, index: u8) -> Option<&EsiEntry> {
		self.entries.get(index as usize).filter(|e| e.is_active())
	}

	/// Next active entry of `network` after `prev` whose age is at most `max_age`.
	pub fn get_next_entry(&self, prev: Option<u8>, max_age: u8, network: u8) -> Option<u8> {
		let start = match prev {
			Some(p) => p as usize + 1,
			None => 0
		};

		self.entries.iter()
			.enumerate()
			.skip(start)
			.find(|(_, e)| e.is_active() && e.network_index == network && e.age <= max_age)
			.map(|(i, _)| i as u8)
	}

	pub fn delete_entry(&mut self, index: u8, ctx: &mut C) {
		if let Some(e) = self.entries.get_mut(index as usize) {
			e.node_id = NULL_NODE_ID;
			self.announce_deletion(ctx, index);
		}
	}

	pub fn age_all_entries(&mut self, network: u8) {
		for e in self.entries.iter_mut() {
			if e.is_active() && e.network_index == network && e.age < 0xff {
				e.age += 1;
			}
		}
	}

	pub fn clear(&mut self, ctx: &mut C) {
		for i in 0..N {
			self.delete_entry(i as u8, ctx);
		}
	}

	/// Finds or creates the entry of the sender of an incoming command and
	/// returns its slot, `None` if the sender is unknown or the table is full.
	pub fn update_esi_and_get_index<H: Host>(&mut self, host: &H, source: NodeId, source_endpoint: u8, ctx: &mut C) -> Option<u8> {
		let network = host.current_network();

		let eui64 = match host.lookup_eui64(source) {
			Some(eui64) => eui64,
			None => {
				warn!("no eui64 known for esi 0x{:04x}", source);
				return None;
			}
		};

		match self.lookup_by_long_id(&eui64, source_endpoint) {
			Some(index) => {
				let e = &mut self.entries[index as usize];

				if e.node_id != source {
					debug!("esi short id changed 0x{:04x} -> 0x{:04x}", e.node_id, source);
					e.node_id = source;
				}

				Some(index)
			},
			None => {
				debug!("source esi 0x{:04x} not found in table", source);

				let index = match self.get_free_entry(network, ctx) {
					Some(i) => i,
					None => {
						debug!("no free esi entry available");
						return None;
					}
				};

				self.entries[index as usize] = EsiEntry {
					eui64,
					node_id: source,
					network_index: network,
					endpoint: source_endpoint,
					age: 0
				};

				Some(index)
			}
		}
	}
}

impl<C, const N: usize> Default for EsiTable<C, N> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Default)]
	struct Deleted(Vec<u8>);

	fn record(d: &mut Deleted, index: u8) {
		d.0.push(index);
	}

	fn fill(table: &mut EsiTable<Deleted, 3>) {
		for i in 0..3u8 {
			*table.entry_mut(i).unwrap() = EsiEntry {
				eui64: [i + 1; 8],
				node_id: 0x1000 + i as u16,
				network_index: 0,
				endpoint: 1,
				age: 0
			};
		}
	}

	#[test]
	fn free_slot_before_eviction() {
		let mut t = EsiTable::<Deleted, 3>::new();
		let mut d = Deleted::default();

		assert!(t.subscribe(record));
		assert_eq!(t.get_free_entry(0, &mut d), Some(0));
		assert!(d.0.is_empty());
	}

	#[test]
	fn evicts_oldest_eligible_entry() {
		let mut t = EsiTable::<Deleted, 3>::new();
		let mut d = Deleted::default();

		t.subscribe(record);
		fill(&mut t);

		//too young, nothing to evict
		assert_eq!(t.get_free_entry(0, &mut d), None);

		t.entry_mut(0).unwrap().age = 4;
		t.entry_mut(1).unwrap().age = 7;
		t.entry_mut(2).unwrap().age = 7;

		assert_eq!(t.get_free_entry(0, &mut d), Some(1));
		assert_eq!(d.0, vec![1]);

		//other network is never evicted
		assert_eq!(t.get_free_entry(1, &mut d), None);
		assert_eq!(d.0.len(), 1);
	}

	#[test]
	fn aging_saturates() {
		let mut t = EsiTable::<Deleted, 3>::new();

		fill(&mut t);
		t.entry_mut(2).unwrap().age = 0xfe;

		t.age_all_entries(0);
		t.age_all_entries(0);

		assert_eq!(t.entry(0).unwrap().age, 2);
		assert_eq!(t.entry(2).unwrap().age, 0xff);
	}

	#[test]
	fn next_entry_skips_old_and_inactive() {
		let mut t = EsiTable::<Deleted, 3>::new();
		let mut d = Deleted::default();

		fill(&mut t);
		t.entry_mut(1).unwrap().age = 1;

		assert_eq!(t.get_next_entry(None, 0, 0), Some(0));
		assert_eq!(t.get_next_entry(Some(0), 0, 0), Some(2));
		assert_eq!(t.get_next_entry(Some(2), 0, 0), None);

		t.delete_entry(0, &mut d);

		assert_eq!(t.get_next_entry(None, 0, 0), Some(2));
		assert!(t.lookup_by_index(0).is_none());
		assert_eq!(t.lookup_by_short_id(0x1002, 1, 0), Some(2));
		assert_eq!(t.lookup_by_short_id(0x1002, 2, 0), None);
	}

	#[test]
	fn short_id_lookup_compares_address_fields_only() {
		let mut t = EsiTable::<Deleted, 3>::new();
		let mut d = Deleted::default();

		fill(&mut t);
		t.delete_entry(1, &mut d);

		assert_eq!(t.lookup_by_short_id(0x1001, 1, 0), None);
		assert_eq!(t.lookup_by_short_id(NULL_NODE_ID, 1, 0), Some(1));
		assert_eq!(t.lookup_by_short_id(0x1000, 1, 1), None);
	}

	#[test]
	fn subscriber_capacity() {
		let mut t = EsiTable::<Deleted, 3>::new();

		for _ in 0..SUBSCRIBER_CAPACITY {
			assert!(t.subscribe(record));
		}

		assert!(!t.subscribe(record));
	}

	#[test]
	fn clear_announces_every_slot() {
		let mut t = EsiTable::<Deleted, 3>::new();
		let mut d = Deleted::default();

		t.subscribe(record);
		fill(&mut t);
		t.clear(&mut d);

		assert_eq!(d.0, vec![0, 1, 2]);
		assert!(t.entries().iter().all(|e| !e.is_active()));
	}
}
