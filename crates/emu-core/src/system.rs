//! Host bus with a page-access table.
//!
//! The 6507 only brings out 13 address lines, so the system sees an 8K
//! space. It is split into 64-byte pages; each page is owned by at most one
//! device. Accesses to unowned pages float: reads return whatever was last
//! on the data bus.

use crate::{Bus, Device};

/// Mask applied to every address before decoding.
pub const ADDRESS_MASK: u16 = 0x1FFF;

/// Bytes per page-table entry.
pub const PAGE_SIZE: u16 = 64;

/// Number of page-table entries covering the 8K space.
pub const PAGE_COUNT: usize = (ADDRESS_MASK as usize + 1) / PAGE_SIZE as usize;

/// Handle to a device attached to a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(usize);

/// The host system bus.
pub struct System {
    devices: Vec<Box<dyn Device>>,
    pages: [Option<DeviceId>; PAGE_COUNT],
    /// Last value driven on the data bus, returned for unmapped reads.
    data_bus: u8,
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.devices.iter().map(|device| device.name()).collect();
        f.debug_struct("System")
            .field("devices", &names)
            .field("data_bus", &self.data_bus)
            .finish_non_exhaustive()
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            pages: [None; PAGE_COUNT],
            data_bus: 0,
        }
    }

    /// Take ownership of a device. It answers for no pages until
    /// [`install_page_access`](Self::install_page_access) is called.
    pub fn attach(&mut self, device: Box<dyn Device>) -> DeviceId {
        self.devices.push(device);
        DeviceId(self.devices.len() - 1)
    }

    /// Route every page in `start..end` to `device`, replacing any previous
    /// owner. Both bounds are rounded down to a page boundary; `end` may be
    /// `0x2000` to claim through the top of the space.
    pub fn install_page_access(&mut self, start: u16, end: u16, device: DeviceId) {
        let first = usize::from(start & ADDRESS_MASK) / usize::from(PAGE_SIZE);
        let last = (usize::from(end.min(ADDRESS_MASK + 1)) / usize::from(PAGE_SIZE)).min(PAGE_COUNT);
        for page in &mut self.pages[first..last.max(first)] {
            *page = Some(device);
        }
        log::debug!(
            "{} owns ${start:04X}-${:04X}",
            self.devices[device.0].name(),
            end.wrapping_sub(1)
        );
    }

    /// Which device owns `address`, if any.
    #[must_use]
    pub fn page_owner(&self, address: u16) -> Option<DeviceId> {
        self.pages[usize::from(address & ADDRESS_MASK) / usize::from(PAGE_SIZE)]
    }

    #[must_use]
    pub fn device(&self, id: DeviceId) -> &dyn Device {
        self.devices[id.0].as_ref()
    }

    pub fn device_mut(&mut self, id: DeviceId) -> &mut dyn Device {
        self.devices[id.0].as_mut()
    }

    /// Borrow an attached device as its concrete type.
    pub fn downcast_mut<T: Device + 'static>(&mut self, id: DeviceId) -> Option<&mut T> {
        self.devices
            .get_mut(id.0)
            .and_then(|device| device.as_any_mut().downcast_mut::<T>())
    }

    #[must_use]
    pub fn downcast_ref<T: Device + 'static>(&self, id: DeviceId) -> Option<&T> {
        self.devices
            .get(id.0)
            .and_then(|device| device.as_any().downcast_ref::<T>())
    }

    /// Patch the byte at `address` through its owning device.
    pub fn patch(&mut self, address: u16, value: u8) -> bool {
        match self.page_owner(address) {
            Some(id) => self.devices[id.0].patch(address & ADDRESS_MASK, value),
            None => false,
        }
    }

    /// Reset every attached device in attachment order.
    pub fn reset(&mut self) {
        self.data_bus = 0;
        for device in &mut self.devices {
            device.reset();
        }
    }
}

impl Bus for System {
    fn read(&mut self, address: u16) -> u8 {
        let address = address & ADDRESS_MASK;
        if let Some(id) = self.page_owner(address) {
            self.data_bus = self.devices[id.0].peek(address);
        } else {
            log::trace!("read from unmapped ${address:04X}");
        }
        self.data_bus
    }

    fn write(&mut self, address: u16, value: u8) {
        let address = address & ADDRESS_MASK;
        self.data_bus = value;
        match self.page_owner(address) {
            Some(id) => {
                self.devices[id.0].poke(address, value);
            }
            None => log::trace!("write ${value:02X} to unmapped ${address:04X}"),
        }
    }
}
