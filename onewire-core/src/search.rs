use crate::{ONEWIRE_SEARCH_CMD, OneWire, OneWireResult, OneWireStatus, RomCode, crc8};

/// A structure for searching devices on a 1-Wire bus.
/// This structure implements the search algorithm for discovering devices on the 1-Wire bus.
/// It holds the state of one search: the discrepancy cursor and the ROM buffer carried from one
/// pass to the next. Create a new value for every search.
pub struct OneWireSearch<'a, T> {
    onewire: &'a mut T,
    /// 1-based bit number of the highest discrepancy where the 0 branch was taken last pass.
    /// Zero means no branch is left to explore.
    last_discrepancy: u8,
    finished: bool,
    family: u8,
    passes: usize,
    rom: [u8; 8],
}

enum Pass {
    Found(RomCode),
    Discarded,
    Ended,
}

impl<T> core::fmt::Debug for OneWireSearch<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OneWireSearch")
            .field("last_discrepancy", &self.last_discrepancy)
            .field("finished", &self.finished)
            .field("family", &self.family)
            .field("passes", &self.passes)
            .field("rom", &self.rom)
            .finish()
    }
}

impl<'a, T> OneWireSearch<'a, T> {
    /// Creates a new [`OneWireSearch`] over every device on the bus.
    ///
    /// # Arguments
    /// * `onewire` - A mutable reference to a type that implements the `OneWire` trait.
    pub fn new(onewire: &'a mut T) -> Self {
        Self {
            onewire,
            last_discrepancy: 0,
            finished: false,
            family: 0,
            passes: 0,
            rom: [0; 8],
        }
    }

    /// Creates a new [`OneWireSearch`] that only reports devices of the given family.
    ///
    /// The first pass is steered straight to the lowest code with that family byte and the search
    /// ends at the first code of another family.
    pub fn with_family(onewire: &'a mut T, family: u8) -> Self {
        let mut search = Self::new(onewire);
        search.family = family;
        search.target(family);
        search
    }

    /// Number of Search ROM passes issued so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    fn target(&mut self, family: u8) {
        self.rom = [family, 0, 0, 0, 0, 0, 0, 0];
        self.last_discrepancy = if family != 0 { RomCode::BITS } else { 0 };
        self.finished = false;
    }
}

impl<T: OneWire> OneWireSearch<'_, T> {
    /// Searches for the next device on the 1-Wire bus.
    /// This method implements the [1-Wire search algorithm](https://www.analog.com/en/resources/app-notes/1wire-search-algorithm.html).
    /// Call it repeatedly to walk every device; devices come out in ascending order of their
    /// bit pattern, least significant bit first. It returns `None` once no branch is left, when
    /// no device answers the reset pulse, or when a pass reads no response at all. Passes whose
    /// ROM fails the CRC check are skipped.
    ///
    /// # Errors
    /// Only transport errors are returned; an empty bus is a finished search.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> OneWireResult<Option<RomCode>, T::BusError> {
        while !self.finished {
            match self.pass()? {
                Pass::Found(rom) if self.family != 0 && rom.family() != self.family => {
                    self.finished = true;
                }
                Pass::Found(rom) => return Ok(Some(rom)),
                Pass::Discarded => {}
                Pass::Ended => self.finished = true,
            }
        }
        Ok(None)
    }

    /// Verifies that the device with the given ROM code is present on the 1-Wire bus.
    ///
    /// Runs a single pass that follows `rom` at every discrepancy. The search state is reset
    /// afterwards, so calling [next](OneWireSearch::next) starts a new search.
    pub fn verify(&mut self, rom: &RomCode) -> OneWireResult<bool, T::BusError> {
        self.rom = *rom.as_bytes();
        self.last_discrepancy = RomCode::BITS;
        self.finished = false;
        let res = self.pass();
        let family = self.family;
        self.target(family);
        Ok(matches!(res?, Pass::Found(found) if found == *rom))
    }

    fn pass(&mut self) -> OneWireResult<Pass, T::BusError> {
        let status = self.onewire.reset()?;
        if !status.presence() {
            log::debug!("search: no presence pulse, ending search");
            return Ok(Pass::Ended);
        }
        self.onewire.enter_data_mode()?;
        self.onewire.write_byte(ONEWIRE_SEARCH_CMD)?;
        self.passes += 1;

        let mut last_zero = 0;
        for id_bit_number in 1..=RomCode::BITS {
            let idx = ((id_bit_number - 1) / 8) as usize;
            let rom_mask = 1u8 << ((id_bit_number - 1) % 8);

            let id_bit = self.onewire.read_bit()?;
            let complement_bit = self.onewire.read_bit()?;
            let dir = match (id_bit, complement_bit) {
                (true, true) => {
                    log::debug!("search: no response at bit {id_bit_number}, ending search");
                    return Ok(Pass::Ended);
                }
                (false, false) => {
                    // devices disagree
                    let dir = if id_bit_number == self.last_discrepancy {
                        true
                    } else if id_bit_number > self.last_discrepancy {
                        false
                    } else {
                        self.rom[idx] & rom_mask != 0
                    };
                    if !dir {
                        last_zero = id_bit_number;
                    }
                    dir
                }
                (bit, _) => bit,
            };
            if dir {
                self.rom[idx] |= rom_mask;
            } else {
                self.rom[idx] &= !rom_mask;
            }
            self.onewire.write_bit(dir)?;
        }

        self.last_discrepancy = last_zero;
        self.finished = last_zero == 0;
        let rom = RomCode::new(self.rom);
        log::debug!(
            "search: pass {} read {rom}, next branch at bit {last_zero}",
            self.passes
        );
        // no device has family code 0; a line held low reads as all zeros with a valid CRC
        if self.rom[0] == 0 {
            log::warn!("search: read family code 0, line stuck low, ending search");
            return Ok(Pass::Ended);
        }
        if crc8(&self.rom) != 0 {
            log::warn!("search: discarding {rom}, CRC mismatch");
            return Ok(Pass::Discarded);
        }
        Ok(Pass::Found(rom))
    }
}

/// Collects the ROM codes of every device on the bus, in search order.
///
/// An empty bus yields an empty list. Codes found before a pass is cut short by a missing
/// presence pulse or an unanswered bit are kept.
#[cfg(feature = "alloc")]
pub fn discover<T: OneWire>(
    onewire: &mut T,
) -> OneWireResult<alloc::vec::Vec<RomCode>, T::BusError> {
    let mut search = OneWireSearch::new(onewire);
    let mut roms = alloc::vec::Vec::new();
    while let Some(rom) = search.next()? {
        roms.push(rom);
    }
    log::debug!(
        "search: found {} device(s) in {} pass(es)",
        roms.len(),
        search.passes()
    );
    Ok(roms)
}
