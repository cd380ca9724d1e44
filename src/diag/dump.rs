//! Raw SDMAC register dump
//!
//! Reads every offset of the SDMAC block at each access width. Some reads
//! have side effects (reading SCMD advances the WD33C93 index), so the
//! index is put back afterwards and the whole capture runs with interrupts
//! masked.

use crate::error::AccessResult;
use crate::hal::bus::RegisterIo;
use crate::hal::critical::InterruptGuard;
use crate::hal::privilege::Privilege;
use crate::hal::window::Window;
use crate::internal::register::{Width, sdmac};

const LONGS: usize = (sdmac::BLOCK_LEN / 4) as usize;
const WORDS: usize = (sdmac::BLOCK_LEN / 2) as usize;
const BYTES: usize = sdmac::BLOCK_LEN as usize;

/// Snapshot of the SDMAC address block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDump {
    /// Longword reads at offsets 0x00, 0x04, ...
    pub longs: [u32; LONGS],
    /// Word reads at offsets 0x00, 0x02, ...
    pub words: [u16; WORDS],
    /// Byte reads at every offset
    pub bytes: [u8; BYTES],
}

impl RawDump {
    /// Capture the block
    pub fn capture<IO: RegisterIo, P: Privilege>(window: &mut Window<IO, P>) -> AccessResult<Self> {
        let _cs = InterruptGuard::acquire();
        let index = window.index()?;

        let mut dump = Self {
            longs: [0; LONGS],
            words: [0; WORDS],
            bytes: [0; BYTES],
        };
        let captured = dump.read_all(window);
        let restored = window.select_index(index);
        captured?;
        restored?;
        Ok(dump)
    }

    fn read_all<IO: RegisterIo, P: Privilege>(&mut self, window: &mut Window<IO, P>) -> AccessResult<()> {
        let bus = window.bus();
        for (i, slot) in self.longs.iter_mut().enumerate() {
            *slot = bus.read_raw(sdmac::BASE + 4 * i as u32, Width::Long)?;
        }
        for (i, slot) in self.words.iter_mut().enumerate() {
            *slot = bus.read_raw(sdmac::BASE + 2 * i as u32, Width::Word)? as u16;
        }
        for (i, slot) in self.bytes.iter_mut().enumerate() {
            *slot = bus.read_raw(sdmac::BASE + i as u32, Width::Byte)? as u8;
        }
        Ok(())
    }
}
