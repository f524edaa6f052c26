//! Mailbox control words.
//!
//! `command` is written only by the Controller, `status` only by the
//! Responder. The encodings are deliberately sparse so that a torn or
//! zero-initialised word never decodes as a valid state.

/// Controller → Responder command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    /// No packet outstanding
    Idle = 0x0000_0000,
    /// A packet is in the payload area, `size` and `sender_ts` are valid
    Process = 0x1234_5678,
    /// Terminal: flush results and leave the loop
    Shutdown = 0x8765_4321,
}

impl Command {
    #[inline]
    pub const fn word(self) -> u32 {
        self as u32
    }

    /// Decode a raw word. Unknown words decode to `None` and are never acted on.
    #[inline]
    pub const fn from_word(word: u32) -> Option<Self> {
        match word {
            0x0000_0000 => Some(Command::Idle),
            0x1234_5678 => Some(Command::Process),
            0x8765_4321 => Some(Command::Shutdown),
            _ => None,
        }
    }
}

/// Responder → Controller status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Status {
    /// Waiting for the next command
    Ready = 0xAAAA_AAAA,
    /// Packet observed and timestamped, recording it
    Busy = 0xBBBB_BBBB,
    /// Packet recorded (or Shutdown acknowledged)
    Done = 0xCCCC_CCCC,
}

impl Status {
    #[inline]
    pub const fn word(self) -> u32 {
        self as u32
    }

    #[inline]
    pub const fn from_word(word: u32) -> Option<Self> {
        match word {
            0xAAAA_AAAA => Some(Status::Ready),
            0xBBBB_BBBB => Some(Status::Busy),
            0xCCCC_CCCC => Some(Status::Done),
            _ => None,
        }
    }
}
