//! SHDLC framing, as spoken by the SPS30 on its UART interface.
//!
//! A frame on the wire looks like this:
//!
//! ```text
//! 0x7E | ADR | CMD | [STATE] | LEN | DATA... | CHK | 0x7E
//! ```
//!
//! where everything between the two `0x7E` delimiters is byte-stuffed. The
//! `STATE` byte is only present in responses (MISO frames).
use core::fmt;
use heapless::Vec;

/// Start/stop delimiter.
pub const START: u8 = 0x7E;
/// Escape byte, followed by the substitute for a reserved byte.
pub const ESCAPE: u8 = 0x7D;

/// The SPS30 always answers on address 0.
const ADDRESS: u8 = 0x00;

/// The largest data field we're willing to send or receive. The biggest
/// response the SPS30 produces is the float measurement (40 bytes).
pub const MAX_DATA_LEN: usize = 64;

/// Unstuffed frame: address, command, state, length, data, checksum.
pub const MAX_FRAME_LEN: usize = 4 + MAX_DATA_LEN + 1;

/// Stuffed frame, worst case every byte escaped, plus both delimiters.
pub const MAX_RAW_LEN: usize = 2 * MAX_FRAME_LEN + 2;

pub type Frame = Vec<u8, MAX_FRAME_LEN>;
pub type RawFrame = Vec<u8, MAX_RAW_LEN>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProtocolError {
    /// Fewer bytes were received than the smallest response frame.
    ShortFrame { len: usize },
    /// The frame is longer than its length byte says it should be.
    LengthMismatch { len: usize, expected: usize },
    /// The trailing checksum byte doesn't match the frame contents.
    BadChecksum { expected: u8, actual: u8 },
    /// The sensor answered a different command than the one we sent.
    UnexpectedCommand { expected: u8, actual: u8 },
    /// The sensor reported an execution error (the low 7 bits of the state
    /// byte).
    DeviceError(u8),
    /// No complete frame arrived before the read timeout elapsed.
    NoResponse,
    /// An escape byte was followed by something that isn't a substitute, or a
    /// bare delimiter showed up inside a frame.
    BadEscape(u8),
    /// The frame doesn't fit in our buffers.
    FrameTooLong,
}

/// One's complement of the byte sum, modulo 256.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Appends `data` to `out`, escaping the four reserved byte values.
pub fn stuff<const N: usize>(data: &[u8], out: &mut Vec<u8, N>) -> Result<(), ProtocolError> {
    for &byte in data {
        match substitute(byte) {
            Some(sub) => out
                .extend_from_slice(&[ESCAPE, sub])
                .map_err(|_| ProtocolError::FrameTooLong)?,
            None => out.push(byte).map_err(|_| ProtocolError::FrameTooLong)?,
        }
    }
    Ok(())
}

/// Appends the unescaped form of `data` to `out`.
pub fn unstuff<const N: usize>(data: &[u8], out: &mut Vec<u8, N>) -> Result<(), ProtocolError> {
    let mut bytes = data.iter().copied();
    while let Some(byte) = bytes.next() {
        let byte = match byte {
            ESCAPE => {
                let sub = bytes.next().ok_or(ProtocolError::BadEscape(ESCAPE))?;
                original(sub).ok_or(ProtocolError::BadEscape(sub))?
            }
            START => return Err(ProtocolError::BadEscape(START)),
            byte => byte,
        };
        out.push(byte).map_err(|_| ProtocolError::FrameTooLong)?;
    }
    Ok(())
}

/// Builds a complete, delimited request frame for `command`.
pub fn encode_command(command: u8, data: &[u8]) -> Result<RawFrame, ProtocolError> {
    if data.len() > MAX_DATA_LEN {
        return Err(ProtocolError::FrameTooLong);
    }

    let mut payload = Frame::new();
    // `MAX_DATA_LEN` fits in a u8 and the header plus checksum fits in the
    // frame buffer, so none of these can fail.
    let _ = payload.extend_from_slice(&[ADDRESS, command, data.len() as u8]);
    let _ = payload.extend_from_slice(data);
    let _ = payload.push(checksum(&payload));

    let mut raw = RawFrame::new();
    let _ = raw.push(START);
    stuff(&payload, &mut raw)?;
    raw.push(START).map_err(|_| ProtocolError::FrameTooLong)?;
    Ok(raw)
}

/// Validates an unstuffed response frame and returns its data field.
///
/// Checks are applied in order: length, checksum, echoed command, and then
/// the device's execution state.
pub fn decode_response(frame: &[u8], expected_cmd: u8) -> Result<&[u8], ProtocolError> {
    const HEADER_LEN: usize = 4;

    let len = frame.len();
    if len < HEADER_LEN + 1 {
        return Err(ProtocolError::ShortFrame { len });
    }

    let data_len = frame[3] as usize;
    let expected = HEADER_LEN + data_len + 1;
    if len < expected {
        // a frame cut short has lost its real checksum byte; whatever ended
        // up last won't match.
        let (body, chk) = frame.split_at(len - 1);
        return Err(ProtocolError::BadChecksum {
            expected: chk[0],
            actual: checksum(body),
        });
    }
    if len > expected {
        return Err(ProtocolError::LengthMismatch { len, expected });
    }

    let (body, chk) = frame.split_at(len - 1);
    let actual = checksum(body);
    if actual != chk[0] {
        return Err(ProtocolError::BadChecksum {
            expected: chk[0],
            actual,
        });
    }

    let cmd = frame[1];
    if cmd != expected_cmd {
        return Err(ProtocolError::UnexpectedCommand {
            expected: expected_cmd,
            actual: cmd,
        });
    }

    let code = frame[2] & 0x7F;
    if code != 0 {
        return Err(ProtocolError::DeviceError(code));
    }

    Ok(&frame[HEADER_LEN..HEADER_LEN + data_len])
}

fn substitute(byte: u8) -> Option<u8> {
    match byte {
        0x7E => Some(0x5E),
        0x7D => Some(0x5D),
        0x11 => Some(0x31),
        0x13 => Some(0x33),
        _ => None,
    }
}

fn original(sub: u8) -> Option<u8> {
    match sub {
        0x5E => Some(0x7E),
        0x5D => Some(0x7D),
        0x31 => Some(0x11),
        0x33 => Some(0x13),
        _ => None,
    }
}

/// Accumulates bytes from the wire until a complete frame has been delimited.
///
/// Bytes that arrive before the first delimiter are discarded. Two delimiters
/// in a row are treated as the end of one (empty) frame and the start of the
/// next, so a frame always carries at least one byte.
#[derive(Default)]
pub struct FrameReader {
    buf: RawFrame,
    in_frame: bool,
}

impl FrameReader {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: Vec::new(),
            in_frame: false,
        }
    }

    /// Feeds one byte into the reader, returning the unstuffed frame once the
    /// closing delimiter arrives.
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame, ProtocolError>> {
        if byte == START {
            if self.in_frame && !self.buf.is_empty() {
                let mut frame = Frame::new();
                let res = unstuff(&self.buf, &mut frame).map(|_| frame);
                self.reset();
                return Some(res);
            }
            self.in_frame = true;
            self.buf.clear();
            return None;
        }

        if !self.in_frame {
            return None;
        }

        if self.buf.push(byte).is_err() {
            self.reset();
            return Some(Err(ProtocolError::FrameTooLong));
        }

        None
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.in_frame = false;
    }
}

impl fmt::Debug for FrameReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReader")
            .field("buffered", &self.buf.len())
            .field("in_frame", &self.in_frame)
            .finish()
    }
}

// === impl ProtocolError ===

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortFrame { len } => write!(f, "short frame ({len} bytes)"),
            Self::LengthMismatch { len, expected } => {
                write!(f, "frame is {len} bytes, but its length field says {expected}")
            }
            Self::BadChecksum { expected, actual } => {
                write!(f, "bad checksum (frame says {expected:#04x}, computed {actual:#04x})")
            }
            Self::UnexpectedCommand { expected, actual } => write!(
                f,
                "unexpected command in response: got {actual:#04x}, expected {expected:#04x}"
            ),
            Self::DeviceError(code) => write!(f, "sensor execution error {code:#04x}"),
            Self::NoResponse => f.write_str("no response from sensor"),
            Self::BadEscape(byte) => write!(f, "invalid escape sequence ({byte:#04x})"),
            Self::FrameTooLong => f.write_str("frame too long"),
        }
    }
}

impl std::error::Error for ProtocolError {}
