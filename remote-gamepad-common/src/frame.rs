use crate::{Buttons, DPad};
use thiserror::Error;
use tokio_util::bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of one frame on the wire.
///
/// Layout (little-endian):
/// - stick_x (i16)
/// - stick_y (i16)
/// - button mask (u8)
/// - d-pad mask (u8)
pub const FRAME_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: expected {FRAME_LEN} bytes, got {0}")]
    Malformed(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One complete controller state sample.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ControllerFrame {
    pub stick_x: i16,
    pub stick_y: i16,
    pub buttons: Buttons,
    pub dpad: DPad,
}

impl ControllerFrame {
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        encode(
            self.stick_x,
            self.stick_y,
            self.buttons.bits(),
            self.dpad.bits(),
        )
    }

    /// Decodes the first [`FRAME_LEN`] bytes of `bytes`. Unknown d-pad bits
    /// are dropped.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let (stick_x, stick_y, buttons, dpad) = decode(bytes)?;

        Ok(Self {
            stick_x,
            stick_y,
            buttons: Buttons::from_bits_truncate(buttons),
            dpad: DPad::from_bits_truncate(dpad),
        })
    }
}

pub fn encode(stick_x: i16, stick_y: i16, buttons: u8, dpad: u8) -> [u8; FRAME_LEN] {
    let mut frame = [0; FRAME_LEN];
    frame[0..2].copy_from_slice(&stick_x.to_le_bytes());
    frame[2..4].copy_from_slice(&stick_y.to_le_bytes());
    frame[4] = buttons;
    frame[5] = dpad;
    frame
}

pub fn decode(mut bytes: &[u8]) -> Result<(i16, i16, u8, u8), FrameError> {
    if bytes.len() < FRAME_LEN {
        return Err(FrameError::Malformed(bytes.len()));
    }

    let stick_x = bytes.get_i16_le();
    let stick_y = bytes.get_i16_le();
    let buttons = bytes.get_u8();
    let dpad = bytes.get_u8();
    Ok((stick_x, stick_y, buttons, dpad))
}

/// Codec used with `FramedRead`/`FramedWrite` to turn a byte stream into
/// controller frames.
///
/// Stream transports give no framing guarantee, so a frame split over
/// several reads stays buffered until the rest of it arrives.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = ControllerFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FRAME_LEN {
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }

        let frame = src.split_to(FRAME_LEN);
        ControllerFrame::decode(&frame).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let remaining = src.len();
                src.clear();
                Err(FrameError::Malformed(remaining))
            }
        }
    }
}

impl Encoder<ControllerFrame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: ControllerFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(FRAME_LEN);
        dst.put_slice(&item.encode());
        Ok(())
    }
}
