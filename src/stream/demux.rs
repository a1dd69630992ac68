//! Byte-level framing for the per-camera video feed.
//!
//! Every frame on the wire is a 12 byte header followed by a JPEG body:
//!
//! ```text
//! [0..8)   frame id, u64 little endian (0 for placeholder frames)
//! [8..12)  body length N, u32 little endian
//! [12..12+N) body
//! ```
//!
//! The body length is authoritative. A corrupt body never desynchronizes the
//! parser because the next header is always read exactly N bytes later.

use crate::types::FrameId;

pub const HEADER_LEN: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemuxState {
    Header,
    Body { frame_id: FrameId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePayload {
    pub frame_id: FrameId,
    pub body: Vec<u8>,
}

#[derive(Debug)]
pub struct FrameDemuxer {
    buffer: Vec<u8>,
    // Start of unconsumed bytes in `buffer`.
    pos: usize,
    state: DemuxState,
    required: usize,
}

impl Default for FrameDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDemuxer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            pos: 0,
            state: DemuxState::Header,
            required: HEADER_LEN,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DemuxState {
        self.state
    }

    /// Bytes needed before the current state can advance.
    #[cfg(test)]
    pub fn required(&self) -> usize {
        self.required
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.pos
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pos = 0;
        self.state = DemuxState::Header;
        self.required = HEADER_LEN;
    }

    /// Appends a transport chunk and returns every frame body it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FramePayload> {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while self.buffered() >= self.required {
            match self.state {
                DemuxState::Header => {
                    let header = &self.buffer[self.pos..self.pos + HEADER_LEN];
                    let frame_id = FrameId::from_le_bytes([
                        header[0], header[1], header[2], header[3], header[4], header[5],
                        header[6], header[7],
                    ]);
                    let body_len =
                        u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
                    self.pos += HEADER_LEN;
                    self.state = DemuxState::Body { frame_id };
                    self.required = body_len as usize;
                }
                DemuxState::Body { frame_id } => {
                    let end = self.pos + self.required;
                    let body = self.buffer[self.pos..end].to_vec();
                    self.pos = end;
                    frames.push(FramePayload { frame_id, body });
                    self.state = DemuxState::Header;
                    self.required = HEADER_LEN;
                }
            }
        }
        frames
    }
}

/// Encodes a single frame the way the server does. Used by tests and tooling.
#[cfg(test)]
pub fn encode_frame(frame_id: FrameId, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&frame_id.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}
