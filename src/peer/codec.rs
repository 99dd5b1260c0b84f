use {super::*, tokio_util::bytes::{Buf, BytesMut}};

pub(crate) const HEADER_SIZE: usize = 24;
pub(crate) const COMMAND_SIZE: usize = 12;

/// Consensus cap on a single message; a larger length field means the
/// stream is garbage, not a giant message.
pub(crate) const MAX_PAYLOAD_SIZE: usize = 32 * 1024 * 1024;

/// One decoded item. Framing faults are items rather than hard errors so
/// the connection can resynchronize and keep reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PeerFrame {
    Message { command: String, payload: Vec<u8> },
    BadMagic,
    BadChecksum { command: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawMessage {
    pub(crate) command: String,
    pub(crate) payload: Vec<u8>,
}

impl RawMessage {
    pub(crate) fn new(command: &str, payload: Vec<u8>) -> Self {
        Self {
            command: command.into(),
            payload,
        }
    }
}

/// `magic ‖ command(12, NUL-padded) ‖ len(4 LE) ‖ checksum(4) ‖ payload`
/// with the checksum being the first four bytes of sha256d(payload).
pub(crate) struct PeerCodec {
    magic: [u8; 4],
    scanning: bool,
}

impl PeerCodec {
    pub(crate) fn new(magic: [u8; 4]) -> Self {
        Self {
            magic,
            scanning: false,
        }
    }
}

impl Decoder for PeerCodec {
    type Item = PeerFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<PeerFrame>, io::Error> {
        // hunt for the magic one byte at a time; a desync episode is
        // reported exactly once
        while src.len() >= 4 && src[..4] != self.magic {
            src.advance(1);
            if !self.scanning {
                self.scanning = true;
                return Ok(Some(PeerFrame::BadMagic));
            }
        }

        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        self.scanning = false;

        let payload_len = LittleEndian::read_u32(&src[16..20]) as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            src.advance(1);
            self.scanning = true;
            return Ok(Some(PeerFrame::BadMagic));
        }

        let frame_len = HEADER_SIZE + payload_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let header = src.split_to(HEADER_SIZE);
        let payload = src.split_to(payload_len).to_vec();
        let command = command_string(&header[4..16]);

        if util::sha256d(&payload)[..4] != header[20..24] {
            return Ok(Some(PeerFrame::BadChecksum { command }));
        }

        Ok(Some(PeerFrame::Message { command, payload }))
    }
}

impl Encoder<RawMessage> for PeerCodec {
    type Error = io::Error;

    fn encode(&mut self, message: RawMessage, dst: &mut BytesMut) -> Result<(), io::Error> {
        if message.command.len() > COMMAND_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("command `{}` exceeds 12 bytes", message.command),
            ));
        }

        let mut command = [0u8; COMMAND_SIZE];
        command[..message.command.len()].copy_from_slice(message.command.as_bytes());

        dst.reserve(HEADER_SIZE + message.payload.len());
        dst.extend_from_slice(&self.magic);
        dst.extend_from_slice(&command);
        dst.extend_from_slice(&util::pack_u32_le(message.payload.len() as u32));
        dst.extend_from_slice(&util::sha256d(&message.payload)[..4]);
        dst.extend_from_slice(&message.payload);

        Ok(())
    }
}

fn command_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
