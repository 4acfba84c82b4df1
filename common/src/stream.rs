use std::io::{self, Read, Write};

use crate::{
    config::MAX_PACKET_SIZE,
    error::{Result, WireError},
    packet::Packet,
};

/// Length-prefixed packet framing over any byte stream
pub struct PacketStream<S> {
    inner: S,
}

impl<S: Read + Write> PacketStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Send a packet, prefixed with its big-endian length
    pub fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let body = packet.encode()?;
        if body.len() > MAX_PACKET_SIZE {
            return Err(WireError::TooLarge {
                len:   body.len(),
                limit: MAX_PACKET_SIZE,
            });
        }

        let len = body.len() as u32;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(&body)?;
        self.inner.flush()?;

        tracing::debug!(
            "Sent {:?} packet {:?} ({} bytes)",
            packet.kind,
            packet.name,
            body.len()
        );
        Ok(())
    }

    /// Receive the next packet. A clean EOF before the length prefix is
    /// reported as `UnexpectedEof` like any other short read.
    pub fn recv_packet(&mut self) -> Result<Packet> {
        let mut len_buf = [0u8; 4];
        self.inner.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_PACKET_SIZE {
            return Err(WireError::TooLarge {
                len,
                limit: MAX_PACKET_SIZE,
            });
        }

        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body)?;

        let packet = Packet::decode(&body)?;
        tracing::debug!(
            "Received {:?} packet {:?} ({} bytes)",
            packet.kind,
            packet.name,
            len
        );
        Ok(packet)
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

/// Whether an error only means the peer went away between packets
pub fn is_disconnect(err: &WireError) -> bool {
    match err {
        WireError::Io(io_err) => matches!(
            io_err.kind(),
            io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{message::Message, packet::PacketType};

    /// In-memory duplex: reads from `input`, records writes in `output`
    struct Duplex {
        input:  Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn duplex(input: Vec<u8>) -> PacketStream<Duplex> {
        PacketStream::new(Duplex {
            input:  Cursor::new(input),
            output: Vec::new(),
        })
    }

    #[test]
    fn test_send_prefixes_length() {
        let mut stream = duplex(Vec::new());
        stream
            .send_packet(&Packet::request("get-conns", Message::new()))
            .unwrap();

        let written = &stream.get_ref().output;
        assert_eq!(&written[..4], &[0, 0, 0, 11]);
        assert_eq!(written.len(), 15);
    }

    #[test]
    fn test_recv_reads_one_packet() {
        let body = Packet::bare(PacketType::CmdUnknown).encode().unwrap();
        let mut input = (body.len() as u32).to_be_bytes().to_vec();
        input.extend_from_slice(&body);

        let mut stream = duplex(input);
        assert_eq!(stream.recv_packet().unwrap().kind, PacketType::CmdUnknown);

        let err = stream.recv_packet().unwrap_err();
        assert!(is_disconnect(&err));
    }

    #[test]
    fn test_recv_rejects_oversized_prefix() {
        let mut stream = duplex(u32::MAX.to_be_bytes().to_vec());
        assert!(matches!(
            stream.recv_packet(),
            Err(WireError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_recv_truncated_body_is_io_error() {
        let mut input = 10u32.to_be_bytes().to_vec();
        input.extend_from_slice(&[1, 2]);
        let mut stream = duplex(input);
        assert!(matches!(stream.recv_packet(), Err(WireError::Io(_))));
    }
}
