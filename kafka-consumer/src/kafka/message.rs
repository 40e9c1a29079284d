use std::io::{self, BufRead, Cursor, Read};

use rdkafka::message::{Message, OwnedHeaders, OwnedMessage, Timestamp};

/// Read view over the payload of the message `consume()` just handed out.
#[derive(Debug)]
pub struct ReadBuffer<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ReadBuffer<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(payload),
        }
    }

    /// The whole payload, regardless of how much has been read.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.inner.get_ref()
    }

    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }
}

impl Read for ReadBuffer<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for ReadBuffer<'_> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

/// Borrowed view of the most recently delivered message.
#[derive(Debug, Clone, Copy)]
pub struct CurrentMessage<'a> {
    message: &'a OwnedMessage,
}

impl<'a> CurrentMessage<'a> {
    pub(crate) fn new(message: &'a OwnedMessage) -> Self {
        Self { message }
    }

    pub fn topic(&self) -> &'a str {
        self.message.topic()
    }

    pub fn key(&self) -> Option<&'a [u8]> {
        self.message.key()
    }

    pub fn offset(&self) -> i64 {
        self.message.offset()
    }

    pub fn partition(&self) -> i32 {
        self.message.partition()
    }

    pub fn timestamp(&self) -> Timestamp {
        self.message.timestamp()
    }

    pub fn headers(&self) -> Option<&'a OwnedHeaders> {
        self.message.headers()
    }

    pub fn payload(&self) -> Option<&'a [u8]> {
        self.message.payload()
    }

    /// Fresh reader positioned at the start of the payload.
    pub fn reader(&self) -> ReadBuffer<'a> {
        ReadBuffer::new(self.message.payload().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::message::{Header, Headers};

    #[test]
    fn test_read_buffer_reads_payload_once() {
        let mut buffer = ReadBuffer::new(b"hello kafka");
        assert_eq!(buffer.len(), 11);

        let mut out = String::new();
        buffer.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello kafka");

        let mut rest = Vec::new();
        assert_eq!(buffer.read_to_end(&mut rest).unwrap(), 0);
        assert_eq!(buffer.as_bytes(), b"hello kafka");
    }

    #[test]
    fn test_read_buffer_lines() {
        let buffer = ReadBuffer::new(b"a\nb\nc");
        let lines: Vec<String> = buffer.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_current_message_exposes_fields() {
        let headers = OwnedHeaders::new().insert(Header {
            key: "trace-id",
            value: Some("abc"),
        });
        let message = OwnedMessage::new(
            Some(b"payload".to_vec()),
            Some(b"key-1".to_vec()),
            "events".to_string(),
            Timestamp::CreateTime(1_700_000_000_000),
            2,
            41,
            Some(headers),
        );

        let current = CurrentMessage::new(&message);
        assert_eq!(current.topic(), "events");
        assert_eq!(current.key(), Some(&b"key-1"[..]));
        assert_eq!(current.partition(), 2);
        assert_eq!(current.offset(), 41);
        assert_eq!(current.timestamp().to_millis(), Some(1_700_000_000_000));
        assert_eq!(current.headers().map(|h| h.count()), Some(1));
        assert_eq!(current.reader().as_bytes(), b"payload");
    }
}
