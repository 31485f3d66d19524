use crate::{DriverError, Result, MAX_RECORD_SIZE};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// Decoder for the RecordIO framing used by the master's event stream.
///
/// Frame format: `<decimal-length>\n<length bytes>`
#[derive(Debug, Default)]
pub struct RecordIoCodec;

/// Longest decimal length prefix we accept before declaring the stream corrupt
const MAX_PREFIX_DIGITS: usize = 16;

impl Decoder for RecordIoCodec {
    type Item = Bytes;
    type Error = DriverError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let Some(newline) = src.iter().position(|b| *b == b'\n') else {
            if src.len() > MAX_PREFIX_DIGITS {
                return Err(DriverError::FramingError(
                    "no record length prefix found".to_string(),
                ));
            }
            return Ok(None);
        };

        let prefix = std::str::from_utf8(&src[..newline])
            .map_err(|_| DriverError::FramingError("non-ascii length prefix".to_string()))?;
        let length: usize = prefix
            .trim()
            .parse()
            .map_err(|_| DriverError::FramingError(format!("bad length prefix {:?}", prefix)))?;

        if length > MAX_RECORD_SIZE {
            return Err(DriverError::RecordTooLarge(length));
        }

        // Wait for the complete record
        if src.len() < newline + 1 + length {
            src.reserve(newline + 1 + length - src.len());
            return Ok(None);
        }

        src.advance(newline + 1);
        Ok(Some(src.split_to(length).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_record() {
        let mut codec = RecordIoCodec;
        let mut buf = BytesMut::from(&b"5\nhello"[..]);

        let record = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&record[..], b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_back_to_back_records() {
        let mut codec = RecordIoCodec;
        let mut buf = BytesMut::from(&b"2\nab3\ncde"[..]);

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"ab");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"cde");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_partial_record_waits() {
        let mut codec = RecordIoCodec;

        let mut buf = BytesMut::from(&b"10"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        let mut buf = BytesMut::from(&b"10\npartial"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"!!!");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"partial!!!");
    }

    #[test]
    fn test_bad_prefix_is_an_error() {
        let mut codec = RecordIoCodec;
        let mut buf = BytesMut::from(&b"abc\nxyz"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn test_oversized_record_is_an_error() {
        let mut codec = RecordIoCodec;
        let mut buf = BytesMut::from(format!("{}\n", MAX_RECORD_SIZE + 1).as_bytes());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(DriverError::RecordTooLarge(_))
        ));
    }

    #[test]
    fn test_missing_prefix_overflow_is_an_error() {
        let mut codec = RecordIoCodec;
        let mut buf = BytesMut::from(&b"01234567890123456789"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
