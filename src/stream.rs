use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error as ThisError;

/// Field/value pairs of a single stream entry, in insertion order.
pub type Fields = Vec<(Bytes, Bytes)>;

/// Identifies an entry within a stream: `<milliseconds>-<sequence>`. Ids are ordered by the
/// millisecond part first and the sequence part second, both compared numerically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };

    pub fn new(ms: u64, seq: u64) -> StreamId {
        StreamId { ms, seq }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ms, seq) = s.split_once('-').ok_or(StreamError::InvalidId)?;
        let ms = ms.parse::<u64>().map_err(|_| StreamError::InvalidId)?;
        let seq = seq.parse::<u64>().map_err(|_| StreamError::InvalidId)?;

        Ok(StreamId { ms, seq })
    }
}

/// The id argument given to XADD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRequest {
    /// `*`: both parts are generated.
    Auto,
    /// `<ms>-*`: the sequence part is generated.
    AutoSequence(u64),
    /// `<ms>-<seq>`
    Explicit(StreamId),
}

impl FromStr for IdRequest {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(IdRequest::Auto);
        }

        match s.strip_suffix("-*") {
            Some(ms) => ms
                .parse::<u64>()
                .map(IdRequest::AutoSequence)
                .map_err(|_| StreamError::InvalidId),
            None => s.parse::<StreamId>().map(IdRequest::Explicit),
        }
    }
}

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum StreamError {
    #[error("Invalid stream ID specified as stream command argument")]
    InvalidId,
    #[error("The ID specified in XADD must be greater than 0-0")]
    ZeroId,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    NotIncreasing,
}

/// An append-only log of entries. Every stream tracks the last id it accepted, new ids must be
/// strictly greater.
#[derive(Debug, Default)]
pub struct Stream {
    last_id: StreamId,
    entries: BTreeMap<StreamId, Fields>,
}

impl Stream {
    pub fn add(
        &mut self,
        request: IdRequest,
        fields: Fields,
        now_ms: u64,
    ) -> Result<StreamId, StreamError> {
        let id = self.next_id(request, now_ms)?;

        self.entries.insert(id, fields);
        self.last_id = id;

        Ok(id)
    }

    pub fn next_id(&self, request: IdRequest, now_ms: u64) -> Result<StreamId, StreamError> {
        match request {
            IdRequest::Explicit(id) if id == StreamId::MIN => Err(StreamError::ZeroId),
            IdRequest::Explicit(id) if id <= self.last_id => Err(StreamError::NotIncreasing),
            IdRequest::Explicit(id) => Ok(id),
            IdRequest::AutoSequence(ms) if ms < self.last_id.ms => Err(StreamError::NotIncreasing),
            IdRequest::AutoSequence(ms) if ms == self.last_id.ms => self
                .last_id
                .seq
                .checked_add(1)
                .map(|seq| StreamId::new(ms, seq))
                .ok_or(StreamError::NotIncreasing),
            IdRequest::AutoSequence(ms) => Ok(StreamId::new(ms, 0)),
            // The clock may go backwards, ids never do.
            IdRequest::Auto => {
                self.next_id(IdRequest::AutoSequence(now_ms.max(self.last_id.ms)), now_ms)
            }
        }
    }

    pub fn last_id(&self) -> StreamId {
        self.last_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&StreamId, &Fields)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Fields {
        vec![(Bytes::from("temperature"), Bytes::from("36"))]
    }

    #[test]
    fn parse_ids() {
        assert_eq!("5-3".parse::<StreamId>(), Ok(StreamId::new(5, 3)));
        assert_eq!("5".parse::<StreamId>(), Err(StreamError::InvalidId));
        assert_eq!("a-1".parse::<StreamId>(), Err(StreamError::InvalidId));

        assert_eq!("*".parse::<IdRequest>(), Ok(IdRequest::Auto));
        assert_eq!("7-*".parse::<IdRequest>(), Ok(IdRequest::AutoSequence(7)));
        assert_eq!(
            "7-1".parse::<IdRequest>(),
            Ok(IdRequest::Explicit(StreamId::new(7, 1)))
        );
        assert_eq!("x-*".parse::<IdRequest>(), Err(StreamError::InvalidId));
    }

    #[test]
    fn ids_compare_numerically() {
        // Lexicographically "10-0" < "9-0".
        assert!(StreamId::new(10, 0) > StreamId::new(9, 0));
        assert!(StreamId::new(1, 10) > StreamId::new(1, 9));
    }

    #[test]
    fn explicit_ids_must_increase() {
        let mut stream = Stream::default();

        assert_eq!(
            stream.add(IdRequest::Explicit(StreamId::MIN), fields(), 0),
            Err(StreamError::ZeroId)
        );

        let id = stream
            .add(IdRequest::Explicit(StreamId::new(9, 5)), fields(), 0)
            .unwrap();
        assert_eq!(id, StreamId::new(9, 5));

        assert_eq!(
            stream.add(IdRequest::Explicit(StreamId::new(8, 9)), fields(), 0),
            Err(StreamError::NotIncreasing)
        );
        assert_eq!(
            stream.add(IdRequest::Explicit(StreamId::new(9, 5)), fields(), 0),
            Err(StreamError::NotIncreasing)
        );
        assert_eq!(
            stream.add(IdRequest::Explicit(StreamId::new(10, 0)), fields(), 0),
            Ok(StreamId::new(10, 0))
        );

        assert_eq!(stream.last_id(), StreamId::new(10, 0));
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn generated_sequence() {
        let mut stream = Stream::default();

        assert_eq!(
            stream.add(IdRequest::AutoSequence(0), fields(), 0),
            Ok(StreamId::new(0, 1))
        );
        assert_eq!(
            stream.add(IdRequest::AutoSequence(5), fields(), 0),
            Ok(StreamId::new(5, 0))
        );
        assert_eq!(
            stream.add(IdRequest::AutoSequence(5), fields(), 0),
            Ok(StreamId::new(5, 1))
        );
        assert_eq!(
            stream.add(IdRequest::AutoSequence(4), fields(), 0),
            Err(StreamError::NotIncreasing)
        );
    }

    #[test]
    fn generated_id_uses_clock_but_never_goes_backwards() {
        let mut stream = Stream::default();

        assert_eq!(
            stream.add(IdRequest::Auto, fields(), 1000),
            Ok(StreamId::new(1000, 0))
        );
        assert_eq!(
            stream.add(IdRequest::Auto, fields(), 1000),
            Ok(StreamId::new(1000, 1))
        );
        assert_eq!(
            stream.add(IdRequest::Auto, fields(), 900),
            Ok(StreamId::new(1000, 2))
        );
        assert_eq!(
            stream.add(IdRequest::Auto, fields(), 1001),
            Ok(StreamId::new(1001, 0))
        );
    }
}
