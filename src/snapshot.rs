use crate::Error;
use crate::encoding::{Decoder, DecoderV1, DecoderV2, Encoder, EncoderV1, EncoderV2};
use crate::encoding::update::{read_delete_set, read_state_vector, write_delete_set, write_state_vector};
use crate::id::{DeleteSet, ItemId, StateVector};
use base64;
use std::fmt;
use std::str::FromStr;

/// The state of a document at one point in time: which ids existed and
/// which of them were deleted. Only meaningful for documents with gc
/// disabled, since gc discards the content a snapshot would show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state_vector: StateVector,
    pub delete_set: DeleteSet,
}

impl Snapshot {
    pub fn new(state_vector: StateVector, delete_set: DeleteSet) -> Self {
        Snapshot{state_vector, delete_set}
    }

    /// True if the id existed and was not yet deleted.
    pub fn is_visible(&self, id: &ItemId) -> bool {
        self.state_vector.contains(id) && !self.delete_set.contains(id)
    }

    pub fn encode_v1(&self) -> Vec<u8> {
        self.encode::<EncoderV1>()
    }

    pub fn encode_v2(&self) -> Vec<u8> {
        self.encode::<EncoderV2>()
    }

    pub fn decode_v1(bytes: &[u8]) -> Result<Snapshot, Error> {
        Snapshot::decode::<DecoderV1>(bytes)
    }

    pub fn decode_v2(bytes: &[u8]) -> Result<Snapshot, Error> {
        Snapshot::decode::<DecoderV2>(bytes)
    }

    fn encode<E: Encoder>(&self) -> Vec<u8> {
        let mut encoder = E::new();
        encoder.write_header();
        encoder.section(|e| write_state_vector(e, &self.state_vector));
        encoder.section(|e| write_delete_set(e, &self.delete_set));
        encoder.into_vec()
    }

    fn decode<'a, D: Decoder<'a>>(bytes: &'a [u8]) -> Result<Snapshot, Error> {
        let mut decoder = D::new(bytes);
        decoder.read_header()?;
        let state_vector = decoder.section(|d| read_state_vector(d))?;
        let delete_set = decoder.section(|d| read_delete_set(d))?;
        decoder.finish()?;
        Ok(Snapshot{state_vector, delete_set})
    }
}

/// URL-safe base64 of the V1 encoding.
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", base64::encode_config(&self.encode_v1(), base64::URL_SAFE_NO_PAD))
    }
}

impl FromStr for Snapshot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = base64::decode_config(s, base64::URL_SAFE_NO_PAD).map_err(|_| Error::InvalidFormat)?;
        Snapshot::decode_v1(&bytes)
    }
}
