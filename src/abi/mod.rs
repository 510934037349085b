mod decode;
mod error;
mod event;
mod token;

pub use decode::{DecodedEvent, decode_log};
pub use error::Error;
pub use event::{EventParam, EventSignature};
pub use token::{Token, serialize_checksummed};
