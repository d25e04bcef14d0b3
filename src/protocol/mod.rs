pub mod decoder;

pub use decoder::{decode, decode_reading, Reading, GET_CPM_COMMAND};
