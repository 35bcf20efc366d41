pub mod data_url;
pub mod logging;

pub use data_url::{decode_data_url, encode_data_url, DataUrl};
pub use logging::truncate_text;
