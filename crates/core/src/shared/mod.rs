pub mod constants;
pub mod detection;
pub mod frame;
pub mod input_source;
pub mod settings;
pub mod video_metadata;
