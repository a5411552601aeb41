pub mod detect_image_use_case;
pub mod detect_stream_use_case;
pub mod pipeline_logger;
pub mod report;
pub mod run_control;
pub mod snapshot;

#[cfg(test)]
mod test_support;
