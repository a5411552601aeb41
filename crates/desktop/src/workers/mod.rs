pub mod detect_worker;
pub mod model_cache;
