pub mod box_filter;
pub mod class_names;
pub mod object_detector;
