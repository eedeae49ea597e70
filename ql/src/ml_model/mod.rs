pub mod checkpoint;
pub mod feed_forward;
pub mod model;
