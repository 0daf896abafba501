pub mod calibrator;
pub mod classifier;
pub mod dataset;
pub mod feature_cache;
pub mod features;
pub mod form;
pub mod head_to_head;
pub mod match_data;
pub mod pipeline;
pub mod splitter;
pub mod synthetic;
pub mod value_bets;
