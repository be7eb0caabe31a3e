//! Utility modules

pub mod paths;

pub use paths::{
    config_path, data_dir, default_session_state_dir, expand_home, init_data_dir, log_file_path,
    logs_dir,
};
