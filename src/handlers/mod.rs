pub mod config_handler;
