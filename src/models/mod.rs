pub mod energy_log;
