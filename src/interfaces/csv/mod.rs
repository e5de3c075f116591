pub mod occupancy_writer;
pub mod scenario_reader;
