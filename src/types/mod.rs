pub mod sensor;
pub mod station_table;
pub mod window;
