pub mod data_interface;
pub mod model;
pub mod data_interfaces {
    pub mod data_interface_sqlite;
}
pub mod collector;
pub mod collector_error;
pub mod collector_file;
pub mod exporter;
pub mod exporters {
    pub mod exporter_json;
    pub mod exporter_prometheus;
}
pub mod lz_string;
pub mod poller;
pub mod save;
