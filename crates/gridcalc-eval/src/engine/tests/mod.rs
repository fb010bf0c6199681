mod column_operations;
mod common;
mod cycle_detection;
mod error_propagation;
mod properties;
mod row_operations;
mod scenarios;
mod sheet_management;
