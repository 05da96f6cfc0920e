pub mod controller;
pub mod controls;
pub mod domain;
pub mod export;
pub mod ingest;
pub mod inputter;
pub mod model;
pub mod sheet;
pub mod ui;
