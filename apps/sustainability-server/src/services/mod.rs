pub mod kpi;
pub mod readings;
pub mod reference;
pub mod users;
