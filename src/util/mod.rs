pub mod hash;
pub mod http_date;
