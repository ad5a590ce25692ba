pub mod entity;
pub mod work;
