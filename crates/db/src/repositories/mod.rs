pub mod entity_repo;
pub mod work_repo;

pub use entity_repo::EntityRepo;
pub use work_repo::WorkRepo;
