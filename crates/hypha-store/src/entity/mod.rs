//! Sea-ORM entities for the relational half of the hybrid views

pub mod documents;
pub mod people;
pub mod spaces;

pub use documents::Entity as Documents;
pub use people::Entity as People;
pub use spaces::Entity as Spaces;
