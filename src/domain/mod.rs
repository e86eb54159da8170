pub mod hash;
pub mod session;
pub mod track;
pub mod view;
