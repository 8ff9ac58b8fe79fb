pub mod content;
pub mod pages;
pub mod publish;
