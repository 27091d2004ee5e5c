pub mod book_template;
pub mod content;
pub mod order;
