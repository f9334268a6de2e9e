pub mod grouping;
pub mod mapping;
pub mod report;
pub mod tokenization;
