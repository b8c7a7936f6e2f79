pub mod doctor;
pub mod profile;
pub mod retrieve;
pub mod serve;
