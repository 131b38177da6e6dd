pub mod last_entry;
pub mod organizer;
