pub mod warn;
pub mod warnings;
