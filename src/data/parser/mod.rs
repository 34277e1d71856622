pub mod keymap;
pub mod plasma;

pub use keymap::KeyMap;
pub use plasma::{parse_plasma_text, plasma_from_csv, read_plasma_data};
