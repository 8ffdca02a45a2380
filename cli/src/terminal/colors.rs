use colored::Color;

pub const PRIMARY: Color = Color::BrightGreen;
pub const SECONDARY: Color = Color::Green;
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;

pub const PORT: Color = Color::Cyan;
pub const STATE_OPEN: Color = Color::Green;
pub const STATE_FILTERED: Color = Color::Yellow;
pub const STATE_CLOSED: Color = Color::Red;

pub const STATUS_OK: Color = Color::Green;
pub const STATUS_UNAVAILABLE: Color = Color::Yellow;
pub const STATUS_ERROR: Color = Color::Red;

pub const NARRATIVE_HEADING: Color = Color::Cyan;
pub const NARRATIVE_FINDING: Color = Color::Yellow;
