//! Emoji used by the terminal UI, with plain fallbacks.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Stage indicators
pub static PLAN: Emoji<'_, '_> = Emoji("📋 ", "[P]");
pub static SEARCH: Emoji<'_, '_> = Emoji("🔎 ", "[S]");
pub static WRITE: Emoji<'_, '_> = Emoji("📝 ", "[W]");
pub static REVIEW: Emoji<'_, '_> = Emoji("🔍 ", "[R]");
pub static REVISE: Emoji<'_, '_> = Emoji("🔄 ", "[~]");
pub static FILE: Emoji<'_, '_> = Emoji("📄 ", "");
